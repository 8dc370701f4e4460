use chrono::{DateTime, Local};
use colored::*;

use crate::core::monitor::{Bounds, Breach, BreachKind, Channel, Reading, SensorStatus};

/// Format timestamp in human-readable format (YYYY-MM-DD HH:MM:SS)
pub fn format_time(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a single channel value with its unit, or the status when it has none
pub fn format_value(reading: &Reading, channel: Channel) -> String {
    match (reading.status.get(channel), reading.value(channel)) {
        (SensorStatus::Offline, _) | (_, None) => "offline".to_string(),
        (SensorStatus::Error, _) => "error".to_string(),
        (SensorStatus::Normal, Some(value)) => format!("{:.1} {}", value, channel.unit()),
    }
}

fn colorize(text: String, status: SensorStatus, breached: bool) -> ColoredString {
    match status {
        SensorStatus::Offline => text.bright_black(),
        SensorStatus::Error => text.red().bold(),
        SensorStatus::Normal if breached => text.yellow().bold(),
        SensorStatus::Normal => text.green(),
    }
}

/// One line per reading for the monitor command
pub fn format_reading(reading: &Reading, breaches: &[Breach]) -> String {
    let mut line = format!("[{}]", format_time(&reading.timestamp)).dimmed().to_string();

    for channel in Channel::ALL {
        let breached = breaches.iter().any(|b| b.channel == channel);
        let value = colorize(
            format_value(reading, channel),
            reading.status.get(channel),
            breached,
        );
        line.push_str(&format!("  {}: {}", channel, value));
    }

    if breaches.iter().any(|b| b.kind != BreachKind::SensorFault) {
        line.push_str(&format!("  {}", "ALARM".red().bold()));
    }

    line
}

/// Human-readable description of a breach
pub fn format_breach(breach: &Breach) -> String {
    match breach.kind {
        BreachKind::SensorFault => format!("⚠️  {}", breach.message).red().to_string(),
        _ => format!("⚠️  {}", breach.message).yellow().to_string(),
    }
}

/// Plot range of a window, e.g. `18.0 .. 32.0 °C`
pub fn format_bounds(channel: Channel, bounds: &Bounds) -> String {
    format!("{:.1} .. {:.1} {}", bounds.min, bounds.max, channel.unit())
}
