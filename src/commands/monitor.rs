use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::commands::store::ReadingStore;
use crate::core::config::{Config, DeviceBackend};
use crate::core::monitor::{
    evaluate, AcquisitionLoop, AlarmController, AlarmThresholds, Bounds, Breach, BreachKind,
    Channel, LoopStatus, Reading, ShutdownOutcome, WindowSet,
};
use crate::platform;
use crate::ui::{format_bounds, format_breach, format_reading};

/// Command-line overrides for a monitoring run
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub simulate: bool,
    pub duration: Option<Duration>,
    pub json: bool,
    pub no_store: bool,
    pub alarm_duration_secs: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    /// Suppress per-reading output
    pub quiet: bool,
}

impl MonitorOptions {
    pub fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            simulate: matches.get_flag("simulate"),
            duration: matches.get_one::<u64>("duration").map(|s| Duration::from_secs(*s)),
            json: matches.get_flag("json"),
            no_store: matches.get_flag("no-store"),
            alarm_duration_secs: matches.get_one::<u64>("alarm-duration").copied(),
            tick_interval_ms: matches.get_one::<u64>("interval").copied(),
            quiet: false,
        }
    }

    /// Fold the overrides into a loaded config
    pub fn apply(&self, config: &mut Config) {
        if self.simulate {
            config.device.backend = DeviceBackend::Simulated;
        }
        if let Some(secs) = self.alarm_duration_secs {
            config.alarm.duration_secs = secs;
        }
        if let Some(ms) = self.tick_interval_ms {
            config.sampling.tick_interval_ms = ms;
        }
    }
}

/// What happened during a run
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSummary {
    pub readings: u64,
    pub alarms: u64,
    pub persisted: u64,
    pub shutdown: ShutdownOutcome,
    /// Final plot range of every channel that recorded a sample
    pub ranges: Vec<(Channel, Bounds)>,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    reading: &'a Reading,
    breaches: &'a [Breach],
    alarming: bool,
    /// Time until the alarm clears itself
    alarm_remaining_ms: Option<u64>,
}

/// Per-reading glue between the loop, the plot windows, the alarm and storage
pub struct MonitorSession {
    windows: WindowSet,
    thresholds: AlarmThresholds,
    alarm: AlarmController,
    store: Option<ReadingStore>,
    readings: u64,
    alarms: u64,
    persisted: u64,
}

impl MonitorSession {
    pub fn new(
        windows: WindowSet,
        thresholds: AlarmThresholds,
        alarm: AlarmController,
        store: Option<ReadingStore>,
    ) -> Self {
        Self {
            windows,
            thresholds,
            alarm,
            store,
            readings: 0,
            alarms: 0,
            persisted: 0,
        }
    }

    /// Build a session from the user config, opening the database unless disabled
    pub fn from_config(config: &Config, use_store: bool) -> Self {
        let alarm = AlarmController::with_outputs(platform::build_indicators(&config.alarm));
        alarm.set_alarm_duration(config.alarm.duration_secs);

        let store = if use_store {
            open_store(config)
        } else {
            None
        };

        Self::new(
            WindowSet::with_capacity(config.window_capacity),
            config.thresholds,
            alarm,
            store,
        )
    }

    /// Record, evaluate and persist one reading. Limit breaches raise the
    /// alarm; sensor faults are reported but do not.
    pub fn handle(&mut self, reading: &Reading) -> Vec<Breach> {
        self.readings += 1;
        self.windows.record(reading);

        let breaches = evaluate(reading, &self.thresholds);
        for breach in &breaches {
            match breach.kind {
                BreachKind::SensorFault => log::warn!("{}", breach.message),
                _ => log::info!("{}", breach.message),
            }
        }

        if breaches.iter().any(|b| b.kind != BreachKind::SensorFault) {
            match self.alarm.trigger_alarm() {
                Ok(true) => self.alarms += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to trigger alarm: {}", e),
            }
        }

        if let Some(store) = &self.store {
            match store.persist(reading) {
                Ok(_) => self.persisted += 1,
                Err(e) => log::error!("Failed to save reading: {}", e),
            }
        }

        breaches
    }

    pub fn windows(&self) -> &WindowSet {
        &self.windows
    }

    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    pub fn store(&self) -> Option<&ReadingStore> {
        self.store.as_ref()
    }

    fn summary(&self, shutdown: ShutdownOutcome) -> MonitorSummary {
        MonitorSummary {
            readings: self.readings,
            alarms: self.alarms,
            persisted: self.persisted,
            shutdown,
            ranges: Channel::ALL
                .into_iter()
                .map(|channel| self.windows.get(channel))
                .filter(|window| !window.is_empty())
                .map(|window| (window.channel(), window.bounds()))
                .collect(),
        }
    }
}

fn open_store(config: &Config) -> Option<ReadingStore> {
    let path: PathBuf = match config.get_database_path() {
        Ok(path) => path,
        Err(e) => {
            log::error!("No database location available, readings will not be saved: {}", e);
            return None;
        }
    };

    match ReadingStore::open(&path) {
        Ok(store) => {
            log::info!("Saving readings to {}", path.display());
            Some(store)
        }
        Err(e) => {
            log::error!("Failed to open database {}: {}", path.display(), e);
            None
        }
    }
}

/// Handle 'monitor' command
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let options = MonitorOptions::from_matches(matches);
    let mut config = Config::load()?;
    options.apply(&mut config);

    let (stop_tx, stop_rx) = watch::channel(false);

    // Setup Ctrl+C handler
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    if !options.json {
        println!("{}", "Starting environment monitor...".cyan().bold());
        println!("{}", "Press Ctrl+C to stop".dimmed());
        println!();
    }

    let summary = run(config, &options, stop_rx)?;

    if !options.json {
        println!();
        println!(
            "{} {} readings, {} alarms, {} saved",
            "✓ Monitor stopped:".green(),
            summary.readings,
            summary.alarms,
            summary.persisted
        );
        for (channel, bounds) in &summary.ranges {
            println!("  {} range: {}", channel, format_bounds(*channel, bounds).dimmed());
        }
        if summary.shutdown == ShutdownOutcome::TimedOut {
            println!(
                "{}",
                "⚠️  The sensor thread did not stop in time and was abandoned".yellow()
            );
        }
    }

    Ok(())
}

/// Run the monitor until `stop` flips to true, the optional duration elapses
/// or the loop goes away.
pub fn run(config: Config, options: &MonitorOptions, mut stop: watch::Receiver<bool>) -> Result<MonitorSummary> {
    config.validate()?;

    let acquisition = AcquisitionLoop::builder()
        .channels(platform::build_channels(&config))
        .tick_interval(config.sampling.tick_interval())
        .shutdown_timeout(config.sampling.shutdown_timeout())
        .startup_timeout(config.sampling.startup_timeout())
        .build();
    let mut readings = acquisition.subscribe();

    let mut session = MonitorSession::from_config(&config, !options.no_store);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .thread_name("envmon-monitor")
        .build()
        .context("Failed to create runtime")?;

    acquisition
        .start()
        .context("Failed to start sensor acquisition")?;
    acquisition.start_collection();

    let deadline = options.duration.map(|d| Instant::now() + d);

    runtime.block_on(async {
        loop {
            tokio::select! {
                received = readings.recv() => match received {
                    Ok(reading) => {
                        let breaches = session.handle(&reading);
                        if !options.quiet {
                            print_reading(&reading, &breaches, session.alarm(), options.json);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("Display fell behind, skipped {} readings", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                Ok(()) = stop.changed() => {
                    if *stop.borrow() {
                        log::info!("Stop requested");
                        break;
                    }
                }
                _ = wait_for(deadline) => break,
            }
        }
    });

    acquisition.stop_collection();
    let shutdown = acquisition.request_stop();
    session.alarm().stop_alarm();

    if let LoopStatus::Failed(reason) = acquisition.status() {
        anyhow::bail!(
            "Sensor acquisition stopped unexpectedly after {} readings: {}",
            session.readings,
            reason
        );
    }

    Ok(session.summary(shutdown))
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn json_line(reading: &Reading, breaches: &[Breach], alarm: &AlarmController) -> serde_json::Result<String> {
    serde_json::to_string(&JsonLine {
        reading,
        breaches,
        alarming: alarm.is_alarming(),
        alarm_remaining_ms: alarm.remaining().map(|d| d.as_millis() as u64),
    })
}

fn print_reading(reading: &Reading, breaches: &[Breach], alarm: &AlarmController, json: bool) {
    if json {
        match json_line(reading, breaches, alarm) {
            Ok(text) => println!("{}", text),
            Err(e) => log::error!("Failed to serialize reading: {}", e),
        }
        return;
    }

    println!("{}", format_reading(reading, breaches));
    for breach in breaches {
        println!("    {}", format_breach(breach));
    }
}
