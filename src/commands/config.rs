use crate::core::Config;
use anyhow::{Context, Result};
use colored::Colorize;

/// Handle 'config' subcommands
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(),
        Some(("path", _)) => path(),
        Some(("reset", _)) => reset(),
        _ => {
            println!("Use 'envmon config --help' for more information.");
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let config = Config::load()?;
    let data = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", data);

    if let Err(e) = config.validate() {
        println!("{}", format!("⚠️  Warning: {}", e).yellow());
    }
    Ok(())
}

fn path() -> Result<()> {
    let config_path = Config::get_config_path()?;
    println!("{}", "Configuration file:".white());
    println!("{}", config_path.display().to_string().cyan().bold());

    if !config_path.exists() {
        println!("{}", "(not created yet, defaults are in use)".dimmed());
    }
    Ok(())
}

fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!(
        "{} {}",
        "✓ Configuration reset to defaults:".green(),
        Config::get_config_path()?.display()
    );
    Ok(())
}
