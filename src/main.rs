use anyhow::Result;
use clap::{Arg, Command};

use envmon::commands;

fn main() -> Result<()> {
    envmon::init_logging();

    let matches = Command::new("envmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Environmental monitor for temperature, humidity and smoke sensors")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .help("Print version information")
                .action(clap::ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("monitor")
                .about("Sample the sensors and raise the alarm on out-of-range values")
                .arg(
                    Arg::new("simulate")
                        .long("simulate")
                        .help("Use simulated sensors instead of the configured devices")
                        .action(clap::ArgAction::SetTrue)
                )
                .arg(
                    Arg::new("duration")
                        .short('d')
                        .long("duration")
                        .value_name("SECS")
                        .help("Stop after this many seconds (default: run until Ctrl+C)")
                        .value_parser(clap::value_parser!(u64))
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print one JSON object per reading")
                        .action(clap::ArgAction::SetTrue)
                )
                .arg(
                    Arg::new("no-store")
                        .long("no-store")
                        .help("Do not save readings to the database")
                        .action(clap::ArgAction::SetTrue)
                )
                .arg(
                    Arg::new("alarm-duration")
                        .long("alarm-duration")
                        .value_name("SECS")
                        .help("Seconds the alarm stays on before clearing itself")
                        .value_parser(clap::value_parser!(u64).range(1..))
                )
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("MS")
                        .help("Sampling interval in milliseconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                )
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or reset the configuration (use 'envmon config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("show")
                        .about("Print the effective configuration")
                )
                .subcommand(
                    Command::new("path")
                        .about("Print the configuration file location")
                )
                .subcommand(
                    Command::new("reset")
                        .about("Overwrite the configuration with defaults")
                )
        )
        .subcommand(
            Command::new("version")
                .about("Shows version information")
        )
        .get_matches();

    if matches.get_flag("version") {
        return commands::version();
    }

    match matches.subcommand() {
        Some(("monitor", sub_matches)) => {
            commands::monitor::execute(sub_matches)?;
        }
        Some(("config", sub_matches)) => {
            commands::config::execute(sub_matches)?;
        }
        Some(("version", _)) => {
            commands::version()?;
        }
        _ => {
            println!("envmon - environmental sensor monitor");
            println!("Use 'envmon --help' for more information.");
        }
    }

    Ok(())
}
