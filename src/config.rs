//! Configuration and command-line argument parsing

use std::env;

use crate::sanity::SanityConfig;
use crate::trail::TrailConfig;

#[derive(Debug, Clone)]
pub struct Config {
    // Input
    pub filename: Option<String>,

    // Tracking
    pub sanity: SanityConfig,
    pub trail: TrailConfig,
    /// Seconds of history kept on the short trail
    pub short_trail_secs: i64,

    // Output
    pub snapshot_interval_ms: u64,
    /// Print the final sync payload as JSON
    pub json: bool,
    pub stats: bool,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filename: None,
            sanity: SanityConfig::default(),
            trail: TrailConfig::default(),
            short_trail_secs: 30,
            snapshot_interval_ms: 1000,
            json: false,
            stats: false,
            verbose: false,
        }
    }
}

impl Config {
    pub fn from_args() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match Self::parse(&args) {
            Ok(config) => config,
            Err(ArgsError::Help) => {
                print_help();
                std::process::exit(0);
            }
            Err(ArgsError::Unknown(arg)) => {
                eprintln!("Unknown option: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
    }

    fn parse(args: &[String]) -> Result<Self, ArgsError> {
        let mut config = Config::default();
        let defaults = Config::default();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--ifile" => {
                    i += 1;
                    config.filename = args.get(i).cloned();
                }
                "--short-trail-secs" => {
                    i += 1;
                    config.short_trail_secs = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.short_trail_secs);
                }
                "--max-vertical-rate" => {
                    i += 1;
                    config.sanity.max_vertical_rate_fps = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.sanity.max_vertical_rate_fps);
                }
                "--max-ground-speed" => {
                    i += 1;
                    let knots = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.sanity.max_ground_speed_knots);
                    config.sanity.max_ground_speed_knots = knots;
                    config.trail.max_ground_speed_knots = knots;
                }
                "--min-certain-run" => {
                    i += 1;
                    config.sanity.min_certain_run = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.sanity.min_certain_run);
                }
                "--heading-tolerance" => {
                    i += 1;
                    config.trail.heading_tolerance_deg = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.trail.heading_tolerance_deg);
                }
                "--snapshot-interval-ms" => {
                    i += 1;
                    config.snapshot_interval_ms = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.snapshot_interval_ms);
                }
                "--json" => config.json = true,
                "--stats" => config.stats = true,
                "--verbose" => config.verbose = true,
                "--help" => return Err(ArgsError::Help),
                other => return Err(ArgsError::Unknown(other.to_string())),
            }
            i += 1;
        }

        Ok(config)
    }
}

#[derive(Debug, PartialEq)]
enum ArgsError {
    Help,
    Unknown(String),
}

fn print_help() {
    println!(
        r#"airtrack-rs - replay decoded aircraft reports through the tracking core

Usage: airtrack-rs [OPTIONS]

Options:
  --ifile <filename>          Read JSON-lines samples from file (use '-' for stdin)
  --short-trail-secs <s>      Seconds kept on the short trail (default: 30)
  --max-vertical-rate <fps>   Fastest plausible climb/descent in ft/s (default: 200)
  --max-ground-speed <kts>    Fastest plausible ground speed in knots (default: 1500)
  --min-certain-run <N>       Accepted samples before a value is certain (default: 2)
  --heading-tolerance <deg>   Heading change still treated as straight (default: 1.0)
  --snapshot-interval-ms <ms> Interval between reader snapshots (default: 1000)
  --json                      Print the final sync payload as JSON
  --stats                     Print processing stats at exit
  --verbose                   Log rejected samples and trail resets
  --help                      Show this help
"#
    );
}
