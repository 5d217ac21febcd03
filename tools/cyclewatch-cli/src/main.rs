//! CycleWatch CLI — Command-line interface for cycle-time measurement.
//!
//! Usage:
//!   cyclewatch measure <DETECTIONS>   Measure cycles from a detection stream
//!   cyclewatch report                 Regenerate CSV and report from the store
//!   cyclewatch validate               Validate a configuration file
//!   cyclewatch init                   Write a default configuration file
//!   cyclewatch info <DETECTIONS>      Show detection stream information

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cyclewatch_common::config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "cyclewatch",
    about = "Per-zone cycle-time measurement from object detections",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure cycles from a detection stream
    Measure {
        /// Detection stream (JSONL)
        detections: PathBuf,

        /// Configuration file (defaults to the standard location)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Processed video to cut longest-cycle clips from
        #[arg(long)]
        video: Option<PathBuf>,

        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Clear the cycle store before measuring
        #[arg(long)]
        fresh: bool,

        /// Target cycle time for every zone, in seconds
        #[arg(long)]
        target_secs: Option<f64>,
    },

    /// Regenerate the CSV export and performance report from the store
    Report {
        /// Configuration file (defaults to the standard location)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cycle store to read (defaults to the configured one)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file (defaults to the standard location)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Where to write the config (defaults to the standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show detection stream information
    Info {
        /// Detection stream (JSONL)
        detections: PathBuf,

        /// Configuration file used to name classes and zones
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// Config file named on the command line, if the command takes one.
    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Measure { config, .. }
            | Commands::Report { config, .. }
            | Commands::Validate { config }
            | Commands::Info { config, .. } => config.as_deref(),
            Commands::Init { .. } => None,
        }
    }
}

/// Logging section of the config the command will run with. An unreadable
/// config falls back to defaults; the command itself reports the error.
fn logging_config(config_path: Option<&Path>) -> LoggingConfig {
    match config_path {
        Some(path) => AppConfig::load_from(path)
            .map(|config| config.logging)
            .unwrap_or_default(),
        None => AppConfig::load().logging,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let logging = logging_config(cli.command.config_path()).with_verbose(cli.verbose);
    cyclewatch_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Measure {
            detections,
            config,
            video,
            output_dir,
            fresh,
            target_secs,
        } => {
            commands::measure::run(commands::measure::MeasureArgs {
                detections,
                config,
                video,
                output_dir,
                fresh,
                target_secs,
            })
            .await
        }
        Commands::Report {
            config,
            db,
            output_dir,
        } => commands::report::run(config, db, output_dir),
        Commands::Validate { config } => commands::validate::run(config),
        Commands::Init { output, force } => commands::init::run(output, force),
        Commands::Info { detections, config } => commands::info::run(detections, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_comes_from_named_config() {
        let dir = std::env::temp_dir().join("cyclewatch_test_cli_logging");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.logging.level = "warn".to_string();
        config.logging.json = true;
        config.logging.file = Some(dir.join("cyclewatch.log"));
        config.save_to(&path).unwrap();

        let cli = Cli::parse_from(["cyclewatch", "validate", "--config", path.to_str().unwrap()]);
        assert_eq!(cli.command.config_path(), Some(path.as_path()));

        let logging = logging_config(cli.command.config_path());
        assert_eq!(logging, config.logging);
        assert_eq!(logging.with_verbose(true).level, "debug");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unreadable_config_logs_with_defaults() {
        let missing = std::env::temp_dir().join("cyclewatch_test_cli_missing.json");
        let _ = std::fs::remove_file(&missing);
        assert_eq!(logging_config(Some(&missing)), LoggingConfig::default());
    }
}
