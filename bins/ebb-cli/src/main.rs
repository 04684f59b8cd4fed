//! ebb-cli — Command-line driver for the Ebb expiring balance engine.
//!
//! Inspects the epoch window at a given height and replays JSON scripts of
//! mints, burns, transfers and queries against an in-memory ledger. Results
//! go to stdout as JSON; logs go to stderr.

mod script;
mod settings;
mod window;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ebb_ledger::{Ledger, ZeroEntryPolicy};
use tracing::info;

use crate::script::Script;
use crate::settings::EngineSettings;
use crate::window::WindowReport;

/// Ebb command-line driver.
#[derive(Parser, Debug)]
#[command(name = "ebb-cli", version, about = "Sliding-window expiring balances")]
struct Cli {
    /// TOML settings file (`EBB_*` environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Height at which epoch counting starts
    #[arg(long, global = true)]
    initial_block: Option<u64>,

    /// Average block time in milliseconds
    #[arg(long, global = true)]
    block_time_ms: Option<u64>,

    /// Explicit epoch length in blocks (overrides --block-time-ms)
    #[arg(long, global = true)]
    blocks_per_epoch: Option<u64>,

    /// Trailing epochs kept in the window
    #[arg(long, global = true)]
    window_size: Option<u8>,

    /// Skip block time and window size range checks
    #[arg(long, global = true)]
    permissive: bool,

    /// Zero-balance entries: "retain" or "prune"
    #[arg(long, global = true, value_parser = parse_policy)]
    zero_entry_policy: Option<ZeroEntryPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print epoch and window ranges at a height.
    Window {
        #[arg(long)]
        height: u64,
    },
    /// Replay a JSON script against a fresh ledger.
    Replay {
        /// Path to the script file
        script: PathBuf,
    },
}

impl Cli {
    /// Apply command-line overrides on top of file and environment settings.
    fn apply_overrides(&self, settings: &mut EngineSettings) {
        if let Some(v) = self.initial_block {
            settings.initial_block = v;
        }
        if let Some(v) = self.block_time_ms {
            settings.block_time_ms = v;
        }
        if self.blocks_per_epoch.is_some() {
            settings.blocks_per_epoch = self.blocks_per_epoch;
        }
        if let Some(v) = self.window_size {
            settings.window_size = v;
        }
        if self.permissive {
            settings.permissive = true;
        }
        if let Some(v) = self.zero_entry_policy {
            settings.zero_entry_policy = v;
        }
        if let Some(v) = &self.log_level {
            settings.log_level = v.clone();
        }
        if let Some(v) = &self.log_format {
            settings.log_format = v.clone();
        }
    }
}

fn parse_policy(s: &str) -> Result<ZeroEntryPolicy, String> {
    match s {
        "retain" => Ok(ZeroEntryPolicy::Retain),
        "prune" => Ok(ZeroEntryPolicy::Prune),
        other => Err(format!("unknown zero entry policy '{other}'")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        EngineSettings::load(cli.config.as_deref()).context("loading engine settings")?;
    cli.apply_overrides(&mut settings);
    init_logging(&settings.log_level, &settings.log_format);

    let config = settings
        .window_config()
        .context("invalid window configuration")?;

    match cli.command {
        Commands::Window { height } => {
            let report = WindowReport::at(&config.clock(), height);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Replay { script } => {
            let parsed = Script::load(&script)?;
            info!(path = %script.display(), steps = parsed.steps.len(), "replaying script");
            let mut ledger = Ledger::with_settings(config, settings.ledger_settings());
            let report = script::replay(&mut ledger, &parsed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// Initialise the tracing subscriber on stderr.
///
/// `RUST_LOG` overrides `level_str` when set.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win() {
        let cli = Cli::parse_from([
            "ebb-cli",
            "--window-size",
            "3",
            "--blocks-per-epoch",
            "8",
            "--zero-entry-policy",
            "prune",
            "window",
            "--height",
            "20",
        ]);
        let mut settings = EngineSettings {
            window_size: 5,
            ..EngineSettings::default()
        };
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.window_size, 3);
        assert_eq!(settings.blocks_per_epoch, Some(8));
        assert_eq!(settings.zero_entry_policy, ZeroEntryPolicy::Prune);
        assert_eq!(settings.log_level, "info");
        assert!(matches!(cli.command, Commands::Window { height: 20 }));
    }

    #[test]
    fn absent_flags_keep_loaded_values() {
        let cli = Cli::parse_from(["ebb-cli", "replay", "script.json"]);
        let loaded = EngineSettings {
            initial_block: 7,
            permissive: true,
            ..EngineSettings::default()
        };
        let mut settings = loaded.clone();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings, loaded);
    }

    #[test]
    fn unknown_policy_rejected() {
        assert!(parse_policy("shred").is_err());
        assert!(
            Cli::try_parse_from(["ebb-cli", "--zero-entry-policy", "shred", "window", "--height", "1"])
                .is_err()
        );
    }
}
