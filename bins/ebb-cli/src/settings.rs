//! Engine settings for the CLI.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! `EBB_*` environment variables, then command-line flags (applied by the
//! caller on the loaded value).

use std::path::Path;

use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

use ebb_core::constants::{DEFAULT_BLOCK_TIME_MS, DEFAULT_WINDOW_SIZE};
use ebb_core::error::ConfigError;
use ebb_core::window::WindowConfig;
use ebb_ledger::{LedgerSettings, ZeroEntryPolicy};

/// Prefix for environment overrides, e.g. `EBB_WINDOW_SIZE=6`.
pub const ENV_PREFIX: &str = "EBB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Height at which epoch 0 ends its "not started" phase.
    pub initial_block: u64,
    /// Average block time used to derive the epoch length.
    pub block_time_ms: u64,
    /// Explicit epoch length; skips the block-time derivation when set.
    pub blocks_per_epoch: Option<u64>,
    /// Trailing epochs kept in the window.
    pub window_size: u8,
    /// Skip block-time and window range checks (development chains).
    pub permissive: bool,
    pub zero_entry_policy: ZeroEntryPolicy,
    /// Log level filter string (e.g. "info", "ebb_ledger=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_block: 0,
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            blocks_per_epoch: None,
            window_size: DEFAULT_WINDOW_SIZE,
            permissive: false,
            zero_entry_policy: ZeroEntryPolicy::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl EngineSettings {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading environment overrides from `env`
    /// instead of the process when provided.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    /// Validated window configuration for these settings.
    pub fn window_config(&self) -> Result<WindowConfig, ConfigError> {
        match self.blocks_per_epoch {
            Some(blocks_per_epoch) => WindowConfig::from_epoch_length(
                self.initial_block,
                blocks_per_epoch,
                self.window_size,
                self.permissive,
            ),
            None => WindowConfig::initialize(
                self.initial_block,
                self.block_time_ms,
                self.window_size,
                self.permissive,
            ),
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            zero_entry_policy: self.zero_entry_policy,
        }
    }
}
