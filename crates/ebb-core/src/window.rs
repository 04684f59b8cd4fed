//! Epoch and window arithmetic over block heights.
//!
//! Time is approximated by block height: an epoch is a fixed run of
//! `blocks_per_epoch` blocks starting at `initial_block`, and the window is
//! the current epoch plus `window_size` trailing epochs. A balance entry
//! recorded at block `b` stays live at height `h` while
//! `h - b < blocks_in_window()`.
//!
//! Everything here is a pure function of the configuration and a height.

use serde::Serialize;
use tracing::info;

use crate::constants::{
    EPOCH_SHIFT, MAX_BLOCK_TIME_MS, MAX_WINDOW_SIZE, MIN_BLOCK_TIME_MS, MIN_WINDOW_SIZE,
    YEAR_IN_MILLISECONDS,
};
use crate::error::ConfigError;
use crate::types::{BlockHeight, Epoch, EpochState};

/// Validated epoch length and window size. Immutable once built.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    initial_block: BlockHeight,
    blocks_per_epoch: u64,
    window_size: u8,
}

impl WindowConfig {
    /// Build a configuration from an average block time.
    ///
    /// `blocks_per_epoch = (YEAR_IN_MILLISECONDS / block_time_ms) >> 2`, one
    /// quarter-year of blocks. Both the division and the shift truncate, so
    /// the epoch is up to a few blocks shorter than a true quarter; that is
    /// the accepted approximation error of measuring time in blocks.
    ///
    /// With `permissive` set the range checks on block time and window size
    /// are skipped (development chains), but a zero block time, a block time
    /// that yields zero blocks per epoch, or a zero window is still rejected.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidBlockTime`] for a block time outside
    ///   `[MIN_BLOCK_TIME_MS, MAX_BLOCK_TIME_MS]`
    /// - [`ConfigError::InvalidWindowSize`] for a window outside
    ///   `[MIN_WINDOW_SIZE, MAX_WINDOW_SIZE]`
    pub fn initialize(
        initial_block: BlockHeight,
        block_time_ms: u64,
        window_size: u8,
        permissive: bool,
    ) -> Result<Self, ConfigError> {
        if !permissive {
            if !(MIN_BLOCK_TIME_MS..=MAX_BLOCK_TIME_MS).contains(&block_time_ms) {
                return Err(ConfigError::InvalidBlockTime(block_time_ms));
            }
            if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&window_size) {
                return Err(ConfigError::InvalidWindowSize(window_size));
            }
        }
        if block_time_ms == 0 {
            return Err(ConfigError::InvalidBlockTime(block_time_ms));
        }
        if window_size == 0 {
            return Err(ConfigError::InvalidWindowSize(window_size));
        }

        let blocks_per_epoch = blocks_per_epoch_for(block_time_ms);
        if blocks_per_epoch == 0 {
            return Err(ConfigError::InvalidBlockTime(block_time_ms));
        }

        info!(
            initial_block,
            block_time_ms, blocks_per_epoch, window_size, permissive, "window configured"
        );

        Ok(Self {
            initial_block,
            blocks_per_epoch,
            window_size,
        })
    }

    /// Build a configuration from an explicit epoch length.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidBlocksPerEpoch`] if `blocks_per_epoch` is zero
    /// - [`ConfigError::InvalidWindowSize`] for a window outside
    ///   `[MIN_WINDOW_SIZE, MAX_WINDOW_SIZE]`
    pub fn with_blocks_per_epoch(
        initial_block: BlockHeight,
        blocks_per_epoch: u64,
        window_size: u8,
    ) -> Result<Self, ConfigError> {
        Self::from_epoch_length(initial_block, blocks_per_epoch, window_size, false)
    }

    /// [`with_blocks_per_epoch`](Self::with_blocks_per_epoch) with the same
    /// `permissive` switch as [`initialize`](Self::initialize): the window
    /// range check is skipped, a zero epoch length or window still fails.
    pub fn from_epoch_length(
        initial_block: BlockHeight,
        blocks_per_epoch: u64,
        window_size: u8,
        permissive: bool,
    ) -> Result<Self, ConfigError> {
        if blocks_per_epoch == 0 {
            return Err(ConfigError::InvalidBlocksPerEpoch);
        }
        let window_ok = if permissive {
            window_size > 0
        } else {
            (MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&window_size)
        };
        if !window_ok {
            return Err(ConfigError::InvalidWindowSize(window_size));
        }
        Ok(Self {
            initial_block,
            blocks_per_epoch,
            window_size,
        })
    }

    pub fn initial_block(&self) -> BlockHeight {
        self.initial_block
    }

    pub fn blocks_per_epoch(&self) -> u64 {
        self.blocks_per_epoch
    }

    pub fn window_size(&self) -> u8 {
        self.window_size
    }

    /// Clock over this configuration.
    pub fn clock(&self) -> EpochClock {
        EpochClock::new(*self)
    }
}

/// Blocks in one epoch for a given average block time.
///
/// # Examples
///
/// ```
/// use ebb_core::window::blocks_per_epoch_for;
/// assert_eq!(blocks_per_epoch_for(12_000), 657_435);
/// assert_eq!(blocks_per_epoch_for(0), 0);
/// ```
pub fn blocks_per_epoch_for(block_time_ms: u64) -> u64 {
    YEAR_IN_MILLISECONDS
        .checked_div(block_time_ms)
        .map_or(0, |blocks_per_year| blocks_per_year >> EPOCH_SHIFT)
}

/// Derives epochs and window ranges from block heights.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochClock {
    config: WindowConfig,
}

impl EpochClock {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Epoch containing `height`.
    ///
    /// Heights at or below `initial_block` map to epoch 0 ("not started").
    /// The division truncates, so an epoch only closes once
    /// `blocks_per_epoch` full blocks have elapsed.
    pub fn epoch(&self, height: BlockHeight) -> Epoch {
        if height > self.config.initial_block {
            (height - self.config.initial_block) / self.config.blocks_per_epoch
        } else {
            0
        }
    }

    /// Inclusive epoch range `(from, to)` of the window at `height`.
    pub fn window_range(&self, height: BlockHeight) -> (Epoch, Epoch) {
        let to = self.epoch(height);
        let window = Epoch::from(self.config.window_size);
        let from = if to >= window { to - window } else { 0 };
        (from, to)
    }

    /// Window range with the lower bound pushed one epoch further back.
    ///
    /// The extra epoch is the one straddling the block-level expiry edge.
    /// Anything that decides which data may be dropped must use this range;
    /// the plain range would drop entries that are still live.
    pub fn safe_window_range(&self, height: BlockHeight) -> (Epoch, Epoch) {
        let (mut from, to) = self.window_range(height);
        if to > Epoch::from(self.config.window_size) {
            from -= 1;
        }
        (from, to)
    }

    /// First height belonging to `epoch` (saturating).
    pub fn epoch_start(&self, epoch: Epoch) -> BlockHeight {
        epoch
            .saturating_mul(self.config.blocks_per_epoch)
            .saturating_add(self.config.initial_block)
    }

    /// Last height belonging to `epoch` (saturating).
    pub fn epoch_end(&self, epoch: Epoch) -> BlockHeight {
        self.epoch_start(epoch.saturating_add(1)).saturating_sub(1)
    }

    /// Lifetime of a balance entry, in blocks.
    pub fn blocks_in_window(&self) -> u64 {
        self.config
            .blocks_per_epoch
            .saturating_mul(u64::from(self.config.window_size) + 1)
    }

    /// Oldest block whose entries are still live at `height`.
    pub fn earliest_unexpired_block(&self, height: BlockHeight) -> BlockHeight {
        height.saturating_add(1).saturating_sub(self.blocks_in_window())
    }

    /// Whether an entry recorded at `block` is live at `height`.
    pub fn is_block_unexpired(&self, block: BlockHeight, height: BlockHeight) -> bool {
        block <= height && height - block < self.blocks_in_window()
    }

    /// Expiry status of `epoch` at `height`.
    pub fn epoch_state(&self, epoch: Epoch, height: BlockHeight) -> EpochState {
        let (from, to) = self.window_range(height);
        let (safe_from, _) = self.safe_window_range(height);
        if epoch > to {
            EpochState::Future
        } else if epoch >= from {
            // to - from <= window_size
            EpochState::Valid {
                age: (to - epoch) as u8,
            }
        } else if epoch == safe_from {
            EpochState::Expiring
        } else {
            EpochState::Expired
        }
    }
}
