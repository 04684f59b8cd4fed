//! Snapshot of the window arithmetic at one height.

use serde::Serialize;

use ebb_core::types::{BlockHeight, Epoch};
use ebb_core::window::{EpochClock, WindowConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    pub config: WindowConfig,
    pub height: BlockHeight,
    pub epoch: Epoch,
    pub window_range: (Epoch, Epoch),
    pub safe_window_range: (Epoch, Epoch),
    pub epoch_start: BlockHeight,
    pub epoch_end: BlockHeight,
    pub blocks_in_window: u64,
    pub earliest_unexpired_block: BlockHeight,
}

impl WindowReport {
    pub fn at(clock: &EpochClock, height: BlockHeight) -> Self {
        let epoch = clock.epoch(height);
        Self {
            config: *clock.config(),
            height,
            epoch,
            window_range: clock.window_range(height),
            safe_window_range: clock.safe_window_range(height),
            epoch_start: clock.epoch_start(epoch),
            epoch_end: clock.epoch_end(epoch),
            blocks_in_window: clock.blocks_in_window(),
            earliest_unexpired_block: clock.earliest_unexpired_block(height),
        }
    }
}
