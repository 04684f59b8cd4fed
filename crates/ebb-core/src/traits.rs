//! Trait seams between the engine and its host.
//!
//! - [`BlockHeightProvider`]: the host chain's monotonic height counter
//! - [`ExpiringBalances`]: read-only balance queries (ebb-ledger implements)

use crate::types::{AccountId, Amount, BlockHeight, Epoch, EpochState};
use crate::window::EpochClock;

/// Source of the current block height.
///
/// The engine never reads wall-clock time; every expiry decision is made
/// against the height this returns. Heights must not decrease.
pub trait BlockHeightProvider: Send + Sync {
    fn current_block_height(&self) -> BlockHeight;
}

impl<F> BlockHeightProvider for F
where
    F: Fn() -> BlockHeight + Send + Sync,
{
    fn current_block_height(&self) -> BlockHeight {
        self()
    }
}

/// Read-only view of window-limited balances.
///
/// Queries are evaluated lazily at the height given; nothing is pruned or
/// cached as a side effect.
pub trait ExpiringBalances: Send + Sync {
    /// Clock used to place heights into epochs.
    fn clock(&self) -> &EpochClock;

    /// Sum of the account's entries still live at `height`.
    fn unexpired_balance_of(&self, account: &AccountId, height: BlockHeight) -> Amount;

    /// Live part of the account's balance recorded in `epoch`, as seen at `height`.
    ///
    /// Zero for future and expired epochs.
    fn unexpired_balance_of_at_epoch(
        &self,
        epoch: Epoch,
        account: &AccountId,
        height: BlockHeight,
    ) -> Amount;

    /// Epoch containing `height`.
    ///
    /// Default implementation delegates to the clock.
    fn current_epoch(&self, height: BlockHeight) -> Epoch {
        self.clock().epoch(height)
    }

    /// Inclusive `(from, to)` epoch window at `height`.
    fn window_range(&self, height: BlockHeight) -> (Epoch, Epoch) {
        self.clock().window_range(height)
    }

    /// Expiry status of `epoch` at `height`.
    fn epoch_state(&self, epoch: Epoch, height: BlockHeight) -> EpochState {
        self.clock().epoch_state(epoch, height)
    }
}
