//! Per-account, per-epoch balance ledger.
//!
//! Two levels: `total_balance` answers "how much did this epoch hold" in
//! O(1) for epochs wholly inside the window, and the per-block map plus its
//! [`SortedBlockIndex`] answers the exact partial sum for the one epoch that
//! straddles the expiry edge.
//!
//! Invariant after every successful call:
//! `total_balance == Σ block_balances[k]` and the index holds exactly the
//! keys of `block_balances`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use ebb_core::error::LedgerError;
use ebb_core::types::{Amount, BlockHeight};
use ebb_core::window::EpochClock;

use crate::sorted_index::SortedBlockIndex;

/// What happens to a block entry whose balance nets to zero.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ZeroEntryPolicy {
    /// Keep the key until an explicit prune. Cheap mutations; boundary walks
    /// grow with churn.
    #[default]
    Retain,
    /// Remove the key as soon as it reaches zero. Walks stay proportional to
    /// live entries.
    Prune,
}

/// Balance of one account inside one epoch.
#[derive(Clone, Debug, Default)]
pub struct EpochLedger {
    total_balance: Amount,
    block_balances: HashMap<BlockHeight, Amount>,
    index: SortedBlockIndex,
}

impl EpochLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of every entry in the epoch, live or not.
    pub fn total_balance(&self) -> Amount {
        self.total_balance
    }

    /// Balance recorded at `block` (0 if none).
    pub fn balance_at(&self, block: BlockHeight) -> Amount {
        self.block_balances.get(&block).copied().unwrap_or(0)
    }

    pub fn index(&self) -> &SortedBlockIndex {
        &self.index
    }

    /// Number of block entries, including retained zero entries.
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Add `amount` at `block`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::BalanceOverflow`] if the entry or the epoch total
    ///   would overflow; nothing is changed.
    pub fn credit(&mut self, block: BlockHeight, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self
            .balance_at(block)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        let total = self
            .total_balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        self.block_balances.insert(block, entry);
        self.index.insert(block);
        self.total_balance = total;
        Ok(())
    }

    /// Subtract `amount` at `block`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`] if the entry holds less than
    ///   `amount`; nothing is changed. Entries never go negative.
    pub fn debit(
        &mut self,
        block: BlockHeight,
        amount: Amount,
        policy: ZeroEntryPolicy,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let have = self.balance_at(block);
        let entry = have
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance { have, need: amount })?;
        // total >= entry by the additivity invariant
        let total = self
            .total_balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                have: self.total_balance,
                need: amount,
            })?;

        if entry == 0 && policy == ZeroEntryPolicy::Prune {
            self.block_balances.remove(&block);
            self.index.remove(block);
            trace!(block, "zero entry pruned");
        } else {
            self.block_balances.insert(block, entry);
        }
        self.total_balance = total;
        Ok(())
    }

    /// Apply a signed delta at `block`: credit when positive, debit when negative.
    pub fn apply(
        &mut self,
        block: BlockHeight,
        delta: i128,
        policy: ZeroEntryPolicy,
    ) -> Result<(), LedgerError> {
        let magnitude = delta.unsigned_abs();
        if delta >= 0 {
            self.credit(block, magnitude)
        } else {
            self.debit(block, magnitude, policy)
        }
    }

    /// First entry still live at `height`, walking from the head.
    pub fn first_live_block(&self, clock: &EpochClock, height: BlockHeight) -> Option<BlockHeight> {
        let earliest = clock.earliest_unexpired_block(height);
        self.index
            .iter()
            .take_while(|&block| block <= height)
            .find(|&block| block >= earliest)
    }

    /// Live `(block, balance)` entries at `height`, oldest first.
    ///
    /// Zero entries are skipped.
    pub fn live_entries(&self, clock: &EpochClock, height: BlockHeight) -> Vec<(BlockHeight, Amount)> {
        let Some(first) = self.first_live_block(clock, height) else {
            return Vec::new();
        };
        self.index
            .iter_from(first)
            .take_while(|&block| block <= height)
            .map(|block| (block, self.balance_at(block)))
            .filter(|&(_, balance)| balance > 0)
            .collect()
    }

    /// Sum of entries still live at `height`.
    ///
    /// One forward pass: expired entries are skipped from the head, then the
    /// walk sums until it passes `height`.
    pub fn live_balance(&self, clock: &EpochClock, height: BlockHeight) -> Amount {
        let Some(first) = self.first_live_block(clock, height) else {
            return 0;
        };
        // Bounded by the total, which fits.
        self.index
            .iter_from(first)
            .take_while(|&block| block <= height)
            .map(|block| self.balance_at(block))
            .fold(0, Amount::saturating_add)
    }

    /// Drop every entry older than `cutoff`, which must be a key in the
    /// index. Returns the number of entries removed.
    pub fn prune_before(&mut self, cutoff: BlockHeight) -> usize {
        let removed = self.index.shrink(cutoff);
        let mut dropped: Amount = 0;
        for block in &removed {
            if let Some(balance) = self.block_balances.remove(block) {
                dropped = dropped.saturating_add(balance);
            }
        }
        // total >= sum of removed entries
        self.total_balance = self.total_balance.saturating_sub(dropped);
        removed.len()
    }

    /// Whether the additivity invariant holds. Linear; for tests and audits.
    pub fn is_consistent(&self) -> bool {
        let keys = self.index.to_vec();
        if keys.len() != self.block_balances.len() {
            return false;
        }
        let mut sum: Amount = 0;
        for key in keys {
            let Some(&balance) = self.block_balances.get(&key) else {
                return false;
            };
            let Some(next) = sum.checked_add(balance) else {
                return false;
            };
            sum = next;
        }
        sum == self.total_balance
    }
}
