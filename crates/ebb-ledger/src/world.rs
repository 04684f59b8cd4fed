//! Cross-account record of how much was minted at each block.
//!
//! Increment-only: mints add, nothing subtracts. That makes the sum over the
//! live block range an upper bound on live supply (burns and expiry of
//! transferred slices are not reflected), which is enough to answer
//! "could anything still be live" without visiting accounts.

use std::collections::BTreeMap;

use ebb_core::error::LedgerError;
use ebb_core::types::{Amount, BlockHeight};
use ebb_core::window::EpochClock;

#[derive(Clone, Debug, Default)]
pub struct WorldAggregate {
    minted: BTreeMap<BlockHeight, Amount>,
    total_minted: Amount,
}

impl WorldAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `amount` minted at `block`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::BalanceOverflow`] if the lifetime mint total would
    ///   overflow. Because every account balance is carved out of minted
    ///   supply, this bound keeps every balance sum in range.
    pub fn add(&mut self, block: BlockHeight, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let total = self
            .total_minted
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        let at_block = self.minted_at(block) + amount; // <= total
        self.minted.insert(block, at_block);
        self.total_minted = total;
        Ok(())
    }

    /// Whether `amount` more can be minted without overflowing the total.
    pub fn can_add(&self, amount: Amount) -> bool {
        self.total_minted.checked_add(amount).is_some()
    }

    pub fn minted_at(&self, block: BlockHeight) -> Amount {
        self.minted.get(&block).copied().unwrap_or(0)
    }

    /// Sum minted over `first..=last`.
    pub fn minted_between(&self, first: BlockHeight, last: BlockHeight) -> Amount {
        if first > last {
            return 0;
        }
        self.minted.range(first..=last).map(|(_, &amount)| amount).sum()
    }

    /// Everything ever minted.
    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }

    /// Number of blocks with a mint recorded.
    pub fn block_count(&self) -> usize {
        self.minted.len()
    }

    /// Whether any block inside the live range at `height` saw a mint.
    pub fn has_unexpired_supply(&self, clock: &EpochClock, height: BlockHeight) -> bool {
        let earliest = clock.earliest_unexpired_block(height);
        self.minted.range(earliest..=height).next().is_some()
    }

    /// Upper bound on supply still live at `height`.
    pub fn unexpired_supply_upper_bound(&self, clock: &EpochClock, height: BlockHeight) -> Amount {
        self.minted_between(clock.earliest_unexpired_block(height), height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::window::WindowConfig;

    fn clock() -> EpochClock {
        WindowConfig::with_blocks_per_epoch(0, 4, 2).unwrap().clock()
    }

    #[test]
    fn add_accumulates_per_block() {
        let mut w = WorldAggregate::new();
        w.add(5, 10).unwrap();
        w.add(5, 5).unwrap();
        w.add(9, 1).unwrap();
        assert_eq!(w.minted_at(5), 15);
        assert_eq!(w.minted_at(6), 0);
        assert_eq!(w.total_minted(), 16);
        assert_eq!(w.block_count(), 2);
    }

    #[test]
    fn add_zero_records_nothing() {
        let mut w = WorldAggregate::new();
        w.add(5, 0).unwrap();
        assert_eq!(w.block_count(), 0);
    }

    #[test]
    fn add_overflow_rejected_unchanged() {
        let mut w = WorldAggregate::new();
        w.add(1, Amount::MAX).unwrap();
        assert!(!w.can_add(1));
        assert_eq!(w.add(2, 1), Err(LedgerError::BalanceOverflow));
        assert_eq!(w.minted_at(2), 0);
        assert_eq!(w.total_minted(), Amount::MAX);
    }

    #[test]
    fn minted_between_inclusive() {
        let mut w = WorldAggregate::new();
        for (block, amount) in [(1, 1), (4, 2), (8, 4)] {
            w.add(block, amount).unwrap();
        }
        assert_eq!(w.minted_between(1, 8), 7);
        assert_eq!(w.minted_between(2, 7), 2);
        assert_eq!(w.minted_between(8, 1), 0);
    }

    #[test]
    fn unexpired_supply_tracks_lifetime() {
        let c = clock();
        let mut w = WorldAggregate::new();
        w.add(0, 1).unwrap();
        w.add(5, 2).unwrap();
        assert!(w.has_unexpired_supply(&c, 9));
        assert_eq!(w.unexpired_supply_upper_bound(&c, 9), 3);
        assert_eq!(w.unexpired_supply_upper_bound(&c, 13), 2);
        assert!(w.has_unexpired_supply(&c, 16));
        assert!(!w.has_unexpired_supply(&c, 17));
        assert_eq!(w.unexpired_supply_upper_bound(&c, 17), 0);
    }
}
