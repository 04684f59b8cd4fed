//! Token-facing surface over a [`Ledger`]: every call reads the host's
//! current height once and runs against it.
//!
//! [`SharedToken`] puts the token behind a `parking_lot::RwLock` so a
//! multi-threaded host keeps one-call-at-a-time semantics: mutations hold the
//! write lock for their whole duration and queries never see a half-applied
//! call.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use ebb_core::error::{EbbError, LedgerError};
use ebb_core::traits::{BlockHeightProvider, ExpiringBalances};
use ebb_core::types::{AccountId, Amount, BlockHeight, Epoch, EpochState};

use ebb_core::window::WindowConfig;

use crate::ledger::{Ledger, LedgerSettings};

/// Height counter advanced explicitly by the host (or a test).
///
/// Clones share the same counter.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(height: BlockHeight) -> Self {
        Self(Arc::new(AtomicU64::new(height)))
    }

    pub fn height(&self) -> BlockHeight {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, height: BlockHeight) {
        self.0.store(height, Ordering::SeqCst);
    }

    /// Move forward `blocks` and return the new height.
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        self.0.fetch_add(blocks, Ordering::SeqCst).saturating_add(blocks)
    }
}

impl BlockHeightProvider for ManualClock {
    fn current_block_height(&self) -> BlockHeight {
        self.height()
    }
}

/// An expirable token: a ledger plus the clock it is evaluated against.
#[derive(Debug)]
pub struct ExpirableToken<P> {
    ledger: Ledger,
    provider: P,
}

impl<P: BlockHeightProvider> ExpirableToken<P> {
    pub fn new(ledger: Ledger, provider: P) -> Self {
        Self { ledger, provider }
    }

    /// Validate a block-time configuration and start an empty token on it.
    ///
    /// # Errors
    ///
    /// - [`EbbError::Config`] if the block time or window size is rejected
    pub fn initialize(
        initial_block: BlockHeight,
        block_time_ms: u64,
        window_size: u8,
        permissive: bool,
        settings: LedgerSettings,
        provider: P,
    ) -> Result<Self, EbbError> {
        let config = WindowConfig::initialize(initial_block, block_time_ms, window_size, permissive)?;
        Ok(Self::new(Ledger::with_settings(config, settings), provider))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn height(&self) -> BlockHeight {
        self.provider.current_block_height()
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.ledger.unexpired_balance_of(account, self.height())
    }

    pub fn balance_of_at_epoch(&self, epoch: Epoch, account: &AccountId) -> Amount {
        self.ledger
            .unexpired_balance_of_at_epoch(epoch, account, self.height())
    }

    pub fn current_epoch(&self) -> Epoch {
        self.ledger.current_epoch(self.height())
    }

    pub fn window_range(&self) -> (Epoch, Epoch) {
        self.ledger.window_range(self.height())
    }

    pub fn epoch_state(&self, epoch: Epoch) -> EpochState {
        self.ledger.epoch_state(epoch, self.height())
    }

    /// Upper bound on supply still live now.
    pub fn unexpired_supply_upper_bound(&self) -> Amount {
        self.ledger
            .world()
            .unexpired_supply_upper_bound(self.ledger.clock(), self.height())
    }

    pub fn mint(&mut self, account: AccountId, amount: Amount) -> Result<(), LedgerError> {
        let height = self.height();
        self.ledger.mint(account, amount, height)
    }

    pub fn burn(&mut self, account: AccountId, amount: Amount) -> Result<(), LedgerError> {
        let height = self.height();
        self.ledger.burn(account, amount, height)
    }

    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let height = self.height();
        self.ledger.transfer(from, to, amount, height)
    }

    pub fn prune_expired(&mut self, account: &AccountId) -> Result<usize, LedgerError> {
        let height = self.height();
        self.ledger.prune_expired(account, height)
    }
}

/// Cloneable, thread-safe handle to an [`ExpirableToken`].
pub struct SharedToken<P> {
    inner: Arc<RwLock<ExpirableToken<P>>>,
}

impl<P> Clone for SharedToken<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: BlockHeightProvider> SharedToken<P> {
    pub fn new(token: ExpirableToken<P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.inner.read().balance_of(account)
    }

    pub fn balance_of_at_epoch(&self, epoch: Epoch, account: &AccountId) -> Amount {
        self.inner.read().balance_of_at_epoch(epoch, account)
    }

    pub fn current_epoch(&self) -> Epoch {
        self.inner.read().current_epoch()
    }

    pub fn mint(&self, account: AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.inner.write().mint(account, amount)
    }

    pub fn burn(&self, account: AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.inner.write().burn(account, amount)
    }

    pub fn transfer(&self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.inner.write().transfer(from, to, amount)
    }

    pub fn prune_expired(&self, account: &AccountId) -> Result<usize, LedgerError> {
        self.inner.write().prune_expired(account)
    }

    /// Run `f` against a consistent snapshot of the token.
    pub fn with_read<R>(&self, f: impl FnOnce(&ExpirableToken<P>) -> R) -> R {
        f(&self.inner.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::error::ConfigError;
    use std::thread;

    fn acct(seed: u8) -> AccountId {
        AccountId([seed; 20])
    }

    fn token(clock: &ManualClock) -> ExpirableToken<ManualClock> {
        let config = WindowConfig::with_blocks_per_epoch(0, 4, 2).unwrap();
        ExpirableToken::new(Ledger::new(config), clock.clone())
    }

    #[test]
    fn manual_clock_shared_between_clones() {
        let a = ManualClock::new(3);
        let b = a.clone();
        assert_eq!(b.advance(2), 5);
        assert_eq!(a.height(), 5);
        a.set(9);
        assert_eq!(b.current_block_height(), 9);
    }

    #[test]
    fn scenario_through_clock() {
        let clock = ManualClock::new(0);
        let mut t = token(&clock);
        t.mint(acct(1), 1).unwrap();
        clock.set(5);
        t.mint(acct(1), 2).unwrap();
        clock.set(9);
        t.mint(acct(1), 3).unwrap();
        assert_eq!(t.balance_of(&acct(1)), 6);
        assert_eq!(t.window_range(), (0, 2));
        clock.set(13);
        assert_eq!(t.current_epoch(), 3);
        assert_eq!(t.balance_of(&acct(1)), 5);
        assert_eq!(t.balance_of_at_epoch(0, &acct(1)), 0);
        assert_eq!(t.balance_of_at_epoch(1, &acct(1)), 2);
        assert_eq!(t.epoch_state(0), EpochState::Expiring);
        assert_eq!(t.unexpired_supply_upper_bound(), 5);
    }

    #[test]
    fn transfer_and_burn_use_current_height() {
        let clock = ManualClock::new(1);
        let mut t = token(&clock);
        t.mint(acct(1), 10).unwrap();
        clock.advance(3);
        t.transfer(acct(1), acct(2), 4).unwrap();
        t.burn(acct(2), 1).unwrap();
        assert_eq!(t.balance_of(&acct(1)), 6);
        assert_eq!(t.balance_of(&acct(2)), 3);
        assert_eq!(t.ledger().latest_height(), Some(4));
    }

    #[test]
    fn clock_going_backwards_rejects_mutation() {
        let clock = ManualClock::new(10);
        let mut t = token(&clock);
        t.mint(acct(1), 1).unwrap();
        clock.set(8);
        assert_eq!(
            t.mint(acct(1), 1),
            Err(LedgerError::StaleHeight {
                height: 8,
                latest: 10
            })
        );
    }

    #[test]
    fn prune_through_token() {
        let clock = ManualClock::new(0);
        let mut t = token(&clock);
        t.mint(acct(1), 1).unwrap();
        clock.set(40);
        assert_eq!(t.prune_expired(&acct(1)).unwrap(), 1);
        assert_eq!(t.balance_of(&acct(1)), 0);
    }

    #[test]
    fn initialize_from_block_time() {
        let clock = ManualClock::new(1);
        let t = ExpirableToken::initialize(0, 12_000, 4, false, LedgerSettings::default(), clock.clone())
            .unwrap();
        assert_eq!(t.ledger().clock().config().blocks_per_epoch(), 657_435);
        assert_eq!(t.current_epoch(), 0);

        let err = ExpirableToken::initialize(0, 1, 4, false, LedgerSettings::default(), clock)
            .unwrap_err();
        assert!(matches!(err, EbbError::Config(ConfigError::InvalidBlockTime(1))));
    }

    #[test]
    fn closure_provider() {
        let config = WindowConfig::with_blocks_per_epoch(0, 4, 2).unwrap();
        let mut t = ExpirableToken::new(Ledger::new(config), || 7u64);
        t.mint(acct(1), 2).unwrap();
        assert_eq!(t.height(), 7);
        assert_eq!(t.balance_of(&acct(1)), 2);
    }

    #[test]
    fn shared_token_serializes_writers() {
        let clock = ManualClock::new(1);
        let shared = SharedToken::new(token(&clock));
        shared.mint(acct(0), 1_000).unwrap();

        let handles: Vec<_> = (1..=8u8)
            .map(|seed| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        shared.transfer(acct(0), acct(seed), 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.balance_of(&acct(0)), 800);
        let received: Amount = (1..=8u8).map(|s| shared.balance_of(&acct(s))).sum();
        assert_eq!(received, 200);
        assert!(shared.with_read(|t| t.ledger().is_consistent()));
    }

    #[test]
    fn shared_token_queries() {
        let clock = ManualClock::new(0);
        let shared = SharedToken::new(token(&clock));
        shared.mint(acct(1), 5).unwrap();
        shared.burn(acct(1), 2).unwrap();
        assert_eq!(shared.balance_of_at_epoch(0, &acct(1)), 3);
        assert_eq!(shared.current_epoch(), 0);
        assert_eq!(shared.prune_expired(&acct(1)).unwrap(), 0);
    }
}
