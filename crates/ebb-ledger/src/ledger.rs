//! The expiring balance ledger: every account's epoch ledgers plus the
//! world aggregate, driven by explicit block heights.
//!
//! Each call runs to completion and either applies fully or leaves the
//! ledger untouched. Validation happens before the first write, so a
//! rejected call never leaves a partial mutation behind.
//!
//! Heights passed to mutations must not decrease; queries may use any height
//! but describe the current state, so asking about a height below the
//! latest mutation does not reconstruct history.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Included};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ebb_core::error::LedgerError;
use ebb_core::traits::ExpiringBalances;
use ebb_core::types::{AccountId, Amount, BlockHeight, Epoch, EpochState};
use ebb_core::window::{EpochClock, WindowConfig};

use crate::epoch_ledger::{EpochLedger, ZeroEntryPolicy};
use crate::world::WorldAggregate;

/// Tunables that do not affect window arithmetic.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerSettings {
    pub zero_entry_policy: ZeroEntryPolicy,
}

/// A slice of an account's balance chosen by a FIFO debit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slice {
    epoch: Epoch,
    block: BlockHeight,
    amount: Amount,
}

/// Window-limited balances for every account.
#[derive(Clone, Debug)]
pub struct Ledger {
    clock: EpochClock,
    settings: LedgerSettings,
    accounts: HashMap<AccountId, BTreeMap<Epoch, EpochLedger>>,
    world: WorldAggregate,
    latest_height: Option<BlockHeight>,
}

impl Ledger {
    pub fn new(config: WindowConfig) -> Self {
        Self::with_settings(config, LedgerSettings::default())
    }

    pub fn with_settings(config: WindowConfig, settings: LedgerSettings) -> Self {
        Self {
            clock: config.clock(),
            settings,
            accounts: HashMap::new(),
            world: WorldAggregate::new(),
            latest_height: None,
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn world(&self) -> &WorldAggregate {
        &self.world
    }

    /// Height of the most recent mutation or prune.
    pub fn latest_height(&self) -> Option<BlockHeight> {
        self.latest_height
    }

    /// Accounts with at least one epoch ledger.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts.keys()
    }

    pub fn epoch_ledger(&self, account: &AccountId, epoch: Epoch) -> Option<&EpochLedger> {
        self.accounts.get(account)?.get(&epoch)
    }

    /// Epochs holding an epoch ledger for `account`, ascending.
    pub fn epochs_of(&self, account: &AccountId) -> Vec<Epoch> {
        self.accounts
            .get(account)
            .map(|epochs| epochs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Apply a signed delta to `account` at `(epoch(height), height)`.
    ///
    /// Positive deltas are mints and also land in the world aggregate;
    /// negative deltas debit the entry at exactly `height`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::StaleHeight`] if `height` is below the latest mutation
    /// - [`LedgerError::InsufficientBalance`] if the entry would go negative
    /// - [`LedgerError::BalanceOverflow`] if a total would overflow
    pub fn record(
        &mut self,
        account: AccountId,
        height: BlockHeight,
        delta: i128,
    ) -> Result<(), LedgerError> {
        self.check_height(height)?;
        let result = if delta >= 0 {
            self.credit_minted(account, height, delta.unsigned_abs())
        } else {
            self.debit_at(account, height, delta.unsigned_abs())
        };
        result
            .inspect(|_| debug!(%account, height, delta, "recorded"))
            .inspect_err(|e| warn!(%account, height, delta, error = %e, "record rejected"))
    }

    /// Mint `amount` to `account` at `height`.
    pub fn mint(
        &mut self,
        account: AccountId,
        amount: Amount,
        height: BlockHeight,
    ) -> Result<(), LedgerError> {
        self.check_height(height)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.credit_minted(account, height, amount)
            .inspect(|_| debug!(%account, amount, height, "minted"))
            .inspect_err(|e| warn!(%account, amount, height, error = %e, "mint rejected"))
    }

    /// Destroy `amount` of `account`'s live balance, oldest entries first.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`] if the live balance is short
    pub fn burn(
        &mut self,
        account: AccountId,
        amount: Amount,
        height: BlockHeight,
    ) -> Result<(), LedgerError> {
        self.check_height(height)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let slices = self
            .fifo_slices(&account, amount, height)
            .inspect_err(|e| warn!(%account, amount, height, error = %e, "burn rejected"))?;
        for slice in &slices {
            self.debit_slice(&account, slice)?;
        }
        self.latest_height = Some(height);
        debug!(%account, amount, height, slices = slices.len(), "burned");
        Ok(())
    }

    /// Move `amount` of live balance from `from` to `to`, oldest first.
    ///
    /// Each moved slice keeps its original block, so the recipient's tokens
    /// expire when the sender's would have.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`] if `from`'s live balance is short
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        height: BlockHeight,
    ) -> Result<(), LedgerError> {
        self.check_height(height)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let slices = self
            .fifo_slices(&from, amount, height)
            .inspect_err(|e| warn!(%from, %to, amount, height, error = %e, "transfer rejected"))?;
        if from != to {
            for slice in &slices {
                self.debit_slice(&from, slice)?;
                // Cannot overflow: every balance is bounded by total minted.
                self.accounts
                    .entry(to)
                    .or_default()
                    .entry(slice.epoch)
                    .or_default()
                    .credit(slice.block, slice.amount)?;
            }
        }
        self.latest_height = Some(height);
        debug!(%from, %to, amount, height, slices = slices.len(), "transferred");
        Ok(())
    }

    /// Drop `account`'s data that can no longer affect any balance.
    ///
    /// Uses the safe window: epochs below its lower bound are removed, and
    /// the lower-bound epoch is shrunk to its first live entry. Queries give
    /// the same answers before and after. Returns the entries removed.
    pub fn prune_expired(
        &mut self,
        account: &AccountId,
        height: BlockHeight,
    ) -> Result<usize, LedgerError> {
        self.check_height(height)?;
        let removed = self.prune_account(account, height);
        self.latest_height = Some(height);
        if removed > 0 {
            info!(%account, height, removed, "pruned expired entries");
        }
        Ok(removed)
    }

    /// [`prune_expired`](Self::prune_expired) for every account.
    pub fn prune_all(&mut self, height: BlockHeight) -> Result<usize, LedgerError> {
        self.check_height(height)?;
        let accounts: Vec<AccountId> = self.accounts.keys().copied().collect();
        let removed: usize = accounts
            .iter()
            .map(|account| self.prune_account(account, height))
            .sum();
        self.latest_height = Some(height);
        info!(height, removed, accounts = accounts.len(), "pruned all accounts");
        Ok(removed)
    }

    /// Whether every epoch ledger satisfies the additivity invariant.
    pub fn is_consistent(&self) -> bool {
        self.accounts
            .values()
            .flat_map(|epochs| epochs.values())
            .all(EpochLedger::is_consistent)
    }

    fn check_height(&self, height: BlockHeight) -> Result<(), LedgerError> {
        match self.latest_height {
            Some(latest) if height < latest => Err(LedgerError::StaleHeight { height, latest }),
            _ => Ok(()),
        }
    }

    fn credit_minted(
        &mut self,
        account: AccountId,
        height: BlockHeight,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        if !self.world.can_add(amount) {
            return Err(LedgerError::BalanceOverflow);
        }
        let epoch = self.clock.epoch(height);
        self.accounts
            .entry(account)
            .or_default()
            .entry(epoch)
            .or_default()
            .credit(height, amount)?;
        self.world.add(height, amount)?;
        self.latest_height = Some(height);
        Ok(())
    }

    fn debit_at(
        &mut self,
        account: AccountId,
        height: BlockHeight,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let epoch = self.clock.epoch(height);
        let ledger = self
            .accounts
            .get_mut(&account)
            .and_then(|epochs| epochs.get_mut(&epoch))
            .ok_or(LedgerError::InsufficientBalance {
                have: 0,
                need: amount,
            })?;
        ledger.debit(height, amount, self.settings.zero_entry_policy)?;
        self.latest_height = Some(height);
        Ok(())
    }

    fn debit_slice(&mut self, account: &AccountId, slice: &Slice) -> Result<(), LedgerError> {
        let ledger = self
            .accounts
            .get_mut(account)
            .and_then(|epochs| epochs.get_mut(&slice.epoch))
            .ok_or(LedgerError::InsufficientBalance {
                have: 0,
                need: slice.amount,
            })?;
        ledger.debit(slice.block, slice.amount, self.settings.zero_entry_policy)
    }

    /// Live entries of `account` covering `amount`, oldest first.
    fn fifo_slices(
        &self,
        account: &AccountId,
        amount: Amount,
        height: BlockHeight,
    ) -> Result<Vec<Slice>, LedgerError> {
        let (from, to) = self.clock.safe_window_range(height);
        let mut remaining = amount;
        let mut slices = Vec::new();
        if let Some(epochs) = self.accounts.get(account) {
            'epochs: for (&epoch, ledger) in epochs.range(from..=to) {
                for (block, balance) in ledger.live_entries(&self.clock, height) {
                    let take = balance.min(remaining);
                    slices.push(Slice {
                        epoch,
                        block,
                        amount: take,
                    });
                    remaining -= take;
                    if remaining == 0 {
                        break 'epochs;
                    }
                }
            }
        }
        if remaining > 0 {
            return Err(LedgerError::InsufficientBalance {
                have: amount - remaining,
                need: amount,
            });
        }
        Ok(slices)
    }

    /// Balance of an epoch wholly inside the window at `height`.
    ///
    /// The total answers directly unless the epoch holds blocks recorded
    /// after `height` (a query below the latest mutation); those are cut off
    /// by walking.
    fn valid_epoch_balance(&self, ledger: &EpochLedger, height: BlockHeight) -> Amount {
        match ledger.index().tail() {
            Some(tail) if tail > height => ledger.live_balance(&self.clock, height),
            _ => ledger.total_balance(),
        }
    }

    fn prune_account(&mut self, account: &AccountId, height: BlockHeight) -> usize {
        let (from, _) = self.clock.safe_window_range(height);
        let Some(epochs) = self.accounts.get_mut(account) else {
            return 0;
        };

        let mut removed = 0;
        let live = epochs.split_off(&from);
        for (_, expired) in std::mem::replace(epochs, live) {
            removed += expired.entry_count();
        }

        let mut drop_boundary = false;
        if let Some(boundary) = epochs.get_mut(&from) {
            match boundary.first_live_block(&self.clock, height) {
                Some(first) => removed += boundary.prune_before(first),
                None => {
                    // Nothing live and nothing recorded after `height`.
                    if boundary.index().tail().is_none_or(|tail| tail <= height) {
                        removed += boundary.entry_count();
                        drop_boundary = true;
                    }
                }
            }
        }
        if drop_boundary {
            epochs.remove(&from);
        }
        if epochs.is_empty() {
            self.accounts.remove(account);
        }
        removed
    }
}

impl ExpiringBalances for Ledger {
    fn clock(&self) -> &EpochClock {
        &self.clock
    }

    /// Fully-valid epochs contribute their totals; the lower edge of the
    /// safe window is walked entry by entry.
    fn unexpired_balance_of(&self, account: &AccountId, height: BlockHeight) -> Amount {
        let Some(epochs) = self.accounts.get(account) else {
            return 0;
        };
        let (from, to) = self.clock.safe_window_range(height);
        let boundary = epochs
            .get(&from)
            .map_or(0, |ledger| ledger.live_balance(&self.clock, height));
        // Bounded by total minted, which fits.
        epochs
            .range((Excluded(from), Included(to)))
            .map(|(_, ledger)| self.valid_epoch_balance(ledger, height))
            .fold(boundary, Amount::saturating_add)
    }

    fn unexpired_balance_of_at_epoch(
        &self,
        epoch: Epoch,
        account: &AccountId,
        height: BlockHeight,
    ) -> Amount {
        let Some(ledger) = self.epoch_ledger(account, epoch) else {
            return 0;
        };
        let (from, _) = self.clock.safe_window_range(height);
        match self.clock.epoch_state(epoch, height) {
            EpochState::Future | EpochState::Expired => 0,
            _ if epoch == from => ledger.live_balance(&self.clock, height),
            EpochState::Valid { .. } | EpochState::Expiring => {
                self.valid_epoch_balance(ledger, height)
            }
        }
    }
}
