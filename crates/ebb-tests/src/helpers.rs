//! Shared fixtures for property and scenario tests.

use ebb_core::types::{AccountId, Amount, BlockHeight};
use ebb_core::window::WindowConfig;
use ebb_ledger::Ledger;

/// Account id from a seed byte.
pub fn acct(seed: u8) -> AccountId {
    AccountId([seed; 20])
}

/// 4 blocks per epoch, window of 2, starting at block 0.
pub fn small_config() -> WindowConfig {
    WindowConfig::with_blocks_per_epoch(0, 4, 2).expect("valid config")
}

/// Empty ledger over [`small_config`].
pub fn small_ledger() -> Ledger {
    Ledger::new(small_config())
}

/// Mints of 1, 2 and 3 to `acct(1)` at blocks 0, 5 and 9.
pub fn scenario_ledger() -> Ledger {
    let mut ledger = small_ledger();
    for (height, amount) in [(0, 1), (5, 2), (9, 3)] {
        ledger
            .mint(acct(1), amount, height)
            .expect("scenario mint");
    }
    ledger
}

/// Sum of every entry of `account` minted at a block still live at `height`,
/// computed by brute force from the per-block balances.
pub fn brute_force_balance(ledger: &Ledger, account: &AccountId, height: BlockHeight) -> Amount {
    let clock = ebb_core::traits::ExpiringBalances::clock(ledger);
    ledger
        .epochs_of(account)
        .into_iter()
        .filter_map(|epoch| ledger.epoch_ledger(account, epoch))
        .flat_map(|epoch_ledger| {
            epoch_ledger
                .index()
                .iter()
                .map(|block| (block, epoch_ledger.balance_at(block)))
                .collect::<Vec<_>>()
        })
        .filter(|&(block, _)| clock.is_block_unexpired(block, height))
        .map(|(_, amount)| amount)
        .sum()
}
