//! # ebb-ledger — Sliding-window expiring balances.
//!
//! Balances are recorded against the block they were minted at and stop
//! counting once that block falls out of the epoch window:
//! - **Sorted block index**: each epoch keeps its blocks in ascending order
//!   so the expiring edge of the window can be walked from the oldest entry.
//! - **Epoch ledgers**: per-account, per-epoch totals plus per-block
//!   balances; fully-valid epochs are answered from the total alone.
//! - **World aggregate**: mints per block across all accounts, an upper
//!   bound on live supply.
//! - **Token surface**: a ledger bound to a block height provider, with a
//!   lock-guarded shared handle for multi-threaded hosts.

pub mod epoch_ledger;
pub mod ledger;
pub mod sorted_index;
pub mod token;
pub mod world;

pub use epoch_ledger::{EpochLedger, ZeroEntryPolicy};
pub use ledger::{Ledger, LedgerSettings};
pub use sorted_index::SortedBlockIndex;
pub use token::{ExpirableToken, ManualClock, SharedToken};
pub use world::WorldAggregate;
