//! Engine constants. Block times are in milliseconds, windows in epochs.

/// Length of a year in milliseconds (365.2422 days).
pub const YEAR_IN_MILLISECONDS: u64 = 31_556_926_000;

/// Fastest accepted average block time.
pub const MIN_BLOCK_TIME_MS: u64 = 100;

/// Slowest accepted average block time (10 minutes).
pub const MAX_BLOCK_TIME_MS: u64 = 600_000;

/// Smallest accepted window, in trailing epochs.
pub const MIN_WINDOW_SIZE: u8 = 1;

/// Largest accepted window, in trailing epochs.
pub const MAX_WINDOW_SIZE: u8 = 32;

/// Right shift applied to blocks-per-year to get blocks-per-epoch.
///
/// `>> 2` makes an epoch one quarter of a year.
///
/// # Examples
///
/// ```
/// use ebb_core::constants::{EPOCH_SHIFT, YEAR_IN_MILLISECONDS};
/// let blocks_per_year = YEAR_IN_MILLISECONDS / 12_000;
/// assert_eq!(blocks_per_year >> EPOCH_SHIFT, 657_435);
/// ```
pub const EPOCH_SHIFT: u32 = 2;

/// Block time assumed when nothing else is configured (Ethereum slot time).
pub const DEFAULT_BLOCK_TIME_MS: u64 = 12_000;

/// Window size assumed when nothing else is configured (one year of quarters).
pub const DEFAULT_WINDOW_SIZE: u8 = 4;
