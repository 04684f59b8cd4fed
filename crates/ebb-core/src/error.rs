//! Error types for the Ebb engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid block time: {0} ms")] InvalidBlockTime(u64),
    #[error("invalid window size: {0}")] InvalidWindowSize(u8),
    #[error("blocks per epoch must be non-zero")] InvalidBlocksPerEpoch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("balance overflow")] BalanceOverflow,
    #[error("stale height {height}: latest mutation at {latest}")] StaleHeight { height: u64, latest: u64 },
    #[error("zero amount")] ZeroAmount,
}

#[derive(Error, Debug)]
pub enum EbbError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] AccountId(#[from] AccountIdError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: {0} bytes, expected 20")] InvalidLength(usize),
}
