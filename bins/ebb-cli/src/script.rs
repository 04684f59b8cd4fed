//! JSON replay scripts: a list of ledger mutations and queries, each at an
//! explicit block height.
//!
//! ```json
//! { "steps": [
//!     { "op": "mint", "account": "0x01…", "amount": 5, "height": 0 },
//!     { "op": "balance", "account": "0x01…", "height": 9 }
//! ] }
//! ```
//!
//! Amounts are `u64` and deltas `i64` in scripts; they widen to the ledger's
//! 128-bit types when applied.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ebb_core::traits::ExpiringBalances;
use ebb_core::types::{AccountId, Amount, BlockHeight, Epoch};
use ebb_ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mint {
        account: AccountId,
        amount: u64,
        height: BlockHeight,
    },
    Burn {
        account: AccountId,
        amount: u64,
        height: BlockHeight,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: u64,
        height: BlockHeight,
    },
    /// Raw signed delta at `(epoch(height), height)`.
    Record {
        account: AccountId,
        delta: i64,
        height: BlockHeight,
    },
    /// Prune one account, or every account when `account` is omitted.
    Prune {
        #[serde(default)]
        account: Option<AccountId>,
        height: BlockHeight,
    },
    Balance {
        account: AccountId,
        height: BlockHeight,
    },
    BalanceAtEpoch {
        account: AccountId,
        epoch: Epoch,
        height: BlockHeight,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Step::Mint { .. } => "mint",
            Step::Burn { .. } => "burn",
            Step::Transfer { .. } => "transfer",
            Step::Record { .. } => "record",
            Step::Prune { .. } => "prune",
            Step::Balance { .. } => "balance",
            Step::BalanceAtEpoch { .. } => "balance_at_epoch",
        };
        write!(f, "{op} at height {}", self.height())
    }
}

impl Step {
    pub fn height(&self) -> BlockHeight {
        match *self {
            Step::Mint { height, .. }
            | Step::Burn { height, .. }
            | Step::Transfer { height, .. }
            | Step::Record { height, .. }
            | Step::Prune { height, .. }
            | Step::Balance { height, .. }
            | Step::BalanceAtEpoch { height, .. } => height,
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing script {}", path.display()))
    }
}

/// One answered query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub step: usize,
    pub account: AccountId,
    pub height: BlockHeight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Epoch>,
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub steps: usize,
    pub mutations: usize,
    pub pruned_entries: usize,
    pub latest_height: Option<BlockHeight>,
    pub total_minted: Amount,
    pub queries: Vec<QueryResult>,
}

/// Apply every step of `script` to `ledger` in order.
///
/// Stops at the first rejected mutation; steps before it stay applied.
pub fn replay(ledger: &mut Ledger, script: &Script) -> Result<ReplayReport> {
    let mut report = ReplayReport {
        steps: script.steps.len(),
        mutations: 0,
        pruned_entries: 0,
        latest_height: None,
        total_minted: 0,
        queries: Vec::new(),
    };

    for (index, step) in script.steps.iter().enumerate() {
        debug!(index, %step, "replaying step");
        let applied = match *step {
            Step::Mint {
                account,
                amount,
                height,
            } => ledger.mint(account, Amount::from(amount), height),
            Step::Burn {
                account,
                amount,
                height,
            } => ledger.burn(account, Amount::from(amount), height),
            Step::Transfer {
                from,
                to,
                amount,
                height,
            } => ledger.transfer(from, to, Amount::from(amount), height),
            Step::Record {
                account,
                delta,
                height,
            } => ledger.record(account, height, i128::from(delta)),
            Step::Prune { account, height } => {
                let removed = match account {
                    Some(account) => ledger.prune_expired(&account, height),
                    None => ledger.prune_all(height),
                };
                removed.map(|n| report.pruned_entries += n)
            }
            Step::Balance { account, height } => {
                report.queries.push(QueryResult {
                    step: index,
                    account,
                    height,
                    epoch: None,
                    balance: ledger.unexpired_balance_of(&account, height),
                });
                continue;
            }
            Step::BalanceAtEpoch {
                account,
                epoch,
                height,
            } => {
                report.queries.push(QueryResult {
                    step: index,
                    account,
                    height,
                    epoch: Some(epoch),
                    balance: ledger.unexpired_balance_of_at_epoch(epoch, &account, height),
                });
                continue;
            }
        };
        applied.with_context(|| format!("step {index} ({step}) rejected"))?;
        report.mutations += 1;
    }

    report.latest_height = ledger.latest_height();
    report.total_minted = ledger.world().total_minted();
    info!(
        steps = report.steps,
        mutations = report.mutations,
        queries = report.queries.len(),
        "replay complete"
    );
    Ok(report)
}
