use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_core::Kind;

use crate::row::CandidateRow;

/// Shown on expense rows read during an income-only import.
pub const INCOME_ONLY_BLOCK_REASON: &str = "Expenses can't be imported in an income-only import";

/// Which kinds of rows the surrounding import workflow accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    #[default]
    Full,
    IncomeOnly,
}

impl WorkflowMode {
    pub fn block_reason(self, kind: Kind) -> Option<&'static str> {
        match (self, kind) {
            (WorkflowMode::IncomeOnly, Kind::Expense) => Some(INCOME_ONLY_BLOCK_REASON),
            _ => None,
        }
    }

    /// Sets or clears the row's blocked reason. Returns whether it changed.
    pub fn apply(self, row: &mut CandidateRow) -> bool {
        let reason = self.block_reason(row.kind).map(str::to_string);
        let changed = row.blocked != reason;
        row.blocked = reason;
        if row.is_blocked() {
            row.include = false;
            row.remember = false;
        } else if changed {
            row.assign_bucket();
        }
        changed
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowMode::Full => write!(f, "full"),
            WorkflowMode::IncomeOnly => write!(f, "income_only"),
        }
    }
}

impl FromStr for WorkflowMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "full" => Ok(WorkflowMode::Full),
            "income_only" => Ok(WorkflowMode::IncomeOnly),
            other => Err(format!("Unknown workflow mode: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_income_only_blocks_expenses() {
        assert_eq!(WorkflowMode::Full.block_reason(Kind::Expense), None);
        assert_eq!(WorkflowMode::IncomeOnly.block_reason(Kind::Income), None);
        assert_eq!(
            WorkflowMode::IncomeOnly.block_reason(Kind::Expense),
            Some(INCOME_ONLY_BLOCK_REASON)
        );
    }

    #[test]
    fn parse_accepts_dashes() {
        assert_eq!("income-only".parse::<WorkflowMode>().unwrap(), WorkflowMode::IncomeOnly);
        assert_eq!("Full".parse::<WorkflowMode>().unwrap(), WorkflowMode::Full);
        assert!("expenses".parse::<WorkflowMode>().is_err());
    }
}
