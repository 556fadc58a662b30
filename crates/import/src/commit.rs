//! Selection of the rows a reviewer approved, shaped for the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::{AccountId, CategoryId, Kind, LearnedRule, Money};

use crate::row::{CandidateRow, RowId};

/// Share of an expense carried by a shared-balance account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub account_id: AccountId,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub row: RowId,
    pub line: usize,
    pub kind: Kind,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category_id: Option<CategoryId>,
    pub allocation: Option<Allocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub records: Vec<NewRecord>,
    pub rules: Vec<LearnedRule>,
}

/// Unblocked, included and complete.
pub fn is_committable(row: &CandidateRow) -> bool {
    row.blocked.is_none() && row.include && !row.missing_required_data()
}

/// A split is valid when it parses, is positive and does not exceed the row amount.
pub fn parse_split(text: &str, amount: Money) -> Option<Money> {
    let split: Money = text.trim().parse().ok()?;
    (!split.is_negative() && !split.is_zero() && split <= amount).then_some(split)
}

impl CommitPlan {
    pub fn build(rows: &[CandidateRow]) -> Self {
        let mut plan = CommitPlan::default();
        for row in rows.iter().filter(|r| is_committable(r)) {
            let Some(date) = row.date else {
                continue;
            };
            let category_id = match row.kind {
                Kind::Expense => row.category.as_ref().map(|c| c.id),
                Kind::Income => None,
            };
            let allocation = match (row.kind, row.account) {
                (Kind::Expense, Some(account_id)) => {
                    parse_split(&row.split_amount, row.amount).map(|amount| Allocation { account_id, amount })
                }
                _ => None,
            };
            plan.records.push(NewRecord {
                row: row.id,
                line: row.line,
                kind: row.kind,
                date,
                description: row.merchant.clone(),
                amount: row.amount,
                category_id,
                allocation,
            });

            if row.remember {
                plan.remember(&row.merchant_key, &row.merchant, category_id);
                if row.description_key != row.merchant_key {
                    plan.remember(&row.description_key, &row.merchant, category_id);
                }
            }
        }
        plan
    }

    fn remember(&mut self, key: &str, display_name: &str, category_id: Option<CategoryId>) {
        if key.is_empty() {
            return;
        }
        let rule = LearnedRule {
            merchant_key: key.to_string(),
            display_name: Some(display_name.to_string()),
            category_id,
        };
        match self.rules.iter_mut().find(|r| r.merchant_key == key) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.rules.is_empty()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }
}
