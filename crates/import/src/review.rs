//! Reviewer edits over a mapped import.
//!
//! A [`ReviewSession`] owns the candidate rows and the ledger snapshot they
//! were classified against. Every edit goes through [`ReviewSession::apply`],
//! which re-derives the duplicate hint and bucket so a row can never become
//! includable while it is blocked or missing data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::{AccountId, CategoryId, Kind, Money};
use thiserror::Error;
use tracing::{debug, info};

use crate::commit::CommitPlan;
use crate::mapper::{map_table, ImportContext};
use crate::merchant::normalize_key;
use crate::mode::WorkflowMode;
use crate::row::{Bucket, CandidateRow, RowId};
use crate::table::ParsedTable;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("No row with id {0}")]
    UnknownRow(RowId),

    #[error("No category with id {0}")]
    UnknownCategory(CategoryId),

    #[error("No account with id {0}")]
    UnknownAccount(AccountId),
}

/// One reviewer action against a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "edit", content = "value")]
pub enum RowEdit {
    Date(Option<NaiveDate>),
    Merchant(String),
    Amount(Money),
    Category(Option<CategoryId>),
    Kind(Kind),
    Account(Option<AccountId>),
    SplitAmount(String),
    ToggleInclude,
    ToggleRemember,
}

pub struct ReviewSession {
    ctx: ImportContext,
    mode: WorkflowMode,
    rows: Vec<CandidateRow>,
}

fn find_row(rows: &mut [CandidateRow], id: RowId) -> Result<&mut CandidateRow, ReviewError> {
    rows.iter_mut()
        .find(|r| r.id == id)
        .ok_or(ReviewError::UnknownRow(id))
}

impl ReviewSession {
    /// Maps `table` against `ctx` and applies the workflow mode.
    pub fn start(table: &ParsedTable, ctx: ImportContext, mode: WorkflowMode) -> Self {
        let rows = map_table(table, &ctx);
        Self::from_rows(ctx, rows, mode)
    }

    /// Adopts rows mapped elsewhere. Every row is blocked per `mode` and then
    /// re-derived against `ctx`, so caller-set flags never survive.
    pub fn from_rows(ctx: ImportContext, mut rows: Vec<CandidateRow>, mode: WorkflowMode) -> Self {
        rows.sort_by_key(|r| r.line);
        let mut session = Self { ctx, mode, rows };
        session.apply_mode();
        for row in &mut session.rows {
            row.refresh(&session.ctx.existing);
        }
        session
    }

    fn apply_mode(&mut self) {
        let blocked = self
            .rows
            .iter_mut()
            .map(|row| {
                self.mode.apply(row);
                row.is_blocked()
            })
            .filter(|b| *b)
            .count();
        if blocked > 0 {
            info!(mode = %self.mode, blocked, "rows blocked by workflow mode");
        }
    }

    /// All rows in source-line order.
    pub fn rows(&self) -> &[CandidateRow] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&CandidateRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Rows tagged `bucket`, stably ordered by source line.
    pub fn bucket_rows(&self, bucket: Bucket) -> Vec<&CandidateRow> {
        let mut rows: Vec<&CandidateRow> = self.rows.iter().filter(|r| r.bucket == bucket).collect();
        rows.sort_by_key(|r| r.line);
        rows
    }

    pub fn bucket_counts(&self) -> Vec<(Bucket, usize)> {
        Bucket::ALL
            .iter()
            .map(|b| (*b, self.rows.iter().filter(|r| r.bucket == *b).count()))
            .collect()
    }

    pub fn included(&self) -> impl Iterator<Item = &CandidateRow> {
        self.rows.iter().filter(|r| r.include)
    }

    pub fn set_mode(&mut self, mode: WorkflowMode) {
        self.mode = mode;
        self.apply_mode();
    }

    /// Re-derives the duplicate hint and bucket with no other change.
    pub fn recompute(&mut self, id: RowId) -> Result<&CandidateRow, ReviewError> {
        let row = find_row(&mut self.rows, id)?;
        row.refresh(&self.ctx.existing);
        Ok(row)
    }

    /// Applies one edit and returns the updated row.
    pub fn apply(&mut self, id: RowId, edit: RowEdit) -> Result<&CandidateRow, ReviewError> {
        debug!(row = %id, ?edit, "applying edit");
        let row = find_row(&mut self.rows, id)?;

        match edit {
            RowEdit::Date(date) => {
                row.date = date;
                row.refresh(&self.ctx.existing);
            }
            RowEdit::Merchant(merchant) => {
                row.merchant = merchant.trim().to_string();
                row.merchant_key = normalize_key(&row.merchant);
                row.refresh(&self.ctx.existing);
            }
            RowEdit::Amount(amount) => {
                row.amount = amount.abs();
                row.refresh(&self.ctx.existing);
            }
            RowEdit::Category(category_id) => {
                if row.kind == Kind::Expense {
                    row.category = match category_id {
                        Some(id) => Some(
                            self.ctx
                                .category(id)
                                .cloned()
                                .ok_or(ReviewError::UnknownCategory(id))?,
                        ),
                        None => None,
                    };
                    row.refresh(&self.ctx.existing);
                }
            }
            RowEdit::Kind(kind) => {
                if row.kind != kind {
                    row.kind = kind;
                    match kind {
                        Kind::Income => {
                            row.category = None;
                            row.account = None;
                            row.split_amount.clear();
                        }
                        Kind::Expense => row.category = row.suggestion.category.clone(),
                    }
                }
                self.mode.apply(row);
                row.refresh(&self.ctx.existing);
            }
            RowEdit::Account(account_id) => {
                if row.kind == Kind::Expense {
                    if let Some(id) = account_id {
                        if !self.ctx.has_account(id) {
                            return Err(ReviewError::UnknownAccount(id));
                        }
                    }
                    row.account = account_id;
                }
            }
            RowEdit::SplitAmount(text) => {
                if row.kind == Kind::Expense {
                    row.split_amount = text.trim().to_string();
                }
            }
            RowEdit::ToggleInclude => {
                row.include = if row.is_blocked() || row.missing_required_data() {
                    false
                } else {
                    !row.include
                };
            }
            RowEdit::ToggleRemember => {
                if !row.is_blocked() {
                    row.remember = !row.remember;
                }
            }
        }
        Ok(row)
    }

    pub fn commit_plan(&self) -> CommitPlan {
        CommitPlan::build(&self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::INCOME_ONLY_BLOCK_REASON;
    use tally_core::{Account, Category};

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn session(mode: WorkflowMode) -> ReviewSession {
        let ctx = ImportContext {
            categories: vec![
                Category::new(1, "Coffee"),
                Category::new(2, "Groceries"),
                Category::new(3, "Dining"),
            ],
            accounts: vec![Account::new(7, "Roommate")],
            ..Default::default()
        };
        let table = ParsedTable::new(
            s(&["Date", "Description", "Amount", "Category", "Type"]),
            vec![
                s(&["2026-01-05", "STARBUCKS #123", "-4.75", "", "Purchase"]),
                s(&["2026-01-06", "CORNER MART", "-12.00", "Misc", "Purchase"]),
                s(&["2026-01-15", "ACME PAYROLL", "2500.00", "", "Payment"]),
            ],
        );
        ReviewSession::start(&table, ctx, mode)
    }

    // ── edits ──

    #[test]
    fn unknown_row_is_an_error() {
        let mut s = session(WorkflowMode::Full);
        assert_eq!(
            s.apply(RowId(99), RowEdit::ToggleInclude).unwrap_err(),
            ReviewError::UnknownRow(RowId(99))
        );
    }

    #[test]
    fn picking_a_category_makes_row_ready() {
        let mut s = session(WorkflowMode::Full);
        let row = s.row(RowId(2)).unwrap();
        assert_eq!(row.bucket, Bucket::NeedsMoreData);
        assert!(!row.include);

        let row = s.apply(RowId(2), RowEdit::Category(Some(CategoryId(2)))).unwrap();
        assert_eq!(row.bucket, Bucket::Ready);
        assert!(row.include);
    }

    #[test]
    fn unknown_category_rejected() {
        let mut s = session(WorkflowMode::Full);
        assert_eq!(
            s.apply(RowId(1), RowEdit::Category(Some(CategoryId(42)))).unwrap_err(),
            ReviewError::UnknownCategory(CategoryId(42))
        );
    }

    #[test]
    fn clearing_category_blocks_include_toggle() {
        let mut s = session(WorkflowMode::Full);
        let row = s.apply(RowId(1), RowEdit::Category(None)).unwrap();
        assert!(!row.include);
        assert!(row.missing_required_data());
        let row = s.apply(RowId(1), RowEdit::ToggleInclude).unwrap();
        assert!(!row.include);
    }

    #[test]
    fn toggle_include_flips_complete_rows() {
        let mut s = session(WorkflowMode::Full);
        assert!(s.row(RowId(1)).unwrap().include);
        assert!(!s.apply(RowId(1), RowEdit::ToggleInclude).unwrap().include);
        assert!(s.apply(RowId(1), RowEdit::ToggleInclude).unwrap().include);
    }

    #[test]
    fn blank_merchant_forces_exclusion() {
        let mut s = session(WorkflowMode::Full);
        let row = s.apply(RowId(3), RowEdit::Merchant("   ".into())).unwrap();
        assert!(!row.include);
        assert_eq!(row.bucket, Bucket::NeedsMoreData);
    }

    #[test]
    fn kind_switch_clears_and_reseeds_category() {
        let mut s = session(WorkflowMode::Full);
        s.apply(RowId(1), RowEdit::Account(Some(AccountId(7)))).unwrap();
        let row = s.apply(RowId(1), RowEdit::Kind(Kind::Income)).unwrap();
        assert!(row.category.is_none());
        assert!(row.account.is_none());
        assert_eq!(row.bucket, Bucket::Payment);

        let row = s.apply(RowId(1), RowEdit::Kind(Kind::Expense)).unwrap();
        assert_eq!(row.category.as_ref().map(|c| c.name.as_str()), Some("Coffee"));
        assert_eq!(row.bucket, Bucket::Ready);
    }

    #[test]
    fn unknown_account_rejected() {
        let mut s = session(WorkflowMode::Full);
        assert_eq!(
            s.apply(RowId(1), RowEdit::Account(Some(AccountId(8)))).unwrap_err(),
            ReviewError::UnknownAccount(AccountId(8))
        );
    }

    #[test]
    fn missing_date_moves_to_needs_more_data() {
        let mut s = session(WorkflowMode::Full);
        let row = s.apply(RowId(1), RowEdit::Date(None)).unwrap();
        assert_eq!(row.bucket, Bucket::NeedsMoreData);
        assert!(!row.include);
    }

    #[test]
    fn amount_edit_is_unsigned() {
        let mut s = session(WorkflowMode::Full);
        let row = s.apply(RowId(1), RowEdit::Amount(Money::from_cents(-500))).unwrap();
        assert_eq!(row.amount, Money::from_cents(500));
    }

    // ── workflow mode ──

    #[test]
    fn income_only_blocks_expenses() {
        let mut s = session(WorkflowMode::IncomeOnly);
        s.apply(RowId(1), RowEdit::ToggleRemember).unwrap();
        let row = s.row(RowId(1)).unwrap();
        assert_eq!(row.blocked.as_deref(), Some(INCOME_ONLY_BLOCK_REASON));
        assert!(!row.include);
        assert!(!row.remember);
        assert!(!s.apply(RowId(1), RowEdit::ToggleInclude).unwrap().include);
        assert!(s.row(RowId(3)).unwrap().blocked.is_none());
        assert!(s.row(RowId(3)).unwrap().include);
    }

    #[test]
    fn switching_mode_back_unblocks() {
        let mut s = session(WorkflowMode::Full);
        s.set_mode(WorkflowMode::IncomeOnly);
        assert!(!s.row(RowId(1)).unwrap().include);
        s.set_mode(WorkflowMode::Full);
        let row = s.row(RowId(1)).unwrap();
        assert!(row.blocked.is_none());
        assert!(row.include);
    }

    #[test]
    fn kind_edit_respects_mode() {
        let mut s = session(WorkflowMode::IncomeOnly);
        let row = s.apply(RowId(3), RowEdit::Kind(Kind::Expense)).unwrap();
        assert!(row.is_blocked());
        let row = s.apply(RowId(1), RowEdit::Kind(Kind::Income)).unwrap();
        assert!(!row.is_blocked());
        assert!(row.include);
    }

    // ── views ──

    #[test]
    fn bucket_views() {
        let s = session(WorkflowMode::Full);
        let ready: Vec<RowId> = s.bucket_rows(Bucket::Ready).iter().map(|r| r.id).collect();
        assert_eq!(ready, vec![RowId(1)]);
        let counts = s.bucket_counts();
        assert!(counts.contains(&(Bucket::Payment, 1)));
        assert!(counts.contains(&(Bucket::NeedsMoreData, 1)));
        assert_eq!(s.included().count(), 2);
    }

    #[test]
    fn recompute_is_stable() {
        let mut s = session(WorkflowMode::Full);
        let before = s.row(RowId(1)).unwrap().clone();
        let after = s.recompute(RowId(1)).unwrap();
        assert_eq!(before.bucket, after.bucket);
        assert_eq!(before.include, after.include);
    }

    // ── commit ──

    #[test]
    fn commit_plan_takes_included_rows() {
        let mut s = session(WorkflowMode::Full);
        s.apply(RowId(1), RowEdit::ToggleRemember).unwrap();
        s.apply(RowId(1), RowEdit::Account(Some(AccountId(7)))).unwrap();
        s.apply(RowId(1), RowEdit::SplitAmount("2.00".into())).unwrap();

        let plan = s.commit_plan();
        assert_eq!(plan.records.len(), 2);
        assert_eq!(plan.count(Kind::Expense), 1);
        assert_eq!(plan.count(Kind::Income), 1);

        let coffee = &plan.records[0];
        assert_eq!(coffee.description, "Starbucks");
        assert_eq!(coffee.category_id, Some(CategoryId(1)));
        assert_eq!(
            coffee.allocation.as_ref().map(|a| (a.account_id, a.amount)),
            Some((AccountId(7), Money::from_cents(200)))
        );

        assert_eq!(plan.rules.len(), 1);
        assert_eq!(plan.rules[0].merchant_key, "starbucks");
        assert_eq!(plan.rules[0].display_name.as_deref(), Some("Starbucks"));
    }

    #[test]
    fn income_only_commit_skips_expenses() {
        let s = session(WorkflowMode::IncomeOnly);
        let plan = s.commit_plan();
        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.records[0].kind, Kind::Income);
    }

    // ── construction ──

    #[test]
    fn adopted_rows_are_rederived() {
        let ctx = ImportContext {
            categories: vec![Category::new(1, "Coffee"), Category::new(2, "Groceries")],
            ..Default::default()
        };
        let table = ParsedTable::new(
            s(&["Date", "Description", "Amount", "Category", "Type"]),
            vec![
                s(&["2026-01-06", "CORNER MART", "-12.00", "Misc", "Purchase"]),
                s(&["2026-01-05", "STARBUCKS #123", "-4.75", "", "Purchase"]),
            ],
        );
        let mut rows = map_table(&table, &ctx);
        for row in &mut rows {
            row.include = true;
            row.bucket = Bucket::Ready;
        }

        let s = ReviewSession::from_rows(ctx, rows, WorkflowMode::Full);
        let misc = s.row(RowId(1)).unwrap();
        assert!(misc.missing_required_data());
        assert!(!misc.include);
        assert_eq!(misc.bucket, Bucket::NeedsMoreData);
        let coffee = s.row(RowId(2)).unwrap();
        assert!(coffee.include);
        assert_eq!(coffee.bucket, Bucket::Ready);
        assert_eq!(s.rows()[0].id, RowId(1));
    }
}
