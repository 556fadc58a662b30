//! Turns a parsed table into classified candidate rows.

use serde::{Deserialize, Serialize};
use tally_core::{Account, Category, ExistingRecords, Kind, LearnedRules, Money};
use tracing::{debug, info};

use crate::category_match::CategoryMatcher;
use crate::fields::{resolve_row, ColumnLayout};
use crate::kind::resolve_kind;
use crate::merchant::{display_name, normalize_key};
use crate::row::{Bucket, CandidateRow, RawFields, RowId};
use crate::table::ParsedTable;

/// Everything the mapper and the review session read from the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportContext {
    pub categories: Vec<Category>,
    pub accounts: Vec<Account>,
    pub existing: ExistingRecords,
    pub learned_rules: LearnedRules,
}

impl ImportContext {
    pub fn category(&self, id: tally_core::CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn has_account(&self, id: tally_core::AccountId) -> bool {
        self.accounts.iter().any(|a| a.id == id)
    }
}

pub struct RowMapper<'a> {
    ctx: &'a ImportContext,
    matcher: CategoryMatcher<'a>,
    next_id: u64,
}

impl<'a> RowMapper<'a> {
    pub fn new(ctx: &'a ImportContext) -> Self {
        Self {
            ctx,
            matcher: CategoryMatcher::new(&ctx.categories),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn map_row(&mut self, layout: &ColumnLayout, line: usize, cells: &[String]) -> CandidateRow {
        let fields = resolve_row(layout, cells);
        let kind = resolve_kind(
            &fields.type_text,
            fields.amount,
            &fields.description,
            &fields.category_text,
        );

        let merchant_key = normalize_key(&fields.merchant);
        let description_key = normalize_key(&fields.description);
        let rule = self.ctx.learned_rules.lookup(&merchant_key, &description_key);
        if let Some(rule) = rule {
            debug!(line, key = %rule.merchant_key, "learned rule applies");
        }

        let merchant = rule
            .and_then(|r| r.display_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| display_name(&fields.merchant));

        let csv_category = Some(fields.category_text.as_str()).filter(|c| !c.is_empty());
        let suggestion = self.matcher.suggest(csv_category, &merchant, rule);

        let date = fields.date();
        // A row without a usable date and amount is kept, at zero, for the reviewer to fix.
        let amount = match (date, fields.amount) {
            (Some(_), Some(amount)) => amount.abs(),
            _ => Money::zero(),
        };

        let category = match kind {
            Kind::Expense => suggestion.category.clone(),
            Kind::Income => None,
        };

        let mut row = CandidateRow {
            id: self.allocate_id(),
            line,
            raw: RawFields {
                date: fields.date_text.clone(),
                description: fields.description.clone(),
                merchant: fields.merchant.clone(),
                amount: fields.amount_text.clone(),
                category: fields.category_text.clone(),
            },
            merchant_key,
            description_key,
            date,
            merchant,
            amount,
            kind,
            suggestion,
            category,
            account: None,
            split_amount: String::new(),
            remember: false,
            blocked: None,
            include: false,
            duplicate: false,
            bucket: Bucket::NeedsMoreData,
        };
        row.refresh(&self.ctx.existing);
        row
    }

    pub fn map_table(&mut self, table: &ParsedTable) -> Vec<CandidateRow> {
        let layout = ColumnLayout::detect(&table.headers);
        debug!(?layout, "column layout");

        let rows: Vec<CandidateRow> = table
            .rows
            .iter()
            .enumerate()
            .map(|(index, cells)| self.map_row(&layout, table.source_line(index), cells))
            .collect();

        info!(
            rows = rows.len(),
            ready = rows.iter().filter(|r| r.bucket == Bucket::Ready).count(),
            duplicates = rows.iter().filter(|r| r.duplicate).count(),
            "mapped import table"
        );
        rows
    }
}

/// Maps a whole table with a fresh mapper.
pub fn map_table(table: &ParsedTable, ctx: &ImportContext) -> Vec<CandidateRow> {
    RowMapper::new(ctx).map_table(table)
}
