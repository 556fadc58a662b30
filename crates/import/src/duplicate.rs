//! Duplicate detection against the records already in the ledger.
//!
//! Expenses are compared against both plain and planned expenses inside a
//! ±3 day window; incomes only against incomes recorded on the same day.
//! Ambiguous evidence resolves to "not a duplicate" so distinct purchases
//! of the same amount are never hidden from the reviewer.

use chrono::NaiveDate;
use tally_core::{
    CategoryId, DateRange, ExistingExpense, ExistingIncome, ExistingRecords, Kind, Money,
    PlannedExpense,
};
use tracing::debug;

use crate::merchant::normalize_key;

pub const DATE_WINDOW_DAYS: i64 = 3;

/// The fields of a candidate row that duplicate detection looks at.
#[derive(Debug, Clone)]
pub struct DuplicateProbe<'a> {
    pub date: NaiveDate,
    pub amount: Money,
    pub merchant_key: &'a str,
    pub description_key: &'a str,
    pub category_id: Option<CategoryId>,
    pub kind: Kind,
}

impl DuplicateProbe<'_> {
    /// Merchant key first, then the description key.
    fn keys(&self) -> [&str; 2] {
        [self.merchant_key, self.description_key]
    }

    fn matches_key(&self, key: &str) -> bool {
        !key.is_empty() && self.keys().iter().any(|k| *k == key)
    }

    fn resembles(&self, title_key: &str) -> bool {
        !title_key.is_empty()
            && self
                .keys()
                .iter()
                .filter(|k| !k.is_empty())
                .any(|k| k.contains(title_key) || title_key.contains(*k))
    }
}

/// Common view over the two expense-like record types.
trait ExpenseLike {
    fn day(&self) -> NaiveDate;
    fn amount(&self) -> Money;
    fn category_id(&self) -> Option<CategoryId>;
    fn label(&self) -> &str;
}

impl ExpenseLike for ExistingExpense {
    fn day(&self) -> NaiveDate {
        self.date
    }
    fn amount(&self) -> Money {
        self.amount
    }
    fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }
    fn label(&self) -> &str {
        &self.description
    }
}

impl ExpenseLike for PlannedExpense {
    fn day(&self) -> NaiveDate {
        self.date
    }
    fn amount(&self) -> Money {
        self.effective_amount()
    }
    fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }
    fn label(&self) -> &str {
        &self.title
    }
}

fn windowed_match<T: ExpenseLike>(probe: &DuplicateProbe<'_>, records: &[T], title_fallback: bool) -> bool {
    let window = DateRange::around(probe.date, DATE_WINDOW_DAYS);
    let day_amount: Vec<(&T, String)> = records
        .iter()
        .filter(|r| window.contains(r.day()) && r.amount().approx_eq(probe.amount))
        .map(|r| (r, normalize_key(r.label())))
        .collect();

    if day_amount.iter().any(|(_, key)| probe.matches_key(key)) {
        return true;
    }
    match day_amount.len() {
        0 => return false,
        1 => return true,
        _ => {}
    }

    if let Some(category) = probe.category_id {
        let same_category = day_amount
            .iter()
            .filter(|(r, _)| r.category_id() == Some(category))
            .count();
        if same_category == 1 {
            return true;
        }
    }

    title_fallback
        && day_amount
            .iter()
            .filter(|(_, key)| probe.resembles(key))
            .count()
            == 1
}

pub fn is_duplicate_expense(probe: &DuplicateProbe<'_>, expenses: &[ExistingExpense]) -> bool {
    windowed_match(probe, expenses, false)
}

pub fn is_duplicate_planned(probe: &DuplicateProbe<'_>, planned: &[PlannedExpense]) -> bool {
    windowed_match(probe, planned, true)
}

/// Incomes need the same day, amount and source; there is no window.
pub fn is_duplicate_income(probe: &DuplicateProbe<'_>, incomes: &[ExistingIncome]) -> bool {
    incomes.iter().any(|income| {
        income.date == probe.date
            && income.amount.approx_eq(probe.amount)
            && probe.matches_key(&normalize_key(&income.source))
    })
}

/// Full check for one candidate, always recomputed from the whole snapshot.
pub fn is_duplicate(probe: &DuplicateProbe<'_>, existing: &ExistingRecords) -> bool {
    let duplicate = match probe.kind {
        Kind::Expense => {
            is_duplicate_expense(probe, &existing.expenses)
                || is_duplicate_planned(probe, &existing.planned_expenses)
        }
        Kind::Income => is_duplicate_income(probe, &existing.incomes),
    };
    if duplicate {
        debug!(
            date = %probe.date,
            amount = %probe.amount,
            merchant = probe.merchant_key,
            "candidate matches an existing record"
        );
    }
    duplicate
}
