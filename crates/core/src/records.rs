use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::account::CategoryId;
use crate::money::Money;

/// An expense already recorded in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingExpense {
    pub date: NaiveDate,
    pub amount: Money,
    pub category_id: Option<CategoryId>,
    pub description: String,
}

/// A scheduled expense. Matching uses [`PlannedExpense::effective_amount`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedExpense {
    pub date: NaiveDate,
    pub planned_amount: Money,
    pub actual_amount: Money,
    pub category_id: Option<CategoryId>,
    pub title: String,
}

impl PlannedExpense {
    /// The actual amount once one has been entered, else the planned amount.
    pub fn effective_amount(&self) -> Money {
        if self.actual_amount.as_decimal().is_sign_positive() && !self.actual_amount.is_zero() {
            self.actual_amount
        } else {
            self.planned_amount
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingIncome {
    pub date: NaiveDate,
    pub amount: Money,
    pub source: String,
}

/// Read-only snapshot of the destination's records, taken once per import
/// session and used for duplicate detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExistingRecords {
    pub expenses: Vec<ExistingExpense>,
    pub planned_expenses: Vec<PlannedExpense>,
    pub incomes: Vec<ExistingIncome>,
}

impl ExistingRecords {
    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty() && self.planned_expenses.is_empty() && self.incomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(planned: i64, actual: i64) -> PlannedExpense {
        PlannedExpense {
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            planned_amount: Money::from_cents(planned),
            actual_amount: Money::from_cents(actual),
            category_id: None,
            title: "Rent".to_string(),
        }
    }

    #[test]
    fn effective_amount_prefers_actual() {
        assert_eq!(planned(150000, 149500).effective_amount(), Money::from_cents(149500));
    }

    #[test]
    fn effective_amount_falls_back_to_planned() {
        assert_eq!(planned(150000, 0).effective_amount(), Money::from_cents(150000));
        assert_eq!(planned(150000, -10).effective_amount(), Money::from_cents(150000));
    }

    #[test]
    fn empty_snapshot() {
        assert!(ExistingRecords::default().is_empty());
    }
}
