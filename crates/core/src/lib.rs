pub mod account;
pub mod money;
pub mod period;
pub mod records;
pub mod rule;

pub use account::{Account, AccountId, Category, CategoryId, Kind};
pub use money::{Money, ParseMoneyError, AMOUNT_TOLERANCE};
pub use period::DateRange;
pub use records::{ExistingExpense, ExistingIncome, ExistingRecords, PlannedExpense};
pub use rule::{LearnedRule, LearnedRules};
