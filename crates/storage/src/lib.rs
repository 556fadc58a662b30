pub mod db;

pub use db::{
    commit_plan, create_db, get_accounts, get_categories, get_learned_rules, insert_account,
    insert_category, insert_expense, insert_income, insert_planned_expense, load_snapshot,
    upsert_learned_rule, CommitCounts, DbPool, StorageError,
};
