use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Pool, Sqlite};
use std::path::Path;
use tally_core::{
    Account, AccountId, Category, CategoryId, ExistingExpense, ExistingIncome, ExistingRecords,
    Kind, LearnedRule, LearnedRules, Money, PlannedExpense,
};
use tally_import::{CommitPlan, ImportContext};
use thiserror::Error;
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Corrupt value in {table}.{column}: '{value}'")]
    Corrupt {
        table: &'static str,
        column: &'static str,
        value: String,
    },
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    debug!(path = %path.display(), "database ready");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS planned_expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER,
            date TEXT NOT NULL,
            title TEXT NOT NULL,
            planned_cents INTEGER NOT NULL,
            actual_cents INTEGER NOT NULL DEFAULT 0,
            category_id INTEGER,
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incomes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            source TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS allocations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expense_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            amount_cents INTEGER NOT NULL,
            FOREIGN KEY (expense_id) REFERENCES expenses(id) ON DELETE CASCADE,
            FOREIGN KEY (account_id) REFERENCES accounts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_rules (
            merchant_key TEXT PRIMARY KEY,
            display_name TEXT,
            category_id INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn parse_day(table: &'static str, value: String) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| StorageError::Corrupt {
        table,
        column: "date",
        value,
    })
}

// ── Categories & accounts ─────────────────────────────────────────────────────

/// Inserts `name` unless it exists; returns the stored category either way.
pub async fn insert_category(pool: &DbPool, name: &str) -> Result<Category, StorageError> {
    sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    let (id, name) = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM categories WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(Category { id: CategoryId(id), name })
}

pub async fn insert_account(pool: &DbPool, name: &str) -> Result<Account, StorageError> {
    sqlx::query("INSERT OR IGNORE INTO accounts (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    let (id, name) = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM accounts WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(Account { id: AccountId(id), name })
}

pub async fn get_categories(pool: &DbPool) -> Result<Vec<Category>, StorageError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| Category { id: CategoryId(id), name })
        .collect())
}

pub async fn get_accounts(pool: &DbPool) -> Result<Vec<Account>, StorageError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM accounts ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| Account { id: AccountId(id), name })
        .collect())
}

// ── Ledger records ────────────────────────────────────────────────────────────

async fn insert_expense_with<'e, E>(
    executor: E,
    card: Option<i64>,
    date: NaiveDate,
    description: &str,
    amount: Money,
    category_id: Option<CategoryId>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO expenses (card_id, date, description, amount_cents, category_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(card)
    .bind(date.to_string())
    .bind(description)
    .bind(amount.to_cents())
    .bind(category_id.map(|c| c.0))
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_income_with<'e, E>(
    executor: E,
    date: NaiveDate,
    source: &str,
    amount: Money,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO incomes (date, source, amount_cents) VALUES (?, ?, ?)")
        .bind(date.to_string())
        .bind(source)
        .bind(amount.to_cents())
        .execute(executor)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn upsert_rule_with<'e, E>(executor: E, rule: &LearnedRule) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO learned_rules (merchant_key, display_name, category_id, updated_at)
        VALUES (?, ?, ?, datetime('now'))
        ON CONFLICT(merchant_key) DO UPDATE SET
            display_name = excluded.display_name,
            category_id = excluded.category_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&rule.merchant_key)
    .bind(rule.display_name.as_deref())
    .bind(rule.category_id.map(|c| c.0))
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_expense(
    pool: &DbPool,
    card: Option<i64>,
    expense: &ExistingExpense,
) -> Result<i64, StorageError> {
    Ok(insert_expense_with(
        pool,
        card,
        expense.date,
        &expense.description,
        expense.amount,
        expense.category_id,
    )
    .await?)
}

pub async fn insert_planned_expense(
    pool: &DbPool,
    card: Option<i64>,
    planned: &PlannedExpense,
) -> Result<i64, StorageError> {
    let result = sqlx::query(
        "INSERT INTO planned_expenses (card_id, date, title, planned_cents, actual_cents, category_id) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(card)
    .bind(planned.date.to_string())
    .bind(&planned.title)
    .bind(planned.planned_amount.to_cents())
    .bind(planned.actual_amount.to_cents())
    .bind(planned.category_id.map(|c| c.0))
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn insert_income(pool: &DbPool, income: &ExistingIncome) -> Result<i64, StorageError> {
    Ok(insert_income_with(pool, income.date, &income.source, income.amount).await?)
}

// ── Learned rules ─────────────────────────────────────────────────────────────

pub async fn get_learned_rules(pool: &DbPool) -> Result<LearnedRules, StorageError> {
    let rows = sqlx::query_as::<_, (String, Option<String>, Option<i64>)>(
        "SELECT merchant_key, display_name, category_id FROM learned_rules ORDER BY merchant_key",
    )
    .fetch_all(pool)
    .await?;
    Ok(LearnedRules::new(rows.into_iter().map(
        |(merchant_key, display_name, category_id)| LearnedRule {
            merchant_key,
            display_name,
            category_id: category_id.map(CategoryId),
        },
    )))
}

pub async fn upsert_learned_rule(pool: &DbPool, rule: &LearnedRule) -> Result<(), StorageError> {
    Ok(upsert_rule_with(pool, rule).await?)
}

// ── Import sessions ───────────────────────────────────────────────────────────

/// Everything an import session reads, taken once. `card` scopes expenses and
/// planned expenses; `None` reads the whole workspace. Incomes are never scoped.
pub async fn load_snapshot(pool: &DbPool, card: Option<i64>) -> Result<ImportContext, StorageError> {
    let expenses = sqlx::query_as::<_, (String, i64, Option<i64>, String)>(
        "SELECT date, amount_cents, category_id, description FROM expenses WHERE (? IS NULL OR card_id = ?) ORDER BY date",
    )
    .bind(card)
    .bind(card)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(date, cents, category_id, description)| {
        Ok(ExistingExpense {
            date: parse_day("expenses", date)?,
            amount: Money::from_cents(cents),
            category_id: category_id.map(CategoryId),
            description,
        })
    })
    .collect::<Result<Vec<_>, StorageError>>()?;

    let planned_expenses = sqlx::query_as::<_, (String, i64, i64, Option<i64>, String)>(
        "SELECT date, planned_cents, actual_cents, category_id, title FROM planned_expenses WHERE (? IS NULL OR card_id = ?) ORDER BY date",
    )
    .bind(card)
    .bind(card)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(date, planned, actual, category_id, title)| {
        Ok(PlannedExpense {
            date: parse_day("planned_expenses", date)?,
            planned_amount: Money::from_cents(planned),
            actual_amount: Money::from_cents(actual),
            category_id: category_id.map(CategoryId),
            title,
        })
    })
    .collect::<Result<Vec<_>, StorageError>>()?;

    let incomes = sqlx::query_as::<_, (String, i64, String)>(
        "SELECT date, amount_cents, source FROM incomes ORDER BY date",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(date, cents, source)| {
        Ok(ExistingIncome {
            date: parse_day("incomes", date)?,
            amount: Money::from_cents(cents),
            source,
        })
    })
    .collect::<Result<Vec<_>, StorageError>>()?;

    let ctx = ImportContext {
        categories: get_categories(pool).await?,
        accounts: get_accounts(pool).await?,
        existing: ExistingRecords {
            expenses,
            planned_expenses,
            incomes,
        },
        learned_rules: get_learned_rules(pool).await?,
    };
    debug!(
        card,
        expenses = ctx.existing.expenses.len(),
        planned = ctx.existing.planned_expenses.len(),
        incomes = ctx.existing.incomes.len(),
        rules = ctx.learned_rules.len(),
        "loaded import snapshot"
    );
    Ok(ctx)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitCounts {
    pub expenses: usize,
    pub incomes: usize,
    pub allocations: usize,
    pub rules: usize,
}

/// Writes a reviewed plan in one transaction. Nothing is written on error.
pub async fn commit_plan(
    pool: &DbPool,
    card: Option<i64>,
    plan: &CommitPlan,
) -> Result<CommitCounts, StorageError> {
    let mut tx = pool.begin().await?;
    let mut counts = CommitCounts::default();

    for record in &plan.records {
        match record.kind {
            Kind::Expense => {
                let expense_id = insert_expense_with(
                    &mut *tx,
                    card,
                    record.date,
                    &record.description,
                    record.amount,
                    record.category_id,
                )
                .await?;
                counts.expenses += 1;

                if let Some(allocation) = &record.allocation {
                    sqlx::query(
                        "INSERT INTO allocations (expense_id, account_id, amount_cents) VALUES (?, ?, ?)",
                    )
                    .bind(expense_id)
                    .bind(allocation.account_id.0)
                    .bind(allocation.amount.to_cents())
                    .execute(&mut *tx)
                    .await?;
                    counts.allocations += 1;
                }
            }
            Kind::Income => {
                insert_income_with(&mut *tx, record.date, &record.description, record.amount).await?;
                counts.incomes += 1;
            }
        }
    }

    for rule in &plan.rules {
        upsert_rule_with(&mut *tx, rule).await?;
        counts.rules += 1;
    }

    tx.commit().await?;
    info!(
        card,
        expenses = counts.expenses,
        incomes = counts.incomes,
        allocations = counts.allocations,
        rules = counts.rules,
        "committed import"
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_import::{Allocation, NewRecord, ParsedTable, ReviewSession, RowId, WorkflowMode};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    async fn fresh() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("tally.db")).await.unwrap();
        (dir, pool)
    }

    fn record(kind: Kind, description: &str, cents: i64) -> NewRecord {
        NewRecord {
            row: RowId(1),
            line: 2,
            kind,
            date: day(1, 5),
            description: description.to_string(),
            amount: Money::from_cents(cents),
            category_id: None,
            allocation: None,
        }
    }

    // ── Schema ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_db_creates_file_and_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.db");
        let pool = create_db(&path).await.unwrap();
        insert_category(&pool, "Coffee").await.unwrap();
        pool.close().await;
        assert!(path.exists());

        let pool = create_db(&path).await.unwrap();
        assert_eq!(get_categories(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_category_is_idempotent() {
        let (_dir, pool) = fresh().await;
        let a = insert_category(&pool, "Groceries").await.unwrap();
        let b = insert_category(&pool, "Groceries").await.unwrap();
        assert_eq!(a, b);
        let acct = insert_account(&pool, "Roommate").await.unwrap();
        assert_eq!(get_accounts(&pool).await.unwrap(), vec![acct]);
    }

    // ── Snapshot ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn snapshot_is_scoped_by_card() {
        let (_dir, pool) = fresh().await;
        let coffee = insert_category(&pool, "Coffee").await.unwrap();
        let expense = ExistingExpense {
            date: day(1, 5),
            amount: Money::from_cents(475),
            category_id: Some(coffee.id),
            description: "Starbucks".into(),
        };
        insert_expense(&pool, Some(1), &expense).await.unwrap();
        insert_expense(&pool, Some(2), &expense).await.unwrap();
        insert_planned_expense(
            &pool,
            Some(1),
            &PlannedExpense {
                date: day(1, 1),
                planned_amount: Money::from_cents(150_000),
                actual_amount: Money::zero(),
                category_id: None,
                title: "Rent".into(),
            },
        )
        .await
        .unwrap();
        insert_income(
            &pool,
            &ExistingIncome {
                date: day(1, 15),
                amount: Money::from_cents(250_000),
                source: "Acme Payroll".into(),
            },
        )
        .await
        .unwrap();

        let card1 = load_snapshot(&pool, Some(1)).await.unwrap();
        assert_eq!(card1.existing.expenses.len(), 1);
        assert_eq!(card1.existing.expenses[0].amount, Money::from_cents(475));
        assert_eq!(card1.existing.planned_expenses.len(), 1);
        assert_eq!(card1.existing.incomes.len(), 1);
        assert_eq!(card1.categories, vec![coffee]);

        let card3 = load_snapshot(&pool, Some(3)).await.unwrap();
        assert!(card3.existing.expenses.is_empty());
        assert!(card3.existing.planned_expenses.is_empty());

        let all = load_snapshot(&pool, None).await.unwrap();
        assert_eq!(all.existing.expenses.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_date_is_reported() {
        let (_dir, pool) = fresh().await;
        sqlx::query("INSERT INTO incomes (date, source, amount_cents) VALUES ('someday', 'x', 1)")
            .execute(&pool)
            .await
            .unwrap();
        let err = load_snapshot(&pool, None).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Corrupt { table: "incomes", column: "date", .. }
        ));
    }

    // ── Learned rules ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn upsert_replaces_rule() {
        let (_dir, pool) = fresh().await;
        let dining = insert_category(&pool, "Dining").await.unwrap();
        let mut rule = LearnedRule {
            merchant_key: "sq joes".into(),
            display_name: Some("Joes".into()),
            category_id: None,
        };
        upsert_learned_rule(&pool, &rule).await.unwrap();
        rule.display_name = Some("Joe's Diner".into());
        rule.category_id = Some(dining.id);
        upsert_learned_rule(&pool, &rule).await.unwrap();

        let rules = get_learned_rules(&pool).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get("sq joes"), Some(&rule));
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn commit_plan_writes_everything() {
        let (_dir, pool) = fresh().await;
        let coffee = insert_category(&pool, "Coffee").await.unwrap();
        let roommate = insert_account(&pool, "Roommate").await.unwrap();

        let mut expense = record(Kind::Expense, "Starbucks", 475);
        expense.category_id = Some(coffee.id);
        expense.allocation = Some(Allocation {
            account_id: roommate.id,
            amount: Money::from_cents(200),
        });
        let plan = CommitPlan {
            records: vec![expense, record(Kind::Income, "Acme Payroll", 250_000)],
            rules: vec![LearnedRule {
                merchant_key: "starbucks".into(),
                display_name: Some("Starbucks".into()),
                category_id: Some(coffee.id),
            }],
        };

        let counts = commit_plan(&pool, Some(1), &plan).await.unwrap();
        assert_eq!(
            counts,
            CommitCounts { expenses: 1, incomes: 1, allocations: 1, rules: 1 }
        );

        let snapshot = load_snapshot(&pool, Some(1)).await.unwrap();
        assert_eq!(snapshot.existing.expenses[0].description, "Starbucks");
        assert_eq!(snapshot.existing.incomes[0].amount, Money::from_cents(250_000));
        assert!(snapshot.learned_rules.get("starbucks").is_some());
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let (_dir, pool) = fresh().await;
        let mut expense = record(Kind::Expense, "Starbucks", 475);
        expense.allocation = Some(Allocation {
            account_id: AccountId(99),
            amount: Money::from_cents(100),
        });
        let plan = CommitPlan { records: vec![expense], rules: vec![] };

        assert!(commit_plan(&pool, None, &plan).await.is_err());
        assert!(load_snapshot(&pool, None).await.unwrap().existing.expenses.is_empty());
    }

    #[tokio::test]
    async fn committed_rows_are_duplicates_next_time() {
        let (_dir, pool) = fresh().await;
        insert_category(&pool, "Coffee").await.unwrap();
        let table = ParsedTable::new(
            vec!["Date".into(), "Description".into(), "Amount".into()],
            vec![vec!["1/5/2026".into(), "STARBUCKS #123".into(), "-4.75".into()]],
        );

        let ctx = load_snapshot(&pool, Some(1)).await.unwrap();
        let session = ReviewSession::start(&table, ctx, WorkflowMode::Full);
        commit_plan(&pool, Some(1), &session.commit_plan()).await.unwrap();

        let ctx = load_snapshot(&pool, Some(1)).await.unwrap();
        let session = ReviewSession::start(&table, ctx, WorkflowMode::Full);
        assert!(session.rows()[0].duplicate);
        assert!(session.commit_plan().records.is_empty());
    }
}
