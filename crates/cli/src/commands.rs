use anyhow::{bail, Context, Result};
use std::path::Path;
use tally_core::Kind;
use tally_import::csv::sniff_delimiter;
use tally_import::{read_table_with_delimiter, Bucket, CandidateRow, ParsedTable, ReviewSession, WorkflowMode};
use tally_ocr::extract_table;
use tally_storage::DbPool;
use tracing::info;

use crate::config::Config;

async fn open(config: &Config) -> Result<DbPool> {
    tally_storage::create_db(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.display()))
}

pub async fn init(config: &Config) -> Result<()> {
    let pool = open(config).await?;
    for name in &config.categories {
        tally_storage::insert_category(&pool, name).await?;
    }
    for name in &config.accounts {
        tally_storage::insert_account(&pool, name).await?;
    }
    let categories = tally_storage::get_categories(&pool).await?;
    let accounts = tally_storage::get_accounts(&pool).await?;
    println!(
        "Initialized {} ({} categories, {} accounts)",
        config.database.display(),
        categories.len(),
        accounts.len()
    );
    Ok(())
}

/// Reads `path` into a table with the adapter its extension calls for.
pub fn read_source(path: &Path) -> Result<ParsedTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let table = match ext.as_str() {
        "csv" | "tsv" => read_table_with_delimiter(text.as_bytes(), sniff_delimiter(&text))
            .with_context(|| format!("reading CSV {}", path.display()))?,
        "txt" => extract_table(&text).with_context(|| format!("extracting rows from {}", path.display()))?,
        other => bail!("Unsupported file type '.{other}', expected .csv or .txt"),
    };
    info!(path = %path.display(), rows = table.len(), "read import source");
    Ok(table)
}

pub struct ImportArgs<'a> {
    pub file: &'a Path,
    pub card: Option<i64>,
    pub income_only: bool,
    pub json: bool,
    pub commit: bool,
}

pub async fn import(config: &Config, args: ImportArgs<'_>) -> Result<()> {
    let table = read_source(args.file)?;
    let pool = open(config).await?;
    let ctx = tally_storage::load_snapshot(&pool, args.card).await?;
    let mode = if args.income_only { WorkflowMode::IncomeOnly } else { config.mode };
    let session = ReviewSession::start(&table, ctx, mode);

    if args.json {
        println!("{}", serde_json::to_string_pretty(session.rows())?);
    } else {
        print_summary(&session);
    }

    if args.commit {
        let plan = session.commit_plan();
        if plan.is_empty() {
            println!("Nothing to commit.");
            return Ok(());
        }
        let counts = tally_storage::commit_plan(&pool, args.card, &plan).await?;
        println!(
            "Committed {} expenses, {} incomes, {} allocations; {} rules learned",
            counts.expenses, counts.incomes, counts.allocations, counts.rules
        );
    }
    Ok(())
}

fn bucket_title(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Ready => "Ready",
        Bucket::PossibleMatch => "Possible match",
        Bucket::Payment => "Payments",
        Bucket::PossibleDuplicate => "Possible duplicates",
        Bucket::NeedsMoreData => "Needs more data",
    }
}

fn describe(row: &CandidateRow) -> String {
    let date = row
        .date
        .map(|d| d.to_string())
        .unwrap_or_else(|| format!("[{}]", row.raw.date));
    let category = match (row.kind, &row.category) {
        (Kind::Income, _) => "income".to_string(),
        (Kind::Expense, Some(c)) => format!("{} ({:.2})", c.name, row.category_confidence()),
        (Kind::Expense, None) => "-".to_string(),
    };
    let mark = match &row.blocked {
        Some(reason) => format!("  blocked: {reason}"),
        None if row.include => "  +".to_string(),
        None => String::new(),
    };
    format!(
        "  line {:>4}  {:<10}  {:<28}  {:>10}  {}{}",
        row.line, date, row.merchant, row.amount.to_string(), category, mark
    )
}

fn print_summary(session: &ReviewSession) {
    for (bucket, count) in session.bucket_counts() {
        if count == 0 {
            continue;
        }
        println!("{} ({count})", bucket_title(bucket));
        for row in session.bucket_rows(bucket) {
            println!("{}", describe(row));
        }
    }
    println!("{} of {} rows included", session.included().count(), session.rows().len());
}

pub async fn rules(config: &Config) -> Result<()> {
    let pool = open(config).await?;
    let categories = tally_storage::get_categories(&pool).await?;
    let rules = tally_storage::get_learned_rules(&pool).await?;
    if rules.is_empty() {
        println!("No learned rules.");
        return Ok(());
    }
    let mut rules: Vec<_> = rules.iter().collect();
    rules.sort_by(|a, b| a.merchant_key.cmp(&b.merchant_key));
    for rule in rules {
        let category = rule
            .category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| c.name.as_str())
            .unwrap_or("-");
        println!(
            "{:<30}  {:<30}  {}",
            rule.merchant_key,
            rule.display_name.as_deref().unwrap_or("-"),
            category
        );
    }
    Ok(())
}
