use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tally", about = "Classify bank exports, statements and receipts into a reviewed ledger.")]
pub struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, global = true, default_value = "tally.toml")]
    pub config: PathBuf,
    /// SQLite database, overrides the config file
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and seed the configured categories and accounts.
    Init,
    /// Classify a .csv export or .txt statement/receipt text.
    Import {
        /// File to import
        file: PathBuf,
        /// Card the expenses belong to; scopes duplicate detection
        #[arg(long)]
        card: Option<i64>,
        /// Only accept income rows
        #[arg(long)]
        income_only: bool,
        /// Print candidate rows as JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Write included rows and remembered rules to the database
        #[arg(long)]
        commit: bool,
    },
    /// List learned merchant rules.
    Rules,
}
