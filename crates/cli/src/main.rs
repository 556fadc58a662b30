mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::ImportArgs;
use config::Config;

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    init_logging(&config.log);

    match cli.command {
        Commands::Init => commands::init(&config).await,
        Commands::Import {
            file,
            card,
            income_only,
            json,
            commit,
        } => {
            commands::import(
                &config,
                ImportArgs {
                    file: &file,
                    card,
                    income_only,
                    json,
                    commit,
                },
            )
            .await
        }
        Commands::Rules => commands::rules(&config).await,
    }
}
