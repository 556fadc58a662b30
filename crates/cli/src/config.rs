use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tally_import::WorkflowMode;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log: String,
    pub mode: WorkflowMode,
    pub categories: Vec<String>,
    pub accounts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("tally.db"),
            log: "info".to_string(),
            mode: WorkflowMode::Full,
            categories: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
