use serde::Deserialize;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Postgres,
    CsvDir,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Directory holding the CSV fixtures when `kind = "csv_dir"`.
    pub csv_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    /// Upper bound on concurrent reading-bracket lookups.
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

fn default_lookup_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub split: SplitConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path =
            env::var("APPORTIONMENT_CONFIG").unwrap_or_else(|_| "apportionment-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        match cfg.source.kind {
            SourceKind::Postgres if cfg.database.is_none() => {
                anyhow::bail!("source.kind = \"postgres\" requires a [database] section")
            }
            SourceKind::CsvDir if cfg.source.csv_dir.is_none() => {
                anyhow::bail!("source.kind = \"csv_dir\" requires source.csv_dir")
            }
            _ => Ok(cfg),
        }
    }
}
