use anyhow::Context;
use bingo_core::BingoConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const DATABASE_FILE: &str = "bingo.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub rules: BingoConfig,
    /// Fixed entropy seed for reproducible boards and draws.
    pub entropy_seed: Option<u64>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rules: BingoConfig::default(),
            entropy_seed: None,
        }
    }
}

impl CliConfig {
    /// Reads `config.json` from `data_dir`, falling back to defaults.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<CliConfig>(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            CliConfig::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.rules.validate()?;
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bingo")
}
