use anyhow::{Context, Result};
use hilo_trainer::TableConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub practice: ConfigPractice,
}

/// How the terminal trainer presents the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPractice {
    /// Print the recommended play before every decision.
    #[serde(default = "default_true")]
    pub show_recommendation: bool,
    /// Print the low/neutral/high breakdown of the remaining shoe.
    #[serde(default)]
    pub show_remaining_cards: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConfigPractice {
    fn default() -> Self {
        ConfigPractice {
            show_recommendation: true,
            show_remaining_cards: false,
        }
    }
}

/// Parses and validates a YAML config. Missing keys take their defaults.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content).context("malformed config")?;
    config.table.validate().context("invalid table config")?;
    Ok(config)
}

/// Reads the content of a given config file and parses it to a Config.
pub fn parse_config_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("in config file {}", path.display()))
}
