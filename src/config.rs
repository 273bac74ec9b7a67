use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub healing: HealingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Delay table for the seeded recovery strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    pub connection_reset_delay_ms: u64,
    pub timeout_delay_ms: u64,
    pub unavailable_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            connection_reset_delay_ms: 1000,
            timeout_delay_ms: 500,
            unavailable_delay_ms: 2000,
            rate_limit_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum retained failures before oldest entries are evicted
    pub capacity: usize,
    /// Default number of entries returned by history queries
    pub history_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: 5000,
            history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of fused results returned by a search
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 20 }
    }
}

impl Config {
    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            // Create default config
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".config").join("sourcemesh").join("config.toml"))
    }
}
