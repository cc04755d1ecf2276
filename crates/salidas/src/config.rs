//! Configuration for the campaign tracker

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::constants;

// =============================================================================
// File-based Configuration (salidas.toml)
// =============================================================================

/// Configuration loaded from salidas.toml. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Values used when creating new campaigns
#[derive(Debug, Deserialize)]
pub struct DefaultsConfig {
    /// Unit price when `campaign create` is given no --price
    #[serde(default = "default_unit_price")]
    pub unit_price: f64,
    /// Whether new campaigns split stock per seller
    #[serde(default = "default_uses_distribution")]
    pub uses_distribution: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            unit_price: default_unit_price(),
            uses_distribution: default_uses_distribution(),
        }
    }
}

/// Report presentation settings
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    /// chrono format string for displayed campaign dates
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            date_format: default_date_format(),
        }
    }
}

fn default_unit_price() -> f64 {
    constants::DEFAULT_UNIT_PRICE
}

fn default_uses_distribution() -> bool {
    true
}

fn default_currency() -> String {
    constants::DEFAULT_CURRENCY.to_string()
}

fn default_date_format() -> String {
    constants::DEFAULT_DATE_FORMAT.to_string()
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| {
            format!(
                "Failed to parse {}. Check for:\n\
                 - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
                 - Incorrect data types (numbers vs strings vs booleans)",
                path.display()
            )
        })
    }

    /// Load the file if it exists, otherwise fall back to built-in defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    fn parse(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content)?;
        if config.defaults.unit_price < 0.0 {
            anyhow::bail!("defaults.unit_price must not be negative");
        }
        if StrftimeItems::new(&config.report.date_format).any(|item| matches!(item, Item::Error)) {
            anyhow::bail!(
                "report.date_format '{}' is not a valid chrono format string",
                config.report.date_format
            );
        }
        Ok(config)
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Settings resolved from the config file and command-line flags
#[derive(Debug)]
pub struct Config {
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    /// Directory receiving generated CSV reports
    pub output_dir: PathBuf,
    pub default_unit_price: f64,
    pub default_uses_distribution: bool,
    pub currency: String,
    pub date_format: String,
}

impl Config {
    pub fn from_file(file_config: FileConfig, data_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            data_dir,
            output_dir,
            default_unit_price: file_config.defaults.unit_price,
            default_uses_distribution: file_config.defaults.uses_distribution,
            currency: file_config.report.currency,
            date_format: file_config.report.date_format,
        }
    }

    /// Path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(constants::DATABASE_FILENAME)
    }

    /// Render a stored YYYY-MM-DD date with the configured format.
    /// Dates that fail to parse or render are shown as stored.
    pub fn display_date(&self, date: &str) -> String {
        let mut out = String::new();
        match chrono::NaiveDate::parse_from_str(date, constants::DATE_FORMAT) {
            // Time specifiers such as %H cannot be rendered for a bare date
            Ok(d) if write!(out, "{}", d.format(&self.date_format)).is_ok() => out,
            _ => date.to_string(),
        }
    }

    /// Format a currency amount, e.g. "S/ 1763.00"
    pub fn money(&self, amount: f64) -> String {
        format!("{} {:.2}", self.currency, normalize_zero(amount))
    }
}

/// Normalize -0.0 to 0.0 for cleaner display
pub fn normalize_zero(val: f64) -> f64 {
    if val == 0.0 { 0.0 } else { val }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(file_config: FileConfig) -> Config {
        Config::from_file(file_config, PathBuf::from("data"), PathBuf::from("output"))
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.defaults.unit_price, 10.0);
        assert!(config.defaults.uses_distribution);
        assert_eq!(config.report.currency, "S/");
        assert_eq!(config.report.date_format, "%d %b %Y");
    }

    #[test]
    fn test_partial_sections() {
        let config = FileConfig::parse(
            r#"
            [defaults]
            unit_price = 12.5

            [report]
            currency = "$"
            "#,
        )
        .unwrap();
        assert_eq!(config.defaults.unit_price, 12.5);
        assert!(config.defaults.uses_distribution);
        assert_eq!(config.report.currency, "$");
        assert_eq!(config.report.date_format, "%d %b %Y");
    }

    #[test]
    fn test_single_point_default() {
        let config = FileConfig::parse("[defaults]\nuses_distribution = false\n").unwrap();
        assert!(!config.defaults.uses_distribution);
    }

    #[test]
    fn test_rejects_negative_price() {
        assert!(FileConfig::parse("[defaults]\nunit_price = -1.0\n").is_err());
    }

    #[test]
    fn test_rejects_bad_date_format() {
        let err = FileConfig::parse("[report]\ndate_format = \"%Q\"\n").unwrap_err();
        assert!(err.to_string().contains("%Q"));

        let config = FileConfig::parse("[report]\ndate_format = \"%Y/%m/%d\"\n").unwrap();
        let config = test_config(config);
        assert_eq!(config.display_date("2025-01-05"), "2025/01/05");
    }

    #[test]
    fn test_time_format_falls_back_to_stored_date() {
        let config = FileConfig::parse("[report]\ndate_format = \"%H:%M\"\n").unwrap();
        let config = test_config(config);
        assert_eq!(config.display_date("2025-01-05"), "2025-01-05");
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(FileConfig::parse("[defaults]\nunit_price = \"ten\"\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.defaults.unit_price, 10.0);
    }

    #[test]
    fn test_display_date() {
        let config = test_config(FileConfig::default());
        assert_eq!(config.display_date("2025-01-05"), "05 Jan 2025");
        assert_eq!(config.display_date("not-a-date"), "not-a-date");
    }

    #[test]
    fn test_money_normalizes_negative_zero() {
        let config = test_config(FileConfig::default());
        assert_eq!(config.money(-0.0), "S/ 0.00");
        assert_eq!(config.money(1763.0), "S/ 1763.00");
    }

    #[test]
    fn test_database_path() {
        let config = test_config(FileConfig::default());
        assert_eq!(config.database_path(), PathBuf::from("data/salidas.sqlite"));
    }
}
