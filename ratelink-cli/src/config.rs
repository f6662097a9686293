//! CLI configuration management
//!
//! Settings are layered, later sources winning:
//! the user config file, `ratelink.toml` and `ratelink.local.toml` in the
//! working directory, an explicit `--config` file, then `RATELINK_*`
//! environment variables (`__` separates nested keys, e.g.
//! `RATELINK_IMPORT__MAX_FILE_SIZE`).

use anyhow::{Context as _, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use ratelink_import::{ImportOptions, ValidationOptions, DEFAULT_MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::LogFormat;

pub const ENV_PREFIX: &str = "RATELINK";

/// Directory holding vendor profiles when nothing else is configured
pub const DEFAULT_PROFILE_DIR: &str = "vendors";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory of vendor profiles (YAML, JSON or TOML)
    pub profile_dir: PathBuf,

    /// Vendor used when a command does not name one
    pub default_vendor: Option<String>,

    pub log_format: LogFormat,

    /// `tracing` filter directive; `RUST_LOG` applies when unset
    pub log_filter: Option<String>,

    pub import: ImportSettings,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            profile_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            default_vendor: None,
            log_format: LogFormat::default(),
            log_filter: None,
            import: ImportSettings::default(),
        }
    }
}

/// File import limits and business-rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Largest accepted import file in bytes
    pub max_file_size: u64,

    /// Rate increase over the historical rate that raises a warning
    pub max_increase_percent: Option<f64>,

    /// Forced delimiter for text files; sniffed when unset
    pub delimiter: Option<String>,

    /// Worksheet to read from spreadsheets; the first sheet when unset
    pub sheet: Option<String>,

    pub high_hours_threshold: f64,

    pub stale_after_days: i64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        let validation = ValidationOptions::default();
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_increase_percent: validation.max_increase_percent,
            delimiter: None,
            sheet: None,
            high_hours_threshold: validation.high_hours_threshold,
            stale_after_days: validation.stale_after_days,
        }
    }
}

impl ImportSettings {
    pub fn to_options(&self) -> Result<ImportOptions> {
        let validation = ValidationOptions {
            max_increase_percent: self.max_increase_percent,
            high_hours_threshold: self.high_hours_threshold,
            stale_after_days: self.stale_after_days,
            ..ValidationOptions::default()
        };

        let mut options = ImportOptions::default()
            .with_max_file_size(self.max_file_size)
            .with_validation(validation);
        if let Some(sheet) = &self.sheet {
            options = options.with_sheet(sheet.clone());
        }
        if let Some(raw) = &self.delimiter {
            options = options.with_delimiter(parse_delimiter(raw)?);
        }
        Ok(options)
    }
}

/// Single character, or `tab` / `\t`
pub fn parse_delimiter(raw: &str) -> Result<char> {
    match raw {
        "tab" | "\\t" | "\t" => Ok('\t'),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => anyhow::bail!("Delimiter must be a single character (got '{}')", other),
            }
        }
    }
}

impl CliConfig {
    /// Load from every default source plus an optional explicit file
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut files: Vec<(PathBuf, bool)> = Vec::new();
        if let Some(path) = Self::user_config_path() {
            files.push((path, false));
        }
        files.push((PathBuf::from("ratelink.toml"), false));
        files.push((PathBuf::from("ratelink.local.toml"), false));
        if let Some(path) = explicit {
            files.push((path.to_path_buf(), true));
        }

        Self::from_sources(&files, Environment::with_prefix(ENV_PREFIX))
    }

    /// Layer `files` in order, then `env`. Required files must exist.
    pub fn from_sources(files: &[(PathBuf, bool)], env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        for (path, required) in files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        builder = builder.add_source(env.prefix_separator("_").separator("__").try_parsing(true));

        builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// `config.toml` under the platform config directory
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "ratelink", "ratelink").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.profile_dir, PathBuf::from("vendors"));
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.import.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.import.max_increase_percent, Some(10.0));
    }

    #[test]
    fn test_file_then_environment_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratelink.toml");
        std::fs::write(
            &path,
            r#"
profile_dir = "/etc/ratelink/vendors"
default_vendor = "elite"
log_format = "json"

[import]
max_file_size = 1024
delimiter = ";"
"#,
        )
        .unwrap();

        let mut vars = config::Map::new();
        vars.insert("RATELINK_DEFAULT_VENDOR".to_string(), "aderant".to_string());
        vars.insert("RATELINK_IMPORT__STALE_AFTER_DAYS".to_string(), "30".to_string());

        let config = CliConfig::from_sources(
            &[(path, true), (dir.path().join("missing.toml"), false)],
            Environment::with_prefix(ENV_PREFIX).source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.profile_dir, PathBuf::from("/etc/ratelink/vendors"));
        assert_eq!(config.default_vendor.as_deref(), Some("aderant"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.import.max_file_size, 1024);
        assert_eq!(config.import.stale_after_days, 30);

        let options = config.import.to_options().unwrap();
        assert_eq!(options.delimiter, Some(';'));
        assert_eq!(options.validation.stale_after_days, 30);
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter("tab").unwrap(), '\t');
        assert_eq!(parse_delimiter("|").unwrap(), '|');
        assert!(parse_delimiter(";;").is_err());
    }
}
