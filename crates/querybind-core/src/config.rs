//! Configuration schema (querybind.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// SQL dialect used by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// Generic ANSI SQL
    Ansi,

    /// PostgreSQL SQL dialect
    Postgres,

    /// SQLite SQL dialect
    Sqlite,

    /// MySQL SQL dialect
    Mysql,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Ansi
    }
}

/// Output format of the command line tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Text
    }
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Catalog file (TOML or JSON), relative to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Extra words treated as reserved keywords
    #[serde(default)]
    pub reserved_keywords: Vec<String>,

    /// Default tracing filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            catalog: None,
            reserved_keywords: Vec::new(),
            log_filter: default_log_filter(),
            output: OutputConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Catalog path resolved against the project root
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.project_root.join(p)
            }
        })
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.dialect, DialectConfig::Ansi);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.catalog_path().is_none());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            dialect = "sqlite"
            catalog = "catalog.toml"
            reserved_keywords = ["LIMIT", "offset"]
            log_filter = "querybind_sql=debug"

            [output]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect, DialectConfig::Sqlite);
        assert_eq!(config.reserved_keywords, vec!["LIMIT", "offset"]);
        assert_eq!(config.log_filter, "querybind_sql=debug");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config
            .catalog_path()
            .is_some_and(|p| p.ends_with("catalog.toml")));
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let err = Config::from_toml("dialect = \"oracle\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config {
            dialect: DialectConfig::Mysql,
            reserved_keywords: vec!["TOP".to_string()],
            ..Config::default()
        };
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.dialect, parsed.dialect);
        assert_eq!(config.reserved_keywords, parsed.reserved_keywords);
    }
}
