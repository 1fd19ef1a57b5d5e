use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub mod defaults;

use crate::errors::{AppError, AppResult};
use crate::matching::{MatchOptions, NameNormalization, StrategyKind};
use defaults::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fuzzy matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Pairs must score strictly above this to be associated
    #[serde(default = "default_match_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub normalization: NameNormalization,
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_match_threshold(),
            strategy: StrategyKind::default(),
            normalization: NameNormalization::default(),
        }
    }
}

/// XMLTV indexer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Programmes returned by a lookup when no limit is given
    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: usize,
    /// File name suffixes treated as gzip when the magic bytes are inconclusive
    #[serde(default = "default_compressed_suffixes")]
    pub compressed_suffixes: Vec<String>,
}

fn default_lookup_limit() -> usize {
    DEFAULT_LOOKUP_LIMIT
}

fn default_compressed_suffixes() -> Vec<String> {
    DEFAULT_COMPRESSED_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            lookup_limit: default_lookup_limit(),
            compressed_suffixes: default_compressed_suffixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for this crate's targets; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `$EPG_MAPPER_CONFIG` or `epg-mapper.toml`, falling back to
    /// defaults when neither exists. Nothing is written.
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        if Path::new(&config_file).exists() {
            Self::load_from_file(&config_file)
        } else {
            debug!("No config file at {}, using defaults", config_file);
            Ok(Self::default())
        }
    }

    /// Load `config_file`, creating it with the defaults if it does not exist
    pub fn load_from_file(config_file: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();
        if config_file.exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let threshold = self.matching.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::configuration(format!(
                "matching.threshold must be within 0.0..=1.0, got {threshold}"
            )));
        }
        if self.indexer.compressed_suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err(AppError::configuration(
                "indexer.compressed_suffixes must not contain empty entries",
            ));
        }
        Ok(())
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            threshold: self.matching.threshold,
            strategy: self.matching.strategy,
            normalization: self.matching.normalization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
[matching]
strategy = "exclusive"
normalization = "strip-quality-tags"
"#,
        )
        .unwrap();

        assert_eq!(config.matching.threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(config.matching.strategy, StrategyKind::Exclusive);
        assert_eq!(config.matching.normalization, NameNormalization::StripQualityTags);
        assert_eq!(config.indexer, IndexerConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("epg-mapper.toml");

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[matching]\nthreshold = 1.2\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("matching.threshold"));
    }

    #[test]
    fn test_match_options_follow_config() {
        let mut config = Config::default();
        config.matching.threshold = 0.6;
        config.matching.strategy = StrategyKind::Exclusive;

        let options = config.match_options();
        assert_eq!(options.threshold, 0.6);
        assert_eq!(options.strategy, StrategyKind::Exclusive);
        assert_eq!(options.normalization, NameNormalization::CaseFold);
    }
}
