//! Application configuration management.
//!
//! Layers, lowest priority first: `config/default.toml`,
//! `config/{RUN_MODE}.toml`, then `TALLY__SECTION__KEY` environment variables.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger behaviour.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Report cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// How transaction and journal entry numbers are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberingMode {
    /// `TXN-YYYYMMDD-` followed by 8 random uppercase alphanumerics.
    #[default]
    Random,
    /// `TXN-YYYYMMDD-` followed by a zero-padded per-tenant counter.
    Sequential,
}

/// Ledger behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Currency used when a caller does not name one.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Number generation strategy.
    #[serde(default)]
    pub numbering: NumberingMode,
    /// Attempts at generating an unused number before giving up.
    #[serde(default = "default_number_attempts")]
    pub number_attempts: u32,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_number_attempts() -> u32 {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            numbering: NumberingMode::default(),
            number_attempts: default_number_attempts(),
        }
    }
}

/// Report cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Whether report results are cached at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Maximum number of cached reports.
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    /// Time to live for a cached report, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> u64 {
    1_000
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "tally=info,sea_orm=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_applies_defaults() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("test")),
                ("TALLY__DATABASE__URL", Some("postgres://localhost/tally")),
                ("TALLY__LEDGER__NUMBERING", None::<&str>),
                ("TALLY__CACHE__TTL_SECS", None),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/tally");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.ledger.numbering, NumberingMode::Random);
                assert_eq!(config.ledger.default_currency, "USD");
                assert!(config.cache.enabled);
                assert_eq!(config.cache.ttl_secs, 300);
                assert!(!config.logging.json);
            },
        );
    }

    #[test]
    fn test_load_reads_environment_overrides() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("test")),
                ("TALLY__DATABASE__URL", Some("postgres://db/ledger")),
                ("TALLY__LEDGER__NUMBERING", Some("sequential")),
                ("TALLY__CACHE__TTL_SECS", Some("30")),
                ("TALLY__CACHE__ENABLED", Some("false")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.ledger.numbering, NumberingMode::Sequential);
                assert_eq!(config.cache.ttl_secs, 30);
                assert!(!config.cache.enabled);
            },
        );
    }

    #[test]
    fn test_load_requires_database_url() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("test")),
                ("TALLY__DATABASE__URL", None::<&str>),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
