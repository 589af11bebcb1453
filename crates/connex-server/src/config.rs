//! Configuration management

use serde::{Deserialize, Serialize};

use crate::extractor::{ExtractorConfig, DEFAULT_GRACE_MINUTES, DEFAULT_MAX_RETRIES};
use crate::jobs::{JobRetention, DEFAULT_JOB_RETENTION_SECS, DEFAULT_MAX_JOBS};
use crate::pipeline::{DEFAULT_URL_TTL_SECS, MAX_URL_TTL_SECS};
use crate::source::SourceConfig;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 4567;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

/// Minutes in a day; the grace window must fit inside one.
const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub extractor: ExtractorSettings,
    pub cache: CacheConfig,
    pub jobs: JobSettings,
    pub source: SourceConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorSettings {
    pub max_retries: u32,
    pub grace_minutes: i64,
}

impl ExtractorSettings {
    pub fn to_extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_retries: self.max_retries,
            grace_period: chrono::Duration::minutes(self.grace_minutes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of signed artifact URLs.
    pub url_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Finished jobs older than this are evicted.
    pub retention_secs: i64,
    pub max_jobs: usize,
}

impl JobSettings {
    pub fn to_retention(&self) -> JobRetention {
        JobRetention {
            max_age: chrono::Duration::seconds(self.retention_secs),
            max_jobs: self.max_jobs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse `name:value` pairs separated by commas.
fn env_pairs(name: &str, separator: char) -> Vec<(String, String)> {
    std::env::var(name)
        .map(|raw| {
            raw.split(',')
                .filter_map(|pair| pair.split_once(separator))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    /// Load `.env`, then read the environment and validate.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env();
        config.validate()?;

        Ok(config)
    }

    /// Read the environment over the defaults, without validation.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Config {
            server: ServerConfig {
                host: std::env::var("CONNEX_HOST").unwrap_or(defaults.server.host),
                port: env_parse("CONNEX_PORT").unwrap_or(defaults.server.port),
                shutdown_timeout_secs: env_parse("CONNEX_SHUTDOWN_TIMEOUT")
                    .unwrap_or(defaults.server.shutdown_timeout_secs),
            },
            extractor: ExtractorSettings {
                max_retries: env_parse("CONNEX_MAX_RETRIES")
                    .unwrap_or(defaults.extractor.max_retries),
                grace_minutes: env_parse("CONNEX_GRACE_MINUTES")
                    .unwrap_or(defaults.extractor.grace_minutes),
            },
            cache: CacheConfig {
                url_ttl_secs: env_parse("CONNEX_URL_TTL_SECS")
                    .or_else(|| env_parse("AWS_URL_EXPIRATION"))
                    .unwrap_or(defaults.cache.url_ttl_secs),
            },
            jobs: JobSettings {
                retention_secs: env_parse("CONNEX_JOB_RETENTION_SECS")
                    .unwrap_or(defaults.jobs.retention_secs),
                max_jobs: env_parse("CONNEX_MAX_JOBS").unwrap_or(defaults.jobs.max_jobs),
            },
            source: SourceConfig {
                timeout_secs: env_parse("CONNEX_SOURCE_TIMEOUT_SECS")
                    .unwrap_or(defaults.source.timeout_secs),
                user_agent: std::env::var("CONNEX_SOURCE_USER_AGENT")
                    .unwrap_or(defaults.source.user_agent),
                headers: env_pairs("CONNEX_SOURCE_HEADERS", ':'),
                query: env_pairs("CONNEX_SOURCE_QUERY", '='),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.cache.url_ttl_secs <= 0 {
            anyhow::bail!(
                "Signed URL TTL must be greater than 0 (got {})",
                self.cache.url_ttl_secs
            );
        }

        if self.cache.url_ttl_secs > MAX_URL_TTL_SECS {
            anyhow::bail!(
                "Signed URL TTL must be at most {} seconds (got {})",
                MAX_URL_TTL_SECS,
                self.cache.url_ttl_secs
            );
        }

        if self.jobs.retention_secs <= 0 {
            anyhow::bail!("Job retention must be greater than 0 seconds");
        }

        if self.jobs.max_jobs == 0 {
            anyhow::bail!("Max jobs must be greater than 0");
        }

        if !(0..MINUTES_PER_DAY).contains(&self.extractor.grace_minutes) {
            anyhow::bail!(
                "Grace window must be between 0 and {} minutes (got {})",
                MINUTES_PER_DAY - 1,
                self.extractor.grace_minutes
            );
        }

        if self.source.timeout_secs == 0 {
            anyhow::bail!("Source timeout must be greater than 0");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            extractor: ExtractorSettings {
                max_retries: DEFAULT_MAX_RETRIES,
                grace_minutes: DEFAULT_GRACE_MINUTES,
            },
            cache: CacheConfig {
                url_ttl_secs: DEFAULT_URL_TTL_SECS,
            },
            jobs: JobSettings {
                retention_secs: DEFAULT_JOB_RETENTION_SECS,
                max_jobs: DEFAULT_MAX_JOBS,
            },
            source: SourceConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "CONNEX_PORT",
        "CONNEX_MAX_RETRIES",
        "CONNEX_GRACE_MINUTES",
        "CONNEX_URL_TTL_SECS",
        "AWS_URL_EXPIRATION",
        "CONNEX_SOURCE_HEADERS",
        "CONNEX_JOB_RETENTION_SECS",
        "CONNEX_MAX_JOBS",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extractor.max_retries, 3);
        assert_eq!(
            config.extractor.to_extractor_config().grace_period,
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear();
        std::env::set_var("CONNEX_PORT", "9000");
        std::env::set_var("CONNEX_MAX_RETRIES", "5");
        std::env::set_var("CONNEX_GRACE_MINUTES", "30");
        std::env::set_var("AWS_URL_EXPIRATION", "600");
        std::env::set_var("CONNEX_SOURCE_HEADERS", "X-Api-Key: secret, bogus");

        let config = Config::from_env();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.extractor.max_retries, 5);
        assert_eq!(config.extractor.grace_minutes, 30);
        assert_eq!(config.cache.url_ttl_secs, 600);
        assert_eq!(
            config.source.headers,
            vec![("X-Api-Key".to_string(), "secret".to_string())]
        );

        clear();
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back_to_defaults() {
        clear();
        std::env::set_var("CONNEX_MAX_RETRIES", "-1");

        assert_eq!(Config::from_env().extractor.max_retries, DEFAULT_MAX_RETRIES);

        clear();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.cache.url_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extractor.grace_minutes = MINUTES_PER_DAY;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.jobs.max_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ttl_beyond_presign_limit() {
        let mut config = Config::default();
        config.cache.url_ttl_secs = MAX_URL_TTL_SECS;
        assert!(config.validate().is_ok());

        config.cache.url_ttl_secs = 8 * 24 * 3600;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at most 604800"));
    }

    #[test]
    #[serial]
    fn test_oversized_ttl_from_env_fails_validation() {
        clear();
        std::env::set_var("AWS_URL_EXPIRATION", "691200");

        let config = Config::from_env();
        assert_eq!(config.cache.url_ttl_secs, 691_200);
        assert!(config.validate().is_err());

        clear();
    }

    #[test]
    #[serial]
    fn test_job_retention_from_env() {
        clear();
        std::env::set_var("CONNEX_JOB_RETENTION_SECS", "120");
        std::env::set_var("CONNEX_MAX_JOBS", "10");

        let retention = Config::from_env().jobs.to_retention();
        assert_eq!(retention.max_age, chrono::Duration::seconds(120));
        assert_eq!(retention.max_jobs, 10);

        clear();
    }
}
