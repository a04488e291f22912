use cadence_common::error::{CadenceError, CadenceResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::thresholds::{ChangeFailureThresholds, DeploymentFrequencyThresholds, DoraThresholds};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub cache_ttl_secs: u64,
    pub query_timeout_secs: u64,
    pub aggregation_page_size: u32,
    pub default_page_size: u32,
    pub thresholds: DoraThresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            cache_ttl_secs: 3600,
            query_timeout_secs: 120,
            aggregation_page_size: 1000,
            default_page_size: 100,
            thresholds: DoraThresholds::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present; every variable has a default.
    pub fn from_env() -> CadenceResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let defaults = DoraThresholds::default();
        let df = defaults.deployment_frequency;
        let cfr = defaults.change_failure_rate;

        let thresholds = DoraThresholds {
            deployment_frequency: DeploymentFrequencyThresholds {
                elite_min: parse_var("DORA_DF_ELITE_MIN", df.elite_min)?,
                high_min: parse_var("DORA_DF_HIGH_MIN", df.high_min)?,
                medium_min: parse_var("DORA_DF_MEDIUM_MIN", df.medium_min)?,
            },
            change_failure_rate: ChangeFailureThresholds {
                elite_max: parse_var("DORA_CFR_ELITE_MAX", cfr.elite_max)?,
                high_max: parse_var("DORA_CFR_HIGH_MAX", cfr.high_max)?,
                medium_max: parse_var("DORA_CFR_MEDIUM_MAX", cfr.medium_max)?,
            },
        };
        thresholds.validate()?;

        let cfg = Self {
            log_level: get_var_or("LOG_LEVEL", "info"),
            cache_ttl_secs: parse_var("DORA_CACHE_TTL_SECS", 3600)?,
            query_timeout_secs: parse_var("DORA_QUERY_TIMEOUT_SECS", 120)?,
            aggregation_page_size: parse_var("DORA_AGGREGATION_PAGE_SIZE", 1000)?,
            default_page_size: parse_var("DORA_DEFAULT_PAGE_SIZE", 100)?,
            thresholds,
        };

        if cfg.aggregation_page_size == 0 || cfg.default_page_size == 0 {
            return Err(CadenceError::Config("page sizes must be positive".into()));
        }
        Ok(cfg)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var<T>(key: &str, default: T) -> CadenceResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CadenceError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "LOG_LEVEL",
        "DORA_CACHE_TTL_SECS",
        "DORA_QUERY_TIMEOUT_SECS",
        "DORA_AGGREGATION_PAGE_SIZE",
        "DORA_DEFAULT_PAGE_SIZE",
        "DORA_DF_ELITE_MIN",
        "DORA_DF_HIGH_MIN",
        "DORA_DF_MEDIUM_MIN",
        "DORA_CFR_ELITE_MAX",
        "DORA_CFR_HIGH_MAX",
        "DORA_CFR_MEDIUM_MAX",
    ];

    fn clear() {
        for key in ALL_VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn config_from_env_uses_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear();

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.cache_ttl_secs, 3600);
        assert_eq!(cfg.query_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.aggregation_page_size, 1000);
        assert_eq!(cfg.default_page_size, 100);
        assert_eq!(cfg.thresholds, DoraThresholds::default());
    }

    #[test]
    fn config_from_env_reads_overrides() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear();

        env::set_var("DORA_CACHE_TTL_SECS", "60");
        env::set_var("DORA_DF_ELITE_MIN", "2.5");
        env::set_var("LOG_LEVEL", "debug");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.thresholds.deployment_frequency.elite_min, 2.5);
        assert_eq!(cfg.log_level, "debug");

        clear();
    }

    #[test]
    fn config_from_env_rejects_garbage_number() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear();

        env::set_var("DORA_QUERY_TIMEOUT_SECS", "soon");
        let result = AppConfig::from_env();
        assert!(matches!(result, Err(CadenceError::Config(_))));

        clear();
    }

    #[test]
    fn config_from_env_rejects_unordered_thresholds() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear();

        env::set_var("DORA_CFR_ELITE_MAX", "50");
        assert!(AppConfig::from_env().is_err());

        clear();
    }

    #[test]
    fn config_from_env_rejects_zero_page_size() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear();

        env::set_var("DORA_DEFAULT_PAGE_SIZE", "0");
        assert!(AppConfig::from_env().is_err());

        clear();
    }
}
