//! Environment-driven server configuration.

use std::time::Duration;

use tasso::TassoConfig;
use tasso_jhu::DEFAULT_BASE_URL;

use crate::ServerError;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 4567;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port to listen on, all interfaces.
    pub port: u16,
    /// Value of `Access-Control-Allow-Origin`; the header is omitted when `None`.
    pub allowed_origin: Option<String>,
    /// Base URL of the daily report directory.
    pub source_base_url: String,
    /// Preload and query settings.
    pub tasso: TassoConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origin: None,
            source_base_url: DEFAULT_BASE_URL.to_string(),
            tasso: TassoConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    /// See [`ServerConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    ///
    /// Recognized variables: `PORT`, `CASES_PER_TEST_FRONTEND_DOMAIN`,
    /// `TASSO_SOURCE_BASE_URL`, `TASSO_MAX_CONCURRENT_FETCHES`,
    /// `TASSO_INCLUDE_LATEST_DAY`, `TASSO_READY_TIMEOUT_SECS`,
    /// `TASSO_DAY_RETRY_ATTEMPTS`.
    ///
    /// # Errors
    /// Returns `ServerError::Config` naming the variable that failed to parse,
    /// or when the resulting preload configuration is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(port) = get("PORT") {
            cfg.port = parse_var("PORT", &port)?;
        }
        cfg.allowed_origin = get("CASES_PER_TEST_FRONTEND_DOMAIN");
        if let Some(url) = get("TASSO_SOURCE_BASE_URL") {
            cfg.source_base_url = url;
        }
        if let Some(n) = get("TASSO_MAX_CONCURRENT_FETCHES") {
            cfg.tasso.max_concurrent_fetches = parse_var("TASSO_MAX_CONCURRENT_FETCHES", &n)?;
        }
        if let Some(flag) = get("TASSO_INCLUDE_LATEST_DAY") {
            cfg.tasso.include_latest_day = parse_flag("TASSO_INCLUDE_LATEST_DAY", &flag)?;
        }
        if let Some(secs) = get("TASSO_READY_TIMEOUT_SECS") {
            let secs: u64 = parse_var("TASSO_READY_TIMEOUT_SECS", &secs)?;
            cfg.tasso.ready_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(n) = get("TASSO_DAY_RETRY_ATTEMPTS") {
            cfg.tasso.day_retry.max_attempts = parse_var("TASSO_DAY_RETRY_ATTEMPTS", &n)?;
        }

        cfg.tasso
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ServerError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ServerError::Config(format!("{key}='{raw}': {e}")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ServerError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServerError::Config(format!(
            "{key}='{raw}': expected true or false"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<ServerConfig, ServerError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.port, 4567);
        assert_eq!(cfg.allowed_origin, None);
        assert_eq!(cfg.tasso.max_concurrent_fetches, 20);
    }

    #[test]
    fn reads_every_variable() {
        let cfg = from(&[
            ("PORT", "8080"),
            ("CASES_PER_TEST_FRONTEND_DOMAIN", "https://example.org"),
            ("TASSO_SOURCE_BASE_URL", "http://mirror.local/daily/"),
            ("TASSO_MAX_CONCURRENT_FETCHES", "8"),
            ("TASSO_INCLUDE_LATEST_DAY", "true"),
            ("TASSO_READY_TIMEOUT_SECS", "30"),
            ("TASSO_DAY_RETRY_ATTEMPTS", "3"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.allowed_origin.as_deref(), Some("https://example.org"));
        assert_eq!(cfg.source_base_url, "http://mirror.local/daily/");
        assert_eq!(cfg.tasso.max_concurrent_fetches, 8);
        assert!(cfg.tasso.include_latest_day);
        assert_eq!(cfg.tasso.ready_timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.tasso.day_retry.max_attempts, 3);
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let cfg = from(&[("PORT", ""), ("CASES_PER_TEST_FRONTEND_DOMAIN", "  ")]).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.allowed_origin, None);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = from(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        let err = from(&[("TASSO_INCLUDE_LATEST_DAY", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("TASSO_INCLUDE_LATEST_DAY"));
    }

    #[test]
    fn zero_pool_is_rejected() {
        assert!(matches!(
            from(&[("TASSO_MAX_CONCURRENT_FETCHES", "0")]),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn oversized_pool_is_rejected() {
        let huge = usize::MAX.to_string();
        match from(&[("TASSO_MAX_CONCURRENT_FETCHES", huge.as_str())]) {
            Err(ServerError::Config(msg)) => assert!(msg.contains("at most"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
