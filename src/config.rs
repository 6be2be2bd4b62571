use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::errors::{OrderError, ValidationErrors};

// ============================================================================
// Configuration
// ============================================================================
//
// Every setting comes from the environment (a .env file is loaded first when
// present) and falls back to a default.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown backend '{}', expected redis or memory", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub prefix: String,
    pub metrics_port: u16,
    pub backend: BackendKind,
    pub redis_url: String,
    pub request_timeout: Duration,
    pub log_level: String,
    pub is_prod_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8888".to_string(),
            prefix: "/orders-api".to_string(),
            metrics_port: 9090,
            backend: BackendKind::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            request_timeout: Duration::from_millis(5000),
            log_level: "info".to_string(),
            is_prod_mode: false,
        }
    }
}

pub const LOG_LEVEL_KEY: &str = "ORDERS_LOG_LEVEL";

/// Read a .env file into the process environment. Runs before logging is
/// installed, so the caller reports the result.
pub fn load_dotenv() -> bool {
    dotenv::dotenv().is_ok()
}

/// Log level needed to install the subscriber before the full config is parsed
pub fn log_level_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(LOG_LEVEL_KEY)
        .map(|level| level.trim().to_string())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| Config::default().log_level)
}

impl Config {
    /// Load from the process environment. Expects logging to be installed
    /// already so fallback warnings are not lost.
    pub fn load() -> Result<Self, OrderError> {
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        info!(backend = %config.backend, listen = %config.listen, "Configuration loaded");
        Ok(config)
    }

    /// Load through an arbitrary key lookup; unset keys take their default
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OrderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let mut ve = ValidationErrors::new();

        let config = Config {
            listen: lookup("ORDERS_LISTEN").unwrap_or(defaults.listen),
            prefix: lookup("ORDERS_PREFIX").unwrap_or(defaults.prefix),
            metrics_port: parse_or(&lookup, &mut ve, "ORDERS_METRICS_PORT", defaults.metrics_port),
            backend: parse_or(&lookup, &mut ve, "ORDERS_BACKEND", defaults.backend),
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            request_timeout: Duration::from_millis(parse_or(
                &lookup,
                &mut ve,
                "ORDERS_REQUEST_TIMEOUT_MS",
                defaults.request_timeout.as_millis() as u64,
            )),
            log_level: lookup(LOG_LEVEL_KEY).unwrap_or(defaults.log_level),
            is_prod_mode: parse_or(&lookup, &mut ve, "ORDERS_PROD_MODE", defaults.is_prod_mode),
        };

        ve.into_result()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        let mut ve = ValidationErrors::new();

        if self.listen.trim().is_empty() {
            ve.add("listen", "cannot be empty");
        }
        if !self.prefix.is_empty() && !self.prefix.starts_with('/') {
            ve.add("prefix", "must start with '/'");
        }
        if self.prefix.ends_with('/') {
            ve.add("prefix", "must not end with '/'");
        }
        if self.log_level.trim().is_empty() {
            ve.add("log_level", "cannot be empty");
        }
        if self.backend == BackendKind::Redis && self.redis_url.trim().is_empty() {
            ve.add("redis_url", "cannot be empty");
        }
        if self.request_timeout.is_zero() {
            ve.add("request_timeout", "must be greater than zero");
        }

        ve.into_result()
    }
}

fn parse_or<T, F>(lookup: &F, ve: &mut ValidationErrors, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value: {e}");
            ve.add(key, format!("invalid value '{}': {}", raw, e));
            default
        }),
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Redis => write!(f, "redis"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, OrderError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8888");
        assert_eq!(config.backend, BackendKind::Redis);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(!config.is_prod_mode);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = load(&[
            ("ORDERS_BACKEND", "Memory"),
            ("ORDERS_METRICS_PORT", "9999"),
            ("ORDERS_REQUEST_TIMEOUT_MS", "250"),
            ("ORDERS_PROD_MODE", "true"),
            ("ORDERS_PREFIX", "/shop"),
        ])
        .unwrap();

        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.metrics_port, 9999);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert!(config.is_prod_mode);
        assert_eq!(config.prefix, "/shop");
    }

    #[test]
    fn test_invalid_values_are_all_reported() {
        let err = load(&[
            ("ORDERS_METRICS_PORT", "not-a-port"),
            ("ORDERS_BACKEND", "postgres"),
        ])
        .unwrap_err();

        match err {
            OrderError::ValidationFailed(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["ORDERS_METRICS_PORT", "ORDERS_BACKEND"]);
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_prefix_and_zero_timeout() {
        let config = Config {
            prefix: "orders/".to_string(),
            request_timeout: Duration::ZERO,
            ..Config::default()
        };

        match config.validate().unwrap_err() {
            OrderError::ValidationFailed(fields) => assert_eq!(fields.len(), 3),
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_log_level_bootstrap() {
        assert_eq!(log_level_from(|_| None), "info");
        assert_eq!(log_level_from(|_| Some("  ".to_string())), "info");
        assert_eq!(log_level_from(|key| (key == LOG_LEVEL_KEY).then(|| " debug ".to_string())), "debug");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_fallback_warning_reaches_installed_subscriber() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _ = load(&[("ORDERS_METRICS_PORT", "not-a-port")]);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Invalid ORDERS_METRICS_PORT value"));
    }
}
