//! Scheduler configuration.

use std::time::Duration;

use thiserror::Error;

use bossman_core::DEFAULT_PREFIX;

/// Default Redis connection used when none is configured.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default lock TTL; also the bound on how long one run may hold its job.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Coordination store connection descriptor.
    pub redis_url: String,
    /// Namespace for wake and lock keys.
    pub prefix: String,
    /// TTL of each job's execution lock.
    pub lock_timeout: Duration,
    /// Run `CONFIG SET notify-keyspace-events Ex` on start. Disable for
    /// managed servers that reject `CONFIG` and are configured out of band.
    pub enable_expiry_events: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            enable_expiry_events: true,
        }
    }
}

impl SchedulerConfig {
    /// Load from the process environment.
    ///
    /// - `BOSSMAN_REDIS_URL` (falls back to `REDIS_URL`)
    /// - `BOSSMAN_PREFIX`
    /// - `BOSSMAN_LOCK_TIMEOUT_MS`
    /// - `BOSSMAN_ENABLE_EXPIRY_EVENTS` (`true`/`false`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup (unset variables keep defaults).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BOSSMAN_REDIS_URL").or_else(|| lookup("REDIS_URL")) {
            config.redis_url = url;
        }

        if let Some(prefix) = lookup("BOSSMAN_PREFIX") {
            if prefix.is_empty() {
                return Err(ConfigError::Invalid {
                    var: "BOSSMAN_PREFIX",
                    expected: "a non-empty key prefix",
                    value: prefix,
                });
            }
            config.prefix = prefix;
        }

        if let Some(raw) = lookup("BOSSMAN_LOCK_TIMEOUT_MS") {
            let ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "BOSSMAN_LOCK_TIMEOUT_MS",
                    expected: "a positive number of milliseconds",
                    value: raw.clone(),
                })?;
            config.lock_timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup("BOSSMAN_ENABLE_EXPIRY_EVENTS") {
            config.enable_expiry_events = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "BOSSMAN_ENABLE_EXPIRY_EVENTS",
                        expected: "true or false",
                        value: raw,
                    });
                }
            };
        }

        Ok(config)
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_expiry_events(mut self, enable: bool) -> Self {
        self.enable_expiry_events = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn defaults_match_existing_deployments() {
        let config = SchedulerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.prefix, "bossman:job");
        assert_eq!(config.lock_timeout, Duration::from_millis(2000));
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert!(config.enable_expiry_events);
    }

    #[test]
    fn reads_overrides() {
        let config = SchedulerConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://fallback:6379"),
            ("BOSSMAN_REDIS_URL", "redis://cache:6379/2"),
            ("BOSSMAN_PREFIX", "acme:jobs"),
            ("BOSSMAN_LOCK_TIMEOUT_MS", "5000"),
            ("BOSSMAN_ENABLE_EXPIRY_EVENTS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.redis_url, "redis://cache:6379/2");
        assert_eq!(config.prefix, "acme:jobs");
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert!(!config.enable_expiry_events);
    }

    #[test]
    fn falls_back_to_redis_url() {
        let config =
            SchedulerConfig::from_lookup(lookup(&[("REDIS_URL", "redis://other:6379")])).unwrap();
        assert_eq!(config.redis_url, "redis://other:6379");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(SchedulerConfig::from_lookup(lookup(&[("BOSSMAN_LOCK_TIMEOUT_MS", "0")])).is_err());
        assert!(SchedulerConfig::from_lookup(lookup(&[("BOSSMAN_LOCK_TIMEOUT_MS", "soon")])).is_err());
        assert!(SchedulerConfig::from_lookup(lookup(&[("BOSSMAN_PREFIX", "")])).is_err());
        assert!(
            SchedulerConfig::from_lookup(lookup(&[("BOSSMAN_ENABLE_EXPIRY_EVENTS", "maybe")]))
                .is_err()
        );
    }
}
