use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { key: &'static str, value: String },
}

/// Process-wide settings, read once before the first invocation is served.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `None` when `GEMINI_API_KEY` is unset or empty; every request is then refused.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    /// No upstream timeout unless one is configured explicitly.
    pub timeout: Option<Duration>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let timeout = match get("GEMINI_TIMEOUT_SECS") {
            Some(value) => {
                let Ok(secs) = value.trim().parse::<u64>() else {
                    return Err(ConfigError::InvalidTimeout {
                        key: "GEMINI_TIMEOUT_SECS",
                        value,
                    });
                };
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            api_key: get("GEMINI_API_KEY"),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = config_from(&[("GEMINI_API_KEY", "secret")]).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let config = config_from(&[("GEMINI_API_KEY", "")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn overrides_are_honoured() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("GEMINI_API_BASE", "http://localhost:9000/v1beta/"),
            ("GEMINI_TIMEOUT_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let err = config_from(&[("GEMINI_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
    }
}
