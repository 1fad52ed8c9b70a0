//! Service configuration read from the environment (after `dotenvy` loads `.env`)

use std::env;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_DEFAULT_CHANNEL_CODE: &str = "DEFAULT_CHANNEL_CODE";
pub const ENV_TRANSITION_POLICY: &str = "TRANSITION_POLICY";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CHANNEL_CODE: &str = "D";

/// Which node transition policy the state machine enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicyKind {
    /// Any node of the ticket type's vocabulary is reachable from any other
    #[default]
    Permissive,
    /// Built-in forward workflow table
    Strict,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub default_channel_code: String,
    pub transition_policy: TransitionPolicyKind,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid { var, value } => write!(f, "Invalid value for {}: {}", var, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;

        let bind_addr = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let default_channel_code = match lookup(ENV_DEFAULT_CHANNEL_CODE) {
            Some(raw) => crate::services::sequence::normalize_channel_code(&raw).map_err(|_| {
                ConfigError::Invalid {
                    var: ENV_DEFAULT_CHANNEL_CODE,
                    value: raw.clone(),
                }
            })?,
            None => DEFAULT_CHANNEL_CODE.to_string(),
        };

        let transition_policy = match lookup(ENV_TRANSITION_POLICY).as_deref() {
            None | Some("") | Some("permissive") => TransitionPolicyKind::Permissive,
            Some("strict") => TransitionPolicyKind::Strict,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: ENV_TRANSITION_POLICY,
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            database_url,
            bind_addr,
            default_channel_code,
            transition_policy,
        })
    }
}
