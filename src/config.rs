//! Configuration management for agent-handshake.
//!
//! Configuration is read from environment variables:
//! - `INVITER_ADMIN_URL` - Required. Admin API base URL of the inviting agent.
//! - `INVITEE_ADMIN_URL` - Required. Admin API base URL of the invited agent.
//! - `INVITER_ADMIN_API_KEY` / `INVITEE_ADMIN_API_KEY` - Optional. Sent as `x-api-key`.
//! - `HANDSHAKE_ALIAS` - Optional. Connection alias, sent as a listing filter and used by `last-match` correlation. Defaults to `handshake-<uuid>`.
//! - `HANDSHAKE_MY_LABEL` - Optional. Label the invitee presents when accepting.
//! - `HANDSHAKE_TARGET_STATE` - Optional. Inviter state to wait for. Defaults to `request`.
//! - `HANDSHAKE_CORRELATION` - Optional. `strict` or `last-match`. Defaults to `strict`.
//! - `POLL_INTERVAL_MS` - Optional. First poll delay. Defaults to `250`.
//! - `POLL_MAX_INTERVAL_MS` - Optional. Poll delay cap. Defaults to `2000`.
//! - `POLL_BACKOFF_FACTOR` - Optional. Poll delay multiplier. Defaults to `2`.
//! - `POLL_TIMEOUT_SECS` - Optional. Poll wait budget. Defaults to `30`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Per-request HTTP timeout. Defaults to `10`.
//! - `RUN_TIMEOUT_SECS` - Optional. Whole-handshake timeout. Defaults to `120`.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::handshake::{CorrelationPolicy, HandshakeOptions, PollPolicy, DEFAULT_TARGET_STATE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// One agent's admin API.
#[derive(Clone)]
pub struct AgentEndpoint {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AgentEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub inviter: AgentEndpoint,
    pub invitee: AgentEndpoint,
    pub request_timeout: Duration,
    pub handshake: HandshakeOptions,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if either admin URL is unset and
    /// `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let inviter_url = get("INVITER_ADMIN_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("INVITER_ADMIN_URL".to_string()))?;
        let invitee_url = get("INVITEE_ADMIN_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("INVITEE_ADMIN_URL".to_string()))?;
        let inviter_url = validate_url("INVITER_ADMIN_URL", &inviter_url)?;
        let invitee_url = validate_url("INVITEE_ADMIN_URL", &invitee_url)?;
        if inviter_url == invitee_url {
            return Err(ConfigError::InvalidValue(
                "INVITEE_ADMIN_URL".to_string(),
                "must differ from INVITER_ADMIN_URL".to_string(),
            ));
        }

        let poll = PollPolicy {
            initial_interval: Duration::from_millis(parse_or(&get, "POLL_INTERVAL_MS", 250)?),
            max_interval: Duration::from_millis(parse_or(&get, "POLL_MAX_INTERVAL_MS", 2000)?),
            backoff_factor: parse_or(&get, "POLL_BACKOFF_FACTOR", 2)?,
            max_wait: Duration::from_secs(parse_or(&get, "POLL_TIMEOUT_SECS", 30)?),
        };
        if poll.backoff_factor == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_BACKOFF_FACTOR".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let handshake = HandshakeOptions {
            alias: Some(get("HANDSHAKE_ALIAS").unwrap_or_else(default_alias)),
            my_label: get("HANDSHAKE_MY_LABEL"),
            target_state: get("HANDSHAKE_TARGET_STATE")
                .unwrap_or_else(|| DEFAULT_TARGET_STATE.to_string()),
            correlation: parse_or(&get, "HANDSHAKE_CORRELATION", CorrelationPolicy::Strict)?,
            poll,
            run_timeout: Duration::from_secs(parse_or(&get, "RUN_TIMEOUT_SECS", 120)?),
        };

        Ok(Self {
            inviter: AgentEndpoint {
                base_url: inviter_url,
                api_key: get("INVITER_ADMIN_API_KEY"),
            },
            invitee: AgentEndpoint {
                base_url: invitee_url,
                api_key: get("INVITEE_ADMIN_API_KEY"),
            },
            request_timeout: Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECS", 10)?),
            handshake,
        })
    }

    /// Create a config with default timing for two endpoints (useful for testing).
    pub fn new(inviter_url: impl Into<String>, invitee_url: impl Into<String>) -> Self {
        Self {
            inviter: AgentEndpoint {
                base_url: inviter_url.into(),
                api_key: None,
            },
            invitee: AgentEndpoint {
                base_url: invitee_url.into(),
                api_key: None,
            },
            request_timeout: Duration::from_secs(10),
            handshake: HandshakeOptions::default(),
        }
    }
}

fn default_alias() -> String {
    format!("handshake-{}", Uuid::new_v4())
}

fn validate_url(name: &str, value: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(value.trim().trim_end_matches('/').to_string())
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}
