//! Transport policies bound to routes.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

use crate::config::PolicyConfig;

/// Error building a policy from configuration.
#[derive(Debug, thiserror::Error)]
#[error("policy '{policy}': invalid extra header '{header}'")]
pub struct InvalidPolicyHeader {
    pub policy: String,
    pub header: String,
}

/// How a route's requests travel to the upstream. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPolicy {
    pub name: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub buffering: bool,
    pub upgrade: bool,
    pub extra_headers: Vec<(HeaderName, HeaderValue)>,
}

impl TransportPolicy {
    pub fn from_config(name: &str, config: &PolicyConfig) -> Result<Self, InvalidPolicyHeader> {
        let extra_headers = config
            .extra_headers
            .iter()
            .map(|(header, value)| {
                let parsed = HeaderName::from_bytes(header.as_bytes())
                    .ok()
                    .zip(HeaderValue::from_str(value).ok());
                parsed.ok_or_else(|| InvalidPolicyHeader {
                    policy: name.to_string(),
                    header: header.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            buffering: config.buffering,
            upgrade: config.upgrade,
            extra_headers,
        })
    }

    /// True when bodies are relayed as they arrive.
    pub fn is_streaming(&self) -> bool {
        !self.buffering
    }
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            name: crate::config::DEFAULT_POLICY.to_string(),
            connect_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            buffering: true,
            upgrade: false,
            extra_headers: Vec::new(),
        }
    }
}
