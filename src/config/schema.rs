//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge
//! router. All types derive Serde traits for deserialization from TOML.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the transport policy every configuration implicitly carries.
pub const DEFAULT_POLICY: &str = "default";

/// Root configuration for the edge router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Tenant assigned to hosts without an explicit mapping.
    pub default_tenant: String,

    /// Header carrying the resolved tenant to upstreams.
    pub tenant_header: String,

    /// Reject hosts without a tenant mapping instead of using the default.
    pub strict_hosts: bool,

    /// Listener configuration (bind addresses, limits).
    pub listener: ListenerConfig,

    /// TLS certificates, selected by SNI. Absent means plain HTTP.
    pub tls: Option<TlsConfig>,

    /// Hostname to tenant mappings.
    pub hosts: Vec<HostConfig>,

    /// Backend services.
    pub upstreams: Vec<UpstreamConfig>,

    /// Named transport policies referenced by routes.
    pub policies: BTreeMap<String, PolicyConfig>,

    /// Ordered route rules. The first rule that matches wins.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            default_tenant: "default".to_string(),
            tenant_header: "X-Tenant-ID".to_string(),
            strict_hosts: false,
            listener: ListenerConfig::default(),
            tls: None,
            hosts: Vec::new(),
            upstreams: Vec::new(),
            policies: BTreeMap::new(),
            routes: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl EdgeConfig {
    /// Look up a policy by name, falling back to the built-in default policy.
    pub fn policy(&self, name: &str) -> Option<PolicyConfig> {
        match self.policies.get(name) {
            Some(policy) => Some(policy.clone()),
            None if name == DEFAULT_POLICY => Some(PolicyConfig::default()),
            None => None,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Gateway bind address (e.g., "0.0.0.0:443").
    pub bind_address: String,

    /// Plaintext bind address answering with HTTPS redirects.
    pub redirect_address: Option<String>,

    /// Port placed in redirect targets (omitted when 443).
    pub https_port: u16,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Bytes of a buffered response held back before streaming starts.
    pub response_buffer_bytes: usize,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:443".to_string(),
            redirect_address: None,
            https_port: 443,
            max_body_size: 100 * 1024 * 1024, // 100M
            response_buffer_bytes: 64 * 1024,
            shutdown_grace_secs: 10,
        }
    }
}

/// TLS configuration for the gateway listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    pub certificates: Vec<CertificateConfig>,
}

/// One certificate chain and the hostnames it serves.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    /// SNI names this certificate is presented for.
    pub hosts: Vec<String>,

    /// Path to certificate chain (PEM).
    pub cert_path: String,

    /// Path to private key (PEM).
    pub key_path: String,
}

/// Maps one hostname to a tenant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Hostname as sent in the Host header (case-insensitive).
    pub name: String,

    /// Tenant identifier forwarded to upstreams.
    pub tenant: String,
}

/// A backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream identifier.
    pub name: String,

    /// Upstream address (e.g., "localhost:5580").
    pub address: String,
}

/// Transport policy applied when forwarding.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Wait for the response head, and between response body chunks.
    pub read_timeout_secs: u64,

    /// Gap allowed between request body chunks sent upstream.
    pub write_timeout_secs: u64,

    /// Buffer request and response bodies. Disable for event streams.
    pub buffering: bool,

    /// Pass protocol upgrades (websocket, live reload) through.
    pub upgrade: bool,

    /// Headers set on every forwarded request.
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 60,
            read_timeout_secs: 60,
            write_timeout_secs: 60,
            buffering: true,
            upgrade: false,
            extra_headers: BTreeMap::new(),
        }
    }
}

/// Route rule mapping request paths to an upstream.
///
/// The matcher kind follows from the fields present:
/// `segments` selects segment-class matching under `path_prefix` (empty root
/// when absent), `path_prefix` alone is a literal prefix match, and neither
/// matches every path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Literal path prefix (or segment root when `segments` is set).
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Allowed first path segments below the root.
    #[serde(default)]
    pub segments: Vec<String>,

    /// Literal prefix removed from the path before forwarding.
    #[serde(default)]
    pub strip_prefix: Option<String>,

    /// Upstream name to forward to.
    pub upstream: String,

    /// Transport policy name.
    #[serde(default = "default_policy_name")]
    pub policy: String,
}

fn default_policy_name() -> String {
    DEFAULT_POLICY.to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [[upstreams]]
            name = "frontend"
            address = "localhost:6176"

            [[routes]]
            name = "frontend"
            upstream = "frontend"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_tenant, "default");
        assert_eq!(config.tenant_header, "X-Tenant-ID");
        assert_eq!(config.listener.max_body_size, 100 * 1024 * 1024);
        assert_eq!(config.routes[0].policy, DEFAULT_POLICY);
        assert!(config.tls.is_none());
    }

    #[test]
    fn default_policy_always_resolves() {
        let config = EdgeConfig::default();
        assert_eq!(config.policy(DEFAULT_POLICY), Some(PolicyConfig::default()));
        assert_eq!(config.policy("streaming"), None);
    }

    #[test]
    fn policy_table_parses_extra_headers() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [policies.streaming]
            read_timeout_secs = 600
            buffering = false
            extra_headers = { "Cache-Control" = "no-cache" }
            "#,
        )
        .unwrap();

        let policy = config.policy("streaming").unwrap();
        assert_eq!(policy.read_timeout_secs, 600);
        assert_eq!(policy.connect_timeout_secs, 60);
        assert!(!policy.buffering);
        assert_eq!(policy.extra_headers["Cache-Control"], "no-cache");
    }
}
