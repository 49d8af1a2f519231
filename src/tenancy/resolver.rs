//! Host to tenant resolution.
//!
//! # Design Decisions
//! - Exact, case-insensitive hostname match; no wildcard inference
//! - Port suffix and trailing dot are ignored
//! - Unknown hosts resolve to the default tenant unless strict mode is on

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::EdgeConfig;

/// Opaque tenant identifier forwarded to upstreams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(Arc<str>);

impl TenantId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for TenantId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for TenantId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// How a tenant was determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The host has an explicit mapping.
    Configured(TenantId),
    /// The host is unknown or missing; the default tenant applies.
    Fallback(TenantId),
}

impl Resolution {
    pub fn tenant(&self) -> &TenantId {
        match self {
            Resolution::Configured(t) | Resolution::Fallback(t) => t,
        }
    }

    pub fn into_tenant(self) -> TenantId {
        match self {
            Resolution::Configured(t) | Resolution::Fallback(t) => t,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback(_))
    }
}

/// Static hostname → tenant table.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    hosts: HashMap<String, TenantId>,
    default: TenantId,
}

impl TenantResolver {
    pub fn new(default: impl AsRef<str>) -> Self {
        Self {
            hosts: HashMap::new(),
            default: TenantId::new(default),
        }
    }

    pub fn from_config(config: &EdgeConfig) -> Self {
        config.hosts.iter().fold(Self::new(&config.default_tenant), |resolver, host| {
            resolver.with_host(&host.name, &host.tenant)
        })
    }

    /// Add a hostname mapping.
    pub fn with_host(mut self, host: &str, tenant: impl AsRef<str>) -> Self {
        self.hosts.insert(normalize_host(host).to_string(), TenantId::new(tenant));
        self
    }

    /// Resolve a `Host` header value to its tenant.
    pub fn resolve(&self, host_header: Option<&str>) -> Resolution {
        host_header
            .map(normalize_host)
            .and_then(|host| self.hosts.get(host.as_ref()))
            .map(|tenant| Resolution::Configured(tenant.clone()))
            .unwrap_or_else(|| Resolution::Fallback(self.default.clone()))
    }

    pub fn default_tenant(&self) -> &TenantId {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Strip the port and trailing dot, then lowercase for lookup.
///
/// Returns a borrowed slice when already lowercase, which is the common case.
pub(crate) fn normalize_host(host: &str) -> std::borrow::Cow<'_, str> {
    let host = host.trim();
    let without_port = if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal: "[::1]:443"
        rest.split_once(']').map(|(addr, _)| addr).unwrap_or(rest)
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        }
    };
    let trimmed = without_port.strip_suffix('.').unwrap_or(without_port);
    if trimmed.bytes().any(|b| b.is_ascii_uppercase()) {
        std::borrow::Cow::Owned(trimmed.to_ascii_lowercase())
    } else {
        std::borrow::Cow::Borrowed(trimmed)
    }
}
