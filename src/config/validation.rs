//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing upstreams and policies)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect rules shadowed by an earlier catch-all
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};

use axum::http::uri::Authority;
use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{EdgeConfig, PolicyConfig, RouteConfig};
use crate::tenancy::resolver::normalize_host;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("route '{route}' references unknown upstream '{upstream}'")]
    UnknownUpstream { route: String, upstream: String },
    #[error("route '{route}' references unknown policy '{policy}'")]
    UnknownPolicy { route: String, policy: String },
    #[error("upstream '{name}' has invalid address '{address}'")]
    InvalidAddress { name: String, address: String },
    #[error("route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },
    #[error("route '{route}' can never match: shadowed by catch-all '{shadowed_by}'")]
    ShadowedRoute { route: String, shadowed_by: String },
    #[error("policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },
    #[error("host '{host}' mapped to both '{first}' and '{second}'")]
    ConflictingHost { host: String, first: String, second: String },
    #[error("invalid header name '{0}'")]
    InvalidHeader(String),
    #[error("invalid listener setting: {0}")]
    InvalidListener(String),
    #[error("tls: {0}")]
    InvalidTls(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_listener(config, &mut errors);
    validate_hosts(config, &mut errors);
    validate_upstreams(config, &mut errors);
    for (name, policy) in &config.policies {
        validate_policy(name, policy, &mut errors);
    }
    validate_routes(config, &mut errors);
    validate_tls(config, &mut errors);

    if HeaderName::from_bytes(config.tenant_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeader(config.tenant_header.clone()));
    }
    if HeaderValue::from_str(&config.default_tenant).is_err() || config.default_tenant.is_empty() {
        errors.push(ValidationError::InvalidListener(format!(
            "default tenant '{}' is not a valid header value",
            config.default_tenant
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_listener(config: &EdgeConfig, errors: &mut Vec<ValidationError>) {
    let listener = &config.listener;
    if listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListener(format!(
            "bind_address '{}' is not a socket address",
            listener.bind_address
        )));
    }
    if let Some(redirect) = &listener.redirect_address {
        if redirect.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidListener(format!(
                "redirect_address '{}' is not a socket address",
                redirect
            )));
        }
    }
    if listener.max_body_size == 0 {
        errors.push(ValidationError::InvalidListener("max_body_size must be > 0".into()));
    }
}

fn validate_hosts(config: &EdgeConfig, errors: &mut Vec<ValidationError>) {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for host in &config.hosts {
        if HeaderValue::from_str(&host.tenant).is_err() || host.tenant.is_empty() {
            errors.push(ValidationError::InvalidListener(format!(
                "tenant '{}' for host '{}' is not a valid header value",
                host.tenant, host.name
            )));
        }
        let key = normalize_host(&host.name).into_owned();
        match seen.get(&key) {
            Some(first) if *first != host.tenant => {
                errors.push(ValidationError::ConflictingHost {
                    host: host.name.clone(),
                    first: first.to_string(),
                    second: host.tenant.clone(),
                });
            }
            Some(_) => {}
            None => {
                seen.insert(key, &host.tenant);
            }
        }
    }
}

fn validate_upstreams(config: &EdgeConfig, errors: &mut Vec<ValidationError>) {
    let mut names = HashSet::new();
    for upstream in &config.upstreams {
        if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                kind: "upstream",
                name: upstream.name.clone(),
            });
        }
        let parsed = upstream.address.parse::<Authority>();
        if !matches!(parsed, Ok(ref authority) if authority.port_u16().is_some()) {
            errors.push(ValidationError::InvalidAddress {
                name: upstream.name.clone(),
                address: upstream.address.clone(),
            });
        }
    }
}

fn validate_policy(name: &str, policy: &PolicyConfig, errors: &mut Vec<ValidationError>) {
    for (field, value) in [
        ("connect_timeout_secs", policy.connect_timeout_secs),
        ("read_timeout_secs", policy.read_timeout_secs),
        ("write_timeout_secs", policy.write_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::InvalidPolicy {
                policy: name.to_string(),
                reason: format!("{field} must be > 0"),
            });
        }
    }
    for (header, value) in &policy.extra_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeader(header.clone()));
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidPolicy {
                policy: name.to_string(),
                reason: format!("invalid value for header '{header}'"),
            });
        }
    }
}

fn validate_routes(config: &EdgeConfig, errors: &mut Vec<ValidationError>) {
    let upstreams: HashSet<&str> = config.upstreams.iter().map(|u| u.name.as_str()).collect();
    let mut names = HashSet::new();
    let mut catch_all: Option<&str> = None;

    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                kind: "route",
                name: route.name.clone(),
            });
        }
        if !upstreams.contains(route.upstream.as_str()) {
            errors.push(ValidationError::UnknownUpstream {
                route: route.name.clone(),
                upstream: route.upstream.clone(),
            });
        }
        if config.policy(&route.policy).is_none() {
            errors.push(ValidationError::UnknownPolicy {
                route: route.name.clone(),
                policy: route.policy.clone(),
            });
        }
        if let Err(reason) = check_route_shape(route) {
            errors.push(ValidationError::InvalidRoute {
                route: route.name.clone(),
                reason,
            });
        }

        if let Some(shadowed_by) = catch_all {
            errors.push(ValidationError::ShadowedRoute {
                route: route.name.clone(),
                shadowed_by: shadowed_by.to_string(),
            });
        } else if route.path_prefix.is_none() && route.segments.is_empty() {
            catch_all = Some(route.name.as_str());
        }
    }
}

fn check_route_shape(route: &RouteConfig) -> Result<(), String> {
    if let Some(prefix) = &route.path_prefix {
        if !prefix.starts_with('/') {
            return Err(format!("path_prefix '{prefix}' must start with '/'"));
        }
    }
    for segment in &route.segments {
        if segment.is_empty() || segment.contains('/') {
            return Err(format!("segment '{segment}' must be a single non-empty path segment"));
        }
    }
    if let Some(strip) = &route.strip_prefix {
        if !strip.starts_with('/') {
            return Err(format!("strip_prefix '{strip}' must start with '/'"));
        }
        let admitted = route.path_prefix.as_deref().unwrap_or("");
        if !admitted.starts_with(strip.as_str()) {
            return Err(format!(
                "strip_prefix '{strip}' is not a prefix of the matched path '{admitted}'"
            ));
        }
    }
    Ok(())
}

fn validate_tls(config: &EdgeConfig, errors: &mut Vec<ValidationError>) {
    let Some(tls) = &config.tls else {
        return;
    };
    if tls.certificates.is_empty() {
        errors.push(ValidationError::InvalidTls("no certificates configured".into()));
    }
    let mut served = HashSet::new();
    for cert in &tls.certificates {
        if cert.hosts.is_empty() {
            errors.push(ValidationError::InvalidTls(format!(
                "certificate '{}' lists no hosts",
                cert.cert_path
            )));
        }
        for host in &cert.hosts {
            if !served.insert(normalize_host(host).into_owned()) {
                errors.push(ValidationError::InvalidTls(format!(
                    "host '{host}' has more than one certificate"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CertificateConfig, HostConfig, TlsConfig, UpstreamConfig};

    fn base() -> EdgeConfig {
        let mut config = EdgeConfig::default();
        config.upstreams.push(UpstreamConfig {
            name: "backend".into(),
            address: "localhost:5580".into(),
        });
        config
    }

    fn route(name: &str, prefix: Option<&str>, segments: &[&str]) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            path_prefix: prefix.map(Into::into),
            segments: segments.iter().map(|s| s.to_string()).collect(),
            strip_prefix: None,
            upstream: "backend".into(),
            policy: "default".into(),
        }
    }

    #[test]
    fn accepts_ordered_table() {
        let mut config = base();
        config.routes.push(route("direct", None, &["accounts"]));
        config.routes.push(route("api", Some("/api/"), &[]));
        config.routes.push(route("frontend", None, &[]));
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn rejects_rule_after_catch_all() {
        let mut config = base();
        config.routes.push(route("frontend", None, &[]));
        config.routes.push(route("direct", None, &["accounts"]));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ShadowedRoute {
                route: "direct".into(),
                shadowed_by: "frontend".into(),
            }]
        );
    }

    #[test]
    fn rejects_host_bound_to_two_tenants() {
        let mut config = base();
        config.hosts.push(HostConfig { name: "a.example".into(), tenant: "one".into() });
        config.hosts.push(HostConfig { name: "A.example".into(), tenant: "two".into() });

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::ConflictingHost { .. }));
    }

    #[test]
    fn host_aliases_that_resolve_alike_conflict() {
        for alias in ["nantou.multi-tenant.example.", "nantou.multi-tenant.example:443"] {
            let mut config = base();
            config.hosts.push(HostConfig {
                name: alias.into(),
                tenant: "nantou-gov".into(),
            });
            config.hosts.push(HostConfig {
                name: "nantou.multi-tenant.example".into(),
                tenant: "someone-else".into(),
            });

            let errors = validate_config(&config).unwrap_err();
            assert_eq!(
                errors,
                vec![ValidationError::ConflictingHost {
                    host: "nantou.multi-tenant.example".into(),
                    first: "nantou-gov".into(),
                    second: "someone-else".into(),
                }],
                "alias {alias}"
            );
        }
    }

    #[test]
    fn certificate_host_aliases_are_duplicates() {
        let mut config = base();
        config.tls = Some(TlsConfig {
            certificates: vec![
                CertificateConfig {
                    hosts: vec!["multi-tenant.example".into()],
                    cert_path: "a.pem".into(),
                    key_path: "a.key".into(),
                },
                CertificateConfig {
                    hosts: vec!["Multi-Tenant.example.".into()],
                    cert_path: "b.pem".into(),
                    key_path: "b.key".into(),
                },
            ],
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidTls(_)));
    }

    #[test]
    fn rejects_strip_prefix_outside_matched_root() {
        let mut config = base();
        let mut rule = route("api", Some("/api"), &["tenant"]);
        rule.strip_prefix = Some("/v2".into());
        config.routes.push(rule);

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidRoute { .. }));
    }

    #[test]
    fn rejects_bad_addresses_and_zero_timeouts() {
        let mut config = base();
        config.upstreams.push(UpstreamConfig {
            name: "nope".into(),
            address: "not an address".into(),
        });
        config.policies.insert(
            "broken".into(),
            PolicyConfig { read_timeout_secs: 0, ..PolicyConfig::default() },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
