//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled route rules in declaration order
//! - Look up the first rule matching a request path
//! - Apply the rule's rewrite exactly once
//! - Match on the path with repeated slashes merged
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; order encodes priority
//! - Explicit NoMatch rather than silent default

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{EdgeConfig, RouteConfig};
use crate::proxy::policy::{InvalidPolicyHeader, TransportPolicy};
use crate::proxy::upstream::Upstream;
use crate::routing::matcher::{AnyMatcher, Matcher, PathPrefixMatcher, SegmentMatcher};

/// Error compiling the route table.
#[derive(Debug, thiserror::Error)]
pub enum RouteTableError {
    #[error("route '{route}' references unknown upstream '{upstream}'")]
    UnknownUpstream { route: String, upstream: String },
    #[error("route '{route}' references unknown policy '{policy}'")]
    UnknownPolicy { route: String, policy: String },
    #[error("upstream '{name}' has invalid address: {source}")]
    InvalidAddress {
        name: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },
    #[error(transparent)]
    InvalidPolicy(#[from] InvalidPolicyHeader),
}

/// Literal prefix removed from the path before forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripPrefix(String);

impl StripPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn prefix(&self) -> &str {
        &self.0
    }

    /// Remove the prefix once. A path reduced to nothing becomes `/`.
    pub fn apply<'a>(&self, path: &'a str) -> Cow<'a, str> {
        match path.strip_prefix(self.0.as_str()) {
            Some("") => Cow::Borrowed("/"),
            Some(rest) if rest.starts_with('/') => Cow::Borrowed(rest),
            Some(rest) => Cow::Owned(format!("/{rest}")),
            None => Cow::Borrowed(path),
        }
    }
}

/// One entry of the ordered route table.
#[derive(Debug)]
pub struct RouteRule {
    pub name: String,
    pub matcher: Box<dyn Matcher>,
    pub rewrite: Option<StripPrefix>,
    pub upstream: Arc<Upstream>,
    pub policy: Arc<TransportPolicy>,
}

impl RouteRule {
    pub fn new(
        name: impl Into<String>,
        matcher: Box<dyn Matcher>,
        upstream: Arc<Upstream>,
        policy: Arc<TransportPolicy>,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            rewrite: None,
            upstream,
            policy,
        }
    }

    pub fn with_rewrite(mut self, rewrite: StripPrefix) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    /// Path to forward, rewritten when the rule carries a rewrite.
    pub path: Cow<'a, str>,
}

impl RouteMatch<'_> {
    pub fn is_rewritten(&self) -> bool {
        self.rule.rewrite.is_some()
    }
}

/// Ordered, immutable route table. First match wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Compile the configured routes, sharing upstream and policy instances.
    pub fn from_config(config: &EdgeConfig) -> Result<Self, RouteTableError> {
        let mut upstreams = HashMap::new();
        for upstream in &config.upstreams {
            let parsed = Upstream::new(&upstream.name, &upstream.address).map_err(|source| {
                RouteTableError::InvalidAddress {
                    name: upstream.name.clone(),
                    source,
                }
            })?;
            upstreams.insert(upstream.name.as_str(), Arc::new(parsed));
        }

        let mut policies: HashMap<&str, Arc<TransportPolicy>> = HashMap::new();
        let mut rules = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            let upstream = upstreams
                .get(route.upstream.as_str())
                .cloned()
                .ok_or_else(|| RouteTableError::UnknownUpstream {
                    route: route.name.clone(),
                    upstream: route.upstream.clone(),
                })?;

            let policy = match policies.get(route.policy.as_str()) {
                Some(policy) => policy.clone(),
                None => {
                    let policy_config =
                        config.policy(&route.policy).ok_or_else(|| RouteTableError::UnknownPolicy {
                            route: route.name.clone(),
                            policy: route.policy.clone(),
                        })?;
                    let policy = Arc::new(TransportPolicy::from_config(&route.policy, &policy_config)?);
                    policies.insert(route.policy.as_str(), policy.clone());
                    policy
                }
            };

            let mut rule = RouteRule::new(&route.name, build_matcher(route), upstream, policy);
            if let Some(prefix) = &route.strip_prefix {
                rule = rule.with_rewrite(StripPrefix::new(prefix));
            }
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    /// Find the first rule matching `path`.
    ///
    /// Rules see the path with repeated slashes merged. Rewrites apply to
    /// that merged path; rules without a rewrite forward `path` untouched.
    pub fn match_path<'a>(&'a self, path: &'a str) -> Option<RouteMatch<'a>> {
        let merged = merge_slashes(path);
        let rule = self.rules.iter().find(|rule| rule.matcher.matches(&merged))?;
        let path = match (&rule.rewrite, merged) {
            (Some(rewrite), Cow::Borrowed(merged)) => rewrite.apply(merged),
            (Some(rewrite), Cow::Owned(merged)) => Cow::Owned(rewrite.apply(&merged).into_owned()),
            (None, _) => Cow::Borrowed(path),
        };
        Some(RouteMatch { rule, path })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Distinct policies in use, for building per-policy clients.
    pub fn policies(&self) -> Vec<Arc<TransportPolicy>> {
        let mut seen: Vec<Arc<TransportPolicy>> = Vec::new();
        for rule in &self.rules {
            if !seen.iter().any(|p| Arc::ptr_eq(p, &rule.policy)) {
                seen.push(rule.policy.clone());
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn merge_slashes(path: &str) -> Cow<'_, str> {
    if !path.contains("//") {
        return Cow::Borrowed(path);
    }
    let mut merged = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && merged.ends_with('/') {
            continue;
        }
        merged.push(c);
    }
    Cow::Owned(merged)
}

fn build_matcher(route: &RouteConfig) -> Box<dyn Matcher> {
    match (&route.path_prefix, route.segments.is_empty()) {
        (root, false) => Box::new(SegmentMatcher::new(
            root.as_deref().unwrap_or(""),
            route.segments.iter().cloned(),
        )),
        (Some(prefix), true) => Box::new(PathPrefixMatcher::new(prefix.clone())),
        (None, true) => Box::new(AnyMatcher),
    }
}
