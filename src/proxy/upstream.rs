//! Upstream abstraction.
//!
//! # Responsibilities
//! - Represent a single backend service by its authority
//! - Build absolute request URIs for forwarding
//!
//! A single address per upstream; connection reuse is handled by the
//! forwarder's pooled client, keyed on this authority.

use std::fmt;
use std::str::FromStr;

use axum::http::uri::{Authority, InvalidUri, Scheme};
use axum::http::Uri;

/// A single backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    name: String,
    authority: Authority,
}

impl Upstream {
    /// Parse an upstream from its configured `host:port` address.
    pub fn new(name: impl Into<String>, address: &str) -> Result<Self, InvalidUri> {
        Ok(Self {
            name: name.into(),
            authority: Authority::from_str(address)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Absolute URI for `path_and_query` on this upstream.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.authority)
    }
}
