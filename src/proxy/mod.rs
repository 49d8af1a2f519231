//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route (upstream + policy) + RequestContext
//!     → forwarder.rs (limits, header rewrite, body mode)
//!     → pooled HTTP/1.1 client for the policy
//!     → upstream.rs (absolute URI on the upstream authority)
//!     → response relayed, or tunnel spliced on 101
//! ```

pub mod forwarder;
pub mod policy;
pub mod upstream;

pub use forwarder::{Forwarder, HttpClient};
pub use policy::{InvalidPolicyHeader, TransportPolicy};
pub use upstream::Upstream;
