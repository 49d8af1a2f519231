//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (segment-class / prefix / any)
//!     → rewrite (strip prefix, once)
//!     → Return: matched rule + forwarded path, or NoMatch
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[] (declaration order)
//!     → compile matchers, resolve upstreams and policies
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins; more specific rules must come first

pub mod matcher;
pub mod router;

pub use matcher::{AnyMatcher, Matcher, PathPrefixMatcher, SegmentMatcher};
pub use router::{RouteMatch, RouteRule, RouteTable, RouteTableError, StripPrefix};
