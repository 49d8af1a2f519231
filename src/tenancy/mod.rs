//! Tenant resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Host header
//!     → resolver.rs (exact hostname lookup)
//!     → TenantId (configured or default)
//!     → injected into the forwarded request as X-Tenant-ID
//! ```

pub mod resolver;

pub use resolver::{Resolution, TenantId, TenantResolver};
