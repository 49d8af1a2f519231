//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (SNI certificate selection, handshake)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional; without it the gateway serves plain HTTP
//! - Handshakes for unknown server names fail instead of falling back

pub mod tls;

pub use tls::{load_server_config, TlsError};
