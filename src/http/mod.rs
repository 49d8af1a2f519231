//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, trace spans)
//!     → request.rs (host, request ID, per-request context)
//!     → [tenant resolution + route match on the live snapshot] (state.rs)
//!     → [forwarder sends upstream] (proxy)
//!     → response.rs (errors mapped to status codes)
//!     → upgrade.rs (tunnel on 101)
//!     → Send to client
//!
//! Plaintext listener:
//!     → redirect.rs (301 to https)
//! ```

pub mod redirect;
pub mod request;
pub mod response;
pub mod server;
pub mod state;
pub mod upgrade;

pub use request::{RequestContext, X_REQUEST_ID};
pub use response::ForwardError;
pub use server::EdgeServer;
pub use state::{AppState, EdgeSnapshot, SnapshotError};
