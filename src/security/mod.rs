//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (declared size, streamed size cap)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*, overwrite tenant)
//!     → Forward to upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any limit violation
//! - No trust in client input; identity headers are always recomputed

pub mod headers;
pub mod limits;
