//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → connect timeout (connector level)
//!     → timeouts.rs: write idle timeout on the client request body
//!     → timeouts.rs: read deadline on the response head, armed once the
//!       request body has been sent
//!     → timeouts.rs: read idle timeout on the response body
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream exchange has a deadline
//! - No retries: requests may not be idempotent and bodies are streamed

pub mod timeouts;

pub use timeouts::{
    with_deadline, with_deadline_after, CompletionBody, IdleTimeoutBody, TimeoutPhase,
    UpstreamTimeout,
};
