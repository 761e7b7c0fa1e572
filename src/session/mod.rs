//! Sessions: one connection to one origin.
//!
//! # Data Flow
//! ```text
//! origin string + SessionOptions
//!     → origin.rs (scheme/host/port, protocol tag check)
//!     → session.rs (validate options, connect, watch terminal event)
//!     → verb call → RequestLifecycle (through the gate if configured)
//!     → Response | SessionError
//! ```

pub mod origin;
#[allow(clippy::module_inception)]
pub mod session;

pub use origin::{Origin, Protocol, Scheme};
pub use session::{Session, SessionBuilder};
