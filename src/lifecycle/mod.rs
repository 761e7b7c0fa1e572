//! Request execution subsystem.
//!
//! # Data Flow
//! ```text
//! Session::request
//!     → gate.rs (wait for a slot, FIFO)
//!     → request.rs (RequestLifecycle: open stream, send, collect, race timeout)
//!     → slot released, next waiter admitted
//!     → counter.rs (session request count)
//! ```
//!
//! # Design Decisions
//! - The gate never sees lifecycle internals; it only wraps a future
//! - Lifecycles own their stream; the session owns the connection

pub mod counter;
pub mod gate;
pub mod request;

pub use counter::Counter;
pub use gate::{ConcurrencyGate, GatePermit, DEFAULT_CONCURRENCY};
pub use request::{LifecycleState, RequestLifecycle};
