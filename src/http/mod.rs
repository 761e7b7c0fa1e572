//! HTTP message model shared by sessions, lifecycles and transports.
//!
//! # Data Flow
//! ```text
//! RequestOptions (per call)
//!     → request.rs (merge with session defaults, encode body)
//!     → headers.rs (case-insensitive header block + pseudo-fields)
//!     → [transport stream]
//!     → response.rs (status parsing, body decoding)
//! ```

pub mod headers;
pub mod request;
pub mod response;

pub use headers::{HeaderValue, Headers};
pub use request::{Method, RequestBody, RequestConfig, RequestOptions};
pub use response::Response;
