//! HTTP/2 client sessions with bounded request concurrency.
//!
//! A [`Session`] owns one HTTP/2 connection to one origin (`h2` over TLS or
//! `h2c` in cleartext). Each verb call runs a
//! [`RequestLifecycle`](lifecycle::RequestLifecycle) on its own stream, raced
//! against a timeout, optionally behind a FIFO [`ConcurrencyGate`].
//!
//! ```no_run
//! use h2_session::{RequestOptions, Session, SessionOptions};
//!
//! # async fn demo() -> Result<(), h2_session::SessionError> {
//! let session = Session::connect("https://example.com", SessionOptions::default()).await?;
//! let response = session.get("/", RequestOptions::new()).await?;
//! println!("{} {:?}", response.status(), response.text());
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod session;

pub use config::SessionOptions;
pub use error::SessionError;
pub use http::{HeaderValue, Headers, Method, RequestBody, RequestOptions, Response};
pub use lifecycle::{ConcurrencyGate, Counter};
pub use session::{Origin, Protocol, Session};
