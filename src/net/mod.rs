//! Transport seam: the multiplexed-stream connection sessions run on.
//!
//! # Data Flow
//! ```text
//! Session::connect
//!     → Transport::connect (TCP, optional TLS, HTTP/2 handshake)
//!     → Connection (shared by every lifecycle of the session)
//!         → open_stream(pseudo-fields ∪ headers) → StreamHandle
//!             → end(body)
//!             → next_event(): Response → Data* → End | Error
//!             → close()
//!         → terminated(): Error | Timeout | Closed (fires once)
//! ```
//!
//! # Design Decisions
//! - Object-safe traits returning boxed futures so sessions hold `dyn` handles
//! - Stream events mirror the wire: metadata, data fragments, end, error
//! - `h2.rs` drives hyper's HTTP/2 client; `scripted.rs` answers in-process

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::http::Headers;
use crate::session::Origin;

pub mod error;
pub mod h2;
pub mod scripted;
pub mod tls;

pub use error::TransportError;
pub use h2::H2Transport;
pub use scripted::{Script, ScriptedTransport, SentRequest};

/// Everything a transport needs to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub origin: Origin,
    pub tls: tls::TlsOptions,
    pub connect_timeout: Duration,
    /// HTTP/2 PING interval; `None` disables keep-alive probing.
    pub keep_alive_interval: Option<Duration>,
    pub keep_alive_timeout: Duration,
}

/// Terminal event of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Error(String),
    Timeout,
    Closed,
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Error(reason) => write!(f, "connection error: {}", reason),
            ConnectionEvent::Timeout => f.write_str("connection timed out"),
            ConnectionEvent::Closed => f.write_str("connection closed"),
        }
    }
}

/// Event delivered on a stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// Response metadata, including the `:status` pseudo-field.
    Response(Headers),
    Data(Bytes),
    End,
    Error(TransportError),
}

/// Opens connections to an origin.
pub trait Transport: Send + Sync {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, TransportError>>;
}

/// An open multiplexed connection.
pub trait Connection: Send + Sync {
    /// Open a stream. `head` carries `:method`, `:path`, `:scheme`,
    /// `:authority` plus ordinary headers.
    fn open_stream(&self, head: Headers)
        -> BoxFuture<'_, Result<Box<dyn StreamHandle>, TransportError>>;

    /// Resolves once, with the first terminal event of the connection.
    fn terminated(&self) -> BoxFuture<'static, ConnectionEvent>;

    fn close(&self);
}

/// One request/response exchange on a connection.
pub trait StreamHandle: Send {
    /// Send the body (if any) and finish the outgoing side.
    fn end(&mut self, body: Option<Bytes>) -> BoxFuture<'_, Result<(), TransportError>>;

    fn next_event(&mut self) -> BoxFuture<'_, StreamEvent>;

    fn close(&mut self);
}
