//! Transport-level errors.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by connections and streams.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("http2 error: {0}")]
    Http2(#[from] hyper::Error),

    #[error("tls error: {0}")]
    Tls(String),

    /// The TLS peer did not agree to speak h2.
    #[error("peer did not negotiate h2 via ALPN")]
    AlpnRejected,

    #[error("connect timed out after {}ms", .0.as_millis())]
    ConnectTimeout(Duration),

    /// The header block could not be turned into a request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stream reset: {0}")]
    Reset(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A stream operation was called out of order.
    #[error("stream misuse: {0}")]
    StreamState(&'static str),
}
