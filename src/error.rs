//! Caller-facing error taxonomy.
//!
//! Every error surfaces exactly once to the caller of the operation that
//! produced it. Transport errors are carried through unchanged.

use std::time::Duration;

use thiserror::Error;

use crate::http::Method;
use crate::net::TransportError;
use crate::session::Protocol;

/// Errors produced by a [`Session`](crate::Session) and its responses.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The origin string could not be parsed or uses an unsupported scheme.
    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    /// The protocol tag conflicts with the origin scheme.
    #[error("protocol {protocol} cannot be used with a {scheme} origin")]
    ProtocolMismatch { protocol: Protocol, scheme: String },

    /// Session or gate options are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A request was attempted after the session lost or closed its connection.
    #[error("session to {origin} is not connected")]
    NotConnected { origin: String },

    /// The request did not complete before its timeout fired.
    #[error("{method} {path} on {origin} timed out after {}ms", timeout.as_millis())]
    Timeout {
        origin: String,
        method: Method,
        path: String,
        timeout: Duration,
    },

    /// The underlying stream or connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body is not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
}

impl SessionError {
    /// Short label used for telemetry and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidOrigin { .. } => "invalid_origin",
            SessionError::ProtocolMismatch { .. } => "protocol_mismatch",
            SessionError::Config(_) => "config",
            SessionError::NotConnected { .. } => "not_connected",
            SessionError::Timeout { .. } => "timeout",
            SessionError::Transport(_) => "transport",
            SessionError::Parse(_) => "parse",
        }
    }

    /// Returns true for the lifecycle timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }
}
