//! Completed responses.
//!
//! # Responsibilities
//! - Resolve the status code from the `:status` pseudo-field
//! - Expose headers, raw body and the request configuration used
//! - Decode the body lazily as text or JSON
//!
//! # Design Decisions
//! - Missing or unparseable status is reported as `-1`, never an error
//! - An empty body decodes to `None` so "no body" differs from `""`

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::SessionError;
use crate::http::headers::{HeaderValue, Headers, PSEUDO_STATUS};
use crate::http::request::RequestConfig;

/// Status reported when the peer sent no usable `:status`.
pub const UNKNOWN_STATUS: i32 = -1;

/// Parse a `:status` value: a numeric string, or the first of several.
pub fn parse_status(value: Option<&HeaderValue>) -> i32 {
    value
        .and_then(HeaderValue::first)
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .unwrap_or(UNKNOWN_STATUS)
}

/// Immutable view over a completed reply.
#[derive(Debug, Clone)]
pub struct Response {
    status: i32,
    headers: Headers,
    body: Bytes,
    request: RequestConfig,
}

impl Response {
    /// Build a response from raw response metadata, stripping `:status`.
    pub(crate) fn from_parts(mut headers: Headers, body: Bytes, request: RequestConfig) -> Self {
        let status = parse_status(headers.remove(PSEUDO_STATUS).as_ref());
        Self {
            status,
            headers,
            body,
            request,
        }
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of the named header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_str(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The resolved configuration this response was produced with.
    pub fn request(&self) -> &RequestConfig {
        &self.request
    }

    /// Body as UTF-8 text, or `None` when the body is empty.
    pub fn text(&self) -> Option<String> {
        if self.body.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.body).into_owned())
    }

    /// Body parsed as JSON, or `None` when the body is empty.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, SessionError> {
        match self.text() {
            None => Ok(None),
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(SessionError::Parse),
        }
    }
}
