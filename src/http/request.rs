//! Request-side types: methods, bodies, per-call options and resolved config.
//!
//! # Responsibilities
//! - Represent the seven supported methods
//! - Hold per-call options (headers, body, timeout, query)
//! - Encode bodies and fix up content-type / content-length
//! - Capture the resolved configuration a response was produced with
//!
//! # Design Decisions
//! - Structured bodies are `serde_json::Value`, serialized only when sent
//! - JSON encoding only applies when no other content-type was chosen
//! - Text and byte bodies are never transformed

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::headers::{Headers, CONTENT_LENGTH, CONTENT_TYPE};

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

/// Supported request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// A request body before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

/// Per-call options accepted by the verb methods.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Headers,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.merge(&headers);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(RequestBody::Json(serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// The configuration a request actually ran with.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    pub timeout: Duration,
}

/// Append url-encoded query pairs to `path`.
pub fn path_with_query(path: &str, query: &[(String, String)]) -> String {
    let path = if path.is_empty() { "/" } else { path };
    if query.is_empty() {
        return path.to_string();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, separator, encoded)
}

/// Encode `body` into bytes and set content-type / content-length on `headers`.
pub fn encode_body(body: Option<RequestBody>, headers: &mut Headers) -> Option<Bytes> {
    let body = body?;

    let bytes = match body {
        RequestBody::Json(value) => {
            let content_type = headers.get_str(CONTENT_TYPE);
            let wants_json = content_type.map_or(true, is_json_media_type);
            if wants_json {
                headers.insert(CONTENT_TYPE, JSON_MEDIA_TYPE);
            }
            Bytes::from(value.to_string())
        }
        RequestBody::Text(text) => {
            default_content_type(headers);
            Bytes::from(text)
        }
        RequestBody::Bytes(bytes) => {
            default_content_type(headers);
            bytes
        }
    };

    headers.insert(CONTENT_LENGTH, bytes.len().to_string());
    Some(bytes)
}

fn default_content_type(headers: &mut Headers) {
    if !headers.contains(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, OCTET_STREAM_MEDIA_TYPE);
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_sets_content_type() {
        let mut headers = Headers::new();
        let body = encode_body(Some(json!({"message": "hi"}).into()), &mut headers).unwrap();

        assert_eq!(&body[..], br#"{"message":"hi"}"#);
        assert_eq!(headers.get_str("content-type"), Some(JSON_MEDIA_TYPE));
        assert_eq!(headers.get_str("content-length"), Some("16"));
    }

    #[test]
    fn test_json_charset_is_normalized() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json; charset=utf-8");
        encode_body(Some(json!([1, 2]).into()), &mut headers);

        assert_eq!(headers.get_str("content-type"), Some(JSON_MEDIA_TYPE));
    }

    #[test]
    fn test_json_body_with_foreign_content_type() {
        let mut headers = Headers::new();
        headers.insert("content-type", "application/vnd.custom");
        let body = encode_body(Some(json!({"a": 1}).into()), &mut headers).unwrap();

        assert_eq!(&body[..], br#"{"a":1}"#);
        assert_eq!(headers.get_str("content-type"), Some("application/vnd.custom"));
    }

    #[test]
    fn test_text_body_passthrough() {
        let mut headers = Headers::new();
        let body = encode_body(Some("plain words".into()), &mut headers).unwrap();

        assert_eq!(&body[..], b"plain words");
        assert_eq!(headers.get_str("content-type"), Some(OCTET_STREAM_MEDIA_TYPE));
        assert_eq!(headers.get_str("content-length"), Some("11"));
    }

    #[test]
    fn test_bytes_body_keeps_explicit_content_type() {
        let mut headers = Headers::new();
        headers.insert("content-type", "image/png");
        encode_body(Some(vec![0u8, 1, 2].into()), &mut headers);

        assert_eq!(headers.get_str("content-type"), Some("image/png"));
        assert_eq!(headers.get_str("content-length"), Some("3"));
    }

    #[test]
    fn test_no_body_leaves_headers_alone() {
        let mut headers = Headers::new();
        assert!(encode_body(None, &mut headers).is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_path_with_query() {
        let query = vec![("q".to_string(), "a b".to_string()), ("n".to_string(), "1".to_string())];
        assert_eq!(path_with_query("/search", &query), "/search?q=a+b&n=1");
        assert_eq!(path_with_query("/search?x=y", &query), "/search?x=y&q=a+b&n=1");
        assert_eq!(path_with_query("", &[]), "/");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
    }
}
