//! Configuration schema definitions.
//!
//! This module defines the session options accepted by `Session::connect` and
//! the root configuration the CLI loads from disk. All types derive Serde
//! traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::Headers;
use crate::net::tls::TlsOptions;
use crate::session::Protocol;

/// Root configuration for the CLI.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin to connect to (e.g., "https://example.com").
    pub origin: Option<String>,

    /// Session options.
    pub session: SessionOptions,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Options applied to a session and every request it makes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Default headers; request headers win on collision.
    pub headers: Headers,

    /// Default request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Protocol tag; derived from the origin scheme when unset.
    pub protocol: Option<Protocol>,

    /// Verify the server certificate (h2 only).
    pub tls_verify: bool,

    /// Extra PEM roots to trust (h2 only).
    pub ca_file: Option<PathBuf>,

    /// Maximum concurrent requests; no gate when unset.
    pub concurrency: Option<usize>,

    /// TCP connect plus handshake budget in milliseconds.
    pub connect_timeout_ms: u64,

    /// HTTP/2 PING interval in milliseconds; keep-alive is off when unset.
    pub keep_alive_interval_ms: Option<u64>,

    /// How long to wait for a PING ack before the connection times out.
    pub keep_alive_timeout_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headers: Headers::new(),
            timeout_ms: 30_000,
            protocol: None,
            tls_verify: true,
            ca_file: None,
            concurrency: None,
            connect_timeout_ms: 5_000,
            keep_alive_interval_ms: None,
            keep_alive_timeout_ms: 20_000,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value.into());
        self
    }

    /// Set the default request timeout, rounded up to whole milliseconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn keep_alive_interval(&self) -> Option<Duration> {
        self.keep_alive_interval_ms.map(Duration::from_millis)
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }

    pub fn tls_options(&self) -> TlsOptions {
        TlsOptions {
            verify: self.tls_verify,
            ca_file: self.ca_file.clone(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
