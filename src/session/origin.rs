//! Origin parsing and protocol tags.
//!
//! # Responsibilities
//! - Parse an origin string into scheme, host and port
//! - Resolve the protocol tag for a scheme and reject mismatches
//!
//! # Design Decisions
//! - Only `http` and `https` origins are accepted
//! - IPv6 hosts are stored without brackets; `authority()` adds them back

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::SessionError;

/// URL scheme of an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire variant a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTTP/2 over TLS.
    H2,
    /// HTTP/2 over cleartext TCP, prior knowledge.
    H2c,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::H2 => "h2",
            Protocol::H2c => "h2c",
        }
    }

    /// Default tag for a scheme.
    pub fn for_scheme(scheme: Scheme) -> Self {
        if scheme.is_secure() {
            Protocol::H2
        } else {
            Protocol::H2c
        }
    }

    /// Fail unless this tag is the one `scheme` requires.
    pub fn validate(self, scheme: Scheme) -> Result<Self, SessionError> {
        if self == Self::for_scheme(scheme) {
            Ok(self)
        } else {
            Err(SessionError::ProtocolMismatch {
                protocol: self,
                scheme: scheme.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h2" => Ok(Protocol::H2),
            "h2c" => Ok(Protocol::H2c),
            other => Err(format!("unknown protocol {:?} (expected h2 or h2c)", other)),
        }
    }
}

/// Scheme, host and port of the peer a session talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Origin {
    pub fn parse(origin: &str) -> Result<Self, SessionError> {
        let invalid = |reason: String| SessionError::InvalidOrigin {
            origin: origin.to_string(),
            reason,
        };

        let url = Url::parse(origin).map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(invalid(format!("unsupported scheme {:?}", other))),
        };
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(invalid("missing host".into())),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self { scheme, host, port })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

impl FromStr for Origin {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::parse(s)
    }
}
