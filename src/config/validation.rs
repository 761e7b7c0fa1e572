//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, concurrency >= 1)
//! - Check the origin parses and agrees with the protocol tag
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the loaded values
//! - Runs before any connection is attempted

use std::fmt;

use crate::config::schema::{ClientConfig, SessionOptions};
use crate::session::Origin;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check session options in isolation.
pub fn validate_options(options: &SessionOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_option_errors(options, "session", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check a full client configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_option_errors(&config.session, "session", &mut errors);

    if let Some(origin) = &config.origin {
        match Origin::parse(origin) {
            Ok(origin) => {
                if let Some(protocol) = config.session.protocol {
                    if let Err(e) = protocol.validate(origin.scheme()) {
                        errors.push(ValidationError::new("session.protocol", e.to_string()));
                    }
                }
            }
            Err(e) => errors.push(ValidationError::new("origin", e.to_string())),
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_option_errors(options: &SessionOptions, prefix: &str, errors: &mut Vec<ValidationError>) {
    if options.timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.timeout_ms", prefix),
            "must be greater than 0",
        ));
    }
    if options.connect_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.connect_timeout_ms", prefix),
            "must be greater than 0",
        ));
    }
    if options.concurrency == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.concurrency", prefix),
            "must be at least 1",
        ));
    }
    if options.keep_alive_interval_ms == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.keep_alive_interval_ms", prefix),
            "must be greater than 0",
        ));
    }
    if options.keep_alive_interval_ms.is_some() && options.keep_alive_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.keep_alive_timeout_ms", prefix),
            "must be greater than 0 when keep-alive is enabled",
        ));
    }
}
