//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the CLI
//! - Resolve the log filter from the environment, then configuration
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Library code only emits events; installing a subscriber is the binary's job

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_FILTER: &str = "h2_session=info";

/// Build the filter: `RUST_LOG` first, then `level`, then the default.
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => EnvFilter::new(format!("h2_session={}", level)),
        None => EnvFilter::new(DEFAULT_FILTER),
    })
}

/// Install a fmt subscriber writing to stderr.
pub fn init_logging(level: Option<&str>) {
    let result = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
    }
}
