//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → SessionOptions handed to Session::connect
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Sessions run the same option checks when built from code

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{ClientConfig, ObservabilityConfig, SessionOptions};
