//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CallerConfig (validated, immutable)
//!     → threaded into Executor and its middleware by value / Arc
//! ```
//!
//! # Design Decisions
//! - No ambient lookup; every component receives its section explicitly
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, CacheConfig, CallerConfig, CircuitBreakerConfig, HttpConfig, LoggingConfig,
    RetryConfig,
};
pub use validation::{validate_config, ValidationError};
