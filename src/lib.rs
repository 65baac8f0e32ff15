//! Resilient outbound HTTP calls.
//!
//! Requests are described with [`RequestModel`], executed by an
//! [`Executor`] through a middleware pipeline (auth, logging, caching,
//! circuit breaking, retries) and returned as a [`ResponseModel`].

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod mapping;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::CallerConfig;
pub use error::{CallerError, Result};
pub use executor::{Executor, ExecutorBuilder};
pub use http::{Method, RequestModel, ResponseModel};
pub use mapping::Hydrate;
