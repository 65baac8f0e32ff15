//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware and executor produce:
//!     → logging.rs (structured log events, request id on every event)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Whatever subscriber / recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every event of a call
//! - Metrics are cheap (no-op until a recorder is installed)

pub mod logging;
pub mod metrics;
