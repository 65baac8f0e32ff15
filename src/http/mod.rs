//! Request and response modelling, middleware, and the transport seam.
//!
//! # Data Flow
//! ```text
//! RequestModel (request.rs, built fluently; registry.rs for named operations)
//!     → to_wire(): headers.rs normalization, query.rs encoding, body.rs serialization
//!     → WireRequest (wire.rs)
//!     → middleware/ pipeline
//!     → transport.rs (reqwest)
//!     → RawResponse (wire.rs)
//!     → ResponseModel (response.rs)
//! ```

pub mod body;
pub mod headers;
pub mod middleware;
pub mod query;
pub mod registry;
pub mod request;
pub mod response;
pub mod transport;
pub mod wire;

pub use body::{Body, FileAttachment, FormField};
pub use headers::HeaderMap;
pub use query::Query;
pub use registry::OperationRegistry;
pub use request::{Method, RequestModel, RequestOptions, ThrowPolicy};
pub use response::{CallMetadata, ResponseModel};
pub use transport::{ReqwestTransport, Transport};
pub use wire::{RawResponse, WireRequest, NETWORK_FAILURE_STATUS};
