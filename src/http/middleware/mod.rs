//! Middleware pipeline around the transport call.
//!
//! # Data Flow
//! ```text
//! WireRequest
//!     → request-phase hooks (registration order)
//!     → onion chain: first registered is outermost
//!         auth → logging → cache → circuit breaker → retry → user → transport
//!     → Ok:  response-phase hooks (registration order)
//!     → Err: error-phase hooks until one responds or suppresses,
//!            otherwise the error propagates
//! ```
//!
//! # Design Decisions
//! - A middleware receives the request and a `Next` it may call zero
//!   (short-circuit), one or several (retry) times
//! - Hooks are plain closures; anything needing `.await` is a `Middleware`
//! - Everything is addressable by name so it can be removed later

pub mod auth;
pub mod cache;
pub mod circuit_breaker;
pub mod logging;
pub mod retry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::error::{CallerError, Result};
use crate::executor::CallContext;
use crate::http::transport::Transport;
use crate::http::wire::{RawResponse, WireRequest};
use crate::resilience::timeouts::with_timeout;

pub use auth::{AuthMiddleware, TokenResolver};
pub use cache::CacheMiddleware;
pub use circuit_breaker::CircuitBreakerMiddleware;
pub use logging::LoggingMiddleware;
pub use retry::RetryMiddleware;

/// A stage wrapped around the transport call.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(
        &self,
        request: WireRequest,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<RawResponse>;
}

/// The rest of the chain, ending in the transport.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Middleware>], transport: &'a dyn Transport) -> Self {
        Self { chain, transport }
    }

    /// Run the remaining stages.
    pub fn run(self, request: WireRequest, ctx: &'a CallContext) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((first, rest)) => {
                    let next = Next {
                        chain: rest,
                        transport: self.transport,
                    };
                    first.handle(request, ctx, next).await
                }
                None => {
                    let attempt = ctx.record_attempt();
                    tracing::trace!(request_id = %ctx.request_id(), attempt, "Dispatching to transport");
                    let options = &ctx.request().options;
                    with_timeout(ctx.timeout(), self.transport.send(request, options)).await
                }
            }
        })
    }
}

/// What an error-phase hook decided.
#[derive(Debug)]
pub enum ErrorOutcome {
    /// Use this response instead of the error.
    Respond(RawResponse),
    /// Stop: the call ends without a response and without an error.
    Suppress,
    /// Not handled here; ask the next hook.
    Decline,
}

pub type RequestHook = Arc<dyn Fn(WireRequest, &CallContext) -> WireRequest + Send + Sync>;
pub type ResponseHook = Arc<dyn Fn(RawResponse, &CallContext) -> RawResponse + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&CallerError, &CallContext) -> ErrorOutcome + Send + Sync>;

/// Ordered middleware plus request/response/error hooks.
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
    request_hooks: Vec<(String, RequestHook)>,
    response_hooks: Vec<(String, ResponseHook)>,
    error_hooks: Vec<(String, ErrorHook)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware (innermost so far).
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// Prepend a middleware (outermost).
    pub fn push_front(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middlewares.insert(0, middleware);
        self
    }

    pub fn push_request<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(WireRequest, &CallContext) -> WireRequest + Send + Sync + 'static,
    {
        self.request_hooks.push((name.into(), Arc::new(hook)));
        self
    }

    pub fn push_response<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(RawResponse, &CallContext) -> RawResponse + Send + Sync + 'static,
    {
        self.response_hooks.push((name.into(), Arc::new(hook)));
        self
    }

    pub fn push_error<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&CallerError, &CallContext) -> ErrorOutcome + Send + Sync + 'static,
    {
        self.error_hooks.push((name.into(), Arc::new(hook)));
        self
    }

    /// Remove every middleware and hook called `name`.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.middlewares.retain(|m| m.name() != name);
        self.request_hooks.retain(|(n, _)| n != name);
        self.response_hooks.retain(|(n, _)| n != name);
        self.error_hooks.retain(|(n, _)| n != name);
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.middlewares.clear();
        self.request_hooks.clear();
        self.response_hooks.clear();
        self.error_hooks.clear();
        self
    }

    /// Number of chain middlewares (hooks not counted).
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Chain middleware names, outermost first.
    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run `request` through hooks and chain down to `transport`.
    ///
    /// `Ok(None)` means an error hook suppressed the failure.
    pub async fn execute(
        &self,
        request: WireRequest,
        ctx: &CallContext,
        transport: &dyn Transport,
    ) -> Result<Option<RawResponse>> {
        let request = self
            .request_hooks
            .iter()
            .fold(request, |req, (_, hook)| hook(req, ctx));

        match Next::new(&self.middlewares, transport).run(request, ctx).await {
            Ok(response) => Ok(Some(
                self.response_hooks
                    .iter()
                    .fold(response, |resp, (_, hook)| hook(resp, ctx)),
            )),
            Err(error) => self.process_error(error, ctx),
        }
    }

    fn process_error(&self, error: CallerError, ctx: &CallContext) -> Result<Option<RawResponse>> {
        for (name, hook) in &self.error_hooks {
            match hook(&error, ctx) {
                ErrorOutcome::Respond(response) => {
                    tracing::debug!(hook = %name, error = %error, "Error replaced by hook response");
                    return Ok(Some(response));
                }
                ErrorOutcome::Suppress => {
                    tracing::debug!(hook = %name, error = %error, "Error suppressed by hook");
                    return Ok(None);
                }
                ErrorOutcome::Decline => {}
            }
        }
        Err(error)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.names())
            .field("request_hooks", &self.request_hooks.len())
            .field("response_hooks", &self.response_hooks.len())
            .field("error_hooks", &self.error_hooks.len())
            .finish()
    }
}
