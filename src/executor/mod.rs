//! Call orchestration.
//!
//! # Data Flow
//! ```text
//! RequestModel
//!     → defaults (base URL, X-Request-Id, User-Agent)
//!     → to_wire()            serialization errors are raised here
//!     → Pipeline::execute    auth → logging → cache → breaker → retry → user → transport
//!     → ResponseModel        failures captured unless raised (see below)
//! ```
//!
//! # Error Propagation
//! - `CircuitOpen` and `Serialization` are always returned as `Err`
//! - With any throw condition set on the request, captured failures and
//!   matching statuses are returned as `Err`
//! - Everything else lands inside the `ResponseModel`

pub mod context;

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::cache::CacheLayer;
use crate::config::CallerConfig;
use crate::error::Result;
use crate::http::middleware::{
    AuthMiddleware, CacheMiddleware, CircuitBreakerMiddleware, LoggingMiddleware, Middleware,
    Pipeline, RetryMiddleware, TokenResolver,
};
use crate::http::request::RequestModel;
use crate::http::response::{CallMetadata, ResponseModel};
use crate::http::transport::{attempt_timeout, ReqwestTransport, Transport};
use crate::observability::metrics;
use crate::resilience::{CircuitBreaker, Clock, RetryPolicy};
use crate::store::{MemoryStore, Store};

pub use context::{CallContext, X_REQUEST_ID};

/// Runs `RequestModel`s through the configured pipeline.
pub struct Executor {
    config: CallerConfig,
    pipeline: Pipeline,
    transport: Arc<dyn Transport>,
}

impl Executor {
    /// Executor with the reqwest transport and an in-memory store.
    pub fn new(config: CallerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CallerConfig) -> ExecutorBuilder {
        ExecutorBuilder::new(config)
    }

    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn get(&self, url: &str) -> Result<ResponseModel> {
        self.execute(RequestModel::to(url)).await
    }

    pub async fn post(&self, url: &str, body: Value) -> Result<ResponseModel> {
        self.execute(RequestModel::to(url).post(body)).await
    }

    /// Execute one call.
    pub async fn execute(&self, request: RequestModel) -> Result<ResponseModel> {
        let request = Arc::new(self.prepare(request));
        let request_id = request
            .headers
            .get(X_REQUEST_ID)
            .unwrap_or_default()
            .to_string();

        let wire = request.to_wire()?;
        let ctx = CallContext::new(
            request.clone(),
            request_id.clone(),
            attempt_timeout(&self.config.http, &request.options),
        );

        let outcome = self
            .pipeline
            .execute(wire, &ctx, self.transport.as_ref())
            .await;

        let metadata = CallMetadata {
            request_id,
            attempts: ctx.attempts(),
            elapsed: ctx.elapsed(),
            from_cache: ctx.from_cache(),
            ..Default::default()
        };

        let response = match outcome {
            Ok(Some(raw)) => {
                metrics::record_request(request.method.as_str(), raw.status, ctx.started());
                ResponseModel::new(raw, request.clone(), metadata)
            }
            Ok(None) => ResponseModel::from_error(None, request.clone(), metadata),
            Err(e) if e.always_propagates() || request.throw.is_enabled() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    request_id = %metadata.request_id,
                    error = %e,
                    kind = e.kind(),
                    "Call failed, failure captured in response"
                );
                ResponseModel::from_error(Some(e), request.clone(), metadata)
            }
        };

        if response.raw().is_some() && request.throw.applies_to(response.status()) {
            response.throw()?;
        }
        Ok(response)
    }

    /// Execute on a background task.
    pub fn spawn(self: &Arc<Self>, request: RequestModel) -> JoinHandle<Result<ResponseModel>> {
        let executor = Arc::clone(self);
        tokio::spawn(async move { executor.execute(request).await })
    }

    /// Execute many calls concurrently; results keep the input order.
    pub async fn execute_pool(&self, requests: Vec<RequestModel>) -> Vec<Result<ResponseModel>> {
        join_all(requests.into_iter().map(|r| self.execute(r))).await
    }

    fn prepare(&self, mut request: RequestModel) -> RequestModel {
        if request.base_url.is_none() {
            request.base_url = self.config.http.base_url.clone();
        }
        if !request.headers.contains(X_REQUEST_ID) {
            request
                .headers
                .insert(X_REQUEST_ID, uuid::Uuid::new_v4().to_string());
        }
        if !request.headers.contains("user-agent") {
            request
                .headers
                .insert("User-Agent", self.config.http.user_agent.clone());
        }
        request
    }
}

/// Assembles an `Executor`, letting tests and embedders swap collaborators.
pub struct ExecutorBuilder {
    config: CallerConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn Store>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    token_resolver: Option<TokenResolver>,
    breaker_clock: Option<Clock>,
    configure: Vec<Box<dyn FnOnce(&mut Pipeline) + Send>>,
}

impl ExecutorBuilder {
    pub fn new(config: CallerConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            middlewares: Vec::new(),
            token_resolver: None,
            breaker_clock: None,
            configure: Vec::new(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Store shared by the cache and the circuit breaker.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a middleware inside the built-in ones, next to the transport.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn token_resolver(mut self, resolver: TokenResolver) -> Self {
        self.token_resolver = Some(resolver);
        self
    }

    pub fn breaker_clock(mut self, clock: Clock) -> Self {
        self.breaker_clock = Some(clock);
        self
    }

    /// Adjust the assembled pipeline (hooks, removals) before it is frozen.
    pub fn configure_pipeline<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Pipeline) + Send + 'static,
    {
        self.configure.push(Box::new(f));
        self
    }

    pub fn build(self) -> Result<Executor> {
        let config = self.config;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(&config.http)?),
        };
        let store: Arc<dyn Store> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let mut pipeline = Pipeline::new();

        if config.auth.token.is_some() || self.token_resolver.is_some() {
            let mut auth = AuthMiddleware::from_config(&config.auth);
            if let Some(resolver) = self.token_resolver {
                auth = auth.with_resolver(resolver);
            }
            pipeline.push(Arc::new(auth));
        }
        if config.logging.enabled {
            pipeline.push(Arc::new(LoggingMiddleware::from_config(&config.logging)));
        }
        pipeline.push(Arc::new(CacheMiddleware::new(
            CacheLayer::new(
                store.clone(),
                std::time::Duration::from_secs(config.cache.ttl_seconds),
            ),
            config.cache.enabled,
        )));
        if config.circuit_breaker.enabled {
            let breaker = match self.breaker_clock {
                Some(clock) => {
                    CircuitBreaker::with_clock(store.clone(), config.circuit_breaker.clone(), clock)
                }
                None => CircuitBreaker::new(store.clone(), config.circuit_breaker.clone()),
            };
            pipeline.push(Arc::new(CircuitBreakerMiddleware::new(breaker)));
        }
        pipeline.push(Arc::new(RetryMiddleware::new(RetryPolicy::new(
            config.retry.clone(),
        ))));
        for middleware in self.middlewares {
            pipeline.push(middleware);
        }
        for configure in self.configure {
            configure(&mut pipeline);
        }

        tracing::debug!(middlewares = ?pipeline.names(), "Executor pipeline assembled");

        Ok(Executor {
            config,
            pipeline,
            transport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_order() {
        let executor = Executor::new(CallerConfig::default()).unwrap();
        assert_eq!(
            executor.pipeline().names(),
            vec!["logging", "cache", "circuit_breaker", "retry"]
        );
    }

    #[test]
    fn test_auth_installed_with_token() {
        let mut config = CallerConfig::default();
        config.auth.token = Some("t".into());
        config.circuit_breaker.enabled = false;
        config.logging.enabled = false;
        let executor = Executor::new(config).unwrap();
        assert_eq!(executor.pipeline().names(), vec!["auth", "cache", "retry"]);
    }

    #[test]
    fn test_prepare_defaults() {
        let mut config = CallerConfig::default();
        config.http.base_url = Some("https://api.test".into());
        let executor = Executor::new(config).unwrap();

        let prepared = executor.prepare(RequestModel::to("/items"));
        assert_eq!(prepared.get_url(), "https://api.test/items");
        assert!(prepared.headers.contains("x-request-id"));
        assert!(prepared.headers.get("user-agent").unwrap().starts_with("caller/"));

        let kept = executor.prepare(RequestModel::to("/items").with_header("X-Request-Id", "fixed"));
        assert_eq!(kept.headers.get("X-Request-Id"), Some("fixed"));
    }
}
