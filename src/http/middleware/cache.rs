//! Serves cacheable calls from the cache and stores fresh 2xx responses.

use async_trait::async_trait;

use super::{Middleware, Next};
use crate::cache::{derive_key, should_cache, CacheLayer};
use crate::error::Result;
use crate::executor::CallContext;
use crate::http::wire::{RawResponse, WireRequest};

pub struct CacheMiddleware {
    layer: CacheLayer,
    enabled: bool,
}

impl CacheMiddleware {
    /// `enabled` turns caching on for every GET; per-call overrides apply either way.
    pub fn new(layer: CacheLayer, enabled: bool) -> Self {
        Self { layer, enabled }
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    fn name(&self) -> &str {
        "cache"
    }

    async fn handle(
        &self,
        request: WireRequest,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<RawResponse> {
        let model = ctx.request();
        let key = if should_cache(model.method, model.options.cache_override(), self.enabled) {
            derive_key(model.method, &model.get_url(), &model.query)
        } else {
            None
        };

        let Some(key) = key else {
            return next.run(request, ctx).await;
        };

        if let Some(cached) = self.layer.get(&key).await {
            ctx.mark_from_cache();
            tracing::debug!(request_id = %ctx.request_id(), key = %key, "Served from cache");
            return Ok(cached);
        }

        let response = next.run(request, ctx).await?;
        self.layer.put(&key, &response).await;
        Ok(response)
    }
}
