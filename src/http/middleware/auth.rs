//! Authorization header injection.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Middleware, Next};
use crate::config::AuthConfig;
use crate::error::Result;
use crate::executor::CallContext;
use crate::http::wire::{RawResponse, WireRequest};

/// Produces a token on demand (refreshing credentials, vault lookups).
pub type TokenResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Adds `Authorization: <scheme> <token>` unless the request already has one.
pub struct AuthMiddleware {
    token: Option<String>,
    scheme: String,
    resolver: Option<TokenResolver>,
}

impl AuthMiddleware {
    pub fn new(token: Option<String>, scheme: impl Into<String>) -> Self {
        Self {
            token,
            scheme: scheme.into(),
            resolver: None,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.token.clone(), config.scheme.clone())
    }

    /// Resolve the token per call; takes precedence over a static token.
    pub fn with_resolver(mut self, resolver: TokenResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn token(&self) -> Option<String> {
        match &self.resolver {
            Some(resolve) => resolve(),
            None => self.token.clone(),
        }
        .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    fn name(&self) -> &str {
        "auth"
    }

    async fn handle(
        &self,
        mut request: WireRequest,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<RawResponse> {
        if !request.headers.contains("authorization") {
            if let Some(token) = self.token() {
                request
                    .headers
                    .insert("Authorization", format!("{} {}", self.scheme, token));
            }
        }
        next.run(request, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{RequestModel, RequestOptions};
    use crate::http::transport::Transport;
    use std::time::Duration;

    /// Echoes the Authorization header back as the body.
    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: WireRequest, _options: &RequestOptions) -> Result<RawResponse> {
            let auth = request.headers.get("authorization").unwrap_or("").to_string();
            Ok(RawResponse::new(200).with_body(auth))
        }
    }

    async fn run(auth: AuthMiddleware, request: RequestModel) -> String {
        let wire = request.to_wire().unwrap();
        let ctx = CallContext::new(Arc::new(request), "id", Duration::from_secs(1));
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(auth)];
        let response = Next::new(&chain, &Echo).run(wire, &ctx).await.unwrap();
        String::from_utf8(response.body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_static_token() {
        let auth = AuthMiddleware::new(Some("abc".into()), "Bearer");
        assert_eq!(run(auth, RequestModel::to("https://api.test")).await, "Bearer abc");
    }

    #[tokio::test]
    async fn test_resolver_wins() {
        let auth = AuthMiddleware::new(Some("abc".into()), "Token")
            .with_resolver(Arc::new(|| Some("fresh".to_string())));
        assert_eq!(run(auth, RequestModel::to("https://api.test")).await, "Token fresh");
    }

    #[tokio::test]
    async fn test_explicit_header_kept() {
        let auth = AuthMiddleware::new(Some("abc".into()), "Bearer");
        let request = RequestModel::to("https://api.test").with_token("mine");
        assert_eq!(run(auth, request).await, "Bearer mine");
    }

    #[tokio::test]
    async fn test_no_token_no_header() {
        let auth = AuthMiddleware::new(None, "Bearer");
        assert_eq!(run(auth, RequestModel::to("https://api.test")).await, "");
    }
}
