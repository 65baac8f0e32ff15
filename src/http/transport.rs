//! Transport boundary and the reqwest-backed implementation.
//!
//! # Responsibilities
//! - Put a `WireRequest` on the network and read back a `RawResponse`
//! - Honour per-request options (proxy, redirects, TLS verification,
//!   connect timeout, cookies, digest auth)
//! - Report failures as `Connection` / `Timeout` so retry can classify them
//!
//! # Design Decisions
//! - A shared client serves requests using default options; a one-off
//!   client is built only when a request overrides client-level settings
//! - Digest auth answers a single `401 WWW-Authenticate: Digest` challenge

use std::time::Duration;

use async_trait::async_trait;
use md5::{Digest, Md5};

use crate::config::HttpConfig;
use crate::error::{CallerError, Result};
use crate::http::headers::HeaderMap;
use crate::http::request::{Method, RequestOptions};
use crate::http::wire::{RawResponse, WireRequest};

/// Sends one wire request. Supplied by the embedder or `ReqwestTransport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest, options: &RequestOptions) -> Result<RawResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Self::builder(config, &RequestOptions::default())?
            .build()
            .map_err(|e| CallerError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn builder(config: &HttpConfig, options: &RequestOptions) -> Result<reqwest::ClientBuilder> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout.unwrap_or(config.connect_timeout()))
            .user_agent(config.user_agent.as_str())
            .http1_title_case_headers();

        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        if let Some(proxy) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| CallerError::InvalidRequest(format!("invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        if !options.allow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }
        if !options.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(builder)
    }

    fn needs_own_client(options: &RequestOptions) -> bool {
        options.proxy.is_some()
            || !options.allow_redirects
            || !options.verify
            || options.connect_timeout.is_some()
    }

    async fn dispatch(
        &self,
        client: &reqwest::Client,
        request: &WireRequest,
        options: &RequestOptions,
        authorization: Option<String>,
    ) -> Result<RawResponse> {
        let mut builder = client.request(reqwest_method(request.method), request.uri.clone());

        for (name, values) in request.headers.iter() {
            if authorization.is_some() && name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            for value in values {
                builder = builder.header(name, value.as_str());
            }
        }
        if let Some(auth) = authorization {
            builder = builder.header("Authorization", auth);
        }
        if !options.cookies.is_empty() && !request.headers.contains("cookie") {
            let cookie = options
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header("Cookie", cookie);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let version = format!("{:?}", response.version())
            .trim_start_matches("HTTP/")
            .to_string();
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(RawResponse {
            status,
            headers,
            body,
            version,
        })
    }

    fn map_error(&self, e: reqwest::Error) -> CallerError {
        if e.is_timeout() {
            CallerError::Timeout(self.config.timeout())
        } else if e.is_builder() {
            CallerError::InvalidRequest(e.to_string())
        } else {
            CallerError::Connection(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest, options: &RequestOptions) -> Result<RawResponse> {
        let own;
        let client = if Self::needs_own_client(options) {
            own = Self::builder(&self.config, options)?
                .build()
                .map_err(|e| CallerError::InvalidRequest(e.to_string()))?;
            &own
        } else {
            &self.client
        };

        let response = self.dispatch(client, &request, options, None).await?;

        let Some((username, password)) = &options.digest_auth else {
            return Ok(response);
        };
        let challenge = match response.headers.get("www-authenticate") {
            Some(c) if response.status == 401 && c.trim_start().starts_with("Digest") => c.to_string(),
            _ => return Ok(response),
        };

        let path = match request.uri.query() {
            Some(q) => format!("{}?{}", request.uri.path(), q),
            None => request.uri.path().to_string(),
        };
        let cnonce = uuid::Uuid::new_v4().simple().to_string();
        match digest_authorization(&challenge, request.method, &path, username, password, &cnonce) {
            Some(auth) => {
                tracing::debug!(uri = %request.uri, "Answering digest challenge");
                self.dispatch(client, &request, options, Some(auth)).await
            }
            None => Ok(response),
        }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn md5_hex(input: &str) -> String {
    Md5::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// `key="value"` pairs of a `WWW-Authenticate: Digest ...` challenge.
fn challenge_param(challenge: &str, key: &str) -> Option<String> {
    let params = challenge.trim_start().strip_prefix("Digest")?;

    // Split on commas outside quotes.
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in params.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts.iter().find_map(|part| {
        let (k, v) = part.trim().split_once('=')?;
        (k.trim().eq_ignore_ascii_case(key)).then(|| v.trim().trim_matches('"').to_string())
    })
}

/// Authorization header answering an MD5 digest challenge (RFC 2617).
pub fn digest_authorization(
    challenge: &str,
    method: Method,
    uri: &str,
    username: &str,
    password: &str,
    cnonce: &str,
) -> Option<String> {
    let realm = challenge_param(challenge, "realm")?;
    let nonce = challenge_param(challenge, "nonce")?;
    let opaque = challenge_param(challenge, "opaque");
    let qop_auth = challenge_param(challenge, "qop")
        .map(|q| q.split(|c| c == ',' || c == ' ').any(|v| v == "auth"))
        .unwrap_or(false);

    let ha1 = md5_hex(&format!("{}:{}:{}", username, realm, password));
    let ha2 = md5_hex(&format!("{}:{}", method.as_str(), uri));
    let nc = "00000001";

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\"",
        username, realm, nonce, uri
    );
    if qop_auth {
        let response = md5_hex(&format!("{}:{}:{}:{}:auth:{}", ha1, nonce, nc, cnonce, ha2));
        header.push_str(&format!(
            ", qop=auth, nc={}, cnonce=\"{}\", response=\"{}\"",
            nc, cnonce, response
        ));
    } else {
        let response = md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2));
        header.push_str(&format!(", response=\"{}\"", response));
    }
    if let Some(opaque) = opaque {
        header.push_str(&format!(", opaque=\"{}\"", opaque));
    }
    Some(header)
}

/// Default per-attempt deadline when a request sets none.
pub fn attempt_timeout(config: &HttpConfig, options: &RequestOptions) -> Duration {
    options.timeout.unwrap_or_else(|| config.timeout())
}
