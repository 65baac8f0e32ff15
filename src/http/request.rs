//! Declarative description of one outbound call.
//!
//! # Responsibilities
//! - Collect method, URL, headers, query, body and transport options
//! - Resolve relative URLs against a base exactly once
//! - Produce the `WireRequest` handed to the pipeline
//!
//! # Design Decisions
//! - Built by chained calls that take and return `self`
//! - Body and content type are always set together
//! - The `caller` option map steers middleware (cache override, service
//!   name) and never reaches the wire

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{CallerError, Result};
use crate::http::body::{self, Body, FileAttachment, FormField};
use crate::http::headers::HeaderMap;
use crate::http::query::Query;
use crate::http::registry::OperationRegistry;
use crate::http::wire::WireRequest;

/// HTTP method of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Methods that normally carry no payload.
    pub fn is_bodyless(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = CallerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(CallerError::InvalidRequest(format!(
                "unsupported method '{}'",
                other
            ))),
        }
    }
}

/// Transport knobs attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Per-attempt deadline; falls back to `http.timeout`.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub allow_redirects: bool,
    pub verify: bool,
    pub proxy: Option<String>,
    pub cookies: Vec<(String, String)>,
    /// Username and password for digest authentication.
    pub digest_auth: Option<(String, String)>,
    /// Steering for middleware; never sent.
    pub caller: Map<String, Value>,
    /// Anything else a transport may understand.
    pub extra: Map<String, Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            allow_redirects: true,
            verify: true,
            proxy: None,
            cookies: Vec::new(),
            digest_auth: None,
            caller: Map::new(),
            extra: Map::new(),
        }
    }
}

impl RequestOptions {
    /// Per-call cache override from the `caller.cache` option.
    pub fn cache_override(&self) -> Option<bool> {
        self.caller.get("cache").and_then(Value::as_bool)
    }

    /// Breaker service name from the `caller.service` option.
    pub fn service(&self) -> Option<&str> {
        self.caller.get("service").and_then(Value::as_str)
    }
}

/// Conditions under which a finished call raises instead of returning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrowPolicy {
    pub always: bool,
    pub statuses: Vec<u16>,
    pub client_errors: bool,
    pub server_errors: bool,
}

impl ThrowPolicy {
    pub fn is_enabled(&self) -> bool {
        self.always || self.client_errors || self.server_errors || !self.statuses.is_empty()
    }

    /// Whether a response with `status` should be raised.
    pub fn applies_to(&self, status: u16) -> bool {
        (self.always && !(200..300).contains(&status))
            || self.statuses.contains(&status)
            || (self.client_errors && (400..500).contains(&status))
            || (self.server_errors && status >= 500)
    }
}

/// One outbound call, as described by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestModel {
    pub method: Method,
    pub url: String,
    pub base_url: Option<String>,
    pub headers: HeaderMap,
    pub query: Query,
    pub body: Body,
    pub content_type: Option<String>,
    pub options: RequestOptions,
    pub throw: ThrowPolicy,
}

impl RequestModel {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    /// Start a GET to `url`; change the method with the verb setters.
    pub fn to(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn get(self) -> Self {
        self.method(Method::Get)
    }

    pub fn head(self) -> Self {
        self.method(Method::Head)
    }

    pub fn options(self) -> Self {
        self.method(Method::Options)
    }

    pub fn delete(self) -> Self {
        self.method(Method::Delete)
    }

    /// POST with a JSON body.
    pub fn post(self, body: Value) -> Self {
        self.method(Method::Post).with_json(body)
    }

    /// PUT with a JSON body.
    pub fn put(self, body: Value) -> Self {
        self.method(Method::Put).with_json(body)
    }

    /// PATCH with a JSON body.
    pub fn patch(self, body: Value) -> Self {
        self.method(Method::Patch).with_json(body)
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.headers.insert(k, v);
        }
        self
    }

    pub fn accept(self, content_type: impl Into<String>) -> Self {
        self.with_header("Accept", content_type)
    }

    pub fn accept_json(self) -> Self {
        self.accept(body::JSON)
    }

    /// Declare the body format. Also written as the Content-Type header.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.headers.insert("Content-Type", content_type.clone());
        self.content_type = Some(content_type);
        self
    }

    pub fn as_json(self) -> Self {
        self.content_type(body::JSON)
    }

    pub fn as_form(self) -> Self {
        self.content_type(body::FORM)
    }

    pub fn as_multipart(self) -> Self {
        self.content_type(body::MULTIPART)
    }

    /// Set a body together with its content type.
    pub fn with_body(mut self, body: impl Into<Body>, content_type: impl Into<String>) -> Self {
        self.body = body.into();
        self.content_type(content_type)
    }

    pub fn with_json(self, value: Value) -> Self {
        self.with_body(value, body::JSON)
    }

    pub fn with_form_params(self, value: Value) -> Self {
        self.with_body(value, body::FORM)
    }

    pub fn with_multipart(self, fields: Vec<(String, FormField)>) -> Self {
        self.with_body(Body::Fields(fields), body::MULTIPART)
    }

    /// Add one file part, switching the body to multipart.
    pub fn attach(mut self, name: impl Into<String>, file: FileAttachment) -> Self {
        let mut fields = match std::mem::take(&mut self.body) {
            Body::Fields(fields) => fields,
            Body::Structured(Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| (k, FormField::Value(v)))
                .collect(),
            _ => Vec::new(),
        };
        fields.push((name.into(), FormField::File(file)));
        self.with_multipart(fields)
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.set(name, value);
        self
    }

    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
        self.with_header("Authorization", format!("Basic {}", encoded))
    }

    pub fn with_token(self, token: &str) -> Self {
        self.with_token_scheme(token, "Bearer")
    }

    pub fn with_token_scheme(self, token: &str, scheme: &str) -> Self {
        self.with_header("Authorization", format!("{} {}", scheme, token).trim().to_string())
    }

    pub fn with_digest_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.digest_auth = Some((username.into(), password.into()));
        self
    }

    /// Store a transport option the typed fields do not cover.
    pub fn with_option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.extra.insert(name.into(), value);
        self
    }

    pub fn with_caller_option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.caller.insert(name.into(), value);
        self
    }

    /// Force caching on or off for this call.
    pub fn cache(self, enabled: bool) -> Self {
        self.with_caller_option("cache", Value::Bool(enabled))
    }

    /// Name the breaker this call is accounted under.
    pub fn service(self, name: impl Into<String>) -> Self {
        self.with_caller_option("service", Value::String(name.into()))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    pub fn without_redirecting(mut self) -> Self {
        self.options.allow_redirects = false;
        self
    }

    pub fn without_verifying(mut self) -> Self {
        self.options.verify = false;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.options.proxy = Some(proxy.into());
        self
    }

    pub fn with_cookies<K, V>(mut self, cookies: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.options
            .cookies
            .extend(cookies.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Raise any failed call (non-2xx status or transport failure).
    pub fn throw(mut self) -> Self {
        self.throw.always = true;
        self
    }

    pub fn throw_if_status(mut self, status: u16) -> Self {
        self.throw.statuses.push(status);
        self
    }

    pub fn throw_if_client_error(mut self) -> Self {
        self.throw.client_errors = true;
        self
    }

    pub fn throw_if_server_error(mut self) -> Self {
        self.throw.server_errors = true;
        self
    }

    /// Run a named transformation from `registry`.
    pub fn apply(self, registry: &OperationRegistry, name: &str, args: &[Value]) -> Result<Self> {
        registry.apply(name, self, args)
    }

    /// Absolute URL without the query string.
    pub fn get_url(&self) -> String {
        match &self.base_url {
            Some(base) if !is_absolute(&self.url) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.url.trim_start_matches('/')
            ),
            _ => self.url.clone(),
        }
    }

    /// Full URL including the encoded query.
    pub fn full_url(&self) -> Result<url::Url> {
        let raw = self.get_url();
        let mut parsed = url::Url::parse(&raw)
            .map_err(|e| CallerError::InvalidRequest(format!("invalid URL '{}': {}", raw, e)))?;

        let encoded = self.query.encode();
        if !encoded.is_empty() {
            let merged = match parsed.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, encoded),
                _ => encoded,
            };
            parsed.set_query(Some(&merged));
        }
        Ok(parsed)
    }

    /// Build the wire form: absolute URI, Train-Case headers, encoded body.
    pub fn to_wire(&self) -> Result<WireRequest> {
        let uri = self.full_url()?;
        let mut headers = self.headers.normalized();

        let serialized =
            body::serialize(&self.body, self.content_type.as_deref(), self.method, &headers)?;
        for (name, value) in serialized.header_patches {
            headers.insert(name, value);
        }

        Ok(WireRequest {
            method: self.method,
            uri,
            headers,
            body: serialized.bytes,
        })
    }

    /// Debug rendering; file parts are described rather than dumped.
    pub fn to_json(&self) -> Value {
        let body = match &self.body {
            Body::Empty => Value::Null,
            Body::Structured(value) => value.clone(),
            Body::Raw(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::String(format!("<{} bytes>", bytes.len())),
            },
            Body::Fields(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, field)| {
                        let rendered = match field {
                            FormField::Value(v) => v.clone(),
                            FormField::File(file) => json!({
                                "filename": file.filename,
                                "mime_type": file.mime_type,
                                "size": file.contents.len(),
                            }),
                        };
                        (name.clone(), rendered)
                    })
                    .collect(),
            ),
        };

        json!({
            "method": self.method.as_str(),
            "url": self.get_url(),
            "headers": self.headers,
            "query": self.query.normalized(),
            "body": body,
            "content_type": self.content_type,
            "caller": self.options.caller,
        })
    }
}

/// A URL with a scheme and a host; anything else is joined to the base.
fn is_absolute(url: &str) -> bool {
    url::Url::parse(url).map(|u| u.has_host()).unwrap_or(false)
}
