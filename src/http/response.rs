//! Introspectable view over a finished call.
//!
//! # Responsibilities
//! - Classify the status (2xx / 4xx / 5xx, named codes, 599 sentinel)
//! - Case-insensitive header access, content-type predicates
//! - Decode JSON lazily, at most once per instance
//! - Hydrate DTOs through `mapping::Hydrate`
//! - Run registered transformers over the decoded body in `map`
//! - Raise captured failures or failing statuses on request
//!
//! # Design Decisions
//! - A call that produced no response still yields a `ResponseModel` with
//!   status 0 and the captured error
//! - JSON is only decoded when the Content-Type says JSON and the body is
//!   non-empty; a decode failure is memoized like a success

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::error::{CallerError, Result};
use crate::http::headers::HeaderMap;
use crate::http::request::RequestModel;
use crate::http::wire::{RawResponse, NETWORK_FAILURE_STATUS};
use crate::mapping::{hydrate, Hydrate};

/// Facts about how a call was executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallMetadata {
    pub request_id: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub from_cache: bool,
    /// Caller-supplied entries, see `ResponseModel::with_metadata`.
    pub extra: Map<String, Value>,
}

/// Step applied to the decoded body by `ResponseModel::map`.
pub type Transformer = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Header lookup result: single values collapse to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderValue<'a> {
    One(&'a str),
    Many(&'a [String]),
}

impl<'a> HeaderValue<'a> {
    /// First value either way.
    pub fn first(&self) -> Option<&'a str> {
        match self {
            HeaderValue::One(v) => Some(v),
            HeaderValue::Many(vs) => vs.first().map(String::as_str),
        }
    }
}

pub struct ResponseModel {
    raw: Option<RawResponse>,
    error: Option<CallerError>,
    request: Arc<RequestModel>,
    metadata: CallMetadata,
    decoded: OnceLock<std::result::Result<Option<Value>, CallerError>>,
    transformers: Vec<Transformer>,
}

impl std::fmt::Debug for ResponseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseModel")
            .field("raw", &self.raw)
            .field("error", &self.error)
            .field("request", &self.request)
            .field("metadata", &self.metadata)
            .field("transformers", &self.transformers.len())
            .finish()
    }
}

impl ResponseModel {
    pub fn new(raw: RawResponse, request: Arc<RequestModel>, metadata: CallMetadata) -> Self {
        Self {
            raw: Some(raw),
            error: None,
            request,
            metadata,
            decoded: OnceLock::new(),
            transformers: Vec::new(),
        }
    }

    /// A call that ended without a response.
    pub fn from_error(error: Option<CallerError>, request: Arc<RequestModel>, metadata: CallMetadata) -> Self {
        Self {
            raw: None,
            error,
            request,
            metadata,
            decoded: OnceLock::new(),
            transformers: Vec::new(),
        }
    }

    pub fn raw(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }

    pub fn into_raw(self) -> Option<RawResponse> {
        self.raw
    }

    pub fn error(&self) -> Option<&CallerError> {
        self.error.as_ref()
    }

    pub fn request(&self) -> &RequestModel {
        &self.request
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    /// Merge caller entries into the metadata; later keys win.
    pub fn with_metadata<K, I>(mut self, entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        for (key, value) in entries {
            self.metadata.extra.insert(key.into(), value);
        }
        self
    }

    /// Metadata as one JSON object: caller entries plus execution and
    /// response facts, the latter taking precedence.
    pub fn metadata_map(&self) -> Map<String, Value> {
        let mut map = self.metadata.extra.clone();
        let facts = json!({
            "request_id": self.metadata.request_id,
            "attempts": self.metadata.attempts,
            "elapsed_ms": self.metadata.elapsed.as_secs_f64() * 1000.0,
            "from_cache": self.metadata.from_cache,
            "status": self.status(),
            "successful": self.successful(),
            "content_type": self.content_type(),
            "content_length": self.headers().and_then(|h| h.get("content-length")),
        });
        if let Value::Object(facts) = facts {
            map.extend(facts);
        }
        map
    }

    // ==================== STATUS ====================

    /// Status code, 0 when no response was obtained.
    pub fn status(&self) -> u16 {
        self.raw.as_ref().map(|r| r.status).unwrap_or(0)
    }

    pub fn successful(&self) -> bool {
        (200..300).contains(&self.status())
    }

    pub fn failed(&self) -> bool {
        !self.successful()
    }

    pub fn redirect(&self) -> bool {
        (300..400).contains(&self.status())
    }

    pub fn client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    pub fn server_error(&self) -> bool {
        self.status() >= 500
    }

    /// The 599 stand-in for a call that never reached the server.
    pub fn network_failure(&self) -> bool {
        self.status() == NETWORK_FAILURE_STATUS
    }

    pub fn ok(&self) -> bool {
        self.status() == 200
    }

    pub fn created(&self) -> bool {
        self.status() == 201
    }

    pub fn accepted(&self) -> bool {
        self.status() == 202
    }

    pub fn no_content(&self) -> bool {
        self.status() == 204
    }

    pub fn unauthorized(&self) -> bool {
        self.status() == 401
    }

    pub fn forbidden(&self) -> bool {
        self.status() == 403
    }

    pub fn not_found(&self) -> bool {
        self.status() == 404
    }

    pub fn conflict(&self) -> bool {
        self.status() == 409
    }

    pub fn unprocessable(&self) -> bool {
        self.status() == 422
    }

    pub fn too_many_requests(&self) -> bool {
        self.status() == 429
    }

    // ==================== HEADERS ====================

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.raw.as_ref().map(|r| &r.headers)
    }

    pub fn header(&self, name: &str) -> Option<HeaderValue<'_>> {
        let values = self.headers()?.get_all(name)?;
        match values {
            [single] => Some(HeaderValue::One(single)),
            many => Some(HeaderValue::Many(many)),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers()?.get("content-type")
    }

    fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
    }

    pub fn is_json(&self) -> bool {
        self.content_type_contains("json")
    }

    pub fn is_xml(&self) -> bool {
        self.content_type_contains("xml")
    }

    pub fn is_html(&self) -> bool {
        self.content_type_contains("text/html")
    }

    pub fn is_plain(&self) -> bool {
        self.content_type_contains("text/plain")
    }

    // ==================== BODY ====================

    pub fn body(&self) -> &[u8] {
        self.raw.as_ref().map(|r| r.body.as_ref()).unwrap_or_default()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }

    /// Decoded JSON body, `None` when the response is not JSON or empty.
    pub fn json(&self) -> Result<Option<&Value>> {
        let decoded = self.decoded.get_or_init(|| {
            if !self.is_json() || self.body().is_empty() {
                return Ok(None);
            }
            serde_json::from_slice(self.body())
                .map(Some)
                .map_err(|e| CallerError::Decode(e.to_string()))
        });
        match decoded {
            Ok(value) => Ok(value.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Dot-path lookup into the JSON body: `data.items.0.id`.
    pub fn json_path(&self, path: &str) -> Option<&Value> {
        let mut current = self.json().ok()??;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Register a transformer for `map`; transformers run in order.
    pub fn transform<F>(mut self, transformer: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transformers.push(Arc::new(transformer));
        self
    }

    /// Decoded body (null when not JSON) through every transformer, then `mapper`.
    pub fn map<T, F>(&self, mapper: F) -> Result<T>
    where
        F: FnOnce(Value) -> T,
    {
        let data = self.json()?.cloned().unwrap_or(Value::Null);
        let data = self
            .transformers
            .iter()
            .fold(data, |data, transformer| transformer(data));
        Ok(mapper(data))
    }

    // ==================== DTO MAPPING ====================

    pub fn to_dto<T: Hydrate>(&self) -> Result<T> {
        let data = self.json()?.cloned().unwrap_or(Value::Null);
        hydrate(&data, self)
    }

    /// Hydrate from the value at `path` instead of the whole body.
    pub fn to_dto_at<T: Hydrate>(&self, path: &str) -> Result<T> {
        self.json()?;
        let data = self.json_path(path).cloned().unwrap_or(Value::Null);
        hydrate(&data, self)
    }

    /// Hydrate a list body, or the `data` list of a paginated object.
    pub fn to_dto_collection<T: Hydrate>(&self) -> Result<Vec<T>> {
        let items = match self.json()? {
            Some(Value::Array(items)) => items,
            Some(Value::Object(map)) => match map.get("data") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(CallerError::Mapping(
                        "expected a list or an object with a 'data' list".to_string(),
                    ))
                }
            },
            _ => return Ok(Vec::new()),
        };
        items.iter().map(|item| hydrate(item, self)).collect()
    }

    // ==================== ERROR HANDLING ====================

    fn status_error(&self) -> CallerError {
        CallerError::HttpStatus {
            status: self.status(),
            method: self.request.method.to_string(),
            url: self.request.get_url(),
        }
    }

    /// Raise the captured failure, or a status error for any non-2xx.
    pub fn throw(&self) -> Result<&Self> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.raw.is_some() && self.failed() {
            return Err(self.status_error());
        }
        Ok(self)
    }

    pub fn throw_if<F: FnOnce(&Self) -> bool>(&self, condition: F) -> Result<&Self> {
        if condition(self) {
            self.throw()
        } else {
            Ok(self)
        }
    }

    pub fn throw_if_status(&self, status: u16) -> Result<&Self> {
        self.throw_if(|r| r.status() == status)
    }

    pub fn throw_if_client_error(&self) -> Result<&Self> {
        self.throw_if(Self::client_error)
    }

    pub fn throw_if_server_error(&self) -> Result<&Self> {
        self.throw_if(Self::server_error)
    }

    pub fn on_success<F: FnOnce(&Self)>(&self, callback: F) -> &Self {
        if self.successful() {
            callback(self);
        }
        self
    }

    pub fn on_error<F: FnOnce(&Self)>(&self, callback: F) -> &Self {
        if self.failed() {
            callback(self);
        }
        self
    }
}
