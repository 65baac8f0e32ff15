//! Request body representation and serialization.
//!
//! # Responsibilities
//! - Model the body shapes a caller can hand over (structured, raw, form parts)
//! - Turn a body plus its declared content type into wire bytes
//! - Report header corrections (multipart boundary, Content-Length)
//!
//! # Data Flow
//! ```text
//! (Body, content type, Method)
//!     → bodyless method with empty body?  → empty
//!     → multipart/form-data + mapping     → multipart stream
//!     → x-www-form-urlencoded + mapping   → a=1&b=x%20y
//!     → application/json + non-empty      → canonical JSON
//!     → raw bytes                         → unchanged
//!     → anything else                     → empty
//!     → non-empty and no Content-Length   → Content-Length patch
//! ```

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

use crate::error::{CallerError, Result};
use crate::http::headers::HeaderMap;
use crate::http::query::{encode_pairs, scalar_text};
use crate::http::request::Method;

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const MULTIPART: &str = "multipart/form-data";

/// A file carried in a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub filename: String,
    pub mime_type: String,
    pub contents: Bytes,
}

impl FileAttachment {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            contents: contents.into(),
        }
    }
}

/// One named entry of a form body.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Value(Value),
    File(FileAttachment),
}

impl From<Value> for FormField {
    fn from(value: Value) -> Self {
        FormField::Value(value)
    }
}

impl From<FileAttachment> for FormField {
    fn from(file: FileAttachment) -> Self {
        FormField::File(file)
    }
}

/// What a request carries as payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// Structured data, encoded according to the declared content type.
    Structured(Value),
    /// Bytes passed through untouched.
    Raw(Bytes),
    /// Named form fields that may include file attachments.
    Fields(Vec<(String, FormField)>),
}

impl Body {
    /// Buffer a byte stream into a raw body.
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Body::Raw(Bytes::from(buf)))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Structured(Value::Null) => true,
            Body::Structured(Value::Object(map)) => map.is_empty(),
            Body::Structured(Value::Array(items)) => items.is_empty(),
            Body::Structured(_) => false,
            Body::Raw(bytes) => bytes.is_empty(),
            Body::Fields(fields) => fields.is_empty(),
        }
    }

    fn is_mapping(&self) -> bool {
        matches!(self, Body::Structured(Value::Object(_)) | Body::Fields(_))
    }

    fn has_files(&self) -> bool {
        match self {
            Body::Fields(fields) => fields.iter().any(|(_, f)| matches!(f, FormField::File(_))),
            _ => false,
        }
    }

    /// Entries of a mapping body as form fields.
    fn entries(&self) -> Vec<(String, FormField)> {
        match self {
            Body::Structured(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), FormField::Value(v.clone())))
                .collect(),
            Body::Fields(fields) => fields.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Structured(value)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Raw(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Raw(Bytes::from(text))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Raw(Bytes::from(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Raw(bytes)
    }
}

/// Encoded body plus the headers it requires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Serialized {
    pub bytes: Bytes,
    pub header_patches: Vec<(String, String)>,
}

/// Mime essence: `Application/JSON; charset=utf-8` → `application/json`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Encode `body` for the wire.
///
/// `headers` is only consulted for an explicit Content-Length.
pub fn serialize(
    body: &Body,
    content_type: Option<&str>,
    method: Method,
    headers: &HeaderMap,
) -> Result<Serialized> {
    let mut out = encode(body, content_type.map(essence).as_deref(), method)?;

    if !out.bytes.is_empty() && !headers.contains("content-length") {
        out.header_patches
            .push(("Content-Length".to_string(), out.bytes.len().to_string()));
    }
    Ok(out)
}

fn encode(body: &Body, essence: Option<&str>, method: Method) -> Result<Serialized> {
    if method.is_bodyless() && body.is_empty() {
        return Ok(Serialized::default());
    }

    match (essence, body) {
        (Some(MULTIPART), b) if b.is_mapping() => Ok(multipart(&b.entries())),
        (Some(FORM), b) if b.is_mapping() => {
            if b.has_files() {
                return Err(CallerError::Serialization(
                    "file attachments require multipart/form-data".to_string(),
                ));
            }
            Ok(plain(Bytes::from(form_urlencoded(&b.entries()))))
        }
        (Some(JSON), b) if !b.is_empty() && !matches!(b, Body::Raw(_)) => {
            Ok(plain(Bytes::from(json(b)?)))
        }
        (_, Body::Raw(bytes)) => Ok(plain(bytes.clone())),
        (_, Body::Structured(Value::String(text))) => Ok(plain(Bytes::from(text.clone()))),
        _ => Ok(Serialized::default()),
    }
}

fn plain(bytes: Bytes) -> Serialized {
    Serialized {
        bytes,
        header_patches: Vec::new(),
    }
}

fn json(body: &Body) -> Result<Vec<u8>> {
    let value = match body {
        Body::Structured(value) => value.clone(),
        Body::Fields(fields) => {
            let mut map = serde_json::Map::new();
            for (name, field) in fields {
                match field {
                    FormField::Value(v) => {
                        map.insert(name.clone(), v.clone());
                    }
                    FormField::File(file) => {
                        return Err(CallerError::Serialization(format!(
                            "file attachment '{}' cannot be encoded as JSON",
                            file.filename
                        )))
                    }
                }
            }
            Value::Object(map)
        }
        _ => Value::Null,
    };
    serde_json::to_vec(&value).map_err(|e| CallerError::Serialization(e.to_string()))
}

fn form_urlencoded(entries: &[(String, FormField)]) -> String {
    let values: Vec<(&str, &Value)> = entries
        .iter()
        .filter_map(|(name, field)| match field {
            FormField::Value(v) => Some((name.as_str(), v)),
            FormField::File(_) => None,
        })
        .collect();
    encode_pairs(values.into_iter())
}

fn multipart(entries: &[(String, FormField)]) -> Serialized {
    let boundary = uuid::Uuid::new_v4().simple().to_string();
    let mut buf = BytesMut::new();

    for (name, field) in entries {
        buf.put_slice(format!("--{}\r\n", boundary).as_bytes());
        match field {
            FormField::File(file) => {
                buf.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        disposition_param(name),
                        disposition_param(&file.filename)
                    )
                    .as_bytes(),
                );
                buf.put_slice(format!("Content-Type: {}\r\n\r\n", file.mime_type).as_bytes());
                buf.put_slice(&file.contents);
            }
            FormField::Value(value @ (Value::Array(_) | Value::Object(_))) => {
                buf.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n",
                        disposition_param(name)
                    )
                    .as_bytes(),
                );
                buf.put_slice(format!("Content-Type: {}\r\n\r\n", JSON).as_bytes());
                buf.put_slice(value.to_string().as_bytes());
            }
            FormField::Value(scalar) => {
                buf.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        disposition_param(name)
                    )
                    .as_bytes(),
                );
                buf.put_slice(scalar_text(scalar).as_bytes());
            }
        }
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(format!("--{}--\r\n", boundary).as_bytes());

    Serialized {
        bytes: buf.freeze(),
        header_patches: vec![(
            "Content-Type".to_string(),
            format!("{}; boundary={}", MULTIPART, boundary),
        )],
    }
}

/// Percent-escape characters that would end the quoted parameter or the line.
fn disposition_param(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
