//! DTO hydration.
//!
//! A target type opts into one or more strategies by overriding the
//! matching `Hydrate` method. They are tried in a fixed order:
//!
//! ```text
//! from_array(json)        explicit factory over the decoded body
//! from_response(response) factory that wants status, headers, metadata
//! from_fields(json)       field-by-field, usually `mapping::fields`
//! ```
//!
//! The first strategy returning `Some` wins. A type with none fails with
//! `CallerError::Mapping`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CallerError, Result};
use crate::http::response::ResponseModel;

pub trait Hydrate: Sized {
    fn from_array(_data: &Value) -> Option<Result<Self>> {
        None
    }

    fn from_response(_response: &ResponseModel) -> Option<Result<Self>> {
        None
    }

    fn from_fields(_data: &Value) -> Option<Result<Self>> {
        None
    }
}

/// Field-by-field hydration through serde.
pub fn fields<T: DeserializeOwned>(data: &Value) -> Option<Result<T>> {
    Some(
        serde_json::from_value(data.clone()).map_err(|e| {
            CallerError::Mapping(format!("{}: {}", std::any::type_name::<T>(), e))
        }),
    )
}

/// Build `T` from `data`, trying each strategy in order.
pub fn hydrate<T: Hydrate>(data: &Value, response: &ResponseModel) -> Result<T> {
    T::from_array(data)
        .or_else(|| T::from_response(response))
        .or_else(|| T::from_fields(data))
        .unwrap_or_else(|| {
            Err(CallerError::Mapping(format!(
                "no hydration strategy for {}",
                std::any::type_name::<T>()
            )))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestModel;
    use crate::http::response::CallMetadata;
    use crate::http::wire::RawResponse;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn response(status: u16) -> ResponseModel {
        ResponseModel::new(
            RawResponse::new(status),
            Arc::new(RequestModel::to("https://api.test")),
            CallMetadata::default(),
        )
    }

    /// Has both an array factory and field hydration; the factory wins.
    #[derive(Debug, Deserialize, PartialEq)]
    struct Tagged {
        source: String,
    }

    impl Hydrate for Tagged {
        fn from_array(_data: &Value) -> Option<Result<Self>> {
            Some(Ok(Tagged {
                source: "array".into(),
            }))
        }

        fn from_fields(data: &Value) -> Option<Result<Self>> {
            fields(data)
        }
    }

    struct StatusOnly(u16);

    impl Hydrate for StatusOnly {
        fn from_response(response: &ResponseModel) -> Option<Result<Self>> {
            Some(Ok(StatusOnly(response.status())))
        }
    }

    struct Opaque;

    impl Hydrate for Opaque {}

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Strict {
        id: u64,
    }

    impl Hydrate for Strict {
        fn from_fields(data: &Value) -> Option<Result<Self>> {
            fields(data)
        }
    }

    #[test]
    fn test_precedence() {
        let tagged: Tagged = hydrate(&json!({"source": "fields"}), &response(200)).unwrap();
        assert_eq!(tagged.source, "array");

        let status: StatusOnly = hydrate(&Value::Null, &response(202)).unwrap();
        assert_eq!(status.0, 202);
    }

    #[test]
    fn test_no_strategy() {
        let err = hydrate::<Opaque>(&json!({}), &response(200)).err().unwrap();
        assert!(matches!(err, CallerError::Mapping(msg) if msg.contains("no hydration strategy")));
    }

    #[test]
    fn test_field_errors_are_mapping_errors() {
        let err = hydrate::<Strict>(&json!({"id": "x"}), &response(200)).unwrap_err();
        assert!(matches!(err, CallerError::Mapping(_)));
    }
}
