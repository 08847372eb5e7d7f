//! Response decoding for the request layer.
//!
//! Bodies declared as JSON (any content type containing `json`) are parsed;
//! everything else is kept as opaque text.

use serde::de::DeserializeOwned;

use crate::clients::errors::ClassifiedError;

/// A decoded success payload.
///
/// Cheap to clone relative to a network exchange, so deduplicated callers
/// each receive their own copy of the same value.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// A parsed JSON document.
    Json(serde_json::Value),
    /// A non-JSON body.
    Text(String),
    /// No body at all (e.g. 204, HEAD).
    Empty,
}

impl ResponseBody {
    /// Decodes a raw body according to its declared content type.
    ///
    /// # Errors
    ///
    /// Returns the JSON parse error if a JSON-typed body is not valid JSON.
    pub fn decode(content_type: Option<&str>, text: String) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::Empty);
        }
        if is_json_content_type(content_type) {
            serde_json::from_str(&text).map(Self::Json)
        } else {
            Ok(Self::Text(text))
        }
    }

    /// Decodes an error body leniently, for use as [`ClassifiedError`] data.
    ///
    /// Invalid JSON falls back to the raw text as a JSON string.
    #[must_use]
    pub fn decode_error_data(content_type: Option<&str>, text: String) -> Option<serde_json::Value> {
        if text.trim().is_empty() {
            return None;
        }
        if is_json_content_type(content_type) {
            if let Ok(value) = serde_json::from_str(&text) {
                return Some(value);
            }
        }
        Some(serde_json::Value::String(text))
    }

    /// Returns the JSON document, if this is one.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text body, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns `true` if there was no body.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Converts the body into a JSON value. Text becomes a JSON string and
    /// an empty body becomes `null`.
    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => serde_json::Value::String(text),
            Self::Empty => serde_json::Value::Null,
        }
    }

    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassifiedError`] of kind `Malformed` if the body does not
    /// match `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, ClassifiedError> {
        serde_json::from_value(self.into_json()).map_err(ClassifiedError::malformed)
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::ErrorKind;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_decode_json_body() {
        let body = ResponseBody::decode(
            Some("application/json; charset=utf-8"),
            r#"{"temp":60}"#.to_string(),
        )
        .unwrap();
        assert_eq!(body, ResponseBody::Json(json!({"temp": 60})));
    }

    #[test]
    fn test_decode_problem_json_is_json() {
        let body =
            ResponseBody::decode(Some("application/problem+json"), "[1,2]".to_string()).unwrap();
        assert_eq!(body.as_json(), Some(&json!([1, 2])));
    }

    #[test]
    fn test_decode_text_body() {
        let body = ResponseBody::decode(Some("text/plain"), "ok".to_string()).unwrap();
        assert_eq!(body.as_text(), Some("ok"));

        let body = ResponseBody::decode(None, r#"{"looks":"like json"}"#.to_string()).unwrap();
        assert!(body.as_text().is_some());
    }

    #[test]
    fn test_decode_empty_body() {
        let body = ResponseBody::decode(Some("application/json"), String::new()).unwrap();
        assert!(body.is_empty());
        assert_eq!(body.into_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_decode_invalid_json_fails() {
        assert!(ResponseBody::decode(Some("application/json"), "{oops".to_string()).is_err());
    }

    #[test]
    fn test_error_data_is_lenient() {
        assert_eq!(
            ResponseBody::decode_error_data(Some("application/json"), "{oops".to_string()),
            Some(json!("{oops"))
        );
        assert_eq!(
            ResponseBody::decode_error_data(
                Some("application/json"),
                r#"{"error":"x"}"#.to_string()
            ),
            Some(json!({"error": "x"}))
        );
        assert_eq!(
            ResponseBody::decode_error_data(Some("text/html"), "  ".to_string()),
            None
        );
    }

    #[test]
    fn test_deserialize_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Current {
            temp: i32,
        }

        let body = ResponseBody::Json(json!({"temp": 60}));
        assert_eq!(body.deserialize::<Current>().unwrap(), Current { temp: 60 });

        let err = ResponseBody::Text("nope".to_string())
            .deserialize::<Current>()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.status(), 0);
    }
}
