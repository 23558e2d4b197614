//! Data converters attached to version changes
//!
//! Response converters move a payload one step back in time and mutate it in
//! place. Request converters move a payload one step forward and return a
//! new payload. Both are bound to the shapes they handle.

use crate::payload::Payload;
use crate::types::ShapeId;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Errors raised by converter functions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConverterError {
    /// A field the converter needs is absent
    #[error("missing field '{0}'")]
    MissingField(String),

    /// A field has a value the converter cannot handle
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason
        message: String,
    },

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}

/// Signature of a response converter
pub type ResponseFn = dyn Fn(&mut Payload, &ShapeId) -> Result<(), ConverterError> + Send + Sync;

/// Signature of a request converter
pub type RequestFn = dyn Fn(Payload) -> Result<Payload, ConverterError> + Send + Sync;

/// Response converter bound to one or more shapes
#[derive(Clone)]
pub struct ResponseConverter {
    shapes: Vec<ShapeId>,
    func: Arc<ResponseFn>,
}

impl ResponseConverter {
    /// Bind a converter function to shapes
    pub fn new<I, S, F>(shapes: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ShapeId>,
        F: Fn(&mut Payload, &ShapeId) -> Result<(), ConverterError> + Send + Sync + 'static,
    {
        Self {
            shapes: shapes.into_iter().map(Into::into).collect(),
            func: Arc::new(func),
        }
    }

    /// Bound shapes
    #[inline]
    #[must_use]
    pub fn shapes(&self) -> &[ShapeId] {
        &self.shapes
    }

    /// Whether the converter handles `shape`
    #[inline]
    #[must_use]
    pub fn applies_to(&self, shape: &ShapeId) -> bool {
        self.shapes.contains(shape)
    }

    /// Run against a payload of `shape`
    ///
    /// # Errors
    /// Propagates the converter function's error
    #[inline]
    pub fn convert(&self, payload: &mut Payload, shape: &ShapeId) -> Result<(), ConverterError> {
        (self.func)(payload, shape)
    }
}

impl Debug for ResponseConverter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseConverter")
            .field("shapes", &self.shapes)
            .finish_non_exhaustive()
    }
}

/// Request converter bound to one shape
#[derive(Clone)]
pub struct RequestConverter {
    shape: ShapeId,
    func: Arc<RequestFn>,
}

impl RequestConverter {
    /// Bind a converter function to a shape
    pub fn new<F>(shape: impl Into<ShapeId>, func: F) -> Self
    where
        F: Fn(Payload) -> Result<Payload, ConverterError> + Send + Sync + 'static,
    {
        Self {
            shape: shape.into(),
            func: Arc::new(func),
        }
    }

    /// Bound shape
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &ShapeId {
        &self.shape
    }

    /// Whether the converter handles `shape`
    #[inline]
    #[must_use]
    pub fn applies_to(&self, shape: &ShapeId) -> bool {
        &self.shape == shape
    }

    /// Produce the next version's payload
    ///
    /// # Errors
    /// Propagates the converter function's error
    #[inline]
    pub fn convert(&self, payload: Payload) -> Result<Payload, ConverterError> {
        (self.func)(payload)
    }
}

impl Debug for RequestConverter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConverter")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{payload_from, PayloadExt};
    use serde_json::json;

    #[test]
    fn response_converter_mutates_in_place() {
        let converter = ResponseConverter::new(["Company"], |payload, _| {
            let ids = payload.take_field("vat_ids")?;
            let first = ids.get(0).cloned().unwrap_or_default();
            payload.insert("vat_id".to_string(), first);
            Ok(())
        });
        let shape = ShapeId::new("Company");
        let mut payload = payload_from(json!({"vat_ids": ["a", "b"]}));
        converter.convert(&mut payload, &shape).unwrap();
        assert_eq!(payload["vat_id"], json!("a"));
        assert!(converter.applies_to(&shape));
        assert!(!converter.applies_to(&ShapeId::new("User")));
    }

    #[test]
    fn request_converter_returns_new_payload() {
        let converter = RequestConverter::new("Company", |mut payload| {
            let id = payload.take_field("vat_id")?;
            payload.insert("vat_ids".to_string(), json!([id]));
            Ok(payload)
        });
        let out = converter.convert(payload_from(json!({"vat_id": "a"}))).unwrap();
        assert_eq!(out["vat_ids"], json!(["a"]));
        assert_eq!(
            converter.convert(Payload::new()).unwrap_err(),
            ConverterError::MissingField("vat_id".to_string())
        );
    }
}
