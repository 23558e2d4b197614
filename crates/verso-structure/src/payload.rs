//! Payload representation shared by converters, validators and handlers
//!
//! A payload is an ordered mapping of field name to a dynamically typed JSON
//! value. Field order is preserved (`serde_json` is built with
//! `preserve_order`).

use crate::converter::ConverterError;
use serde_json::Value;

/// Ordered field-name → value mapping
pub type Payload = serde_json::Map<String, Value>;

/// Convenience accessors for converter authors
pub trait PayloadExt {
    /// Remove a field and return its value
    ///
    /// # Errors
    /// Returns [`ConverterError::MissingField`] if the field is absent
    fn take_field(&mut self, field: &str) -> Result<Value, ConverterError>;

    /// Borrow a field's value
    ///
    /// # Errors
    /// Returns [`ConverterError::MissingField`] if the field is absent
    fn require_field(&self, field: &str) -> Result<&Value, ConverterError>;

    /// Rename a field in place, keeping its value
    ///
    /// # Errors
    /// Returns [`ConverterError::MissingField`] if `from` is absent
    fn rename_field(&mut self, from: &str, to: &str) -> Result<(), ConverterError>;
}

impl PayloadExt for Payload {
    fn take_field(&mut self, field: &str) -> Result<Value, ConverterError> {
        self.shift_remove(field)
            .ok_or_else(|| ConverterError::MissingField(field.to_string()))
    }

    fn require_field(&self, field: &str) -> Result<&Value, ConverterError> {
        self.get(field)
            .ok_or_else(|| ConverterError::MissingField(field.to_string()))
    }

    fn rename_field(&mut self, from: &str, to: &str) -> Result<(), ConverterError> {
        let value = self.take_field(from)?;
        self.insert(to.to_string(), value);
        Ok(())
    }
}

/// Build a payload from a JSON object literal
///
/// Non-object values produce an empty payload.
#[must_use]
pub fn payload_from(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
