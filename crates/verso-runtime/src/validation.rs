//! Payload validation against a version's shapes
//!
//! [`PayloadValidator`] is the seam used by migration; [`ShapeValidator`] is
//! the built-in implementation. It checks required fields, types (recursing
//! into nested shapes, lists and maps), enumeration members and the
//! constraint attributes of each field. Fields the shape does not declare
//! are ignored here; stripping them is a separate step.

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use verso_structure::{FieldAttributes, Payload, ShapeDefinition, TypeDescriptor};
use verso_synthesis::ShapeTable;

/// One problem found in a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted location, e.g. `data[0].value`
    pub path: String,
    /// What is wrong
    pub message: String,
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every issue found in one payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Whether nothing was found
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Recorded issues
    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Whether an issue was recorded at `path`
    #[must_use]
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Checks a payload against a shape
#[cfg_attr(test, mockall::automock)]
pub trait PayloadValidator: Send + Sync {
    /// Validate `payload` as an instance of `shape`
    ///
    /// `shapes` is the table of the version being validated against; nested
    /// shape and enum references resolve through it.
    fn validate(&self, payload: &Payload, shape: &ShapeDefinition, shapes: &ShapeTable) -> ValidationReport;
}

/// Built-in structural validator
///
/// Field patterns are compiled on first use and kept for the validator's
/// lifetime; an invalid pattern is remembered as such.
#[derive(Debug, Default)]
pub struct ShapeValidator {
    patterns: RwLock<HashMap<String, Result<Regex, String>>>,
}

impl ShapeValidator {
    /// Create a validator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self, pattern: &str) -> Result<Regex, String> {
        if let Some(compiled) = self.patterns.read().get(pattern) {
            return compiled.clone();
        }
        let compiled = Regex::new(pattern).map_err(|e| e.to_string());
        self.patterns
            .write()
            .entry(pattern.to_string())
            .or_insert(compiled)
            .clone()
    }

    fn check_object(
        &self,
        payload: &Payload,
        shape: &ShapeDefinition,
        shapes: &ShapeTable,
        prefix: &str,
        report: &mut ValidationReport,
    ) {
        for (name, field) in shape.fields() {
            let path = join(prefix, name);
            match payload.get(name) {
                None if field.is_required() => report.push(path, "field required"),
                None => {}
                Some(value) => {
                    self.check_value(value, &field.ty, shapes, &path, report);
                    self.check_constraints(value, &field.attributes, &path, report);
                }
            }
        }
    }

    fn check_value(
        &self,
        value: &Value,
        ty: &TypeDescriptor,
        shapes: &ShapeTable,
        path: &str,
        report: &mut ValidationReport,
    ) {
        let mismatch = |report: &mut ValidationReport| {
            report.push(
                path,
                format!("expected {}, got {}", shapes.render_type(ty), kind_of(value)),
            );
        };

        match ty {
            TypeDescriptor::Any => {}
            TypeDescriptor::Optional(_) | TypeDescriptor::Null if value.is_null() => {}
            TypeDescriptor::Optional(inner) => self.check_value(value, inner, shapes, path, report),
            TypeDescriptor::Null => mismatch(report),
            TypeDescriptor::String if !value.is_string() => mismatch(report),
            TypeDescriptor::Integer if !(value.is_i64() || value.is_u64()) => mismatch(report),
            TypeDescriptor::Number if !value.is_number() => mismatch(report),
            TypeDescriptor::Boolean if !value.is_boolean() => mismatch(report),
            TypeDescriptor::String
            | TypeDescriptor::Integer
            | TypeDescriptor::Number
            | TypeDescriptor::Boolean => {}
            TypeDescriptor::List(inner) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.check_value(item, inner, shapes, &format!("{path}[{i}]"), report);
                    }
                }
                None => mismatch(report),
            },
            TypeDescriptor::Map(inner) => match value.as_object() {
                Some(entries) => {
                    for (key, item) in entries {
                        self.check_value(item, inner, shapes, &join(path, key), report);
                    }
                }
                None => mismatch(report),
            },
            TypeDescriptor::Shape(id) => match (value.as_object(), shapes.shape(id)) {
                (Some(object), Some(nested)) => {
                    self.check_object(object, nested, shapes, path, report);
                }
                (Some(_), None) => report.push(path, format!("shape '{id}' does not exist")),
                (None, _) => mismatch(report),
            },
            TypeDescriptor::Enum(id) => match shapes.enumeration(id) {
                Some(enumeration) if enumeration.accepts(value) => {}
                Some(enumeration) => report.push(
                    path,
                    format!("{value} is not a member of {}", enumeration.name()),
                ),
                None => report.push(path, format!("enumeration '{id}' does not exist")),
            },
        }
    }

    fn check_constraints(
        &self,
        value: &Value,
        attributes: &FieldAttributes,
        path: &str,
        report: &mut ValidationReport,
    ) {
        if let Some(text) = value.as_str() {
            let length = text.chars().count();
            if let Some(min) = attributes.min_length.filter(|min| length < *min) {
                report.push(path, format!("length {length} is below minimum {min}"));
            }
            if let Some(max) = attributes.max_length.filter(|max| length > *max) {
                report.push(path, format!("length {length} exceeds maximum {max}"));
            }
            if let Some(pattern) = &attributes.pattern {
                match self.pattern(pattern) {
                    Ok(re) if re.is_match(text) => {}
                    Ok(_) => report.push(path, format!("does not match pattern '{pattern}'")),
                    Err(e) => report.push(path, format!("invalid pattern '{pattern}': {e}")),
                }
            }
        }

        if let Some(items) = value.as_array() {
            let count = items.len();
            if let Some(min) = attributes.min_items.filter(|min| count < *min) {
                report.push(path, format!("{count} items, at least {min} required"));
            }
            if let Some(max) = attributes.max_items.filter(|max| count > *max) {
                report.push(path, format!("{count} items, at most {max} allowed"));
            }
        }

        if let Some(number) = value.as_f64() {
            let bounds = [
                (attributes.gt, "greater than", number > attributes.gt.unwrap_or(f64::NEG_INFINITY)),
                (attributes.ge, "at least", number >= attributes.ge.unwrap_or(f64::NEG_INFINITY)),
                (attributes.lt, "less than", number < attributes.lt.unwrap_or(f64::INFINITY)),
                (attributes.le, "at most", number <= attributes.le.unwrap_or(f64::INFINITY)),
            ];
            for (bound, relation, ok) in bounds {
                if let (Some(bound), false) = (bound, ok) {
                    report.push(path, format!("{number} must be {relation} {bound}"));
                }
            }
        }
    }
}

impl PayloadValidator for ShapeValidator {
    fn validate(&self, payload: &Payload, shape: &ShapeDefinition, shapes: &ShapeTable) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.check_object(payload, shape, shapes, "", &mut report);
        report
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use verso_structure::{
        payload_from, ApiDefinition, EnumDefinition, FieldDefinition, ShapeDefinition,
    };

    fn table() -> ShapeTable {
        let definition = ApiDefinition::builder()
            .enumeration(
                EnumDefinition::new("Color")
                    .with_member("red", json!("red"))
                    .with_member("blue", json!("blue")),
            )
            .shape(
                ShapeDefinition::new("Tag")
                    .with_field("label", FieldDefinition::new(TypeDescriptor::String).with_max_length(5)),
            )
            .shape(
                ShapeDefinition::new("Item")
                    .with_field("id", FieldDefinition::new(TypeDescriptor::Integer))
                    .with_field(
                        "code",
                        FieldDefinition::new(TypeDescriptor::String).with_pattern("^[A-Z]{3}$"),
                    )
                    .with_field(
                        "note",
                        FieldDefinition::new(TypeDescriptor::optional(TypeDescriptor::String)),
                    )
                    .with_field("color", FieldDefinition::new(TypeDescriptor::enumeration("Color")))
                    .with_field(
                        "tags",
                        FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::shape("Tag")))
                            .with_min_items(1),
                    )
                    .with_field(
                        "score",
                        FieldDefinition::new(TypeDescriptor::Number).with_attributes(FieldAttributes {
                            ge: Some(0.0),
                            lt: Some(10.0),
                            ..FieldAttributes::default()
                        }),
                    ),
            )
            .build()
            .unwrap();
        ShapeTable::from_definition(&definition).unwrap()
    }

    fn validate(value: Value) -> ValidationReport {
        let shapes = table();
        let item = shapes.shape(&"Item".into()).unwrap().clone();
        ShapeValidator::new().validate(&payload_from(value), &item, &shapes)
    }

    fn valid_item() -> Value {
        json!({
            "id": 1,
            "code": "ABC",
            "color": "red",
            "tags": [{"label": "new"}],
            "score": 3.5
        })
    }

    #[test]
    fn valid_payload_passes() {
        let report = validate(valid_item());
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut item = valid_item();
        item["extra"] = json!(true);
        assert!(validate(item).is_valid());
    }

    #[test]
    fn missing_required_field() {
        let mut item = valid_item();
        item.as_object_mut().unwrap().remove("id");
        let report = validate(item);
        assert!(report.has_issue_at("id"));
        assert_eq!(report.issues().len(), 1);
    }

    #[test]
    fn optional_accepts_null_others_do_not() {
        let mut item = valid_item();
        item["note"] = Value::Null;
        assert!(validate(item.clone()).is_valid());

        item["code"] = Value::Null;
        assert!(validate(item).has_issue_at("code"));
    }

    #[test]
    fn integer_rejects_floats() {
        let mut item = valid_item();
        item["id"] = json!(1.5);
        let report = validate(item);
        assert!(report.to_string().contains("expected integer, got number"), "{report}");
    }

    #[test]
    fn nested_shapes_are_checked() {
        let mut item = valid_item();
        item["tags"] = json!([{"label": "ok"}, {"label": "far too long"}, {}]);
        let report = validate(item);
        assert!(report.has_issue_at("tags[1].label"));
        assert!(report.has_issue_at("tags[2].label"));
        assert!(!report.has_issue_at("tags[0].label"));
    }

    #[test]
    fn constraints() {
        let mut item = valid_item();
        item["tags"] = json!([]);
        item["code"] = json!("abc");
        item["score"] = json!(10);
        item["color"] = json!("green");
        let report = validate(item);
        for path in ["tags", "code", "score", "color"] {
            assert!(report.has_issue_at(path), "{path}: {report}");
        }
    }

    #[test]
    fn patterns_compile_once_per_validator() {
        let shapes = table();
        let item = shapes.shape(&"Item".into()).unwrap();
        let validator = ShapeValidator::new();
        for code in ["ABC", "abc", "XYZ"] {
            let mut body = valid_item();
            body["code"] = json!(code);
            let report = validator.validate(&payload_from(body), item, &shapes);
            assert_eq!(report.is_valid(), code != "abc", "{code}: {report}");
        }
        let patterns = validator.patterns.read();
        assert_eq!(patterns.len(), 1);
        assert!(patterns["^[A-Z]{3}$"].is_ok());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let definition = ApiDefinition::builder()
            .shape(
                ShapeDefinition::new("Code")
                    .with_field("value", FieldDefinition::new(TypeDescriptor::String).with_pattern("([A-Z")),
            )
            .build()
            .unwrap();
        let shapes = ShapeTable::from_definition(&definition).unwrap();
        let code = shapes.shape(&"Code".into()).unwrap();
        let validator = ShapeValidator::new();
        for _ in 0..2 {
            let report = validator.validate(&payload_from(json!({"value": "A"})), code, &shapes);
            assert!(report.to_string().contains("invalid pattern '([A-Z'"), "{report}");
        }
        assert!(validator.patterns.read()["([A-Z"].is_err());
    }

    #[test]
    fn mock_validator_is_usable_as_trait_object() {
        let mut mock = MockPayloadValidator::new();
        mock.expect_validate().times(1).returning(|_, _, _| {
            let mut report = ValidationReport::new();
            report.push("id", "rejected");
            report
        });
        let validator: &dyn PayloadValidator = &mock;
        let shapes = table();
        let item = shapes.shape(&"Item".into()).unwrap();
        let report = validator.validate(&Payload::new(), item, &shapes);
        assert_eq!(report.to_string(), "id: rejected");
    }
}
