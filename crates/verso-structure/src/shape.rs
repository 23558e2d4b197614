//! Shape and enumeration definitions
//!
//! A [`ShapeDefinition`] is the full description of one interface data shape
//! in one version: its ordered fields and its computed properties. The two
//! namespaces are disjoint. An [`EnumDefinition`] lists enumeration members.

use crate::payload::Payload;
use crate::types::{EnumId, ShapeId, TypeDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Optional field attributes
///
/// Every attribute is optional; merging only overwrites what is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldAttributes {
    /// Default value; a field with a default is not required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Alternative wire name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Human title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Minimum string length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Minimum list length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    /// Maximum list length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Exclusive lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    /// Inclusive lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ge: Option<f64>,
    /// Exclusive upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    /// Inclusive upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub le: Option<f64>,
    /// Regular expression strings must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Marked deprecated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    /// Free-form attributes for collaborators (emitters, docs)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

impl FieldAttributes {
    /// Overlay every attribute set in `other`
    pub fn merge(&mut self, other: &FieldAttributes) {
        macro_rules! overlay {
            ($($attr:ident),*) => {
                $(if other.$attr.is_some() {
                    self.$attr.clone_from(&other.$attr);
                })*
            };
        }
        overlay!(
            default, alias, title, description, min_length, max_length, min_items, max_items,
            gt, ge, lt, le, pattern, deprecated
        );
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Whether no attribute is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A field: type plus attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field type
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    /// Field attributes
    #[serde(flatten)]
    pub attributes: FieldAttributes,
}

impl FieldDefinition {
    /// Field of the given type with no attributes
    #[inline]
    #[must_use]
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            attributes: FieldAttributes::default(),
        }
    }

    /// Replace all attributes
    #[inline]
    #[must_use]
    pub fn with_attributes(mut self, attributes: FieldAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.attributes.default = Some(value);
        self
    }

    /// Set the description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.attributes.description = Some(description.into());
        self
    }

    /// Set the minimum list length
    #[inline]
    #[must_use]
    pub fn with_min_items(mut self, min: usize) -> Self {
        self.attributes.min_items = Some(min);
        self
    }

    /// Set the maximum string length
    #[inline]
    #[must_use]
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.attributes.max_length = Some(max);
        self
    }

    /// Set the string pattern
    #[inline]
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.attributes.pattern = Some(pattern.into());
        self
    }

    /// A field is required unless it has a default or an optional type
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.attributes.default.is_none() && !self.ty.is_optional()
    }
}

/// Partial update of a field definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldChanges {
    /// Replacement type, if the type differed
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeDescriptor>,
    /// Attributes to overlay
    #[serde(flatten)]
    pub attributes: FieldAttributes,
}

impl FieldChanges {
    /// Changes that only replace the type
    #[inline]
    #[must_use]
    pub fn of_type(ty: TypeDescriptor) -> Self {
        Self {
            ty: Some(ty),
            attributes: FieldAttributes::default(),
        }
    }

    /// Changes that only overlay attributes
    #[inline]
    #[must_use]
    pub fn of_attributes(attributes: FieldAttributes) -> Self {
        Self {
            ty: None,
            attributes,
        }
    }

    /// Apply onto a field definition
    pub fn apply_to(&self, field: &mut FieldDefinition) {
        if let Some(ty) = &self.ty {
            field.ty = ty.clone();
        }
        field.attributes.merge(&self.attributes);
    }

    /// Whether nothing would change
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ty.is_none() && self.attributes.is_empty()
    }
}

/// Function computing a derived value from a validated payload
pub type ComputeFn = dyn Fn(&Payload) -> Value + Send + Sync;

/// Named computed property
///
/// Equality compares names only; functions have no identity.
#[derive(Clone)]
pub struct ComputedProperty {
    name: String,
    compute: Arc<ComputeFn>,
}

impl ComputedProperty {
    /// Create a property from a compute function
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Payload) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compute: Arc::new(compute),
        }
    }

    /// Property name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate against a payload
    #[inline]
    #[must_use]
    pub fn compute(&self, payload: &Payload) -> Value {
        (self.compute)(payload)
    }
}

impl Debug for ComputedProperty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ComputedProperty {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn property_names<S>(
    properties: &IndexMap<String, ComputedProperty>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(properties.keys())
}

/// One shape as seen by one version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeDefinition {
    id: ShapeId,
    name: String,
    fields: IndexMap<String, FieldDefinition>,
    #[serde(serialize_with = "property_names")]
    properties: IndexMap<String, ComputedProperty>,
}

impl ShapeDefinition {
    /// Empty shape; its name starts out equal to its id
    #[must_use]
    pub fn new(id: impl Into<ShapeId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            fields: IndexMap::new(),
            properties: IndexMap::new(),
        }
    }

    /// Add (or replace) a field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Add (or replace) a computed property
    #[inline]
    #[must_use]
    pub fn with_property(mut self, property: ComputedProperty) -> Self {
        self.properties.insert(property.name().to_string(), property);
        self
    }

    /// Stable id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ShapeId {
        &self.id
    }

    /// Name in this version
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, FieldDefinition> {
        &self.fields
    }

    /// Look up one field
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Computed properties
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, ComputedProperty> {
        &self.properties
    }

    /// Look up one property
    #[inline]
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&ComputedProperty> {
        self.properties.get(name)
    }

    /// Whether a field or property uses `name`
    #[inline]
    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.properties.contains_key(name)
    }

    /// Names that are both a field and a property (must be empty)
    #[must_use]
    pub fn overlapping_members(&self) -> Vec<&str> {
        self.fields
            .keys()
            .filter(|name| self.properties.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Required fields in declaration order
    pub fn required_fields(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields
            .iter()
            .filter(|(_, field)| field.is_required())
            .map(|(name, field)| (name.as_str(), field))
    }

    /// Rename this shape (identity unchanged)
    #[inline]
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Insert a field at the end; returns the previous definition if any
    #[inline]
    pub fn insert_field(&mut self, name: impl Into<String>, field: FieldDefinition) -> Option<FieldDefinition> {
        self.fields.insert(name.into(), field)
    }

    /// Remove a field, preserving the order of the rest
    #[inline]
    pub fn remove_field(&mut self, name: &str) -> Option<FieldDefinition> {
        self.fields.shift_remove(name)
    }

    /// Mutable access to one field
    #[inline]
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldDefinition> {
        self.fields.get_mut(name)
    }

    /// Insert a property; returns the previous one if any
    #[inline]
    pub fn insert_property(&mut self, property: ComputedProperty) -> Option<ComputedProperty> {
        self.properties.insert(property.name().to_string(), property)
    }

    /// Remove a property
    #[inline]
    pub fn remove_property(&mut self, name: &str) -> Option<ComputedProperty> {
        self.properties.shift_remove(name)
    }
}

/// One enumeration as seen by one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDefinition {
    id: EnumId,
    name: String,
    members: IndexMap<String, Value>,
}

impl EnumDefinition {
    /// Empty enumeration named after its id
    #[must_use]
    pub fn new(id: impl Into<EnumId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            members: IndexMap::new(),
        }
    }

    /// Add a member
    #[inline]
    #[must_use]
    pub fn with_member(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    /// Stable id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &EnumId {
        &self.id
    }

    /// Name in this version
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered members
    #[inline]
    #[must_use]
    pub fn members(&self) -> &IndexMap<String, Value> {
        &self.members
    }

    /// Whether any member carries `value`
    #[inline]
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        self.members.values().any(|member| member == value)
    }

    /// Insert a member; returns the previous value if any
    #[inline]
    pub fn insert_member(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.members.insert(name.into(), value)
    }

    /// Remove a member, preserving order of the rest
    #[inline]
    pub fn remove_member(&mut self, name: &str) -> Option<Value> {
        self.members.shift_remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> ShapeDefinition {
        ShapeDefinition::new("User")
            .with_field("id", FieldDefinition::new(TypeDescriptor::Integer))
            .with_field(
                "addresses",
                FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::String)).with_min_items(1),
            )
            .with_field(
                "nickname",
                FieldDefinition::new(TypeDescriptor::optional(TypeDescriptor::String)),
            )
    }

    #[test]
    fn required_fields_skip_optional_and_defaulted() {
        let shape = user().with_field(
            "active",
            FieldDefinition::new(TypeDescriptor::Boolean).with_default(json!(true)),
        );
        let required: Vec<_> = shape.required_fields().map(|(name, _)| name).collect();
        assert_eq!(required, vec!["id", "addresses"]);
    }

    #[test]
    fn removing_field_keeps_order() {
        let mut shape = user();
        shape.remove_field("addresses");
        let names: Vec<_> = shape.fields().keys().cloned().collect();
        assert_eq!(names, vec!["id", "nickname"]);
    }

    #[test]
    fn field_changes_overlay_only_set_attributes() {
        let mut field = FieldDefinition::new(TypeDescriptor::String).with_description("old");
        let changes = FieldChanges {
            ty: Some(TypeDescriptor::Integer),
            attributes: FieldAttributes {
                max_length: Some(10),
                ..FieldAttributes::default()
            },
        };
        changes.apply_to(&mut field);
        assert_eq!(field.ty, TypeDescriptor::Integer);
        assert_eq!(field.attributes.description.as_deref(), Some("old"));
        assert_eq!(field.attributes.max_length, Some(10));
    }

    #[test]
    fn overlapping_members_detected() {
        let shape = user().with_property(ComputedProperty::new("id", |_| Value::Null));
        assert_eq!(shape.overlapping_members(), vec!["id"]);
    }

    #[test]
    fn properties_compare_by_name() {
        let a = ComputedProperty::new("full", |_| json!(1));
        let b = ComputedProperty::new("full", |_| json!(2));
        assert_eq!(a, b);
        assert_eq!(b.compute(&Payload::new()), json!(2));
    }

    #[test]
    fn field_definition_serde_flattens_attributes() {
        let field = FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::String)).with_min_items(1);
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value, json!({"type": "list[string]", "min_items": 1}));
        let back: FieldDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn shape_serializes_property_names() {
        let shape = ShapeDefinition::new("Company")
            .with_field("name", FieldDefinition::new(TypeDescriptor::String))
            .with_property(ComputedProperty::new("display", |_| Value::Null));
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value["properties"], json!(["display"]));
        assert_eq!(value["name"], json!("Company"));
    }

    #[test]
    fn enum_accepts_member_values() {
        let status = EnumDefinition::new("Status")
            .with_member("active", json!("active"))
            .with_member("banned", json!("banned"));
        assert!(status.accepts(&json!("active")));
        assert!(!status.accepts(&json!("deleted")));
    }
}
