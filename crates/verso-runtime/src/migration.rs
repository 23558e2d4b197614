//! Payload migration between versions
//!
//! Responses travel backward from the latest version to the client's; requests
//! travel forward from the client's version to the latest. Both work on a
//! private copy of the payload: the caller's value is never touched and a
//! failed migration leaves nothing half-converted behind.

use crate::config::RuntimeConfig;
use crate::error::MigrationError;
use crate::validation::{PayloadValidator, ShapeValidator};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use verso_structure::{ApiVersion, Payload, ShapeDefinition, ShapeId, TypeDescriptor};
use verso_synthesis::{ShapeTable, VersionSnapshot, VersionTables};
use verso_versions::Hop;

/// Result type for migrations
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Converts payloads between published versions
#[derive(Clone)]
pub struct Migrator {
    tables: Arc<VersionTables>,
    validator: Arc<dyn PayloadValidator>,
    config: RuntimeConfig,
}

impl Migrator {
    /// Migrator over `tables` with the built-in validator and default config
    #[must_use]
    pub fn new(tables: Arc<VersionTables>) -> Self {
        Self {
            tables,
            validator: Arc::new(ShapeValidator::new()),
            config: RuntimeConfig::default(),
        }
    }

    /// Replace the validator
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Tables migrations run against
    #[inline]
    #[must_use]
    pub fn tables(&self) -> &Arc<VersionTables> {
        &self.tables
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Convert a latest-version response into version `to`
    ///
    /// `None` means the latest version and returns the payload unchanged.
    /// Otherwise `to` is resolved to a published version and every response
    /// converter bound to `shape` on the versions crossed runs newest first;
    /// the result is validated against `to`'s shape, stripped of undeclared
    /// fields (when configured) and extended with `to`'s computed properties.
    ///
    /// Only converters bound to `shape` itself run. A change to a shape nested
    /// inside `shape` is bridged by binding a converter to `shape` as well.
    ///
    /// # Errors
    /// - [`MigrationError::UnknownVersion`] if `to` predates the oldest version
    /// - [`MigrationError::Converter`] if a converter fails
    /// - [`MigrationError::UnknownShape`] if `to` has no such shape
    /// - [`MigrationError::ResponseValidation`] if the result does not fit
    pub fn migrate_response(
        &self,
        payload: &Payload,
        shape: &ShapeId,
        to: Option<ApiVersion>,
    ) -> Result<Payload> {
        let Some(target) = to else {
            return Ok(payload.clone());
        };
        let target = self.resolve(target)?;

        let mut migrated = self.convert_backward(payload.clone(), shape, target)?;

        let snapshot = self.snapshot(target)?;
        let definition = shape_at(snapshot, shape)?;
        let report = self.validator.validate(&migrated, definition, snapshot.shapes());
        if !report.is_valid() {
            tracing::warn!(
                shape = %shape,
                version = %target,
                "response failed validation: {}",
                report
            );
            return Err(MigrationError::ResponseValidation {
                shape: shape.clone(),
                version: target,
                report,
            });
        }

        let computed: Vec<(String, Value)> = definition
            .properties()
            .values()
            .map(|property| (property.name().to_string(), property.compute(&migrated)))
            .collect();
        if self.config.strip_unknown_fields {
            strip_unknown_fields(&mut migrated, definition, snapshot.shapes());
        }
        migrated.extend(computed);

        Ok(migrated)
    }

    /// Convert a request sent at version `from` into the latest version
    ///
    /// `None` means the latest version and returns the payload unchanged.
    /// Otherwise the payload walks forward one version at a time. A step whose
    /// changes alter the fields of `shape`, or of any shape reachable from it
    /// through its fields, must provide a request converter bound to `shape`.
    /// The result of every step is validated against the next version; the
    /// check at `from` runs only with request validation on.
    ///
    /// # Errors
    /// - [`MigrationError::UnknownVersion`] if `from` predates the oldest version
    /// - [`MigrationError::NoRequestConverter`] if a step lacks a converter
    /// - [`MigrationError::Converter`] if a converter fails
    /// - [`MigrationError::RequestValidation`] if a step's result does not fit
    pub fn migrate_request(
        &self,
        payload: &Payload,
        shape: &ShapeId,
        from: Option<ApiVersion>,
    ) -> Result<Payload> {
        let Some(origin) = from else {
            return Ok(payload.clone());
        };
        let origin = self.resolve(origin)?;

        let hops = self.hops(origin, self.tables.latest())?;
        if self.config.validate_requests {
            self.check_request(payload, shape, origin)?;
        }

        let mut current = payload.clone();
        for hop in &hops {
            current = self.convert_forward(current, shape, hop)?;
            self.check_request(&current, shape, hop.to)?;
        }
        Ok(current)
    }

    /// Run response converters only, leaving validation to the caller
    ///
    /// Converts latest-version `payload` of `shape` into `version`.
    ///
    /// # Errors
    /// - [`MigrationError::UnknownVersion`] if `version` predates the oldest version
    /// - [`MigrationError::Converter`] if a converter fails
    pub fn data_to_version(
        &self,
        shape: &ShapeId,
        payload: &Payload,
        version: ApiVersion,
    ) -> Result<Payload> {
        let version = self.resolve(version)?;
        self.convert_backward(payload.clone(), shape, version)
    }

    /// Map a requested date onto the published version serving it
    ///
    /// Dates between two versions resolve to the older one; dates after the
    /// latest resolve to the latest.
    ///
    /// # Errors
    /// Returns [`MigrationError::UnknownVersion`] for dates before the oldest version
    pub fn resolve(&self, requested: ApiVersion) -> Result<ApiVersion> {
        self.tables
            .graph()
            .resolve(requested)
            .map_err(|_| MigrationError::UnknownVersion(requested))
    }

    fn convert_backward(
        &self,
        mut payload: Payload,
        shape: &ShapeId,
        target: ApiVersion,
    ) -> Result<Payload> {
        for hop in self.hops(self.tables.latest(), target)? {
            for change in &hop.changes {
                for converter in change.response_converters_for(shape) {
                    tracing::debug!(
                        change = change.description(),
                        shape = %shape,
                        to = %hop.to,
                        "converting response"
                    );
                    converter
                        .convert(&mut payload, shape)
                        .map_err(|source| MigrationError::Converter {
                            change: change.description().to_string(),
                            shape: shape.clone(),
                            source,
                        })?;
                }
            }
        }
        Ok(payload)
    }

    fn convert_forward(&self, mut payload: Payload, shape: &ShapeId, hop: &Hop) -> Result<Payload> {
        let has_converter = hop
            .changes
            .iter()
            .any(|change| change.request_converters_for(shape).next().is_some());
        if !has_converter {
            let mut reachable = BTreeSet::new();
            for version in [hop.from, hop.to] {
                collect_shapes(self.snapshot(version)?.shapes(), shape, &mut reachable);
            }
            let altered = reachable.iter().find(|candidate| {
                hop.changes
                    .iter()
                    .any(|change| change.alters_fields_of(candidate))
            });
            if let Some(altered) = altered {
                tracing::warn!(
                    shape = %shape,
                    altered = %altered,
                    from = %hop.from,
                    to = %hop.to,
                    "fields changed without a request converter"
                );
                return Err(MigrationError::NoRequestConverter {
                    shape: shape.clone(),
                    from: hop.from,
                    to: hop.to,
                });
            }
            return Ok(payload);
        }

        for change in &hop.changes {
            for converter in change.request_converters_for(shape) {
                tracing::debug!(
                    change = change.description(),
                    shape = %shape,
                    to = %hop.to,
                    "converting request"
                );
                payload = converter
                    .convert(payload)
                    .map_err(|source| MigrationError::Converter {
                        change: change.description().to_string(),
                        shape: shape.clone(),
                        source,
                    })?;
            }
        }
        Ok(payload)
    }

    fn check_request(&self, payload: &Payload, shape: &ShapeId, version: ApiVersion) -> Result<()> {
        let snapshot = self.snapshot(version)?;
        let definition = shape_at(snapshot, shape)?;
        let report = self.validator.validate(payload, definition, snapshot.shapes());
        if report.is_valid() {
            return Ok(());
        }
        tracing::warn!(
            shape = %shape,
            version = %version,
            "request failed validation: {}",
            report
        );
        Err(MigrationError::RequestValidation {
            shape: shape.clone(),
            version,
            report,
        })
    }

    fn hops(&self, from: ApiVersion, to: ApiVersion) -> Result<Vec<Hop>> {
        let graph = self.tables.graph();
        graph.hops(from, to).map_err(|_| {
            let unknown = if graph.contains(from) { to } else { from };
            MigrationError::UnknownVersion(unknown)
        })
    }

    fn snapshot(&self, version: ApiVersion) -> Result<&VersionSnapshot> {
        self.tables
            .snapshot(version)
            .ok_or(MigrationError::UnknownVersion(version))
    }
}

impl Debug for Migrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("latest", &self.tables.latest())
            .field("fingerprint", &self.tables.fingerprint().short())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// `root` and every shape reachable from it through field types
fn collect_shapes(shapes: &ShapeTable, root: &ShapeId, into: &mut BTreeSet<ShapeId>) {
    if !into.insert(root.clone()) {
        return;
    }
    if let Some(definition) = shapes.shape(root) {
        for field in definition.fields().values() {
            for nested in field.ty.shape_refs() {
                collect_shapes(shapes, nested, into);
            }
        }
    }
}

fn shape_at<'a>(snapshot: &'a VersionSnapshot, shape: &ShapeId) -> Result<&'a ShapeDefinition> {
    snapshot
        .shapes()
        .shape(shape)
        .ok_or_else(|| MigrationError::UnknownShape {
            shape: shape.clone(),
            version: snapshot.version(),
        })
}

/// Drop every field `shape` does not declare, recursing into nested shapes
pub fn strip_unknown_fields(payload: &mut Payload, shape: &ShapeDefinition, shapes: &ShapeTable) {
    payload.retain(|name, _| shape.field(name).is_some());
    for (name, value) in payload.iter_mut() {
        if let Some(field) = shape.field(name) {
            strip_value(value, &field.ty, shapes);
        }
    }
}

fn strip_value(value: &mut Value, ty: &TypeDescriptor, shapes: &ShapeTable) {
    match (ty, value) {
        (TypeDescriptor::Optional(inner), value) => strip_value(value, inner, shapes),
        (TypeDescriptor::List(inner), Value::Array(items)) => {
            for item in items {
                strip_value(item, inner, shapes);
            }
        }
        (TypeDescriptor::Map(inner), Value::Object(entries)) => {
            for item in entries.values_mut() {
                strip_value(item, inner, shapes);
            }
        }
        (TypeDescriptor::Shape(id), Value::Object(object)) => {
            if let Some(nested) = shapes.shape(id) {
                strip_unknown_fields(object, nested, shapes);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{MockPayloadValidator, ValidationReport};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use verso_structure::instruction::shape;
    use verso_structure::{
        ApiDefinition, ComputedProperty, FieldDefinition, ShapeDefinition, Version, VersionChange,
    };
    use verso_synthesis::{synthesize, VersionedSchema};
    use verso_test_utils::{payload, users_definition, users_versions, v, V2000, V2001};

    fn users(with_converters: bool) -> Migrator {
        let schema = VersionedSchema::new(users_definition(), users_versions(with_converters)).unwrap();
        Migrator::new(Arc::new(synthesize(Arc::new(schema)).unwrap()))
    }

    #[test]
    fn latest_is_untouched() {
        let migrator = users(true);
        let body = payload(json!({"id": 1, "addresses": ["X"], "internal": true}));
        let out = migrator.migrate_response(&body, &"User".into(), None).unwrap();
        assert_eq!(out, body);
        let out = migrator.migrate_request(&body, &"User".into(), None).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn response_to_latest_version_is_filtered() {
        let migrator = users(true);
        let body = payload(json!({"id": 1, "addresses": ["X"], "internal": true}));
        let out = migrator
            .migrate_response(&body, &"User".into(), Some(v(V2001)))
            .unwrap();
        assert_eq!(out, payload(json!({"id": 1, "addresses": ["X"]})));
    }

    #[test]
    fn caller_payload_is_not_mutated() {
        let migrator = users(true);
        let body = payload(json!({"id": 83, "addresses": ["X", "Y"]}));
        let before = body.clone();
        migrator
            .migrate_response(&body, &"User".into(), Some(v(V2000)))
            .unwrap();
        assert_eq!(body, before);
    }

    #[test]
    fn converter_failure_names_the_change() {
        let migrator = users(true);
        let body = payload(json!({"id": 83}));
        let err = migrator
            .migrate_response(&body, &"User".into(), Some(v(V2000)))
            .unwrap_err();
        match err {
            MigrationError::Converter { change, shape, .. } => {
                assert_eq!(change, "User address became a list of addresses");
                assert_eq!(shape, ShapeId::from("User"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_version_is_reported() {
        let migrator = users(true);
        let body = payload(json!({"id": 83, "addresses": ["X"]}));
        let err = migrator
            .migrate_response(&body, &"User".into(), Some(v("1999-01-01")))
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion(version) if version == v("1999-01-01")));

        let err = migrator
            .migrate_request(&body, &"User".into(), Some(v("1999-01-01")))
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion(_)));
    }

    #[test]
    fn dates_resolve_to_published_versions() {
        let migrator = users(true);
        let body = payload(json!({"id": 83, "addresses": ["X", "Y"]}));
        let between = migrator
            .migrate_response(&body, &"User".into(), Some(v("2000-06-15")))
            .unwrap();
        assert_eq!(between, payload(json!({"id": 83, "address": "X"})));

        let future = migrator
            .migrate_response(&body, &"User".into(), Some(v("2030-01-01")))
            .unwrap();
        assert_eq!(future, body);
    }

    #[test]
    fn unknown_shape_is_reported() {
        let migrator = users(true);
        let err = migrator
            .migrate_response(&Payload::new(), &"Ghost".into(), Some(v(V2000)))
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnknownShape { .. }));
    }

    #[test]
    fn request_without_converter_fails() {
        let migrator = users(false);
        let body = payload(json!({"id": 1, "address": "X"}));
        let err = migrator
            .migrate_request(&body, &"User".into(), Some(v(V2000)))
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::NoRequestConverter { from, to, .. } if from == v(V2000) && to == v(V2001)
        ));
    }

    #[test]
    fn request_validated_at_origin() {
        let migrator = users(true);
        let body = payload(json!({"id": 1}));
        let err = migrator
            .migrate_request(&body, &"User".into(), Some(v(V2000)))
            .unwrap_err();
        match err {
            MigrationError::RequestValidation { version, report, .. } => {
                assert_eq!(version, v(V2000));
                assert!(report.has_issue_at("address"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn origin_check_can_be_disabled() {
        let migrator = users(true).with_config(RuntimeConfig::new().with_validate_requests(false));
        let err = migrator
            .migrate_request(&payload(json!({"id": "1", "address": "X"})), &"User".into(), Some(v(V2000)))
            .unwrap_err();
        // steps are still checked against the version they land in
        assert!(matches!(
            err,
            MigrationError::RequestValidation { version, .. } if version == v(V2001)
        ));

        let out = migrator
            .migrate_request(&payload(json!({"id": 1, "address": "X", "extra": 2})), &"User".into(), Some(v(V2000)))
            .unwrap();
        assert_eq!(out, payload(json!({"id": 1, "extra": 2, "addresses": ["X"]})));
    }

    #[test]
    fn stripping_can_be_disabled() {
        let migrator = users(true).with_config(RuntimeConfig::new().with_strip_unknown_fields(false));
        let body = payload(json!({"id": 1, "addresses": ["X"], "internal": true}));
        let out = migrator
            .migrate_response(&body, &"User".into(), Some(v(V2000)))
            .unwrap();
        assert_eq!(out, payload(json!({"id": 1, "internal": true, "address": "X"})));
    }

    #[test]
    fn data_to_version_skips_validation() {
        let migrator = users(true);
        let body = payload(json!({"addresses": ["X"], "internal": true}));
        let out = migrator
            .data_to_version(&"User".into(), &body, v(V2000))
            .unwrap();
        assert_eq!(out, payload(json!({"internal": true, "address": "X"})));
    }

    #[test]
    fn computed_properties_are_added() {
        let definition = ApiDefinition::builder()
            .shape(
                ShapeDefinition::new("Person")
                    .with_field("first", FieldDefinition::new(TypeDescriptor::String))
                    .with_field("last", FieldDefinition::new(TypeDescriptor::String)),
            )
            .build()
            .unwrap();
        let change = VersionChange::builder("full name was a property")
            .instruction(shape("Person").property("full_name").existed(|payload| {
                let part = |key: &str| payload.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
                json!(format!("{} {}", part("first"), part("last")))
            }))
            .build()
            .unwrap();
        let versions = [
            Version::new(v(V2001)).with_change(change),
            Version::new(v(V2000)),
        ];
        let schema = VersionedSchema::new(definition, versions).unwrap();
        let migrator = Migrator::new(Arc::new(synthesize(Arc::new(schema)).unwrap()));

        let body = payload(json!({"first": "Ada", "last": "Lovelace"}));
        let out = migrator
            .migrate_response(&body, &"Person".into(), Some(v(V2000)))
            .unwrap();
        assert_eq!(out["full_name"], json!("Ada Lovelace"));

        let latest = migrator
            .migrate_response(&body, &"Person".into(), Some(v(V2001)))
            .unwrap();
        assert!(latest.get("full_name").is_none());
    }

    #[test]
    fn validator_seam_is_consulted() {
        let mut validator = MockPayloadValidator::new();
        validator
            .expect_validate()
            .withf(|payload, shape, _| shape.name() == "User" && payload.contains_key("address"))
            .times(1)
            .returning(|_, _, _| {
                let mut report = ValidationReport::new();
                report.push("address", "blocked by policy");
                report
            });
        let migrator = users(true).with_validator(Arc::new(validator));
        let body = payload(json!({"id": 83, "addresses": ["X"]}));
        let err = migrator
            .migrate_response(&body, &"User".into(), Some(v(V2000)))
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("blocked by policy"));
    }

    #[test]
    fn nested_fields_are_stripped() {
        let definition = ApiDefinition::builder()
            .shape(ShapeDefinition::new("Inner").with_field("a", FieldDefinition::new(TypeDescriptor::Integer)))
            .shape(ShapeDefinition::new("Outer").with_field(
                "items",
                FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::shape("Inner"))),
            ))
            .build()
            .unwrap();
        let shapes = ShapeTable::from_definition(&definition).unwrap();
        let mut body = payload(json!({"items": [{"a": 1, "b": 2}], "c": 3}));
        strip_unknown_fields(&mut body, shapes.shape(&"Outer".into()).unwrap(), &shapes);
        assert_eq!(body, payload(json!({"items": [{"a": 1}]})));
    }
}
