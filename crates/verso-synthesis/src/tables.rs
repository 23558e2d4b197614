//! Published per-version tables
//!
//! [`synthesize`] replays the version history from the latest definition
//! backward and records a [`VersionSnapshot`] for every version.
//! [`TablePublisher`] owns the currently published [`VersionTables`] and
//! swaps in freshly synthesized ones atomically.

use crate::error::{InstructionContext, Result};
use crate::operations::OperationTable;
use crate::schema::VersionedSchema;
use crate::shapes::ShapeTable;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use verso_structure::{ApiVersion, Fingerprint, Instruction};
use verso_versions::VersionGraph;

/// Shapes and operations as one version sees them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSnapshot {
    version: ApiVersion,
    shapes: ShapeTable,
    operations: OperationTable,
    #[serde(skip)]
    fingerprint: Fingerprint,
}

impl VersionSnapshot {
    fn new(version: ApiVersion, shapes: ShapeTable, operations: OperationTable) -> Result<Self> {
        let fingerprint = Fingerprint::of(&(&shapes, &operations))?;
        Ok(Self {
            version,
            shapes,
            operations,
            fingerprint,
        })
    }

    /// Version key
    #[inline]
    #[must_use]
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Shapes and enumerations
    #[inline]
    #[must_use]
    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    /// Operations
    #[inline]
    #[must_use]
    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// Digest of the snapshot's contents
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

/// Every version's snapshot plus the schema they came from
#[derive(Debug, Clone)]
pub struct VersionTables {
    schema: Arc<VersionedSchema>,
    snapshots: BTreeMap<ApiVersion, VersionSnapshot>,
    fingerprint: Fingerprint,
}

impl VersionTables {
    /// Source schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<VersionedSchema> {
        &self.schema
    }

    /// Version history
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &VersionGraph {
        self.schema.graph()
    }

    /// Newest version
    #[inline]
    #[must_use]
    pub fn latest(&self) -> ApiVersion {
        self.graph().latest()
    }

    /// Snapshot of one version
    #[inline]
    #[must_use]
    pub fn snapshot(&self, version: ApiVersion) -> Option<&VersionSnapshot> {
        self.snapshots.get(&version)
    }

    /// Snapshot of the latest version
    #[must_use]
    pub fn latest_snapshot(&self) -> &VersionSnapshot {
        &self.snapshots[&self.latest()]
    }

    /// Snapshots newest first
    pub fn snapshots(&self) -> impl Iterator<Item = &VersionSnapshot> {
        self.snapshots.values().rev()
    }

    /// Digest over all snapshots, newest first
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl PartialEq for VersionTables {
    fn eq(&self, other: &Self) -> bool {
        self.snapshots == other.snapshots
    }
}

impl Serialize for VersionTables {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.snapshots())
    }
}

/// Derive every version's tables from a schema
///
/// Starting from the latest definition, the changes attached to each version
/// are applied in declared order to that version's snapshot to produce its
/// predecessor's snapshot.
///
/// # Errors
/// Returns the first [`crate::SynthesisError`] met; nothing is published on error
pub fn synthesize(schema: Arc<VersionedSchema>) -> Result<VersionTables> {
    let graph = schema.graph();
    let latest = graph.latest();

    let mut shapes = ShapeTable::from_definition(schema.definition())?;
    let mut operations = OperationTable::from_definition(schema.definition(), &shapes, latest)?;

    let mut snapshots = BTreeMap::new();
    let mut fingerprints = Vec::with_capacity(graph.len());

    let newest = VersionSnapshot::new(latest, shapes.clone(), operations.clone())?;
    fingerprints.push(newest.fingerprint());
    snapshots.insert(latest, newest);

    for pair in graph.versions().windows(2) {
        let (version, predecessor) = (&pair[0], pair[1].key());
        for change in version.changes() {
            for (index, instruction) in change.instructions().iter().enumerate() {
                let context = InstructionContext {
                    version: version.key(),
                    change: change.description().to_string(),
                    index,
                };
                match instruction {
                    Instruction::OperationExisted { .. }
                    | Instruction::OperationDidNotExist { .. }
                    | Instruction::OperationAttributesChanged { .. }
                    | Instruction::OperationHandlerReplaced { .. } => {
                        operations.apply(instruction, &context)?;
                    }
                    _ => shapes.apply(instruction, &context)?,
                }
            }
        }
        operations.check_ambiguity(predecessor)?;

        let snapshot = VersionSnapshot::new(predecessor, shapes.clone(), operations.clone())?;
        tracing::debug!(
            version = %predecessor,
            shapes = snapshot.shapes().shapes().len(),
            operations = snapshot.operations().present().count(),
            fingerprint = %snapshot.fingerprint().short(),
            "synthesized version snapshot"
        );
        fingerprints.push(snapshot.fingerprint());
        snapshots.insert(predecessor, snapshot);
    }

    let fingerprint = Fingerprint::combine(fingerprints.iter());
    Ok(VersionTables {
        schema,
        snapshots,
        fingerprint,
    })
}

/// Holder of the currently published tables
///
/// Readers clone the `Arc` and never block synthesis; regeneration builds a
/// fresh [`VersionTables`] and swaps it in only on success.
#[derive(Debug)]
pub struct TablePublisher {
    current: RwLock<Arc<VersionTables>>,
}

impl TablePublisher {
    /// Synthesize and publish the first tables
    ///
    /// # Errors
    /// Returns the synthesis error if the schema is invalid
    pub fn new(schema: Arc<VersionedSchema>) -> Result<Self> {
        let tables = Self::build(schema)?;
        Ok(Self {
            current: RwLock::new(tables),
        })
    }

    /// Currently published tables
    #[inline]
    #[must_use]
    pub fn current(&self) -> Arc<VersionTables> {
        Arc::clone(&self.current.read())
    }

    /// Re-synthesize from the current schema and publish
    ///
    /// # Errors
    /// Returns the synthesis error; the previous tables stay published
    pub fn regenerate(&self) -> Result<Arc<VersionTables>> {
        let schema = Arc::clone(self.current().schema());
        self.publish(schema)
    }

    /// Synthesize a new schema and publish it
    ///
    /// # Errors
    /// Returns the synthesis error; the previous tables stay published
    pub fn publish(&self, schema: Arc<VersionedSchema>) -> Result<Arc<VersionTables>> {
        let tables = Self::build(schema)?;
        *self.current.write() = Arc::clone(&tables);
        Ok(tables)
    }

    fn build(schema: Arc<VersionedSchema>) -> Result<Arc<VersionTables>> {
        match synthesize(schema) {
            Ok(tables) => {
                tracing::info!(
                    versions = tables.graph().len(),
                    latest = %tables.latest(),
                    fingerprint = %tables.fingerprint().short(),
                    "published version tables"
                );
                Ok(Arc::new(tables))
            }
            Err(e) => {
                tracing::warn!("synthesis failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use verso_structure::instruction::shape;
    use verso_structure::{
        ApiDefinition, FieldDefinition, ShapeDefinition, TypeDescriptor, Version, VersionChange,
    };

    fn v(s: &str) -> ApiVersion {
        s.parse().unwrap()
    }

    fn schema(extra: Option<Instruction>) -> Arc<VersionedSchema> {
        let definition = ApiDefinition::builder()
            .shape(
                ShapeDefinition::new("User")
                    .with_field("id", FieldDefinition::new(TypeDescriptor::Integer))
                    .with_field("email", FieldDefinition::new(TypeDescriptor::String)),
            )
            .build()
            .unwrap();
        let mut change = VersionChange::builder("email was added")
            .instruction(shape("User").field("email").did_not_exist());
        if let Some(instruction) = extra {
            change = change.instruction(instruction);
        }
        let versions = [
            Version::new(v("2001-01-01")).with_change(change.build().unwrap()),
            Version::new(v("2000-01-01")),
        ];
        Arc::new(VersionedSchema::new(definition, versions).unwrap())
    }

    #[test]
    fn snapshots_for_every_version() {
        let tables = synthesize(schema(None)).unwrap();
        let keys: Vec<_> = tables.snapshots().map(VersionSnapshot::version).collect();
        assert_eq!(keys, vec![v("2001-01-01"), v("2000-01-01")]);

        let old = tables.snapshot(v("2000-01-01")).unwrap();
        let user = old.shapes().shape(&"User".into()).unwrap();
        assert!(user.field("email").is_none());
        assert!(tables.latest_snapshot().shapes().shape(&"User".into()).unwrap().field("email").is_some());
    }

    #[test]
    fn synthesis_is_deterministic() {
        let s = schema(None);
        let a = synthesize(Arc::clone(&s)).unwrap();
        let b = synthesize(s).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn error_carries_instruction_context() {
        let err = synthesize(schema(Some(shape("User").field("ghost").did_not_exist()))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("version 2001-01-01"), "{message}");
        assert!(message.contains("change 'email was added'"), "{message}");
        assert!(message.contains("instruction #1"), "{message}");
    }

    #[test]
    fn failed_publish_keeps_previous_tables() {
        let publisher = TablePublisher::new(schema(None)).unwrap();
        let before = publisher.current();
        assert!(publisher
            .publish(schema(Some(shape("Ghost").had_name("Spectre"))))
            .is_err());
        assert!(Arc::ptr_eq(&before, &publisher.current()));

        let regenerated = publisher.regenerate().unwrap();
        assert!(!Arc::ptr_eq(&before, &regenerated));
        assert_eq!(*before, *regenerated);
    }

    #[test]
    fn serialized_tables_list_versions_newest_first() {
        let tables = synthesize(schema(None)).unwrap();
        let value = serde_json::to_value(&tables).unwrap();
        assert_eq!(value[0]["version"], json!("2001-01-01"));
        assert_eq!(value[1]["version"], json!("2000-01-01"));
    }
}
