//! Synthesis properties over generated histories

use proptest::prelude::*;
use std::sync::Arc;
use verso_structure::instruction::shape;
use verso_structure::{
    ApiDefinition, ApiVersion, FieldDefinition, ShapeDefinition, TypeDescriptor, Version,
    VersionChange,
};
use verso_synthesis::{synthesize, VersionedSchema};

/// Fields `f0..fN` of one shape; each removed (going back) at some version or never
#[derive(Debug, Clone)]
struct History {
    versions: usize,
    removed_at: Vec<Option<usize>>,
}

fn history() -> impl Strategy<Value = History> {
    (2usize..6).prop_flat_map(|versions| {
        // the oldest version carries no changes
        prop::collection::vec(prop::option::of(0..versions - 1), 1..8)
            .prop_map(move |removed_at| History { versions, removed_at })
    })
}

fn key(index: usize) -> ApiVersion {
    let year = 2010 - i32::try_from(index).unwrap();
    ApiVersion::from_ymd(year, 1, 1).unwrap()
}

fn schema(history: &History) -> VersionedSchema {
    let mut record = ShapeDefinition::new("Record");
    for i in 0..history.removed_at.len() {
        record = record.with_field(format!("f{i}"), FieldDefinition::new(TypeDescriptor::Integer));
    }
    let definition = ApiDefinition::builder().shape(record).build().unwrap();

    let versions = (0..history.versions).map(|index| {
        let removed: Vec<_> = history
            .removed_at
            .iter()
            .enumerate()
            .filter(|(_, at)| **at == Some(index))
            .map(|(field, _)| shape("Record").field(format!("f{field}")).did_not_exist())
            .collect();
        let version = Version::new(key(index));
        if removed.is_empty() {
            version
        } else {
            let change = VersionChange::builder(format!("fields added in {}", key(index)))
                .instructions(removed)
                .build()
                .unwrap();
            version.with_change(change)
        }
    });
    VersionedSchema::new(definition, versions).unwrap()
}

proptest! {
    #[test]
    fn each_snapshot_reflects_only_newer_changes(history in history()) {
        let tables = synthesize(Arc::new(schema(&history))).unwrap();
        for index in 0..history.versions {
            let snapshot = tables.snapshot(key(index)).unwrap();
            let fields: Vec<String> = snapshot
                .shapes()
                .shape(&"Record".into())
                .unwrap()
                .fields()
                .keys()
                .cloned()
                .collect();
            let expected: Vec<String> = history
                .removed_at
                .iter()
                .enumerate()
                .filter(|(_, at)| at.map_or(true, |at| at >= index))
                .map(|(field, _)| format!("f{field}"))
                .collect();
            prop_assert_eq!(fields, expected, "at {}", key(index));
        }
    }

    #[test]
    fn synthesis_is_idempotent(history in history()) {
        let schema = Arc::new(schema(&history));
        let first = synthesize(Arc::clone(&schema)).unwrap();
        let second = synthesize(schema).unwrap();
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        for (a, b) in first.snapshots().zip(second.snapshots()) {
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }

    #[test]
    fn newer_snapshots_ignore_older_history(history in history()) {
        // dropping the oldest version leaves every remaining snapshot unchanged
        prop_assume!(history.versions > 2);
        let full = synthesize(Arc::new(schema(&history))).unwrap();

        let oldest = history.versions - 1;
        let truncated = History {
            versions: oldest,
            removed_at: history
                .removed_at
                .iter()
                .map(|at| at.filter(|at| *at < oldest - 1))
                .collect(),
        };
        let shorter = synthesize(Arc::new(schema(&truncated))).unwrap();

        for index in 0..oldest - 1 {
            prop_assert_eq!(
                full.snapshot(key(index)).unwrap().fingerprint(),
                shorter.snapshot(key(index)).unwrap().fingerprint()
            );
        }
    }
}
