//! Verso Synthesis
//!
//! Derives, for every published version, the shapes, enumerations and
//! operations that version exposes.
//!
//! # Core Concepts
//!
//! - [`VersionedSchema`]: Latest definition plus validated version history
//! - [`ShapeTable`] / [`OperationTable`]: One version's view of the interface
//! - [`synthesize`]: Backward replay producing a [`VersionTables`]
//! - [`TablePublisher`]: Atomic publication and regeneration of tables
//! - [`ApiManifest`]: Declarative YAML / JSON / TOML configuration
//!
//! # Example
//!
//! ```rust,ignore
//! let schema = Arc::new(VersionedSchema::new(definition, versions)?);
//! let publisher = TablePublisher::new(schema)?;
//! let tables = publisher.current();
//! let old = tables.snapshot("2000-01-01".parse()?).unwrap();
//! println!("{}", old.shapes().resolve_name(&"User".into()).unwrap());
//! ```

#![warn(unreachable_pub)]

mod error;
pub mod manifest;
mod operations;
mod schema;
mod shapes;
mod tables;

pub use error::{InstructionContext, Origin, Result, SynthesisError};
pub use manifest::{ApiManifest, ManifestError, ManifestFormat};
pub use operations::OperationTable;
pub use schema::VersionedSchema;
pub use shapes::ShapeTable;
pub use tables::{synthesize, TablePublisher, VersionSnapshot, VersionTables};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
