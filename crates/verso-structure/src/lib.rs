//! Verso Structure
//!
//! Typed configuration model for versioned interfaces: what the latest
//! version looks like and how each earlier version differs from it.
//!
//! # Core Concepts
//!
//! - [`ApiVersion`]: Date-keyed ordering of published versions
//! - [`VersionChange`]: Instructions plus converters for one incompatible change
//! - [`Instruction`]: Closed set of declarative schema and operation edits
//! - [`ShapeDefinition`] / [`EnumDefinition`]: Data shapes as one version sees them
//! - [`OperationDefinition`]: Exposed operations and their handlers
//! - [`Payload`]: Ordered, dynamically typed object moved between versions
//! - [`Fingerprint`]: Blake3 digest of synthesized tables
//!
//! # Example
//!
//! ```
//! use verso_structure::instruction::shape;
//! use verso_structure::{FieldDefinition, PayloadExt, TypeDescriptor, Version, VersionChange};
//! use serde_json::json;
//!
//! let change = VersionChange::builder("Company vat id became a list")
//!     .instruction(shape("Company").field("vat_id").existed(FieldDefinition::new(TypeDescriptor::String)))
//!     .instruction(shape("Company").field("vat_ids").did_not_exist())
//!     .convert_response(["Company"], |payload, _| {
//!         let ids = payload.take_field("vat_ids")?;
//!         payload.insert("vat_id".to_string(), ids[0].clone());
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let version = Version::new("2002-01-01".parse()?).with_change(change);
//! assert_eq!(version.changes().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(unreachable_pub)]

pub mod change;
pub mod converter;
pub mod definition;
pub mod error;
pub mod fingerprint;
pub mod instruction;
pub mod operation;
pub mod payload;
pub mod shape;
pub mod types;
pub mod version;

pub use change::{ChangeId, VersionChange, VersionChangeBuilder};
pub use converter::{ConverterError, RequestConverter, ResponseConverter};
pub use definition::{ApiDefinition, ApiDefinitionBuilder};
pub use error::{Result, StructureError};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use instruction::Instruction;
pub use operation::{
    handler_fn, AttributeChanges, HandlerError, OperationAttributes, OperationDefinition,
    OperationHandler, RouteId, RouteSelector, UnimplementedHandler,
};
pub use payload::{payload_from, Payload, PayloadExt};
pub use shape::{
    ComputedProperty, EnumDefinition, FieldAttributes, FieldChanges, FieldDefinition,
    ShapeDefinition,
};
pub use types::{EnumId, ShapeId, TypeDescriptor, TypeParseError};
pub use version::{ApiVersion, Version, VersionParseError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
