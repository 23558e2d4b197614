//! Verso Runtime
//!
//! Request-time side of versioning: moving payloads between the latest
//! version and the version a client speaks, and knowing which version the
//! current request is served at.
//!
//! # Core Concepts
//!
//! - [`Migrator`]: Response migration backward, request migration forward
//! - [`PayloadValidator`] / [`ShapeValidator`]: Checks payloads against a version's shapes
//! - [`RequestContext`]: Task-local version of the request being served
//! - [`VersionHeader`]: Reads the requested version from headers
//! - [`SideEffectRegistry`]: Whether a side-effect change applies to a request
//! - [`VersionedApi`]: Dispatch facade combining all of the above
//! - [`RuntimeConfig`]: Header name, default version, stripping and validation switches
//!
//! # Example
//!
//! ```rust,ignore
//! let api = VersionedApi::from_schema(schema)?;
//! let version = api.version_from_headers(headers)?;
//! let response = api
//!     .dispatch(&RouteSelector::new("/users", ["POST"]), Some(version), request)
//!     .await?;
//! ```

#![warn(unreachable_pub)]

mod api;
pub mod config;
mod context;
mod error;
mod header;
pub mod migration;
mod side_effects;
pub mod validation;

pub use api::VersionedApi;
pub use config::{ConfigError, RuntimeConfig, DEFAULT_VERSION_HEADER};
pub use context::RequestContext;
pub use error::{
    DispatchError, HeaderError, MigrationError, Result, RuntimeError, SideEffectError,
};
pub use header::VersionHeader;
pub use migration::{strip_unknown_fields, Migrator};
pub use side_effects::SideEffectRegistry;
pub use validation::{PayloadValidator, ShapeValidator, ValidationIssue, ValidationReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
