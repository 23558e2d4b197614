//! Error types for request-time processing
//!
//! - [`MigrationError`]: payload conversion between versions
//! - [`HeaderError`]: version header resolution
//! - [`SideEffectError`]: side-effect activity queries
//! - [`DispatchError`]: versioned operation calls
//! - [`RuntimeError`]: umbrella for callers that do not care which

use crate::config::ConfigError;
use crate::validation::ValidationReport;
use verso_structure::{ApiVersion, ConverterError, HandlerError, RouteSelector, ShapeId};
use verso_synthesis::SynthesisError;

/// Errors while migrating a payload between versions
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Migrated response does not fit the target version's shape
    #[error("response of shape '{shape}' is invalid at version {version}: {report}")]
    ResponseValidation {
        shape: ShapeId,
        version: ApiVersion,
        report: ValidationReport,
    },

    /// Request does not fit a version's shape
    #[error("request of shape '{shape}' is invalid at version {version}: {report}")]
    RequestValidation {
        shape: ShapeId,
        version: ApiVersion,
        report: ValidationReport,
    },

    /// A change alters the shape's fields but gives no request converter
    #[error("no request converter for shape '{shape}' between {from} and {to}")]
    NoRequestConverter {
        shape: ShapeId,
        from: ApiVersion,
        to: ApiVersion,
    },

    /// A converter function failed
    #[error("converter of change '{change}' failed on shape '{shape}': {source}")]
    Converter {
        change: String,
        shape: ShapeId,
        #[source]
        source: ConverterError,
    },

    /// Version is not published
    #[error("unknown version: {0}")]
    UnknownVersion(ApiVersion),

    /// Shape does not exist at the version
    #[error("shape '{shape}' does not exist at version {version}")]
    UnknownShape { shape: ShapeId, version: ApiVersion },
}

impl MigrationError {
    /// Whether the payload itself was at fault
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::ResponseValidation { .. } | Self::RequestValidation { .. }
        )
    }
}

/// Errors resolving the requested version from headers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// Header absent and no default configured
    #[error("missing version header '{0}'")]
    Missing(String),

    /// Header value is not a `YYYY-MM-DD` date
    #[error("invalid value for version header '{header}': '{value}'")]
    Invalid { header: String, value: String },
}

/// Errors querying side-effect changes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SideEffectError {
    /// Change carries instructions or converters besides its side effects
    #[error("change '{0}' is not marked as side-effect only")]
    NotASideEffectChange(String),

    /// Change is not attached to any version
    #[error("change '{0}' is not attached to any published version")]
    UnregisteredChange(String),
}

/// Errors dispatching a versioned call
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No present operation matches at the requested version
    #[error("no operation {route} at version {version}")]
    OperationNotFound {
        route: RouteSelector,
        version: ApiVersion,
    },

    /// Several present operations match; narrow by function name
    #[error("route {route} matches {count} operations at version {version}")]
    AmbiguousRoute {
        route: RouteSelector,
        version: ApiVersion,
        count: usize,
    },

    /// Handler failed
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Payload migration failed
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Any runtime failure
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    SideEffect(#[from] SideEffectError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Mistakes in the declared versions or configuration
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Synthesis(_)
                | Self::SideEffect(_)
                | Self::Config(_)
                | Self::Migration(MigrationError::NoRequestConverter { .. })
                | Self::Dispatch(DispatchError::Migration(
                    MigrationError::NoRequestConverter { .. }
                ))
        )
    }

    /// Failures a client caused and can fix
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Header(_) => true,
            Self::Migration(e) | Self::Dispatch(DispatchError::Migration(e)) => matches!(
                e,
                MigrationError::RequestValidation { .. } | MigrationError::UnknownVersion(_)
            ),
            Self::Dispatch(DispatchError::OperationNotFound { .. }) => true,
            Self::Dispatch(DispatchError::Handler(HandlerError::Rejected { status, .. })) => {
                *status < 500
            }
            _ => false,
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
