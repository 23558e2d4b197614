//! Error types for synthesis
//!
//! Every synthesis failure is a configuration error: it is raised once, at
//! startup or regeneration, and names where in the configuration it arose.

use std::fmt::{self, Display, Formatter};
use verso_structure::{ApiVersion, EnumId, FingerprintError, RouteId, ShapeId, StructureError};
use verso_versions::VersionGraphError;

/// Position of an instruction in the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionContext {
    /// Version the change is attached to
    pub version: ApiVersion,
    /// Description of the change
    pub change: String,
    /// Zero-based index of the instruction within the change
    pub index: usize,
}

impl Display for InstructionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {}, change '{}', instruction #{}",
            self.version, self.change, self.index
        )
    }
}

/// Where a synthesis error was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// While applying an instruction
    Instruction(InstructionContext),
    /// While checking a finished version snapshot
    Snapshot(ApiVersion),
    /// In a field of the latest definition
    Field {
        /// Shape holding the field
        shape: ShapeId,
        /// Field name
        field: String,
    },
    /// In an operation of the latest definition
    Operation(RouteId),
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instruction(context) => context.fmt(f),
            Self::Snapshot(version) => write!(f, "version {version}"),
            Self::Field { shape, field } => write!(f, "field {shape}.{field}"),
            Self::Operation(route) => write!(f, "operation {route}"),
        }
    }
}

impl From<InstructionContext> for Origin {
    fn from(context: InstructionContext) -> Self {
        Self::Instruction(context)
    }
}

/// Errors while deriving per-version tables
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// A field or property with this name is already present
    #[error("{origin}: shape '{shape}' already has a member named '{field}'")]
    FieldConflict {
        /// Target shape
        shape: ShapeId,
        /// Clashing name
        field: String,
        /// Location
        origin: Origin,
    },

    /// The field is not present
    #[error("{origin}: shape '{shape}' has no field '{field}'")]
    UnknownField {
        /// Target shape
        shape: ShapeId,
        /// Missing field
        field: String,
        /// Location
        origin: Origin,
    },

    /// The computed property is not present
    #[error("{origin}: shape '{shape}' has no property '{property}'")]
    UnknownProperty {
        /// Target shape
        shape: ShapeId,
        /// Missing property
        property: String,
        /// Location
        origin: Origin,
    },

    /// Reference to a shape that does not exist
    #[error("{origin}: unknown shape '{shape}'")]
    UnknownShape {
        /// Missing shape
        shape: ShapeId,
        /// Location
        origin: Origin,
    },

    /// Reference to an enumeration that does not exist
    #[error("{origin}: unknown enum '{enumeration}'")]
    UnknownEnum {
        /// Missing enumeration
        enumeration: EnumId,
        /// Location
        origin: Origin,
    },

    /// The enumeration member is already present
    #[error("{origin}: enum '{enumeration}' already has member '{member}'")]
    EnumMemberConflict {
        /// Target enumeration
        enumeration: EnumId,
        /// Clashing member
        member: String,
        /// Location
        origin: Origin,
    },

    /// The enumeration member is not present
    #[error("{origin}: enum '{enumeration}' has no member '{member}'")]
    UnknownEnumMember {
        /// Target enumeration
        enumeration: EnumId,
        /// Missing member
        member: String,
        /// Location
        origin: Origin,
    },

    /// No operation matches the selector
    #[error("{origin}: no operation matches {route}")]
    UnknownOperation {
        /// Rendered selector
        route: String,
        /// Location
        origin: Origin,
    },

    /// More than one operation matches where one is required
    #[error("{origin}: {candidates} operations match {route}; add a function name to disambiguate")]
    AmbiguousOperation {
        /// Rendered selector or route
        route: String,
        /// Number of candidates
        candidates: usize,
        /// Location
        origin: Origin,
    },

    /// The operation is already in the requested state
    #[error("{origin}: operation {route} is already {state}")]
    OperationConflict {
        /// Rendered route
        route: String,
        /// "present" or "absent"
        state: &'static str,
        /// Location
        origin: Origin,
    },

    /// Invalid configuration object
    #[error("invalid configuration: {0}")]
    Structure(#[from] StructureError),

    /// Invalid version list
    #[error("invalid versions: {0}")]
    Graph(#[from] VersionGraphError),

    /// Tables could not be fingerprinted
    #[error("fingerprint failed: {0}")]
    Fingerprint(#[from] FingerprintError),
}

impl SynthesisError {
    /// Location of the error, when it has one
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::FieldConflict { origin, .. }
            | Self::UnknownField { origin, .. }
            | Self::UnknownProperty { origin, .. }
            | Self::UnknownShape { origin, .. }
            | Self::UnknownEnum { origin, .. }
            | Self::EnumMemberConflict { origin, .. }
            | Self::UnknownEnumMember { origin, .. }
            | Self::UnknownOperation { origin, .. }
            | Self::AmbiguousOperation { origin, .. }
            | Self::OperationConflict { origin, .. } => Some(origin),
            Self::Structure(_) | Self::Graph(_) | Self::Fingerprint(_) => None,
        }
    }
}

/// Result alias for synthesis
pub type Result<T> = std::result::Result<T, SynthesisError>;
