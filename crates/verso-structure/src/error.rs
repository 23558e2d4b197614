//! Errors raised while building the configuration model

use crate::types::{EnumId, ShapeId};

/// Invalid configuration object
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    /// A version change was given an empty description
    #[error("version change description must not be empty")]
    EmptyDescription,

    /// Malformed operation route
    #[error("invalid route '{route}': {reason}")]
    InvalidRoute {
        /// Offending route
        route: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two shapes share an id
    #[error("shape '{0}' is defined more than once")]
    DuplicateShape(ShapeId),

    /// Two enumerations share an id
    #[error("enum '{0}' is defined more than once")]
    DuplicateEnum(EnumId),

    /// A name is both a field and a computed property
    #[error("'{member}' is both a field and a property of shape '{shape}'")]
    MemberConflict {
        /// Shape
        shape: ShapeId,
        /// Clashing name
        member: String,
    },
}

/// Result alias for structure operations
pub type Result<T> = std::result::Result<T, StructureError>;
