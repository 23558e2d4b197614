//! Version graph errors

use verso_structure::ApiVersion;

/// Invalid version list or version lookup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionGraphError {
    /// No versions were given
    #[error("at least one version is required")]
    Empty,

    /// Two versions share a key
    #[error("version {0} is declared more than once")]
    DuplicateVersion(ApiVersion),

    /// The oldest version has nothing to migrate to
    #[error("oldest version {version} must not carry changes ({count} attached)")]
    ChangesOnOldestVersion {
        /// Oldest version
        version: ApiVersion,
        /// Number of attached changes
        count: usize,
    },

    /// The same change is attached twice
    #[error("change '{description}' is attached to both {first} and {second}")]
    DuplicateChange {
        /// Change description
        description: String,
        /// First version carrying it
        first: ApiVersion,
        /// Second version carrying it
        second: ApiVersion,
    },

    /// Version not in the graph
    #[error("unknown version {0}")]
    UnknownVersion(ApiVersion),
}

impl VersionGraphError {
    /// Whether this is a lookup failure rather than a configuration mistake
    #[inline]
    #[must_use]
    pub fn is_lookup_error(&self) -> bool {
        matches!(self, Self::UnknownVersion(_))
    }
}

/// Result alias for graph operations
pub type Result<T> = std::result::Result<T, VersionGraphError>;
