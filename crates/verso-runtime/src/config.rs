//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use verso_structure::ApiVersion;

/// Default name of the version header
pub const DEFAULT_VERSION_HEADER: &str = "x-api-version";

/// Request-time behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Header carrying the requested version
    pub version_header: String,
    /// Version assumed when the header is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_version: Option<ApiVersion>,
    /// Drop response fields the target version does not declare
    pub strip_unknown_fields: bool,
    /// Validate request payloads at the version they were sent at
    ///
    /// Payloads produced by migration steps are always validated.
    pub validate_requests: bool,
}

impl RuntimeConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With version header name
    #[inline]
    #[must_use]
    pub fn with_version_header(mut self, name: impl Into<String>) -> Self {
        self.version_header = name.into();
        self
    }

    /// With default version
    #[inline]
    #[must_use]
    pub fn with_default_version(mut self, version: ApiVersion) -> Self {
        self.default_version = Some(version);
        self
    }

    /// With unknown-field stripping toggled
    #[inline]
    #[must_use]
    pub fn with_strip_unknown_fields(mut self, strip: bool) -> Self {
        self.strip_unknown_fields = strip;
        self
    }

    /// With request validation toggled
    #[inline]
    #[must_use]
    pub fn with_validate_requests(mut self, validate: bool) -> Self {
        self.validate_requests = validate;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed input
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] on I/O or parse failure
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&text)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            version_header: DEFAULT_VERSION_HEADER.to_string(),
            default_version: None,
            strip_unknown_fields: true,
            validate_requests: true,
        }
    }
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
