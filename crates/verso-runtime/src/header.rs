//! Version header resolution

use crate::config::{RuntimeConfig, DEFAULT_VERSION_HEADER};
use crate::error::HeaderError;
use verso_structure::ApiVersion;

/// Reads the requested version from request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHeader {
    name: String,
    default: Option<ApiVersion>,
}

impl VersionHeader {
    /// Header `name` with no default
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// Version used when the header is absent
    #[must_use]
    pub fn with_default(mut self, version: ApiVersion) -> Self {
        self.default = Some(version);
        self
    }

    /// Header settings from runtime configuration
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            name: config.version_header.clone(),
            default: config.default_version,
        }
    }

    /// Header name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fallback version
    #[inline]
    #[must_use]
    pub fn default_version(&self) -> Option<ApiVersion> {
        self.default
    }

    /// Resolve the version from `(name, value)` header pairs
    ///
    /// Names compare case-insensitively; the first match wins and its value
    /// is trimmed before parsing.
    ///
    /// # Errors
    /// - [`HeaderError::Missing`] if absent and no default is set
    /// - [`HeaderError::Invalid`] if the value is not a `YYYY-MM-DD` date
    pub fn resolve<'a, I>(&self, headers: I) -> Result<ApiVersion, HeaderError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let value = headers
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.name))
            .map(|(_, value)| value.trim());

        match value {
            Some(value) => value.parse().map_err(|_| HeaderError::Invalid {
                header: self.name.clone(),
                value: value.to_string(),
            }),
            None => self
                .default
                .ok_or_else(|| HeaderError::Missing(self.name.clone())),
        }
    }
}

impl Default for VersionHeader {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_HEADER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ApiVersion {
        s.parse().unwrap()
    }

    #[test]
    fn present_header_case_insensitive() {
        let header = VersionHeader::new("X-API-VERSION");
        let resolved = header
            .resolve([("content-type", "application/json"), ("x-api-version", " 2000-01-01 ")])
            .unwrap();
        assert_eq!(resolved, v("2000-01-01"));
    }

    #[test]
    fn missing_header_uses_default() {
        let header = VersionHeader::default().with_default(v("2001-01-01"));
        assert_eq!(header.resolve(std::iter::empty()).unwrap(), v("2001-01-01"));
    }

    #[test]
    fn missing_header_without_default() {
        let err = VersionHeader::default().resolve([("accept", "*/*")]).unwrap_err();
        assert_eq!(err, HeaderError::Missing("x-api-version".to_string()));
    }

    #[test]
    fn invalid_value() {
        let header = VersionHeader::default().with_default(v("2001-01-01"));
        let err = header.resolve([("X-Api-Version", "yesterday")]).unwrap_err();
        assert!(matches!(err, HeaderError::Invalid { value, .. } if value == "yesterday"));
    }

    #[test]
    fn from_config() {
        let config = RuntimeConfig::new()
            .with_version_header("api-version")
            .with_default_version(v("2000-01-01"));
        let header = VersionHeader::from_config(&config);
        assert_eq!(header.name(), "api-version");
        assert_eq!(header.default_version(), Some(v("2000-01-01")));
    }
}
