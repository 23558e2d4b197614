//! API version keys
//!
//! Provides [`ApiVersion`], the ordering key of the interface history, and
//! [`Version`], a key together with the changes introduced at it.

use crate::change::VersionChange;
use chrono::NaiveDate;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Ordering key of a published interface version
///
/// A calendar date, displayed and parsed as `YYYY-MM-DD`.
/// Later dates are newer versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(NaiveDate);

impl ApiVersion {
    /// Create from a calendar date
    #[inline]
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Create from year, month and day
    ///
    /// Returns `None` for an invalid calendar date.
    #[inline]
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Underlying date
    #[inline]
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for ApiVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| VersionParseError(s.to_string()))
    }
}

impl From<NaiveDate> for ApiVersion {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl serde::Serialize for ApiVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ApiVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A version key that is not a `YYYY-MM-DD` date
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{0}': expected a YYYY-MM-DD date")]
pub struct VersionParseError(pub String);

/// A published version and the changes introduced at it
///
/// Changes attached to a version describe how to go from that version to
/// the one immediately preceding it.
#[derive(Debug, Clone)]
pub struct Version {
    key: ApiVersion,
    changes: Vec<Arc<VersionChange>>,
}

impl Version {
    /// Create a version without changes
    #[inline]
    #[must_use]
    pub fn new(key: ApiVersion) -> Self {
        Self {
            key,
            changes: Vec::new(),
        }
    }

    /// Attach a change (declaration order is preserved)
    #[inline]
    #[must_use]
    pub fn with_change(mut self, change: Arc<VersionChange>) -> Self {
        self.changes.push(change);
        self
    }

    /// Attach several changes in order
    #[inline]
    #[must_use]
    pub fn with_changes(mut self, changes: impl IntoIterator<Item = Arc<VersionChange>>) -> Self {
        self.changes.extend(changes);
        self
    }

    /// Version key
    #[inline]
    #[must_use]
    pub fn key(&self) -> ApiVersion {
        self.key
    }

    /// Changes introduced at this version, in declaration order
    #[inline]
    #[must_use]
    pub fn changes(&self) -> &[Arc<VersionChange>] {
        &self.changes
    }
}
