//! Ordered version graph
//!
//! [`VersionGraph`] validates the version list and answers the ordering
//! questions the rest of the engine asks: which versions lie between two
//! keys, in which order their changes apply, and which published version a
//! requested date maps onto.

use crate::error::{Result, VersionGraphError};
use std::collections::HashMap;
use std::sync::Arc;
use verso_structure::{ApiVersion, ChangeId, Version, VersionChange};

/// Direction of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Newer to older (response direction)
    Backward,
    /// Older to newer (request direction)
    Forward,
}

/// One step between adjacent versions
#[derive(Debug, Clone)]
pub struct Hop {
    /// Version the payload is in before the hop
    pub from: ApiVersion,
    /// Version the payload is in after the hop
    pub to: ApiVersion,
    /// Changes crossed, in application order for this direction
    pub changes: Vec<Arc<VersionChange>>,
}

impl Hop {
    /// Direction of this hop
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.from > self.to {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

/// Validated, strictly descending list of versions
#[derive(Debug, Clone)]
pub struct VersionGraph {
    versions: Vec<Version>,
    owners: HashMap<ChangeId, ApiVersion>,
}

impl VersionGraph {
    /// Order and validate versions
    ///
    /// # Errors
    /// - [`VersionGraphError::Empty`] when `versions` is empty
    /// - [`VersionGraphError::DuplicateVersion`] when two keys are equal
    /// - [`VersionGraphError::ChangesOnOldestVersion`] when the oldest carries changes
    /// - [`VersionGraphError::DuplicateChange`] when a change is attached twice
    pub fn new(versions: impl IntoIterator<Item = Version>) -> Result<Self> {
        let mut versions: Vec<Version> = versions.into_iter().collect();
        if versions.is_empty() {
            return Err(VersionGraphError::Empty);
        }
        versions.sort_by(|a, b| b.key().cmp(&a.key()));

        for pair in versions.windows(2) {
            if pair[0].key() == pair[1].key() {
                return Err(VersionGraphError::DuplicateVersion(pair[0].key()));
            }
        }

        if let Some(oldest) = versions.last() {
            if !oldest.changes().is_empty() {
                return Err(VersionGraphError::ChangesOnOldestVersion {
                    version: oldest.key(),
                    count: oldest.changes().len(),
                });
            }
        }

        let mut owners: HashMap<ChangeId, ApiVersion> = HashMap::new();
        for version in &versions {
            for change in version.changes() {
                if let Some(first) = owners.insert(change.id(), version.key()) {
                    return Err(VersionGraphError::DuplicateChange {
                        description: change.description().to_string(),
                        first,
                        second: version.key(),
                    });
                }
            }
        }

        Ok(Self { versions, owners })
    }

    /// Newest version
    #[inline]
    #[must_use]
    pub fn latest(&self) -> ApiVersion {
        self.versions[0].key()
    }

    /// Oldest version
    #[inline]
    #[must_use]
    pub fn oldest(&self) -> ApiVersion {
        self.versions[self.versions.len() - 1].key()
    }

    /// Versions newest first
    #[inline]
    #[must_use]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Version keys newest first
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = ApiVersion> + '_ {
        self.versions.iter().map(Version::key)
    }

    /// Number of versions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Always false; a graph holds at least one version
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Whether `version` is published
    #[inline]
    #[must_use]
    pub fn contains(&self, version: ApiVersion) -> bool {
        self.position(version).is_some()
    }

    /// Look up a published version
    #[must_use]
    pub fn get(&self, version: ApiVersion) -> Option<&Version> {
        self.position(version).map(|i| &self.versions[i])
    }

    /// Version immediately older than `version`
    ///
    /// # Errors
    /// Returns [`VersionGraphError::UnknownVersion`] for unpublished keys
    pub fn predecessor(&self, version: ApiVersion) -> Result<Option<ApiVersion>> {
        let index = self.index_of(version)?;
        Ok(self.versions.get(index + 1).map(Version::key))
    }

    /// Version immediately newer than `version`
    ///
    /// # Errors
    /// Returns [`VersionGraphError::UnknownVersion`] for unpublished keys
    pub fn successor(&self, version: ApiVersion) -> Result<Option<ApiVersion>> {
        let index = self.index_of(version)?;
        Ok(index.checked_sub(1).map(|i| self.versions[i].key()))
    }

    /// Version a change is attached to
    #[inline]
    #[must_use]
    pub fn version_of(&self, change: ChangeId) -> Option<ApiVersion> {
        self.owners.get(&change).copied()
    }

    /// Steps between two published versions
    ///
    /// Backward (`from > to`): one hop per version V with `to < V <= from`,
    /// newest first, each carrying V's changes in declared order.
    /// Forward (`from < to`): one hop per version V with `from < V <= to`,
    /// oldest first, each carrying V's changes in reverse declared order.
    ///
    /// # Errors
    /// Returns [`VersionGraphError::UnknownVersion`] if either key is unpublished
    pub fn hops(&self, from: ApiVersion, to: ApiVersion) -> Result<Vec<Hop>> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;

        if from > to {
            // indices grow as versions get older
            Ok((from_index..to_index)
                .map(|i| Hop {
                    from: self.versions[i].key(),
                    to: self.versions[i + 1].key(),
                    changes: self.versions[i].changes().to_vec(),
                })
                .collect())
        } else {
            Ok((to_index..from_index)
                .rev()
                .map(|i| Hop {
                    from: self.versions[i + 1].key(),
                    to: self.versions[i].key(),
                    changes: self.versions[i].changes().iter().rev().cloned().collect(),
                })
                .collect())
        }
    }

    /// Changes crossed between two published versions, in application order
    ///
    /// # Errors
    /// Returns [`VersionGraphError::UnknownVersion`] if either key is unpublished
    pub fn changes_between(
        &self,
        from: ApiVersion,
        to: ApiVersion,
    ) -> Result<Vec<Arc<VersionChange>>> {
        Ok(self
            .hops(from, to)?
            .into_iter()
            .flat_map(|hop| hop.changes)
            .collect())
    }

    /// Map a requested date onto the newest published version not after it
    ///
    /// # Errors
    /// Returns [`VersionGraphError::UnknownVersion`] if `requested` predates
    /// the oldest version
    pub fn resolve(&self, requested: ApiVersion) -> Result<ApiVersion> {
        self.keys()
            .find(|key| *key <= requested)
            .ok_or(VersionGraphError::UnknownVersion(requested))
    }

    fn position(&self, version: ApiVersion) -> Option<usize> {
        self.versions
            .binary_search_by(|probe| version.cmp(&probe.key()))
            .ok()
    }

    fn index_of(&self, version: ApiVersion) -> Result<usize> {
        self.position(version)
            .ok_or(VersionGraphError::UnknownVersion(version))
    }
}
