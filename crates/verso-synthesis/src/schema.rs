//! Input of synthesis: the latest definition plus its version history

use crate::error::Result;
use verso_structure::{ApiDefinition, Version};
use verso_versions::VersionGraph;

/// Latest definition together with its ordered versions
#[derive(Debug, Clone)]
pub struct VersionedSchema {
    definition: ApiDefinition,
    graph: VersionGraph,
}

impl VersionedSchema {
    /// Validate the version list and pair it with the definition
    ///
    /// # Errors
    /// Returns [`crate::SynthesisError::Graph`] for an invalid version list
    pub fn new(definition: ApiDefinition, versions: impl IntoIterator<Item = Version>) -> Result<Self> {
        Ok(Self {
            definition,
            graph: VersionGraph::new(versions)?,
        })
    }

    /// Latest definition
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &ApiDefinition {
        &self.definition
    }

    /// Version history
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &VersionGraph {
        &self.graph
    }
}
