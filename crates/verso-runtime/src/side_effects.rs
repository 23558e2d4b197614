//! Side-effect flags
//!
//! A side-effect change carries no instructions and no converters; it marks
//! behavior that business logic switches on from its version onward. Handlers
//! ask [`SideEffectRegistry::is_applied`] whether the request's version has
//! reached that change.

use crate::context::RequestContext;
use crate::error::SideEffectError;
use std::sync::Arc;
use verso_structure::{ApiVersion, VersionChange};
use verso_synthesis::VersionTables;

/// Answers side-effect activity questions against published versions
#[derive(Debug, Clone)]
pub struct SideEffectRegistry {
    tables: Arc<VersionTables>,
}

impl SideEffectRegistry {
    /// Registry over `tables`
    #[must_use]
    pub fn new(tables: Arc<VersionTables>) -> Self {
        Self { tables }
    }

    /// Whether `change` is in effect at `current` (`None` = latest)
    ///
    /// True iff `current` is `None` or not earlier than the version the change
    /// is attached to. Dates between published versions compare as dates.
    ///
    /// # Errors
    /// - [`SideEffectError::NotASideEffectChange`] if the change is not side-effect only
    /// - [`SideEffectError::UnregisteredChange`] if no version carries the change
    pub fn is_applied(
        &self,
        change: &VersionChange,
        current: Option<ApiVersion>,
    ) -> Result<bool, SideEffectError> {
        if !change.is_side_effect_only() {
            return Err(SideEffectError::NotASideEffectChange(
                change.description().to_string(),
            ));
        }
        let introduced = self
            .tables
            .graph()
            .version_of(change.id())
            .ok_or_else(|| SideEffectError::UnregisteredChange(change.description().to_string()))?;

        Ok(current.map_or(true, |current| current >= introduced))
    }

    /// [`Self::is_applied`] at an explicit context
    ///
    /// # Errors
    /// Same as [`Self::is_applied`]
    pub fn is_applied_for(
        &self,
        change: &VersionChange,
        context: &RequestContext,
    ) -> Result<bool, SideEffectError> {
        self.is_applied(change, context.version())
    }

    /// [`Self::is_applied`] at the enclosing task's version
    ///
    /// # Errors
    /// Same as [`Self::is_applied`]
    pub fn is_applied_in_context(&self, change: &VersionChange) -> Result<bool, SideEffectError> {
        self.is_applied(change, RequestContext::current())
    }
}
