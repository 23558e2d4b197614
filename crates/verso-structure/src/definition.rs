//! The latest interface definition
//!
//! [`ApiDefinition`] holds what the service exposes today: its shapes,
//! enumerations and operations. Older versions are derived from it.

use crate::error::StructureError;
use crate::operation::OperationDefinition;
use crate::shape::{EnumDefinition, ShapeDefinition};
use crate::types::{EnumId, ShapeId};
use indexmap::IndexMap;
use serde::Serialize;

/// Shapes, enumerations and operations of the latest version
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiDefinition {
    shapes: IndexMap<ShapeId, ShapeDefinition>,
    enums: IndexMap<EnumId, EnumDefinition>,
    operations: Vec<OperationDefinition>,
}

impl ApiDefinition {
    /// Start building a definition
    #[inline]
    #[must_use]
    pub fn builder() -> ApiDefinitionBuilder {
        ApiDefinitionBuilder::default()
    }

    /// Shapes keyed by id
    #[inline]
    #[must_use]
    pub fn shapes(&self) -> &IndexMap<ShapeId, ShapeDefinition> {
        &self.shapes
    }

    /// Enumerations keyed by id
    #[inline]
    #[must_use]
    pub fn enums(&self) -> &IndexMap<EnumId, EnumDefinition> {
        &self.enums
    }

    /// Operations in registration order
    #[inline]
    #[must_use]
    pub fn operations(&self) -> &[OperationDefinition] {
        &self.operations
    }

    /// Look up a shape
    #[inline]
    #[must_use]
    pub fn shape(&self, id: &ShapeId) -> Option<&ShapeDefinition> {
        self.shapes.get(id)
    }
}

/// Builder for [`ApiDefinition`]
#[derive(Debug, Default)]
pub struct ApiDefinitionBuilder {
    shapes: Vec<ShapeDefinition>,
    enums: Vec<EnumDefinition>,
    operations: Vec<OperationDefinition>,
}

impl ApiDefinitionBuilder {
    /// Add a shape
    #[inline]
    #[must_use]
    pub fn shape(mut self, shape: ShapeDefinition) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Add an enumeration
    #[inline]
    #[must_use]
    pub fn enumeration(mut self, definition: EnumDefinition) -> Self {
        self.enums.push(definition);
        self
    }

    /// Add an operation
    #[inline]
    #[must_use]
    pub fn operation(mut self, operation: OperationDefinition) -> Self {
        self.operations.push(operation);
        self
    }

    /// Validate and build
    ///
    /// # Errors
    /// - [`StructureError::DuplicateShape`] / [`StructureError::DuplicateEnum`]
    ///   when ids repeat
    /// - [`StructureError::MemberConflict`] when a name is both a field and a
    ///   property
    pub fn build(self) -> Result<ApiDefinition, StructureError> {
        let mut shapes = IndexMap::with_capacity(self.shapes.len());
        for shape in self.shapes {
            if let Some(member) = shape.overlapping_members().first() {
                return Err(StructureError::MemberConflict {
                    shape: shape.id().clone(),
                    member: (*member).to_string(),
                });
            }
            let id = shape.id().clone();
            if shapes.insert(id.clone(), shape).is_some() {
                return Err(StructureError::DuplicateShape(id));
            }
        }

        let mut enums = IndexMap::with_capacity(self.enums.len());
        for definition in self.enums {
            let id = definition.id().clone();
            if enums.insert(id.clone(), definition).is_some() {
                return Err(StructureError::DuplicateEnum(id));
            }
        }

        Ok(ApiDefinition {
            shapes,
            enums,
            operations: self.operations,
        })
    }
}
