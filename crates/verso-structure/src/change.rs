//! Version changes
//!
//! A [`VersionChange`] bundles the instructions describing one
//! backward-incompatible change together with the converters that move
//! payloads across it. Changes are immutable once built and shared as
//! `Arc<VersionChange>`; their [`ChangeId`] is the handle used by the
//! version graph and the side-effect registry.

use crate::converter::{ConverterError, RequestConverter, ResponseConverter};
use crate::error::StructureError;
use crate::instruction::Instruction;
use crate::payload::Payload;
use crate::types::ShapeId;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque handle of a version change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ChangeId(Uuid);

impl ChangeId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ChangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One backward-incompatible change
#[derive(Debug)]
pub struct VersionChange {
    id: ChangeId,
    description: String,
    instructions: Vec<Instruction>,
    response_converters: Vec<ResponseConverter>,
    request_converters: Vec<RequestConverter>,
    side_effects: bool,
}

impl VersionChange {
    /// Start building a change
    #[inline]
    #[must_use]
    pub fn builder(description: impl Into<String>) -> VersionChangeBuilder {
        VersionChangeBuilder::new(description)
    }

    /// Handle
    #[inline]
    #[must_use]
    pub fn id(&self) -> ChangeId {
        self.id
    }

    /// Human description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Instructions in declaration order
    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Response converters in registration order
    #[inline]
    #[must_use]
    pub fn response_converters(&self) -> &[ResponseConverter] {
        &self.response_converters
    }

    /// Request converters in registration order
    #[inline]
    #[must_use]
    pub fn request_converters(&self) -> &[RequestConverter] {
        &self.request_converters
    }

    /// Response converters bound to `shape`
    pub fn response_converters_for<'a>(
        &'a self,
        shape: &'a ShapeId,
    ) -> impl Iterator<Item = &'a ResponseConverter> + 'a {
        self.response_converters.iter().filter(move |c| c.applies_to(shape))
    }

    /// Request converters bound to `shape`
    pub fn request_converters_for<'a>(
        &'a self,
        shape: &'a ShapeId,
    ) -> impl Iterator<Item = &'a RequestConverter> + 'a {
        self.request_converters.iter().filter(move |c| c.applies_to(shape))
    }

    /// Whether any instruction changes the fields of `shape`
    #[must_use]
    pub fn alters_fields_of(&self, shape: &ShapeId) -> bool {
        self.instructions.iter().any(|i| i.alters_fields_of(shape))
    }

    /// Marked as a behavior-only change
    #[inline]
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        self.side_effects
    }

    /// Marked side-effect and carrying no instructions
    #[inline]
    #[must_use]
    pub fn is_side_effect_only(&self) -> bool {
        self.side_effects && self.instructions.is_empty()
    }
}

impl Display for VersionChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Builder for [`VersionChange`]
#[derive(Debug)]
pub struct VersionChangeBuilder {
    description: String,
    instructions: Vec<Instruction>,
    response_converters: Vec<ResponseConverter>,
    request_converters: Vec<RequestConverter>,
    side_effects: bool,
}

impl VersionChangeBuilder {
    /// New builder with a description
    #[inline]
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            instructions: Vec::new(),
            response_converters: Vec::new(),
            request_converters: Vec::new(),
            side_effects: false,
        }
    }

    /// Append an instruction
    #[inline]
    #[must_use]
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Append several instructions in order
    #[inline]
    #[must_use]
    pub fn instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Register a response converter for one or more shapes
    #[must_use]
    pub fn convert_response<I, S, F>(mut self, shapes: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ShapeId>,
        F: Fn(&mut Payload, &ShapeId) -> Result<(), ConverterError> + Send + Sync + 'static,
    {
        self.response_converters.push(ResponseConverter::new(shapes, func));
        self
    }

    /// Register a request converter for one shape
    #[must_use]
    pub fn convert_request<F>(mut self, shape: impl Into<ShapeId>, func: F) -> Self
    where
        F: Fn(Payload) -> Result<Payload, ConverterError> + Send + Sync + 'static,
    {
        self.request_converters.push(RequestConverter::new(shape, func));
        self
    }

    /// Mark as a behavior-only change
    #[inline]
    #[must_use]
    pub fn side_effects(mut self) -> Self {
        self.side_effects = true;
        self
    }

    /// Build the shared change
    ///
    /// # Errors
    /// Returns [`StructureError::EmptyDescription`] for a blank description
    pub fn build(self) -> Result<Arc<VersionChange>, StructureError> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(StructureError::EmptyDescription);
        }
        Ok(Arc::new(VersionChange {
            id: ChangeId::generate(),
            description: description.to_string(),
            instructions: self.instructions,
            response_converters: self.response_converters,
            request_converters: self.request_converters,
            side_effects: self.side_effects,
        }))
    }
}
