//! Operation synthesis
//!
//! An [`OperationTable`] lists every operation known to the interface with
//! its per-version state: exposed or not, attributes and handler.

use crate::error::{InstructionContext, Origin, Result, SynthesisError};
use crate::shapes::ShapeTable;
use serde::Serialize;
use std::collections::HashMap;
use verso_structure::{
    ApiDefinition, ApiVersion, Instruction, OperationDefinition, RouteId, RouteSelector,
};

/// Operations of one version
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OperationTable {
    operations: Vec<OperationDefinition>,
}

impl OperationTable {
    /// Table of the latest version
    ///
    /// # Errors
    /// - [`SynthesisError::UnknownShape`] when a request or response shape is undefined
    /// - [`SynthesisError::AmbiguousOperation`] when two exposed operations share a route
    pub fn from_definition(
        definition: &ApiDefinition,
        shapes: &ShapeTable,
        latest: ApiVersion,
    ) -> Result<Self> {
        for operation in definition.operations() {
            for shape in operation.request_shape().into_iter().chain(operation.response_shape()) {
                if shapes.shape(shape).is_none() {
                    return Err(SynthesisError::UnknownShape {
                        shape: shape.clone(),
                        origin: Origin::Operation(operation.route().clone()),
                    });
                }
            }
        }
        let table = Self {
            operations: definition.operations().to_vec(),
        };
        table.check_ambiguity(latest)?;
        Ok(table)
    }

    /// All operations, exposed or not
    #[inline]
    #[must_use]
    pub fn all(&self) -> &[OperationDefinition] {
        &self.operations
    }

    /// Operations exposed in this version
    pub fn present(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.operations.iter().filter(|op| op.exists())
    }

    /// Exposed operations matching a selector
    #[must_use]
    pub fn matching(&self, selector: &RouteSelector) -> Vec<&OperationDefinition> {
        self.present().filter(|op| selector.matches(op.route())).collect()
    }

    /// Look up an operation by exact identity, exposed or not
    #[must_use]
    pub fn get(&self, route: &RouteId) -> Option<&OperationDefinition> {
        self.operations.iter().find(|op| op.route() == route)
    }

    /// Fail if two exposed operations share a route identity
    ///
    /// # Errors
    /// Returns [`SynthesisError::AmbiguousOperation`] naming the first clash
    pub fn check_ambiguity(&self, version: ApiVersion) -> Result<()> {
        let mut seen: HashMap<&RouteId, usize> = HashMap::new();
        for operation in self.present() {
            *seen.entry(operation.route()).or_default() += 1;
        }
        if let Some((route, count)) = self
            .present()
            .map(|op| (op.route(), seen[op.route()]))
            .find(|(_, count)| *count > 1)
        {
            return Err(SynthesisError::AmbiguousOperation {
                route: route.to_string(),
                candidates: count,
                origin: Origin::Snapshot(version),
            });
        }
        Ok(())
    }

    /// Apply one operation instruction
    ///
    /// Shape and enumeration instructions are ignored.
    ///
    /// # Errors
    /// Returns the lookup, ambiguity or conflict error the instruction triggers
    pub fn apply(&mut self, instruction: &Instruction, context: &InstructionContext) -> Result<()> {
        match instruction {
            Instruction::OperationExisted { route } => self.toggle(route, true, context),
            Instruction::OperationDidNotExist { route } => self.toggle(route, false, context),
            Instruction::OperationAttributesChanged { route, changes } => {
                let index = self.single_match(route, context)?;
                changes.apply_to(self.operations[index].attributes_mut());
                Ok(())
            }
            Instruction::OperationHandlerReplaced { route, handler } => {
                let index = self.single_match(route, context)?;
                self.operations[index].replace_handler(handler.clone());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, selector: &RouteSelector, context: &InstructionContext) -> Result<Vec<usize>> {
        let found: Vec<usize> = self
            .operations
            .iter()
            .enumerate()
            .filter(|(_, op)| selector.matches(op.route()))
            .map(|(i, _)| i)
            .collect();
        if found.is_empty() {
            return Err(SynthesisError::UnknownOperation {
                route: selector.to_string(),
                origin: context.clone().into(),
            });
        }
        Ok(found)
    }

    fn single_match(&self, selector: &RouteSelector, context: &InstructionContext) -> Result<usize> {
        match self.matches(selector, context)?.as_slice() {
            [index] => Ok(*index),
            many => Err(SynthesisError::AmbiguousOperation {
                route: selector.to_string(),
                candidates: many.len(),
                origin: context.clone().into(),
            }),
        }
    }

    /// Flip exactly one candidate currently in the opposite state
    fn toggle(
        &mut self,
        selector: &RouteSelector,
        exists: bool,
        context: &InstructionContext,
    ) -> Result<()> {
        let candidates: Vec<usize> = self
            .matches(selector, context)?
            .into_iter()
            .filter(|i| self.operations[*i].exists() != exists)
            .collect();
        match candidates.as_slice() {
            [index] => {
                self.operations[*index].set_exists(exists);
                Ok(())
            }
            [] => Err(SynthesisError::OperationConflict {
                route: selector.to_string(),
                state: if exists { "present" } else { "absent" },
                origin: context.clone().into(),
            }),
            many => Err(SynthesisError::AmbiguousOperation {
                route: selector.to_string(),
                candidates: many.len(),
                origin: context.clone().into(),
            }),
        }
    }
}
