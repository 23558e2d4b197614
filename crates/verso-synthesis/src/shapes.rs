//! Shape synthesis
//!
//! A [`ShapeTable`] is every shape and enumeration as one version sees them.
//! Applying a change's instructions to version V's table yields the table of
//! V's predecessor.

use crate::error::{InstructionContext, Origin, Result, SynthesisError};
use indexmap::IndexMap;
use serde::Serialize;
use verso_structure::{
    ApiDefinition, EnumDefinition, EnumId, FieldDefinition, Instruction, ShapeDefinition, ShapeId,
    TypeDescriptor,
};

/// Shapes and enumerations of one version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeTable {
    shapes: IndexMap<ShapeId, ShapeDefinition>,
    enums: IndexMap<EnumId, EnumDefinition>,
}

impl ShapeTable {
    /// Table of the latest version
    ///
    /// # Errors
    /// Returns [`SynthesisError::UnknownShape`] / [`SynthesisError::UnknownEnum`]
    /// when a field type references something undefined
    pub fn from_definition(definition: &ApiDefinition) -> Result<Self> {
        let table = Self {
            shapes: definition.shapes().clone(),
            enums: definition.enums().clone(),
        };
        for shape in table.shapes.values() {
            for (name, field) in shape.fields() {
                table.check_references(&field.ty, || Origin::Field {
                    shape: shape.id().clone(),
                    field: name.clone(),
                })?;
            }
        }
        Ok(table)
    }

    /// Shapes keyed by stable id
    #[inline]
    #[must_use]
    pub fn shapes(&self) -> &IndexMap<ShapeId, ShapeDefinition> {
        &self.shapes
    }

    /// Enumerations keyed by stable id
    #[inline]
    #[must_use]
    pub fn enums(&self) -> &IndexMap<EnumId, EnumDefinition> {
        &self.enums
    }

    /// Look up a shape
    #[inline]
    #[must_use]
    pub fn shape(&self, id: &ShapeId) -> Option<&ShapeDefinition> {
        self.shapes.get(id)
    }

    /// Look up an enumeration
    #[inline]
    #[must_use]
    pub fn enumeration(&self, id: &EnumId) -> Option<&EnumDefinition> {
        self.enums.get(id)
    }

    /// Name this version gives a shape
    #[inline]
    #[must_use]
    pub fn resolve_name(&self, id: &ShapeId) -> Option<&str> {
        self.shapes.get(id).map(ShapeDefinition::name)
    }

    /// Render a type descriptor with this version's names
    #[must_use]
    pub fn render_type(&self, ty: &TypeDescriptor) -> String {
        ty.render_with(
            &|id: &ShapeId| self.resolve_name(id).map(str::to_string),
            &|id: &EnumId| self.enums.get(id).map(|e| e.name().to_string()),
        )
    }

    /// Apply one shape or enumeration instruction
    ///
    /// Operation instructions are ignored.
    ///
    /// # Errors
    /// Returns the conflict or lookup error the instruction triggers
    pub fn apply(&mut self, instruction: &Instruction, context: &InstructionContext) -> Result<()> {
        let origin = || Origin::Instruction(context.clone());
        match instruction {
            Instruction::FieldExisted {
                shape,
                field,
                definition,
            } => self.field_existed(shape, field, definition, origin),
            Instruction::FieldDidNotExist { shape, field } => {
                let target = self.shape_mut(shape, origin)?;
                target
                    .remove_field(field)
                    .map(|_| ())
                    .ok_or_else(|| SynthesisError::UnknownField {
                        shape: shape.clone(),
                        field: field.clone(),
                        origin: origin(),
                    })
            }
            Instruction::FieldAttributesChanged {
                shape,
                field,
                changes,
            } => {
                if let Some(ty) = &changes.ty {
                    self.check_references(ty, origin)?;
                }
                let target = self.shape_mut(shape, origin)?;
                let existing = target
                    .field_mut(field)
                    .ok_or_else(|| SynthesisError::UnknownField {
                        shape: shape.clone(),
                        field: field.clone(),
                        origin: origin(),
                    })?;
                changes.apply_to(existing);
                Ok(())
            }
            Instruction::PropertyAdded { shape, property } => {
                let target = self.shape_mut(shape, origin)?;
                if target.has_member(property.name()) {
                    return Err(SynthesisError::FieldConflict {
                        shape: shape.clone(),
                        field: property.name().to_string(),
                        origin: origin(),
                    });
                }
                target.insert_property(property.clone());
                Ok(())
            }
            Instruction::PropertyRemoved { shape, property } => {
                let target = self.shape_mut(shape, origin)?;
                target
                    .remove_property(property)
                    .map(|_| ())
                    .ok_or_else(|| SynthesisError::UnknownProperty {
                        shape: shape.clone(),
                        property: property.clone(),
                        origin: origin(),
                    })
            }
            Instruction::ShapeRenamed { shape, new_name } => {
                self.shape_mut(shape, origin)?.rename(new_name.clone());
                Ok(())
            }
            Instruction::EnumMemberAdded {
                enumeration,
                member,
                value,
            } => {
                let target = self.enum_mut(enumeration, origin)?;
                if target.members().contains_key(member) {
                    return Err(SynthesisError::EnumMemberConflict {
                        enumeration: enumeration.clone(),
                        member: member.clone(),
                        origin: origin(),
                    });
                }
                target.insert_member(member.clone(), value.clone());
                Ok(())
            }
            Instruction::EnumMemberRemoved {
                enumeration,
                member,
            } => {
                let target = self.enum_mut(enumeration, origin)?;
                target
                    .remove_member(member)
                    .map(|_| ())
                    .ok_or_else(|| SynthesisError::UnknownEnumMember {
                        enumeration: enumeration.clone(),
                        member: member.clone(),
                        origin: origin(),
                    })
            }
            Instruction::OperationExisted { .. }
            | Instruction::OperationDidNotExist { .. }
            | Instruction::OperationAttributesChanged { .. }
            | Instruction::OperationHandlerReplaced { .. } => Ok(()),
        }
    }

    fn field_existed(
        &mut self,
        shape: &ShapeId,
        field: &str,
        definition: &FieldDefinition,
        origin: impl Fn() -> Origin,
    ) -> Result<()> {
        self.check_references(&definition.ty, &origin)?;
        let target = self.shape_mut(shape, &origin)?;
        if target.has_member(field) {
            return Err(SynthesisError::FieldConflict {
                shape: shape.clone(),
                field: field.to_string(),
                origin: origin(),
            });
        }
        target.insert_field(field, definition.clone());
        Ok(())
    }

    fn shape_mut(
        &mut self,
        id: &ShapeId,
        origin: impl Fn() -> Origin,
    ) -> Result<&mut ShapeDefinition> {
        self.shapes
            .get_mut(id)
            .ok_or_else(|| SynthesisError::UnknownShape {
                shape: id.clone(),
                origin: origin(),
            })
    }

    fn enum_mut(
        &mut self,
        id: &EnumId,
        origin: impl Fn() -> Origin,
    ) -> Result<&mut EnumDefinition> {
        self.enums
            .get_mut(id)
            .ok_or_else(|| SynthesisError::UnknownEnum {
                enumeration: id.clone(),
                origin: origin(),
            })
    }

    fn check_references(&self, ty: &TypeDescriptor, origin: impl Fn() -> Origin) -> Result<()> {
        if let Some(missing) = ty.shape_refs().into_iter().find(|id| !self.shapes.contains_key(*id)) {
            return Err(SynthesisError::UnknownShape {
                shape: missing.clone(),
                origin: origin(),
            });
        }
        if let Some(missing) = ty.enum_refs().into_iter().find(|id| !self.enums.contains_key(*id)) {
            return Err(SynthesisError::UnknownEnum {
                enumeration: missing.clone(),
                origin: origin(),
            });
        }
        Ok(())
    }
}
