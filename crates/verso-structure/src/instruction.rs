//! Declarative instructions describing how a version differs from its predecessor
//!
//! Instructions are read backward: applied to a version's snapshot they
//! produce the snapshot of the version immediately before it. Entry points
//! [`shape`], [`enumeration`] and [`operation`] build them fluently:
//!
//! ```
//! use verso_structure::instruction::shape;
//! use verso_structure::shape::FieldDefinition;
//! use verso_structure::types::TypeDescriptor;
//!
//! let added = shape("User").field("address").existed(FieldDefinition::new(TypeDescriptor::String));
//! let removed = shape("User").field("addresses").did_not_exist();
//! assert_eq!(added.kind(), "field_existed");
//! assert_eq!(removed.kind(), "field_did_not_exist");
//! ```

use crate::operation::{AttributeChanges, OperationHandler, RouteSelector};
use crate::payload::Payload;
use crate::shape::{ComputedProperty, FieldChanges, FieldDefinition};
use crate::types::{EnumId, ShapeId};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Closed set of schema and operation instructions
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// The field was present in the predecessor
    FieldExisted {
        /// Target shape
        shape: ShapeId,
        /// Field name
        field: String,
        /// Definition in the predecessor
        definition: FieldDefinition,
    },

    /// The field was absent in the predecessor
    FieldDidNotExist {
        /// Target shape
        shape: ShapeId,
        /// Field name
        field: String,
    },

    /// The field had different attributes (or type) in the predecessor
    FieldAttributesChanged {
        /// Target shape
        shape: ShapeId,
        /// Field name
        field: String,
        /// Values the predecessor used
        changes: FieldChanges,
    },

    /// The computed property was present in the predecessor
    PropertyAdded {
        /// Target shape
        shape: ShapeId,
        /// Property (name and compute function)
        property: ComputedProperty,
    },

    /// The computed property was absent in the predecessor
    PropertyRemoved {
        /// Target shape
        shape: ShapeId,
        /// Property name
        property: String,
    },

    /// The shape had another name in the predecessor
    ShapeRenamed {
        /// Target shape
        shape: ShapeId,
        /// Name the predecessor used
        new_name: String,
    },

    /// The enumeration had an extra member in the predecessor
    EnumMemberAdded {
        /// Target enumeration
        enumeration: EnumId,
        /// Member name
        member: String,
        /// Member value
        value: Value,
    },

    /// The enumeration lacked a member in the predecessor
    EnumMemberRemoved {
        /// Target enumeration
        enumeration: EnumId,
        /// Member name
        member: String,
    },

    /// The operation was exposed in the predecessor
    OperationExisted {
        /// Target operation
        route: RouteSelector,
    },

    /// The operation was not exposed in the predecessor
    OperationDidNotExist {
        /// Target operation
        route: RouteSelector,
    },

    /// The operation had other attributes in the predecessor
    OperationAttributesChanged {
        /// Target operation
        route: RouteSelector,
        /// Values the predecessor used
        changes: AttributeChanges,
    },

    /// The operation was served by another handler in the predecessor
    OperationHandlerReplaced {
        /// Target operation
        route: RouteSelector,
        /// Handler the predecessor used
        handler: Arc<dyn OperationHandler>,
    },
}

impl Instruction {
    /// Stable snake_case tag
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FieldExisted { .. } => "field_existed",
            Self::FieldDidNotExist { .. } => "field_did_not_exist",
            Self::FieldAttributesChanged { .. } => "field_attributes_changed",
            Self::PropertyAdded { .. } => "property_added",
            Self::PropertyRemoved { .. } => "property_removed",
            Self::ShapeRenamed { .. } => "shape_renamed",
            Self::EnumMemberAdded { .. } => "enum_member_added",
            Self::EnumMemberRemoved { .. } => "enum_member_removed",
            Self::OperationExisted { .. } => "operation_existed",
            Self::OperationDidNotExist { .. } => "operation_did_not_exist",
            Self::OperationAttributesChanged { .. } => "operation_attributes_changed",
            Self::OperationHandlerReplaced { .. } => "operation_handler_replaced",
        }
    }

    /// Shape targeted by a shape-level instruction
    #[must_use]
    pub fn shape(&self) -> Option<&ShapeId> {
        match self {
            Self::FieldExisted { shape, .. }
            | Self::FieldDidNotExist { shape, .. }
            | Self::FieldAttributesChanged { shape, .. }
            | Self::PropertyAdded { shape, .. }
            | Self::PropertyRemoved { shape, .. }
            | Self::ShapeRenamed { shape, .. } => Some(shape),
            _ => None,
        }
    }

    /// Whether this is a field instruction on `target`
    ///
    /// Such instructions change the wire form of the shape and of every shape
    /// containing it, so a request crossing them needs a converter.
    #[must_use]
    pub fn alters_fields_of(&self, target: &ShapeId) -> bool {
        match self {
            Self::FieldExisted { shape, .. }
            | Self::FieldDidNotExist { shape, .. }
            | Self::FieldAttributesChanged { shape, .. } => shape == target,
            _ => false,
        }
    }

    /// Operation selector of an operation instruction
    #[must_use]
    pub fn route(&self) -> Option<&RouteSelector> {
        match self {
            Self::OperationExisted { route }
            | Self::OperationDidNotExist { route }
            | Self::OperationAttributesChanged { route, .. }
            | Self::OperationHandlerReplaced { route, .. } => Some(route),
            _ => None,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldExisted { shape, field, .. }
            | Self::FieldDidNotExist { shape, field }
            | Self::FieldAttributesChanged { shape, field, .. } => {
                write!(f, "{} {shape}.{field}", self.kind())
            }
            Self::PropertyAdded { shape, property } => {
                write!(f, "{} {shape}.{}", self.kind(), property.name())
            }
            Self::PropertyRemoved { shape, property } => write!(f, "{} {shape}.{property}", self.kind()),
            Self::ShapeRenamed { shape, new_name } => write!(f, "{} {shape} -> {new_name}", self.kind()),
            Self::EnumMemberAdded {
                enumeration, member, ..
            }
            | Self::EnumMemberRemoved { enumeration, member } => {
                write!(f, "{} {enumeration}.{member}", self.kind())
            }
            Self::OperationExisted { route }
            | Self::OperationDidNotExist { route }
            | Self::OperationAttributesChanged { route, .. }
            | Self::OperationHandlerReplaced { route, .. } => write!(f, "{} {route}", self.kind()),
        }
    }
}

/// Start a shape instruction
#[inline]
#[must_use]
pub fn shape(id: impl Into<ShapeId>) -> ShapeTarget {
    ShapeTarget { shape: id.into() }
}

/// Start an enumeration instruction
#[inline]
#[must_use]
pub fn enumeration(id: impl Into<EnumId>) -> EnumTarget {
    EnumTarget {
        enumeration: id.into(),
    }
}

/// Start an operation instruction
#[must_use]
pub fn operation<I, S>(path: impl Into<String>, methods: I) -> OperationTarget
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    OperationTarget {
        route: RouteSelector::new(path, methods),
    }
}

/// Shape-level instruction factory
#[derive(Debug, Clone)]
pub struct ShapeTarget {
    shape: ShapeId,
}

impl ShapeTarget {
    /// Address a field
    #[inline]
    #[must_use]
    pub fn field(self, name: impl Into<String>) -> FieldTarget {
        FieldTarget {
            shape: self.shape,
            field: name.into(),
        }
    }

    /// Address a computed property
    #[inline]
    #[must_use]
    pub fn property(self, name: impl Into<String>) -> PropertyTarget {
        PropertyTarget {
            shape: self.shape,
            property: name.into(),
        }
    }

    /// The shape was called `name` in the predecessor
    #[inline]
    #[must_use]
    pub fn had_name(self, name: impl Into<String>) -> Instruction {
        Instruction::ShapeRenamed {
            shape: self.shape,
            new_name: name.into(),
        }
    }
}

/// Field instruction factory
#[derive(Debug, Clone)]
pub struct FieldTarget {
    shape: ShapeId,
    field: String,
}

impl FieldTarget {
    /// [`Instruction::FieldExisted`]
    #[inline]
    #[must_use]
    pub fn existed(self, definition: FieldDefinition) -> Instruction {
        Instruction::FieldExisted {
            shape: self.shape,
            field: self.field,
            definition,
        }
    }

    /// [`Instruction::FieldDidNotExist`]
    #[inline]
    #[must_use]
    pub fn did_not_exist(self) -> Instruction {
        Instruction::FieldDidNotExist {
            shape: self.shape,
            field: self.field,
        }
    }

    /// [`Instruction::FieldAttributesChanged`]
    #[inline]
    #[must_use]
    pub fn had(self, changes: FieldChanges) -> Instruction {
        Instruction::FieldAttributesChanged {
            shape: self.shape,
            field: self.field,
            changes,
        }
    }
}

/// Property instruction factory
#[derive(Debug, Clone)]
pub struct PropertyTarget {
    shape: ShapeId,
    property: String,
}

impl PropertyTarget {
    /// [`Instruction::PropertyAdded`] computed by `compute`
    #[must_use]
    pub fn existed<F>(self, compute: F) -> Instruction
    where
        F: Fn(&Payload) -> Value + Send + Sync + 'static,
    {
        Instruction::PropertyAdded {
            shape: self.shape,
            property: ComputedProperty::new(self.property, compute),
        }
    }

    /// [`Instruction::PropertyRemoved`]
    #[inline]
    #[must_use]
    pub fn did_not_exist(self) -> Instruction {
        Instruction::PropertyRemoved {
            shape: self.shape,
            property: self.property,
        }
    }
}

/// Enumeration instruction factory
#[derive(Debug, Clone)]
pub struct EnumTarget {
    enumeration: EnumId,
}

impl EnumTarget {
    /// [`Instruction::EnumMemberAdded`]
    #[inline]
    #[must_use]
    pub fn had_member(self, member: impl Into<String>, value: Value) -> Instruction {
        Instruction::EnumMemberAdded {
            enumeration: self.enumeration,
            member: member.into(),
            value,
        }
    }

    /// [`Instruction::EnumMemberRemoved`]
    #[inline]
    #[must_use]
    pub fn did_not_have(self, member: impl Into<String>) -> Instruction {
        Instruction::EnumMemberRemoved {
            enumeration: self.enumeration,
            member: member.into(),
        }
    }
}

/// Operation instruction factory
#[derive(Debug, Clone)]
pub struct OperationTarget {
    route: RouteSelector,
}

impl OperationTarget {
    /// Narrow to one function name
    #[inline]
    #[must_use]
    pub fn func_name(mut self, name: impl Into<String>) -> Self {
        self.route = self.route.with_func_name(name);
        self
    }

    /// [`Instruction::OperationExisted`]
    #[inline]
    #[must_use]
    pub fn existed(self) -> Instruction {
        Instruction::OperationExisted { route: self.route }
    }

    /// [`Instruction::OperationDidNotExist`]
    #[inline]
    #[must_use]
    pub fn did_not_exist(self) -> Instruction {
        Instruction::OperationDidNotExist { route: self.route }
    }

    /// [`Instruction::OperationAttributesChanged`]
    #[inline]
    #[must_use]
    pub fn had(self, changes: AttributeChanges) -> Instruction {
        Instruction::OperationAttributesChanged {
            route: self.route,
            changes,
        }
    }

    /// [`Instruction::OperationHandlerReplaced`]
    #[inline]
    #[must_use]
    pub fn handled_by(self, handler: Arc<dyn OperationHandler>) -> Instruction {
        Instruction::OperationHandlerReplaced {
            route: self.route,
            handler,
        }
    }
}
