//! Type descriptors and shape identities
//!
//! Field types are explicit descriptor values, never reflected host types.
//! References to other shapes and enums go through stable ids (the name the
//! shape or enum has in the latest version) and resolve to the name a given
//! version gives them at synthesis time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identity of a shape (its latest-version name)
    ShapeId
);

string_id!(
    /// Stable identity of an enumeration (its latest-version name)
    EnumId
);

/// Field type descriptor
///
/// Textual form (used by manifests and dumps):
/// `string`, `integer`, `number`, `boolean`, `null`, `any`,
/// `list[T]`, `map[T]`, `optional[T]`, `shape[Name]`, `enum[Name]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDescriptor {
    /// UTF-8 text
    String,
    /// Whole number
    Integer,
    /// Any JSON number
    Number,
    /// true / false
    Boolean,
    /// JSON null only
    Null,
    /// Anything goes
    Any,
    /// Homogeneous list
    List(Box<TypeDescriptor>),
    /// String-keyed mapping with homogeneous values
    Map(Box<TypeDescriptor>),
    /// Value or null; an optional field is never required
    Optional(Box<TypeDescriptor>),
    /// Nested object of another shape
    Shape(ShapeId),
    /// Member value of an enumeration
    Enum(EnumId),
}

impl TypeDescriptor {
    /// `list[inner]`
    #[inline]
    #[must_use]
    pub fn list(inner: TypeDescriptor) -> Self {
        Self::List(Box::new(inner))
    }

    /// `map[inner]`
    #[inline]
    #[must_use]
    pub fn map(inner: TypeDescriptor) -> Self {
        Self::Map(Box::new(inner))
    }

    /// `optional[inner]`
    #[inline]
    #[must_use]
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// `shape[id]`
    #[inline]
    #[must_use]
    pub fn shape(id: impl Into<ShapeId>) -> Self {
        Self::Shape(id.into())
    }

    /// `enum[id]`
    #[inline]
    #[must_use]
    pub fn enumeration(id: impl Into<EnumId>) -> Self {
        Self::Enum(id.into())
    }

    /// Whether the descriptor is `optional[...]`
    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Shape ids referenced anywhere inside this descriptor
    #[must_use]
    pub fn shape_refs(&self) -> Vec<&ShapeId> {
        let mut out = Vec::new();
        self.walk(&mut |t| {
            if let Self::Shape(id) = t {
                out.push(id);
            }
        });
        out
    }

    /// Enum ids referenced anywhere inside this descriptor
    #[must_use]
    pub fn enum_refs(&self) -> Vec<&EnumId> {
        let mut out = Vec::new();
        self.walk(&mut |t| {
            if let Self::Enum(id) = t {
                out.push(id);
            }
        });
        out
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TypeDescriptor)) {
        visit(self);
        match self {
            Self::List(inner) | Self::Map(inner) | Self::Optional(inner) => inner.walk(visit),
            _ => {}
        }
    }

    /// Render with reference names resolved through the given lookups
    ///
    /// Each lookup maps a stable id to the name a particular version uses;
    /// unresolved ids render as-is.
    #[must_use]
    pub fn render_with(
        &self,
        shape_name: &impl Fn(&ShapeId) -> Option<String>,
        enum_name: &impl Fn(&EnumId) -> Option<String>,
    ) -> String {
        match self {
            Self::List(inner) => format!("list[{}]", inner.render_with(shape_name, enum_name)),
            Self::Map(inner) => format!("map[{}]", inner.render_with(shape_name, enum_name)),
            Self::Optional(inner) => {
                format!("optional[{}]", inner.render_with(shape_name, enum_name))
            }
            Self::Shape(id) => format!("shape[{}]", shape_name(id).unwrap_or_else(|| id.to_string())),
            Self::Enum(id) => format!("enum[{}]", enum_name(id).unwrap_or_else(|| id.to_string())),
            other => other.to_string(),
        }
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::Null => f.write_str("null"),
            Self::Any => f.write_str("any"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Map(inner) => write!(f, "map[{inner}]"),
            Self::Optional(inner) => write!(f, "optional[{inner}]"),
            Self::Shape(id) => write!(f, "shape[{id}]"),
            Self::Enum(id) => write!(f, "enum[{id}]"),
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { input: s, pos: 0 };
        let ty = parser.descriptor()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(TypeParseError::TrailingInput {
                input: s.to_string(),
                position: parser.pos,
            });
        }
        Ok(ty)
    }
}

impl TryFrom<String> for TypeDescriptor {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeDescriptor> for String {
    fn from(value: TypeDescriptor) -> Self {
        value.to_string()
    }
}

/// Errors parsing the textual type form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeParseError {
    /// Unknown primitive or container keyword
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// Missing or unbalanced brackets
    #[error("malformed type '{input}' at position {position}")]
    Malformed { input: String, position: usize },

    /// Text left over after a complete descriptor
    #[error("unexpected trailing input in '{input}' at position {position}")]
    TrailingInput { input: String, position: usize },
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while let Some(c) = self.input[self.pos..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn word(&mut self) -> &str {
        self.skip_ws();
        let start = self.pos;
        let rest = &self.input[start..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'))
            .unwrap_or(rest.len());
        self.pos += len;
        &self.input[start..start + len]
    }

    fn expect(&mut self, ch: char) -> Result<(), TypeParseError> {
        self.skip_ws();
        if self.input[self.pos..].starts_with(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(self.malformed())
        }
    }

    fn malformed(&self) -> TypeParseError {
        TypeParseError::Malformed {
            input: self.input.to_string(),
            position: self.pos,
        }
    }

    fn bracketed_name(&mut self) -> Result<String, TypeParseError> {
        self.expect('[')?;
        let name = self.word().to_string();
        if name.is_empty() {
            return Err(self.malformed());
        }
        self.expect(']')?;
        Ok(name)
    }

    fn bracketed_descriptor(&mut self) -> Result<TypeDescriptor, TypeParseError> {
        self.expect('[')?;
        let inner = self.descriptor()?;
        self.expect(']')?;
        Ok(inner)
    }

    fn descriptor(&mut self) -> Result<TypeDescriptor, TypeParseError> {
        let keyword = self.word().to_ascii_lowercase();
        match keyword.as_str() {
            "string" | "str" => Ok(TypeDescriptor::String),
            "integer" | "int" => Ok(TypeDescriptor::Integer),
            "number" | "float" => Ok(TypeDescriptor::Number),
            "boolean" | "bool" => Ok(TypeDescriptor::Boolean),
            "null" => Ok(TypeDescriptor::Null),
            "any" => Ok(TypeDescriptor::Any),
            "list" => Ok(TypeDescriptor::list(self.bracketed_descriptor()?)),
            "map" => Ok(TypeDescriptor::map(self.bracketed_descriptor()?)),
            "optional" => Ok(TypeDescriptor::optional(self.bracketed_descriptor()?)),
            "shape" => Ok(TypeDescriptor::Shape(ShapeId::new(self.bracketed_name()?))),
            "enum" => Ok(TypeDescriptor::Enum(EnumId::new(self.bracketed_name()?))),
            "" => Err(self.malformed()),
            _ => Err(TypeParseError::UnknownType(keyword)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_containers() {
        let ty: TypeDescriptor = "optional[list[shape[Address]]]".parse().unwrap();
        assert_eq!(
            ty,
            TypeDescriptor::optional(TypeDescriptor::list(TypeDescriptor::shape("Address")))
        );
        assert_eq!(ty.to_string(), "optional[list[shape[Address]]]");
    }

    #[test]
    fn accepts_aliases_and_whitespace() {
        let ty: TypeDescriptor = " map[ int ] ".parse().unwrap();
        assert_eq!(ty, TypeDescriptor::map(TypeDescriptor::Integer));
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            "tuple[int]".parse::<TypeDescriptor>(),
            Err(TypeParseError::UnknownType(_))
        ));
        assert!(matches!(
            "list[int".parse::<TypeDescriptor>(),
            Err(TypeParseError::Malformed { .. })
        ));
        assert!(matches!(
            "int]".parse::<TypeDescriptor>(),
            Err(TypeParseError::TrailingInput { .. })
        ));
        assert!(matches!(
            "shape[]".parse::<TypeDescriptor>(),
            Err(TypeParseError::Malformed { .. })
        ));
    }

    #[test]
    fn collects_references() {
        let ty = TypeDescriptor::map(TypeDescriptor::list(TypeDescriptor::shape("Vat")));
        assert_eq!(ty.shape_refs(), vec![&ShapeId::new("Vat")]);
        assert!(ty.enum_refs().is_empty());
    }

    #[test]
    fn renders_resolved_names() {
        let ty = TypeDescriptor::list(TypeDescriptor::shape("User"));
        let rendered = ty.render_with(&|id: &ShapeId| (id.as_str() == "User").then(|| "Person".to_string()), &|_: &EnumId| None);
        assert_eq!(rendered, "list[shape[Person]]");
    }

    #[test]
    fn serde_uses_textual_form() {
        let ty = TypeDescriptor::list(TypeDescriptor::String);
        assert_eq!(serde_json::to_string(&ty).unwrap(), "\"list[string]\"");
        let back: TypeDescriptor = serde_json::from_str("\"optional[enum[Status]]\"").unwrap();
        assert_eq!(back, TypeDescriptor::optional(TypeDescriptor::enumeration("Status")));
    }
}
