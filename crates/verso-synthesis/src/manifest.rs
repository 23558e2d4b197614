//! Declarative manifests
//!
//! An [`ApiManifest`] describes a latest definition and its version history
//! in YAML, JSON or TOML. Only instructions that need no code can be
//! expressed; operations get a placeholder handler that reports
//! "not implemented".

use crate::error::SynthesisError;
use crate::schema::VersionedSchema;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use verso_structure::{
    ApiDefinition, ApiVersion, AttributeChanges, EnumDefinition, EnumId, FieldChanges,
    FieldDefinition, Instruction, OperationAttributes, OperationDefinition, RouteId,
    RouteSelector, ShapeDefinition, ShapeId, StructureError, UnimplementedHandler, Version,
    VersionChange,
};

/// Manifest encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ManifestFormat {
    /// Pick the format from a file extension
    ///
    /// # Errors
    /// Returns [`ManifestError::UnsupportedFormat`] for other extensions
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(ManifestError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Errors loading a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// File extension not recognized
    #[error("unsupported manifest format: {0}")]
    UnsupportedFormat(PathBuf),

    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error
    #[error("invalid yaml manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("invalid json manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML syntax or shape error
    #[error("invalid toml manifest: {0}")]
    Toml(#[from] toml::de::Error),

    /// Manifest content is inconsistent
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl From<StructureError> for ManifestError {
    fn from(error: StructureError) -> Self {
        Self::Synthesis(error.into())
    }
}

/// Shape entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeManifest {
    /// Shape name (its stable id)
    pub name: String,
    /// Ordered fields
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
}

/// Enumeration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumManifest {
    /// Enumeration name (its stable id)
    pub name: String,
    /// Ordered members
    #[serde(default)]
    pub members: IndexMap<String, Value>,
}

const fn default_true() -> bool {
    true
}

/// Operation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationManifest {
    /// Route path
    pub path: String,
    /// Methods
    pub methods: Vec<String>,
    /// Function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_name: Option<String>,
    /// Exposed in the latest version
    #[serde(default = "default_true")]
    pub exists: bool,
    /// Request body shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Response body shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Attributes
    #[serde(default)]
    pub attributes: OperationAttributes,
}

/// Operation address inside an instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteManifest {
    /// Route path
    pub path: String,
    /// Methods
    pub methods: Vec<String>,
    /// Function name filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_name: Option<String>,
}

impl RouteManifest {
    fn selector(&self) -> RouteSelector {
        let selector = RouteSelector::new(self.path.clone(), &self.methods);
        match &self.func_name {
            Some(name) => selector.with_func_name(name.clone()),
            None => selector,
        }
    }
}

/// Serializable instruction
///
/// Computed properties and handler replacements carry code and have no
/// manifest form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum InstructionManifest {
    FieldExisted {
        shape: String,
        field: String,
        definition: FieldDefinition,
    },
    FieldDidNotExist {
        shape: String,
        field: String,
    },
    FieldAttributesChanged {
        shape: String,
        field: String,
        changes: FieldChanges,
    },
    ShapeRenamed {
        shape: String,
        new_name: String,
    },
    EnumMemberAdded {
        #[serde(rename = "enum")]
        enumeration: String,
        member: String,
        value: Value,
    },
    EnumMemberRemoved {
        #[serde(rename = "enum")]
        enumeration: String,
        member: String,
    },
    OperationExisted {
        route: RouteManifest,
    },
    OperationDidNotExist {
        route: RouteManifest,
    },
    OperationAttributesChanged {
        route: RouteManifest,
        changes: AttributeChanges,
    },
}

impl From<InstructionManifest> for Instruction {
    fn from(manifest: InstructionManifest) -> Self {
        match manifest {
            InstructionManifest::FieldExisted {
                shape,
                field,
                definition,
            } => Self::FieldExisted {
                shape: ShapeId::new(shape),
                field,
                definition,
            },
            InstructionManifest::FieldDidNotExist { shape, field } => Self::FieldDidNotExist {
                shape: ShapeId::new(shape),
                field,
            },
            InstructionManifest::FieldAttributesChanged {
                shape,
                field,
                changes,
            } => Self::FieldAttributesChanged {
                shape: ShapeId::new(shape),
                field,
                changes,
            },
            InstructionManifest::ShapeRenamed { shape, new_name } => Self::ShapeRenamed {
                shape: ShapeId::new(shape),
                new_name,
            },
            InstructionManifest::EnumMemberAdded {
                enumeration,
                member,
                value,
            } => Self::EnumMemberAdded {
                enumeration: EnumId::new(enumeration),
                member,
                value,
            },
            InstructionManifest::EnumMemberRemoved {
                enumeration,
                member,
            } => Self::EnumMemberRemoved {
                enumeration: EnumId::new(enumeration),
                member,
            },
            InstructionManifest::OperationExisted { route } => Self::OperationExisted {
                route: route.selector(),
            },
            InstructionManifest::OperationDidNotExist { route } => Self::OperationDidNotExist {
                route: route.selector(),
            },
            InstructionManifest::OperationAttributesChanged { route, changes } => {
                Self::OperationAttributesChanged {
                    route: route.selector(),
                    changes,
                }
            }
        }
    }
}

/// Change entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeManifest {
    /// Human description
    pub description: String,
    /// Behavior-only change
    #[serde(default)]
    pub side_effects: bool,
    /// Ordered instructions
    #[serde(default)]
    pub instructions: Vec<InstructionManifest>,
}

/// Version entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Version key
    pub version: ApiVersion,
    /// Changes introduced at this version
    #[serde(default)]
    pub changes: Vec<ChangeManifest>,
}

/// A complete declarative interface history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiManifest {
    /// Latest shapes
    #[serde(default)]
    pub shapes: Vec<ShapeManifest>,
    /// Latest enumerations
    #[serde(default)]
    pub enums: Vec<EnumManifest>,
    /// Latest operations (including ones only older versions expose)
    #[serde(default)]
    pub operations: Vec<OperationManifest>,
    /// Versions in any order
    pub versions: Vec<VersionManifest>,
}

impl ApiManifest {
    /// Parse manifest text
    ///
    /// # Errors
    /// Returns the format's parse error
    pub fn parse(text: &str, format: ManifestFormat) -> Result<Self, ManifestError> {
        Ok(match format {
            ManifestFormat::Yaml => serde_yaml::from_str(text)?,
            ManifestFormat::Json => serde_json::from_str(text)?,
            ManifestFormat::Toml => toml::from_str(text)?,
        })
    }

    /// Read and parse a manifest file, picking the format from its extension
    ///
    /// # Errors
    /// Returns [`ManifestError`] on unsupported extension, I/O or parse failure
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let format = ManifestFormat::from_path(path)?;
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), ?format, "loaded manifest");
        Self::parse(&text, format)
    }

    /// Build the schema this manifest describes
    ///
    /// # Errors
    /// Returns [`ManifestError::Synthesis`] for invalid routes, duplicate
    /// definitions, empty change descriptions or an invalid version list
    pub fn into_schema(self) -> Result<VersionedSchema, ManifestError> {
        let mut builder = ApiDefinition::builder();
        for shape in self.shapes {
            let mut definition = ShapeDefinition::new(shape.name);
            for (name, field) in shape.fields {
                definition = definition.with_field(name, field);
            }
            builder = builder.shape(definition);
        }
        for entry in self.enums {
            let mut definition = EnumDefinition::new(entry.name);
            for (name, value) in entry.members {
                definition = definition.with_member(name, value);
            }
            builder = builder.enumeration(definition);
        }
        for entry in self.operations {
            let handler_name = entry
                .func_name
                .clone()
                .unwrap_or_else(|| format!("{} {}", entry.methods.join(","), entry.path));
            let route = RouteId::new(entry.path, &entry.methods, entry.func_name)?;
            let mut operation = OperationDefinition::new(route, UnimplementedHandler::shared(handler_name))
                .with_attributes(entry.attributes);
            if let Some(request) = entry.request {
                operation = operation.with_request(request);
            }
            if let Some(response) = entry.response {
                operation = operation.with_response(response);
            }
            if !entry.exists {
                operation = operation.absent();
            }
            builder = builder.operation(operation);
        }
        let definition = builder.build()?;

        let mut versions = Vec::with_capacity(self.versions.len());
        for entry in self.versions {
            let mut version = Version::new(entry.version);
            for change in entry.changes {
                let mut change_builder = VersionChange::builder(change.description)
                    .instructions(change.instructions.into_iter().map(Instruction::from));
                if change.side_effects {
                    change_builder = change_builder.side_effects();
                }
                version = version.with_change(change_builder.build()?);
            }
            versions.push(version);
        }

        Ok(VersionedSchema::new(definition, versions)?)
    }
}
