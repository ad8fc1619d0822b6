//! Field schema table and its JSON loader.
//!
//! The schema document groups fields by owner class. Each field is parsed on
//! its own so a malformed entry is reported and skipped without aborting the
//! rest of the load.

use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::RandomState;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::descriptor::{FieldBounds, FieldDescriptor};
use crate::value::{kind_for_name, Axis, FieldKind, Vec3};

pub const BUILTIN_HANDLING_SCHEMA: &str = include_str!("data/handling_fields.json");

/// Problem with a single schema entry. The entry is skipped, the load goes on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaIssue {
    #[error("field entry in class '{class}' has no name")]
    MissingName { class: String },
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("field '{field}' is missing its {bound} bound")]
    MissingBound { field: String, bound: &'static str },
    #[error("field '{field}' has a malformed {bound} bound: {reason}")]
    InvalidBound {
        field: String,
        bound: &'static str,
        reason: String,
    },
    #[error("field '{field}' has min greater than max")]
    BoundsOutOfOrder { field: String },
    #[error("field '{field}' is declared {declared} but its name implies {implied}")]
    KindMismatch {
        field: String,
        declared: FieldKind,
        implied: FieldKind,
    },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse handling schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read handling schema from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct SchemaDocument {
    classes: Vec<OwnerClassDocument>,
}

#[derive(Debug, Clone, Deserialize)]
struct OwnerClassDocument {
    name: String,
    #[serde(default)]
    fields: Vec<JsonValue>,
}

/// Immutable table of every known handling field, in declaration order.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize, RandomState>,
}

/// Result of a lenient schema load.
#[derive(Debug, Clone)]
pub struct LoadedSchema {
    pub schema: FieldSchema,
    pub issues: Vec<SchemaIssue>,
}

impl FieldSchema {
    /// Build a schema from descriptors, rejecting the first invalid one.
    pub fn try_new(fields: Vec<FieldDescriptor>) -> Result<Self, SchemaIssue> {
        let mut schema = Self::empty();
        for descriptor in fields {
            schema.insert(descriptor)?;
        }
        Ok(schema)
    }

    pub fn builtin() -> Arc<Self> {
        let loaded = Self::from_json_str(BUILTIN_HANDLING_SCHEMA)
            .expect("builtin handling schema should parse");
        debug_assert!(loaded.issues.is_empty(), "builtin schema has issues");
        Arc::new(loaded.schema)
    }

    pub fn from_json_str(json: &str) -> Result<LoadedSchema, serde_json::Error> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        let mut schema = Self::empty();
        let mut issues = Vec::new();

        for class in &document.classes {
            for entry in &class.fields {
                let outcome =
                    parse_field(&class.name, entry).and_then(|field| schema.insert(field));
                if let Err(issue) = outcome {
                    tracing::warn!(
                        target: "handling_editor::schema",
                        class = %class.name,
                        issue = %issue,
                        "schema.field_skipped"
                    );
                    issues.push(issue);
                }
            }
        }

        Ok(LoadedSchema { schema, issues })
    }

    pub fn from_file(path: &Path) -> Result<LoadedSchema, SchemaError> {
        let contents = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let loaded = FieldSchema::from_json_str(&contents)?;
        Ok(loaded)
    }

    pub fn lookup(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&slot| &self.fields[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declaration order position, used to keep output stable.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_numeric())
    }

    pub fn editable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.editable)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn empty() -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::default(),
        }
    }

    fn insert(&mut self, descriptor: FieldDescriptor) -> Result<(), SchemaIssue> {
        let implied = kind_for_name(&descriptor.name);
        if implied != descriptor.kind {
            return Err(SchemaIssue::KindMismatch {
                field: descriptor.name,
                declared: descriptor.kind,
                implied,
            });
        }
        match descriptor.bounds {
            Some(bounds) if bounds.kind() != descriptor.kind => {
                return Err(SchemaIssue::KindMismatch {
                    field: descriptor.name,
                    declared: bounds.kind(),
                    implied,
                });
            }
            Some(bounds) if !bounds.is_ordered() => {
                return Err(SchemaIssue::BoundsOutOfOrder {
                    field: descriptor.name,
                });
            }
            None if descriptor.is_numeric() => {
                return Err(SchemaIssue::MissingBound {
                    field: descriptor.name,
                    bound: "min",
                });
            }
            _ => {}
        }
        if self.index.contains_key(&descriptor.name) {
            return Err(SchemaIssue::DuplicateField(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.fields.len());
        self.fields.push(descriptor);
        Ok(())
    }
}

fn parse_field(class: &str, entry: &JsonValue) -> Result<FieldDescriptor, SchemaIssue> {
    let name = entry
        .get("name")
        .and_then(JsonValue::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SchemaIssue::MissingName {
            class: class.to_string(),
        })?
        .to_string();
    let editable = entry
        .get("editable")
        .and_then(JsonValue::as_bool)
        .unwrap_or(true);
    let description = entry
        .get("description")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();

    let kind = kind_for_name(&name);
    let bounds = match kind {
        FieldKind::String => None,
        FieldKind::Int32 => Some(FieldBounds::Int {
            min: int_bound(&name, entry, "min")?,
            max: int_bound(&name, entry, "max")?,
        }),
        FieldKind::Float32 => Some(FieldBounds::Float {
            min: float_bound(&name, entry, "min")?,
            max: float_bound(&name, entry, "max")?,
        }),
        FieldKind::Vector3 => Some(FieldBounds::Vector {
            min: vector_bound(&name, entry, "min")?,
            max: vector_bound(&name, entry, "max")?,
        }),
    };

    Ok(FieldDescriptor {
        name,
        owner_class: class.to_string(),
        kind,
        editable: editable && kind.is_numeric(),
        description,
        bounds,
    })
}

fn bound_value<'a>(
    field: &str,
    entry: &'a JsonValue,
    bound: &'static str,
) -> Result<&'a JsonValue, SchemaIssue> {
    entry
        .get(bound)
        .filter(|value| !value.is_null())
        .ok_or_else(|| SchemaIssue::MissingBound {
            field: field.to_string(),
            bound,
        })
}

fn int_bound(field: &str, entry: &JsonValue, bound: &'static str) -> Result<i32, SchemaIssue> {
    let value = bound_value(field, entry, bound)?;
    value
        .as_i64()
        .and_then(|raw| i32::try_from(raw).ok())
        .ok_or_else(|| SchemaIssue::InvalidBound {
            field: field.to_string(),
            bound,
            reason: format!("expected a 32-bit integer, found {value}"),
        })
}

fn float_bound(field: &str, entry: &JsonValue, bound: &'static str) -> Result<f32, SchemaIssue> {
    let value = bound_value(field, entry, bound)?;
    number_as_f32(value).ok_or_else(|| SchemaIssue::InvalidBound {
        field: field.to_string(),
        bound,
        reason: format!("expected a number, found {value}"),
    })
}

fn vector_bound(field: &str, entry: &JsonValue, bound: &'static str) -> Result<Vec3, SchemaIssue> {
    let value = bound_value(field, entry, bound)?;
    let mut vector = Vec3::default();
    for axis in Axis::ALL {
        let component = value
            .get(axis.suffix())
            .and_then(number_as_f32)
            .ok_or_else(|| SchemaIssue::InvalidBound {
                field: field.to_string(),
                bound,
                reason: format!("missing or non-numeric '{axis}' component"),
            })?;
        vector.set_component(axis, component);
    }
    Ok(vector)
}

fn number_as_f32(value: &JsonValue) -> Option<f32> {
    value
        .as_f64()
        .map(|raw| raw as f32)
        .filter(|raw| raw.is_finite())
}

/// Where the active schema came from.
#[derive(Debug, Clone)]
pub struct SchemaMetadata {
    path: Option<PathBuf>,
    issues: Vec<SchemaIssue>,
}

impl SchemaMetadata {
    pub fn new(path: Option<PathBuf>, issues: Vec<SchemaIssue>) -> Self {
        Self { path, issues }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn issues(&self) -> &[SchemaIssue] {
        &self.issues
    }
}

/// Load the schema from `HANDLING_SCHEMA_PATH`, falling back to the builtin table.
pub fn load_schema_from_env() -> (Arc<FieldSchema>, SchemaMetadata) {
    match env::var("HANDLING_SCHEMA_PATH").ok().map(PathBuf::from) {
        Some(path) => load_schema_or_builtin(Some(&path)),
        None => load_schema_or_builtin(None),
    }
}

/// Load the schema from `path` when given, falling back to the builtin table.
pub fn load_schema_or_builtin(path: Option<&Path>) -> (Arc<FieldSchema>, SchemaMetadata) {
    if let Some(path) = path {
        match FieldSchema::from_file(path) {
            Ok(loaded) => {
                tracing::info!(
                    target: "handling_editor::schema",
                    path = %path.display(),
                    fields = loaded.schema.len(),
                    skipped = loaded.issues.len(),
                    "schema.loaded=file"
                );
                return (
                    Arc::new(loaded.schema),
                    SchemaMetadata::new(Some(path.to_path_buf()), loaded.issues),
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "handling_editor::schema",
                    path = %path.display(),
                    error = %err,
                    "schema.load_failed"
                );
            }
        }
    }

    let schema = FieldSchema::builtin();
    tracing::info!(
        target: "handling_editor::schema",
        fields = schema.len(),
        "schema.loaded=builtin"
    );
    (schema, SchemaMetadata::new(None, Vec::new()))
}
