//! Preset export/import document.
//!
//! One entry per field: scalars carry `value`, vectors `x`/`y`/`z`, strings
//! `text`. Import is lenient per entry; each bad entry becomes a
//! [`PresetIssue`] and the rest still load.

use std::collections::HashSet;

use handling_schema::{FieldKind, FieldSchema, FieldValue, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::error::{EditError, PresetIssue};
use crate::value_set::ValueSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarRepr {
    Int(i64),
    Float(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScalarRepr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl PresetEntry {
    fn blank(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            x: None,
            y: None,
            z: None,
            text: None,
        }
    }

    pub fn from_value(name: &str, value: FieldValue) -> Self {
        let mut entry = Self::blank(name);
        match value {
            FieldValue::Int(value) => entry.value = Some(ScalarRepr::Int(value as i64)),
            FieldValue::Float(value) => entry.value = Some(ScalarRepr::Float(value)),
            FieldValue::Vector(value) => {
                entry.x = Some(value.x);
                entry.y = Some(value.y);
                entry.z = Some(value.z);
            }
        }
        entry
    }

    pub fn from_text(name: &str, text: impl Into<String>) -> Self {
        let mut entry = Self::blank(name);
        entry.text = Some(text.into());
        entry
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPresetDocument")]
pub struct PresetDocument {
    pub name: String,
    pub fields: Vec<PresetEntry>,
    /// Entries whose attributes had the wrong JSON type.
    #[serde(skip)]
    rejected: Vec<PresetIssue>,
}

#[derive(Deserialize)]
struct RawPresetDocument {
    name: String,
    #[serde(default)]
    fields: Vec<JsonValue>,
}

impl From<RawPresetDocument> for PresetDocument {
    fn from(raw: RawPresetDocument) -> Self {
        let mut fields = Vec::with_capacity(raw.fields.len());
        let mut rejected = Vec::new();
        for value in raw.fields {
            let field = value
                .get("name")
                .and_then(JsonValue::as_str)
                .unwrap_or("<unnamed>")
                .to_string();
            match serde_json::from_value::<PresetEntry>(value) {
                Ok(entry) => fields.push(entry),
                Err(err) => rejected.push(PresetIssue::MalformedValue {
                    field,
                    reason: err.to_string(),
                }),
            }
        }
        Self {
            name: raw.name,
            fields,
            rejected,
        }
    }
}

#[derive(Debug, Error)]
pub enum PresetDocumentError {
    #[error("failed to parse preset document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Outcome of a lenient import.
#[derive(Debug, Clone, Default)]
pub struct ParsedPreset {
    pub values: ValueSet,
    /// String-kind entries, carried but never merged.
    pub texts: Vec<(String, String)>,
    pub issues: Vec<PresetIssue>,
}

impl PresetDocument {
    pub fn new(name: &str, fields: Vec<PresetEntry>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            rejected: Vec::new(),
        }
    }

    /// Export `values`' current values in schema declaration order.
    pub fn from_value_set(name: &str, schema: &FieldSchema, values: &ValueSet) -> Self {
        let fields = schema
            .numeric_fields()
            .filter_map(|descriptor| {
                values
                    .get(&descriptor.name)
                    .map(|value| PresetEntry::from_value(&descriptor.name, value))
            })
            .collect();
        Self::new(name, fields)
    }

    pub fn with_text(mut self, field: &str, text: impl Into<String>) -> Self {
        self.fields.push(PresetEntry::from_text(field, text));
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, PresetDocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, PresetDocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, PresetDocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Import every well-formed entry and report the rest.
    ///
    /// Imported values use the preset value as both current and baseline.
    pub fn import(&self, schema: &FieldSchema) -> ParsedPreset {
        let mut parsed = ParsedPreset {
            issues: self.rejected.clone(),
            ..ParsedPreset::default()
        };
        let mut seen = HashSet::new();
        for entry in &self.fields {
            if !seen.insert(entry.name.as_str()) {
                parsed
                    .issues
                    .push(PresetIssue::DuplicateEntry(entry.name.clone()));
                continue;
            }
            match decode_entry(schema, entry) {
                Ok(Decoded::Value(value)) => parsed.values.track(entry.name.clone(), value, value),
                Ok(Decoded::Text(text)) => parsed.texts.push((entry.name.clone(), text)),
                Err(issue) => parsed.issues.push(issue),
            }
        }
        for issue in &parsed.issues {
            tracing::warn!(
                target: "handling_editor::presets",
                preset = %self.name,
                issue = %issue,
                "preset.entry_skipped"
            );
        }
        parsed
    }

    /// Strict import: any bad or out-of-range entry makes the whole preset
    /// corrupt.
    pub fn into_value_set(&self, schema: &FieldSchema) -> Result<ValueSet, EditError> {
        let ParsedPreset {
            values, mut issues, ..
        } = self.import(schema);
        issues.extend(values.check_against(schema));
        if issues.is_empty() {
            Ok(values)
        } else {
            Err(EditError::CorruptPreset { issues })
        }
    }
}

enum Decoded {
    Value(FieldValue),
    Text(String),
}

fn decode_entry(schema: &FieldSchema, entry: &PresetEntry) -> Result<Decoded, PresetIssue> {
    let field = entry.name.as_str();
    let descriptor = schema
        .lookup(field)
        .ok_or_else(|| PresetIssue::UnknownField(field.to_string()))?;
    let missing = |attribute: &'static str| PresetIssue::MissingValue {
        field: field.to_string(),
        attribute,
    };
    let malformed = |reason: String| PresetIssue::MalformedValue {
        field: field.to_string(),
        reason,
    };

    match descriptor.kind {
        FieldKind::String => entry
            .text
            .clone()
            .map(Decoded::Text)
            .ok_or_else(|| missing("text")),
        FieldKind::Int32 => match entry.value.ok_or_else(|| missing("value"))? {
            ScalarRepr::Int(raw) => i32::try_from(raw)
                .map(|value| Decoded::Value(FieldValue::Int(value)))
                .map_err(|_| malformed(format!("{raw} does not fit in 32 bits"))),
            ScalarRepr::Float(raw) => Err(malformed(format!("expected an integer, found {raw}"))),
        },
        FieldKind::Float32 => {
            let raw = match entry.value.ok_or_else(|| missing("value"))? {
                ScalarRepr::Int(raw) => raw as f32,
                ScalarRepr::Float(raw) => raw,
            };
            if raw.is_finite() {
                Ok(Decoded::Value(FieldValue::Float(raw)))
            } else {
                Err(malformed(format!("non-finite value {raw}")))
            }
        }
        FieldKind::Vector3 => {
            let x = entry.x.ok_or_else(|| missing("x"))?;
            let y = entry.y.ok_or_else(|| missing("y"))?;
            let z = entry.z.ok_or_else(|| missing("z"))?;
            let vector = Vec3::new(x, y, z);
            if [x, y, z].iter().all(|component| component.is_finite()) {
                Ok(Decoded::Value(FieldValue::Vector(vector)))
            } else {
                Err(malformed(format!("non-finite component in {vector}")))
            }
        }
    }
}
