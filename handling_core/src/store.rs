//! Preset persistence.
//!
//! Stores report duplicate names, missing presets and refused writes as
//! `bool`/`Option`; the `*_required`/`save_new` helpers turn those into
//! [`EditError`]s.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use handling_schema::FieldSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::EditError;
use crate::preset_doc::{PresetDocument, PresetDocumentError};
use crate::value_set::ValueSet;

/// Key prefix for presets kept in a [`KeyValueStore`].
pub const PRESET_KEY_PREFIX: &str = "handling_preset_";

pub trait PresetStore {
    fn schema(&self) -> &FieldSchema;

    /// False on an empty or duplicate name, an invalid set, or a failed write.
    /// Only current values are kept; a loaded preset has baseline == current.
    fn save(&mut self, name: &str, values: &ValueSet) -> bool;

    fn delete(&mut self, name: &str) -> bool;

    /// `None` when the preset is missing or no longer loads cleanly.
    fn load(&self, name: &str) -> Option<ValueSet>;

    /// Sorted.
    fn list_names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.list_names().iter().any(|existing| existing == name)
    }

    fn load_required(&self, name: &str) -> Result<ValueSet, EditError> {
        self.load(name)
            .ok_or_else(|| EditError::NotFound(name.to_string()))
    }

    fn delete_required(&mut self, name: &str) -> Result<(), EditError> {
        if self.delete(name) {
            Ok(())
        } else {
            Err(EditError::NotFound(name.to_string()))
        }
    }

    fn save_new(&mut self, name: &str, values: &ValueSet) -> Result<(), EditError> {
        if self.contains(name) {
            return Err(EditError::DuplicateName(name.to_string()));
        }
        let issues = values.check_against(self.schema());
        if !issues.is_empty() {
            return Err(EditError::CorruptPreset { issues });
        }
        if self.save(name, values) {
            Ok(())
        } else {
            Err(EditError::Rejected(name.to_string()))
        }
    }
}

fn admissible(store: &dyn PresetStore, name: &str, values: &ValueSet) -> bool {
    if name.trim().is_empty() {
        warn!(target: "handling_editor::presets", reason = "empty_name", "preset.save_rejected");
        return false;
    }
    if store.contains(name) {
        warn!(
            target: "handling_editor::presets",
            preset = name,
            reason = "duplicate",
            "preset.save_rejected"
        );
        return false;
    }
    let issues = values.check_against(store.schema());
    if !issues.is_empty() {
        warn!(
            target: "handling_editor::presets",
            preset = name,
            issues = issues.len(),
            reason = "invalid",
            "preset.save_rejected"
        );
        return false;
    }
    true
}

#[derive(Debug, Clone)]
pub struct MemoryPresetStore {
    schema: Arc<FieldSchema>,
    presets: BTreeMap<String, ValueSet>,
}

impl MemoryPresetStore {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            schema,
            presets: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl PresetStore for MemoryPresetStore {
    fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    fn save(&mut self, name: &str, values: &ValueSet) -> bool {
        if !admissible(&*self, name, values) {
            return false;
        }
        let mut stored = values.clone();
        stored.adopt_current_as_baseline();
        self.presets.insert(name.to_string(), stored);
        info!(
            target: "handling_editor::presets",
            preset = name,
            fields = values.len(),
            "preset.saved"
        );
        true
    }

    fn delete(&mut self, name: &str) -> bool {
        let removed = self.presets.remove(name).is_some();
        if removed {
            info!(target: "handling_editor::presets", preset = name, "preset.deleted");
        }
        removed
    }

    fn load(&self, name: &str) -> Option<ValueSet> {
        self.presets.get(name).cloned()
    }

    fn list_names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }
}

#[derive(Debug, Error)]
pub enum KvpError {
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    #[error("key-value I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// String key-value persistence capability.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvpError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), KvpError>;
    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> Result<bool, KvpError>;
    /// Sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, KvpError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKvp {
    entries: BTreeMap<String, String>,
}

impl MemoryKvp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvp {
    fn get(&self, key: &str) -> Result<Option<String>, KvpError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvpError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, KvpError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, KvpError> {
        Ok(self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// One `<key>.json` file per key under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryKvp {
    root: PathBuf,
}

impl DirectoryKvp {
    const EXTENSION: &'static str = "json";

    pub fn open(root: impl Into<PathBuf>) -> Result<Self, KvpError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| KvpError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, KvpError> {
        let invalid = key.is_empty()
            || key.starts_with('.')
            || key.contains(|c: char| c == '/' || c == '\\' || c == ':');
        if invalid {
            return Err(KvpError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{}", Self::EXTENSION)))
    }
}

impl KeyValueStore for DirectoryKvp {
    fn get(&self, key: &str) -> Result<Option<String>, KvpError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(KvpError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvpError> {
        let path = self.path_for(key)?;
        fs::write(&path, value).map_err(|source| KvpError::Io { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<bool, KvpError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(KvpError::Io { path, source }),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, KvpError> {
        let io_err = |source| KvpError::Io {
            path: self.root.clone(),
            source,
        };
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if stem.starts_with(prefix) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Presets serialized as documents under `handling_preset_<name>` keys.
pub struct KvpPresetStore<S> {
    schema: Arc<FieldSchema>,
    kvp: S,
}

impl<S: KeyValueStore> KvpPresetStore<S> {
    pub fn new(schema: Arc<FieldSchema>, kvp: S) -> Self {
        Self { schema, kvp }
    }

    pub fn kvp(&self) -> &S {
        &self.kvp
    }

    pub fn into_inner(self) -> S {
        self.kvp
    }

    fn key(name: &str) -> String {
        format!("{PRESET_KEY_PREFIX}{name}")
    }

    /// The stored document, including any string entries.
    pub fn document(&self, name: &str) -> Option<PresetDocument> {
        let raw = match self.kvp.get(&Self::key(name)) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = name,
                    error = %err,
                    "preset.load_failed"
                );
                return None;
            }
        };
        match PresetDocument::from_json_str(&raw) {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = name,
                    error = %err,
                    "preset.load_failed"
                );
                None
            }
        }
    }

    /// Store an already-built document, keeping its string entries.
    pub fn save_document(&mut self, document: &PresetDocument) -> bool {
        let values = match document.into_value_set(&self.schema) {
            Ok(values) => values,
            Err(err) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = %document.name,
                    error = %err,
                    reason = "invalid",
                    "preset.save_rejected"
                );
                return false;
            }
        };
        if !admissible(&*self, &document.name, &values) {
            return false;
        }
        self.write(&document.name, document, values.len())
    }

    fn write(&mut self, name: &str, document: &PresetDocument, fields: usize) -> bool {
        let written = document
            .to_json_pretty()
            .map_err(|err| err.to_string())
            .and_then(|json| {
                self.kvp
                    .set(&Self::key(name), &json)
                    .map_err(|err| err.to_string())
            });
        match written {
            Ok(()) => {
                info!(target: "handling_editor::presets", preset = name, fields, "preset.saved");
                true
            }
            Err(error) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = name,
                    error = %error,
                    "preset.save_failed"
                );
                false
            }
        }
    }
}

impl<S: KeyValueStore> PresetStore for KvpPresetStore<S> {
    fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    fn save(&mut self, name: &str, values: &ValueSet) -> bool {
        if !admissible(&*self, name, values) {
            return false;
        }
        let document = PresetDocument::from_value_set(name, &self.schema, values);
        self.write(name, &document, values.len())
    }

    fn delete(&mut self, name: &str) -> bool {
        match self.kvp.remove(&Self::key(name)) {
            Ok(removed) => {
                if removed {
                    info!(target: "handling_editor::presets", preset = name, "preset.deleted");
                }
                removed
            }
            Err(err) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = name,
                    error = %err,
                    "preset.delete_failed"
                );
                false
            }
        }
    }

    fn load(&self, name: &str) -> Option<ValueSet> {
        let document = self.document(name)?;
        match document.into_value_set(&self.schema) {
            Ok(values) => Some(values),
            Err(err) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = name,
                    error = %err,
                    "preset.load_failed"
                );
                None
            }
        }
    }

    fn list_names(&self) -> Vec<String> {
        match self.kvp.keys_with_prefix(PRESET_KEY_PREFIX) {
            Ok(keys) => {
                let mut names: Vec<String> = keys
                    .iter()
                    .filter_map(|key| key.strip_prefix(PRESET_KEY_PREFIX))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                names.sort();
                names
            }
            Err(err) => {
                warn!(target: "handling_editor::presets", error = %err, "preset.list_failed");
                Vec::new()
            }
        }
    }

    fn contains(&self, name: &str) -> bool {
        matches!(self.kvp.get(&Self::key(name)), Ok(Some(_)))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    presets: Vec<JsonValue>,
}

/// Read-only presets shipped as one `{"presets": [...]}` document.
#[derive(Debug, Clone)]
pub struct CatalogPresetStore {
    schema: Arc<FieldSchema>,
    documents: BTreeMap<String, PresetDocument>,
}

impl CatalogPresetStore {
    /// Presets that are not documents at all are logged and skipped.
    pub fn from_json_str(
        schema: Arc<FieldSchema>,
        json: &str,
    ) -> Result<Self, PresetDocumentError> {
        let catalog: CatalogDocument = serde_json::from_str(json)?;
        let documents = catalog
            .presets
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value(raw) {
                Ok(document) => Some(document),
                Err(err) => {
                    warn!(
                        target: "handling_editor::presets",
                        index,
                        error = %err,
                        "catalog.preset_skipped"
                    );
                    None
                }
            });
        Ok(Self::from_documents(schema, documents))
    }

    /// Later documents with an already-seen name are skipped.
    pub fn from_documents(
        schema: Arc<FieldSchema>,
        documents: impl IntoIterator<Item = PresetDocument>,
    ) -> Self {
        let mut catalog = BTreeMap::new();
        for document in documents {
            if catalog.contains_key(&document.name) {
                warn!(
                    target: "handling_editor::presets",
                    preset = %document.name,
                    "catalog.duplicate_skipped"
                );
                continue;
            }
            catalog.insert(document.name.clone(), document);
        }
        info!(target: "handling_editor::presets", presets = catalog.len(), "catalog.loaded");
        Self {
            schema,
            documents: catalog,
        }
    }

    pub fn document(&self, name: &str) -> Option<&PresetDocument> {
        self.documents.get(name)
    }
}

impl PresetStore for CatalogPresetStore {
    fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    fn save(&mut self, name: &str, _values: &ValueSet) -> bool {
        warn!(
            target: "handling_editor::presets",
            preset = name,
            reason = "read_only",
            "preset.save_rejected"
        );
        false
    }

    fn delete(&mut self, _name: &str) -> bool {
        false
    }

    fn load(&self, name: &str) -> Option<ValueSet> {
        match self.documents.get(name)?.into_value_set(&self.schema) {
            Ok(values) => Some(values),
            Err(err) => {
                warn!(
                    target: "handling_editor::presets",
                    preset = name,
                    error = %err,
                    "preset.load_failed"
                );
                None
            }
        }
    }

    fn list_names(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }
}
