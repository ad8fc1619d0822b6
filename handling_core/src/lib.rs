//! Reconciliation engine for vehicle handling edits.
//!
//! Tracks the live handling values of a subject against their remembered
//! baseline, validates proposed edits against the shared
//! [`handling_schema::FieldSchema`], merges presets, pushes differences back
//! into the subject and keeps its companion slots in sync. The host drives
//! the polling cadence through [`EditorSession::tick`].

mod annotations;
mod config;
mod engine;
mod error;
mod feed;
mod input;
mod preset_doc;
mod session;
mod store;
mod subject;
pub mod tolerance;
mod validation;
mod value_set;

pub use annotations::{observe_subject, sync_annotations};
pub use config::{
    load_editor_config_from_env, load_editor_config_or_builtin, EditorConfig, EditorConfigError,
    EditorConfigMetadata, BUILTIN_EDITOR_CONFIG,
};
pub use engine::{ApplyOutcome, Reconciler};
pub use error::{Bound, BoundViolation, EditError, PresetIssue};
pub use feed::{ChangeFeed, ChangeOrigin, FieldChange};
pub use input::parse_field_input;
pub use preset_doc::{ParsedPreset, PresetDocument, PresetDocumentError, PresetEntry, ScalarRepr};
pub use session::{EditorSession, TickOutcome, TickReport};
pub use store::{
    CatalogPresetStore, DirectoryKvp, KeyValueStore, KvpError, KvpPresetStore, MemoryKvp,
    MemoryPresetStore, PresetStore, PRESET_KEY_PREFIX,
};
pub use subject::{MemorySlots, MemorySubject, SlotStore, SlotValue, Subject};
pub use validation::validate_edit;
pub use value_set::{FieldDiff, ValueSet};
