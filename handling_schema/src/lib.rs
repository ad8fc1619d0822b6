//! Data contracts for the handling editor.
//!
//! Field kinds and values, field descriptors, the schema table and its loader,
//! and the companion slot naming convention. Everything here is immutable once
//! loaded and is shared by `Arc` with the reconciliation engine in
//! `handling_core`.

mod descriptor;
mod schema;
mod slots;
mod value;

pub use descriptor::{FieldBounds, FieldDescriptor};
pub use schema::{
    load_schema_from_env, load_schema_or_builtin, FieldSchema, LoadedSchema, SchemaError,
    SchemaIssue, SchemaMetadata, BUILTIN_HANDLING_SCHEMA,
};
pub use slots::{slot_pairs, slot_value_kind, SlotPair};
pub use value::{kind_for_name, Axis, FieldKind, FieldValue, Vec3};
