//! The live object being edited and the slot storage attached to it.

use std::collections::HashMap;

use ahash::RandomState;
use handling_schema::{FieldDescriptor, FieldValue};

use crate::value_set::ValueSet;

/// Scalar held in a persisted slot. Vector components are stored as floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotValue {
    Int(i32),
    Float(f32),
}

/// Per-subject persisted slots, visible to other observers of the subject.
pub trait SlotStore {
    fn get(&self, slot: &str) -> Option<SlotValue>;
    fn set(&mut self, slot: &str, value: SlotValue);
    fn remove(&mut self, slot: &str) -> bool;

    fn contains(&self, slot: &str) -> bool {
        self.get(slot).is_some()
    }
}

/// The simulated object whose handling is being edited.
///
/// `read_field` returns the value actually in effect ("ground truth"), which
/// other code may change at any time. Writers must check `is_valid` before
/// touching the subject.
pub trait Subject {
    fn is_valid(&self) -> bool;
    fn read_field(&self, field: &FieldDescriptor) -> Option<FieldValue>;
    fn write_field(&mut self, field: &FieldDescriptor, value: FieldValue);
    fn slots(&self) -> &dyn SlotStore;
    fn slots_mut(&mut self) -> &mut dyn SlotStore;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySlots {
    slots: HashMap<String, SlotValue, RandomState>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SlotStore for MemorySlots {
    fn get(&self, slot: &str) -> Option<SlotValue> {
        self.slots.get(slot).copied()
    }

    fn set(&mut self, slot: &str, value: SlotValue) {
        self.slots.insert(slot.to_string(), value);
    }

    fn remove(&mut self, slot: &str) -> bool {
        self.slots.remove(slot).is_some()
    }
}

/// Subject backed by plain maps, for hosts without a live object and for
/// offline tooling.
#[derive(Debug, Clone)]
pub struct MemorySubject {
    fields: HashMap<String, FieldValue, RandomState>,
    slots: MemorySlots,
    valid: bool,
    writes: usize,
}

impl Default for MemorySubject {
    fn default() -> Self {
        Self {
            fields: HashMap::default(),
            slots: MemorySlots::new(),
            valid: true,
            writes: 0,
        }
    }
}

impl MemorySubject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Subject whose live values are `values`' current values.
    pub fn from_value_set(values: &ValueSet) -> Self {
        let mut subject = Self::new();
        for (name, current, _) in values.iter() {
            subject.fields.insert(name.to_string(), current);
        }
        subject
    }

    pub fn live_value(&self, field: &str) -> Option<FieldValue> {
        self.fields.get(field).copied()
    }

    /// Change a live value behind the editor's back.
    pub fn overwrite_live(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn memory_slots(&self) -> &MemorySlots {
        &self.slots
    }

    pub fn memory_slots_mut(&mut self) -> &mut MemorySlots {
        &mut self.slots
    }
}

impl Subject for MemorySubject {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn read_field(&self, field: &FieldDescriptor) -> Option<FieldValue> {
        self.fields.get(&field.name).copied()
    }

    fn write_field(&mut self, field: &FieldDescriptor, value: FieldValue) {
        self.writes += 1;
        self.fields.insert(field.name.clone(), value);
    }

    fn slots(&self) -> &dyn SlotStore {
        &self.slots
    }

    fn slots_mut(&mut self) -> &mut dyn SlotStore {
        &mut self.slots
    }
}
