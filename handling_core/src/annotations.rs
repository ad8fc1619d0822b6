//! Companion slot sync: each field keeps its override in `F` and its recorded
//! default in `F_def`, so other observers can tell edited fields apart without
//! this process's memory.
//!
//! Slots are created lazily and updated conditionally. A field whose current
//! value equals its baseline never acquires storage.

use handling_schema::{slot_pairs, slot_value_kind, FieldKind, FieldSchema, FieldValue, SlotPair};

use crate::subject::{SlotStore, SlotValue, Subject};
use crate::tolerance::within_epsilon;
use crate::value_set::ValueSet;

/// Bring every slot pair in line with `values`. Returns the number of slot
/// writes performed.
pub fn sync_annotations(
    schema: &FieldSchema,
    values: &ValueSet,
    slots: &mut dyn SlotStore,
) -> usize {
    let mut writes = 0;
    for descriptor in schema.numeric_fields() {
        let (Some(current), Some(baseline)) =
            (values.get(&descriptor.name), values.baseline_of(&descriptor.name))
        else {
            continue;
        };
        for pair in slot_pairs(descriptor) {
            let (Some(current), Some(baseline)) =
                (slot_scalar(&current, &pair), slot_scalar(&baseline, &pair))
            else {
                continue;
            };
            if sync_slot(slots, &pair.primary, current, baseline) {
                writes += 1;
            }
            if sync_slot(slots, &pair.default, baseline, current) {
                writes += 1;
            }
        }
    }
    if writes > 0 {
        tracing::debug!(
            target: "handling_editor::annotations",
            writes,
            "annotations.synced"
        );
    }
    writes
}

/// Write `value` into `slot` if the slot exists and differs, or if it does not
/// exist and `value` differs from `substitute`.
fn sync_slot(
    slots: &mut dyn SlotStore,
    slot: &str,
    value: SlotValue,
    substitute: SlotValue,
) -> bool {
    let needs_write = match slots.get(slot) {
        Some(stored) => !slot_values_equal(stored, value),
        None => !slot_values_equal(value, substitute),
    };
    if needs_write {
        slots.set(slot, value);
    }
    needs_write
}

fn slot_values_equal(a: SlotValue, b: SlotValue) -> bool {
    match (a, b) {
        (SlotValue::Int(a), SlotValue::Int(b)) => a == b,
        (SlotValue::Float(a), SlotValue::Float(b)) => within_epsilon(a, b),
        _ => false,
    }
}

fn slot_scalar(value: &FieldValue, pair: &SlotPair) -> Option<SlotValue> {
    match (value, pair.component) {
        (FieldValue::Int(value), None) => Some(SlotValue::Int(*value)),
        (FieldValue::Float(value), None) => Some(SlotValue::Float(*value)),
        (FieldValue::Vector(value), Some(axis)) => Some(SlotValue::Float(value.component(axis))),
        _ => None,
    }
}

/// Rebuild a subject's value set from its live values and slots.
///
/// A present `F_def` slot wins over the live value for the baseline and a
/// present `F` slot wins for the current value. Fields the subject does not
/// expose are left out. Slots of the wrong scalar kind are ignored.
pub fn observe_subject(schema: &FieldSchema, subject: &dyn Subject) -> ValueSet {
    let slots = subject.slots();
    let mut values = ValueSet::new();
    for descriptor in schema.numeric_fields() {
        let Some(live) = subject.read_field(descriptor) else {
            continue;
        };
        if live.kind() != descriptor.kind {
            tracing::warn!(
                target: "handling_editor::annotations",
                field = %descriptor.name,
                expected = %descriptor.kind,
                found = %live.kind(),
                "annotations.live_kind_mismatch"
            );
            continue;
        }
        let mut baseline = live;
        let mut current = live;
        for pair in slot_pairs(descriptor) {
            if let Some(stored) = read_slot(slots, &pair.default) {
                apply_slot(&mut baseline, &pair, stored);
            }
            if let Some(stored) = read_slot(slots, &pair.primary) {
                apply_slot(&mut current, &pair, stored);
            }
        }
        values.track(descriptor.name.clone(), baseline, current);
    }
    values
}

fn read_slot(slots: &dyn SlotStore, slot: &str) -> Option<SlotValue> {
    let stored = slots.get(slot)?;
    let expected = slot_value_kind(slot);
    let matches = matches!(
        (expected, stored),
        (FieldKind::Int32, SlotValue::Int(_)) | (FieldKind::Float32, SlotValue::Float(_))
    );
    if !matches {
        tracing::warn!(
            target: "handling_editor::annotations",
            slot,
            expected = %expected,
            "annotations.slot_kind_mismatch"
        );
        return None;
    }
    Some(stored)
}

fn apply_slot(value: &mut FieldValue, pair: &SlotPair, stored: SlotValue) {
    match (value, pair.component, stored) {
        (FieldValue::Int(value), None, SlotValue::Int(stored)) => *value = stored,
        (FieldValue::Float(value), None, SlotValue::Float(stored)) => *value = stored,
        (FieldValue::Vector(value), Some(axis), SlotValue::Float(stored)) => {
            value.set_component(axis, stored)
        }
        _ => {}
    }
}
