//! Current/baseline snapshot of a subject's handling values.

use std::collections::HashMap;
use std::fmt;

use ahash::RandomState;
use handling_schema::{FieldSchema, FieldValue};

use crate::error::{EditError, PresetIssue};
use crate::tolerance::values_equal;
use crate::validation::range_violation;

/// Per-field difference between two value sets, or between current and
/// baseline of one set.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    /// `None` when the field only exists on the right-hand side.
    pub before: Option<FieldValue>,
    /// `None` when the field only exists on the left-hand side.
    pub after: Option<FieldValue>,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<FieldValue>| match value {
            Some(value) => value.to_string(),
            None => "-".to_string(),
        };
        write!(f, "{}: {} -> {}", self.field, show(&self.before), show(&self.after))
    }
}

/// Parallel `current` and `baseline` maps keyed by field name.
///
/// Both maps always hold the same keys and a field's current and baseline
/// values always share a kind.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    current: HashMap<String, FieldValue, RandomState>,
    baseline: HashMap<String, FieldValue, RandomState>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot where every field's baseline equals its current value.
    pub fn from_values<I, S>(schema: &FieldSchema, values: I) -> Result<Self, EditError>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        Self::from_parts(
            schema,
            values
                .into_iter()
                .map(|(name, value)| (name, value, value)),
        )
    }

    /// Build from `(name, baseline, current)` triples, rejecting the whole set
    /// if any entry is unknown, non-numeric, duplicated or of the wrong kind.
    pub fn from_parts<I, S>(schema: &FieldSchema, entries: I) -> Result<Self, EditError>
    where
        I: IntoIterator<Item = (S, FieldValue, FieldValue)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        let mut issues = Vec::new();
        for (name, baseline, current) in entries {
            let name = name.into();
            match entry_issue(schema, &name, &baseline, &current) {
                Some(issue) => issues.push(issue),
                None if set.contains(&name) => issues.push(PresetIssue::DuplicateEntry(name)),
                None => set.track(name, baseline, current),
            }
        }
        if issues.is_empty() {
            Ok(set)
        } else {
            Err(EditError::CorruptPreset { issues })
        }
    }

    pub(crate) fn track(&mut self, name: String, baseline: FieldValue, current: FieldValue) {
        self.baseline.insert(name.clone(), baseline);
        self.current.insert(name, current);
    }

    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.current.get(field).copied()
    }

    pub fn baseline_of(&self, field: &str) -> Option<FieldValue> {
        self.baseline.get(field).copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.current.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Field names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.current.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Overwrite a tracked field's current value, returning the old one.
    ///
    /// Only the kind is checked here; range checks belong to the engine.
    pub fn set_current(&mut self, field: &str, value: FieldValue) -> Result<FieldValue, EditError> {
        let slot = self
            .current
            .get_mut(field)
            .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
        if slot.kind() != value.kind() {
            return Err(EditError::InvalidValue {
                field: field.to_string(),
                expected: slot.kind(),
                found: value.kind().to_string(),
            });
        }
        Ok(std::mem::replace(slot, value))
    }

    /// True when any field's current value differs from its baseline.
    pub fn is_edited(&self) -> bool {
        self.current.iter().any(|(name, current)| {
            self.baseline
                .get(name)
                .map_or(true, |baseline| !values_equal(current, baseline))
        })
    }

    pub fn is_field_edited(&self, field: &str) -> bool {
        match (self.current.get(field), self.baseline.get(field)) {
            (Some(current), Some(baseline)) => !values_equal(current, baseline),
            _ => false,
        }
    }

    /// Names of edited fields in alphabetical order.
    pub fn edited_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .current
            .keys()
            .filter(|name| self.is_field_edited(name))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn reset(&mut self) {
        for (name, baseline) in &self.baseline {
            self.current.insert(name.clone(), *baseline);
        }
    }

    pub fn reset_field(&mut self, field: &str) -> Result<FieldValue, EditError> {
        let baseline = self
            .baseline_of(field)
            .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
        self.set_current(field, baseline)
    }

    pub fn adopt_current_as_baseline(&mut self) {
        self.baseline = self.current.clone();
    }

    /// Tolerance equality over `current` only; baselines are ignored.
    pub fn equals(&self, other: &ValueSet) -> bool {
        if self.current.len() != other.current.len() {
            return false;
        }
        self.current.iter().all(|(name, value)| {
            other
                .current
                .get(name)
                .is_some_and(|theirs| values_equal(value, theirs))
        })
    }

    /// Merge `other`'s current values into this set.
    ///
    /// With `shared_only` only fields already tracked here are touched.
    /// Otherwise new fields are inserted with `other`'s baseline. Fields whose
    /// kind differs are left alone.
    pub fn copy_fields_from(&mut self, other: &ValueSet, shared_only: bool) {
        for (name, value) in &other.current {
            match self.current.get_mut(name) {
                Some(slot) if slot.kind() == value.kind() => *slot = *value,
                Some(_) => {}
                None if shared_only => {}
                None => {
                    let baseline = other.baseline.get(name).copied().unwrap_or(*value);
                    self.track(name.clone(), baseline, *value);
                }
            }
        }
    }

    /// Current-value differences against `other`, alphabetically by field.
    pub fn diff(&self, other: &ValueSet) -> Vec<FieldDiff> {
        let mut names: Vec<&String> = self.current.keys().chain(other.current.keys()).collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .filter_map(|name| {
                let before = self.current.get(name).copied();
                let after = other.current.get(name).copied();
                let same = match (&before, &after) {
                    (Some(a), Some(b)) => values_equal(a, b),
                    _ => false,
                };
                (!same).then(|| FieldDiff {
                    field: name.clone(),
                    before,
                    after,
                })
            })
            .collect()
    }

    /// Fields whose current value differs from the baseline.
    pub fn baseline_diff(&self) -> Vec<FieldDiff> {
        self.edited_fields()
            .into_iter()
            .map(|name| FieldDiff {
                field: name.to_string(),
                before: self.baseline_of(name),
                after: self.get(name),
            })
            .collect()
    }

    /// Every reason this set could not be stored or applied against `schema`.
    ///
    /// Current values must sit inside the schema range; baselines come from
    /// the live object and are only kind-checked.
    pub fn check_against(&self, schema: &FieldSchema) -> Vec<PresetIssue> {
        let mut issues = Vec::new();
        for name in self.names() {
            let (Some(current), Some(baseline)) = (self.get(name), self.baseline_of(name)) else {
                continue;
            };
            if let Some(issue) = entry_issue(schema, name, &baseline, &current) {
                issues.push(issue);
                continue;
            }
            let bounds = schema.lookup(name).and_then(|descriptor| descriptor.bounds);
            if let Some(bounds) = bounds {
                if range_violation(&bounds, &current).is_some() {
                    issues.push(PresetIssue::OutOfRange {
                        field: name.to_string(),
                        value: current,
                        min: bounds.min(),
                        max: bounds.max(),
                    });
                }
            }
        }
        issues
    }

    /// `(name, current, baseline)` in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldValue, FieldValue)> + '_ {
        self.current.iter().filter_map(|(name, current)| {
            self.baseline
                .get(name)
                .map(|baseline| (name.as_str(), *current, *baseline))
        })
    }
}

fn entry_issue(
    schema: &FieldSchema,
    name: &str,
    baseline: &FieldValue,
    current: &FieldValue,
) -> Option<PresetIssue> {
    let Some(descriptor) = schema.lookup(name) else {
        return Some(PresetIssue::UnknownField(name.to_string()));
    };
    if !descriptor.is_numeric() {
        return Some(PresetIssue::NotNumeric(name.to_string()));
    }
    [current, baseline]
        .into_iter()
        .find(|value| value.kind() != descriptor.kind)
        .map(|value| PresetIssue::KindMismatch {
            field: name.to_string(),
            expected: descriptor.kind,
            found: value.kind(),
        })
}
