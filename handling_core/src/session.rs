//! Polling-loop driver owning the live subject → value set association.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use ahash::RandomState;
use handling_schema::FieldValue;
use tracing::info;

use crate::config::EditorConfig;
use crate::engine::{ApplyOutcome, Reconciler};
use crate::error::EditError;
use crate::feed::FieldChange;
use crate::store::PresetStore;
use crate::subject::Subject;
use crate::value_set::ValueSet;

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The subject went away and its value set was dropped.
    Discarded,
    Tracked(TickReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub newly_tracked: bool,
    pub pushed: Vec<FieldChange>,
    pub slot_writes: usize,
}

pub struct EditorSession<K> {
    reconciler: Reconciler,
    tracked: HashMap<K, ValueSet, RandomState>,
    poll_interval: Duration,
}

impl<K> EditorSession<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(reconciler: Reconciler, config: &EditorConfig) -> Self {
        Self {
            reconciler,
            tracked: HashMap::default(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    pub fn values(&self, key: &K) -> Option<&ValueSet> {
        self.tracked.get(key)
    }

    pub fn is_tracked(&self, key: &K) -> bool {
        self.tracked.contains_key(key)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn forget(&mut self, key: &K) -> Option<ValueSet> {
        let removed = self.tracked.remove(key);
        if removed.is_some() {
            info!(target: "handling_editor::session", subject = ?key, "subject.discarded");
        }
        removed
    }

    /// One polling step for one subject.
    pub fn tick(&mut self, key: &K, subject: &mut dyn Subject) -> Result<TickOutcome, EditError> {
        if !subject.is_valid() {
            self.forget(key);
            return Ok(TickOutcome::Discarded);
        }

        let newly_tracked = !self.tracked.contains_key(key);
        if newly_tracked {
            let values = self.reconciler.observe(subject);
            info!(
                target: "handling_editor::session",
                subject = ?key,
                fields = values.len(),
                edited = values.is_edited(),
                "subject.tracked"
            );
            self.tracked.insert(key.clone(), values);
        }

        let values = self
            .tracked
            .get(key)
            .ok_or(EditError::SubjectUnavailable)?;
        let pushed = self.reconciler.detect_and_push(values, subject)?;
        let slot_writes = self.reconciler.sync_annotations(values, subject)?;
        Ok(TickOutcome::Tracked(TickReport {
            newly_tracked,
            pushed,
            slot_writes,
        }))
    }

    pub fn set_field(
        &mut self,
        key: &K,
        field: &str,
        proposed: FieldValue,
        subject: &mut dyn Subject,
    ) -> Result<Option<FieldChange>, EditError> {
        let values = self
            .tracked
            .get_mut(key)
            .ok_or(EditError::SubjectUnavailable)?;
        self.reconciler.set_field(values, field, proposed, subject)
    }

    pub fn set_field_from_text(
        &mut self,
        key: &K,
        field: &str,
        text: &str,
        subject: &mut dyn Subject,
    ) -> Result<Option<FieldChange>, EditError> {
        let values = self
            .tracked
            .get_mut(key)
            .ok_or(EditError::SubjectUnavailable)?;
        self.reconciler
            .set_field_from_text(values, field, text, subject)
    }

    pub fn reset(
        &mut self,
        key: &K,
        subject: &mut dyn Subject,
    ) -> Result<Vec<FieldChange>, EditError> {
        let values = self
            .tracked
            .get_mut(key)
            .ok_or(EditError::SubjectUnavailable)?;
        self.reconciler.reset(values, subject)
    }

    pub fn apply_preset(
        &mut self,
        key: &K,
        preset: &ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<ApplyOutcome, EditError> {
        let values = self
            .tracked
            .get_mut(key)
            .ok_or(EditError::SubjectUnavailable)?;
        self.reconciler.apply_preset(values, preset, subject)
    }

    pub fn apply_preset_with(
        &mut self,
        key: &K,
        preset: &ValueSet,
        shared_only: bool,
        subject: &mut dyn Subject,
    ) -> Result<ApplyOutcome, EditError> {
        let values = self
            .tracked
            .get_mut(key)
            .ok_or(EditError::SubjectUnavailable)?;
        self.reconciler
            .apply_preset_with(values, preset, shared_only, subject)
    }

    /// Look up `name` in `store` and apply it to the subject.
    pub fn apply_stored_preset(
        &mut self,
        key: &K,
        store: &dyn PresetStore,
        name: &str,
        subject: &mut dyn Subject,
    ) -> Result<ApplyOutcome, EditError> {
        let preset = store.load_required(name)?;
        self.apply_preset(key, &preset, subject)
    }

    /// Save the subject's current values under a new preset name.
    pub fn save_current(
        &self,
        key: &K,
        store: &mut dyn PresetStore,
        name: &str,
    ) -> Result<(), EditError> {
        let values = self.tracked.get(key).ok_or(EditError::SubjectUnavailable)?;
        store.save_new(name, values)
    }
}
