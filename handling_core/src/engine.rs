//! Reconciliation between a subject's value set, its live ground truth and
//! its persisted slots.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use handling_schema::{FieldSchema, FieldValue};
use tracing::{debug, info};

use crate::annotations::{observe_subject, sync_annotations};
use crate::config::EditorConfig;
use crate::error::EditError;
use crate::feed::{ChangeFeed, ChangeOrigin, FieldChange};
use crate::input::parse_field_input;
use crate::subject::Subject;
use crate::tolerance::values_equal;
use crate::validation::validate_edit;
use crate::value_set::ValueSet;

/// Result of merging a preset into a live value set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// Fields whose current value changed in the value set.
    pub changed: Vec<FieldChange>,
    /// Fields written to the subject afterwards.
    pub pushed: Vec<FieldChange>,
}

impl ApplyOutcome {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.pushed.is_empty()
    }
}

pub struct Reconciler {
    schema: Arc<FieldSchema>,
    feed: ChangeFeed,
    merge_shared_only: bool,
}

impl Reconciler {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            schema,
            feed: ChangeFeed::new(),
            merge_shared_only: true,
        }
    }

    pub fn with_config(schema: Arc<FieldSchema>, config: &EditorConfig) -> Self {
        Self {
            merge_shared_only: config.merge_shared_only,
            ..Self::new(schema)
        }
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn merge_shared_only(&self) -> bool {
        self.merge_shared_only
    }

    pub fn subscribe(&mut self) -> Receiver<FieldChange> {
        self.feed.subscribe()
    }

    /// Build a value set for a newly seen subject from its live values and slots.
    pub fn observe(&self, subject: &dyn Subject) -> ValueSet {
        observe_subject(&self.schema, subject)
    }

    pub fn validate(&self, field: &str, proposed: FieldValue) -> Result<FieldValue, EditError> {
        validate_edit(&self.schema, field, proposed)
    }

    pub fn parse_input(&self, field: &str, text: &str) -> Result<FieldValue, EditError> {
        parse_field_input(&self.schema, field, text)
    }

    /// Periodic pass: when `values` is edited, push every field whose current
    /// value differs from the subject's live value.
    pub fn detect_and_push(
        &mut self,
        values: &ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<Vec<FieldChange>, EditError> {
        if !values.is_edited() {
            return Ok(Vec::new());
        }
        self.push_to_ground_truth(values, subject)
    }

    /// Push every differing field to the subject regardless of edited state.
    pub fn push_to_ground_truth(
        &mut self,
        values: &ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<Vec<FieldChange>, EditError> {
        ensure_valid(subject)?;
        let mut pushed = Vec::new();
        for descriptor in self.schema.numeric_fields() {
            let Some(current) = values.get(&descriptor.name) else {
                continue;
            };
            let Some(live) = subject.read_field(descriptor) else {
                continue;
            };
            if values_equal(&live, &current) {
                continue;
            }
            subject.write_field(descriptor, current);
            info!(
                target: "handling_editor::engine",
                field = %descriptor.name,
                owner = %descriptor.owner_class,
                old = %live,
                new = %current,
                "field.pushed"
            );
            pushed.push(FieldChange {
                field: descriptor.name.clone(),
                origin: ChangeOrigin::GroundTruth,
                old: live,
                new: current,
            });
        }
        self.feed.publish(&pushed);
        Ok(pushed)
    }

    /// Resync the subject's companion slots with `values`.
    pub fn sync_annotations(
        &self,
        values: &ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<usize, EditError> {
        ensure_valid(subject)?;
        Ok(sync_annotations(&self.schema, values, subject.slots_mut()))
    }

    /// Validate and apply a single edit, then push it and resync slots.
    ///
    /// Returns `None` when the new value equals the old one within tolerance.
    pub fn set_field(
        &mut self,
        values: &mut ValueSet,
        field: &str,
        proposed: FieldValue,
        subject: &mut dyn Subject,
    ) -> Result<Option<FieldChange>, EditError> {
        let value = self.validate(field, proposed)?;
        if !values.contains(field) {
            return Err(EditError::UnknownField(field.to_string()));
        }
        ensure_valid(subject)?;

        let old = values.set_current(field, value)?;
        self.push_to_ground_truth(values, subject)?;
        self.sync_annotations(values, subject)?;

        if values_equal(&old, &value) {
            return Ok(None);
        }
        let change = FieldChange {
            field: field.to_string(),
            origin: ChangeOrigin::Edit,
            old,
            new: value,
        };
        debug!(target: "handling_editor::engine", change = %change, "field.edited");
        self.feed.publish(std::slice::from_ref(&change));
        Ok(Some(change))
    }

    /// Parse user text for `field` and apply it as an edit.
    pub fn set_field_from_text(
        &mut self,
        values: &mut ValueSet,
        field: &str,
        text: &str,
        subject: &mut dyn Subject,
    ) -> Result<Option<FieldChange>, EditError> {
        let proposed = self.parse_input(field, text)?;
        self.set_field(values, field, proposed, subject)
    }

    /// Revert every field to its baseline and push the result.
    pub fn reset(
        &mut self,
        values: &mut ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<Vec<FieldChange>, EditError> {
        ensure_valid(subject)?;
        let reverted: Vec<FieldChange> = values
            .baseline_diff()
            .into_iter()
            .filter_map(|diff| {
                Some(FieldChange {
                    field: diff.field,
                    origin: ChangeOrigin::Reset,
                    old: diff.after?,
                    new: diff.before?,
                })
            })
            .collect();
        values.reset();
        self.push_to_ground_truth(values, subject)?;
        self.sync_annotations(values, subject)?;
        if !reverted.is_empty() {
            info!(
                target: "handling_editor::engine",
                fields = reverted.len(),
                "values.reset"
            );
        }
        self.feed.publish(&reverted);
        Ok(reverted)
    }

    /// Revert one field to its baseline.
    pub fn reset_field(
        &mut self,
        values: &mut ValueSet,
        field: &str,
        subject: &mut dyn Subject,
    ) -> Result<Option<FieldChange>, EditError> {
        let baseline = values
            .baseline_of(field)
            .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
        ensure_valid(subject)?;
        let old = values.reset_field(field)?;
        self.push_to_ground_truth(values, subject)?;
        self.sync_annotations(values, subject)?;
        if values_equal(&old, &baseline) {
            return Ok(None);
        }
        let change = FieldChange {
            field: field.to_string(),
            origin: ChangeOrigin::Reset,
            old,
            new: baseline,
        };
        self.feed.publish(std::slice::from_ref(&change));
        Ok(Some(change))
    }

    /// Make the current values the new baseline and resync slots.
    pub fn adopt_baseline(
        &mut self,
        values: &mut ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<(), EditError> {
        ensure_valid(subject)?;
        values.adopt_current_as_baseline();
        self.sync_annotations(values, subject)?;
        Ok(())
    }

    /// Merge a preset using the configured policy.
    pub fn apply_preset(
        &mut self,
        values: &mut ValueSet,
        preset: &ValueSet,
        subject: &mut dyn Subject,
    ) -> Result<ApplyOutcome, EditError> {
        let shared_only = self.merge_shared_only;
        self.apply_preset_with(values, preset, shared_only, subject)
    }

    /// Merge a preset into `values` and propagate it.
    ///
    /// The preset is checked in full first. A corrupt preset or a vanished
    /// subject leaves `values` untouched.
    pub fn apply_preset_with(
        &mut self,
        values: &mut ValueSet,
        preset: &ValueSet,
        shared_only: bool,
        subject: &mut dyn Subject,
    ) -> Result<ApplyOutcome, EditError> {
        let issues = preset.check_against(&self.schema);
        if !issues.is_empty() {
            for issue in &issues {
                tracing::warn!(
                    target: "handling_editor::engine",
                    issue = %issue,
                    "preset.rejected_field"
                );
            }
            return Err(EditError::CorruptPreset { issues });
        }
        ensure_valid(subject)?;

        let before = values.clone();
        values.copy_fields_from(preset, shared_only);

        let mut changed: Vec<FieldChange> = before
            .diff(values)
            .into_iter()
            .filter_map(|diff| {
                Some(FieldChange {
                    field: diff.field,
                    origin: ChangeOrigin::Preset,
                    old: diff.before.or(diff.after)?,
                    new: diff.after?,
                })
            })
            .collect();
        self.order_by_schema(&mut changed);

        let pushed = self.push_to_ground_truth(values, subject)?;
        self.sync_annotations(values, subject)?;

        if !values.equals(&before) {
            info!(
                target: "handling_editor::engine",
                changed = changed.len(),
                pushed = pushed.len(),
                shared_only,
                "preset.applied"
            );
            self.feed.publish(&changed);
        }
        Ok(ApplyOutcome { changed, pushed })
    }

    fn order_by_schema(&self, changes: &mut [FieldChange]) {
        changes.sort_by_key(|change| self.schema.position(&change.field).unwrap_or(usize::MAX));
    }
}

fn ensure_valid(subject: &dyn Subject) -> Result<(), EditError> {
    if subject.is_valid() {
        Ok(())
    } else {
        Err(EditError::SubjectUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::{MemorySubject, SlotValue};
    use handling_schema::{FieldDescriptor, Vec3};

    fn schema() -> Arc<FieldSchema> {
        Arc::new(
            FieldSchema::try_new(vec![
                FieldDescriptor::float("fMass", "CHandlingData", 500.0, 2500.0),
                FieldDescriptor::float("fBrakeForce", "CHandlingData", 0.0, 10.0),
                FieldDescriptor::int("nInitialDriveGears", "CHandlingData", 1, 8),
                FieldDescriptor::vector(
                    "vecCentreOfMassOffset",
                    "CHandlingData",
                    Vec3::new(-1.0, -1.0, -1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                ),
            ])
            .expect("schema"),
        )
    }

    fn subject() -> MemorySubject {
        MemorySubject::new()
            .with_field("fMass", FieldValue::Float(1200.0))
            .with_field("fBrakeForce", FieldValue::Float(0.8))
            .with_field("nInitialDriveGears", FieldValue::Int(5))
            .with_field(
                "vecCentreOfMassOffset",
                FieldValue::Vector(Vec3::new(0.0, 0.0, -0.1)),
            )
    }

    #[test]
    fn unedited_values_push_nothing() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let values = engine.observe(&subject);
        subject.overwrite_live("fMass", FieldValue::Float(1300.0));

        let pushed = engine.detect_and_push(&values, &mut subject).expect("pass");
        assert!(pushed.is_empty());
        assert_eq!(subject.write_count(), 0);
    }

    #[test]
    fn edited_values_push_only_differing_fields() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        values
            .set_current("fMass", FieldValue::Float(1450.5))
            .expect("set");

        let pushed = engine.detect_and_push(&values, &mut subject).expect("pass");
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].old, FieldValue::Float(1200.0));
        assert_eq!(subject.live_value("fMass"), Some(FieldValue::Float(1450.5)));

        // second pass finds ground truth already in line
        let again = engine.detect_and_push(&values, &mut subject).expect("pass");
        assert!(again.is_empty());
        assert_eq!(subject.write_count(), 1);

        // out-of-band change gets corrected
        subject.overwrite_live("fMass", FieldValue::Float(900.0));
        let corrected = engine.detect_and_push(&values, &mut subject).expect("pass");
        assert_eq!(corrected.len(), 1);
        assert_eq!(subject.live_value("fMass"), Some(FieldValue::Float(1450.5)));
    }

    #[test]
    fn set_field_validates_before_mutating() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);

        let err = engine
            .set_field(&mut values, "fMass", FieldValue::Float(2600.0), &mut subject)
            .unwrap_err();
        assert!(matches!(err, EditError::OutOfRange { .. }));
        assert!(!values.is_edited());
        assert_eq!(subject.write_count(), 0);

        let change = engine
            .set_field(&mut values, "fMass", FieldValue::Float(2500.0), &mut subject)
            .expect("edit")
            .expect("changed");
        assert_eq!(change.origin, ChangeOrigin::Edit);
        assert_eq!(subject.live_value("fMass"), Some(FieldValue::Float(2500.0)));
        assert_eq!(subject.slots().get("fMass"), Some(SlotValue::Float(2500.0)));
        assert_eq!(
            subject.slots().get("fMass_def"),
            Some(SlotValue::Float(1200.0))
        );
    }

    #[test]
    fn set_field_from_text_parses_then_validates() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        engine
            .set_field_from_text(
                &mut values,
                "vecCentreOfMassOffset",
                "0.0 0.2 -0.1",
                &mut subject,
            )
            .expect("edit");
        assert_eq!(
            values.get("vecCentreOfMassOffset"),
            Some(FieldValue::Vector(Vec3::new(0.0, 0.2, -0.1)))
        );
        assert!(matches!(
            engine.set_field_from_text(&mut values, "nInitialDriveGears", "six", &mut subject),
            Err(EditError::InvalidValue { .. })
        ));
    }

    #[test]
    fn reset_pushes_baseline_back() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        engine
            .set_field(&mut values, "fBrakeForce", FieldValue::Float(2.0), &mut subject)
            .expect("edit");

        let reverted = engine.reset(&mut values, &mut subject).expect("reset");
        assert_eq!(reverted.len(), 1);
        assert_eq!(reverted[0].new, FieldValue::Float(0.8));
        assert!(!values.is_edited());
        assert_eq!(subject.live_value("fBrakeForce"), Some(FieldValue::Float(0.8)));
    }

    #[test]
    fn reset_field_reverts_only_that_field() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        engine
            .set_field(&mut values, "fBrakeForce", FieldValue::Float(2.0), &mut subject)
            .expect("edit");
        engine
            .set_field(&mut values, "nInitialDriveGears", FieldValue::Int(6), &mut subject)
            .expect("edit");

        let change = engine
            .reset_field(&mut values, "fBrakeForce", &mut subject)
            .expect("reset")
            .expect("changed");
        assert_eq!(change.new, FieldValue::Float(0.8));
        assert_eq!(values.edited_fields(), vec!["nInitialDriveGears"]);
    }

    #[test]
    fn adopt_baseline_clears_edited_state() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        engine
            .set_field(&mut values, "fMass", FieldValue::Float(1500.0), &mut subject)
            .expect("edit");
        engine
            .adopt_baseline(&mut values, &mut subject)
            .expect("adopt");
        assert!(!values.is_edited());
        assert_eq!(
            subject.slots().get("fMass_def"),
            Some(SlotValue::Float(1500.0))
        );
    }

    #[test]
    fn corrupt_preset_leaves_values_untouched() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        let mut preset = ValueSet::from_values(
            engine.schema(),
            [
                ("fMass", FieldValue::Float(1800.0)),
                ("fBrakeForce", FieldValue::Float(1.0)),
            ],
        )
        .expect("preset");
        preset
            .set_current("fBrakeForce", FieldValue::Float(99.0))
            .expect("set");

        let err = engine
            .apply_preset(&mut values, &preset, &mut subject)
            .unwrap_err();
        assert!(matches!(err, EditError::CorruptPreset { ref issues } if issues.len() == 1));
        assert!(!values.is_edited());
        assert_eq!(subject.write_count(), 0);
    }

    #[test]
    fn vanished_subject_aborts_before_any_write() {
        let mut engine = Reconciler::new(schema());
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        let preset =
            ValueSet::from_values(engine.schema(), [("fMass", FieldValue::Float(1800.0))])
                .expect("preset");
        subject.invalidate();

        assert_eq!(
            engine.apply_preset(&mut values, &preset, &mut subject),
            Err(EditError::SubjectUnavailable)
        );
        assert_eq!(values.get("fMass"), Some(FieldValue::Float(1200.0)));
        assert_eq!(
            engine.set_field(&mut values, "fMass", FieldValue::Float(1300.0), &mut subject),
            Err(EditError::SubjectUnavailable)
        );
        assert_eq!(values.get("fMass"), Some(FieldValue::Float(1200.0)));
    }

    #[test]
    fn identical_preset_publishes_nothing() {
        let mut engine = Reconciler::new(schema());
        let feed = engine.subscribe();
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        let preset =
            ValueSet::from_values(engine.schema(), [("fMass", FieldValue::Float(1200.0004))])
                .expect("preset");

        let outcome = engine
            .apply_preset(&mut values, &preset, &mut subject)
            .expect("apply");
        assert!(outcome.is_noop());
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn applied_preset_is_published_in_schema_order() {
        let mut engine = Reconciler::new(schema());
        let feed = engine.subscribe();
        let mut subject = subject();
        let mut values = engine.observe(&subject);
        let preset = ValueSet::from_values(
            engine.schema(),
            [
                ("nInitialDriveGears", FieldValue::Int(6)),
                ("fMass", FieldValue::Float(1800.0)),
            ],
        )
        .expect("preset");

        let outcome = engine
            .apply_preset(&mut values, &preset, &mut subject)
            .expect("apply");
        let fields: Vec<_> = outcome.changed.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["fMass", "nInitialDriveGears"]);
        assert_eq!(outcome.pushed.len(), 2);

        let received: Vec<FieldChange> = feed.try_iter().collect();
        let origins: Vec<_> = received.iter().map(|c| c.origin).collect();
        assert_eq!(
            origins,
            vec![
                ChangeOrigin::GroundTruth,
                ChangeOrigin::GroundTruth,
                ChangeOrigin::Preset,
                ChangeOrigin::Preset
            ]
        );
    }
}
