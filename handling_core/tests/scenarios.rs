use std::sync::Arc;

use handling_core::{
    Bound, ChangeOrigin, EditError, EditorConfig, EditorSession, KvpPresetStore, MemoryKvp,
    MemorySubject, PresetDocument, PresetStore, Reconciler, SlotStore, SlotValue, TickOutcome,
    ValueSet,
};
use handling_schema::{FieldDescriptor, FieldSchema, FieldValue, Vec3};

fn schema() -> Arc<FieldSchema> {
    Arc::new(
        FieldSchema::try_new(vec![
            FieldDescriptor::float("fMass", "CHandlingData", 500.0, 2500.0),
            FieldDescriptor::float("fBrakeForce", "CHandlingData", 0.0, 10.0),
            FieldDescriptor::float("fTractionCurveMax", "CHandlingData", 0.0, 10.0),
            FieldDescriptor::float("fSuspensionForce", "CHandlingData", 0.0, 10.0),
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

fn vehicle() -> MemorySubject {
    MemorySubject::new()
        .with_field("fMass", FieldValue::Float(1200.0))
        .with_field("fBrakeForce", FieldValue::Float(0.8))
        .with_field("fTractionCurveMax", FieldValue::Float(2.4))
        .with_field("fSuspensionForce", FieldValue::Float(2.1))
        .with_field("nInitialDriveGears", FieldValue::Int(5))
        .with_field(
            "vecCentreOfMassOffset",
            FieldValue::Vector(Vec3::new(0.0, 0.0, 0.0)),
        )
}

#[test]
fn mass_edit_walks_through_the_range() {
    let mut reconciler = Reconciler::new(schema());
    let mut car = vehicle();
    let mut values = reconciler.observe(&car);
    assert!(!values.is_edited());

    reconciler
        .set_field(&mut values, "fMass", FieldValue::Float(1450.5), &mut car)
        .expect("in range");
    assert!(values.is_edited());
    assert_eq!(values.edited_fields(), vec!["fMass"]);

    let rejected = reconciler.set_field(&mut values, "fMass", FieldValue::Float(2600.0), &mut car);
    match rejected {
        Err(EditError::OutOfRange {
            min, max, violated, ..
        }) => {
            assert_eq!(min, FieldValue::Float(500.0));
            assert_eq!(max, FieldValue::Float(2500.0));
            assert_eq!(violated.bound, Bound::Max);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
    assert_eq!(values.get("fMass"), Some(FieldValue::Float(1450.5)));

    reconciler
        .set_field(&mut values, "fMass", FieldValue::Float(2500.0), &mut car)
        .expect("upper bound is inclusive");
    assert_eq!(car.live_value("fMass"), Some(FieldValue::Float(2500.0)));

    reconciler.reset(&mut values, &mut car).expect("reset");
    assert!(!values.is_edited());
    assert_eq!(car.live_value("fMass"), Some(FieldValue::Float(1200.0)));
    assert_eq!(
        car.memory_slots().get("fMass"),
        Some(SlotValue::Float(1200.0))
    );
}

#[test]
fn drift_preset_save_duplicate_delete_resave() {
    let schema = schema();
    let mut store = KvpPresetStore::new(Arc::clone(&schema), MemoryKvp::new());
    let values = ValueSet::from_values(
        &schema,
        [
            ("fMass", FieldValue::Float(1450.5)),
            ("fTractionCurveMax", FieldValue::Float(1.9)),
        ],
    )
    .expect("values");

    assert!(store.save("drift1", &values));
    assert!(!store.save("drift1", &values));
    assert!(store.delete("drift1"));
    assert!(store.save("drift1", &values));
    assert!(store.load("drift1").expect("stored").equals(&values));
}

#[test]
fn shared_only_apply_touches_only_preset_fields() {
    let schema = schema();
    let mut reconciler = Reconciler::new(Arc::clone(&schema));
    let feed = reconciler.subscribe();
    let mut car = vehicle();
    let mut values = reconciler.observe(&car);
    let preset = ValueSet::from_values(
        &schema,
        [
            ("fMass", FieldValue::Float(1800.0)),
            ("fBrakeForce", FieldValue::Float(1.2)),
        ],
    )
    .expect("preset");

    let outcome = reconciler
        .apply_preset_with(&mut values, &preset, true, &mut car)
        .expect("apply");

    assert_eq!(values.len(), 6);
    assert_eq!(values.edited_fields(), vec!["fBrakeForce", "fMass"]);
    let changed: Vec<&str> = outcome.changed.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(changed, vec!["fMass", "fBrakeForce"]);
    assert_eq!(outcome.pushed.len(), 2);
    assert_eq!(car.live_value("fTractionCurveMax"), Some(FieldValue::Float(2.4)));

    let origins: Vec<ChangeOrigin> = feed.try_iter().map(|change| change.origin).collect();
    assert!(origins.contains(&ChangeOrigin::GroundTruth));
    assert!(origins.contains(&ChangeOrigin::Preset));

    let again = reconciler
        .apply_preset_with(&mut values, &preset, true, &mut car)
        .expect("reapply");
    assert!(again.is_noop());
    assert_eq!(feed.try_iter().count(), 0);
}

#[test]
fn untouched_fields_never_acquire_slots_and_edited_ones_come_in_pairs() {
    let mut reconciler = Reconciler::new(schema());
    let mut car = vehicle();
    let mut values = reconciler.observe(&car);

    reconciler
        .set_field(
            &mut values,
            "vecCentreOfMassOffset",
            FieldValue::Vector(Vec3::new(0.0, 0.2, 0.0)),
            &mut car,
        )
        .expect("edit");

    assert_eq!(
        car.memory_slots().names(),
        vec!["vecCentreOfMassOffset_y", "vecCentreOfMassOffset_y_def"]
    );
    assert_eq!(
        car.memory_slots().get("vecCentreOfMassOffset_y_def"),
        Some(SlotValue::Float(0.0))
    );
}

#[test]
fn corrupt_preset_and_vanished_subject_leave_values_untouched() {
    let schema = schema();
    let mut reconciler = Reconciler::new(Arc::clone(&schema));
    let mut car = vehicle();
    let mut values = reconciler.observe(&car);
    let snapshot = values.clone();

    let document = PresetDocument::from_json_str(
        r#"{"name":"bad","fields":[{"name":"fMass","value":1800.0},{"name":"fGhost","value":1.0}]}"#,
    )
    .expect("parse");
    assert!(matches!(
        document.into_value_set(&schema),
        Err(EditError::CorruptPreset { .. })
    ));

    let good = ValueSet::from_values(&schema, [("fMass", FieldValue::Float(1800.0))])
        .expect("preset");
    car.invalidate();
    assert_eq!(
        reconciler.apply_preset(&mut values, &good, &mut car),
        Err(EditError::SubjectUnavailable)
    );
    assert!(values.equals(&snapshot));
    assert_eq!(car.write_count(), 0);
}

#[test]
fn session_restores_edits_after_the_subject_is_seen_again() {
    let config = EditorConfig::default();
    let schema = schema();
    let mut session: EditorSession<&str> =
        EditorSession::new(Reconciler::with_config(schema, &config), &config);
    let mut car = vehicle();

    session.tick(&"car", &mut car).expect("tick");
    session
        .set_field_from_text(&"car", "nInitialDriveGears", "6", &mut car)
        .expect("edit");
    session.forget(&"car");

    match session.tick(&"car", &mut car).expect("tick") {
        TickOutcome::Tracked(report) => {
            assert!(report.newly_tracked);
            assert!(report.pushed.is_empty());
        }
        TickOutcome::Discarded => panic!("subject is still valid"),
    }
    let values = session.values(&"car").expect("tracked");
    assert_eq!(values.get("nInitialDriveGears"), Some(FieldValue::Int(6)));
    assert_eq!(values.baseline_of("nInitialDriveGears"), Some(FieldValue::Int(5)));
}
