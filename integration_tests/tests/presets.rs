mod common;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use handling_core::{
    CatalogPresetStore, DirectoryKvp, EditError, KvpPresetStore, PresetDocument, PresetIssue,
    PresetStore,
};
use handling_schema::{FieldValue, Vec3};
use serde_json::json;

fn drift_document() -> Result<PresetDocument> {
    let path = common::fixture("presets/drift1.json");
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(PresetDocument::from_json_str(&raw)?)
}

#[test]
fn fixture_preset_survives_a_directory_round_trip() -> Result<()> {
    let schema = common::test_schema();
    let root = common::temp_test_dir();
    let mut store = KvpPresetStore::new(Arc::clone(&schema), DirectoryKvp::open(&root)?);

    let document = drift_document()?;
    assert!(store.save_document(&document));
    assert!(root.join("handling_preset_drift1.json").exists());

    let reopened = KvpPresetStore::new(Arc::clone(&schema), DirectoryKvp::open(&root)?);
    assert_eq!(reopened.list_names(), vec!["drift1"]);
    assert_eq!(reopened.document("drift1"), Some(document.clone()));

    let values = reopened.load_required("drift1")?;
    assert!(values.equals(&document.into_value_set(&schema)?));
    assert_eq!(values.get("nInitialDriveGears"), Some(FieldValue::Int(6)));
    assert_eq!(
        values.get("vecCentreOfMassOffset"),
        Some(FieldValue::Vector(Vec3::new(0.0, 0.1, -0.1)))
    );
    assert!(!values.contains("strModelFlags"));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn saving_twice_fails_until_the_first_copy_is_deleted() -> Result<()> {
    let schema = common::test_schema();
    let root = common::temp_test_dir();
    let mut store = KvpPresetStore::new(Arc::clone(&schema), DirectoryKvp::open(&root)?);
    let values = drift_document()?.into_value_set(&schema)?;

    store.save_new("drift1", &values)?;
    assert_eq!(
        store.save_new("drift1", &values),
        Err(EditError::DuplicateName("drift1".to_string()))
    );
    store.delete_required("drift1")?;
    store.save_new("drift1", &values)?;
    assert!(store.load("drift1").context("reloaded")?.equals(&values));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn hand_edited_preset_on_disk_is_reported_as_missing() -> Result<()> {
    let schema = common::test_schema();
    let root = common::temp_test_dir();
    let store = KvpPresetStore::new(Arc::clone(&schema), DirectoryKvp::open(&root)?);
    fs::write(
        root.join("handling_preset_broken.json"),
        r#"{"name":"broken","fields":[{"name":"fMass","value":99999.0}]}"#,
    )?;
    fs::write(root.join("notes.txt"), "ignored")?;

    assert_eq!(store.list_names(), vec!["broken"]);
    assert!(store.load("broken").is_none());
    assert_eq!(
        store.load_required("broken").err(),
        Some(EditError::NotFound("broken".to_string()))
    );

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn catalog_fixture_is_listed_and_read_only() -> Result<()> {
    let schema = common::test_schema();
    let raw = fs::read_to_string(common::fixture("catalog.json"))?;
    let mut catalog = CatalogPresetStore::from_json_str(Arc::clone(&schema), &raw)?;

    assert_eq!(catalog.list_names(), vec!["street", "track"]);
    let track = catalog.load_required("track")?;
    assert_eq!(track.get("fToeFront"), Some(FieldValue::Float(0.1)));

    let street = catalog.load_required("street")?;
    assert!(!catalog.save("copy", &street));
    assert!(!catalog.delete("street"));
    assert!(catalog.contains("street"));
    Ok(())
}

#[test]
fn catalog_survives_a_wrongly_typed_entry() -> Result<()> {
    let schema = common::test_schema();
    let catalog = json!({
        "presets": [
            { "name": "street", "fields": [{ "name": "fMass", "value": 1300.0 }] },
            {
                "name": "rally",
                "fields": [
                    { "name": "fMass", "value": 1150.0 },
                    { "name": "fToeFront", "value": "toe-in" }
                ]
            }
        ]
    });
    let catalog = CatalogPresetStore::from_json_str(Arc::clone(&schema), &catalog.to_string())?;

    assert_eq!(catalog.list_names(), vec!["rally", "street"]);
    assert_eq!(
        catalog.load_required("street")?.get("fMass"),
        Some(FieldValue::Float(1300.0))
    );
    assert!(matches!(
        catalog.load_required("rally"),
        Err(EditError::NotFound(ref name)) if name == "rally"
    ));

    let rally = catalog
        .document("rally")
        .context("rally document")?
        .import(&schema);
    assert_eq!(rally.values.get("fMass"), Some(FieldValue::Float(1150.0)));
    assert!(matches!(
        rally.issues.as_slice(),
        [PresetIssue::MalformedValue { field, .. }] if field == "fToeFront"
    ));
    Ok(())
}
