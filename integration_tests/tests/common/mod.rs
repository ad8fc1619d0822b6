#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::{SystemTime, UNIX_EPOCH};

use handling_schema::{load_schema_from_env, FieldSchema};

static INIT: Once = Once::new();
static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_schema() {
    INIT.call_once(|| {
        let schema_path = fixture("test_handling_schema.json");

        debug_assert!(
            schema_path.exists(),
            "missing test handling schema at {}",
            schema_path.display()
        );

        std::env::set_var("HANDLING_SCHEMA_PATH", &schema_path);
    });
}

pub fn test_schema() -> Arc<FieldSchema> {
    ensure_test_schema();
    let (schema, metadata) = load_schema_from_env();
    assert!(
        metadata.path().is_some(),
        "test schema should load from the fixture"
    );
    schema
}

pub fn temp_test_dir() -> PathBuf {
    let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "handling_integration_{}_{nonce}_{seq}",
        std::process::id()
    ))
}
