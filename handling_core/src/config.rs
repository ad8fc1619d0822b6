//! Editor configuration.
//!
//! Loaded from `editor_config.json` with support for environment variable overrides.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_EDITOR_CONFIG: &str = include_str!("data/editor_config.json");

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Cadence of the edit-detection pass. The host drives the timer.
    pub poll_interval_ms: u64,
    /// Default merge policy when applying a preset.
    pub merge_shared_only: bool,
    pub schema_path: Option<PathBuf>,
    pub preset_directory: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            merge_shared_only: true,
            schema_path: None,
            preset_directory: None,
        }
    }
}

impl EditorConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_EDITOR_CONFIG)
                .expect("builtin editor config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, EditorConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| EditorConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = EditorConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Error)]
pub enum EditorConfigError {
    #[error("failed to parse editor config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read editor config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct EditorConfigMetadata {
    path: Option<PathBuf>,
}

impl EditorConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Load the editor config from `HANDLING_EDITOR_CONFIG_PATH`, falling back to builtin.
pub fn load_editor_config_from_env() -> (Arc<EditorConfig>, EditorConfigMetadata) {
    let override_path = env::var("HANDLING_EDITOR_CONFIG_PATH")
        .ok()
        .map(PathBuf::from);
    load_editor_config_or_builtin(override_path.as_deref())
}

pub fn load_editor_config_or_builtin(
    path: Option<&Path>,
) -> (Arc<EditorConfig>, EditorConfigMetadata) {
    if let Some(path) = path {
        match EditorConfig::from_file(path) {
            Ok(config) => {
                tracing::info!(
                    target: "handling_editor::config",
                    path = %path.display(),
                    "editor_config.loaded=file"
                );
                return (
                    Arc::new(config),
                    EditorConfigMetadata::new(Some(path.to_path_buf())),
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "handling_editor::config",
                    path = %path.display(),
                    error = %err,
                    "editor_config.load_failed"
                );
            }
        }
    }

    let config = EditorConfig::builtin();
    tracing::info!(
        target: "handling_editor::config",
        "editor_config.loaded=builtin"
    );
    (config, EditorConfigMetadata::new(None))
}
