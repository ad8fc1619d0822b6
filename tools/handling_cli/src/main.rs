use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use handling_core::{
    load_editor_config_from_env, load_editor_config_or_builtin, DirectoryKvp, EditorConfig,
    EditorSession, KvpPresetStore, MemorySubject, PresetDocument, PresetStore, Reconciler,
    TickOutcome,
};
use handling_schema::{load_schema_from_env, load_schema_or_builtin, FieldSchema};
use serde_json::json;
use tracing::info;

const DEFAULT_PRESET_DIR: &str = "presets";

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect, validate and manage vehicle handling presets", long_about = None)]
struct Cli {
    /// Field schema JSON (defaults to HANDLING_SCHEMA_PATH or the builtin schema)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Editor config JSON (defaults to HANDLING_EDITOR_CONFIG_PATH or the builtin config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preset directory (defaults to the config's preset_directory, then ./presets)
    #[arg(long, global = true)]
    presets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List schema fields
    Fields {
        /// Include locked and string fields
        #[arg(long)]
        all: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a typed value against a field's kind and range
    Validate { field: String, value: String },
    /// List stored presets
    List,
    /// Print a stored preset document
    Show { name: String },
    /// Import a preset document into the store
    Import {
        file: PathBuf,
        /// Store under this name instead of the document's
        #[arg(long)]
        name: Option<String>,
    },
    /// Export a stored preset document
    Export {
        name: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a stored preset
    Delete { name: String },
    /// Show per-field differences between two stored presets
    Diff { left: String, right: String },
    /// Apply a stored preset to a vehicle snapshot and report what was pushed
    Apply {
        name: String,
        /// Preset-format document describing the vehicle's live values
        #[arg(long)]
        vehicle: PathBuf,
        /// Merge every preset field instead of only the ones the vehicle has
        #[arg(long)]
        all_fields: bool,
        /// Write the vehicle's resulting values here
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_editor_config_or_builtin(Some(path.as_path())).0,
        None => load_editor_config_from_env().0,
    };
    let schema_path = cli.schema.clone().or_else(|| config.schema_path.clone());
    let (schema, metadata) = match &schema_path {
        Some(path) => load_schema_or_builtin(Some(path.as_path())),
        None => load_schema_from_env(),
    };
    if !metadata.issues().is_empty() {
        eprintln!(
            "warning: {} schema field(s) skipped; set RUST_LOG=warn for details",
            metadata.issues().len()
        );
    }

    let preset_dir = cli
        .presets
        .clone()
        .or_else(|| config.preset_directory.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PRESET_DIR));
    run(cli.command, &schema, &config, &preset_dir)
}

fn open_store(schema: &Arc<FieldSchema>, dir: &Path) -> Result<KvpPresetStore<DirectoryKvp>> {
    let kvp = DirectoryKvp::open(dir)
        .with_context(|| format!("Unable to open preset directory {}", dir.display()))?;
    Ok(KvpPresetStore::new(Arc::clone(schema), kvp))
}

fn print_fields(schema: &FieldSchema, all: bool, as_json: bool) -> Result<()> {
    let fields: Vec<_> = schema
        .fields()
        .filter(|descriptor| all || descriptor.editable)
        .collect();
    if as_json {
        let rows: Vec<_> = fields
            .iter()
            .map(|descriptor| {
                json!({
                    "name": descriptor.name,
                    "class": descriptor.owner_class,
                    "kind": descriptor.kind.to_string(),
                    "editable": descriptor.editable,
                    "min": descriptor.min().map(|value| value.to_string()),
                    "max": descriptor.max().map(|value| value.to_string()),
                    "description": descriptor.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for descriptor in fields {
        let range = match (descriptor.min(), descriptor.max()) {
            (Some(min), Some(max)) => format!("[{min}, {max}]"),
            _ => "-".to_string(),
        };
        let lock = if descriptor.editable { "" } else { " (locked)" };
        println!(
            "{:<32} {:<8} {:<18} {range}{lock}",
            descriptor.name,
            descriptor.kind.to_string(),
            descriptor.owner_class
        );
    }
    Ok(())
}

fn validate(schema: &Arc<FieldSchema>, field: &str, text: &str) -> Result<()> {
    let reconciler = Reconciler::new(Arc::clone(schema));
    let value = reconciler
        .parse_input(field, text)
        .and_then(|value| reconciler.validate(field, value))?;
    println!("{field} = {value} ok");
    Ok(())
}

fn run(
    command: Command,
    schema: &Arc<FieldSchema>,
    config: &EditorConfig,
    preset_dir: &Path,
) -> Result<()> {
    let store = || open_store(schema, preset_dir);
    match command {
        Command::Fields { all, json } => print_fields(schema, all, json)?,
        Command::Validate { field, value } => validate(schema, &field, &value)?,
        Command::List => {
            for name in store()?.list_names() {
                println!("{name}");
            }
        }
        Command::Show { name } => {
            let document = stored_document(&store()?, &name)?;
            println!("{}", document.to_json_pretty()?);
        }
        Command::Import { file, name } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read preset at {}", file.display()))?;
            let mut document = PresetDocument::from_json_str(&raw)
                .with_context(|| format!("Failed to parse preset JSON at {}", file.display()))?;
            if let Some(name) = name {
                document.name = name;
            }
            document
                .into_value_set(schema)
                .with_context(|| format!("Preset '{}' is not valid", document.name))?;
            let mut store = store()?;
            if store.contains(&document.name) {
                bail!("Preset '{}' already exists", document.name);
            }
            if !store.save_document(&document) {
                bail!("Preset store refused '{}'", document.name);
            }
            println!("imported {}", document.name);
        }
        Command::Export { name, out } => {
            let json = stored_document(&store()?, &name)?.to_json_pretty()?;
            match out {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Delete { name } => {
            store()?.delete_required(&name)?;
            println!("deleted {name}");
        }
        Command::Diff { left, right } => {
            let store = store()?;
            let left_values = store.load_required(&left)?;
            let right_values = store.load_required(&right)?;
            let diffs = left_values.diff(&right_values);
            if diffs.is_empty() {
                println!("{left} and {right} are equal");
            }
            for diff in diffs {
                println!("{diff}");
            }
        }
        Command::Apply {
            name,
            vehicle,
            all_fields,
            out,
        } => apply(
            schema,
            config,
            &store()?,
            &name,
            &vehicle,
            all_fields,
            out.as_deref(),
        )?,
    }
    Ok(())
}

fn stored_document(
    store: &KvpPresetStore<DirectoryKvp>,
    name: &str,
) -> Result<PresetDocument> {
    store
        .document(name)
        .ok_or_else(|| anyhow!("Preset '{name}' not found"))
}

fn apply(
    schema: &Arc<FieldSchema>,
    config: &EditorConfig,
    store: &KvpPresetStore<DirectoryKvp>,
    name: &str,
    vehicle_path: &Path,
    all_fields: bool,
    out: Option<&Path>,
) -> Result<()> {
    let raw = fs::read_to_string(vehicle_path)
        .with_context(|| format!("Failed to read vehicle at {}", vehicle_path.display()))?;
    let document = PresetDocument::from_json_str(&raw)
        .with_context(|| format!("Failed to parse vehicle JSON at {}", vehicle_path.display()))?;
    let parsed = document.import(schema);
    if !parsed.issues.is_empty() {
        eprintln!(
            "warning: {} vehicle field(s) skipped",
            parsed.issues.len()
        );
    }
    let mut subject = MemorySubject::from_value_set(&parsed.values);

    let reconciler = Reconciler::with_config(Arc::clone(schema), config);
    let shared_only = config.merge_shared_only && !all_fields;
    let mut session: EditorSession<String> = EditorSession::new(reconciler, config);
    let key = document.name.clone();
    if session.tick(&key, &mut subject)? == TickOutcome::Discarded {
        bail!("Vehicle '{key}' is not available");
    }

    let preset = store.load_required(name)?;
    let outcome = session.apply_preset_with(&key, &preset, shared_only, &mut subject)?;

    info!(
        target: "handling_editor::cli",
        preset = name,
        vehicle = %key,
        changed = outcome.changed.len(),
        pushed = outcome.pushed.len(),
        "preset.applied"
    );
    if outcome.is_noop() {
        println!("{name} made no changes to {key}");
    }
    for change in outcome.changed.iter().chain(outcome.pushed.iter()) {
        println!("{change}");
    }
    println!("{} companion slot(s) on {key}", subject.memory_slots().len());

    if let Some(path) = out {
        let values = session
            .values(&key)
            .ok_or_else(|| anyhow!("Vehicle '{key}' is not tracked"))?;
        let mut result = PresetDocument::from_value_set(&key, schema, values);
        for (field, text) in parsed.texts {
            result = result.with_text(&field, text);
        }
        fs::write(path, result.to_json_pretty()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
