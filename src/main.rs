#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use signature_positions::constants::config::ENV_LOG_LEVEL;
use signature_positions::{
    Catalogue, FileSource, KeyRequest, PositionInput, PositionStore, StoreSettings,
};

#[derive(Debug, Parser)]
#[command(
    name = "signature-positions",
    version,
    about = "Manage signature placement for document templates"
)]
struct Cli {
    /// Catalogue file (overrides settings and environment)
    #[arg(long, global = true)]
    catalogue: Option<PathBuf>,

    /// Collection inside the catalogue holding the entries
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the position in effect for a template key, file name or form id
    Get { key_or_alias: String },

    /// Write a new position and read it back
    Update {
        /// Template key, file name or form id
        key_or_alias: Option<String>,
        /// Uploaded PDF name, used when no key is given
        #[arg(long)]
        file_name: Option<String>,
        /// Form identifier, used when neither key nor file name resolve
        #[arg(long)]
        form_id: Option<String>,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Defaults to 0.7
        #[arg(long)]
        opacity: Option<f64>,
    },

    /// Compare a direct parse of an entry with what reads return
    Verify { key: String },

    /// Print every entry in the catalogue
    List,

    /// Create the settings and catalogue files if they don't exist
    Init,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")?;
    println!("{json}");
    Ok(())
}

/// Write default settings and seed the catalogue, never overwriting either
fn init(settings: &StoreSettings, catalogue_path: &Path) -> Result<()> {
    let settings_path = StoreSettings::path();
    if settings_path.exists() {
        info!(path = %settings_path.display(), "Settings already exist, leaving them untouched");
    } else {
        settings.save_to(&settings_path)?;
    }

    let source = FileSource::new(catalogue_path);
    let created = source
        .create_if_missing(&Catalogue::builtin().render(&settings.collection))
        .with_context(|| format!("Failed to create catalogue at {}", catalogue_path.display()))?;
    println!(
        "{} {}",
        if created { "created" } else { "exists" },
        catalogue_path.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var(ENV_LOG_LEVEL)
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut settings = StoreSettings::load()?;
    if let Some(path) = cli.catalogue {
        settings.catalogue_path = Some(path);
    }
    if let Some(collection) = cli.collection {
        settings.collection = collection;
    }
    settings.validate_and_clamp();

    let catalogue_path = settings.catalogue_path();
    info!(path = %catalogue_path.display(), collection = %settings.collection, "Using catalogue");

    let open_store =
        || PositionStore::new(FileSource::new(&catalogue_path), settings.collection.clone());

    match cli.command {
        Command::Get { key_or_alias } => print_json(&open_store().get_position(&key_or_alias))?,
        Command::Update {
            key_or_alias,
            file_name,
            form_id,
            x,
            y,
            width,
            height,
            opacity,
        } => {
            let store = open_store();
            let input = PositionInput { x, y, width, height, opacity };
            let outcome = match key_or_alias.as_deref() {
                Some(key_or_alias) => store.update_position(key_or_alias, input)?,
                None => {
                    let request = KeyRequest {
                        template_key: None,
                        file_name: file_name.as_deref(),
                        form_id: form_id.as_deref(),
                    };
                    store.update_position_with(&request, input)?
                }
            };
            if !outcome.verified {
                warn!(
                    key = %outcome.resolved_key,
                    "Position was written but reads back differently"
                );
            }
            print_json(&outcome)?;
        }
        Command::Verify { key } => print_json(&open_store().verify_position(&key))?,
        Command::List => print_json(&open_store().list_positions()?)?,
        Command::Init => init(&settings, &catalogue_path)?,
    }

    Ok(())
}
