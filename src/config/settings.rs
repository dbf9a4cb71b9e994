//! Store settings
//!
//! Small JSON file under the platform config directory. Environment variables
//! override it, and command-line flags override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::catalogue::COLLECTION_NAME;
use crate::constants::config::{
    APP_DIR, CATALOGUE_FILENAME, ENV_CATALOGUE, ENV_COLLECTION, FILENAME,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Catalogue file; defaults to a file next to the settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalogue_path: Option<PathBuf>,

    /// Name of the collection holding the entries
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    COLLECTION_NAME.to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            catalogue_path: None,
            collection: default_collection(),
        }
    }
}

impl StoreSettings {
    pub fn config_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path
    }

    pub fn path() -> PathBuf {
        Self::config_dir().join(FILENAME)
    }

    /// Settings from the default location with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::path())?;
        settings.apply_overrides(|name| env::var(name).ok());
        settings.validate_and_clamp();
        Ok(settings)
    }

    /// Settings from `path`; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let settings: StoreSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))?;

        info!(path = %path.display(), collection = %settings.collection, "Loaded settings");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_CATALOGUE) {
            self.catalogue_path = Some(PathBuf::from(path));
        }
        if let Some(collection) = lookup(ENV_COLLECTION) {
            self.collection = collection;
        }
    }

    /// Replace values the store can't work with
    pub fn validate_and_clamp(&mut self) {
        let collection = self.collection.trim();
        let usable = !collection.is_empty()
            && !collection
                .contains(|c: char| c.is_whitespace() || matches!(c, '"' | '{' | '}' | ':' | '='));
        if !usable {
            warn!(
                collection = %self.collection,
                using = COLLECTION_NAME,
                "Unusable collection name, using default"
            );
            self.collection = default_collection();
        } else if collection.len() != self.collection.len() {
            self.collection = collection.to_string();
        }

        if self
            .catalogue_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            warn!("Empty catalogue_path, using default location");
            self.catalogue_path = None;
        }
    }

    /// Catalogue file this configuration points at
    pub fn catalogue_path(&self) -> PathBuf {
        self.catalogue_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join(CATALOGUE_FILENAME))
    }
}
