//! Where the catalogue text lives
//!
//! The store only ever sees whole-text reads and writes, so the backing
//! medium can change without touching the parser or the orchestrator.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::StoreError;

pub trait CatalogueSource {
    /// Current catalogue text, read from the backing medium on every call
    fn read_text(&self) -> Result<String, StoreError>;

    /// Replace the catalogue text; either all of it lands or none of it does
    fn write_text(&self, text: &str) -> Result<(), StoreError>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// Catalogue stored in a text file on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File the text really lives in, with symlinks followed
    /// A catalogue that doesn't exist yet is created at the configured path
    fn target_path(&self) -> Result<PathBuf, StoreError> {
        match fs::canonicalize(&self.path) {
            Ok(path) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(self.path.clone()),
            Err(e) => Err(StoreError::storage(&self.path, e)),
        }
    }

    /// Write `text` only when no catalogue exists yet
    /// Returns whether a file was created
    pub fn create_if_missing(&self, text: &str) -> Result<bool, StoreError> {
        if self.path.exists() {
            info!(path = %self.path.display(), "Catalogue already exists, leaving it untouched");
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::storage(parent, e))?;
        }
        self.write_text(text)?;
        info!(path = %self.path.display(), "Created catalogue with built-in positions");
        Ok(true)
    }
}

impl CatalogueSource for FileSource {
    fn read_text(&self) -> Result<String, StoreError> {
        fs::read_to_string(&self.path).map_err(|e| StoreError::storage(&self.path, e))
    }

    fn write_text(&self, text: &str) -> Result<(), StoreError> {
        let target = self.target_path()?;
        let permissions = match fs::metadata(&target) {
            Ok(meta) if meta.permissions().readonly() => {
                return Err(StoreError::storage(
                    &target,
                    io::Error::new(io::ErrorKind::PermissionDenied, "catalogue is read-only"),
                ));
            }
            Ok(meta) => Some(meta.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::storage(&target, e)),
        };

        let staging = staging_path(&target);
        let staged = fs::write(&staging, text).and_then(|()| match permissions {
            Some(permissions) => fs::set_permissions(&staging, permissions),
            None => Ok(()),
        });
        if let Err(e) = staged.and_then(|()| fs::rename(&staging, &target)) {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging file"
                    );
                }
            }
            return Err(StoreError::storage(&target, e));
        }
        debug!(path = %target.display(), bytes = text.len(), "Wrote catalogue");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Sibling file the new text is staged in before the rename
fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Catalogue held in memory, for embedding and for exercising failure paths
#[derive(Debug, Default)]
pub struct MemorySource {
    text: Mutex<String>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemorySource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
            ..Default::default()
        }
    }

    fn guard(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn text(&self) -> String {
        self.guard().clone()
    }

    /// Make subsequent reads fail as if the medium were gone
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent writes fail without touching the stored text
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl CatalogueSource for MemorySource {
    fn read_text(&self) -> Result<String, StoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::storage(
                self.location(),
                io::Error::new(io::ErrorKind::NotFound, "catalogue unavailable"),
            ));
        }
        Ok(self.text())
    }

    fn write_text(&self, text: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::storage(
                self.location(),
                io::Error::new(io::ErrorKind::PermissionDenied, "catalogue is read-only"),
            ));
        }
        *self.guard() = text.to_string();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
