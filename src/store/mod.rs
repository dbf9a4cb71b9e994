//! Position store
//!
//! Every read re-derives its answer from the catalogue text. The in-memory
//! [`Catalogue`] held here is only a fallback for when the text can't be read,
//! and it is dropped after each write so it never outlives the text it came from.

pub mod catalogue;
pub mod grammar;
pub mod source;
pub mod writer;

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, UpdateError, UpdateStage};
use crate::resolve::{AliasTable, KeyRequest};
use crate::types::{PositionInput, PositionRecord};

pub use catalogue::Catalogue;
pub use source::{CatalogueSource, FileSource, MemorySource};

/// Result of a committed update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub new_record: PositionRecord,
    pub previous_record: PositionRecord,
    pub resolved_key: String,
    /// Read-back agreed with what was written
    pub verified: bool,
}

/// Diagnostic comparison of a direct parse against the fresh-read path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub key: String,
    pub direct_read: Option<PositionRecord>,
    pub fresh_read: PositionRecord,
    pub matches: bool,
}

pub struct PositionStore<S> {
    source: S,
    collection: String,
    aliases: AliasTable,
    cache: Mutex<Option<Catalogue>>,
}

impl<S: CatalogueSource> PositionStore<S> {
    /// Open a store and derive the fallback catalogue from the current text
    pub fn new(source: S, collection: impl Into<String>) -> Self {
        let store = Self {
            source,
            collection: collection.into(),
            aliases: AliasTable::builtin(),
            cache: Mutex::new(None),
        };
        match store.source.read_text() {
            Ok(text) => {
                let catalogue = Catalogue::from_text(&text, &store.collection);
                info!(
                    location = %store.source.location(),
                    entries = catalogue.len(),
                    "Loaded signature position catalogue"
                );
                *store.cache() = Some(catalogue);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Catalogue unreadable at startup, built-in positions will back reads"
                );
            }
        }
        store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn cache(&self) -> MutexGuard<'_, Option<Catalogue>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn resolve_key(&self, request: &KeyRequest<'_>) -> String {
        self.aliases.resolve(request)
    }

    /// Drop the fallback catalogue so the next fallback rebuilds it from text
    pub fn invalidate_cache(&self) {
        if self.cache().take().is_some() {
            debug!("Dropped cached catalogue");
        }
    }

    pub fn has_cached_catalogue(&self) -> bool {
        self.cache().is_some()
    }

    /// Parse `key` straight from the current text, with no fallback
    /// Ok(None) when the key is absent or its block is malformed
    pub fn read_direct(&self, key: &str) -> Result<Option<PositionRecord>, StoreError> {
        let text = self.source.read_text()?;
        match grammar::read_record(&text, &self.collection, key) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed entry");
                Ok(None)
            }
        }
    }

    /// Effective position for a template key, always re-read from text
    ///
    /// Missing or malformed entries resolve through a catalogue rebuilt from
    /// the same text (so `"default"` answers for them). If the text can't be
    /// read at all, the last catalogue derived from it answers instead.
    pub fn read_fresh(&self, key: &str) -> PositionRecord {
        let text = match self.source.read_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(key = %key, error = %e, "Catalogue unreadable, using cached positions");
                return self.cached_position(key);
            }
        };

        match grammar::read_record(&text, &self.collection, key) {
            Ok(record) => return record,
            Err(StoreError::NotFound { .. }) => {
                debug!(key = %key, "No entry for key, falling back to default");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed entry, falling back to default");
            }
        }

        let catalogue = Catalogue::from_text(&text, &self.collection);
        let record = catalogue.resolve(key);
        *self.cache() = Some(catalogue);
        record
    }

    fn cached_position(&self, key: &str) -> PositionRecord {
        match self.cache().as_ref() {
            Some(catalogue) => catalogue.resolve(key),
            None => {
                warn!(key = %key, "No cached catalogue, using built-in positions");
                Catalogue::builtin().resolve(key)
            }
        }
    }

    /// A string naming an entry verbatim is that entry's key, even when it
    /// also happens to be an alias; anything else goes through the alias table
    fn key_for(&self, key_or_alias: &str) -> String {
        let trimmed = key_or_alias.trim();
        let is_entry = match self.source.read_text() {
            Ok(text) => grammar::find_entry(&text, &self.collection, trimmed).is_some(),
            Err(_) => self
                .cache()
                .as_ref()
                .is_some_and(|catalogue| catalogue.get(trimmed).is_some()),
        };
        if is_entry {
            trimmed.to_string()
        } else {
            self.aliases.resolve_alias(trimmed)
        }
    }

    /// Position for a template key or any alias of one
    pub fn get_position(&self, key_or_alias: &str) -> PositionRecord {
        let key = self.key_for(key_or_alias);
        self.read_fresh(&key)
    }

    /// Update a position named by template key or alias
    pub fn update_position(
        &self,
        key_or_alias: &str,
        input: PositionInput,
    ) -> Result<UpdateOutcome, UpdateError> {
        let key = self.key_for(key_or_alias);
        self.apply_update(key, input)
    }

    /// Update a position, resolving the key from whatever the caller knows
    pub fn update_position_with(
        &self,
        request: &KeyRequest<'_>,
        input: PositionInput,
    ) -> Result<UpdateOutcome, UpdateError> {
        let key = self.resolve_key(request);
        self.apply_update(key, input)
    }

    fn apply_update(
        &self,
        key: String,
        input: PositionInput,
    ) -> Result<UpdateOutcome, UpdateError> {
        let record = PositionRecord::from(input);
        debug!(stage = %UpdateStage::ResolveKey, key = %key, "Resolved template key");

        let previous = self.read_fresh(&key);
        debug!(
            stage = %UpdateStage::ReadOld,
            key = %key,
            previous = ?previous,
            "Read current position"
        );

        let write = self.source.read_text().and_then(|text| {
            let updated = writer::upsert(&text, &self.collection, &key, &record)?;
            self.source.write_text(&updated)
        });
        if let Err(source) = write {
            error!(
                stage = %UpdateStage::WriteNew,
                key = %key,
                record = ?record,
                error = %source,
                "Failed to write signature position"
            );
            return Err(UpdateError {
                stage: UpdateStage::WriteNew,
                key,
                record,
                source,
            });
        }
        info!(
            key = %key,
            x = record.x,
            y = record.y,
            width = record.width,
            height = record.height,
            opacity = record.opacity,
            "Saved signature position"
        );

        self.invalidate_cache();
        debug!(stage = %UpdateStage::InvalidateCache, key = %key, "Cache invalidated");

        let stored = self.read_fresh(&key);
        let verified = stored.matches(&record);
        if verified {
            debug!(
                stage = %UpdateStage::Verify,
                key = %key,
                "Read-back matches written position"
            );
        } else {
            warn!(
                key = %key,
                expected = ?record,
                found = ?stored,
                "Read-back differs from written position"
            );
        }

        Ok(UpdateOutcome {
            new_record: record,
            previous_record: previous,
            resolved_key: key,
            verified,
        })
    }

    /// Compare a direct parse with the fresh-read path; changes nothing
    pub fn verify_position(&self, key: &str) -> VerifyReport {
        let direct_read = self.read_direct(key).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Direct read failed during verification");
            None
        });
        let fresh_read = self.read_fresh(key);
        let matches = direct_read.is_some_and(|direct| direct.matches(&fresh_read));

        VerifyReport {
            key: key.to_string(),
            direct_read,
            fresh_read,
            matches,
        }
    }

    /// Every well-formed entry currently in the text
    pub fn list_positions(&self) -> Result<Catalogue, StoreError> {
        let text = self.source.read_text()?;
        Ok(Catalogue::from_text(&text, &self.collection))
    }
}
