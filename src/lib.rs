//! Signature placement metadata for document templates
//!
//! Positions live in a human-editable catalogue file. [`PositionStore`] reads
//! them fresh from that text on every call, rewrites a single entry in place
//! on update, and reads it back to confirm the write took.

#![forbid(unsafe_code)]

pub mod config;
pub mod constants;
pub mod error;
pub mod resolve;
pub mod store;
pub mod types;

pub use config::StoreSettings;
pub use error::{StoreError, UpdateError, UpdateStage};
pub use resolve::{AliasTable, KeyRequest};
pub use store::{
    Catalogue, CatalogueSource, FileSource, MemorySource, PositionStore, UpdateOutcome,
    VerifyReport,
};
pub use types::{PositionInput, PositionRecord};
