//! Configuration management for signature-positions
//!
//! **settings**: where the catalogue lives and which collection inside it holds
//! the positions (JSON, platform config dir, env overrides)

pub mod settings;

pub use settings::StoreSettings;
