//! Application-wide constants
//!
//! Magic numbers and string literals used throughout the crate, kept in one
//! place so the parser, writer and settings loader agree on them.

/// Settings file location and environment overrides
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "signature-positions";

    /// Settings file name (JSON)
    pub const FILENAME: &str = "settings.json";

    /// Catalogue file name used when settings don't name one
    pub const CATALOGUE_FILENAME: &str = "signature_positions.conf";

    /// Overrides the catalogue path from settings
    pub const ENV_CATALOGUE: &str = "SIGNATURE_POSITIONS_CATALOGUE";

    /// Overrides the collection name from settings
    pub const ENV_COLLECTION: &str = "SIGNATURE_POSITIONS_COLLECTION";

    /// Log level for the CLI subscriber
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Catalogue layout constants
pub mod catalogue {
    /// Name of the top-level collection holding every entry
    pub const COLLECTION_NAME: &str = "signaturePositions";

    /// Mandatory fallback entry
    pub const DEFAULT_KEY: &str = "default";

    /// One indentation step in rendered blocks
    pub const INDENT: &str = "  ";
}

/// Position record constants
pub mod record {
    /// Opacity used when the caller leaves it out
    pub const DEFAULT_OPACITY: f64 = 0.7;

    /// Tolerance for comparing opacity during verification
    pub const OPACITY_TOLERANCE: f64 = 1e-6;

    pub const MIN_OPACITY: f64 = 0.0;
    pub const MAX_OPACITY: f64 = 1.0;
}
