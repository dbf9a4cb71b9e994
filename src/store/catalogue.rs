//! In-memory view of the catalogue
//!
//! Always derived from text (or from the built-in positions when no text could
//! be read). The store keeps one as its fallback and drops it after writes.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::constants::catalogue::{DEFAULT_KEY, INDENT};
use crate::store::{grammar, writer};
use crate::types::PositionRecord;

/// Positions shipped with the crate, used when the catalogue is unreadable
const BUILTIN_POSITIONS: &[(&str, PositionRecord)] = &[
    (
        DEFAULT_KEY,
        PositionRecord { x: 400, y: 700, width: 200, height: 60, opacity: 0.7 },
    ),
    (
        "absa-form",
        PositionRecord { x: 78, y: 376, width: 200, height: 60, opacity: 1.0 },
    ),
    (
        "clearance-certificate-form",
        PositionRecord { x: 104, y: 190, width: 200, height: 60, opacity: 0.7 },
    ),
];

fn builtin_default() -> PositionRecord {
    BUILTIN_POSITIONS[0].1
}

/// Ordered template key -> position mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalogue {
    entries: Vec<(String, PositionRecord)>,
}

impl Catalogue {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_POSITIONS
                .iter()
                .map(|(key, record)| (key.to_string(), *record))
                .collect(),
        }
    }

    pub fn from_text(text: &str, collection: &str) -> Self {
        Self {
            entries: grammar::read_all(text, collection),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PositionRecord> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record)
    }

    /// Position for `key`, falling back to `"default"`, then to the built-in default
    pub fn resolve(&self, key: &str) -> PositionRecord {
        self.get(key)
            .or_else(|| self.get(DEFAULT_KEY))
            .copied()
            .unwrap_or_else(builtin_default)
    }

    pub fn entries(&self) -> &[(String, PositionRecord)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full catalogue text in canonical form, for seeding a new file
    pub fn render(&self, collection: &str) -> String {
        let blocks: Vec<String> = self
            .entries
            .iter()
            .map(|(key, record)| format!("{INDENT}{}", writer::render_block(key, record, INDENT)))
            .collect();

        let mut text = String::from(
            "// Signature placement per document template.\n\
             // Entries are rewritten in place; text outside them is kept as-is.\n",
        );
        text.push_str(collection);
        text.push_str(": {\n");
        if !blocks.is_empty() {
            text.push_str(&blocks.join(",\n"));
            text.push('\n');
        }
        text.push_str("}\n");
        text
    }
}

/// Serialized as a JSON object in catalogue order
impl Serialize for Catalogue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, record) in &self.entries {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_default() {
        let catalogue = Catalogue::builtin();
        assert!(catalogue.get(DEFAULT_KEY).is_some());
        assert_eq!(catalogue.len(), 3);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let catalogue = Catalogue::builtin();
        assert_eq!(catalogue.resolve("nonexistent-key"), catalogue.resolve(DEFAULT_KEY));
        assert_eq!(catalogue.resolve("absa-form").x, 78);
    }

    #[test]
    fn test_resolve_without_default_entry_uses_builtin() {
        let catalogue = Catalogue::from_text(
            "signaturePositions: {\n  \"only\": { x: 1, y: 1, width: 1, height: 1 }\n}\n",
            "signaturePositions",
        );
        assert_eq!(catalogue.resolve("missing"), builtin_default());
        assert_eq!(catalogue.resolve("only").x, 1);
    }

    #[test]
    fn test_render_parses_back() {
        let builtin = Catalogue::builtin();
        let text = builtin.render("signaturePositions");
        assert_eq!(Catalogue::from_text(&text, "signaturePositions"), builtin);
        assert!(text.starts_with("// Signature placement"));
    }

    #[test]
    fn test_render_empty() {
        let text = Catalogue::default().render("signaturePositions");
        assert!(text.ends_with("signaturePositions: {\n}\n"));
        assert!(Catalogue::from_text(&text, "signaturePositions").is_empty());
    }

    #[test]
    fn test_serialize_keeps_order() {
        let json = serde_json::to_string(&Catalogue::builtin()).unwrap();
        let default_at = json.find("\"default\"").unwrap();
        let absa_at = json.find("\"absa-form\"").unwrap();
        assert!(default_at < absa_at);
    }
}
