//! Template key resolution
//!
//! Callers that don't know a template key can name the uploaded PDF or the
//! form identifier instead. File names win over form identifiers when both
//! are supplied and resolve differently.

use std::path::Path;

use tracing::debug;

use crate::constants::catalogue::DEFAULT_KEY;

const FILE_NAME_ALIASES: &[(&str, &str)] = &[
    ("ABSACertificate.pdf", "absa-form"),
    ("ClearanceCertificate.pdf", "clearance-certificate-form"),
];

const FORM_ID_ALIASES: &[(&str, &str)] = &[
    ("absa", "absa-form"),
    ("absa-certificate", "absa-form"),
    ("clearance", "clearance-certificate-form"),
    ("clearance-certificate", "clearance-certificate-form"),
];

/// What the caller knows about the template being positioned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyRequest<'a> {
    pub template_key: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub form_id: Option<&'a str>,
}

impl<'a> KeyRequest<'a> {
    pub fn template_key(key: &'a str) -> Self {
        Self {
            template_key: Some(key),
            ..Default::default()
        }
    }

    pub fn with_file_name(mut self, file_name: &'a str) -> Self {
        self.file_name = Some(file_name);
        self
    }

    pub fn with_form_id(mut self, form_id: &'a str) -> Self {
        self.form_id = Some(form_id);
        self
    }
}

/// Static identifier -> template key table
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    file_names: &'static [(&'static str, &'static str)],
    form_ids: &'static [(&'static str, &'static str)],
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn lookup(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

/// Present non-blank value
fn given(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl AliasTable {
    pub fn builtin() -> Self {
        Self {
            file_names: FILE_NAME_ALIASES,
            form_ids: FORM_ID_ALIASES,
        }
    }

    pub fn new(
        file_names: &'static [(&'static str, &'static str)],
        form_ids: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { file_names, form_ids }
    }

    /// Key for an uploaded file; directories in the name are ignored
    pub fn key_for_file_name(&self, file_name: &str) -> Option<&'static str> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);
        lookup(self.file_names, base)
    }

    pub fn key_for_form_id(&self, form_id: &str) -> Option<&'static str> {
        lookup(self.form_ids, form_id)
    }

    /// Explicit key, else file name, else form identifier, else `"default"`
    pub fn resolve(&self, request: &KeyRequest<'_>) -> String {
        if let Some(key) = given(request.template_key) {
            return key.to_string();
        }
        if let Some(key) = given(request.file_name).and_then(|f| self.key_for_file_name(f)) {
            debug!(file_name = ?request.file_name, key = %key, "Resolved key from file name");
            return key.to_string();
        }
        if let Some(key) = given(request.form_id).and_then(|f| self.key_for_form_id(f)) {
            debug!(form_id = ?request.form_id, key = %key, "Resolved key from form identifier");
            return key.to_string();
        }
        debug!(request = ?request, "No alias matched, using default key");
        DEFAULT_KEY.to_string()
    }

    /// A single caller-supplied string: file name, then form identifier,
    /// otherwise taken as the template key itself
    pub fn resolve_alias(&self, key_or_alias: &str) -> String {
        let trimmed = key_or_alias.trim();
        self.key_for_file_name(trimmed)
            .or_else(|| self.key_for_form_id(trimmed))
            .map(str::to_string)
            .unwrap_or_else(|| trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let table = AliasTable::builtin();
        let request = KeyRequest::template_key("new-form").with_file_name("ABSACertificate.pdf");
        assert_eq!(table.resolve(&request), "new-form");
    }

    #[test]
    fn test_file_name_before_form_id() {
        let table = AliasTable::builtin();
        let request = KeyRequest::default()
            .with_file_name("ABSACertificate.pdf")
            .with_form_id("clearance");
        assert_eq!(table.resolve(&request), "absa-form");
    }

    #[test]
    fn test_form_id_when_file_name_unknown() {
        let table = AliasTable::builtin();
        let request = KeyRequest::default()
            .with_file_name("Unknown.pdf")
            .with_form_id("clearance");
        assert_eq!(table.resolve(&request), "clearance-certificate-form");
    }

    #[test]
    fn test_nothing_matches_gives_default() {
        let table = AliasTable::builtin();
        assert_eq!(table.resolve(&KeyRequest::default()), "default");
        let request = KeyRequest::template_key("   ").with_form_id("nope");
        assert_eq!(table.resolve(&request), "default");
    }

    #[test]
    fn test_file_name_ignores_case_and_directories() {
        let table = AliasTable::builtin();
        assert_eq!(table.key_for_file_name("uploads/abMacertificate.pdf"), None);
        assert_eq!(table.key_for_file_name("uploads/absacertificate.PDF"), Some("absa-form"));
    }

    #[test]
    fn test_resolve_alias_passthrough() {
        let table = AliasTable::builtin();
        assert_eq!(table.resolve_alias("ABSACertificate.pdf"), "absa-form");
        assert_eq!(table.resolve_alias("clearance"), "clearance-certificate-form");
        assert_eq!(table.resolve_alias("new-form"), "new-form");
    }

    #[test]
    fn test_custom_table() {
        static FILES: &[(&str, &str)] = &[("Lease.pdf", "lease-form")];
        let table = AliasTable::new(FILES, &[]);
        assert_eq!(table.resolve_alias("Lease.pdf"), "lease-form");
        assert_eq!(table.resolve_alias("absa"), "absa");
    }
}
