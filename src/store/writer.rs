//! Catalogue text writer
//!
//! Replaces or inserts exactly one entry block. Every byte outside the
//! affected span is carried over untouched, so operator comments and
//! hand formatting elsewhere in the file survive repeated updates.

use std::fmt::Write as _;

use tracing::debug;

use crate::constants::catalogue::INDENT;
use crate::error::StoreError;
use crate::store::grammar::{
    self, CollectionSpan, FIELD_HEIGHT, FIELD_OPACITY, FIELD_WIDTH, FIELD_X, FIELD_Y,
};
use crate::types::PositionRecord;

/// Keys are written verbatim between quotes, so anything that would end the
/// string or confuse the block scanner is refused
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    };
    if key.trim().is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.contains(['"', '\\']) {
        return Err(invalid("quotes and backslashes are not allowed"));
    }
    if key.contains(['{', '}']) {
        return Err(invalid("braces are not allowed"));
    }
    if key.contains(['\n', '\r']) {
        return Err(invalid("line breaks are not allowed"));
    }
    Ok(())
}

/// Canonical block text, starting at the key's opening quote
/// Field lines sit one step deeper than `indent`; the closing brace sits at `indent`
pub fn render_block(key: &str, record: &PositionRecord, indent: &str) -> String {
    let mut block = String::new();
    // Writing into a String never fails
    let _ = writeln!(block, "\"{key}\": {{");
    let _ = writeln!(block, "{indent}{INDENT}{FIELD_X}: {},", record.x);
    let _ = writeln!(block, "{indent}{INDENT}{FIELD_Y}: {},", record.y);
    let _ = writeln!(block, "{indent}{INDENT}{FIELD_WIDTH}: {},", record.width);
    let _ = writeln!(block, "{indent}{INDENT}{FIELD_HEIGHT}: {},", record.height);
    let _ = writeln!(block, "{indent}{INDENT}{FIELD_OPACITY}: {}", record.opacity);
    let _ = write!(block, "{indent}}}");
    block
}

fn insert_block(text: &str, span: CollectionSpan, key: &str, record: &PositionRecord) -> String {
    let close_indent = grammar::line_indent(text, span.close);
    let entry_indent = format!("{close_indent}{INDENT}");
    let block = render_block(key, record, &entry_indent);

    let last = grammar::last_code_byte(text, span);
    let needs_comma = !matches!(text.as_bytes()[last], b',' | b'{');
    // Trailing whitespace before the closing brace stays with the brace
    let content_end = text[..span.close].trim_end().len().max(last + 1);
    let tail = &text[content_end..span.close];

    let mut out = String::with_capacity(text.len() + block.len() + entry_indent.len() + 4);
    out.push_str(&text[..=last]);
    if needs_comma {
        out.push(',');
    }
    out.push_str(&text[last + 1..content_end]);
    out.push('\n');
    out.push_str(&entry_indent);
    out.push_str(&block);
    if tail.contains('\n') {
        out.push_str(tail);
    } else {
        out.push('\n');
        out.push_str(close_indent);
    }
    out.push_str(&text[span.close..]);
    out
}

/// New catalogue text with `key` set to `record`
///
/// An existing entry is replaced in place (first match, same rule as reads).
/// A new entry goes just before the collection's closing brace.
pub fn upsert(
    text: &str,
    collection: &str,
    key: &str,
    record: &PositionRecord,
) -> Result<String, StoreError> {
    validate_key(key)?;
    record.validate()?;

    let span = grammar::find_collection(text, collection).ok_or_else(|| {
        StoreError::MissingCatalogue {
            collection: collection.to_string(),
        }
    })?;

    if let Some(entry) = grammar::entries(text, span).find(|entry| entry.key == key) {
        debug!(
            key = %key,
            start = entry.span.start,
            end = entry.span.end,
            "Replacing existing entry"
        );
        let block = render_block(key, record, entry.indent);
        let mut out = String::with_capacity(text.len() + block.len());
        out.push_str(&text[..entry.span.start]);
        out.push_str(&block);
        out.push_str(&text[entry.span.end..]);
        return Ok(out);
    }

    debug!(key = %key, "Inserting new entry");
    Ok(insert_block(text, span, key, record))
}
