//! Catalogue text grammar
//!
//! The catalogue is one named collection of flat, brace-delimited entries:
//!
//! ```text
//! signaturePositions: {
//!   "absa-form": {
//!     x: 78,
//!     y: 376,
//!     width: 200,
//!     height: 60,
//!     opacity: 1
//!   },
//! }
//! ```
//!
//! The collection name may be bare or quoted and may be followed by `:` or `=`.
//! An entry is a quoted key, `:`, then the shortest brace-free run up to the
//! next `}`. Entries containing nested braces are skipped whole. Strings and
//! `//` line comments are never scanned for structure.
//!
//! Everything that decides "which position is in effect" goes through here:
//! reads, the writer's span lookup and verification.

use std::ops::Range;

use tracing::{debug, warn};

use crate::constants::record::{MAX_OPACITY, MIN_OPACITY};
use crate::error::StoreError;
use crate::types::PositionRecord;

pub const FIELD_X: &str = "x";
pub const FIELD_Y: &str = "y";
pub const FIELD_WIDTH: &str = "width";
pub const FIELD_HEIGHT: &str = "height";
pub const FIELD_OPACITY: &str = "opacity";

/// Byte offsets of a collection's opening and closing braces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpan {
    pub open: usize,
    pub close: usize,
}

/// One entry block as it appears in the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMatch<'a> {
    /// Key exactly as written between the quotes
    pub key: &'a str,
    /// From the key's opening quote through the closing brace
    pub span: Range<usize>,
    /// Text between the entry's braces
    pub body: &'a str,
    /// Leading whitespace of the line the key sits on
    pub indent: &'a str,
}

fn starts_comment(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/')
}

/// Index of the newline ending the comment at `i` (or end of text)
fn skip_line_comment(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| i + p)
}

/// Index just past the closing quote of the string opening at `i`
/// Strings don't span lines; an unterminated one yields None
fn skip_string(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return Some(j + 1),
            b'\n' => return None,
            _ => j += 1,
        }
    }
    None
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Index of the brace closing the one at `open`, honouring nesting
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if starts_comment(bytes, i) {
            i = skip_line_comment(bytes, i);
            continue;
        }
        match bytes[i] {
            b'"' => {
                i = skip_string(bytes, i).unwrap_or(i + 1);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the `}` ending a flat block opened at `open`
/// None when another `{` shows up first or the block never closes
fn flat_block_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        if starts_comment(bytes, i) {
            i = skip_line_comment(bytes, i);
            continue;
        }
        match bytes[i] {
            b'"' => {
                i = skip_string(bytes, i).unwrap_or(i + 1);
                continue;
            }
            b'}' => return Some(i),
            b'{' => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Leading whitespace of the line containing byte `i`
pub fn line_indent(text: &str, i: usize) -> &str {
    let line_start = text[..i].rfind('\n').map_or(0, |p| p + 1);
    let line = &text[line_start..i];
    let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &text[line_start..line_start + indent_len]
}

/// Index of the last byte inside the collection that isn't whitespace or comment
/// The opening brace itself when the collection is empty
pub fn last_code_byte(text: &str, span: CollectionSpan) -> usize {
    let bytes = text.as_bytes();
    let mut last = span.open;
    let mut i = span.open + 1;
    while i < span.close {
        if starts_comment(bytes, i) {
            i = skip_line_comment(bytes, i);
            continue;
        }
        if bytes[i] == b'"' {
            if let Some(end) = skip_string(bytes, i) {
                last = end - 1;
                i = end;
                continue;
            }
        }
        if !bytes[i].is_ascii_whitespace() {
            last = i;
        }
        i += 1;
    }
    last
}

/// Locate the named top-level collection
pub fn find_collection(text: &str, name: &str) -> Option<CollectionSpan> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if starts_comment(bytes, i) {
            i = skip_line_comment(bytes, i);
            continue;
        }
        let (token, end) = match bytes[i] {
            b'"' => match skip_string(bytes, i) {
                Some(end) => (&text[i + 1..end - 1], end),
                None => {
                    i += 1;
                    continue;
                }
            },
            b if is_ident_byte(b) => {
                let mut end = i;
                while end < bytes.len() && is_ident_byte(bytes[end]) {
                    end += 1;
                }
                (&text[i..end], end)
            }
            _ => {
                i += 1;
                continue;
            }
        };

        if token == name {
            let sep = skip_ws(bytes, end);
            if matches!(bytes.get(sep), Some(b':') | Some(b'=')) {
                let open = skip_ws(bytes, sep + 1);
                if bytes.get(open) == Some(&b'{') {
                    if let Some(close) = matching_brace(bytes, open) {
                        return Some(CollectionSpan { open, close });
                    }
                    warn!(collection = %name, "Collection opens but never closes");
                    return None;
                }
            }
        }
        i = end;
    }
    None
}

/// Iterator over the entry blocks inside a collection, in text order
pub struct Entries<'a> {
    text: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = EntryMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        let bytes = text.as_bytes();
        while self.pos < self.end {
            let i = self.pos;
            if starts_comment(bytes, i) {
                self.pos = skip_line_comment(bytes, i);
                continue;
            }
            match bytes[i] {
                b'"' => {}
                b'{' => {
                    // Anonymous object, never an entry
                    self.pos = matching_brace(bytes, i).map_or(self.end, |c| c + 1);
                    continue;
                }
                _ => {
                    self.pos += 1;
                    continue;
                }
            }

            let Some(key_end) = skip_string(bytes, i) else {
                self.pos += 1;
                continue;
            };
            self.pos = key_end;

            let colon = skip_ws(bytes, key_end);
            if bytes.get(colon) != Some(&b':') {
                continue;
            }
            let open = skip_ws(bytes, colon + 1);
            if bytes.get(open) != Some(&b'{') {
                continue;
            }

            let key = &text[i + 1..key_end - 1];
            match flat_block_end(bytes, open) {
                Some(close) => {
                    self.pos = close + 1;
                    return Some(EntryMatch {
                        key,
                        span: i..close + 1,
                        body: &text[open + 1..close],
                        indent: line_indent(text, i),
                    });
                }
                None => {
                    debug!(key = %key, "Skipping entry with nested braces");
                    self.pos = matching_brace(bytes, open).map_or(self.end, |c| c + 1);
                }
            }
        }
        None
    }
}

/// Entries of a located collection
pub fn entries(text: &str, collection: CollectionSpan) -> Entries<'_> {
    Entries {
        text,
        pos: collection.open + 1,
        end: collection.close,
    }
}

/// First entry whose quoted key equals `key`
pub fn find_entry<'a>(text: &'a str, collection: &str, key: &str) -> Option<EntryMatch<'a>> {
    let span = find_collection(text, collection)?;
    entries(text, span).find(|entry| entry.key == key)
}

fn parse_integer(key: &str, field: &'static str, value: &str) -> Result<u32, StoreError> {
    value.parse::<u32>().map_err(|_| StoreError::MalformedRecord {
        key: key.to_string(),
        field,
        problem: format!("value {value:?} is not a non-negative integer"),
    })
}

fn parse_opacity(key: &str, value: &str) -> Result<f64, StoreError> {
    let opacity = value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| StoreError::MalformedRecord {
            key: key.to_string(),
            field: FIELD_OPACITY,
            problem: format!("value {value:?} is not a decimal number"),
        })?;

    if !(MIN_OPACITY..=MAX_OPACITY).contains(&opacity) {
        let clamped = opacity.clamp(MIN_OPACITY, MAX_OPACITY);
        warn!(key = %key, opacity = opacity, using = clamped, "opacity outside 0..=1, clamping");
        return Ok(clamped);
    }
    Ok(opacity)
}

/// Pieces of an entry body separated by commas or line breaks
/// Separators and `//` inside strings don't count; comments are dropped
fn field_segments(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if starts_comment(bytes, i) {
            segments.push(&body[start..i]);
            i = skip_line_comment(bytes, i);
            start = i;
            continue;
        }
        match bytes[i] {
            b'"' => {
                i = skip_string(bytes, i).unwrap_or(i + 1);
                continue;
            }
            b',' | b'\n' => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&body[start..]);
    segments
}

/// Field name (quotes removed) and raw value of one trimmed segment
fn split_field(segment: &str) -> Option<(&str, &str)> {
    if segment.starts_with('"') {
        let end = skip_string(segment.as_bytes(), 0)?;
        let value = segment[end..].trim_start().strip_prefix(':')?;
        return Some((&segment[1..end - 1], value.trim()));
    }
    let (name, value) = segment.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// Extract a record from an entry body
/// Field order is free; the first occurrence of a field wins
pub fn parse_fields(key: &str, body: &str) -> Result<PositionRecord, StoreError> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;
    let mut opacity = None;

    for segment in field_segments(body) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((name, value)) = split_field(segment) else {
            debug!(key = %key, segment = %segment, "Ignoring text without a field name");
            continue;
        };
        match name {
            FIELD_X if x.is_none() => x = Some(parse_integer(key, FIELD_X, value)?),
            FIELD_Y if y.is_none() => y = Some(parse_integer(key, FIELD_Y, value)?),
            FIELD_WIDTH if width.is_none() => {
                width = Some(parse_integer(key, FIELD_WIDTH, value)?)
            }
            FIELD_HEIGHT if height.is_none() => {
                height = Some(parse_integer(key, FIELD_HEIGHT, value)?)
            }
            FIELD_OPACITY if opacity.is_none() => {
                opacity = Some(parse_opacity(key, value)?)
            }
            FIELD_X | FIELD_Y | FIELD_WIDTH | FIELD_HEIGHT | FIELD_OPACITY => {
                debug!(key = %key, field = %name, "Ignoring repeated field");
            }
            other => debug!(key = %key, field = %other, "Ignoring unknown field"),
        }
    }

    let missing = |field: &'static str| StoreError::MalformedRecord {
        key: key.to_string(),
        field,
        problem: "is missing".to_string(),
    };

    let record = PositionRecord::new(
        x.ok_or_else(|| missing(FIELD_X))?,
        y.ok_or_else(|| missing(FIELD_Y))?,
        width.ok_or_else(|| missing(FIELD_WIDTH))?,
        height.ok_or_else(|| missing(FIELD_HEIGHT))?,
    );
    Ok(match opacity {
        Some(opacity) => record.with_opacity(opacity),
        None => record,
    })
}

/// The record in effect for `key` according to `text`
pub fn read_record(
    text: &str,
    collection: &str,
    key: &str,
) -> Result<PositionRecord, StoreError> {
    let entry = find_entry(text, collection, key).ok_or_else(|| StoreError::NotFound {
        key: key.to_string(),
    })?;
    parse_fields(key, entry.body)
}

/// Every well-formed entry in text order
/// Malformed blocks are logged and skipped; repeated keys keep the first
pub fn read_all(text: &str, collection: &str) -> Vec<(String, PositionRecord)> {
    let Some(span) = find_collection(text, collection) else {
        return Vec::new();
    };

    let mut records: Vec<(String, PositionRecord)> = Vec::new();
    for entry in entries(text, span) {
        if records.iter().any(|(key, _)| key == entry.key) {
            debug!(key = %entry.key, "Ignoring repeated entry");
            continue;
        }
        match parse_fields(entry.key, entry.body) {
            Ok(record) => records.push((entry.key.to_string(), record)),
            Err(e) => warn!(key = %entry.key, error = %e, "Skipping malformed entry"),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"// Signature placement per template
signaturePositions: {
  "default": {
    x: 400,
    y: 700,
    width: 200,
    height: 60,
    opacity: 0.7
  },
  "absa-form": { x: 78, y: 376, width: 200, height: 60, opacity: 1 },
  "clearance-certificate-form": {
    x: 104,
    y: 190,
    width: 200,
    height: 60
  }
}
"#;

    #[test]
    fn test_find_collection_bounds() {
        let span = find_collection(SAMPLE, "signaturePositions").unwrap();
        assert_eq!(&SAMPLE[span.open..span.open + 1], "{");
        assert_eq!(&SAMPLE[span.close..], "}\n");
    }

    #[test]
    fn test_find_collection_quoted_and_assignment() {
        let text = "const config = {\n  \"signaturePositions\" = {\n  }\n};\n";
        assert!(find_collection(text, "signaturePositions").is_some());
        assert!(find_collection(text, "otherPositions").is_none());
    }

    #[test]
    fn test_collection_name_must_be_whole_identifier() {
        let text = r#"mySignaturePositions: {
  "default": { x: 1, y: 2, width: 3, height: 4 }
}
"#;
        assert!(find_collection(text, "SignaturePositions").is_none());
    }

    #[test]
    fn test_collection_in_comment_ignored() {
        let text = r#"// signaturePositions: { "default": { x: 9, y: 9, width: 9, height: 9 } }
signaturePositions: {
}
"#;
        let span = find_collection(text, "signaturePositions").unwrap();
        assert!(span.open > text.find('\n').unwrap());
        assert_eq!(entries(text, span).count(), 0);
    }

    #[test]
    fn test_read_record_multiline() {
        let record = read_record(SAMPLE, "signaturePositions", "default").unwrap();
        assert_eq!(record, PositionRecord::new(400, 700, 200, 60));
    }

    #[test]
    fn test_read_record_single_line() {
        let record = read_record(SAMPLE, "signaturePositions", "absa-form").unwrap();
        assert_eq!(record, PositionRecord::new(78, 376, 200, 60).with_opacity(1.0));
    }

    #[test]
    fn test_missing_opacity_is_defaulted() {
        let record =
            read_record(SAMPLE, "signaturePositions", "clearance-certificate-form").unwrap();
        assert_eq!(record.x, 104);
        assert_eq!(record.opacity, 0.7);
    }

    #[test]
    fn test_unknown_key_not_found() {
        let err = read_record(SAMPLE, "signaturePositions", "absa").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_key_match_is_exact() {
        // "form" is a substring of other keys but never a key itself
        assert!(find_entry(SAMPLE, "signaturePositions", "form").is_none());
        assert!(find_entry(SAMPLE, "signaturePositions", "ABSA-FORM").is_none());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let text = "signaturePositions: {\n  \"broken\": { x: 1, y: 2, width: 3 }\n}\n";
        match read_record(text, "signaturePositions", "broken") {
            Err(StoreError::MalformedRecord { field, .. }) => assert_eq!(field, FIELD_HEIGHT),
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn test_non_integer_field_is_malformed() {
        let text = "signaturePositions: {\n  \"broken\": { x: -1, y: 2, width: 3, height: 4 }\n}\n";
        assert!(matches!(
            read_record(text, "signaturePositions", "broken"),
            Err(StoreError::MalformedRecord { field: FIELD_X, .. })
        ));
    }

    #[test]
    fn test_fields_in_any_order_with_quotes_and_comments() {
        let text = r#"signaturePositions: {
  "reordered": {
    "height": 60, // tall enough for initials
    opacity: 0.25,
    width: 200,
    y: 5,
    x: 6
  }
}"#;
        let record = read_record(text, "signaturePositions", "reordered").unwrap();
        assert_eq!(record, PositionRecord::new(6, 5, 200, 60).with_opacity(0.25));
    }

    #[test]
    fn test_out_of_range_opacity_clamped() {
        let text = r#"signaturePositions: {
  "bright": { x: 1, y: 2, width: 3, height: 4, opacity: 3.5 }
}
"#;
        let record = read_record(text, "signaturePositions", "bright").unwrap();
        assert_eq!(record.opacity, 1.0);
    }

    #[test]
    fn test_nested_entry_invisible() {
        let text = r#"signaturePositions: {
  "nested": {
    x: 1, y: 2, width: 3, height: 4,
    extra: { "inner": { x: 5, y: 6, width: 7, height: 8 } }
  },
  "after": { x: 9, y: 10, width: 11, height: 12 }
}"#;
        assert!(find_entry(text, "signaturePositions", "nested").is_none());
        assert!(find_entry(text, "signaturePositions", "inner").is_none());
        let after = read_record(text, "signaturePositions", "after").unwrap();
        assert_eq!(after, PositionRecord::new(9, 10, 11, 12));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let text = r#"signaturePositions: {
  "dup": { x: 1, y: 1, width: 1, height: 1 },
  "dup": { x: 2, y: 2, width: 2, height: 2 }
}"#;
        assert_eq!(read_record(text, "signaturePositions", "dup").unwrap().x, 1);
        assert_eq!(read_all(text, "signaturePositions").len(), 1);
    }

    #[test]
    fn test_entries_outside_collection_ignored() {
        let text = r#"otherThing: {
  "default": { x: 1, y: 1, width: 1, height: 1 }
}
signaturePositions: {
  "default": { x: 2, y: 2, width: 2, height: 2 }
}"#;
        assert_eq!(read_record(text, "signaturePositions", "default").unwrap().x, 2);
    }

    #[test]
    fn test_string_fields_do_not_split_entry() {
        let text = r#"signaturePositions: {
  "absa-form": { note: "moved, x: left", x: 78, y: 376, width: 200, height: 60 },
  "clearance-certificate-form": {
    "source": "https://forms.example/clearance", // y: 1, width: 1
    x: 104,
    y: 190,
    width: 200,
    height: 60
  }
}"#;
        let absa = read_record(text, "signaturePositions", "absa-form").unwrap();
        assert_eq!(absa, PositionRecord::new(78, 376, 200, 60));
        let clearance =
            read_record(text, "signaturePositions", "clearance-certificate-form").unwrap();
        assert_eq!(clearance, PositionRecord::new(104, 190, 200, 60));
    }

    #[test]
    fn test_quoted_field_names() {
        let body = r#" "x": 1, "y" : 2, "width": 3, "height": 4, "opacity": 0.5 "#;
        let record = parse_fields("quoted", body).unwrap();
        assert_eq!(record, PositionRecord::new(1, 2, 3, 4).with_opacity(0.5));
    }

    #[test]
    fn test_braces_inside_strings_and_comments_ignored() {
        let text = r#"signaturePositions: {
  // "fake": { x: 0 }
  "label": "not } a block",
  "real": { x: 3, y: 4, width: 5, height: 6 }
}"#;
        let keys: Vec<_> = read_all(text, "signaturePositions")
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["real".to_string()]);
    }

    #[test]
    fn test_read_all_skips_malformed_and_keeps_order() {
        let text = r#"signaturePositions: {
  "b": { x: 1, y: 1, width: 1, height: 1 },
  "broken": { x: 1 },
  "a": { x: 2, y: 2, width: 2, height: 2 }
}"#;
        let keys: Vec<_> = read_all(text, "signaturePositions")
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_entry_span_and_indent() {
        let entry = find_entry(SAMPLE, "signaturePositions", "absa-form").unwrap();
        assert_eq!(entry.indent, "  ");
        assert_eq!(
            &SAMPLE[entry.span.clone()],
            r#""absa-form": { x: 78, y: 376, width: 200, height: 60, opacity: 1 }"#
        );
    }

    #[test]
    fn test_missing_collection_reads_nothing() {
        assert!(read_all("{}", "signaturePositions").is_empty());
        assert!(matches!(
            read_record("", "signaturePositions", "default"),
            Err(StoreError::NotFound { .. })
        ));
    }
}
