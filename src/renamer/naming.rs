//! Target filename construction.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::capture::MetadataBundle;

/// Format of generated and canonical date stamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Regex matching a canonical date stamp segment.
pub const CANONICAL_STAMP_PATTERN: &str = r"\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}";

/// Placeholder for a missing name component.
pub const UNKNOWN: &str = "Unknown";

/// Tag used when no detail field was recovered.
pub const NO_DETAILS: &str = "NoDetails";

/// Characters that are illegal in filenames on at least one target filesystem.
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a user-derived value safe to embed in a filename.
///
/// Illegal and control characters and whitespace become `_`, runs of `_`
/// collapse, and leading/trailing `_`, `.` and spaces are trimmed. The
/// result may be empty.
#[must_use]
pub fn sanitize_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let c = if ILLEGAL.contains(&c) || c.is_control() || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| c == '_' || c == '.' || c == ' ')
        .to_string()
}

/// Sanitize a recognized date/time, keeping `HH:MM` readable as `HH-MM`.
#[must_use]
pub fn sanitize_date_time(value: &str) -> String {
    sanitize_component(&value.replace(':', "-"))
}

/// Generated timestamp in canonical format.
#[must_use]
pub fn timestamp(now: NaiveDateTime) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Original extension including the leading dot, or an empty string.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

/// `{contact}_{tags}_{date_time}{ext}` from captured metadata.
///
/// A `date_time` that is not a canonical stamp is replaced by `now`, so the
/// result is always recognized as already renamed.
#[must_use]
pub fn metadata_name(bundle: &MetadataBundle, extension: &str, now: NaiveDateTime) -> String {
    let contact = or_unknown(sanitize_component(&bundle.contact_name));
    let mut tags: Vec<String> = bundle
        .detail_tags
        .iter()
        .map(|tag| sanitize_component(tag))
        .filter(|tag| !tag.is_empty())
        .collect();
    if tags.is_empty() {
        tags.push(NO_DETAILS.to_string());
    }
    let date_time = match sanitize_date_time(&bundle.date_time) {
        dt if NaiveDateTime::parse_from_str(&dt, TIMESTAMP_FORMAT).is_ok() => dt,
        _ => timestamp(now),
    };
    format!("{contact}_{}_{date_time}{extension}", tags.join("_"))
}

/// `{first}_{second}_{timestamp}{ext}` from the underscore-separated stem.
#[must_use]
pub fn filename_name(source: &Path, now: NaiveDateTime) -> String {
    let extension = extension_of(source);
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let segments: Vec<&str> = stem.split('_').collect();

    let (first, second) = if segments.len() >= 2 {
        (
            or_unknown(sanitize_component(segments[0])),
            or_unknown(sanitize_component(segments[1])),
        )
    } else {
        (UNKNOWN.to_string(), UNKNOWN.to_string())
    };

    format!("{first}_{second}_{}{extension}", timestamp(now))
}
