use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("static filename regex"));

/// Collapses every run of characters outside `[A-Za-z0-9._-]` into `_`.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_CHARS_RE.replace_all(name, "_").into_owned()
}

/// `<prefix><ISO-8601 time with ':' and '.' as '-'>_<sanitized filename>`
pub fn object_key(prefix: &str, filename: &str, now: DateTime<Utc>) -> String {
    let date_part = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    format!("{}{}_{}", prefix, date_part, sanitize_filename(filename))
}
