//! Text normalization applied before embedding, and project-name sanitizing.

use unicode_normalization::UnicodeNormalization;

/// NFKC-normalize, turn line breaks into spaces, collapse whitespace runs and trim.
pub fn normalize_text(raw: &str) -> String {
    let nfkc: String = raw.nfkc().collect();
    nfkc.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep alphanumerics, `_` and `-`; fall back to `project` when nothing remains.
pub fn sanitize_project_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "project".to_string()
    } else {
        cleaned
    }
}
