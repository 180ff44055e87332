//! Input table model and text/id column resolution.
//!
//! The text column is resolved by an ordered list of predicates; the first one
//! that matches wins:
//!
//! 1. the explicitly requested column
//! 2. the first header matching a known text-column name (case-insensitive)
//! 3. the column with the longest average cell length
//!
//! An explicitly requested text column that does not exist is an error. An id
//! column that does not exist is ignored and rows are numbered instead.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AxisError, AxisResult};
use crate::text::normalize_text;

/// Header names recognized as the text column, in priority order.
pub const KNOWN_TEXT_COLUMNS: [&str; 8] = [
    "text", "テキスト", "本文", "content", "sentence", "意味", "comment", "body",
];

/// A header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl InputTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    /// Normalized records in input order.
    pub fn records(&self, selection: &ColumnSelection) -> Vec<InputRecord> {
        (0..self.rows.len())
            .map(|r| InputRecord {
                id: selection
                    .id
                    .map(|c| self.cell(r, c).to_string())
                    .unwrap_or_else(|| r.to_string()),
                text: normalize_text(self.cell(r, selection.text)),
            })
            .collect()
    }
}

/// One input row after resolution and normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub id: String,
    pub text: String,
}

/// Caller-supplied column names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnHints<'a> {
    pub text_col: Option<&'a str>,
    pub id_col: Option<&'a str>,
}

/// Resolved column indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    pub text: usize,
    pub text_name: String,
    pub id: Option<usize>,
    pub id_name: Option<String>,
}

type TextColumnPredicate = fn(&InputTable, &ColumnHints<'_>) -> AxisResult<Option<usize>>;

const TEXT_COLUMN_PREDICATES: [(&str, TextColumnPredicate); 3] = [
    ("explicit", explicit_text_column),
    ("known name", known_text_column),
    ("longest cells", longest_text_column),
];

fn explicit_text_column(table: &InputTable, hints: &ColumnHints<'_>) -> AxisResult<Option<usize>> {
    match hints.text_col {
        None => Ok(None),
        Some(name) => table
            .headers
            .iter()
            .position(|h| h == name)
            .map(Some)
            .ok_or_else(|| {
                AxisError::invalid_input(format!(
                    "text column '{}' not found; available: {:?}",
                    name, table.headers
                ))
            }),
    }
}

fn known_text_column(table: &InputTable, _: &ColumnHints<'_>) -> AxisResult<Option<usize>> {
    Ok(KNOWN_TEXT_COLUMNS.iter().find_map(|known| {
        let known = known.to_lowercase();
        table
            .headers
            .iter()
            .position(|h| h.trim().to_lowercase() == known)
    }))
}

fn longest_text_column(table: &InputTable, _: &ColumnHints<'_>) -> AxisResult<Option<usize>> {
    let n = table.rows.len().max(1) as f64;
    Ok((0..table.headers.len())
        .map(|c| {
            let total: usize = (0..table.rows.len())
                .map(|r| table.cell(r, c).chars().count())
                .sum();
            (c, total as f64 / n)
        })
        .fold(None, |best: Option<(usize, f64)>, (c, avg)| match best {
            Some((_, b)) if b >= avg => best,
            _ => Some((c, avg)),
        })
        .map(|(c, _)| c))
}

/// Resolve the text and id columns.
///
/// # Errors
///
/// `AxisError::InvalidInput` when an explicit text column is missing or the table has no columns.
pub fn resolve_columns(table: &InputTable, hints: &ColumnHints<'_>) -> AxisResult<ColumnSelection> {
    let mut resolved = None;
    for (name, predicate) in TEXT_COLUMN_PREDICATES {
        if let Some(col) = predicate(table, hints)? {
            resolved = Some((name, col));
            break;
        }
    }
    let (rule, text) = resolved.ok_or_else(|| {
        AxisError::invalid_input("could not detect a text column; name one explicitly")
    })?;

    let id = match hints.id_col {
        Some(name) => {
            let found = table.headers.iter().position(|h| h == name);
            if found.is_none() {
                warn!(target: "semaxis::input", id_col = name, "id column not found; numbering rows");
            }
            found
        }
        None => None,
    };

    let selection = ColumnSelection {
        text,
        text_name: table.headers[text].clone(),
        id,
        id_name: id.map(|i| table.headers[i].clone()),
    };
    info!(
        target: "semaxis::input",
        text_col = %selection.text_name,
        id_col = ?selection.id_name,
        rule = rule,
        "Resolved input columns"
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> InputTable {
        InputTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_explicit_column_wins() {
        let t = table(&["Text", "note"], &[&["a", "bbbbbbbb"]]);
        let sel = resolve_columns(&t, &ColumnHints { text_col: Some("note"), id_col: None }).unwrap();
        assert_eq!(sel.text_name, "note");
    }

    #[test]
    fn test_missing_explicit_column_is_error() {
        let t = table(&["text"], &[&["a"]]);
        let err = resolve_columns(&t, &ColumnHints { text_col: Some("body"), id_col: None }).unwrap_err();
        assert!(matches!(err, AxisError::InvalidInput(_)));
    }

    #[test]
    fn test_known_name_case_insensitive() {
        let t = table(&["id", "Comment", "long"], &[&["1", "x", "a much longer cell"]]);
        let sel = resolve_columns(&t, &ColumnHints::default()).unwrap();
        assert_eq!(sel.text_name, "Comment");
    }

    #[test]
    fn test_known_japanese_header() {
        let t = table(&["番号", "本文"], &[&["1", "こんにちは"]]);
        let sel = resolve_columns(&t, &ColumnHints::default()).unwrap();
        assert_eq!(sel.text, 1);
    }

    #[test]
    fn test_longest_column_fallback() {
        let t = table(&["a", "b"], &[&["x", "several words here"], &["y", "more words"]]);
        let sel = resolve_columns(&t, &ColumnHints::default()).unwrap();
        assert_eq!(sel.text_name, "b");
    }

    #[test]
    fn test_no_columns_is_error() {
        let t = InputTable::default();
        assert!(resolve_columns(&t, &ColumnHints::default()).is_err());
    }

    #[test]
    fn test_missing_id_column_numbers_rows() {
        let t = table(&["text"], &[&["  first\nrow "], &["second"]]);
        let sel = resolve_columns(&t, &ColumnHints { text_col: None, id_col: Some("uid") }).unwrap();
        assert_eq!(sel.id, None);

        let records = t.records(&sel);
        assert_eq!(records[0].id, "0");
        assert_eq!(records[0].text, "first row");
        assert_eq!(records[1].id, "1");
    }

    #[test]
    fn test_id_column_values_are_used() {
        let t = table(&["uid", "text"], &[&["A-1", "hello"]]);
        let sel = resolve_columns(&t, &ColumnHints { text_col: None, id_col: Some("uid") }).unwrap();
        assert_eq!(t.records(&sel)[0].id, "A-1");
    }
}
