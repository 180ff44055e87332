//! CSV input loading and input/embedding file detection.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semaxis_core::columns::InputTable;
use tracing::info;

const DEFAULT_INPUT: &str = "input.csv";
const UTF8_BOM: char = '\u{feff}';
const EMBEDDINGS_SUFFIX: &str = "_embeddings";

/// `input.csv` in `dir`, else the most recently modified `*.csv` there that is
/// not an `<stem>_embeddings.csv` companion.
pub fn detect_input(dir: &Path) -> Result<Option<PathBuf>> {
    let default = dir.join(DEFAULT_INPUT);
    if default.is_file() {
        return Ok(Some(default));
    }
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let is_embeddings = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.ends_with(EMBEDDINGS_SUFFIX))
            .unwrap_or(false);
        if !is_csv || is_embeddings || !path.is_file() {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, p)| p))
}

/// `<stem>_embeddings.json` or `<stem>_embeddings.csv` next to the input.
pub fn detect_embeddings(input: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_str()?;
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    ["json", "csv"]
        .iter()
        .map(|ext| dir.join(format!("{}{}.{}", stem, EMBEDDINGS_SUFFIX, ext)))
        .find(|p| p.is_file())
}

/// Read a UTF-8 CSV with a header row; a leading byte-order mark is dropped.
pub fn load_table(path: &Path) -> Result<InputTable> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let table = parse_table(content.strip_prefix(UTF8_BOM).unwrap_or(&content))
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(
        target: "semaxis::input",
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        "Loaded input table"
    );
    Ok(table)
}

fn parse_table(content: &str) -> Result<InputTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(InputTable::new(headers, rows))
}
