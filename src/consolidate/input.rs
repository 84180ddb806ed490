//! Reading extracted line items from CSV files
//!
//! The extractor writes one file per statement, laid out as
//! `{ticker}/{year}/{statement}.csv`. Files are read recursively in path
//! order; a file that cannot be parsed is logged and skipped.

use crate::consolidate::model::{parse_confidence, RawLineItem, StatementType, DEFAULT_CONFIDENCE};
use crate::FinderError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    line_item: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    found_in_document: Option<String>,
    #[serde(default)]
    statement: Option<String>,
    #[serde(default)]
    source_document: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    source_rank: Option<u32>,
}

/// Items read from an input directory
#[derive(Debug, Default)]
pub struct LoadedItems {
    pub items: Vec<RawLineItem>,
    pub files_read: usize,
    /// Files skipped, with the reason
    pub files_failed: Vec<(PathBuf, String)>,
}

/// Parses a CSV cell as a number
///
/// Empty cells and NaN markers are missing values. Thousands separators are
/// ignored and `(123)` is read as negative.
pub fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || ["nan", "none", "null", "n/a", "-"].contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }

    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn parse_bool(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "y")
    )
}

/// Year from a cell like "2024" or "2024.0"
fn parse_year(raw: &str) -> Option<i32> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.fract() != 0.0 || !(1900.0..=2099.0).contains(&value) {
        return None;
    }
    Some(value as i32)
}

/// Finds every `.csv` file under `dir`, sorted by path
pub fn find_csv_files(dir: &Path) -> Result<Vec<PathBuf>, FinderError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Reads one CSV file
///
/// `relative` names the file in errors and is the default source document.
/// The statement falls back to the file stem, the ticker and year to the
/// enclosing directories.
pub fn read_line_items(path: &Path, relative: &str) -> Result<Vec<RawLineItem>, FinderError> {
    let file_statement = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(StatementType::parse);
    let mut components = Path::new(relative)
        .components()
        .rev()
        .skip(1)
        .filter_map(|c| c.as_os_str().to_str());
    let dir_year = components.next().and_then(parse_year);
    let dir_ticker = components.next().map(str::to_string);

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut items = Vec::new();

    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        if row.line_item.is_empty() {
            continue;
        }

        let Some(year) = row.year.as_deref().and_then(parse_year).or(dir_year) else {
            tracing::warn!("{}: row {} has no usable year, skipping", relative, line + 2);
            continue;
        };

        let ticker = if row.ticker.is_empty() {
            dir_ticker.clone().unwrap_or_default()
        } else {
            row.ticker
        };

        let confidence = match row.confidence.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => parse_confidence(raw).unwrap_or_else(|| {
                tracing::debug!("{}: unreadable confidence '{}'", relative, raw);
                DEFAULT_CONFIDENCE
            }),
            None => DEFAULT_CONFIDENCE,
        };

        items.push(RawLineItem {
            term: row.line_item,
            value: row.value.as_deref().and_then(parse_value),
            currency: row.currency.to_uppercase(),
            year,
            category: row.category,
            ticker,
            found_in_document: parse_bool(row.found_in_document.as_deref()),
            statement: row
                .statement
                .as_deref()
                .and_then(StatementType::parse)
                .or(file_statement),
            source_document: row
                .source_document
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| relative.to_string()),
            confidence,
            source_rank: row.source_rank.unwrap_or(0),
        });
    }

    Ok(items)
}

/// Reads every CSV file under `dir`
///
/// Only a missing or unreadable directory is an error.
pub fn load_line_items(dir: &Path) -> Result<LoadedItems, FinderError> {
    let files = find_csv_files(dir)?;
    tracing::info!("Found {} CSV files under {}", files.len(), dir.display());

    let mut loaded = LoadedItems::default();
    for path in files {
        let relative = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        match read_line_items(&path, &relative) {
            Ok(items) => {
                tracing::debug!("Read {} line items from {}", items.len(), relative);
                loaded.files_read += 1;
                loaded.items.extend(items);
            }
            Err(e) => {
                tracing::error!("Failed to read {}: {}", relative, e);
                loaded.files_failed.push((path, e.to_string()));
            }
        }
    }

    Ok(loaded)
}
