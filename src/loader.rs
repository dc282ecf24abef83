use crate::error::{InputKind, ReportError, Result};
use crate::models::{Cell, Table};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Reads one of the two input CSV files from disk.
pub fn load_table(path: Option<&Path>, which: InputKind) -> Result<Table> {
    let path = match path {
        Some(p) if p.is_file() => p,
        _ => return Err(ReportError::MissingInput { which }),
    };

    let source_name = path.display().to_string();
    let file = File::open(path).map_err(|e| ReportError::MalformedTable {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;

    let table = parse_table(file, &source_name)?;
    debug!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        table.name
    );
    Ok(table)
}

/// Parses comma separated text with a header row into a table.
pub fn parse_table<R: Read>(input: R, source_name: &str) -> Result<Table> {
    let malformed = |reason: String| ReportError::MalformedTable {
        source_name: source_name.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| malformed(e.to_string()))?
        .clone();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(malformed("No columns to parse from file".to_string()));
    }

    let columns = dedupe_column_names(headers.iter());
    let mut table = Table::new(source_name, columns);
    let width = table.columns.len();

    for result in reader.records() {
        let record = result.map_err(|e| malformed(e.to_string()))?;

        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(malformed(format!(
                "Expected {} fields in line {}, saw {}",
                width,
                line,
                record.len()
            )));
        }

        let mut row: Vec<Cell> = record.iter().map(Cell::from_field).collect();
        row.resize(width, Cell::Empty);
        table.rows.push(row);
    }

    Ok(table)
}

/// Later duplicates of a header name get `.1`, `.2`, ... appended.
fn dedupe_column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::new();

    for header in headers {
        let mut name = header.to_string();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", header, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        columns.push(name);
    }

    columns
}
