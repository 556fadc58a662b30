use std::io::Read;
use thiserror::Error;
use tracing::info;

use crate::table::ParsedTable;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("No header row")]
    NoHeader,
    #[error("No data rows")]
    NoDataRows,
}

/// Reads a comma-separated export into a [`ParsedTable`].
pub fn read_table<R: Read>(data: R) -> Result<ParsedTable, CsvError> {
    read_table_with_delimiter(data, b',')
}

/// Like [`read_table`] for `;` or tab separated exports. Rows may be ragged;
/// the field resolver treats missing cells as blank.
pub fn read_table_with_delimiter<R: Read>(data: R, delimiter: u8) -> Result<ParsedTable, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeader);
    }

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize);
        lines.push(line.unwrap_or_else(|| rows.len() + 2));
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if rows.is_empty() {
        return Err(CsvError::NoDataRows);
    }

    info!(columns = headers.len(), rows = rows.len(), "read csv table");
    Ok(ParsedTable::new(headers, rows).with_source_lines(lines))
}

/// Guesses the delimiter from the header line: `;` or tab when either
/// outnumbers commas, else `,`.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let first = sample.lines().next().unwrap_or_default();
    let count = |c: char| first.matches(c).count();
    let (commas, semis, tabs) = (count(','), count(';'), count('\t'));
    if tabs > commas && tabs >= semis {
        b'\t'
    } else if semis > commas {
        b';'
    } else {
        b','
    }
}
