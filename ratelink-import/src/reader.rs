//! File readers
//!
//! Both readers produce a [`ParsedTable`]: trimmed headers plus one
//! [`ParsedRow`] per non-blank data row, keyed by header. Every cell is a
//! string or null regardless of source, so the validators see delimited text
//! and spreadsheets the same way. Row numbers are the row a user sees in
//! their editor: the header is row 1 and the first data row is row 2.

use calamine::{open_workbook_auto, Data, DataType, Reader};
use ratelink_core::Record;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::{ImportError, Result};

/// Delimiters considered by [`detect_delimiter`], in tie-break order
pub const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Lines inspected when sniffing the delimiter
pub const SNIFF_LINES: usize = 5;

/// Row number of the first data row
pub const FIRST_DATA_ROW: usize = 2;

/// File formats the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited,
    Spreadsheet,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(FileFormat::Delimited),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileFormat::Spreadsheet),
            "json" => Ok(FileFormat::Json),
            "" => Err(ImportError::UnsupportedFormat("<no extension>".to_string())),
            other => Err(ImportError::UnsupportedFormat(format!(".{}", other))),
        }
    }

    /// Import accepts delimited text and spreadsheets
    pub fn for_import(path: &Path) -> Result<Self> {
        match Self::from_path(path)? {
            FileFormat::Json => Err(ImportError::UnsupportedFormat(
                ".json (import accepts .csv, .tsv, .txt, .xlsx, .xlsm, .xlsb, .xls, .ods)".to_string(),
            )),
            format => Ok(format),
        }
    }

    /// Export writes delimited text and JSON
    pub fn for_export(path: &Path) -> Result<Self> {
        match Self::from_path(path)? {
            FileFormat::Spreadsheet => Err(ImportError::UnsupportedFormat(
                "spreadsheet export (use .csv, .tsv or .json)".to_string(),
            )),
            format => Ok(format),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub number: usize,
    pub values: Record,
}

impl ParsedRow {
    pub fn get(&self, header: &str) -> Option<&Value> {
        self.values.get(header)
    }

    pub fn is_blank(&self) -> bool {
        self.values.values().all(ratelink_core::is_blank)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
    /// Delimiter used for delimited text
    pub delimiter: Option<u8>,
    /// Sheet read from a spreadsheet
    pub sheet: Option<String>,
}

impl ParsedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell values of one column in row order
    pub fn column<'a>(&'a self, header: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().filter_map(move |row| row.get(header))
    }
}

/// Pick the candidate separator that occurs most often in the first lines.
///
/// Counts ignore quoted sections. Ties go to the earlier candidate, and text
/// with none of them is treated as comma separated.
pub fn detect_delimiter(text: &str) -> u8 {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];

    for line in text.lines().take(SNIFF_LINES) {
        let mut in_quotes = false;
        for byte in line.bytes() {
            if byte == b'"' {
                in_quotes = !in_quotes;
                continue;
            }
            if in_quotes {
                continue;
            }
            if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
                counts[idx] += 1;
            }
        }
    }

    let mut best = 0;
    for idx in 1..counts.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    CANDIDATE_DELIMITERS[best]
}

/// Decode file bytes, honouring UTF-8 and UTF-16 byte order marks
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(|e| ImportError::Encoding(e.to_string()));
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }

    String::from_utf8(bytes.to_vec())
        .map_err(|e| ImportError::Encoding(format!("{} (expected UTF-8)", e)))
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(ImportError::Encoding("truncated UTF-16 text".to_string()));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| ImportError::Encoding(e.to_string()))
}

/// Parse delimited text; the delimiter is sniffed when not given
pub fn read_delimited(bytes: &[u8], delimiter: Option<u8>) -> Result<ParsedTable> {
    let text = decode_text(bytes)?;
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&text));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = normalize_headers(reader.headers()?.iter().map(str::to_string))?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + FIRST_DATA_ROW);

        let cells = record.iter().map(|cell| {
            if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            }
        });
        let row = build_row(number, &headers, cells);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    debug!(
        delimiter = %(delimiter as char).escape_default(),
        columns = headers.len(),
        rows = rows.len(),
        "Parsed delimited file"
    );

    Ok(ParsedTable {
        headers,
        rows,
        delimiter: Some(delimiter),
        sheet: None,
    })
}

/// Parse one sheet of a workbook, by name or the first one
pub fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<ParsedTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ImportError::SpreadsheetParse(e.to_string()))?;

    let names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(requested) => names
            .iter()
            .find(|name| name.as_str() == requested || name.eq_ignore_ascii_case(requested))
            .cloned()
            .ok_or_else(|| ImportError::SheetNotFound {
                requested: requested.to_string(),
                available: names.join(", "),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::SpreadsheetParse("Workbook has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::SpreadsheetParse(e.to_string()))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut lines = range.rows();
    let header_row = lines.next().ok_or(ImportError::MissingHeader)?;
    let headers = normalize_headers(header_row.iter().map(|cell| cell_text(cell).unwrap_or_default()))?;

    let mut rows = Vec::new();
    for (idx, cells) in lines.enumerate() {
        // header sits on spreadsheet row first_row + 1
        let number = first_row + idx + FIRST_DATA_ROW;
        let values = cells.iter().map(|cell| match cell_text(cell) {
            Some(text) if !text.is_empty() => Value::String(text),
            _ => Value::Null,
        });
        let row = build_row(number, &headers, values);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    debug!(sheet = %sheet_name, columns = headers.len(), rows = rows.len(), "Parsed spreadsheet");

    Ok(ParsedTable {
        headers,
        rows,
        delimiter: None,
        sheet: Some(sheet_name),
    })
}

const UNNAMED_PREFIX: &str = "Column ";

/// Trim headers, name blank ones by position and suffix duplicates.
/// A header row with no named column at all is a missing header.
fn normalize_headers(raw: impl Iterator<Item = String>) -> Result<Vec<String>> {
    let mut headers: Vec<String> = Vec::new();
    let mut named = 0;
    for (idx, header) in raw.enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("{}{}", UNNAMED_PREFIX, idx + 1)
        } else {
            named += 1;
            trimmed.to_string()
        };

        let mut name = base.clone();
        let mut n = 2;
        while headers.contains(&name) {
            name = format!("{} ({})", base, n);
            n += 1;
        }
        headers.push(name);
    }
    if named == 0 {
        return Err(ImportError::MissingHeader);
    }
    Ok(headers)
}

fn build_row(number: usize, headers: &[String], cells: impl Iterator<Item = Value>) -> ParsedRow {
    let mut values = Record::new();
    let mut cells = cells;
    for header in headers {
        values.insert(header.clone(), cells.next().unwrap_or(Value::Null));
    }
    ParsedRow { number, values }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) => cell.as_datetime().map(|dt| {
            if dt.time() == chrono::NaiveTime::MIN {
                dt.date().format("%Y-%m-%d").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}
