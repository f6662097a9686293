//! Export of canonical records to delimited text or JSON

use ratelink_core::{value_to_text, Record};
use ratelink_mapping::FieldMapper;
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::error::{ImportError, Result};
use crate::reader::FileFormat;
use crate::template::delimiter_for;

/// Header for exported rows: mapped source fields first, then any other
/// keys in the order they are first seen.
pub fn export_header(mapper: Option<&FieldMapper>, rows: &[Record]) -> Vec<String> {
    let mut header: Vec<String> = mapper
        .map(|m| m.source_fields().into_iter().map(str::to_string).collect())
        .unwrap_or_default();
    for row in rows {
        for key in row.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }
    header
}

/// Reverse-map `records` (when a mapper is given) and write them to `path`.
/// Returns the number of records written.
pub fn export_records(path: &Path, records: &[Record], mapper: Option<&FieldMapper>) -> Result<usize> {
    let format = FileFormat::for_export(path)?;

    let rows: Vec<Record> = match mapper {
        Some(mapper) => records.iter().map(|r| mapper.reverse_map(r)).collect(),
        None => records.to_vec(),
    };

    match format {
        FileFormat::Json => {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(file, &rows).map_err(|e| ImportError::Export(e.to_string()))?;
        }
        FileFormat::Delimited => {
            let header = export_header(mapper, &rows);
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter_for(path))
                .from_path(path)?;
            writer.write_record(&header)?;
            for row in &rows {
                writer.write_record(header.iter().map(|h| cell(row, h)))?;
            }
            writer.flush()?;
        }
        FileFormat::Spreadsheet => {
            return Err(ImportError::UnsupportedFormat("spreadsheet export".to_string()))
        }
    }

    info!(path = %path.display(), records = rows.len(), "Exported records");
    Ok(rows.len())
}

fn cell(row: &Record, header: &str) -> String {
    row.get(header)
        .or_else(|| {
            // dotted source fields are nested by reverse mapping
            let (head, rest) = header.split_once('.')?;
            ratelink_core::value_at_path(row.get(head)?, rest)
        })
        .map(value_to_text)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratelink_mapping::{FieldMapping, MappingSpec};
    use serde_json::json;

    fn canonical(name: &str, rate: f64) -> Record {
        json!({"full_name": name, "standard_rate": rate, "note": "x"})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn mapper() -> FieldMapper {
        FieldMapper::new(
            MappingSpec::new()
                .field("full_name", FieldMapping::new("Name"))
                .field("standard_rate", FieldMapping::new("Rate").with_transform("float", Value::Null)),
        )
        .unwrap()
    }

    #[test]
    fn test_csv_export_orders_mapped_columns_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let written = export_records(&path, &[canonical("Jane", 500.0)], Some(&mapper())).unwrap();
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name,Rate,note");
        assert_eq!(lines[1], "Jane,500.0,x");
    }

    #[test]
    fn test_json_export_without_mapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        export_records(&path, &[canonical("Jane", 1.5)], None).unwrap();
        let back: Vec<Record> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![canonical("Jane", 1.5)]);
    }

    #[test]
    fn test_spreadsheet_export_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_records(&dir.path().join("out.xlsx"), &[], None).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
