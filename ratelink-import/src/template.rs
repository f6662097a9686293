use std::path::Path;
use tracing::info;

use crate::error::{ImportError, Result};
use crate::reader::FileFormat;
use crate::schema::ImportSchema;

/// Delimiter implied by an output file's extension
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Write an empty import file containing only the header row
pub fn write_template(path: &Path, schema: &ImportSchema) -> Result<Vec<String>> {
    if FileFormat::for_export(path)? != FileFormat::Delimited {
        return Err(ImportError::UnsupportedFormat(
            "templates are written as .csv or .tsv".to_string(),
        ));
    }

    let header = schema.template_header();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_path(path)?;
    writer.write_record(&header)?;
    writer.flush()?;

    info!(kind = %schema.kind, path = %path.display(), columns = header.len(), "Wrote import template");
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratelink_core::DataType;

    #[test]
    fn test_template_file_has_marked_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");

        write_template(&path, &ImportSchema::for_kind(DataType::Rate)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("Firm Name,Attorney Name,Rate Amount,Currency,Effective Date,Attorney ID*"));
    }

    #[test]
    fn test_spreadsheet_template_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_template(&dir.path().join("rates.xlsx"), &ImportSchema::for_kind(DataType::Rate))
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
