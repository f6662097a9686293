//! File import pipeline
//!
//! `import_file` runs: file checks, parse, validation, cleanup, mapping and
//! hand-off to a [`RecordSink`]. File-level problems are returned as
//! [`ImportError`]; everything about individual rows ends up in the
//! [`ImportOutcome`].

use ratelink_core::{CancellationToken, DataType, ImportResult, IntegrationError, Record, ValidationReport};
use ratelink_mapping::{FieldMapper, MappingSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::checksum::{file_sha256, sha256_hex};
use crate::cleaner::DataCleaner;
use crate::error::{ImportError, Result};
use crate::export::export_records;
use crate::reader::{read_delimited, read_spreadsheet, FileFormat, ParsedTable};
use crate::schema::ImportSchema;
use crate::sink::{RecordSink, UpsertOutcome};
use crate::template::write_template;
use crate::validate::{validate_table, ValidationOptions};

/// Default upload limit: 50 MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub max_file_size: u64,
    /// Sheet to read from a workbook; the first sheet when unset
    pub sheet: Option<String>,
    /// Delimiter for text files; sniffed when unset
    pub delimiter: Option<char>,
    pub validation: ValidationOptions,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            sheet: None,
            delimiter: None,
            validation: ValidationOptions::default(),
        }
    }
}

impl ImportOptions {
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_validation(mut self, validation: ValidationOptions) -> Self {
        self.validation = validation;
        self
    }

    fn delimiter_byte(&self) -> Result<Option<u8>> {
        match self.delimiter {
            None => Ok(None),
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => Err(ImportError::Mapping(IntegrationError::configuration(format!(
                "Delimiter '{}' is not a single-byte character",
                c
            )))),
        }
    }
}

/// Everything an import produced
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub result: ImportResult,
    pub report: ValidationReport,
    /// Canonical records that passed validation, in file order
    pub records: Vec<Record>,
    /// Hex SHA-256 of the file contents
    pub checksum: String,
    pub rows_read: usize,
}

/// Parsed file plus its checksum
struct LoadedFile {
    table: ParsedTable,
    checksum: String,
}

/// Stateless between calls; one pipeline can serve many files at once.
/// Cancellation is per call, so cancelling one import leaves later ones alone.
#[derive(Debug, Clone, Default)]
pub struct FileImportPipeline {
    options: ImportOptions,
}

impl FileImportPipeline {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Check and parse a file without validating it
    pub fn read(&self, path: &Path) -> Result<ParsedTable> {
        Ok(self.load(path)?.table)
    }

    fn load(&self, path: &Path) -> Result<LoadedFile> {
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let format = FileFormat::for_import(path)?;

        let size = std::fs::metadata(path)?.len();
        if size > self.options.max_file_size {
            return Err(ImportError::FileTooLarge {
                size,
                max: self.options.max_file_size,
            });
        }

        match format {
            FileFormat::Delimited => {
                let bytes = std::fs::read(path)?;
                let table = read_delimited(&bytes, self.options.delimiter_byte()?)?;
                Ok(LoadedFile {
                    table,
                    checksum: sha256_hex(&bytes),
                })
            }
            FileFormat::Spreadsheet => Ok(LoadedFile {
                table: read_spreadsheet(path, self.options.sheet.as_deref())?,
                checksum: file_sha256(path)?,
            }),
            FileFormat::Json => Err(ImportError::UnsupportedFormat(".json".to_string())),
        }
    }

    /// Structural and business-rule validation only; nothing is imported
    pub fn validate_file(
        &self,
        path: &Path,
        kind: DataType,
        cancel: Option<&CancellationToken>,
    ) -> Result<ValidationReport> {
        let loaded = self.load(path)?;
        let schema = ImportSchema::for_kind(kind);
        Ok(validate_table(&loaded.table, &schema, &self.options.validation, cancel))
    }

    /// Validate, clean and map every row, handing valid records to `sink`.
    ///
    /// Rows with validation errors are skipped and their errors copied into
    /// the result. Without a sink every valid row counts as created. A
    /// missing required column stops the import before any row is mapped.
    /// Header variants the validator accepts (case, spacing, a trailing `*`)
    /// are renamed to the schema column before mapping.
    ///
    /// `cancel` is checked between rows; a cancelled import returns the rows
    /// handled so far with `result.cancelled` set.
    pub fn import_file(
        &self,
        path: &Path,
        kind: DataType,
        mapping_override: Option<&MappingSpec>,
        sink: Option<&dyn RecordSink>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ImportOutcome> {
        let schema = ImportSchema::for_kind(kind);
        let mapper = mapper_for(&schema, mapping_override)?;
        let LoadedFile { table, checksum } = self.load(path)?;

        info!(
            path = %path.display(),
            data_type = %kind,
            rows = table.len(),
            checksum = %checksum,
            "Importing file"
        );

        let report = validate_table(&table, &schema, &self.options.validation, cancel);
        let mut result = ImportResult {
            warnings: report.warnings.clone(),
            ..Default::default()
        };

        if !report.general_errors().is_empty() {
            result.errors = report.flattened_errors();
            warn!(path = %path.display(), errors = result.errors.len(), "Import rejected");
            return Ok(ImportOutcome {
                result,
                report,
                records: Vec::new(),
                checksum,
                rows_read: table.len(),
            });
        }

        let cleaner = DataCleaner::for_table(&table);
        let aliases = schema.header_aliases(&table.headers);
        if !aliases.is_empty() {
            debug!(renamed = aliases.len(), "Renaming header variants to schema columns");
        }
        let mut records = Vec::with_capacity(table.len());

        for row in &table.rows {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                result.cancelled = true;
                info!(processed = result.processed(), total = table.len(), "Import cancelled");
                break;
            }

            let row_errors = report.row_errors(row.number);
            if !row_errors.is_empty() {
                result.skipped += 1;
                result
                    .errors
                    .extend(row_errors.iter().map(|e| format!("Row {}: {}", row.number, e)));
                continue;
            }

            let cleaned = cleaner.clean_row(row).with_headers(&aliases);
            let mapped = mapper.map(&cleaned.record);
            result.warnings.extend(
                mapped
                    .warnings
                    .iter()
                    .map(|w| format!("Row {}: {}", row.number, w)),
            );

            match sink.map(|s| s.upsert(kind, &mapped.record)) {
                None | Some(Ok(UpsertOutcome::Created)) => result.created += 1,
                Some(Ok(UpsertOutcome::Updated)) => result.updated += 1,
                Some(Ok(UpsertOutcome::Skipped)) => result.skipped += 1,
                Some(Err(message)) => {
                    debug!(row = row.number, error = %message, "Sink rejected record");
                    result.errors.push(format!("Row {}: {}", row.number, message));
                    continue;
                }
            }
            records.push(mapped.record);
        }

        result.success = result.errors.is_empty() && !result.cancelled;

        info!(
            path = %path.display(),
            data_type = %kind,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            cancelled = result.cancelled,
            "Import finished"
        );

        Ok(ImportOutcome {
            result,
            report,
            records,
            checksum,
            rows_read: table.len(),
        })
    }

    /// Write canonical records using the import layout of `kind`, so the
    /// file can be imported again.
    pub fn export_file(
        &self,
        path: &Path,
        kind: DataType,
        records: &[Record],
        mapping_override: Option<&MappingSpec>,
    ) -> Result<ImportResult> {
        let mapper = mapper_for(&ImportSchema::for_kind(kind), mapping_override)?;
        let written = export_records(path, records, Some(&mapper))?;
        Ok(ImportResult {
            success: true,
            created: written,
            ..Default::default()
        })
    }

    /// Header-only template for `kind`
    pub fn create_template(&self, path: &Path, kind: DataType) -> Result<Vec<String>> {
        write_template(path, &ImportSchema::for_kind(kind))
    }
}

fn mapper_for(schema: &ImportSchema, mapping_override: Option<&MappingSpec>) -> Result<FieldMapper> {
    let spec = match mapping_override {
        Some(overrides) => schema.default_mapping().merged_with(overrides),
        None => schema.default_mapping(),
    };
    Ok(FieldMapper::new(spec)?)
}
