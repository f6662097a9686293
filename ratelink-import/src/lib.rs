//! Ratelink import
//!
//! Offline data exchange through tabular files. [`FileImportPipeline`]
//! accepts delimited text (comma, semicolon or tab, sniffed from the first
//! lines) and spreadsheets, validates rows against the import kind's
//! required columns and business rules, cleans and maps them through the
//! same [`ratelink_mapping::FieldMapper`] the REST adapters use, and hands
//! the canonical records to a [`RecordSink`].
//!
//! Row-level problems never fail an import; they are reported in the
//! [`ratelink_core::ValidationReport`] and [`ratelink_core::ImportResult`].
//! Only file-level problems return an [`ImportError`].
//!
//! ```no_run
//! use ratelink_core::DataType;
//! use ratelink_import::{FileImportPipeline, ImportOptions, InMemorySink};
//! use std::path::Path;
//!
//! # fn main() -> ratelink_import::Result<()> {
//! let pipeline = FileImportPipeline::new(ImportOptions::default());
//! let sink = InMemorySink::new();
//! let outcome = pipeline.import_file(Path::new("rates.csv"), DataType::Rate, None, Some(&sink), None)?;
//! println!("{} created, {} errors", outcome.result.created, outcome.result.errors.len());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod cleaner;
pub mod error;
pub mod export;
pub mod infer;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod sink;
pub mod template;
pub mod validate;

pub use checksum::{file_sha256, sha256_hex};
pub use cleaner::{CleanRow, DataCleaner};
pub use error::{ImportError, Result};
pub use export::{export_header, export_records};
pub use infer::{infer_column, infer_types, ColumnType};
pub use pipeline::{FileImportPipeline, ImportOptions, ImportOutcome, DEFAULT_MAX_FILE_SIZE};
pub use reader::{detect_delimiter, read_delimited, read_spreadsheet, FileFormat, ParsedRow, ParsedTable};
pub use schema::{canonical_name, create_template, headers_match, ImportSchema};
pub use sink::{record_key, InMemorySink, RecordSink, UpsertOutcome};
pub use template::write_template;
pub use validate::{validate_table, ValidationOptions};
