use ratelink_core::IntegrationError;
use thiserror::Error;

/// File-level failures. Row-level problems never surface here; they are
/// collected into the validation report and import result instead.
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== File errors =====
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File is {size} bytes, above the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("File is not valid text: {0}")]
    Encoding(String),

    // ===== Parse errors =====
    #[error("CSV parse failed: {0}")]
    CsvParse(#[from] csv::Error),

    #[error("Spreadsheet parse failed: {0}")]
    SpreadsheetParse(String),

    #[error("Sheet '{requested}' not found (available: {available})")]
    SheetNotFound { requested: String, available: String },

    #[error("File has no header row")]
    MissingHeader,

    // ===== Configuration errors =====
    #[error(transparent)]
    Mapping(#[from] IntegrationError),

    #[error("Export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
