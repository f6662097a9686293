//! Column type inference
//!
//! Inference only steers cleanup (which columns get numbers stripped and
//! dates normalised). Validation never relies on it.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::reader::ParsedTable;
use crate::validate::{parse_date, parse_decimal};

/// Non-blank values sampled per column
pub const INFERENCE_SAMPLE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Date => "date",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

/// Narrowest type every sampled value fits; empty samples are strings
pub fn infer_column<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnType {
    let sample: Vec<&str> = values
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(INFERENCE_SAMPLE)
        .collect();

    if sample.is_empty() {
        return ColumnType::String;
    }

    let numbers: Option<Vec<_>> = sample.iter().map(|s| parse_decimal(s)).collect();
    if let Some(numbers) = numbers {
        return if numbers.iter().all(|n| n.normalize().scale() == 0) {
            ColumnType::Integer
        } else {
            ColumnType::Float
        };
    }

    if sample.iter().all(|s| parse_date(s).is_some()) {
        return ColumnType::Date;
    }

    ColumnType::String
}

pub fn infer_types(table: &ParsedTable) -> HashMap<String, ColumnType> {
    table
        .headers
        .iter()
        .map(|h| (h.clone(), infer_column(table.column(h))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn infer(values: &[Value]) -> ColumnType {
        infer_column(values.iter())
    }

    #[test]
    fn test_numeric_columns() {
        assert_eq!(infer(&[json!("1"), json!("2,000"), Value::Null]), ColumnType::Integer);
        assert_eq!(infer(&[json!("$1.50"), json!("2")]), ColumnType::Float);
    }

    #[test]
    fn test_date_and_string_columns() {
        assert_eq!(infer(&[json!("2025-01-01"), json!("03/04/2024")]), ColumnType::Date);
        assert_eq!(infer(&[json!("2025-01-01"), json!("soon")]), ColumnType::String);
        assert_eq!(infer(&[]), ColumnType::String);
    }
}
