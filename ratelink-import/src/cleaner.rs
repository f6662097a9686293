//! Row cleanup between validation and mapping
//!
//! Trims text, normalises null tokens, strips currency formatting from
//! numeric columns and rewrites dates to ISO `YYYY-MM-DD`. Known schema
//! columns use their declared type; other columns use the inferred one.

use ratelink_core::Record;
use serde_json::Value;
use std::collections::HashMap;

use crate::infer::{infer_types, ColumnType};
use crate::reader::{ParsedRow, ParsedTable};
use crate::schema::*;
use crate::validate::{parse_date, parse_decimal};

/// Cell contents treated as empty
const NULL_TOKENS: [&str; 6] = ["n/a", "na", "null", "none", "-", "--"];

/// Declared type of a well-known column
pub fn declared_type(header: &str) -> Option<ColumnType> {
    let key = header.trim().trim_end_matches(OPTIONAL_MARKER).trim();
    [RATE_AMOUNT, HISTORICAL_RATE, HOURS, FEES]
        .iter()
        .any(|h| h.eq_ignore_ascii_case(key))
        .then_some(ColumnType::Float)
        .or_else(|| {
            [
                EFFECTIVE_DATE,
                EXPIRATION_DATE,
                BAR_ADMISSION_DATE,
                GRADUATION_DATE,
                BILLING_DATE,
                OPEN_DATE,
                CLOSE_DATE,
            ]
            .iter()
            .any(|h| h.eq_ignore_ascii_case(key))
            .then_some(ColumnType::Date)
        })
}

#[derive(Debug, Clone)]
pub struct CleanRow {
    pub number: usize,
    pub record: Record,
}

impl CleanRow {
    /// Rename keys found in `aliases`; other keys are kept as read
    pub fn with_headers(self, aliases: &HashMap<String, String>) -> Self {
        if aliases.is_empty() {
            return self;
        }
        let record = self
            .record
            .into_iter()
            .map(|(header, value)| match aliases.get(&header) {
                Some(column) => (column.clone(), value),
                None => (header, value),
            })
            .collect();
        Self {
            number: self.number,
            record,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataCleaner {
    types: HashMap<String, ColumnType>,
}

impl DataCleaner {
    /// Cleaner for one table, with column types fixed up front
    pub fn for_table(table: &ParsedTable) -> Self {
        let mut types = infer_types(table);
        for (header, ty) in types.iter_mut() {
            if let Some(declared) = declared_type(header) {
                *ty = declared;
            }
        }
        Self { types }
    }

    pub fn column_type(&self, header: &str) -> ColumnType {
        self.types.get(header).copied().unwrap_or(ColumnType::String)
    }

    pub fn clean_text(&self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() || NULL_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(trimmed)) {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Clean one cell. Values that do not fit the column type stay as text.
    pub fn clean_value(&self, header: &str, value: &Value) -> Value {
        let Some(text) = value.as_str().and_then(|s| self.clean_text(s)) else {
            return match value {
                Value::String(_) => Value::Null,
                other => other.clone(),
            };
        };

        match self.column_type(header) {
            ColumnType::Integer | ColumnType::Float => match parse_decimal(&text) {
                Some(number) => Value::String(number.normalize().to_string()),
                None => Value::String(text),
            },
            ColumnType::Date => match parse_date(&text) {
                Some(date) => Value::String(date.format(CANONICAL_DATE_FORMAT).to_string()),
                None => Value::String(text),
            },
            ColumnType::String => Value::String(text),
        }
    }

    pub fn clean_row(&self, row: &ParsedRow) -> CleanRow {
        let record = row
            .values
            .iter()
            .map(|(header, value)| (header.clone(), self.clean_value(header, value)))
            .collect();
        CleanRow {
            number: row.number,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_delimited;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_cleanup_normalises_numbers_dates_and_nulls() {
        let table = read_delimited(
            b"Attorney Name,Rate Amount,Effective Date,Office\n  Jane Smith ,\"$1,250.00\",01/15/2025,N/A\n",
            None,
        )
        .unwrap();
        let cleaner = DataCleaner::for_table(&table);
        let row = cleaner.clean_row(&table.rows[0]);

        assert_eq!(row.number, 2);
        assert_eq!(row.record["Attorney Name"], json!("Jane Smith"));
        assert_eq!(row.record["Rate Amount"], json!("1250"));
        assert_eq!(row.record["Effective Date"], json!("2025-01-15"));
        assert_eq!(row.record["Office"], Value::Null);
    }

    #[test]
    fn test_with_headers_renames_only_aliased_keys() {
        let table = read_delimited(b"rate amount*,Office\n450,NY\n", None).unwrap();
        let cleaner = DataCleaner::for_table(&table);
        let aliases = HashMap::from([("rate amount*".to_string(), RATE_AMOUNT.to_string())]);

        let row = cleaner.clean_row(&table.rows[0]).with_headers(&aliases);
        assert_eq!(row.record[RATE_AMOUNT], json!("450"));
        assert_eq!(row.record["Office"], json!("NY"));
        assert!(!row.record.contains_key("rate amount*"));
    }

    #[test]
    fn test_unparseable_values_are_left_as_text() {
        let table = read_delimited(b"Hours,Notes\nabc,1\n", None).unwrap();
        let cleaner = DataCleaner::for_table(&table);
        assert_eq!(cleaner.column_type("Hours"), ColumnType::Float);
        assert_eq!(cleaner.column_type("Notes"), ColumnType::Integer);
        assert_eq!(cleaner.clean_value("Hours", &json!("abc")), json!("abc"));
    }
}
