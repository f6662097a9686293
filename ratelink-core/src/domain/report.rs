use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Key under which validation errors are grouped.
///
/// Rows sort numerically; file-wide problems sort last under `"general"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Row(usize),
    General,
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Row(n) => write!(f, "{}", n),
            RowKey::General => f.write_str("general"),
        }
    }
}

impl Serialize for RowKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RowKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "general" {
            return Ok(RowKey::General);
        }
        raw.parse::<usize>()
            .map(RowKey::Row)
            .map_err(|_| serde::de::Error::custom(format!("invalid row key '{}'", raw)))
    }
}

/// Outcome of one validation pass over an import file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: BTreeMap<RowKey, Vec<String>>,
    pub warnings: Vec<String>,
    pub suggestion: String,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    pub fn add_error(&mut self, row: usize, message: impl Into<String>) {
        self.errors.entry(RowKey::Row(row)).or_default().push(message.into());
        self.valid = false;
    }

    pub fn add_general_error(&mut self, message: impl Into<String>) {
        self.errors.entry(RowKey::General).or_default().push(message.into());
        self.valid = false;
    }

    /// Warnings never affect validity; row warnings are prefixed with the row.
    pub fn add_warning(&mut self, row: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        match row {
            Some(row) => self.warnings.push(format!("Row {}: {}", row, message)),
            None => self.warnings.push(message),
        }
    }

    pub fn row_errors(&self, row: usize) -> &[String] {
        self.errors
            .get(&RowKey::Row(row))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn general_errors(&self) -> &[String] {
        self.errors
            .get(&RowKey::General)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_row_errors(&self, row: usize) -> bool {
        !self.row_errors(row).is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Flatten grouped errors into `"Row N: message"` strings.
    pub fn flattened_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(key, messages)| {
                messages.iter().map(move |m| match key {
                    RowKey::Row(n) => format!("Row {}: {}", n, m),
                    RowKey::General => m.clone(),
                })
            })
            .collect()
    }
}

/// Counts and itemized diagnostics for one import or export call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl ImportResult {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped
    }
}

/// `{success, message}` pair returned by connection checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
}

impl ConnectionTestResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_grouping_and_validity() {
        let mut report = ValidationReport::new();
        assert!(report.valid);

        report.add_warning(Some(3), "Unusually high hours");
        assert!(report.valid);

        report.add_error(10, "b");
        report.add_error(2, "a");
        report.add_general_error("Missing required column: Currency");
        assert!(!report.valid);
        assert_eq!(report.error_count(), 3);
        assert_eq!(
            report.flattened_errors(),
            vec![
                "Row 2: a".to_string(),
                "Row 10: b".to_string(),
                "Missing required column: Currency".to_string(),
            ]
        );
        assert_eq!(report.warnings, vec!["Row 3: Unusually high hours".to_string()]);
    }

    #[test]
    fn test_row_key_serialization() {
        let mut report = ValidationReport::new();
        report.add_error(4, "Rate amount cannot be negative");
        report.add_general_error("empty file");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"]["4"][0], "Rate amount cannot be negative");
        assert_eq!(json["errors"]["general"][0], "empty file");

        let back: ValidationReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
