//! Default column layouts per import kind
//!
//! Each kind has required and optional headers, and a default mapping from
//! those headers to canonical field names. Vendor- or customer-specific files
//! layer a mapping override on top.

use ratelink_core::DataType;
use ratelink_mapping::{FieldMapping, MappingSpec};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Marker appended to optional headers in generated templates
pub const OPTIONAL_MARKER: char = '*';

/// Date format every cleaned date column is normalised to
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

// Header names shared by the validators
pub const FIRM_NAME: &str = "Firm Name";
pub const ATTORNEY_NAME: &str = "Attorney Name";
pub const ATTORNEY_ID: &str = "Attorney ID";
pub const RATE_AMOUNT: &str = "Rate Amount";
pub const CURRENCY: &str = "Currency";
pub const EFFECTIVE_DATE: &str = "Effective Date";
pub const EXPIRATION_DATE: &str = "Expiration Date";
pub const HISTORICAL_RATE: &str = "Historical Rate";
pub const BAR_ADMISSION_DATE: &str = "Bar Admission Date";
pub const GRADUATION_DATE: &str = "Graduation Date";
pub const MATTER_ID: &str = "Matter ID";
pub const MATTER_NAME: &str = "Matter Name";
pub const CLIENT_NAME: &str = "Client Name";
pub const BILLING_DATE: &str = "Billing Date";
pub const HOURS: &str = "Hours";
pub const FEES: &str = "Fees";
pub const OPEN_DATE: &str = "Open Date";
pub const CLOSE_DATE: &str = "Close Date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSchema {
    pub kind: DataType,
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl ImportSchema {
    pub fn new<R, O>(kind: DataType, required: R, optional: O) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            kind,
            required: required.into_iter().map(Into::into).collect(),
            optional: optional.into_iter().map(Into::into).collect(),
        }
    }

    /// Built-in layout for an import kind
    pub fn for_kind(kind: DataType) -> Self {
        match kind {
            DataType::Rate => Self::new(
                kind,
                [FIRM_NAME, ATTORNEY_NAME, RATE_AMOUNT, CURRENCY, EFFECTIVE_DATE],
                [ATTORNEY_ID, EXPIRATION_DATE, HISTORICAL_RATE, "Title", "Office", "Practice Area"],
            ),
            DataType::Attorney => Self::new(
                kind,
                [ATTORNEY_NAME, FIRM_NAME],
                [
                    ATTORNEY_ID,
                    "Email",
                    "Title",
                    BAR_ADMISSION_DATE,
                    GRADUATION_DATE,
                    "Office",
                    "Practice Area",
                ],
            ),
            DataType::Billing => Self::new(
                kind,
                [MATTER_ID, ATTORNEY_NAME, BILLING_DATE, HOURS, FEES],
                [ATTORNEY_ID, "Task Code", "Description", RATE_AMOUNT, CURRENCY],
            ),
            DataType::Matter => Self::new(
                kind,
                [MATTER_ID, MATTER_NAME, CLIENT_NAME],
                ["Practice Area", OPEN_DATE, CLOSE_DATE, "Status", "Responsible Attorney"],
            ),
        }
    }

    pub fn all_columns(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
    }

    pub fn is_required(&self, header: &str) -> bool {
        self.required.iter().any(|r| headers_match(r, header))
    }

    /// Schema column a file header stands for, ignoring case and the marker
    pub fn schema_header(&self, actual: &str) -> Option<&str> {
        self.all_columns().find(|h| headers_match(h, actual))
    }

    /// File headers that must be renamed to their schema column before
    /// mapping. A header spelled exactly like a schema column wins over a
    /// variant of it.
    pub fn header_aliases(&self, headers: &[String]) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|actual| {
                let column = self.schema_header(actual)?;
                (column != actual.as_str() && !headers.iter().any(|h| h == column))
                    .then(|| (actual.clone(), column.to_string()))
            })
            .collect()
    }

    /// Template header: required columns, then optional ones marked with `*`
    pub fn template_header(&self) -> Vec<String> {
        create_template(&self.required, &self.optional)
    }

    /// Default mapping from file headers to canonical field names
    pub fn default_mapping(&self) -> MappingSpec {
        self.all_columns().fold(MappingSpec::new(), |spec, header| {
            let mapping = FieldMapping::new(header);
            let mapping = match transform_for(header) {
                Some((kind, config)) => mapping.with_transform(kind, config),
                None => mapping,
            };
            spec.field(canonical_name(header), mapping)
        })
    }
}

/// Template header for arbitrary required and optional fields
pub fn create_template<R, O>(required: &[R], optional: &[O]) -> Vec<String>
where
    R: AsRef<str>,
    O: AsRef<str>,
{
    required
        .iter()
        .map(|r| r.as_ref().to_string())
        .chain(
            optional
                .iter()
                .map(|o| format!("{}{}", o.as_ref(), OPTIONAL_MARKER)),
        )
        .collect()
}

/// `"Rate Amount"` -> `"rate_amount"`
pub fn canonical_name(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut pending_sep = false;
    for c in header.trim().trim_end_matches(OPTIONAL_MARKER).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Case-insensitive header comparison that ignores the optional marker
pub fn headers_match(expected: &str, actual: &str) -> bool {
    let clean = |s: &str| s.trim().trim_end_matches(OPTIONAL_MARKER).trim().to_lowercase();
    clean(expected) == clean(actual)
}

fn transform_for(header: &str) -> Option<(&'static str, Value)> {
    match header {
        RATE_AMOUNT | HISTORICAL_RATE | HOURS | FEES => Some(("float", Value::Null)),
        CURRENCY => Some(("uppercase", Value::Null)),
        EFFECTIVE_DATE | EXPIRATION_DATE | BAR_ADMISSION_DATE | GRADUATION_DATE | BILLING_DATE
        | OPEN_DATE | CLOSE_DATE => Some(("date", json!({ "format": CANONICAL_DATE_FORMAT }))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratelink_mapping::FieldMapper;

    #[test]
    fn test_create_template_marks_optional_fields() {
        let header = create_template(&["Firm Name", "Attorney Name"], &["Rate Amount"]);
        assert_eq!(header, vec!["Firm Name", "Attorney Name", "Rate Amount*"]);
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_name("Rate Amount"), "rate_amount");
        assert_eq!(canonical_name("Attorney ID*"), "attorney_id");
        assert_eq!(canonical_name("  Bar  Admission-Date "), "bar_admission_date");
    }

    #[test]
    fn test_default_mappings_compile_for_every_kind() {
        for kind in DataType::ALL {
            let schema = ImportSchema::for_kind(kind);
            let mapper = FieldMapper::new(schema.default_mapping()).unwrap();
            assert_eq!(
                mapper.canonical_fields().len(),
                schema.required.len() + schema.optional.len()
            );
        }
    }

    #[test]
    fn test_header_aliases_resolve_variants_to_schema_columns() {
        let schema = ImportSchema::for_kind(DataType::Rate);
        let headers: Vec<String> = ["firm name", "Expiration Date*", "Rate Amount", "RATE AMOUNT", "Notes"]
            .iter()
            .map(|h| h.to_string())
            .collect();

        let aliases = schema.header_aliases(&headers);
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases["firm name"], FIRM_NAME);
        assert_eq!(aliases["Expiration Date*"], EXPIRATION_DATE);
        assert!(!aliases.contains_key("RATE AMOUNT"));
        assert_eq!(schema.schema_header("notes"), None);
    }

    #[test]
    fn test_header_matching_ignores_case_and_marker() {
        assert!(headers_match("Rate Amount", "rate amount*"));
        assert!(!headers_match("Rate Amount", "Rate"));
    }
}
