use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IntegrationError;

/// Entity kinds exchanged with external billing systems.
///
/// Vendors use different vocabularies for the same entity; the aliases
/// (`timekeeper`, `invoice`) are accepted wherever a kind is parsed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "timekeeper", alias = "timekeepers", alias = "attorneys")]
    Attorney,
    #[serde(alias = "rates")]
    Rate,
    #[serde(alias = "invoice", alias = "invoices")]
    Billing,
    #[serde(alias = "matters")]
    Matter,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Attorney,
        DataType::Rate,
        DataType::Billing,
        DataType::Matter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Attorney => "attorney",
            DataType::Rate => "rate",
            DataType::Billing => "billing",
            DataType::Matter => "matter",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attorney" | "attorneys" | "timekeeper" | "timekeepers" => Ok(DataType::Attorney),
            "rate" | "rates" => Ok(DataType::Rate),
            "billing" | "invoice" | "invoices" => Ok(DataType::Billing),
            "matter" | "matters" => Ok(DataType::Matter),
            other => Err(IntegrationError::Configuration(format!(
                "Unknown data type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("attorney", DataType::Attorney)]
    #[case("Timekeeper", DataType::Attorney)]
    #[case("rates", DataType::Rate)]
    #[case("invoice", DataType::Billing)]
    #[case(" matter ", DataType::Matter)]
    fn test_parse_aliases(#[case] input: &str, #[case] expected: DataType) {
        assert_eq!(input.parse::<DataType>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_kind_is_configuration_error() {
        let err = "docket".parse::<DataType>().unwrap_err();
        assert!(matches!(err, IntegrationError::Configuration(_)));
    }

    #[test]
    fn test_serde_alias() {
        let kind: DataType = serde_json::from_str("\"timekeeper\"").unwrap();
        assert_eq!(kind, DataType::Attorney);
        assert_eq!(serde_json::to_string(&DataType::Billing).unwrap(), "\"billing\"");
    }
}
