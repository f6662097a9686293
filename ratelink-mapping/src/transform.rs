//! Field transforms
//!
//! Every transform is a pure function from one raw JSON value to one
//! canonical value. Numeric and boolean transforms are total: empty or
//! absent input yields `0`, `0.0` or `false`. Failures are returned as
//! [`TransformError`] and handled by the mapper's per-field fallback; they
//! never escape a `map` call.

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use ratelink_core::{is_blank, value_to_text, IntegrationError, Result};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::spec::TransformSpec;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Output format used when a date transform does not name one
pub const DEFAULT_DATE_OUTPUT: &str = "%Y-%m-%d";

const TRUE_WORDS: &[&str] = &["true", "t", "yes", "y", "1", "on"];
const FALSE_WORDS: &[&str] = &["false", "f", "no", "n", "0", "off"];

#[derive(Debug, Clone, PartialEq)]
pub struct EnumLookup {
    forward: Vec<(String, Value)>,
    fallback: Option<Value>,
    case_sensitive: bool,
}

impl EnumLookup {
    fn find(&self, key: &str) -> Option<&Value> {
        self.forward
            .iter()
            .find(|(k, _)| {
                if self.case_sensitive {
                    k == key
                } else {
                    k.eq_ignore_ascii_case(key)
                }
            })
            .map(|(_, v)| v)
    }

    /// First external key that maps to `value`
    fn reverse(&self, value: &Value) -> Option<&str> {
        self.forward
            .iter()
            .find(|(_, v)| v == value)
            .map(|(k, _)| k.as_str())
    }
}

/// A compiled transform
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    String,
    Int,
    Float,
    Bool,
    Date { format: String, output_format: String },
    List { delimiter: String },
    Uppercase,
    Lowercase,
    Replace { from: String, to: String },
    Format { template: String },
    Enum(EnumLookup),
}

impl Transform {
    /// Compile a raw transform; unknown kinds and incomplete configs fail
    pub fn compile(field: &str, spec: &TransformSpec) -> Result<Self> {
        let config = &spec.config;
        let kind = spec.kind.trim().to_ascii_lowercase();

        let transform = match kind.as_str() {
            "string" | "str" => Transform::String,
            "int" | "integer" => Transform::Int,
            "float" | "decimal" | "number" => Transform::Float,
            "bool" | "boolean" => Transform::Bool,
            "date" => {
                let format = config_str(config, "format").ok_or_else(|| {
                    IntegrationError::Configuration(format!(
                        "Date transform for '{}' requires a format",
                        field
                    ))
                })?;
                let output_format = config_str(config, "output_format").unwrap_or(DEFAULT_DATE_OUTPUT);
                for candidate in [format, output_format] {
                    if !is_valid_date_format(candidate) {
                        return Err(IntegrationError::Configuration(format!(
                            "Invalid date format '{}' for '{}'",
                            candidate, field
                        )));
                    }
                }
                Transform::Date {
                    format: format.to_string(),
                    output_format: output_format.to_string(),
                }
            }
            "list" | "split" | "delimited_list" => Transform::List {
                delimiter: config_str(config, "delimiter").unwrap_or(",").to_string(),
            },
            "uppercase" | "upper" => Transform::Uppercase,
            "lowercase" | "lower" => Transform::Lowercase,
            "replace" => {
                let from = config_str(config, "from").filter(|s| !s.is_empty()).ok_or_else(|| {
                    IntegrationError::Configuration(format!(
                        "Replace transform for '{}' requires a non-empty 'from'",
                        field
                    ))
                })?;
                Transform::Replace {
                    from: from.to_string(),
                    to: config_str(config, "to").unwrap_or_default().to_string(),
                }
            }
            "format" => {
                let template = config_str(config, "template")
                    .filter(|t| t.contains("{value}"))
                    .ok_or_else(|| {
                        IntegrationError::Configuration(format!(
                            "Format transform for '{}' requires a template containing {{value}}",
                            field
                        ))
                    })?;
                Transform::Format {
                    template: template.to_string(),
                }
            }
            "enum" | "enumeration" | "lookup" | "map" => {
                let values = config
                    .get("values")
                    .or_else(|| config.get("mapping"))
                    .and_then(Value::as_object)
                    .ok_or_else(|| {
                        IntegrationError::Configuration(format!(
                            "Enumeration transform for '{}' requires a 'values' table",
                            field
                        ))
                    })?;
                Transform::Enum(EnumLookup {
                    forward: values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    fallback: config.get("default").cloned().filter(|v| !v.is_null()),
                    case_sensitive: config
                        .get("case_sensitive")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            }
            other => {
                return Err(IntegrationError::Configuration(format!(
                    "Unsupported transform '{}' for field '{}'",
                    other, field
                )))
            }
        };

        Ok(transform)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::String => "string",
            Transform::Int => "int",
            Transform::Float => "float",
            Transform::Bool => "bool",
            Transform::Date { .. } => "date",
            Transform::List { .. } => "list",
            Transform::Uppercase => "uppercase",
            Transform::Lowercase => "lowercase",
            Transform::Replace { .. } => "replace",
            Transform::Format { .. } => "format",
            Transform::Enum(_) => "enum",
        }
    }

    /// Whether `invert(apply(v)) == v` holds for values in the domain.
    /// For `int` and `float` the domain is JSON numbers: a numeric string
    /// comes back as a number.
    pub fn is_lossless(&self) -> bool {
        matches!(
            self,
            Transform::String | Transform::Int | Transform::Float | Transform::Date { .. }
        )
    }

    pub fn apply(&self, value: &Value) -> std::result::Result<Value, TransformError> {
        match self {
            Transform::String => Ok(match value {
                Value::Null => Value::Null,
                other => Value::String(value_to_text(other)),
            }),
            Transform::Int => to_int(value),
            Transform::Float => to_float(value),
            Transform::Bool => to_bool(value),
            Transform::Date {
                format,
                output_format,
            } => {
                if is_blank(value) {
                    return Ok(Value::Null);
                }
                let text = value_to_text(value);
                let date = parse_date(text.trim(), format).ok_or_else(|| {
                    TransformError::new(format!("'{}' does not match date format '{}'", text, format))
                })?;
                Ok(Value::String(date.format(output_format).to_string()))
            }
            Transform::List { delimiter } => Ok(match value {
                Value::Null => Value::Array(Vec::new()),
                Value::Array(items) => Value::Array(items.clone()),
                other => {
                    let text = value_to_text(other);
                    Value::Array(
                        text.split(delimiter.as_str())
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(|s| Value::String(s.to_string()))
                            .collect(),
                    )
                }
            }),
            Transform::Uppercase => Ok(map_text(value, &|s: &str| s.to_uppercase())),
            Transform::Lowercase => Ok(map_text(value, &|s: &str| s.to_lowercase())),
            Transform::Replace { from, to } => Ok(map_text(value, &|s: &str| s.replace(from.as_str(), to))),
            Transform::Format { template } => Ok(match value {
                Value::Null => Value::Null,
                other => Value::String(template.replace("{value}", &value_to_text(other))),
            }),
            Transform::Enum(lookup) => {
                if value.is_null() {
                    return Ok(lookup.fallback.clone().unwrap_or(Value::Null));
                }
                let key = value_to_text(value);
                lookup
                    .find(key.trim())
                    .cloned()
                    .or_else(|| lookup.fallback.clone())
                    .ok_or_else(|| TransformError::new(format!("No enumeration entry for '{}'", key)))
            }
        }
    }

    /// Best-effort inverse used by `reverse_map`.
    ///
    /// `int` and `float` pass the canonical number through unchanged, so a
    /// vendor that sent `"100.50"` receives `100.5` back. Vendors that need
    /// text should add a `format` transform with template `"{value}"` instead.
    pub fn invert(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }

        match self {
            Transform::Date {
                format,
                output_format,
            } => {
                let text = value_to_text(value);
                match parse_date(text.trim(), output_format) {
                    Some(date) => Value::String(date.format(format).to_string()),
                    None => value.clone(),
                }
            }
            Transform::List { delimiter } => match value {
                Value::Array(items) => Value::String(
                    items
                        .iter()
                        .map(value_to_text)
                        .collect::<Vec<_>>()
                        .join(delimiter),
                ),
                other => other.clone(),
            },
            Transform::Replace { from, to } if !to.is_empty() => {
                map_text(value, &|s: &str| s.replace(to.as_str(), from))
            }
            Transform::Format { template } => {
                let text = value_to_text(value);
                match template.split_once("{value}") {
                    Some((prefix, suffix)) => {
                        let stripped = text
                            .strip_prefix(prefix)
                            .and_then(|rest| rest.strip_suffix(suffix));
                        match stripped {
                            Some(inner) => Value::String(inner.to_string()),
                            None => value.clone(),
                        }
                    }
                    None => value.clone(),
                }
            }
            Transform::Enum(lookup) => match lookup.reverse(value) {
                Some(key) => Value::String(key.to_string()),
                None => value.clone(),
            },
            _ => value.clone(),
        }
    }
}

fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

fn map_text(value: &Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| map_text(v, f)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), map_text(v, f)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Strip thousands separators, currency symbols and whitespace
fn numeric_text(value: &Value) -> String {
    value_to_text(value)
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | ' ' | '\u{a0}'))
        .collect()
}

fn to_int(value: &Value) -> std::result::Result<Value, TransformError> {
    match value {
        Value::Null => Ok(Value::from(0)),
        Value::Bool(b) => Ok(Value::from(*b as i64)),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| Value::from(f.trunc() as i64))
            .ok_or_else(|| TransformError::new(format!("'{}' is not an integer", n))),
        other => {
            let text = numeric_text(other);
            if text.is_empty() {
                return Ok(Value::from(0));
            }
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::from(i));
            }
            text.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| Value::from(f.trunc() as i64))
                .ok_or_else(|| TransformError::new(format!("'{}' is not an integer", value_to_text(other))))
        }
    }
}

fn to_float(value: &Value) -> std::result::Result<Value, TransformError> {
    let parsed = match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        other => {
            let text = numeric_text(other);
            if text.is_empty() {
                Some(0.0)
            } else {
                text.parse::<f64>().ok()
            }
        }
    };

    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| TransformError::new(format!("'{}' is not a number", value_to_text(value))))
}

fn to_bool(value: &Value) -> std::result::Result<Value, TransformError> {
    match value {
        Value::Null => Ok(Value::Bool(false)),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
        other => {
            let text = value_to_text(other).trim().to_ascii_lowercase();
            if text.is_empty() || FALSE_WORDS.contains(&text.as_str()) {
                Ok(Value::Bool(false))
            } else if TRUE_WORDS.contains(&text.as_str()) {
                Ok(Value::Bool(true))
            } else {
                Err(TransformError::new(format!("'{}' is not a boolean", text)))
            }
        }
    }
}

fn is_valid_date_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Parse with a date format, accepting datetime formats by keeping the date
fn parse_date(text: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, format)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, format).ok().map(|dt| dt.date()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn compile(kind: &str, config: Value) -> Transform {
        Transform::compile(
            "field",
            &TransformSpec {
                kind: kind.to_string(),
                config,
            },
        )
        .unwrap()
    }

    #[rstest]
    #[case("int", json!("1,250"), json!(1250))]
    #[case("int", json!(""), json!(0))]
    #[case("int", Value::Null, json!(0))]
    #[case("int", json!("12.9"), json!(12))]
    #[case("float", json!("$450.50"), json!(450.5))]
    #[case("float", json!("  "), json!(0.0))]
    #[case("bool", json!("Yes"), json!(true))]
    #[case("bool", json!(""), json!(false))]
    #[case("uppercase", json!("usd"), json!("USD"))]
    #[case("lowercase", json!("Partner"), json!("partner"))]
    #[case("string", json!(42), json!("42"))]
    fn test_scalar_transforms(#[case] kind: &str, #[case] input: Value, #[case] expected: Value) {
        assert_eq!(compile(kind, Value::Null).apply(&input).unwrap(), expected);
    }

    #[test]
    fn test_numeric_garbage_fails() {
        assert!(compile("int", Value::Null).apply(&json!("abc")).is_err());
        assert!(compile("float", Value::Null).apply(&json!("1.2.3")).is_err());
    }

    #[test]
    fn test_numeric_invert_emits_json_numbers() {
        let float = compile("float", Value::Null);
        let canonical = float.apply(&json!("100.50")).unwrap();
        assert_eq!(canonical, json!(100.5));
        assert_eq!(float.invert(&canonical), json!(100.5));

        let int = compile("int", Value::Null);
        assert_eq!(int.invert(&int.apply(&json!(" 7 ")).unwrap()), json!(7));

        let text = compile("format", json!({"template": "{value}"}));
        assert_eq!(text.apply(&json!(100.5)).unwrap(), json!("100.5"));
    }

    #[test]
    fn test_date_requires_format() {
        let err = Transform::compile(
            "effective_date",
            &TransformSpec {
                kind: "date".to_string(),
                config: Value::Null,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("effective_date"));
    }

    #[test]
    fn test_date_round_trip() {
        let transform = compile("date", json!({"format": "%m/%d/%Y"}));
        let canonical = transform.apply(&json!("01/15/2025")).unwrap();
        assert_eq!(canonical, json!("2025-01-15"));
        assert_eq!(transform.invert(&canonical), json!("01/15/2025"));
        assert!(transform.apply(&json!("2025-01-15")).is_err());
    }

    #[test]
    fn test_list_split_and_join() {
        let transform = compile("list", json!({"delimiter": ";"}));
        let canonical = transform.apply(&json!("NY; CA;;TX")).unwrap();
        assert_eq!(canonical, json!(["NY", "CA", "TX"]));
        assert_eq!(transform.invert(&canonical), json!("NY;CA;TX"));
    }

    #[test]
    fn test_enum_lookup_and_fallback() {
        let transform = compile(
            "enum",
            json!({"values": {"P": "partner", "A": "associate", "SA": "associate"}}),
        );
        assert_eq!(transform.apply(&json!("p")).unwrap(), json!("partner"));
        assert!(transform.apply(&json!("X")).is_err());
        // many-to-one collapse inverts to the first key
        assert_eq!(transform.invert(&json!("associate")), json!("A"));

        let with_default = compile("enum", json!({"values": {"P": "partner"}, "default": "other"}));
        assert_eq!(with_default.apply(&json!("X")).unwrap(), json!("other"));
    }

    #[test]
    fn test_format_and_replace_inverse() {
        let format = compile("format", json!({"template": "TK-{value}"}));
        assert_eq!(format.apply(&json!(42)).unwrap(), json!("TK-42"));
        assert_eq!(format.invert(&json!("TK-42")), json!("42"));

        let replace = compile("replace", json!({"from": "-", "to": "/"}));
        assert_eq!(replace.apply(&json!("2025-01-01")).unwrap(), json!("2025/01/01"));
        assert_eq!(replace.invert(&json!("2025/01/01")), json!("2025-01-01"));
    }

    #[rstest]
    #[case("regex")]
    #[case("soundex")]
    fn test_unknown_kind_is_configuration_error(#[case] kind: &str) {
        let err = Transform::compile(
            "name",
            &TransformSpec {
                kind: kind.to_string(),
                config: Value::Null,
            },
        )
        .unwrap_err();
        assert!(matches!(err, IntegrationError::Configuration(_)));
    }
}
