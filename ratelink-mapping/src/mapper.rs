//! Field mapper
//!
//! [`FieldMapper`] owns a compiled, immutable [`MappingSpec`]. Mapping a
//! record never fails: a field whose transform errors or whose value fails
//! validation falls back to its configured default (or null) and the reason
//! is recorded as a [`FieldWarning`] on the result.

use ratelink_core::{value_at_path, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::rules::ValidationRule;
use crate::spec::MappingSpec;
use crate::transform::Transform;

/// Why one canonical field did not get its source value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub field: String,
    pub message: String,
}

impl FieldWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A canonical record plus the field-level warnings raised producing it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedRecord {
    pub record: Record,
    pub warnings: Vec<FieldWarning>,
}

impl MappedRecord {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CompiledField {
    canonical: String,
    source: String,
    transform: Option<Transform>,
    default: Option<Value>,
    rules: Vec<ValidationRule>,
}

/// Check a spec without building a mapper
pub fn validate_spec(spec: &MappingSpec) -> Result<()> {
    compile(spec).map(|_| ())
}

fn compile(spec: &MappingSpec) -> Result<Vec<CompiledField>> {
    spec.iter()
        .map(|(canonical, mapping)| {
            let source = mapping
                .source_field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ratelink_core::IntegrationError::Configuration(format!(
                        "Mapping for '{}' is missing source_field",
                        canonical
                    ))
                })?;

            let transform = mapping
                .transform
                .as_ref()
                .map(|t| Transform::compile(canonical, t))
                .transpose()?;

            let rules = match &mapping.validation {
                Some(validation) => ValidationRule::compile_all(canonical, validation)?,
                None => Vec::new(),
            };

            Ok(CompiledField {
                canonical: canonical.to_string(),
                source: source.to_string(),
                transform,
                default: mapping.default.clone(),
                rules,
            })
        })
        .collect()
}

/// Bidirectional mapper for one (vendor, entity kind) pair.
///
/// Cloning shares the compiled spec.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    spec: Arc<MappingSpec>,
    fields: Arc<Vec<CompiledField>>,
}

impl FieldMapper {
    /// Compile `spec`; fails on a missing `source_field` or an unsupported transform
    pub fn new(spec: MappingSpec) -> Result<Self> {
        let fields = compile(&spec)?;
        Ok(Self {
            spec: Arc::new(spec),
            fields: Arc::new(fields),
        })
    }

    pub fn spec(&self) -> &MappingSpec {
        &self.spec
    }

    /// A new mapper with `overrides` layered over this one's spec
    pub fn with_overrides(&self, overrides: &MappingSpec) -> Result<Self> {
        Self::new(self.spec.merged_with(overrides))
    }

    pub fn canonical_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.canonical.as_str()).collect()
    }

    pub fn source_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.source.as_str()).collect()
    }

    /// External record to canonical record
    pub fn map(&self, source: &Record) -> MappedRecord {
        let mut record = Map::with_capacity(self.fields.len());
        let mut warnings = Vec::new();

        for field in self.fields.iter() {
            let raw = lookup(source, &field.source).cloned().unwrap_or(Value::Null);

            let mut value = match &field.transform {
                Some(transform) => match transform.apply(&raw) {
                    Ok(value) => value,
                    Err(e) => {
                        warnings.push(FieldWarning::new(
                            &field.canonical,
                            format!("{} transform failed: {}", transform.name(), e),
                        ));
                        Value::Null
                    }
                },
                None => raw,
            };

            if value.is_null() {
                if let Some(default) = &field.default {
                    value = default.clone();
                }
            }

            for rule in &field.rules {
                if let Err(reason) = rule.check(&value) {
                    warnings.push(FieldWarning::new(
                        &field.canonical,
                        format!("validation failed: {}", reason),
                    ));
                    value = field.default.clone().unwrap_or(Value::Null);
                    break;
                }
            }

            record.insert(field.canonical.clone(), value);
        }

        for warning in &warnings {
            debug!(field = %warning.field, reason = %warning.message, "Field fell back to default");
        }

        MappedRecord { record, warnings }
    }

    pub fn map_all(&self, records: &[Record]) -> Vec<MappedRecord> {
        records.iter().map(|r| self.map(r)).collect()
    }

    /// Canonical record to external record; unmapped fields pass through
    pub fn reverse_map(&self, canonical: &Record) -> Record {
        let mut external = Map::with_capacity(canonical.len());
        let mapped: HashSet<&str> = self.fields.iter().map(|f| f.canonical.as_str()).collect();

        for field in self.fields.iter() {
            let Some(value) = canonical.get(&field.canonical) else {
                continue;
            };
            let value = match &field.transform {
                Some(transform) => transform.invert(value),
                None => value.clone(),
            };
            set_path(&mut external, &field.source, value);
        }

        for (key, value) in canonical {
            if !mapped.contains(key.as_str()) && !external.contains_key(key) {
                external.insert(key.clone(), value.clone());
            }
        }

        external
    }
}

/// Literal key first, then a dotted path into nested objects
fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    value_at_path(record.get(head)?, rest)
}

fn set_path(record: &mut Record, path: &str, value: Value) {
    let Some((head, rest)) = path.split_once('.') else {
        record.insert(path.to_string(), value);
        return;
    };

    let slot = record
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(inner) = slot {
        set_path(inner, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FieldMapping, ValidationSpec};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_missing_source_field_fails_at_construction() {
        let spec = MappingSpec::from_value(json!({
            "name": {"source_field": "displayName"},
            "rate": {"transform": "float"}
        }))
        .unwrap();

        let err = FieldMapper::new(spec).unwrap_err();
        assert!(err.to_string().contains("'rate' is missing source_field"));
    }

    #[test]
    fn test_nested_source_and_reverse() {
        let spec = MappingSpec::new().field("amount", FieldMapping::new("rate.amount").with_transform("float", Value::Null));
        let mapper = FieldMapper::new(spec).unwrap();

        let mapped = mapper.map(&record(json!({"rate": {"amount": "450.5"}})));
        assert_eq!(mapped.record["amount"], json!(450.5));

        let external = mapper.reverse_map(&mapped.record);
        assert_eq!(Value::Object(external), json!({"rate": {"amount": 450.5}}));
    }

    #[test]
    fn test_transform_failure_falls_back_to_default() {
        let spec = MappingSpec::new().field(
            "effective_date",
            FieldMapping::new("Effective")
                .with_transform("date", json!({"format": "%m/%d/%Y"}))
                .with_default(json!("1970-01-01")),
        );
        let mapper = FieldMapper::new(spec).unwrap();

        let mapped = mapper.map(&record(json!({"Effective": "soon"})));
        assert_eq!(mapped.record["effective_date"], json!("1970-01-01"));
        assert_eq!(mapped.warnings.len(), 1);
        assert_eq!(mapped.warnings[0].field, "effective_date");
    }

    #[test]
    fn test_required_field_without_default_yields_null() {
        let spec = MappingSpec::new().field(
            "hours",
            FieldMapping::new("Hours")
                .with_transform("float", Value::Null)
                .with_validation(ValidationSpec::required()),
        );
        let mapper = FieldMapper::new(spec).unwrap();

        let mapped = mapper.map(&record(json!({"Hours": "n/a"})));
        assert_eq!(mapped.record["hours"], Value::Null);
        assert_eq!(mapped.warnings.len(), 2);
    }
}
