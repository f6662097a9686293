//! Raw mapping documents
//!
//! A [`MappingSpec`] is the serialized form: an ordered map from canonical
//! field name to [`FieldMapping`]. It is loaded from JSON or YAML and never
//! interpreted directly; [`FieldMapper::new`](crate::FieldMapper::new)
//! compiles it once and rejects malformed entries up front.

use ratelink_core::{IntegrationError, Result};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::Path;

/// How one canonical field is produced from an external record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field in the external record; dotted paths reach into nested objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
}

impl FieldMapping {
    pub fn new(source_field: impl Into<String>) -> Self {
        Self {
            source_field: Some(source_field.into()),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, kind: impl Into<String>, config: Value) -> Self {
        self.transform = Some(TransformSpec {
            kind: kind.into(),
            config,
        });
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// `{type, config}`; a bare string is shorthand for a transform without config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTransformSpec")]
pub struct TransformSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTransformSpec {
    Name(String),
    Full {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        config: Value,
    },
}

impl From<RawTransformSpec> for TransformSpec {
    fn from(raw: RawTransformSpec) -> Self {
        match raw {
            RawTransformSpec::Name(kind) => TransformSpec {
                kind,
                config: Value::Null,
            },
            RawTransformSpec::Full { kind, config } => TransformSpec { kind, config },
        }
    }
}

/// Field-level validation rules; every set rule must pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, alias = "values", alias = "enum", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl ValidationSpec {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }
}

/// Ordered map of canonical field name to mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingSpec {
    fields: Vec<(String, FieldMapping)>,
}

impl MappingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one field, returning a new spec
    pub fn field(mut self, canonical: impl Into<String>, mapping: FieldMapping) -> Self {
        let canonical = canonical.into();
        match self.fields.iter_mut().find(|(name, _)| *name == canonical) {
            Some(slot) => slot.1 = mapping,
            None => self.fields.push((canonical, mapping)),
        }
        self
    }

    /// Straight copies, one canonical field per `(canonical, source)` pair
    pub fn identity<I, C, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, S)>,
        C: Into<String>,
        S: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |spec, (canonical, source)| {
                spec.field(canonical, FieldMapping::new(source))
            })
    }

    /// A copy of this spec with `other`'s entries layered on top
    pub fn merged_with(&self, other: &MappingSpec) -> Self {
        other
            .fields
            .iter()
            .fold(self.clone(), |spec, (name, mapping)| spec.field(name.clone(), mapping.clone()))
    }

    pub fn get(&self, canonical: &str) -> Option<&FieldMapping> {
        self.fields
            .iter()
            .find(|(name, _)| name == canonical)
            .map(|(_, mapping)| mapping)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldMapping)> {
        self.fields.iter().map(|(name, mapping)| (name.as_str(), mapping))
    }

    pub fn canonical_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Source fields in declaration order, skipping entries without one
    pub fn source_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter_map(|(_, mapping)| mapping.source_field.as_deref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| IntegrationError::Configuration(format!("Invalid mapping spec: {}", e)))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| IntegrationError::Configuration(format!("Invalid mapping spec: {}", e)))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| IntegrationError::Configuration(format!("Invalid mapping spec: {}", e)))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IntegrationError::Configuration(format!("Cannot read mapping spec {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::from_json(&raw),
            Some("yaml") | Some("yml") => Self::from_yaml(&raw),
            other => Err(IntegrationError::Configuration(format!(
                "Unsupported mapping spec format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

impl Serialize for MappingSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, mapping) in &self.fields {
            map.serialize_entry(name, mapping)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MappingSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut fields = Vec::with_capacity(raw.len());
        for (name, value) in raw {
            let mapping: FieldMapping = serde_json::from_value(value)
                .map_err(|e| D::Error::custom(format!("field '{}': {}", name, e)))?;
            fields.push((name, mapping));
        }
        Ok(Self { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_yaml_preserves_declaration_order() {
        let spec = MappingSpec::from_yaml(
            r#"
timekeeper_id:
  source_field: tkId
name:
  source_field: displayName
  transform: uppercase
rate_amount:
  source_field: rate.amount
  transform:
    type: float
  default: 0
"#,
        )
        .unwrap();

        assert_eq!(spec.canonical_fields(), vec!["timekeeper_id", "name", "rate_amount"]);
        assert_eq!(spec.get("name").unwrap().transform.as_ref().unwrap().kind, "uppercase");
        assert_eq!(spec.get("rate_amount").unwrap().default, Some(json!(0)));
    }

    #[test]
    fn test_missing_source_field_still_parses() {
        let spec = MappingSpec::from_value(json!({"name": {"default": "x"}})).unwrap();
        assert_eq!(spec.get("name").unwrap().source_field, None);
    }

    #[test]
    fn test_merge_overrides_without_mutating() {
        let base = MappingSpec::identity([("a", "A"), ("b", "B")]);
        let override_spec = MappingSpec::identity([("b", "Bee"), ("c", "C")]);

        let merged = base.merged_with(&override_spec);
        assert_eq!(merged.source_fields(), vec!["A", "Bee", "C"]);
        assert_eq!(base.source_fields(), vec!["A", "B"]);
    }

    #[test]
    fn test_json_round_trip_keeps_shape() {
        let raw = json!({
            "status": {
                "source_field": "st",
                "transform": {"type": "enum", "config": {"values": {"A": "active"}}},
                "validation": {"required": true}
            }
        });
        let spec = MappingSpec::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["status"]["transform"]["type"], "enum");
        assert_eq!(back["status"]["validation"]["required"], true);
    }
}
