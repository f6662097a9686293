use ratelink_core::{is_blank, value_to_text, IntegrationError, Result};
use regex::Regex;
use serde_json::Value;

use crate::spec::ValidationSpec;

/// One compiled field-level check
#[derive(Debug, Clone)]
pub enum ValidationRule {
    Required,
    Range { min: Option<f64>, max: Option<f64> },
    Pattern(Regex),
    OneOf(Vec<Value>),
    Length { min: Option<usize>, max: Option<usize> },
}

impl ValidationRule {
    /// Compile every rule set in `spec`, in a fixed order
    pub fn compile_all(field: &str, spec: &ValidationSpec) -> Result<Vec<Self>> {
        let mut rules = Vec::new();

        if spec.required {
            rules.push(ValidationRule::Required);
        }

        if spec.min.is_some() || spec.max.is_some() {
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(IntegrationError::Configuration(format!(
                        "Validation range for '{}' has min {} above max {}",
                        field, min, max
                    )));
                }
            }
            rules.push(ValidationRule::Range {
                min: spec.min,
                max: spec.max,
            });
        }

        if let Some(pattern) = &spec.pattern {
            let regex = Regex::new(pattern).map_err(|e| {
                IntegrationError::Configuration(format!("Invalid pattern for '{}': {}", field, e))
            })?;
            rules.push(ValidationRule::Pattern(regex));
        }

        if let Some(values) = &spec.one_of {
            rules.push(ValidationRule::OneOf(values.clone()));
        }

        if spec.min_length.is_some() || spec.max_length.is_some() {
            rules.push(ValidationRule::Length {
                min: spec.min_length,
                max: spec.max_length,
            });
        }

        Ok(rules)
    }

    /// Check one value. Only `Required` rejects null; the others skip it.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if let ValidationRule::Required = self {
            let empty = match value {
                Value::Array(items) => items.is_empty(),
                other => is_blank(other),
            };
            return if empty {
                Err("value is required".to_string())
            } else {
                Ok(())
            };
        }

        if value.is_null() {
            return Ok(());
        }

        match self {
            ValidationRule::Required => Ok(()),
            ValidationRule::Range { min, max } => {
                let number = as_number(value).ok_or_else(|| format!("'{}' is not a number", value_to_text(value)))?;
                if let Some(min) = min {
                    if number < *min {
                        return Err(format!("{} is below minimum {}", number, min));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        return Err(format!("{} is above maximum {}", number, max));
                    }
                }
                Ok(())
            }
            ValidationRule::Pattern(regex) => {
                let text = value_to_text(value);
                if regex.is_match(&text) {
                    Ok(())
                } else {
                    Err(format!("'{}' does not match pattern '{}'", text, regex.as_str()))
                }
            }
            ValidationRule::OneOf(allowed) => {
                let text = value_to_text(value);
                let found = allowed
                    .iter()
                    .any(|candidate| candidate == value || value_to_text(candidate) == text);
                if found {
                    Ok(())
                } else {
                    Err(format!("'{}' is not an allowed value", text))
                }
            }
            ValidationRule::Length { min, max } => {
                let length = match value {
                    Value::Array(items) => items.len(),
                    other => value_to_text(other).chars().count(),
                };
                if let Some(min) = min {
                    if length < *min {
                        return Err(format!("length {} is below minimum {}", length, min));
                    }
                }
                if let Some(max) = max {
                    if length > *max {
                        return Err(format!("length {} is above maximum {}", length, max));
                    }
                }
                Ok(())
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
