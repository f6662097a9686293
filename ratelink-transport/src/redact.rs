//! Sensitive data redaction for attempt logs
//!
//! Field names are matched against a deny-list of substrings after lowering
//! case and dropping `-`/`_`, so `X-Api-Key`, `apiKey` and `api_key` are all
//! caught. Redaction is applied at every nesting level of JSON payloads as
//! well as to query parameters, custom headers and URL query strings.

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

/// Replacement written in place of a redacted value
pub const REDACTED: &str = "[REDACTED]";

/// Default deny-list of field-name substrings (already normalized)
pub const SENSITIVE_FIELD_SUBSTRINGS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "apikey",
    "authorization",
    "credential",
    "privatekey",
    "cookie",
    "session",
    "signature",
];

/// Inline secrets that may appear inside free-text values
const SENSITIVE_PATTERNS: &[&str] = &[
    r"(?i)bearer\s+[A-Za-z0-9\-\._~\+/]+=*",
    r"(?i)basic\s+[A-Za-z0-9\+/]+=*",
    r"(?i)(password|secret|token|api[_-]?key)\s*[:=]\s*[^\s,;&}]+",
];

#[derive(Debug, Clone)]
pub struct Redactor {
    deny_list: Vec<String>,
    patterns: Vec<Regex>,
}

impl Redactor {
    pub fn new() -> Self {
        let patterns = SENSITIVE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        Self {
            deny_list: SENSITIVE_FIELD_SUBSTRINGS.iter().map(|s| s.to_string()).collect(),
            patterns,
        }
    }

    /// Extend the deny-list with vendor-specific field names
    pub fn with_extra_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.deny_list
            .extend(fields.into_iter().map(|f| normalize(f.as_ref())));
        self
    }

    pub fn is_sensitive(&self, field_name: &str) -> bool {
        let normalized = normalize(field_name);
        self.deny_list.iter().any(|needle| normalized.contains(needle.as_str()))
    }

    /// Scrub inline secrets from free text
    pub fn redact_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.patterns {
            result = pattern.replace_all(&result, REDACTED).into_owned();
        }
        result
    }

    /// Recursively redact a JSON structure
    pub fn redact_json(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut redacted = Map::with_capacity(map.len());
                for (key, inner) in map {
                    let replacement = if self.is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        self.redact_json(inner)
                    };
                    redacted.insert(key.clone(), replacement);
                }
                Value::Object(redacted)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_json(v)).collect()),
            Value::String(s) => Value::String(self.redact_text(s)),
            other => other.clone(),
        }
    }

    /// Redact name/value pairs such as query parameters or headers
    pub fn redact_pairs(&self, pairs: &[(String, String)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| {
                let value = if self.is_sensitive(name) {
                    REDACTED.to_string()
                } else {
                    self.redact_text(value)
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Render pairs as a JSON object for structured logging
    pub fn pairs_to_json(&self, pairs: &[(String, String)]) -> Value {
        let mut map = Map::new();
        for (name, value) in self.redact_pairs(pairs) {
            map.insert(name, Value::String(value));
        }
        Value::Object(map)
    }

    /// Redact sensitive query parameters embedded in a URL
    pub fn redact_url(&self, raw: &str) -> String {
        let Ok(mut url) = Url::parse(raw) else {
            return self.redact_text(raw);
        };

        if url.query().is_none() {
            return url.to_string();
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let redacted = self.redact_pairs(&pairs);

        url.query_pairs_mut().clear().extend_pairs(redacted.iter());
        url.to_string()
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
