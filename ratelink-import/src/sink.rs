//! Destinations for imported records

use ratelink_core::{DataType, Record};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::checksum::sha256_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// An identical record was already stored
    Skipped,
}

/// Storage for canonical records produced by an import.
///
/// An `Err` rejects only the one record; the pipeline records the message
/// against the row and keeps going.
pub trait RecordSink: Send + Sync {
    fn upsert(&self, kind: DataType, record: &Record) -> Result<UpsertOutcome, String>;
}

/// Canonical fields that identify a record of each kind
pub fn key_fields(kind: DataType) -> &'static [&'static [&'static str]] {
    match kind {
        DataType::Rate => &[
            &["attorney_id", "effective_date"],
            &["attorney_name", "firm_name", "effective_date"],
        ],
        DataType::Attorney => &[&["attorney_id"], &["attorney_name", "firm_name"]],
        DataType::Billing => &[&["matter_id", "attorney_name", "billing_date"]],
        DataType::Matter => &[&["matter_id"]],
    }
}

/// Natural key of a record; records without one are keyed by content
pub fn record_key(kind: DataType, record: &Record) -> String {
    for fields in key_fields(kind) {
        let parts: Option<Vec<String>> = fields
            .iter()
            .map(|f| {
                record
                    .get(*f)
                    .filter(|v| !ratelink_core::is_blank(v))
                    .map(|v| ratelink_core::value_to_text(v).trim().to_lowercase())
            })
            .collect();
        if let Some(parts) = parts {
            return format!("{}:{}", kind, parts.join("|"));
        }
    }
    let body = serde_json::to_vec(record).unwrap_or_default();
    format!("{}:#{}", kind, sha256_hex(&body))
}

/// Sink that keeps records in memory, keyed by [`record_key`]
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    records: Arc<Mutex<HashMap<String, Record>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, kind: DataType, record: &Record) -> Option<Record> {
        let key = record_key(kind, record);
        self.records.lock().ok()?.get(&key).cloned()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl RecordSink for InMemorySink {
    fn upsert(&self, kind: DataType, record: &Record) -> Result<UpsertOutcome, String> {
        let key = record_key(kind, record);
        let mut records = self
            .records
            .lock()
            .map_err(|_| "record store lock poisoned".to_string())?;

        let outcome = match records.get(&key) {
            None => UpsertOutcome::Created,
            Some(existing) if existing == record => return Ok(UpsertOutcome::Skipped),
            Some(_) => UpsertOutcome::Updated,
        };
        records.insert(key, record.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rate(amount: f64) -> Record {
        json!({
            "attorney_name": "Jane Smith",
            "firm_name": "Acme LLP",
            "effective_date": "2025-01-01",
            "rate_amount": amount
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_upsert_created_updated_skipped() {
        let sink = InMemorySink::new();
        assert_eq!(sink.upsert(DataType::Rate, &rate(500.0)), Ok(UpsertOutcome::Created));
        assert_eq!(sink.upsert(DataType::Rate, &rate(500.0)), Ok(UpsertOutcome::Skipped));
        assert_eq!(sink.upsert(DataType::Rate, &rate(550.0)), Ok(UpsertOutcome::Updated));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_key_prefers_attorney_id() {
        let mut record = rate(1.0);
        record.insert("attorney_id".into(), json!("A-7"));
        assert_eq!(record_key(DataType::Rate, &record), "rate:a-7|2025-01-01");
    }
}
