use ratelink_core::{DataType, ErrorKind, IntegrationError};
use ratelink_import::ImportError;
use thiserror::Error;

use crate::adapter::SendSummary;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// Transport, mapping or configuration failure, classification intact
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// File-level import/export failure
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A batch failed after earlier batches were accepted
    #[error("Send stopped after {} record(s) in {} batch(es)", .sent.sent, .sent.batches)]
    PartialSend {
        sent: Box<SendSummary>,
        #[source]
        source: IntegrationError,
    },

    #[error("Unknown vendor '{0}'")]
    UnknownVendor(String),

    #[error("No adapter factory registered for '{0}'")]
    UnknownAdapterKind(String),

    #[error("Vendor '{vendor}' has no {data_type} endpoint configured")]
    UnsupportedDataType { vendor: String, data_type: DataType },

    #[error("Invalid vendor profile {source_name}: {message}")]
    Profile { source_name: String, message: String },
}

pub type Result<T> = std::result::Result<T, AdapterError>;

impl AdapterError {
    pub fn profile(source_name: impl Into<String>, message: impl ToString) -> Self {
        AdapterError::Profile {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Classification of the underlying integration failure, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AdapterError::Integration(err) | AdapterError::PartialSend { source: err, .. } => Some(err.kind()),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::Integration(err) | AdapterError::PartialSend { source: err, .. } if err.is_retryable()
        )
    }

    /// Records already accepted when a send stopped part-way
    pub fn partial_send(&self) -> Option<&SendSummary> {
        match self {
            AdapterError::PartialSend { sent, .. } => Some(&**sent),
            _ => None,
        }
    }
}
