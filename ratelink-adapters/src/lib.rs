//! Ratelink adapters
//!
//! One uniform contract, [`VendorAdapter`], for every external billing or
//! court-data system. [`RestAdapter`] implements it for JSON-over-HTTP
//! vendors from a declarative [`VendorProfile`]: it owns a
//! [`TransportClient`](ratelink_transport::TransportClient), drains
//! pagination sequentially and maps each record through the vendor's
//! [`FieldMapper`](ratelink_mapping::FieldMapper).
//!
//! ```rust,no_run
//! use ratelink_adapters::{AdapterRegistry, FetchParams};
//! use ratelink_core::DataType;
//!
//! # async fn run() -> ratelink_adapters::Result<()> {
//! let mut registry = AdapterRegistry::default();
//! registry.load_dir("vendors")?;
//!
//! let adapter = registry.create("elite")?;
//! let outcome = adapter.get_data(DataType::Rate, FetchParams::new()).await?;
//! println!("{} rates over {} pages", outcome.records.len(), outcome.pages);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod error;
pub mod pagination;
pub mod profile;
pub mod registry;

pub use adapter::{AdapterContext, FetchParams, RestAdapter, SendSummary, VendorAdapter};
pub use error::{AdapterError, Result};
pub use pagination::{drain, extract_items, FetchOutcome, PageRequest, PaginationConfig, PaginationStyle, DEFAULT_MAX_PAGES};
pub use profile::{load_profiles, EndpointConfig, VendorProfile, DEFAULT_ADAPTER_KIND, DEFAULT_SEND_BATCH_SIZE};
pub use registry::{AdapterFactory, AdapterRegistry};

pub use ratelink_import::{InMemorySink, RecordSink, UpsertOutcome};
