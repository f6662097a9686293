//! The uniform vendor contract and its REST implementation

use async_trait::async_trait;
use ratelink_core::{CancellationToken, ConnectionTestResult, DataType, ImportResult, IntegrationError, Record};
use ratelink_import::{FileImportPipeline, ImportOptions, ImportOutcome, RecordSink};
use ratelink_mapping::{FieldMapper, MappedRecord, MappingSpec};
use ratelink_transport::{
    InMemoryTokenCache, RequestLogger, RequestOptions, TokenCache, TracingRequestLogger, TransportClient,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{AdapterError, Result};
use crate::pagination::{drain, FetchOutcome};
use crate::profile::VendorProfile;

/// Caller-supplied knobs for one `get_data` call
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    /// Extra query parameters sent on every page
    pub query: Vec<(String, String)>,
    /// Tighter page bound than the profile's
    pub max_pages: Option<usize>,
    pub cancel: Option<CancellationToken>,
}

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Result of pushing records to a vendor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SendSummary {
    pub sent: usize,
    pub batches: usize,
    /// Per-record failures reported by the vendor
    pub failed_records: Vec<Value>,
}

/// Everything the platform asks of an external billing system.
///
/// Network calls re-surface transport failures with their classification
/// intact. File calls never fail for a bad row; those become diagnostics in
/// the returned result.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    fn vendor_id(&self) -> &str;

    fn supported_data_types(&self) -> Vec<DataType>;

    async fn authenticate(&self) -> Result<()>;

    /// Drain every page of `data_type` and map it to canonical records
    async fn get_data(&self, data_type: DataType, params: FetchParams) -> Result<FetchOutcome>;

    /// Reverse-map canonical records and push them in batches.
    ///
    /// A failure on the first batch is returned as is. A failure after some
    /// batches went through is an [`AdapterError::PartialSend`] carrying what
    /// was sent.
    async fn send_data(&self, data_type: DataType, records: &[Record]) -> Result<SendSummary>;

    /// Map vendor-shaped records without any network call
    fn map_data(&self, data_type: DataType, records: &[Record]) -> Result<Vec<MappedRecord>>;

    /// Import a tabular file; `cancel` is checked between rows
    fn import_file(
        &self,
        path: &Path,
        data_type: DataType,
        mapping_override: Option<&MappingSpec>,
        sink: Option<&dyn RecordSink>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ImportOutcome>;

    fn export_file(
        &self,
        path: &Path,
        data_type: DataType,
        records: &[Record],
        mapping_override: Option<&MappingSpec>,
    ) -> Result<ImportResult>;

    /// Never fails; problems come back as `success = false`
    async fn test_connection(&self) -> ConnectionTestResult;
}

/// Shared collaborators injected into every adapter
#[derive(Clone)]
pub struct AdapterContext {
    pub token_cache: Arc<dyn TokenCache>,
    /// Attempt logger; a per-vendor tracing logger when unset
    pub logger: Option<Arc<dyn RequestLogger>>,
    pub import_options: ImportOptions,
}

impl Default for AdapterContext {
    fn default() -> Self {
        Self {
            token_cache: Arc::new(InMemoryTokenCache::new()),
            logger: None,
            import_options: ImportOptions::default(),
        }
    }
}

impl AdapterContext {
    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.token_cache = cache;
        self
    }

    pub fn with_import_options(mut self, options: ImportOptions) -> Self {
        self.import_options = options;
        self
    }
}

/// Adapter for JSON-over-HTTP vendors described entirely by a profile.
///
/// Holds one transport client and one field mapper per configured entity
/// kind. The client is immutable after construction and pools connections,
/// so concurrent calls on one adapter are safe.
#[derive(Clone)]
pub struct RestAdapter {
    profile: Arc<VendorProfile>,
    client: TransportClient,
    mappers: Arc<HashMap<DataType, FieldMapper>>,
    pipeline: FileImportPipeline,
}

impl RestAdapter {
    pub fn from_profile(profile: VendorProfile, context: &AdapterContext) -> Result<Self> {
        profile.validate()?;

        let logger = context
            .logger
            .clone()
            .unwrap_or_else(|| Arc::new(TracingRequestLogger::for_vendor(&profile.id)) as Arc<dyn RequestLogger>);
        let client = TransportClient::builder(profile.connection.clone())
            .token_cache(context.token_cache.clone())
            .logger(logger)
            .build()?;

        let mappers = profile
            .mappings
            .iter()
            .map(|(kind, spec)| Ok((*kind, FieldMapper::new(spec.clone())?)))
            .collect::<ratelink_core::Result<HashMap<_, _>>>()?;

        debug!(vendor = %profile.id, kinds = mappers.len(), "Built REST adapter");

        Ok(Self {
            profile: Arc::new(profile),
            client,
            mappers: Arc::new(mappers),
            pipeline: FileImportPipeline::new(context.import_options.clone()),
        })
    }

    pub fn profile(&self) -> &VendorProfile {
        &self.profile
    }

    pub fn client(&self) -> &TransportClient {
        &self.client
    }

    /// Vendor mapping for a kind; identity when the profile has none
    pub fn mapper(&self, data_type: DataType) -> Option<&FieldMapper> {
        self.mappers.get(&data_type)
    }

    fn map_records(&self, data_type: DataType, records: &[Record]) -> Vec<MappedRecord> {
        match self.mapper(data_type) {
            Some(mapper) => mapper.map_all(records),
            None => records
                .iter()
                .map(|r| MappedRecord {
                    record: r.clone(),
                    warnings: Vec::new(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl VendorAdapter for RestAdapter {
    fn vendor_id(&self) -> &str {
        &self.profile.id
    }

    fn supported_data_types(&self) -> Vec<DataType> {
        self.profile.data_types()
    }

    async fn authenticate(&self) -> Result<()> {
        self.client.authenticate().await?;
        Ok(())
    }

    #[instrument(skip_all, fields(vendor = %self.profile.id, data_type = %data_type))]
    async fn get_data(&self, data_type: DataType, params: FetchParams) -> Result<FetchOutcome> {
        let endpoint = self.profile.endpoint(data_type)?;
        let mut pagination = endpoint
            .pagination
            .clone()
            .unwrap_or_else(|| self.profile.pagination.clone());
        if let Some(max_pages) = params.max_pages {
            pagination.max_pages = pagination.max_pages.min(max_pages);
        }

        let mut query: Vec<(String, String)> = endpoint
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.extend(params.query.iter().cloned());

        self.client.authenticate().await?;

        let client = &self.client;
        let mut outcome = drain(
            &pagination,
            &endpoint.list_path,
            &query,
            endpoint.results_path.as_deref(),
            params.cancel.as_ref(),
            |page| async move {
                let response = client
                    .get(&page.path, RequestOptions::new().with_query_pairs(page.query))
                    .await?;
                Ok(response.body)
            },
        )
        .await?;

        let mapped = self.map_records(data_type, &outcome.records);
        let mut records = Vec::with_capacity(mapped.len());
        for (idx, item) in mapped.into_iter().enumerate() {
            outcome
                .warnings
                .extend(item.warnings.iter().map(|w| format!("Record {}: {}", idx + 1, w)));
            records.push(item.record);
        }
        outcome.records = records;

        info!(
            records = outcome.records.len(),
            pages = outcome.pages,
            cancelled = outcome.cancelled,
            truncated = outcome.truncated,
            warnings = outcome.warnings.len(),
            "Fetched data"
        );
        Ok(outcome)
    }

    #[instrument(skip_all, fields(vendor = %self.profile.id, data_type = %data_type, records = records.len()))]
    async fn send_data(&self, data_type: DataType, records: &[Record]) -> Result<SendSummary> {
        let endpoint = self.profile.endpoint(data_type)?;
        let path = endpoint.send_path.as_deref().ok_or_else(|| {
            IntegrationError::Configuration(format!(
                "Vendor '{}' has no send_path for {}",
                self.profile.id, data_type
            ))
        })?;

        let external: Vec<Value> = records
            .iter()
            .map(|r| match self.mapper(data_type) {
                Some(mapper) => Value::Object(mapper.reverse_map(r)),
                None => Value::Object(r.clone()),
            })
            .collect();

        let mut summary = SendSummary::default();
        for batch in external.chunks(self.profile.send_batch_size) {
            let body = match &endpoint.send_wrapper {
                Some(key) => json!({ key.as_str(): batch }),
                None => Value::Array(batch.to_vec()),
            };
            let response = match self
                .client
                .request(endpoint.send_method, path, RequestOptions::new().with_body(body))
                .await
            {
                Ok(response) => response,
                Err(source) if summary.batches > 0 => {
                    warn!(sent = summary.sent, batches = summary.batches, error = %source, "Send stopped part-way");
                    return Err(AdapterError::PartialSend {
                        sent: Box::new(summary),
                        source,
                    });
                }
                Err(source) => return Err(source.into()),
            };

            summary.batches += 1;
            summary.sent += batch.len();
            if let Some(failed) = endpoint
                .failed_path
                .as_deref()
                .and_then(|p| ratelink_core::value_at_path(&response.body, p))
                .and_then(Value::as_array)
            {
                summary.failed_records.extend(failed.iter().cloned());
            }
            debug!(batch = summary.batches, size = batch.len(), status = response.status, "Sent batch");
        }

        info!(sent = summary.sent, batches = summary.batches, failed = summary.failed_records.len(), "Sent data");
        Ok(summary)
    }

    fn map_data(&self, data_type: DataType, records: &[Record]) -> Result<Vec<MappedRecord>> {
        Ok(self.map_records(data_type, records))
    }

    fn import_file(
        &self,
        path: &Path,
        data_type: DataType,
        mapping_override: Option<&MappingSpec>,
        sink: Option<&dyn RecordSink>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ImportOutcome> {
        Ok(self
            .pipeline
            .import_file(path, data_type, mapping_override, sink, cancel)?)
    }

    fn export_file(
        &self,
        path: &Path,
        data_type: DataType,
        records: &[Record],
        mapping_override: Option<&MappingSpec>,
    ) -> Result<ImportResult> {
        Ok(self.pipeline.export_file(path, data_type, records, mapping_override)?)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let check_path = self
            .profile
            .health_check_path
            .clone()
            .or_else(|| self.profile.endpoints.values().next().map(|e| e.list_path.clone()));
        self.client.test_connection(check_path.as_deref()).await
    }
}

impl std::fmt::Debug for RestAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestAdapter")
            .field("vendor", &self.profile.id)
            .field("data_types", &self.profile.data_types())
            .finish()
    }
}
