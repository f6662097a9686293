//! Vendor profiles
//!
//! A profile is the configuration data for one external system: how to
//! connect, how it paginates, which endpoint serves each entity kind and how
//! its fields map onto the canonical schema. Profiles are plain documents in
//! YAML, JSON or TOML.

use ratelink_core::DataType;
use ratelink_mapping::{validate_spec, MappingSpec};
use ratelink_transport::{ConnectionConfig, HttpMethod};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};
use crate::pagination::PaginationConfig;

/// Adapter factory used when a profile does not name one
pub const DEFAULT_ADAPTER_KIND: &str = "rest";

/// Records per request when sending
pub const DEFAULT_SEND_BATCH_SIZE: usize = 100;

/// Endpoint layout for one entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Path listing records of this kind
    pub list_path: String,

    /// Path accepting new or updated records; read-only when absent
    #[serde(default)]
    pub send_path: Option<String>,

    #[serde(default = "default_send_method")]
    pub send_method: HttpMethod,

    /// Where the records sit in a list response (dotted path or JSON pointer)
    #[serde(default)]
    pub results_path: Option<String>,

    /// Wrap each sent batch as `{"<key>": [...]}` instead of a bare array
    #[serde(default)]
    pub send_wrapper: Option<String>,

    /// Where per-record failures sit in a send response
    #[serde(default)]
    pub failed_path: Option<String>,

    /// Fixed query parameters for list requests
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// Pagination override for this endpoint
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,
}

fn default_send_method() -> HttpMethod {
    HttpMethod::Post
}

impl EndpointConfig {
    pub fn new(list_path: impl Into<String>) -> Self {
        Self {
            list_path: list_path.into(),
            send_path: None,
            send_method: default_send_method(),
            results_path: None,
            send_wrapper: None,
            failed_path: None,
            query: BTreeMap::new(),
            pagination: None,
        }
    }

    pub fn with_send_path(mut self, path: impl Into<String>) -> Self {
        self.send_path = Some(path.into());
        self
    }

    pub fn with_results_path(mut self, path: impl Into<String>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

fn default_adapter_kind() -> String {
    DEFAULT_ADAPTER_KIND.to_string()
}

fn default_send_batch_size() -> usize {
    DEFAULT_SEND_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Registry key, e.g. `"elite"`
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Adapter factory to build this vendor with
    #[serde(default = "default_adapter_kind")]
    pub adapter: String,

    pub connection: ConnectionConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default, deserialize_with = "kind_map")]
    pub endpoints: BTreeMap<DataType, EndpointConfig>,

    /// Vendor field mapping per entity kind
    #[serde(default, deserialize_with = "kind_map")]
    pub mappings: BTreeMap<DataType, MappingSpec>,

    /// Path requested by `test_connection`
    #[serde(default)]
    pub health_check_path: Option<String>,

    #[serde(default = "default_send_batch_size")]
    pub send_batch_size: usize,
}

/// Entity-kind keyed table; keys accept every kind alias
fn kind_map<'de, D, T>(deserializer: D) -> std::result::Result<BTreeMap<DataType, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    BTreeMap::<String, T>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            key.parse::<DataType>()
                .map(|kind| (kind, value))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

impl VendorProfile {
    pub fn new(id: impl Into<String>, connection: ConnectionConfig) -> Self {
        Self {
            id: id.into(),
            name: None,
            adapter: default_adapter_kind(),
            connection,
            pagination: PaginationConfig::default(),
            endpoints: BTreeMap::new(),
            mappings: BTreeMap::new(),
            health_check_path: None,
            send_batch_size: DEFAULT_SEND_BATCH_SIZE,
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_endpoint(mut self, data_type: DataType, endpoint: EndpointConfig) -> Self {
        self.endpoints.insert(data_type, endpoint);
        self
    }

    pub fn with_mapping(mut self, data_type: DataType, mapping: MappingSpec) -> Self {
        self.mappings.insert(data_type, mapping);
        self
    }

    pub fn with_send_batch_size(mut self, size: usize) -> Self {
        self.send_batch_size = size;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn endpoint(&self, data_type: DataType) -> Result<&EndpointConfig> {
        self.endpoints
            .get(&data_type)
            .ok_or_else(|| AdapterError::UnsupportedDataType {
                vendor: self.id.clone(),
                data_type,
            })
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.endpoints.keys().copied().collect()
    }

    /// Connection, mappings and batch size checked up front
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AdapterError::profile("<unnamed>", "id must not be empty"));
        }
        self.connection.ensure_valid()?;
        for (data_type, spec) in &self.mappings {
            validate_spec(spec).map_err(|e| AdapterError::profile(&self.id, format!("{} mapping: {}", data_type, e)))?;
        }
        if self.send_batch_size == 0 {
            return Err(AdapterError::profile(&self.id, "send_batch_size must be at least 1"));
        }
        if self.pagination.max_pages == 0 {
            return Err(AdapterError::profile(&self.id, "pagination.max_pages must be at least 1"));
        }
        for (data_type, endpoint) in &self.endpoints {
            if endpoint.pagination.as_ref().is_some_and(|p| p.max_pages == 0) {
                return Err(AdapterError::profile(
                    &self.id,
                    format!("{} endpoint pagination.max_pages must be at least 1", data_type),
                ));
            }
        }
        Ok(())
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let profile: Self = serde_yaml::from_str(raw).map_err(|e| AdapterError::profile("<yaml>", e))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(raw).map_err(|e| AdapterError::profile("<json>", e))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let profile: Self = toml::from_str(raw).map_err(|e| AdapterError::profile("<toml>", e))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load by extension: `.yaml`/`.yml`, `.json` or `.toml`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| AdapterError::profile(&name, e))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let parsed = match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml(&raw),
            "json" => Self::from_json(&raw),
            "toml" => Self::from_toml(&raw),
            other => return Err(AdapterError::profile(&name, format!("unsupported extension '{}'", other))),
        };

        parsed.map_err(|e| match e {
            AdapterError::Profile { message, .. } => AdapterError::Profile {
                source_name: name,
                message,
            },
            other => other,
        })
    }
}

/// Every profile in `dir`, sorted by id. Files with other extensions are
/// ignored; a malformed profile fails the whole load.
pub fn load_profiles(dir: impl AsRef<Path>) -> Result<Vec<VendorProfile>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| AdapterError::profile(dir.display().to_string(), e))?;

    let mut profiles = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| AdapterError::profile(dir.display().to_string(), e))?
            .path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "yaml" | "yml" | "json" | "toml"))
            .unwrap_or(false);
        if !path.is_file() || !supported {
            debug!(path = %path.display(), "Skipping non-profile file");
            continue;
        }
        profiles.push(VendorProfile::from_path(&path)?);
    }

    profiles.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(pair) = profiles.windows(2).find(|w| w[0].id == w[1].id) {
        warn!(vendor = %pair[0].id, "Duplicate vendor id in profile directory");
        return Err(AdapterError::profile(
            dir.display().to_string(),
            format!("vendor id '{}' defined more than once", pair[0].id),
        ));
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PaginationStyle;
    use pretty_assertions::assert_eq;

    const ELITE_YAML: &str = r#"
id: elite
name: Elite 3E
connection:
  base_url: https://elite.example.com/api
  auth_method: oauth_client_credentials
  auth_credentials:
    token_url: /oauth/token
    client_id: ratelink
    client_secret: s3cret
pagination:
  style: offset_limit
  page_size: 200
  total_path: meta.total
endpoints:
  timekeeper:
    list_path: /timekeepers
    results_path: data
  rates:
    list_path: /rates
    send_path: /rates/batch
    send_method: put
mappings:
  timekeeper:
    attorney_name:
      source_field: displayName
"#;

    #[test]
    fn test_yaml_profile_with_aliases() {
        let profile = VendorProfile::from_yaml(ELITE_YAML).unwrap();

        assert_eq!(profile.display_name(), "Elite 3E");
        assert_eq!(profile.adapter, "rest");
        assert_eq!(profile.data_types(), vec![DataType::Attorney, DataType::Rate]);
        assert_eq!(profile.endpoint(DataType::Rate).unwrap().send_method, HttpMethod::Put);
        assert_eq!(profile.pagination.max_pages, 1000);
        assert!(matches!(
            profile.pagination.style,
            PaginationStyle::OffsetLimit { page_size: 200, .. }
        ));
        assert!(profile.endpoint(DataType::Billing).is_err());
    }

    #[test]
    fn test_profile_with_bad_mapping_is_rejected() {
        let raw = ELITE_YAML.replace("source_field: displayName", "transform: string");
        let err = VendorProfile::from_yaml(&raw).unwrap_err();
        assert!(err.to_string().contains("missing source_field"));
    }

    #[test]
    fn test_endpoint_pagination_override_is_validated() {
        let mut pagination = PaginationConfig::offset_limit(50, None);
        pagination.max_pages = 0;
        let connection = ConnectionConfig::new("https://strict.example.com", ratelink_transport::AuthMethod::None);
        let profile = VendorProfile::new("strict", connection)
            .with_endpoint(DataType::Rate, EndpointConfig::new("/rates").with_pagination(pagination));

        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("rate endpoint pagination.max_pages"), "{}", err);
    }

    #[test]
    fn test_toml_profile() {
        let raw = r#"
id = "simple"

[connection]
base_url = "https://simple.example.com"
auth_method = "api_key"
auth_credentials = { api_key = "k" }

[endpoints.matter]
list_path = "/matters"
"#;
        let profile = VendorProfile::from_toml(raw).unwrap();
        assert_eq!(profile.pagination, PaginationConfig::default());
        assert_eq!(profile.endpoint(DataType::Matter).unwrap().list_path, "/matters");
    }

    #[test]
    fn test_load_profiles_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("elite.yaml"), ELITE_YAML).unwrap();
        std::fs::write(dir.path().join("README.md"), "not a profile").unwrap();

        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, "elite");

        std::fs::write(dir.path().join("copy.yml"), ELITE_YAML).unwrap();
        assert!(load_profiles(dir.path()).is_err());
    }
}
