//! Vendor registry
//!
//! Adapters are looked up by vendor id. Each profile names an adapter kind
//! and the registry builds it with the matching factory, so supporting a new
//! protocol means registering one factory rather than subclassing.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::adapter::{AdapterContext, RestAdapter, VendorAdapter};
use crate::error::{AdapterError, Result};
use crate::profile::{load_profiles, VendorProfile, DEFAULT_ADAPTER_KIND};

/// Builds an adapter from a profile and the shared context
pub type AdapterFactory =
    Arc<dyn Fn(VendorProfile, &AdapterContext) -> Result<Arc<dyn VendorAdapter>> + Send + Sync>;

#[derive(Clone)]
pub struct AdapterRegistry {
    context: AdapterContext,
    factories: HashMap<String, AdapterFactory>,
    profiles: BTreeMap<String, VendorProfile>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(AdapterContext::default())
    }
}

impl AdapterRegistry {
    /// Registry with the built-in `rest` factory
    pub fn new(context: AdapterContext) -> Self {
        let mut registry = Self {
            context,
            factories: HashMap::new(),
            profiles: BTreeMap::new(),
        };
        registry.register_factory(DEFAULT_ADAPTER_KIND, |profile, context| {
            Ok(Arc::new(RestAdapter::from_profile(profile, context)?) as Arc<dyn VendorAdapter>)
        });
        registry
    }

    pub fn context(&self) -> &AdapterContext {
        &self.context
    }

    pub fn register_factory<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(VendorProfile, &AdapterContext) -> Result<Arc<dyn VendorAdapter>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Add or replace a vendor profile
    pub fn add_profile(&mut self, profile: VendorProfile) -> Result<()> {
        profile.validate()?;
        if !self.factories.contains_key(&profile.adapter) {
            return Err(AdapterError::UnknownAdapterKind(profile.adapter.clone()));
        }
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    /// Load every profile in a directory; returns how many were added
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let profiles = load_profiles(dir.as_ref())?;
        let count = profiles.len();
        for profile in profiles {
            self.add_profile(profile)?;
        }
        info!(dir = %dir.as_ref().display(), vendors = count, "Loaded vendor profiles");
        Ok(count)
    }

    pub fn vendors(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &VendorProfile> {
        self.profiles.values()
    }

    pub fn profile(&self, vendor: &str) -> Result<&VendorProfile> {
        self.profiles
            .get(vendor)
            .ok_or_else(|| AdapterError::UnknownVendor(vendor.to_string()))
    }

    /// Build a fresh adapter for `vendor`
    pub fn create(&self, vendor: &str) -> Result<Arc<dyn VendorAdapter>> {
        let profile = self.profile(vendor)?;
        let factory = self
            .factories
            .get(&profile.adapter)
            .ok_or_else(|| AdapterError::UnknownAdapterKind(profile.adapter.clone()))?;
        factory(profile.clone(), &self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratelink_core::DataType;
    use ratelink_transport::{AuthMethod, ConnectionConfig};

    fn profile(id: &str) -> VendorProfile {
        VendorProfile::new(id, ConnectionConfig::new("https://example.com", AuthMethod::None))
            .with_endpoint(DataType::Matter, crate::profile::EndpointConfig::new("/matters"))
    }

    #[test]
    fn test_create_known_vendor() {
        let mut registry = AdapterRegistry::default();
        registry.add_profile(profile("acme")).unwrap();

        let adapter = registry.create("acme").unwrap();
        assert_eq!(adapter.vendor_id(), "acme");
        assert_eq!(adapter.supported_data_types(), vec![DataType::Matter]);
        assert_eq!(registry.vendors(), vec!["acme"]);
    }

    #[test]
    fn test_unknown_vendor_and_kind() {
        let mut registry = AdapterRegistry::default();
        assert!(matches!(registry.create("nope"), Err(AdapterError::UnknownVendor(_))));

        let mut soap = profile("legacy");
        soap.adapter = "soap".to_string();
        assert!(matches!(
            registry.add_profile(soap),
            Err(AdapterError::UnknownAdapterKind(kind)) if kind == "soap"
        ));
    }

    #[test]
    fn test_custom_factory() {
        let mut registry = AdapterRegistry::default();
        registry.register_factory("custom", |mut profile, context| {
            profile.id = format!("{}-custom", profile.id);
            Ok(Arc::new(RestAdapter::from_profile(profile, context)?) as Arc<dyn VendorAdapter>)
        });

        let mut custom = profile("acme");
        custom.adapter = "custom".to_string();
        registry.add_profile(custom).unwrap();

        assert_eq!(registry.create("acme").unwrap().vendor_id(), "acme-custom");
    }
}
