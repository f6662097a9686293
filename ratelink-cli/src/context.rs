//! CLI execution context

use anyhow::{Context as _, Result};
use ratelink_adapters::{AdapterContext, AdapterRegistry, VendorAdapter};
use ratelink_core::CancellationToken;
use ratelink_import::{FileImportPipeline, ImportOptions};
use ratelink_mapping::MappingSpec;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::config::CliConfig;
use crate::output::OutputWriter;

/// Execution context for CLI commands
pub struct Context {
    pub config: CliConfig,

    pub output: OutputWriter,

    /// Vendors loaded from the profile directory
    pub registry: AdapterRegistry,

    /// Cancelled on Ctrl-C
    pub cancel: CancellationToken,

    import_options: ImportOptions,
}

impl Context {
    pub fn new(cli: &Cli, config: CliConfig) -> Result<Self> {
        let import_options = config.import.to_options()?;
        let profile_dir = cli.profiles.clone().unwrap_or_else(|| config.profile_dir.clone());

        let adapter_context = AdapterContext::default().with_import_options(import_options.clone());
        let mut registry = AdapterRegistry::new(adapter_context);
        if profile_dir.is_dir() {
            registry
                .load_dir(&profile_dir)
                .with_context(|| format!("Failed to load vendor profiles from {}", profile_dir.display()))?;
        } else {
            debug!(dir = %profile_dir.display(), "No vendor profile directory");
        }

        Ok(Self {
            output: OutputWriter::new(cli.output, cli.no_color),
            config: CliConfig {
                profile_dir,
                ..config
            },
            registry,
            cancel: CancellationToken::new(),
            import_options,
        })
    }

    pub fn profile_dir(&self) -> &PathBuf {
        &self.config.profile_dir
    }

    /// Resolve the vendor argument or the configured default
    pub fn vendor_id(&self, vendor: Option<&str>) -> Result<String> {
        vendor
            .or(self.config.default_vendor.as_deref())
            .map(str::to_string)
            .context("No vendor given and no default_vendor configured")
    }

    pub fn adapter(&self, vendor: Option<&str>) -> Result<Arc<dyn VendorAdapter>> {
        let vendor = self.vendor_id(vendor)?;
        self.registry
            .create(&vendor)
            .with_context(|| format!("Failed to create adapter for vendor '{}'", vendor))
    }

    /// Import options with an optional rate-increase override
    pub fn import_options(&self, max_increase: Option<f64>) -> ImportOptions {
        let mut options = self.import_options.clone();
        if let Some(percent) = max_increase {
            options.validation = options.validation.with_max_increase_percent(percent);
        }
        options
    }

    /// Standalone pipeline; pass `self.cancel` to its calls for Ctrl-C
    pub fn pipeline(&self, max_increase: Option<f64>) -> FileImportPipeline {
        FileImportPipeline::new(self.import_options(max_increase))
    }

    /// Cancel the context token on Ctrl-C
    pub fn watch_interrupt(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing current step");
                cancel.cancel();
            }
        });
    }
}

/// Mapping override from a JSON or YAML file
pub fn load_mapping(path: Option<&Path>) -> Result<Option<MappingSpec>> {
    path.map(|p| {
        MappingSpec::from_path(p).with_context(|| format!("Failed to load mapping from {}", p.display()))
    })
    .transpose()
}
