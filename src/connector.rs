//! Connector trait and the DEAR Inventory connector
//!
//! Defines the `Connector` trait the CLI drives and its one implementation,
//! which wires configuration, the built-in catalog, the HTTP client and the
//! sync engine together.

use crate::auth::ApiKeyAuth;
use crate::catalog::{apply_overrides, load_catalog};
use crate::config::{CatalogConfig, SourceConfig};
use crate::engine::{ExtractionPlan, Message, SyncConfig, SyncEngine, SyncReport};
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig};
use crate::source::CancelFlag;
use crate::state::StateManager;
use crate::types::SyncMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

// ============================================================================
// Check Result
// ============================================================================

/// Result of a connection check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check succeeded
    pub success: bool,

    /// Error message if failed
    pub message: Option<String>,
}

impl CheckResult {
    /// Create a successful check result
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Create a failed check result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// Stream Info
// ============================================================================

/// Summary of one stream of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream name
    pub name: String,
    /// Sync mode
    pub sync_mode: SyncMode,
    /// Primary key field
    pub primary_key: String,
    /// Cursor field of incremental streams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
    /// Parent stream of dependent streams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

// ============================================================================
// Connector Trait
// ============================================================================

/// Core trait of a source connector
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector name
    fn name(&self) -> &str;

    /// Tests if the configuration is usable
    async fn check(&self) -> Result<CheckResult>;

    /// Lists the streams this connector can read
    fn streams(&self) -> Vec<StreamInfo>;

    /// Reads the selected streams (all when `None`), sending messages to `tx`
    async fn read(
        &self,
        selected: Option<&[String]>,
        state: StateManager,
        tx: mpsc::Sender<Message>,
    ) -> Result<SyncReport>;
}

// ============================================================================
// DEAR Inventory Connector
// ============================================================================

/// The DEAR Inventory connector
#[derive(Debug)]
pub struct DearInventory {
    config: SourceConfig,
    catalog: CatalogConfig,
    cancel: CancelFlag,
}

impl DearInventory {
    /// Create a connector over the built-in catalog
    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self::with_catalog(config, load_catalog()?))
    }

    /// Create a connector over a custom catalog
    pub fn with_catalog(config: SourceConfig, catalog: CatalogConfig) -> Self {
        let catalog = apply_overrides(catalog, &config);
        Self {
            config,
            catalog,
            cancel: CancelFlag::new(),
        }
    }

    /// User configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Catalog with user overrides applied
    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    /// Handle that cancels a running `read`
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Resolve the selected streams into a plan
    pub fn plan(&self, selected: Option<&[String]>) -> Result<ExtractionPlan> {
        ExtractionPlan::build(&self.catalog, selected)
    }

    /// Build the sync engine for one read
    pub fn engine(&self, state: StateManager) -> Result<SyncEngine> {
        let auth = ApiKeyAuth::from_config(&self.config)?;
        let http = HttpClientConfig::from_settings(self.catalog.base_url.clone(), &self.config.http);
        let client = Arc::new(HttpClient::with_auth(http, auth)?);

        let sync = SyncConfig::new()
            .with_max_concurrent_streams(self.config.max_concurrent_streams)
            .with_initial_watermark(self.config.initial_watermark())
            .with_template_config(json!({
                "account_id": self.config.account_id,
                "updated_since": self.config.initial_watermark(),
                "page_size": self.config.page_size,
            }));

        Ok(SyncEngine::new(client, state)
            .with_config(sync)
            .with_cancel(self.cancel.clone()))
    }
}

#[async_trait]
impl Connector for DearInventory {
    fn name(&self) -> &str {
        "dear-inventory"
    }

    async fn check(&self) -> Result<CheckResult> {
        Ok(match self.config.validate() {
            Ok(()) => CheckResult::success(),
            Err(e) => CheckResult::failure(e.to_string()),
        })
    }

    fn streams(&self) -> Vec<StreamInfo> {
        self.catalog
            .streams
            .iter()
            .map(|s| StreamInfo {
                name: s.name.clone(),
                sync_mode: s.sync_mode(),
                primary_key: s.primary_key.clone(),
                cursor_field: s.cursor_field().map(ToString::to_string),
                parent: s.parent.as_ref().map(|p| p.stream.clone()),
            })
            .collect()
    }

    async fn read(
        &self,
        selected: Option<&[String]>,
        state: StateManager,
        tx: mpsc::Sender<Message>,
    ) -> Result<SyncReport> {
        self.config.validate()?;
        let plan = self.plan(selected)?;
        let engine = self.engine(state)?;

        info!("Reading {} streams", plan.len());
        engine.run(&plan, tx).await
    }
}
