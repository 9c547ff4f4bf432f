//! Configuration types
//!
//! Two kinds of configuration live here:
//! - `SourceConfig`: the user-supplied credentials and tuning knobs (JSON or YAML)
//! - `CatalogConfig` / `StreamConfig`: resource definitions loaded from the
//!   embedded catalog YAML (see `catalog`)

use crate::error::{Error, Result, ResultExt};
use crate::pagination::TerminationPolicy;
use crate::state::CursorValue;
use crate::types::{BackoffType, OptionStringExt, SyncMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Source Config (user input)
// ============================================================================

/// User configuration for a sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Value of the `api-auth-accountid` header
    #[serde(default)]
    pub account_id: String,

    /// Value of the `api-auth-applicationkey` header
    #[serde(default)]
    pub api_key: String,

    /// Initial watermark for incremental streams without saved state
    #[serde(default, alias = "created_since")]
    pub updated_since: Option<String>,

    /// Page size override applied to every paginated stream
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Base URL override (defaults to the catalog's base URL)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Maximum number of streams synced at the same time
    #[serde(default = "default_concurrency")]
    pub max_concurrent_streams: usize,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_concurrency() -> usize {
    1
}

impl SourceConfig {
    /// Create a config with the two credentials and defaults for everything else
    pub fn new(account_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_key: api_key.into(),
            updated_since: None,
            page_size: None,
            base_url: None,
            max_concurrent_streams: default_concurrency(),
            http: HttpConfig::default(),
        }
    }

    /// Load a config file; `.yaml`/`.yml` files are parsed as YAML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Parse an inline JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("Invalid config JSON: {e}")))
    }

    /// Initial watermark from config, if one was given
    pub fn initial_watermark(&self) -> Option<String> {
        self.updated_since.clone().none_if_empty()
    }

    /// Validate the configuration.
    ///
    /// Credentials are only checked for presence; the API is the judge of
    /// whether they are valid.
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(Error::missing_field("account_id"));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::missing_field("api_key"));
        }

        if let Some(since) = self.initial_watermark() {
            if CursorValue::new(since.as_str()).timestamp().is_none() {
                return Err(Error::invalid_value(
                    "updated_since",
                    format!("'{since}' is not an ISO-8601 timestamp"),
                ));
            }
        }

        if self.page_size == Some(0) {
            return Err(Error::invalid_value("page_size", "must be greater than 0"));
        }
        if self.max_concurrent_streams == 0 {
            return Err(Error::invalid_value(
                "max_concurrent_streams",
                "must be at least 1",
            ));
        }
        if self.http.requests_per_minute == 0 {
            return Err(Error::invalid_value(
                "http.requests_per_minute",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries on a non-200 response (`null` = retry forever)
    #[serde(default = "default_max_retries")]
    pub max_retries: Option<u32>,

    /// Delay before retrying a failed request, in seconds
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: u64,

    /// How the retry delay grows between attempts
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// Request budget shared by all streams
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            backoff_seconds: default_backoff_seconds(),
            backoff_type: BackoffType::Constant,
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> Option<u32> {
    Some(5)
}

fn default_backoff_seconds() -> u64 {
    60
}

fn default_requests_per_minute() -> u32 {
    60
}

// ============================================================================
// Catalog Config
// ============================================================================

/// Resource catalog loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL for API requests
    pub base_url: String,

    /// Stream definitions, in sync order
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

impl CatalogConfig {
    /// Look up a stream definition by name
    pub fn get(&self, name: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Stream names in catalog order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }
}

// ============================================================================
// Stream Config
// ============================================================================

/// Definition of one API resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Unique stream name
    pub name: String,

    /// Resource path relative to the base URL
    pub path: String,

    /// Key of the record array in the response body
    pub record_key: String,

    /// Primary key field
    pub primary_key: String,

    /// Query parameter templates
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Pagination configuration
    #[serde(default)]
    pub pagination: PaginationConfigDef,

    /// Incremental sync configuration
    #[serde(default)]
    pub incremental: Option<IncrementalConfig>,

    /// Parent stream this stream depends on
    #[serde(default)]
    pub parent: Option<ParentConfig>,

    /// What to do when the API answers with a non-200 status
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

impl StreamConfig {
    /// Sync mode implied by the definition
    pub fn sync_mode(&self) -> SyncMode {
        if self.incremental.is_some() {
            SyncMode::Incremental
        } else {
            SyncMode::FullRefresh
        }
    }

    /// Cursor field for incremental streams
    pub fn cursor_field(&self) -> Option<&str> {
        self.incremental.as_ref().map(|i| i.cursor_field.as_str())
    }

    /// Apply a global page size override
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        if let PaginationConfigDef::PageCursor { page_size, .. } = &mut self.pagination {
            *page_size = size;
        }
        self
    }
}

/// Pagination configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfigDef {
    /// Single request, no pagination
    #[default]
    None,

    /// `Page` / `Total` page-number pagination
    PageCursor {
        #[serde(default = "default_page_param")]
        page_param: String,
        #[serde(default = "default_limit_param")]
        limit_param: String,
        #[serde(default = "default_page_size")]
        page_size: u32,
        #[serde(default)]
        termination: TerminationPolicy,
    },
}

fn default_page_param() -> String {
    "Page".to_string()
}

fn default_limit_param() -> String {
    "Limit".to_string()
}

fn default_page_size() -> u32 {
    1000
}

/// Incremental sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalConfig {
    /// Record field holding the cursor value
    pub cursor_field: String,

    /// Query parameter carrying the start-of-sync watermark
    pub request_param: String,
}

/// Parent binding for a dependent stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentConfig {
    /// Name of the parent stream
    pub stream: String,

    /// Field of the parent record that keys each child request
    pub key: String,
}

/// Handling of non-200 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Back off and retry the same request
    #[default]
    Retry,
    /// Retry 429 and 5xx; emit one empty sentinel record for any other status
    EmitEmpty,
}
