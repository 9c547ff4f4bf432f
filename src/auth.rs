//! Static header authentication
//!
//! Every DEAR request carries the account id and the application key as two
//! plain headers. Nothing is refreshed or signed.

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use reqwest::RequestBuilder;

/// Header carrying the application key
pub const APPLICATION_KEY_HEADER: &str = "api-auth-applicationkey";

/// Header carrying the account id
pub const ACCOUNT_ID_HEADER: &str = "api-auth-accountid";

/// The two auth header values
#[derive(Clone)]
pub struct ApiKeyAuth {
    account_id: String,
    application_key: String,
}

impl ApiKeyAuth {
    /// Create from raw values; both must be non-empty
    pub fn new(account_id: impl Into<String>, application_key: impl Into<String>) -> Result<Self> {
        let account_id = account_id.into();
        let application_key = application_key.into();

        if account_id.trim().is_empty() {
            return Err(Error::missing_field("account_id"));
        }
        if application_key.trim().is_empty() {
            return Err(Error::missing_field("api_key"));
        }

        Ok(Self {
            account_id,
            application_key,
        })
    }

    /// Build from the user config
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(config.account_id.clone(), config.api_key.clone())
    }

    /// Attach both headers to a request
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        self.headers()
            .into_iter()
            .fold(req, |req, (name, value)| req.header(name, value))
    }

    /// Header pairs, in the order they are sent
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (APPLICATION_KEY_HEADER, self.application_key.as_str()),
            (ACCOUNT_ID_HEADER, self.account_id.as_str()),
        ]
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("account_id", &self.account_id)
            .field("application_key", &"***")
            .finish()
    }
}
