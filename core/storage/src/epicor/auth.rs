//! Connection settings and request headers for Epicor Kinetic.

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use gembasync_common::{Error, Result};

/// Default updatable BAQ exposing the file catalog.
const DEFAULT_BAQ: &str = "AccessGembaFiles";
/// Header carrying the Epicor API key.
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// API key plus basic-auth token sent with every request.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Value of the `X-API-Key` header.
    pub api_key: String,
    /// Base64 `user:password` token for the `Authorization: Basic` header.
    pub user_pass: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, user_pass: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user_pass: user_pass.into(),
        }
    }

    /// Build credentials from a plain user name and password.
    pub fn from_login(api_key: impl Into<String>, user: &str, password: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
        Self::new(api_key, token)
    }

    /// Whether both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.user_pass.is_empty()
    }

    /// Headers for a request, with `Content-Type` when it carries a body.
    pub fn headers(&self, has_content: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(API_KEY_HEADER, sensitive_value(&self.api_key)?);
        headers.insert(
            AUTHORIZATION,
            sensitive_value(&format!("Basic {}", self.user_pass))?,
        );
        if has_content {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }
}

fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("Credential is not a valid header value: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("user_pass", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to talk to one Epicor Kinetic company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicorConfig {
    /// Scheme and host, e.g. `https://kinetic.example.com`.
    pub domain: String,
    /// Application path under the domain, e.g. `Kinetic`.
    pub app_path: String,
    /// Company identifier used in every OData path.
    pub company_id: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Name of the updatable BAQ holding the file rows.
    #[serde(default = "default_baq")]
    pub baq_name: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_baq() -> String {
    DEFAULT_BAQ.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl EpicorConfig {
    pub fn new(
        domain: impl Into<String>,
        app_path: impl Into<String>,
        company_id: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            domain: domain.into(),
            app_path: app_path.into(),
            company_id: company_id.into(),
            credentials,
            baq_name: default_baq(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Root of the company's OData API, always ending in `/`.
    ///
    /// # Errors
    /// - Domain is not an absolute URL
    /// - Company or app path is empty
    pub fn odata_base(&self) -> Result<Url> {
        if self.company_id.trim().is_empty() {
            return Err(Error::Config("company_id is required".to_string()));
        }
        let app_path = self.app_path.trim_matches('/');
        if app_path.is_empty() {
            return Err(Error::Config("app_path is required".to_string()));
        }

        let base = format!(
            "{}/{}/api/v2/odata/{}/",
            self.domain.trim_end_matches('/'),
            app_path,
            self.company_id.trim()
        );
        Url::parse(&base).map_err(|e| Error::Config(format!("Invalid domain '{}': {}", self.domain, e)))
    }

    /// Check that the configuration can be used for requests.
    pub fn validate(&self) -> Result<()> {
        self.odata_base()?;
        if !self.credentials.is_complete() {
            return Err(Error::Config(
                "api_key and user_pass are required".to_string(),
            ));
        }
        if self.baq_name.is_empty() {
            return Err(Error::Config("baq_name cannot be empty".to_string()));
        }
        Ok(())
    }
}
