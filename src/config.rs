//! Client configuration
//!
//! Built once, then shared read-only with every operation the client runs.

use crate::error::{GoodDataError, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_HOST: &str = "secure.gooddata.com";
pub const DEFAULT_PORT: u16 = 443;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

/// HTTP method used against `/gdc/account/token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenMethod {
    #[default]
    Get,
    Post,
}

impl std::str::FromStr for TokenMethod {
    type Err = GoodDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(GoodDataError::Config(format!(
                "unsupported token method '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(rename = "hostName")]
    pub host_name: String,
    pub port: u16,
    pub scheme: Scheme,
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub username: String,
    pub password: String,
    pub domain: Option<String>,
    #[serde(rename = "attributeUriForFilter")]
    pub attribute_uri_for_filter: Option<String>,
    #[serde(rename = "tokenMethod")]
    pub token_method: TokenMethod,
    #[serde(skip)]
    pub timeout: Duration,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_name: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            scheme: Scheme::Https,
            project_id: String::new(),
            username: String::new(),
            password: String::new(),
            domain: None,
            attribute_uri_for_filter: None,
            token_method: TokenMethod::Get,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("gooddata_client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host_name", &self.host_name)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("project_id", &self.project_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("attribute_uri_for_filter", &self.attribute_uri_for_filter)
            .field("token_method", &self.token_method)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `GOODDATA_*` environment variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GoodDataError::Config(format!("{} not set", key)))
        };

        let mut config = Self::new(required("GOODDATA_USERNAME")?, required("GOODDATA_PASSWORD")?);

        if let Some(host) = lookup("GOODDATA_HOST") {
            config.host_name = host;
        }
        if let Some(port) = lookup("GOODDATA_PORT") {
            config.port = port
                .parse()
                .map_err(|_| GoodDataError::Config(format!("invalid GOODDATA_PORT '{}'", port)))?;
        }
        if let Some(scheme) = lookup("GOODDATA_SCHEME") {
            config.scheme = match scheme.to_ascii_lowercase().as_str() {
                "https" => Scheme::Https,
                "http" => Scheme::Http,
                _ => {
                    return Err(GoodDataError::Config(format!(
                        "invalid GOODDATA_SCHEME '{}'",
                        scheme
                    )))
                }
            };
        }
        if let Some(method) = lookup("GOODDATA_TOKEN_METHOD") {
            config.token_method = method.parse()?;
        }
        config.project_id = lookup("GOODDATA_PROJECT_ID").unwrap_or_default();
        config.domain = lookup("GOODDATA_DOMAIN");
        config.attribute_uri_for_filter = lookup("GOODDATA_ATTRIBUTE_URI");

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host_name = host.into();
        self.port = port;
        self
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_attribute_uri_for_filter(mut self, uri: impl Into<String>) -> Self {
        self.attribute_uri_for_filter = Some(uri.into());
        self
    }

    pub fn with_token_method(mut self, method: TokenMethod) -> Self {
        self.token_method = method;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Root URL every API path is resolved against
    pub fn base_url(&self) -> Result<Url> {
        if self.host_name.is_empty() {
            return Err(GoodDataError::Config("host name is empty".to_string()));
        }
        let raw = format!("{}://{}:{}/", self.scheme.as_str(), self.host_name, self.port);
        Ok(Url::parse(&raw)?)
    }

    pub(crate) fn require_project(&self) -> Result<&str> {
        if self.project_id.is_empty() {
            return Err(GoodDataError::Config("project id is not configured".to_string()));
        }
        Ok(&self.project_id)
    }

    pub(crate) fn require_domain(&self) -> Result<&str> {
        self.domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| GoodDataError::Config("domain is not configured".to_string()))
    }
}
