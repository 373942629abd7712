//! Store connection configuration.

use std::fmt;
use std::time::Duration;

/// Default login domain.
pub const DEFAULT_DOMAIN: &str = "login";

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "59.0";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Login domain: `login`, `test`, a custom prefix such as `acme.my`, or a
    /// full `https://` URL.
    pub domain: String,

    /// REST API version, without the leading `v`.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl StoreConfig {
    /// Create a configuration for the given login domain.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL of the login host.
    pub fn login_host(&self) -> String {
        let domain = self.domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}.salesforce.com", domain)
        }
    }

    /// SOAP login endpoint.
    pub fn login_url(&self) -> String {
        format!("{}/services/Soap/u/{}", self.login_host(), self.api_version)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}

/// Username, password and security token for one store.
#[derive(Clone)]
pub struct Credentials {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Security token appended to the password.
    pub security_token: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        security_token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            security_token: security_token.into(),
        }
    }

    /// Whether username and password are both present.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("security_token", &"***")
            .finish()
    }
}
