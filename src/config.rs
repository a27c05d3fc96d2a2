//! Key Vault client configuration.

use std::time::Duration;

/// Default Key Vault REST API version sent with every request.
pub const DEFAULT_API_VERSION: &str = "7.4";

/// Key Vault client configuration.
///
/// Transport settings only; the vault base URL is supplied per call and the
/// credential provider is injected at client construction.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Key Vault REST API version
    pub api_version: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Grace period before token expiry at which a new token is acquired
    pub token_grace_period: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            api_version: std::env::var("KEYVAULT_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            token_grace_period: Duration::from_secs(120),
            user_agent: concat!("keyvault-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl VaultConfig {
    /// Create a configuration with a specific API version.
    #[must_use]
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            ..Default::default()
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the token renewal grace period.
    #[must_use]
    pub const fn with_token_grace_period(mut self, grace: Duration) -> Self {
        self.token_grace_period = grace;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
