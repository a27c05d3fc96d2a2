//! Credential providers for vault authentication.
//!
//! The client borrows one long-lived [`TokenCredential`] for its entire
//! lifetime; providers are never re-created per call. Concrete providers
//! cover the ambient sources: configuration-supplied tokens, client-secret
//! OAuth against the directory, and the managed-identity endpoint.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{VaultError, VaultResult};

/// Default authority host for the client-credentials grant.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Instance metadata service endpoint used when no identity endpoint is
/// configured in the environment.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// A bearer token scoped to one resource.
#[derive(Clone)]
pub struct AccessToken {
    token: SecretString,
    /// Expiry instant, if the issuer reported one
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token with an optional expiry.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_on: Option<DateTime<Utc>>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_on,
        }
    }

    /// The raw bearer token. Use immediately, avoid storing.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.token.expose_secret()
    }

    /// Whether the token expires within `grace` from now. Tokens without a
    /// reported expiry never count as expiring.
    #[must_use]
    pub fn expires_within(&self, grace: Duration) -> bool {
        self.expires_on.is_some_and(|exp| {
            TimeDelta::from_std(grace).is_ok_and(|grace| exp - Utc::now() <= grace)
        })
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of bearer tokens for vault requests.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Acquire a token for the given resource (the vault's scheme + host).
    async fn get_token(&self, resource: &str) -> VaultResult<AccessToken>;
}

/// Fixed, configuration-supplied token.
///
/// Also the test seam: tests inject a known token and assert it reaches the
/// wire as a bearer header.
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    /// Wrap a pre-acquired token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _resource: &str) -> VaultResult<AccessToken> {
        Ok(AccessToken::new(self.token.expose_secret(), None))
    }
}

#[derive(Deserialize)]
struct OauthTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// OAuth2 client-credentials grant against the directory authority.
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
    authority: String,
    http: reqwest::Client,
}

impl ClientSecretCredential {
    /// Create a credential from explicit tenant, client, and secret.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            authority: DEFAULT_AUTHORITY.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Create a credential from the `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, and
    /// `AZURE_CLIENT_SECRET` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AuthenticationFailed`] if any of the three
    /// variables is missing.
    pub fn from_env() -> VaultResult<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| VaultError::auth_failed(format!("{name} is not set")))
        };
        Ok(Self::new(
            var("AZURE_TENANT_ID")?,
            var("AZURE_CLIENT_ID")?,
            var("AZURE_CLIENT_SECRET")?,
        ))
    }

    /// Override the authority host. Intended for tests and sovereign clouds.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, resource: &str) -> VaultResult<AccessToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        );
        let scope = format!("{}/.default", resource.trim_end_matches('/'));
        debug!(scope, "Requesting token via client credentials");

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| VaultError::auth_failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(VaultError::auth_failed(format!("Status {status}: {text}")));
        }

        let token: OauthTokenResponse = response
            .json()
            .await
            .map_err(|e| VaultError::auth_failed(e.to_string()))?;
        let expires_on = i64::try_from(token.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));

        Ok(AccessToken::new(token.access_token, expires_on))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresOn {
    Seconds(i64),
    Text(String),
}

#[derive(Deserialize)]
struct ManagedIdentityResponse {
    access_token: String,
    expires_on: Option<ExpiresOn>,
}

/// Token acquisition through the platform-managed identity endpoint.
///
/// Uses the `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` pair when the environment
/// provides one, otherwise the instance metadata service.
pub struct ManagedIdentityCredential {
    endpoint: String,
    identity_header: Option<String>,
    http: reqwest::Client,
}

impl ManagedIdentityCredential {
    /// Create a credential from the ambient environment.
    #[must_use]
    pub fn new() -> Self {
        match (
            std::env::var("IDENTITY_ENDPOINT"),
            std::env::var("IDENTITY_HEADER"),
        ) {
            (Ok(endpoint), Ok(header)) => Self {
                endpoint,
                identity_header: Some(header),
                http: reqwest::Client::new(),
            },
            _ => Self {
                endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
                identity_header: None,
                http: reqwest::Client::new(),
            },
        }
    }

    /// Override the token endpoint. Intended for tests.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for ManagedIdentityCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, resource: &str) -> VaultResult<AccessToken> {
        debug!(resource, "Requesting token via managed identity");

        let mut request = self.http.get(&self.endpoint).query(&[
            (
                "api-version",
                if self.identity_header.is_some() {
                    "2019-08-01"
                } else {
                    "2018-02-01"
                },
            ),
            ("resource", resource),
        ]);
        request = match &self.identity_header {
            Some(header) => request.header("X-IDENTITY-HEADER", header),
            None => request.header("Metadata", "true"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::auth_failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(VaultError::auth_failed(format!("Status {status}: {text}")));
        }

        let token: ManagedIdentityResponse = response
            .json()
            .await
            .map_err(|e| VaultError::auth_failed(e.to_string()))?;

        // expires_on is Unix seconds, as a number or a numeric string
        // depending on the endpoint generation.
        let expires_on = match token.expires_on {
            Some(ExpiresOn::Seconds(secs)) => DateTime::from_timestamp(secs, 0),
            Some(ExpiresOn::Text(text)) => text
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            None => None,
        };

        Ok(AccessToken::new(token.access_token, expires_on))
    }
}

/// Pick a credential from the ambient environment: client-secret when the
/// `AZURE_*` triple is present, managed identity otherwise.
#[must_use]
pub fn ambient_credential() -> std::sync::Arc<dyn TokenCredential> {
    match ClientSecretCredential::from_env() {
        Ok(credential) => std::sync::Arc::new(credential),
        Err(_) => std::sync::Arc::new(ManagedIdentityCredential::new()),
    }
}
