//! Key Vault HTTP client with token caching and logging integration.

use crate::{
    config::VaultConfig,
    credential::{AccessToken, TokenCredential},
    error::{VaultError, VaultResult},
    models::{
        CertificateBundle, KeyBundle, SecretBundle, SecretListResponse, SecretValue,
        SecretVersionMetadata,
    },
    resolver::VersionSource,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Asynchronous Key Vault client.
///
/// Holds one HTTP connection pool and one injected credential provider for
/// its whole lifetime; bearer tokens are cached per vault resource and
/// re-acquired shortly before expiry. The vault base URL is supplied per
/// call, so a single client can serve several vaults.
pub struct KeyVaultClient {
    config: VaultConfig,
    http: Client,
    credential: Arc<dyn TokenCredential>,
    cached_token: RwLock<Option<(String, AccessToken)>>,
}

impl KeyVaultClient {
    /// Create a new client with the given configuration and credential.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Http`] if the underlying HTTP client cannot be
    /// built.
    pub fn new(config: VaultConfig, credential: Arc<dyn TokenCredential>) -> VaultResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(VaultError::Http)?;

        Ok(Self {
            config,
            http,
            credential,
            cached_token: RwLock::new(None),
        })
    }

    /// Retrieve the current version of the named secret.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if the secret does not exist, plus the usual
    /// transport and authentication failures.
    #[instrument(skip(self, vault_base_url), fields(name))]
    pub async fn get_secret(&self, vault_base_url: &str, name: &str) -> VaultResult<SecretBundle> {
        let base = validated_base(vault_base_url)?;
        validate_name(name, "secret name")?;
        debug!(name, "Getting secret");

        self.get_json(&format!("{base}/secrets/{name}"), "secret", name)
            .await
    }

    /// Retrieve a specific version of the named secret.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if the secret or version does not exist.
    #[instrument(skip(self, vault_base_url), fields(name, version))]
    pub async fn get_secret_version(
        &self,
        vault_base_url: &str,
        name: &str,
        version: &str,
    ) -> VaultResult<SecretBundle> {
        let base = validated_base(vault_base_url)?;
        validate_name(name, "secret name")?;
        validate_name(version, "secret version")?;

        self.get_json(&format!("{base}/secrets/{name}/{version}"), "secret", name)
            .await
    }

    /// Retrieve the value of the current version of the named secret.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if the secret does not exist; absence is
    /// never reported as an empty value.
    pub async fn get_secret_value(
        &self,
        vault_base_url: &str,
        name: &str,
    ) -> VaultResult<SecretValue> {
        let bundle = self.get_secret(vault_base_url, name).await?;
        Ok(SecretValue::from(bundle))
    }

    /// List every version of the named secret, in vault listing order.
    ///
    /// A secret with no version history is not a failure: when the vault
    /// reports the secret as missing, the result is an empty list. Follows
    /// pagination links to exhaustion.
    ///
    /// # Errors
    ///
    /// Transport and authentication failures only.
    #[instrument(skip(self, vault_base_url), fields(name))]
    pub async fn list_secret_versions(
        &self,
        vault_base_url: &str,
        name: &str,
    ) -> VaultResult<Vec<SecretVersionMetadata>> {
        let base = validated_base(vault_base_url)?;
        validate_name(name, "secret name")?;

        let mut versions = Vec::new();
        let mut next = Some(format!("{base}/secrets/{name}/versions"));
        let mut first_page = true;

        while let Some(url) = next {
            let page: SecretListResponse = match self.get_json(&url, "secret", name).await {
                Ok(page) => page,
                Err(VaultError::NotFound { .. }) if first_page => {
                    debug!(name, "Secret has no version history");
                    return Ok(Vec::new());
                }
                Err(VaultError::NotFound { .. }) => {
                    // Secret deleted mid-listing; keep the pages already read.
                    warn!(name, collected = versions.len(), "Secret vanished during listing");
                    break;
                }
                Err(e) => return Err(e),
            };
            first_page = false;

            for item in page.value {
                versions.push(SecretVersionMetadata::from_item(item)?);
            }
            next = page.next_link;
        }

        debug!(name, count = versions.len(), "Listed secret versions");
        Ok(versions)
    }

    /// Retrieve the public material of the named key.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if the key does not exist.
    #[instrument(skip(self, vault_base_url), fields(name))]
    pub async fn get_key(&self, vault_base_url: &str, name: &str) -> VaultResult<KeyBundle> {
        let base = validated_base(vault_base_url)?;
        validate_name(name, "key name")?;
        debug!(name, "Getting key");

        self.get_json(&format!("{base}/keys/{name}"), "key", name)
            .await
    }

    /// Retrieve the named certificate as raw DER bytes.
    ///
    /// X.509 parsing is left to the caller.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if the certificate does not exist,
    /// [`VaultError::InvalidCertificate`] if its payload does not decode.
    #[instrument(skip(self, vault_base_url), fields(name))]
    pub async fn get_certificate(
        &self,
        vault_base_url: &str,
        name: &str,
    ) -> VaultResult<Vec<u8>> {
        let base = validated_base(vault_base_url)?;
        validate_name(name, "certificate name")?;
        debug!(name, "Getting certificate");

        let bundle: CertificateBundle = self
            .get_json(&format!("{base}/certificates/{name}"), "certificate", name)
            .await?;
        bundle.decoded_der()
    }

    /// Acquire a fresh access token for the vault, bypassing the cache.
    ///
    /// # Errors
    ///
    /// [`VaultError::AuthenticationFailed`] if the credential provider
    /// cannot supply a token.
    pub async fn get_access_token(&self, vault_base_url: &str) -> VaultResult<AccessToken> {
        let resource = resource_of(vault_base_url)?;
        self.credential.get_token(&resource).await
    }

    async fn bearer_token(&self, resource: &str) -> VaultResult<AccessToken> {
        {
            let cached = self.cached_token.read().await;
            if let Some((cached_resource, token)) = cached.as_ref() {
                if cached_resource == resource
                    && !token.expires_within(self.config.token_grace_period)
                {
                    return Ok(token.clone());
                }
            }
        }

        let token = self.credential.get_token(resource).await?;
        info!(resource, "Acquired vault access token");
        *self.cached_token.write().await = Some((resource.to_string(), token.clone()));
        Ok(token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        kind: &'static str,
        name: &str,
    ) -> VaultResult<T> {
        let resource = resource_of(url)?;
        let token = self.bearer_token(&resource).await?;

        let mut request = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret());
        // Pagination links already carry the full query string.
        if !url.contains("api-version=") {
            request = request.query(&[("api-version", self.config.api_version.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            404 => return Err(VaultError::not_found(kind, name)),
            401 | 403 => {
                warn!(%status, kind, name, "Vault refused the request");
                return Err(VaultError::Forbidden(format!("{kind} {name}")));
            }
            429 => return Err(VaultError::RateLimited),
            _ if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(VaultError::unavailable(format!("Status {status}: {text}")));
            }
            _ => {}
        }

        response.json().await.map_err(VaultError::from)
    }
}

#[async_trait]
impl VersionSource for KeyVaultClient {
    async fn secret_versions(
        &self,
        vault_base_url: &str,
        name: &str,
    ) -> VaultResult<Vec<SecretVersionMetadata>> {
        self.list_secret_versions(vault_base_url, name).await
    }

    async fn secret_version_value(
        &self,
        vault_base_url: &str,
        name: &str,
        version: &str,
    ) -> VaultResult<SecretValue> {
        let bundle = self
            .get_secret_version(vault_base_url, name, version)
            .await?;
        Ok(SecretValue::from(bundle))
    }
}

fn validate_name(value: &str, what: &str) -> VaultResult<()> {
    if value.trim().is_empty() {
        return Err(VaultError::invalid_argument(format!("{what} is empty")));
    }
    Ok(())
}

fn validated_base(vault_base_url: &str) -> VaultResult<String> {
    if vault_base_url.trim().is_empty() {
        return Err(VaultError::invalid_argument("vault base URL is empty"));
    }
    Url::parse(vault_base_url)
        .map_err(|e| VaultError::invalid_argument(format!("vault base URL: {e}")))?;
    Ok(vault_base_url.trim_end_matches('/').to_string())
}

/// The token resource for a vault URL: its scheme and host.
fn resource_of(url: &str) -> VaultResult<String> {
    let parsed =
        Url::parse(url).map_err(|e| VaultError::invalid_argument(format!("vault URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| VaultError::invalid_argument("vault URL has no host"))?;
    match parsed.port() {
        Some(port) => Ok(format!("{}://{host}:{port}", parsed.scheme())),
        None => Ok(format!("{}://{host}", parsed.scheme())),
    }
}
