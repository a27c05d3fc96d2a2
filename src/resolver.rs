//! Active secret version resolution.
//!
//! Given a secret name, fetch its full version history, keep the versions
//! whose enabled flag and validity window make them currently valid, and
//! resolve each kept version's value in listing order.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::{
    error::{VaultError, VaultResult},
    models::{SecretValue, SecretVersionMetadata},
};

/// The two vault operations the resolver needs.
///
/// Implemented by [`crate::KeyVaultClient`]; tests substitute an in-memory
/// source. Also the seam for a capped parallel fetch, should one ever be
/// wanted; this crate keeps fetches sequential.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Full version history of the named secret, in vault listing order.
    /// A missing secret yields an empty list.
    async fn secret_versions(
        &self,
        vault_base_url: &str,
        name: &str,
    ) -> VaultResult<Vec<SecretVersionMetadata>>;

    /// The value of one specific version.
    async fn secret_version_value(
        &self,
        vault_base_url: &str,
        name: &str,
        version: &str,
    ) -> VaultResult<SecretValue>;
}

/// Resolves the currently active values of a secret.
///
/// Borrows its version source; the source's lifecycle belongs to the caller.
pub struct SecretVersionResolver<'a, S: VersionSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: VersionSource + ?Sized> SecretVersionResolver<'a, S> {
    /// Create a resolver over the given source.
    #[must_use]
    pub const fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Resolve the values of every currently active version of the named
    /// secret, in vault listing order.
    ///
    /// Activity is evaluated against a single timestamp captured once at the
    /// start of the call, so a version cannot flip between active and
    /// inactive mid-scan. A secret with no version history resolves to an
    /// empty list; in that case no value fetch is issued.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidArgument`] for an empty secret name. A failed
    /// per-version value fetch propagates immediately; there is no
    /// partial-results mode.
    #[instrument(skip(self, vault_base_url), fields(secret_name))]
    pub async fn resolve_active_values(
        &self,
        vault_base_url: &str,
        secret_name: &str,
    ) -> VaultResult<Vec<SecretValue>> {
        if secret_name.trim().is_empty() {
            return Err(VaultError::invalid_argument("secret name is empty"));
        }

        let now = Utc::now();
        let versions = self.source.secret_versions(vault_base_url, secret_name).await?;

        let mut values = Vec::new();
        for version in &versions {
            if !version.is_active_at(now) {
                continue;
            }
            let value = self
                .source
                .secret_version_value(vault_base_url, secret_name, &version.version)
                .await?;
            values.push(value);
        }

        debug!(
            secret_name,
            total = versions.len(),
            active = values.len(),
            "Resolved active secret versions"
        );
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SecretAttributes;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        versions: Vec<SecretVersionMetadata>,
        fetches: AtomicUsize,
        fail_version: Option<String>,
    }

    impl FakeSource {
        fn new(versions: Vec<SecretVersionMetadata>) -> Self {
            Self {
                versions,
                fetches: AtomicUsize::new(0),
                fail_version: None,
            }
        }

        fn failing_on(mut self, version: &str) -> Self {
            self.fail_version = Some(version.to_string());
            self
        }
    }

    #[async_trait]
    impl VersionSource for FakeSource {
        async fn secret_versions(
            &self,
            _vault_base_url: &str,
            _name: &str,
        ) -> VaultResult<Vec<SecretVersionMetadata>> {
            Ok(self.versions.clone())
        }

        async fn secret_version_value(
            &self,
            _vault_base_url: &str,
            name: &str,
            version: &str,
        ) -> VaultResult<SecretValue> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_version.as_deref() == Some(version) {
                return Err(VaultError::unavailable("injected failure"));
            }
            Ok(SecretValue::new(format!("{name}/{version}")))
        }
    }

    fn version(
        version: &str,
        enabled: Option<bool>,
        not_before: Option<DateTime<Utc>>,
        expires: Option<DateTime<Utc>>,
    ) -> SecretVersionMetadata {
        SecretVersionMetadata {
            name: "db-password".to_string(),
            version: version.to_string(),
            attributes: SecretAttributes {
                enabled,
                not_before,
                expires,
                created: None,
                updated: None,
            },
        }
    }

    #[tokio::test]
    async fn test_only_active_versions_resolved() {
        let now = Utc::now();
        let yesterday = now - TimeDelta::days(1);
        let tomorrow = now + TimeDelta::days(1);

        let source = FakeSource::new(vec![
            version("v1", None, None, None),
            version("v2", Some(false), None, None),
            version("v3", None, None, Some(yesterday)),
            version("v4", None, Some(tomorrow), None),
        ]);

        let resolver = SecretVersionResolver::new(&source);
        let values = resolver
            .resolve_active_values("https://vault.example.net", "db-password")
            .await
            .unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].expose_secret(), "db-password/v1");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_history_is_success_without_fetches() {
        let source = FakeSource::new(Vec::new());
        let resolver = SecretVersionResolver::new(&source);

        let values = resolver
            .resolve_active_values("https://vault.example.net", "db-password")
            .await
            .unwrap();

        assert!(values.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listing_order_preserved() {
        let source = FakeSource::new(vec![
            version("v3", None, None, None),
            version("v1", None, None, None),
            version("v2", None, None, None),
        ]);
        let resolver = SecretVersionResolver::new(&source);

        let values = resolver
            .resolve_active_values("https://vault.example.net", "db-password")
            .await
            .unwrap();

        let resolved: Vec<&str> = values.iter().map(SecretValue::expose_secret).collect();
        assert_eq!(
            resolved,
            vec!["db-password/v3", "db-password/v1", "db-password/v2"]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let source = FakeSource::new(vec![
            version("v1", None, None, None),
            version("v2", None, None, None),
        ])
        .failing_on("v2");
        let resolver = SecretVersionResolver::new(&source);

        let err = resolver
            .resolve_active_values("https://vault.example.net", "db-password")
            .await
            .unwrap_err();

        assert!(matches!(err, VaultError::Unavailable(_)));
        // v1 was fetched before the failure, nothing was returned.
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let source = FakeSource::new(Vec::new());
        let resolver = SecretVersionResolver::new(&source);

        let err = resolver
            .resolve_active_values("https://vault.example.net", "")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidArgument(_)));
    }
}
