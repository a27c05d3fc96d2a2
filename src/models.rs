//! Key Vault wire types and the active-version predicate.
//!
//! Attribute timestamps (`nbf`, `exp`, `created`, `updated`) are Unix seconds
//! on the wire, deserialized into `chrono` UTC timestamps.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{VaultError, VaultResult};

/// Validity attributes attached to a secret, key, or certificate version.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretAttributes {
    /// Whether the version is enabled; unset means enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Start of the validity window
    #[serde(
        rename = "nbf",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,

    /// End of the validity window
    #[serde(
        rename = "exp",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires: Option<DateTime<Utc>>,

    /// Creation time, informational
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,

    /// Last update time, informational
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,
}

impl SecretAttributes {
    /// Check whether a version with these attributes is active at `now`.
    ///
    /// A version is active iff `enabled` is unset or true, `not_before` is
    /// unset or strictly before `now`, and `expires` is unset or strictly
    /// after `now`. The boundaries are exclusive: a version expiring exactly
    /// at `now` is already inactive, one becoming valid exactly at `now` is
    /// not yet active.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled.unwrap_or(true)
            && self.not_before.is_none_or(|nbf| nbf < now)
            && self.expires.is_none_or(|exp| exp > now)
    }
}

/// One entry of a secret's version listing, as returned by the vault.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretItem {
    /// Full identifier URL, `{vault}/secrets/{name}/{version}`
    pub id: String,
    /// Validity attributes
    #[serde(default)]
    pub attributes: SecretAttributes,
    /// Content type hint, if the vault stores one
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
}

/// A page of a secret version listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretListResponse {
    /// Entries in vault listing order
    #[serde(default)]
    pub value: Vec<SecretItem>,
    /// Absolute URL of the next page, if any
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

/// Identifying and validity information about one secret version.
///
/// Metadata only; the version's value is fetched separately.
#[derive(Debug, Clone)]
pub struct SecretVersionMetadata {
    /// Secret name
    pub name: String,
    /// Version string, unique within the secret
    pub version: String,
    /// Validity attributes
    pub attributes: SecretAttributes,
}

impl SecretVersionMetadata {
    /// Build metadata from a listing entry, extracting name and version from
    /// the entry's identifier URL.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unavailable`] if the identifier is not a
    /// well-formed `.../secrets/{name}/{version}` URL; a vault that emits
    /// such identifiers is misbehaving.
    pub fn from_item(item: SecretItem) -> VaultResult<Self> {
        let url = Url::parse(&item.id)
            .map_err(|e| VaultError::unavailable(format!("malformed secret id {}: {e}", item.id)))?;
        let mut segments: Vec<&str> = url
            .path_segments()
            .map(Iterator::collect)
            .unwrap_or_default();
        segments.retain(|s| !s.is_empty());

        match segments.as_slice() {
            [.., "secrets", name, version] => Ok(Self {
                name: (*name).to_string(),
                version: (*version).to_string(),
                attributes: item.attributes,
            }),
            _ => Err(VaultError::unavailable(format!(
                "malformed secret id {}: expected .../secrets/{{name}}/{{version}}",
                item.id
            ))),
        }
    }

    /// Check whether this version is active at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.attributes.is_active_at(now)
    }
}

/// A secret with its value, as returned by a single-secret fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretBundle {
    /// Full identifier URL of the fetched version
    pub id: String,
    /// The secret value
    pub value: String,
    /// Validity attributes
    #[serde(default)]
    pub attributes: SecretAttributes,
    /// Content type hint, if the vault stores one
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
}

/// The resolved value of one active secret version.
///
/// The value is held in a [`SecretString`] and never appears in `Debug`
/// output. Owned by the caller once returned.
#[derive(Clone)]
pub struct SecretValue {
    value: SecretString,
}

impl SecretValue {
    /// Wrap a resolved secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::from(value.into()),
        }
    }

    /// Access the underlying secret. Use immediately, avoid storing.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.value.expose_secret()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl From<SecretBundle> for SecretValue {
    fn from(bundle: SecretBundle) -> Self {
        Self::new(bundle.value)
    }
}

/// A JSON Web Key as stored by the vault.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKey {
    /// Key identifier URL
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type ("RSA", "EC", ...)
    pub kty: String,
    /// Permitted operations
    #[serde(rename = "key_ops", default)]
    pub key_ops: Vec<String>,
    /// RSA modulus, base64url
    #[serde(default)]
    pub n: Option<String>,
    /// RSA public exponent, base64url
    #[serde(default)]
    pub e: Option<String>,
    /// Elliptic curve name
    #[serde(default)]
    pub crv: Option<String>,
    /// EC x coordinate, base64url
    #[serde(default)]
    pub x: Option<String>,
    /// EC y coordinate, base64url
    #[serde(default)]
    pub y: Option<String>,
}

/// Public key material returned by a key fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBundle {
    /// The public key
    pub key: JsonWebKey,
    /// Validity attributes
    #[serde(default)]
    pub attributes: SecretAttributes,
}

/// A certificate as returned by the vault, with the DER payload still
/// base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateBundle {
    /// Full identifier URL
    pub id: String,
    /// Base64-encoded DER certificate
    pub cer: String,
    /// Validity attributes
    #[serde(default)]
    pub attributes: SecretAttributes,
}

impl CertificateBundle {
    /// Decode the certificate payload to raw DER bytes.
    ///
    /// X.509 parsing is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidCertificate`] if the payload is not valid
    /// base64.
    pub fn decoded_der(&self) -> VaultResult<Vec<u8>> {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD
            .decode(&self.cer)
            .map_err(|e| VaultError::InvalidCertificate(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn attrs(
        enabled: Option<bool>,
        not_before: Option<DateTime<Utc>>,
        expires: Option<DateTime<Utc>>,
    ) -> SecretAttributes {
        SecretAttributes {
            enabled,
            not_before,
            expires,
            created: None,
            updated: None,
        }
    }

    #[test]
    fn test_unset_attributes_are_active() {
        let now = Utc::now();
        assert!(attrs(None, None, None).is_active_at(now));
    }

    #[test]
    fn test_disabled_excluded_regardless_of_window() {
        let now = Utc::now();
        let wide_open = attrs(
            Some(false),
            Some(now - TimeDelta::days(1)),
            Some(now + TimeDelta::days(1)),
        );
        assert!(!wide_open.is_active_at(now));
        assert!(!attrs(Some(false), None, None).is_active_at(now));
    }

    #[test]
    fn test_future_not_before_excluded() {
        let now = Utc::now();
        assert!(!attrs(None, Some(now + TimeDelta::days(1)), None).is_active_at(now));
        assert!(attrs(None, Some(now - TimeDelta::days(1)), None).is_active_at(now));
    }

    #[test]
    fn test_boundaries_are_strict() {
        let now = Utc::now();
        // exp == now is already expired, nbf == now is not yet valid
        assert!(!attrs(None, None, Some(now)).is_active_at(now));
        assert!(!attrs(None, Some(now), None).is_active_at(now));
        assert!(attrs(None, None, Some(now + TimeDelta::seconds(1))).is_active_at(now));
    }

    #[test]
    fn test_expired_excluded() {
        let now = Utc::now();
        assert!(!attrs(None, None, Some(now - TimeDelta::days(1))).is_active_at(now));
    }

    #[test]
    fn test_metadata_from_item() {
        let item = SecretItem {
            id: "https://vault.example.net/secrets/db-password/abc123".to_string(),
            attributes: SecretAttributes::default(),
            content_type: None,
        };
        let meta = SecretVersionMetadata::from_item(item).unwrap();
        assert_eq!(meta.name, "db-password");
        assert_eq!(meta.version, "abc123");
    }

    #[test]
    fn test_metadata_from_malformed_item() {
        let item = SecretItem {
            id: "https://vault.example.net/secrets/db-password".to_string(),
            attributes: SecretAttributes::default(),
            content_type: None,
        };
        assert!(SecretVersionMetadata::from_item(item).is_err());

        let item = SecretItem {
            id: "not a url".to_string(),
            attributes: SecretAttributes::default(),
            content_type: None,
        };
        assert!(SecretVersionMetadata::from_item(item).is_err());
    }

    #[test]
    fn test_attributes_deserialize_unix_seconds() {
        let json = r#"{"enabled":true,"nbf":1700000000,"exp":1800000000}"#;
        let attrs: SecretAttributes = serde_json::from_str(json).unwrap();
        assert_eq!(attrs.enabled, Some(true));
        assert_eq!(attrs.not_before.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(attrs.expires.unwrap().timestamp(), 1_800_000_000);
        assert!(attrs.created.is_none());
    }

    #[test]
    fn test_secret_value_debug_redacted() {
        let value = SecretValue::new("hunter2");
        let debug = format!("{value:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(value.expose_secret(), "hunter2");
    }

    #[test]
    fn test_certificate_decode() {
        let bundle = CertificateBundle {
            id: "https://vault.example.net/certificates/tls/v1".to_string(),
            cer: "MIIBCg==".to_string(),
            attributes: SecretAttributes::default(),
        };
        assert_eq!(bundle.decoded_der().unwrap(), vec![0x30, 0x82, 0x01, 0x0a]);

        let bad = CertificateBundle {
            cer: "not base64!!!".to_string(),
            ..bundle
        };
        assert!(matches!(
            bad.decoded_der(),
            Err(VaultError::InvalidCertificate(_))
        ));
    }
}
