//! Async Key Vault client with active secret version resolution.
//!
//! Wraps a Key Vault-style REST API behind a typed client: single fetches
//! for secrets, keys, and certificates, full version listings, and a
//! resolver that returns the values of every currently valid version of a
//! secret. Authentication goes through an injected [`TokenCredential`];
//! resolved values and tokens are wrapped so they never leak into `Debug`
//! output or logs.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod models;
pub mod resolver;

pub use client::KeyVaultClient;
pub use config::VaultConfig;
pub use credential::{
    AccessToken, ClientSecretCredential, ManagedIdentityCredential, StaticTokenCredential,
    TokenCredential, ambient_credential,
};
pub use error::{VaultError, VaultResult};
pub use models::{
    CertificateBundle, KeyBundle, SecretAttributes, SecretBundle, SecretValue,
    SecretVersionMetadata,
};
pub use resolver::{SecretVersionResolver, VersionSource};
