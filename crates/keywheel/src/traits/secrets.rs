use async_trait::async_trait;

use crate::core::SecretStoreError;

/// Named-secret store with overwrite-on-put semantics
///
/// Holds per-identity encryption keys and transport credentials (webhook API
/// key, SMTP password).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store a secret, replacing any existing value under the same name
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError>;

    /// Read a secret by name
    async fn get(&self, name: &str) -> Result<String, SecretStoreError>;

    /// Delete a secret by name
    async fn delete(&self, name: &str) -> Result<(), SecretStoreError>;
}
