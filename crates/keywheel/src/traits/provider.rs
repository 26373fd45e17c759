use async_trait::async_trait;

use crate::core::{AccessKey, NewAccessKey, ProviderError};

/// Identity-provider API surface consumed by the pipelines
///
/// The provider is the sole source of truth for which identities and keys
/// exist; nothing here is cached across calls.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// List every identity name, following pagination to the end
    async fn list_identities(&self) -> Result<Vec<String>, ProviderError>;

    /// Raw (key, value) tags attached to one identity
    async fn list_tags(&self, identity: &str) -> Result<Vec<(String, String)>, ProviderError>;

    /// Live access keys for one identity, with whole-day ages
    async fn list_access_keys(&self, identity: &str) -> Result<Vec<AccessKey>, ProviderError>;

    /// Create one new access key pair
    ///
    /// The provider rejects the call when the identity already holds the
    /// maximum of 2 live keys.
    async fn create_access_key(&self, identity: &str) -> Result<NewAccessKey, ProviderError>;

    /// Delete one access key by id
    async fn delete_access_key(&self, identity: &str, key_id: &str) -> Result<(), ProviderError>;

    /// Human-readable account alias, empty when none is set
    async fn account_alias(&self) -> Result<String, ProviderError>;

    /// Attach tags to one identity (used by the bulk-tagging helper)
    async fn tag_identity(
        &self,
        identity: &str,
        tags: &[(String, String)],
    ) -> Result<(), ProviderError>;
}
