//! Identity discovery
//!
//! Lists every identity from the provider, then fans out per-identity tag
//! fetches and per-identity key fetches across a bounded pool. Each stage is
//! joined to completion before the next starts; there is no streaming
//! consumption. Identities that never opted in (no email tag) are dropped
//! here, so downstream components only ever see enrolled identities.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::core::{Identity, IdentityAttributes, ProviderError};
use crate::traits::IdentityProvider;

/// Bounded-fan-out identity discovery
pub struct IdentityScan {
    provider: Arc<dyn IdentityProvider>,
    pool_size: usize,
}

impl IdentityScan {
    /// Create a scan with the given worker-pool width
    pub fn new(provider: Arc<dyn IdentityProvider>, pool_size: usize) -> Self {
        Self {
            provider,
            pool_size: pool_size.max(1),
        }
    }

    /// Discover enrolled identities with their attributes and live keys
    ///
    /// A failure listing identities aborts the scan; a failure fetching one
    /// identity's tags or keys drops only that identity.
    pub async fn run(&self) -> Result<Vec<Identity>, ProviderError> {
        let names = self.provider.list_identities().await?;
        tracing::info!(count = names.len(), "Fetching tags for identities");

        let enrolled: Vec<(String, IdentityAttributes)> = stream::iter(names)
            .map(|name| {
                let provider = Arc::clone(&self.provider);
                async move {
                    match provider.list_tags(&name).await {
                        Ok(tags) => Some((name, IdentityAttributes::from_tags(tags))),
                        Err(e) => {
                            tracing::warn!(identity = %name, error = %e, "Dropping identity, tag fetch failed");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.pool_size)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .filter(|(name, attrs)| {
                if attrs.is_enrolled() {
                    true
                } else {
                    tracing::debug!(identity = %name, "Skipping identity without email tag");
                    false
                }
            })
            .collect();

        tracing::info!(count = enrolled.len(), "Fetching keys for enrolled identities");

        let identities: Vec<Identity> = stream::iter(enrolled)
            .map(|(name, attributes)| {
                let provider = Arc::clone(&self.provider);
                async move {
                    match provider.list_access_keys(&name).await {
                        Ok(keys) => Some(Identity {
                            name,
                            attributes,
                            keys,
                        }),
                        Err(e) => {
                            tracing::warn!(identity = %name, error = %e, "Dropping identity, key fetch failed");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.pool_size)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockIdentityProvider;

    #[tokio::test]
    async fn unenrolled_identities_are_dropped() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.add_identity("alice", &[("keywheel:email", "alice@example.com")], &[]);
        provider.add_identity("svc-robot", &[("team", "platform")], &[]);

        let scan = IdentityScan::new(provider, 4);
        let identities = scan.run().await.unwrap();

        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].name, "alice");
    }

    #[tokio::test]
    async fn tag_fetch_failure_drops_only_that_identity() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.add_identity("alice", &[("keywheel:email", "alice@example.com")], &[]);
        provider.add_identity("bob", &[("keywheel:email", "bob@example.com")], &[]);
        provider.fail_tags_for("bob");

        let scan = IdentityScan::new(provider, 4);
        let identities = scan.run().await.unwrap();

        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].name, "alice");
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_scan() {
        let provider = Arc::new(MockIdentityProvider::new());
        provider.fail_next_list();

        let scan = IdentityScan::new(provider, 4);
        assert!(scan.run().await.is_err());
    }
}
