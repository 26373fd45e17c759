use async_trait::async_trait;

use crate::core::{DeletionRecord, StoreError};

/// Durable record store for deferred deletions
///
/// Writes are overwrite-upserts keyed by `(identity, access_key_id)`, which
/// is what makes redundant retries idempotent at the storage layer. The
/// store's own expiry mechanism turns an elapsed `delete_on` into the REMOVE
/// event the destructor consumes; that trigger lives outside this trait.
#[async_trait]
pub trait DeletionStore: Send + Sync {
    /// Write or replace the record for the record's key pair
    async fn upsert(&self, record: &DeletionRecord) -> Result<(), StoreError>;
}
