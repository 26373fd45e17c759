//! DynamoDB deletion-record store
//!
//! Records live in one table keyed by `(identity, access_key_id)`. The table
//! is expected to have TTL enabled on `delete_on` with a stream feeding the
//! sweep phase; this store only ever overwrite-upserts, which is what makes
//! redundant retries idempotent.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::core::{DeletionRecord, StoreError};
use crate::traits::DeletionStore;

/// Record store backed by one DynamoDB table
#[derive(Debug, Clone)]
pub struct DynamoDeletionStore {
    client: DynamoClient,
    table: String,
}

impl DynamoDeletionStore {
    /// Create a store over the shared SDK config
    pub fn new(aws: &aws_config::SdkConfig, table: String) -> Self {
        Self {
            client: DynamoClient::new(aws),
            table,
        }
    }
}

/// Attribute layout for one record
///
/// `delete_on` is numeric so the TTL machinery can read it; `encrypted` keeps
/// the store-level `Y`/`N` contract.
fn to_item(record: &DeletionRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            "identity".to_string(),
            AttributeValue::S(record.identity.clone()),
        ),
        (
            "access_key_id".to_string(),
            AttributeValue::S(record.access_key_id.clone()),
        ),
        ("email".to_string(), AttributeValue::S(record.email.clone())),
        (
            "delete_on".to_string(),
            AttributeValue::N(record.delete_on.to_string()),
        ),
        (
            "encrypted".to_string(),
            AttributeValue::S(if record.encrypted { "Y" } else { "N" }.to_string()),
        ),
    ])
}

#[async_trait]
impl DeletionStore for DynamoDeletionStore {
    #[tracing::instrument(
        skip(self, record),
        fields(store = "dynamodb", identity = %record.identity, key_id = %record.access_key_id)
    )]
    async fn upsert(&self, record: &DeletionRecord) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| StoreError::WriteFailure {
                key_id: record.access_key_id.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::info!(
            identity = %record.identity,
            key_id = %record.access_key_id,
            delete_on = record.delete_on,
            "Deletion record upserted"
        );
        Ok(())
    }
}
