//! Change-event batch handler for deferred deletions
//!
//! Consumes one batch of record-store change events per invocation. Only a
//! REMOVE event — the store's expiry signal — is actionable; its prior row
//! image names the key to delete. When the provider-side delete fails, the
//! record is re-upserted with `delete_on` pushed forward from its prior
//! value, which makes the retry loop durable across process restarts.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::core::{ChangeEvent, DeletionRecord, EventKind, Result, StoreError};
use crate::encryption::Encryptor;
use crate::notify::{AccountContext, Mailer, Message};
use crate::traits::{DeletionStore, IdentityProvider};

/// Join-time summary of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Events in the batch
    pub processed: usize,
    /// Keys deleted from the provider
    pub deleted: usize,
    /// Records re-upserted for a later retry
    pub requeued: usize,
    /// Non-REMOVE events ignored
    pub skipped: usize,
    /// Events whose handling itself failed (e.g. the requeue write)
    pub failed: usize,
}

/// What one event's handling amounted to
enum Outcome {
    Deleted,
    Requeued,
    Skipped,
}

/// Deletes superseded keys when their records expire
pub struct DestructionHandler {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DeletionStore>,
    encryptor: Encryptor,
    mailer: Arc<dyn Mailer>,
    account: AccountContext,
    retry_after_mins: i64,
    pool_size: usize,
}

impl DestructionHandler {
    /// Wire a handler from its collaborators
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DeletionStore>,
        encryptor: Encryptor,
        mailer: Arc<dyn Mailer>,
        account: AccountContext,
        retry_after_mins: i64,
        pool_size: usize,
    ) -> Self {
        Self {
            provider,
            store,
            encryptor,
            mailer,
            account,
            retry_after_mins,
            pool_size: pool_size.max(1),
        }
    }

    /// Handle one batch of change events, each independently
    pub async fn handle_batch(&self, events: Vec<ChangeEvent>) -> SweepReport {
        let mut report = SweepReport {
            processed: events.len(),
            ..SweepReport::default()
        };

        let outcomes: Vec<Result<Outcome>> = stream::iter(events)
            .map(|event| self.handle_event(event))
            .buffer_unordered(self.pool_size)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(Outcome::Deleted) => report.deleted += 1,
                Ok(Outcome::Requeued) => report.requeued += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "Event handling failed");
                }
            }
        }

        report
    }

    /// Handle one event
    ///
    /// The provider delete and the encryption-key delete are independent
    /// attempts: the `encrypted` flag on a requeued record is lowered exactly
    /// when the key material went away on this attempt, so a later retry
    /// never re-attempts a deletion that already completed.
    async fn handle_event(&self, event: ChangeEvent) -> Result<Outcome> {
        match event.kind {
            EventKind::Insert | EventKind::Modify => {
                tracing::debug!(kind = ?event.kind, "Skipping non-removal event");
                return Ok(Outcome::Skipped);
            }
            EventKind::Remove => {}
        }

        let record = event.old_image.ok_or_else(|| StoreError::MalformedRecord {
            reason: "REMOVE event carried no prior image".to_string(),
        })?;

        let deleted = self
            .provider
            .delete_access_key(&record.identity, &record.access_key_id)
            .await;

        let mut key_material_deleted = false;
        if record.encrypted {
            match self.encryptor.delete_key(&record.identity).await {
                Ok(()) => key_material_deleted = true,
                Err(e) => {
                    tracing::warn!(
                        identity = %record.identity,
                        error = %e,
                        "Failed to delete encryption key material, will retry with the record"
                    );
                }
            }
        }

        match deleted {
            Ok(()) => {
                self.notify_deleted(&record).await;
                Ok(Outcome::Deleted)
            }
            Err(e) => {
                tracing::error!(
                    identity = %record.identity,
                    key_id = %record.access_key_id,
                    error = %e,
                    "Failed to delete access key, requeueing"
                );

                let requeued = record.requeued(self.retry_after_mins, key_material_deleted);
                self.store.upsert(&requeued).await?;

                tracing::info!(
                    identity = %record.identity,
                    key_id = %record.access_key_id,
                    delete_on = requeued.delete_on,
                    "Access key requeued for deletion"
                );
                Ok(Outcome::Requeued)
            }
        }
    }

    async fn notify_deleted(&self, record: &DeletionRecord) {
        let message = Message::key_deleted(
            &record.email,
            &record.identity,
            &self.account,
            &record.access_key_id,
        );
        if let Err(e) = self.mailer.send(&message).await {
            tracing::error!(
                identity = %record.identity,
                email = %record.email,
                error = %e,
                "Failed to send deletion notice"
            );
        }
    }
}
