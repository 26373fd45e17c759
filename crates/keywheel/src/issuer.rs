//! Per-identity issuance pipeline
//!
//! For every (identity, stale key) pair the planner selected: create the
//! replacement key, optionally encrypt the exposed pair, notify the owner,
//! and write the deferred-deletion record for the retiring key. Each pair is
//! an isolated unit of work fanned out over a bounded pool; the join
//! inspects every outcome so no failure is ever lost.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::core::{DeletionRecord, Identity, Result, RotationError, start_of_day_utc};
use crate::encryption::{Encryptor, secret_name};
use crate::notify::{AccountContext, Mailer, Message};
use crate::planner::RotationTask;
use crate::traits::{DeletionStore, IdentityProvider};

/// Join-time summary of one issuance run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IssueReport {
    /// Units of work attempted
    pub attempted: usize,
    /// Replacement keys issued and recorded
    pub issued: usize,
    /// Units that failed and were logged
    pub failed: usize,
}

/// Executes rotation for the identities the planner selected
pub struct CredentialIssuer {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DeletionStore>,
    mailer: Arc<dyn Mailer>,
    /// Present iff encrypt-on-issue is enabled
    encryptor: Option<Encryptor>,
    account: AccountContext,
    default_delete_after_days: i64,
    pool_size: usize,
}

impl CredentialIssuer {
    /// Wire an issuer from its collaborators
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DeletionStore>,
        mailer: Arc<dyn Mailer>,
        encryptor: Option<Encryptor>,
        account: AccountContext,
        default_delete_after_days: i64,
        pool_size: usize,
    ) -> Self {
        Self {
            provider,
            store,
            mailer,
            encryptor,
            account,
            default_delete_after_days,
            pool_size: pool_size.max(1),
        }
    }

    /// Run every rotation task to completion and inspect each outcome
    ///
    /// Provider, store, and transport failures are contained per identity.
    /// A secret-store failure escalates and fails the whole run: when key
    /// material cannot be persisted, carrying on risks exposing more
    /// unencrypted secrets for no benefit.
    pub async fn issue_all(&self, tasks: Vec<RotationTask>) -> Result<IssueReport> {
        let mut report = IssueReport {
            attempted: tasks.len(),
            ..IssueReport::default()
        };

        let outcomes: Vec<(String, String, Result<()>)> = stream::iter(tasks)
            .map(|task| {
                let identity = task.identity.name.clone();
                let key_id = task.stale_key.id.clone();
                async move {
                    let outcome = self.issue_one(&task.identity, &task.stale_key.id).await;
                    (identity, key_id, outcome)
                }
            })
            .buffer_unordered(self.pool_size)
            .collect()
            .await;

        let mut escalate: Option<RotationError> = None;
        for (identity, key_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.issued += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        identity = %identity,
                        retiring_key_id = %key_id,
                        error = %e,
                        "Issuance failed for identity"
                    );
                    if matches!(e, RotationError::SecretStore(_)) {
                        escalate = Some(e);
                    }
                }
            }
        }

        match escalate {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// One identity's issuance, steps 1-5
    async fn issue_one(&self, identity: &Identity, stale_key_id: &str) -> Result<()> {
        let Some(email) = identity.attributes.email.clone() else {
            tracing::warn!(identity = %identity.name, "Skipping issuance, identity has no email attribute");
            return Ok(());
        };

        let new_key = self.provider.create_access_key(&identity.name).await?;

        let grace_days = identity
            .attributes
            .delete_after_days
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(self.default_delete_after_days);

        let (access_key, secret_key, instruction, encrypted) = match &self.encryptor {
            Some(encryptor) => {
                // Fail-fast boundary: without a retrievable key there is no
                // safe way to hand the secret over.
                let cipher = encryptor.issue_key(&identity.name).await?;
                let access_key = cipher.encrypt(&new_key.id)?;
                let secret_key = cipher.encrypt(&new_key.secret)?;
                let instruction = format!(
                    "The key pair above is encrypted. Fetch the key from secret store entry \
                     {} and decrypt both values with the keywheel decrypt command. {}",
                    secret_name(&identity.name),
                    identity.attributes.instruction
                );
                (access_key, secret_key, instruction, true)
            }
            None => (
                new_key.id.clone(),
                new_key.secret.clone(),
                identity.attributes.instruction.clone(),
                false,
            ),
        };

        let message = Message::key_issued(
            &email,
            &identity.name,
            &self.account,
            &access_key,
            &secret_key,
            instruction.trim(),
            stale_key_id,
            grace_days,
        );
        if let Err(e) = self.mailer.send(&message).await {
            tracing::error!(
                identity = %identity.name,
                email = %email,
                error = %e,
                "Failed to send issuance notice"
            );
        }

        let record = DeletionRecord {
            identity: identity.name.clone(),
            access_key_id: stale_key_id.to_string(),
            email,
            delete_on: start_of_day_utc(Utc::now()) + grace_days * 86_400,
            encrypted,
        };
        self.store.upsert(&record).await?;

        tracing::info!(
            identity = %identity.name,
            new_key_id = %new_key.id,
            retiring_key_id = %stale_key_id,
            grace_days,
            "Issued replacement key and scheduled old key for deletion"
        );
        Ok(())
    }
}
