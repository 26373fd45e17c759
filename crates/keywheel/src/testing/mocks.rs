use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;

use crate::core::{
    AccessKey, DeletionRecord, NewAccessKey, ProviderError, SecretStoreError, StoreError,
    TransportError,
};
use crate::notify::{Mailer, Message};
use crate::traits::{DeletionStore, IdentityProvider, SecretStore};

/// Mock identity provider with configurable failures
///
/// Seed identities with [`add_identity`](Self::add_identity); every mutating
/// call is counted so tests can assert exactly how often the provider was
/// touched.
#[derive(Default)]
pub struct MockIdentityProvider {
    identities: DashMap<String, (Vec<(String, String)>, Vec<AccessKey>)>,
    fail_list: AtomicBool,
    fail_tags: DashSet<String>,
    fail_create: DashSet<String>,
    fail_delete: DashSet<String>,
    create_count: AtomicU32,
    delete_count: AtomicU32,
    created_for: DashMap<String, u32>,
    deleted_keys: DashSet<String>,
    alias: Mutex<String>,
}

impl MockIdentityProvider {
    /// Create an empty mock provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one identity with tags and live keys `(id, age_days)`
    pub fn add_identity(&self, name: &str, tags: &[(&str, &str)], keys: &[(&str, i64)]) {
        self.identities.insert(
            name.to_string(),
            (
                tags.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                keys.iter()
                    .map(|(id, age_days)| AccessKey {
                        id: (*id).to_string(),
                        age_days: *age_days,
                    })
                    .collect(),
            ),
        );
    }

    /// Make the next identity listing fail
    pub fn fail_next_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    /// Make tag fetches for one identity fail
    pub fn fail_tags_for(&self, identity: &str) {
        self.fail_tags.insert(identity.to_string());
    }

    /// Make key creation for one identity fail
    pub fn fail_create_for(&self, identity: &str) {
        self.fail_create.insert(identity.to_string());
    }

    /// Make deletion of one key id fail
    pub fn fail_delete_for(&self, key_id: &str) {
        self.fail_delete.insert(key_id.to_string());
    }

    /// Stop failing deletion of one key id
    pub fn heal_delete_for(&self, key_id: &str) {
        self.fail_delete.remove(key_id);
    }

    /// Set the account alias reported by the provider
    pub async fn set_alias(&self, alias: &str) {
        *self.alias.lock().await = alias.to_string();
    }

    /// Total create calls
    pub fn create_calls(&self) -> u32 {
        self.create_count.load(Ordering::SeqCst)
    }

    /// Create calls for one identity
    pub fn create_calls_for(&self, identity: &str) -> u32 {
        self.created_for.get(identity).map_or(0, |c| *c)
    }

    /// Total delete calls
    pub fn delete_calls(&self) -> u32 {
        self.delete_count.load(Ordering::SeqCst)
    }

    /// Whether one key id was deleted
    pub fn was_deleted(&self, key_id: &str) -> bool {
        self.deleted_keys.contains(key_id)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn list_identities(&self) -> Result<Vec<String>, ProviderError> {
        if self.fail_list.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Api {
                action: "ListUsers".to_string(),
                message: "mock failure".to_string(),
            });
        }
        Ok(self.identities.iter().map(|e| e.key().clone()).collect())
    }

    async fn list_tags(&self, identity: &str) -> Result<Vec<(String, String)>, ProviderError> {
        if self.fail_tags.contains(identity) {
            return Err(ProviderError::Api {
                action: "ListUserTags".to_string(),
                message: "mock failure".to_string(),
            });
        }
        self.identities
            .get(identity)
            .map(|e| e.0.clone())
            .ok_or_else(|| ProviderError::NotFound {
                entity: identity.to_string(),
            })
    }

    async fn list_access_keys(&self, identity: &str) -> Result<Vec<AccessKey>, ProviderError> {
        self.identities
            .get(identity)
            .map(|e| e.1.clone())
            .ok_or_else(|| ProviderError::NotFound {
                entity: identity.to_string(),
            })
    }

    async fn create_access_key(&self, identity: &str) -> Result<NewAccessKey, ProviderError> {
        if self.fail_create.contains(identity) {
            return Err(ProviderError::Api {
                action: "CreateAccessKey".to_string(),
                message: "mock failure".to_string(),
            });
        }

        let mut entry =
            self.identities
                .get_mut(identity)
                .ok_or_else(|| ProviderError::NotFound {
                    entity: identity.to_string(),
                })?;
        if entry.1.len() >= 2 {
            return Err(ProviderError::KeyQuotaExceeded {
                identity: identity.to_string(),
            });
        }

        let n = self.create_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.created_for.entry(identity.to_string()).or_insert(0) += 1;

        let key = NewAccessKey {
            id: format!("AKIANEW{n:04}"),
            secret: format!("secret-{n:04}"),
        };
        entry.1.push(AccessKey {
            id: key.id.clone(),
            age_days: 0,
        });
        Ok(key)
    }

    async fn delete_access_key(&self, identity: &str, key_id: &str) -> Result<(), ProviderError> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_delete.contains(key_id) {
            return Err(ProviderError::Api {
                action: "DeleteAccessKey".to_string(),
                message: "mock failure".to_string(),
            });
        }

        let mut entry =
            self.identities
                .get_mut(identity)
                .ok_or_else(|| ProviderError::NotFound {
                    entity: identity.to_string(),
                })?;
        let before = entry.1.len();
        entry.1.retain(|k| k.id != key_id);
        if entry.1.len() == before {
            return Err(ProviderError::NotFound {
                entity: key_id.to_string(),
            });
        }

        self.deleted_keys.insert(key_id.to_string());
        Ok(())
    }

    async fn account_alias(&self) -> Result<String, ProviderError> {
        Ok(self.alias.lock().await.clone())
    }

    async fn tag_identity(
        &self,
        identity: &str,
        tags: &[(String, String)],
    ) -> Result<(), ProviderError> {
        let mut entry =
            self.identities
                .get_mut(identity)
                .ok_or_else(|| ProviderError::NotFound {
                    entity: identity.to_string(),
                })?;
        entry.0.extend(tags.iter().cloned());
        Ok(())
    }
}

/// Mock deletion store recording every upsert in order
#[derive(Default)]
pub struct MockDeletionStore {
    records: DashMap<(String, String), DeletionRecord>,
    history: Mutex<Vec<DeletionRecord>>,
    fail_upsert: AtomicBool,
    upsert_count: AtomicU32,
}

impl MockDeletionStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upsert fail
    pub fn fail_next_upsert(&self) {
        self.fail_upsert.store(true, Ordering::SeqCst);
    }

    /// Number of upserts
    pub fn upsert_count(&self) -> u32 {
        self.upsert_count.load(Ordering::SeqCst)
    }

    /// Current record for a key pair
    pub fn record(&self, identity: &str, key_id: &str) -> Option<DeletionRecord> {
        self.records
            .get(&(identity.to_string(), key_id.to_string()))
            .map(|e| e.clone())
    }

    /// All records currently present
    pub fn records(&self) -> Vec<DeletionRecord> {
        self.records.iter().map(|e| e.value().clone()).collect()
    }

    /// Every upsert in arrival order
    pub async fn history(&self) -> Vec<DeletionRecord> {
        self.history.lock().await.clone()
    }
}

#[async_trait]
impl DeletionStore for MockDeletionStore {
    async fn upsert(&self, record: &DeletionRecord) -> Result<(), StoreError> {
        self.upsert_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_upsert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::WriteFailure {
                key_id: record.access_key_id.clone(),
                message: "mock failure".to_string(),
            });
        }

        self.records.insert(
            (record.identity.clone(), record.access_key_id.clone()),
            record.clone(),
        );
        self.history.lock().await.push(record.clone());
        Ok(())
    }
}

/// Mock secret store with per-operation failure flags
#[derive(Default)]
pub struct MockSecretStore {
    values: DashMap<String, String>,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
    put_count: AtomicU32,
    delete_count: AtomicU32,
}

impl MockSecretStore {
    /// Create an empty mock secret store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret directly
    pub fn insert(&self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Make the next put fail
    pub fn fail_next_put(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    /// Make the next delete fail
    pub fn fail_next_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Number of puts
    pub fn put_count(&self) -> u32 {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Number of deletes
    pub fn delete_count(&self) -> u32 {
        self.delete_count.load(Ordering::SeqCst)
    }

    /// Current value of a secret
    pub fn value(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|e| e.clone())
    }

    /// Whether a secret currently exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        self.put_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_put.swap(false, Ordering::SeqCst) {
            return Err(SecretStoreError::PutFailure {
                name: name.to_string(),
                message: "mock failure".to_string(),
            });
        }

        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<String, SecretStoreError> {
        self.values
            .get(name)
            .map(|e| e.clone())
            .ok_or_else(|| SecretStoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_delete.swap(false, Ordering::SeqCst) {
            return Err(SecretStoreError::DeleteFailure {
                name: name.to_string(),
                message: "mock failure".to_string(),
            });
        }

        self.values
            .remove(name)
            .ok_or_else(|| SecretStoreError::NotFound {
                name: name.to_string(),
            })?;
        Ok(())
    }
}

/// Mock mailer recording every message
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<Message>>,
    fail_all: AtomicBool,
}

impl MockMailer {
    /// Create a mock mailer
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail until told otherwise
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Messages sent so far
    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    /// Number of successful sends
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                recipient: message.to.clone(),
                message: "mock failure".to_string(),
            });
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
