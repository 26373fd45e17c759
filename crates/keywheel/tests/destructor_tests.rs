//! Integration tests for the deferred-deletion handler

use std::sync::Arc;

use keywheel::core::{ChangeEvent, DeletionRecord, EventKind};
use keywheel::destructor::DestructionHandler;
use keywheel::encryption::{Encryptor, secret_name};
use keywheel::notify::AccountContext;
use keywheel::testing::{MockDeletionStore, MockIdentityProvider, MockMailer, MockSecretStore};

struct Harness {
    provider: Arc<MockIdentityProvider>,
    store: Arc<MockDeletionStore>,
    secrets: Arc<MockSecretStore>,
    mailer: Arc<MockMailer>,
}

impl Harness {
    fn new() -> Self {
        Self {
            provider: Arc::new(MockIdentityProvider::new()),
            store: Arc::new(MockDeletionStore::new()),
            secrets: Arc::new(MockSecretStore::new()),
            mailer: Arc::new(MockMailer::new()),
        }
    }

    fn handler(&self) -> DestructionHandler {
        DestructionHandler::new(
            self.provider.clone(),
            self.store.clone(),
            Encryptor::new(self.secrets.clone()),
            self.mailer.clone(),
            AccountContext {
                id: "123456789012".to_string(),
                alias: "prod".to_string(),
            },
            5,
            4,
        )
    }
}

fn record(identity: &str, key_id: &str, encrypted: bool) -> DeletionRecord {
    DeletionRecord {
        identity: identity.to_string(),
        access_key_id: key_id.to_string(),
        email: format!("{identity}@example.com"),
        delete_on: 1_700_000_000,
        encrypted,
    }
}

fn remove_event(rec: DeletionRecord) -> ChangeEvent {
    ChangeEvent {
        kind: EventKind::Remove,
        old_image: Some(rec),
    }
}

#[tokio::test]
async fn expired_record_deletes_the_key_and_notifies() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95), ("AKIANEW", 2)],
    );

    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", false))])
        .await;

    assert_eq!(report.deleted, 1);
    assert_eq!(report.requeued, 0);
    assert!(h.provider.was_deleted("AKIAOLD"));

    // No new record: the deletion is final
    assert!(h.store.records().is_empty());

    let sent = h.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert!(sent[0].text_body.contains("AKIAOLD"));
}

#[tokio::test]
async fn scenario_c_transient_failure_requeues_with_advanced_delete_on() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.provider.fail_delete_for("AKIAOLD");

    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", false))])
        .await;

    assert_eq!(report.requeued, 1);
    assert_eq!(report.deleted, 0);

    // No provider state changed
    assert!(!h.provider.was_deleted("AKIAOLD"));

    // Full-field overwrite with delete_on offset from the prior value
    let requeued = h.store.record("alice", "AKIAOLD").expect("requeued record");
    assert_eq!(requeued.delete_on, 1_700_000_000 + 5 * 60);
    assert_eq!(requeued.email, "alice@example.com");
    assert!(!requeued.encrypted);
}

#[tokio::test]
async fn replayed_remove_event_is_a_logged_failure_not_a_crash() {
    let h = Harness::new();
    h.provider
        .add_identity("alice", &[("keywheel:email", "alice@example.com")], &[]);

    // The key is already gone; the provider reports not-found and the
    // record simply requeues
    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAGONE", false))])
        .await;

    assert_eq!(report.requeued, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn encrypted_record_drops_its_key_material() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.secrets.insert(&secret_name("alice"), "key-material");

    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", true))])
        .await;

    assert_eq!(report.deleted, 1);
    assert!(!h.secrets.contains(&secret_name("alice")));
}

#[tokio::test]
async fn requeue_lowers_encrypted_flag_once_material_is_gone() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.provider.fail_delete_for("AKIAOLD");
    h.secrets.insert(&secret_name("alice"), "key-material");

    h.handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", true))])
        .await;

    // Key material went away on this attempt, so the retry must not try again
    assert!(!h.secrets.contains(&secret_name("alice")));
    let requeued = h.store.record("alice", "AKIAOLD").unwrap();
    assert!(!requeued.encrypted);
}

#[tokio::test]
async fn requeue_keeps_encrypted_flag_when_material_deletion_fails() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.provider.fail_delete_for("AKIAOLD");
    h.secrets.insert(&secret_name("alice"), "key-material");
    h.secrets.fail_next_delete();

    h.handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", true))])
        .await;

    let requeued = h.store.record("alice", "AKIAOLD").unwrap();
    assert!(requeued.encrypted, "flag must survive a failed key deletion");
}

#[tokio::test]
async fn material_deletion_failure_never_blocks_a_successful_delete() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.secrets.insert(&secret_name("alice"), "key-material");
    h.secrets.fail_next_delete();

    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", true))])
        .await;

    assert_eq!(report.deleted, 1);
    assert!(h.provider.was_deleted("AKIAOLD"));
}

#[tokio::test]
async fn insert_and_modify_events_are_ignored() {
    let h = Harness::new();

    let report = h
        .handler()
        .handle_batch(vec![
            ChangeEvent {
                kind: EventKind::Insert,
                old_image: None,
            },
            ChangeEvent {
                kind: EventKind::Modify,
                old_image: Some(record("alice", "AKIAOLD", false)),
            },
        ])
        .await;

    assert_eq!(report.skipped, 2);
    assert_eq!(h.provider.delete_calls(), 0);
    assert_eq!(h.store.upsert_count(), 0);
}

#[tokio::test]
async fn remove_without_prior_image_is_a_handling_failure() {
    let h = Harness::new();

    let report = h
        .handler()
        .handle_batch(vec![ChangeEvent {
            kind: EventKind::Remove,
            old_image: None,
        }])
        .await;

    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn failed_requeue_write_is_surfaced() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.provider.fail_delete_for("AKIAOLD");
    h.store.fail_next_upsert();

    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", false))])
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.requeued, 0);
}

#[tokio::test]
async fn mail_failure_does_not_requeue_a_completed_deletion() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 95)],
    );
    h.mailer.fail_all(true);

    let report = h
        .handler()
        .handle_batch(vec![remove_event(record("alice", "AKIAOLD", false))])
        .await;

    assert_eq!(report.deleted, 1);
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn events_in_a_batch_are_isolated_from_each_other() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIA1", 95)],
    );
    h.provider.add_identity(
        "bob",
        &[("keywheel:email", "bob@example.com")],
        &[("AKIA2", 95)],
    );
    h.provider.fail_delete_for("AKIA2");

    let report = h
        .handler()
        .handle_batch(vec![
            remove_event(record("alice", "AKIA1", false)),
            remove_event(record("bob", "AKIA2", false)),
        ])
        .await;

    assert_eq!(report.deleted, 1);
    assert_eq!(report.requeued, 1);
    assert!(h.provider.was_deleted("AKIA1"));
    assert!(!h.provider.was_deleted("AKIA2"));
}
