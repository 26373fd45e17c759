//! Integration tests for the rotation pipeline (scan → plan → issue)

use std::sync::Arc;

use chrono::Utc;
use keywheel::core::start_of_day_utc;
use keywheel::encryption::{Encryptor, secret_name};
use keywheel::issuer::CredentialIssuer;
use keywheel::notify::AccountContext;
use keywheel::planner::RotationPlanner;
use keywheel::scan::IdentityScan;
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

    fn issuer(&self, encrypt: bool) -> CredentialIssuer {
        CredentialIssuer::new(
            self.provider.clone(),
            self.store.clone(),
            self.mailer.clone(),
            encrypt.then(|| Encryptor::new(self.secrets.clone())),
            AccountContext {
                id: "123456789012".to_string(),
                alias: "prod".to_string(),
            },
            5,
            4,
        )
    }

    /// Run the whole creator phase: scan, plan with an 85-day default, issue
    async fn rotate(&self, encrypt: bool) -> keywheel::core::Result<keywheel::issuer::IssueReport> {
        let identities = IdentityScan::new(self.provider.clone(), 4).run().await?;
        let tasks = RotationPlanner::new(85).plan(identities);
        self.issuer(encrypt).issue_all(tasks).await
    }
}

/// Acceptable `delete_on` values for a record written after `base_day` was
/// captured; the second entry covers a run that straddles a UTC midnight
fn expected_delete_on(base_day: i64, grace_days: i64) -> [i64; 2] {
    [
        base_day + grace_days * 86_400,
        base_day + (grace_days + 1) * 86_400,
    ]
}

#[tokio::test]
async fn scenario_a_stale_key_is_rotated() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 90)],
    );

    let base_day = start_of_day_utc(Utc::now());
    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.issued, 1);
    assert_eq!(report.failed, 0);

    // Exactly one create call and one record referencing the retired key
    assert_eq!(h.provider.create_calls(), 1);
    let record = h.store.record("alice", "AKIAOLD").expect("record written");
    assert_eq!(record.email, "alice@example.com");
    assert!(!record.encrypted);
    assert!(expected_delete_on(base_day, 5).contains(&record.delete_on));

    // Notification attempted with the retiring key named
    let sent = h.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert!(sent[0].text_body.contains("AKIAOLD"));
}

#[tokio::test]
async fn scenario_b_full_slots_touch_nothing() {
    let h = Harness::new();
    h.provider.add_identity(
        "bob",
        &[("keywheel:email", "bob@example.com")],
        &[("AKIA1", 200), ("AKIA2", 300)],
    );

    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(h.provider.create_calls(), 0);
    assert!(h.store.records().is_empty());
    assert_eq!(h.mailer.sent_count().await, 0);
}

#[tokio::test]
async fn identities_without_keys_are_skipped() {
    let h = Harness::new();
    h.provider
        .add_identity("carol", &[("keywheel:email", "carol@example.com")], &[]);

    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(h.provider.create_calls(), 0);
}

#[tokio::test]
async fn fresh_keys_are_left_alone() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIA1", 30)],
    );

    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(h.provider.create_calls(), 0);
}

#[tokio::test]
async fn grace_override_shifts_delete_on() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[
            ("keywheel:email", "alice@example.com"),
            ("keywheel:delete_after_days", "7"),
        ],
        &[("AKIAOLD", 90)],
    );

    let base_day = start_of_day_utc(Utc::now());
    h.rotate(false).await.unwrap();
    let record = h.store.record("alice", "AKIAOLD").unwrap();
    assert!(expected_delete_on(base_day, 7).contains(&record.delete_on));
}

#[tokio::test]
async fn unparseable_grace_override_falls_back_to_default() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[
            ("keywheel:email", "alice@example.com"),
            ("keywheel:delete_after_days", "whenever"),
        ],
        &[("AKIAOLD", 90)],
    );

    let base_day = start_of_day_utc(Utc::now());
    h.rotate(false).await.unwrap();
    let record = h.store.record("alice", "AKIAOLD").unwrap();
    assert!(expected_delete_on(base_day, 5).contains(&record.delete_on));
}

#[tokio::test]
async fn mail_failure_never_blocks_the_record() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 90)],
    );
    h.mailer.fail_all(true);

    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.issued, 1);
    assert!(h.store.record("alice", "AKIAOLD").is_some());
}

#[tokio::test]
async fn encrypted_issuance_stores_key_and_hides_the_secret() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 90)],
    );

    let report = h.rotate(true).await.unwrap();
    assert_eq!(report.issued, 1);

    // Key material persisted under the identity's slot
    assert!(h.secrets.contains(&secret_name("alice")));

    // Record carries the flag
    assert!(h.store.record("alice", "AKIAOLD").unwrap().encrypted);

    // The raw secret never appears in the notice; the decrypt instruction does
    let sent = h.mailer.sent().await;
    assert!(!sent[0].text_body.contains("secret-0001"));
    assert!(sent[0].text_body.contains(&secret_name("alice")));
}

#[tokio::test]
async fn provider_failure_is_isolated_to_its_identity() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIA1", 90)],
    );
    h.provider.add_identity(
        "dave",
        &[("keywheel:email", "dave@example.com")],
        &[("AKIA2", 90)],
    );
    h.provider.fail_create_for("dave");

    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.issued, 1);
    assert_eq!(report.failed, 1);
    assert!(h.store.record("alice", "AKIA1").is_some());
    assert!(h.store.record("dave", "AKIA2").is_none());
}

#[tokio::test]
async fn key_persist_failure_fails_the_run_but_not_siblings() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIA1", 90)],
    );
    h.provider.add_identity(
        "dave",
        &[("keywheel:email", "dave@example.com")],
        &[("AKIA2", 90)],
    );
    h.secrets.fail_next_put();

    let result = h.rotate(true).await;
    assert!(result.is_err(), "secret-store failure must fail the run");

    // Both identities were attempted; exactly one record exists and no
    // notice went out for the failed one
    assert_eq!(h.provider.create_calls(), 2);
    assert_eq!(h.store.records().len(), 1);
    assert_eq!(h.mailer.sent_count().await, 1);
}

#[tokio::test]
async fn store_failure_leaves_the_notice_sent_but_counts_as_failed() {
    let h = Harness::new();
    h.provider.add_identity(
        "alice",
        &[("keywheel:email", "alice@example.com")],
        &[("AKIAOLD", 90)],
    );
    h.store.fail_next_upsert();

    let report = h.rotate(false).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.issued, 0);
    assert_eq!(h.mailer.sent_count().await, 1);
}
