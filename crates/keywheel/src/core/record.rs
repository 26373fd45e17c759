//! Deferred-deletion records and record-store change events
//!
//! A [`DeletionRecord`] is the durable marker that a superseded access key
//! must be deleted at or after `delete_on`. Records are written by the
//! issuer, advanced by the destructor on retry, and removed by the store's
//! own expiry mechanism — that removal is the signal the destructor acts on.

use serde::{Deserialize, Serialize};

/// Durable marker scheduling one access key for deletion
///
/// Keyed by `(identity, access_key_id)`; all writes are overwrite-upserts so
/// redundant retries are safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    /// Owning identity
    pub identity: String,

    /// Access key scheduled for deletion
    pub access_key_id: String,

    /// Owner address notified on deletion
    pub email: String,

    /// Epoch seconds at or after which the key must be deleted.
    /// Only ever advances, never regresses.
    pub delete_on: i64,

    /// Whether encryption-key material for the identity is still live and
    /// must be deleted together with the key
    pub encrypted: bool,
}

impl DeletionRecord {
    /// The record advanced for one retry cycle
    ///
    /// `delete_on` moves forward from the *prior* value, not from the current
    /// time, so the schedule stays monotonic across process restarts.
    /// `encrypted` is lowered only when the key material was deleted on this
    /// attempt; otherwise the flag carries over so a later retry does not
    /// re-attempt a deletion that already completed.
    #[must_use]
    pub fn requeued(&self, retry_after_mins: i64, key_material_deleted: bool) -> Self {
        Self {
            identity: self.identity.clone(),
            access_key_id: self.access_key_id.clone(),
            email: self.email.clone(),
            delete_on: self.delete_on + retry_after_mins * 60,
            encrypted: if key_material_deleted {
                false
            } else {
                self.encrypted
            },
        }
    }
}

/// Kind of record-store change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// A record was created
    Insert,
    /// A record was updated in place
    Modify,
    /// A record expired or was deleted; the sole actionable kind
    Remove,
}

/// One change event emitted by the record store
///
/// REMOVE events carry the prior row image; INSERT and MODIFY are ignored by
/// the destructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the row
    pub kind: EventKind,

    /// Prior row image; present on REMOVE events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<DeletionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> DeletionRecord {
        DeletionRecord {
            identity: "alice".to_string(),
            access_key_id: "AKIAOLD".to_string(),
            email: "alice@example.com".to_string(),
            delete_on: 1_700_000_000,
            encrypted: true,
        }
    }

    #[test]
    fn requeued_advances_from_prior_delete_on() {
        let next = record().requeued(5, false);
        assert_eq!(next.delete_on, 1_700_000_000 + 5 * 60);
        assert_eq!(next.identity, "alice");
        assert_eq!(next.access_key_id, "AKIAOLD");
        assert_eq!(next.email, "alice@example.com");
    }

    #[test]
    fn requeued_lowers_flag_only_when_material_deleted() {
        assert!(record().requeued(5, false).encrypted);
        assert!(!record().requeued(5, true).encrypted);

        // An already-lowered flag stays lowered
        let mut rec = record();
        rec.encrypted = false;
        assert!(!rec.requeued(5, false).encrypted);
    }

    #[test]
    fn change_event_round_trips_through_json() {
        let event = ChangeEvent {
            kind: EventKind::Remove,
            old_image: Some(record()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"REMOVE\""));

        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, EventKind::Remove);
        assert_eq!(back.old_image.unwrap(), record());
    }

    #[test]
    fn insert_event_needs_no_image() {
        let event: ChangeEvent = serde_json::from_str("{\"kind\":\"INSERT\"}").unwrap();
        assert_eq!(event.kind, EventKind::Insert);
        assert!(event.old_image.is_none());
    }
}
