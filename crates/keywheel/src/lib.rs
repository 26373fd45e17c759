//! Keywheel
//!
//! Automated lifecycle management for cloud identity access keys.
//!
//! # How it works
//!
//! - **Rotation** — [`scan`] discovers enrolled identities and their keys,
//!   [`planner`] decides which keys are stale, and [`issuer`] creates a
//!   replacement for each, optionally encrypting the exposed secret, notifying
//!   the owner, and writing a deferred-deletion record.
//! - **Destruction** — [`destructor`] consumes change events from the record
//!   store; when a record expires (REMOVE event) the superseded key is deleted
//!   from the provider, with a durable requeue on failure.
//!
//! External collaborators (identity provider, record store, secret store,
//! mail transports) sit behind the traits in [`traits`] and [`notify`], so the
//! pipelines can be exercised against the in-memory doubles in [`testing`].

#![forbid(unsafe_code)]

/// Environment-style configuration with upfront validation
pub mod config;
/// Core types, errors, and primitives
pub mod core;
/// Change-event batch handler for deferred deletions
pub mod destructor;
/// Per-identity symmetric encryption of exposed secrets
pub mod encryption;
/// Per-identity issuance pipeline
pub mod issuer;
/// Notification transports and message rendering
pub mod notify;
/// Rotation decision policy
pub mod planner;
/// AWS-backed service implementations
pub mod providers;
/// Identity discovery with bounded fan-out
pub mod scan;
pub mod testing;
/// Service seams for the identity provider, record store, and secret store
pub mod traits;

/// Commonly used types and traits
pub mod prelude {
    pub use crate::config::{Config, MailerKind};
    pub use crate::core::{
        AccessKey, ChangeEvent, DeletionRecord, EventKind, Identity, IdentityAttributes,
        NewAccessKey, RotationError,
    };
    pub use crate::destructor::DestructionHandler;
    pub use crate::issuer::CredentialIssuer;
    pub use crate::notify::{Mailer, Message};
    pub use crate::planner::RotationPlanner;
    pub use crate::traits::{DeletionStore, IdentityProvider, SecretStore};
    pub use async_trait::async_trait;
}

// Re-export commonly used external types
pub use chrono::{DateTime, Utc};
