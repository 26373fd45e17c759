//! Error types for rotation operations
//!
//! This module defines a tiered error hierarchy:
//! - [`RotationError`]: Top-level error wrapping the per-service categories
//! - [`ProviderError`]: Identity-provider API failures
//! - [`StoreError`]: Record-store read/write failures
//! - [`SecretStoreError`]: Secret-store failures (fail-fast during issuance,
//!   best-effort during destruction)
//! - [`TransportError`]: Notification delivery failures (never fatal)
//! - [`ConfigError`]: Missing or invalid settings, detected before any
//!   identity or event is processed
//! - [`CryptoError`]: Encryption and token-encoding failures
//!
//! Failures scoped to one identity or one event are contained and logged by
//! the pipelines; only configuration errors abort a whole invocation.

use thiserror::Error;

/// Top-level rotation error
///
/// Wraps the per-service error categories with `From` impls so the pipelines
/// can use `?` across service boundaries.
#[derive(Debug, Error)]
pub enum RotationError {
    /// Identity provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Record store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Secret store failure
    #[error(transparent)]
    SecretStore(#[from] SecretStoreError),

    /// Notification transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cryptographic failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Identity-provider API errors
///
/// A provider error aborts only the current identity's or event's unit of
/// work, never the siblings.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Entity (identity or access key) does not exist
    #[error("'{entity}' not found")]
    NotFound {
        /// Identity name or access key id
        entity: String,
    },

    /// Caller lacks permission for the operation
    #[error("Access denied for '{action}'")]
    AccessDenied {
        /// API action that was rejected
        action: String,
    },

    /// Provider throttled the request
    #[error("Rate limited on '{action}'")]
    RateLimited {
        /// API action that was throttled
        action: String,
    },

    /// Identity already holds the maximum number of live keys
    #[error("Identity '{identity}' already holds the maximum number of access keys")]
    KeyQuotaExceeded {
        /// Identity name
        identity: String,
    },

    /// Any other API failure
    #[error("Provider call '{action}' failed: {message}")]
    Api {
        /// API action that failed
        action: String,
        /// Provider-reported failure
        message: String,
    },
}

/// Record-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to write a deletion record
    #[error("Failed to upsert deletion record for key '{key_id}': {message}")]
    WriteFailure {
        /// Access key id the record refers to
        key_id: String,
        /// Store-reported failure
        message: String,
    },

    /// A change event carried a record image that cannot be interpreted
    #[error("Malformed record image: {reason}")]
    MalformedRecord {
        /// What was missing or invalid
        reason: String,
    },
}

/// Secret-store errors
///
/// During issuance these are fail-fast: exposing an unencrypted secret whose
/// key cannot later be retrieved is strictly worse than aborting. During
/// destruction they are logged and the flow continues.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// Named secret does not exist
    #[error("Secret '{name}' not found")]
    NotFound {
        /// Secret name
        name: String,
    },

    /// Failed to store a secret
    #[error("Failed to store secret '{name}': {message}")]
    PutFailure {
        /// Secret name
        name: String,
        /// Store-reported failure
        message: String,
    },

    /// Failed to read a secret
    #[error("Failed to read secret '{name}': {message}")]
    GetFailure {
        /// Secret name
        name: String,
        /// Store-reported failure
        message: String,
    },

    /// Failed to delete a secret
    #[error("Failed to delete secret '{name}': {message}")]
    DeleteFailure {
        /// Secret name
        name: String,
        /// Store-reported failure
        message: String,
    },
}

/// Notification delivery errors
///
/// Always logged, never fatal, never auto-retried.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP-level failure from the webhook relay
    #[error("Webhook delivery to '{url}' failed: {message}")]
    Http {
        /// Relay endpoint
        url: String,
        /// Client-reported failure
        message: String,
    },

    /// The relay accepted the request but reported a delivery failure
    #[error("Relay rejected message for '{recipient}': {message}")]
    Rejected {
        /// Intended recipient
        recipient: String,
        /// Relay-reported reason
        message: String,
    },

    /// SMTP submission failure
    #[error("SMTP submission to '{recipient}' failed: {message}")]
    Smtp {
        /// Intended recipient
        recipient: String,
        /// Transport-reported failure
        message: String,
    },

    /// Transactional mail API failure
    #[error("Mail API call failed for '{recipient}': {message}")]
    Api {
        /// Intended recipient
        recipient: String,
        /// Service-reported failure
        message: String,
    },

    /// A transport setting needed at send time was unavailable
    #[error("Transport secret '{name}' unavailable: {source}")]
    MissingSecret {
        /// Secret name
        name: String,
        /// Underlying secret-store error
        #[source]
        source: SecretStoreError,
    },
}

/// Configuration errors
///
/// Detected before any identity or event is processed; abort the whole
/// invocation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("{name} is required but not set")]
    MissingRequired {
        /// Environment variable name
        name: String,
    },

    /// A setting is present but unusable
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Environment variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed - wrong key or corrupted token
    #[error("Decryption failed - wrong key or corrupted token")]
    DecryptionFailed,

    /// Token or key material is not valid base64 / not the expected length
    #[error("Malformed token: {0}")]
    MalformedToken(String),
}

/// Result type alias for rotation operations
pub type Result<T> = std::result::Result<T, RotationError>;
