//! Core types and primitives

pub mod error;
pub mod identity;
pub mod record;
pub mod time;

pub use error::{
    ConfigError, CryptoError, ProviderError, Result, RotationError, SecretStoreError, StoreError,
    TransportError,
};
pub use identity::{AccessKey, Identity, IdentityAttributes, NewAccessKey};
pub use record::{ChangeEvent, DeletionRecord, EventKind};
pub use time::start_of_day_utc;
