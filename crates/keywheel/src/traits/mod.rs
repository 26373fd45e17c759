//! Service seams
//!
//! The identity provider, record store, and secret store are injected as
//! `Arc<dyn …>` handles built once at process start. No component holds a
//! global client.

mod provider;
mod secrets;
mod store;

pub use provider::IdentityProvider;
pub use secrets::SecretStore;
pub use store::DeletionStore;
