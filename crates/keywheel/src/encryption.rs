//! Per-identity symmetric encryption of exposed secrets
//!
//! When encryption is enabled, each issuance generates a fresh 256-bit key
//! for the identity, persists it to the secret store (overwriting any
//! previous key), and encrypts both halves of the new key pair into
//! self-contained tokens. Decryption needs only the stored key — each token
//! carries its own nonce.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::core::{CryptoError, SecretStoreError};
use crate::traits::SecretStore;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Secret-store name holding the encryption key for one identity
#[must_use]
pub fn secret_name(identity: &str) -> String {
    format!("keywheel/secret/{identity}")
}

/// One identity's symmetric key and the token operations on it
pub struct SecretCipher {
    key: [u8; KEY_LEN],
}

impl SecretCipher {
    /// Fresh random key
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Rebuild a cipher from base64 key material
    pub fn from_key_material(material: &str) -> Result<Self, CryptoError> {
        let bytes = b64_decode(material)?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::MalformedToken("key material is not 32 bytes".to_string()))?;
        Ok(Self { key })
    }

    /// Base64 key material as stored in the secret store
    #[must_use]
    pub fn key_material(&self) -> String {
        b64_encode(&self.key)
    }

    /// Encrypt one plaintext into a self-contained token (nonce ‖ ciphertext,
    /// base64). Every invocation uses a fresh nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);
        Ok(b64_encode(&token))
    }

    /// Decrypt a token produced by [`SecretCipher::encrypt`]
    pub fn decrypt(&self, token: &str) -> Result<String, CryptoError> {
        let bytes = b64_decode(token)?;
        if bytes.len() <= NONCE_LEN {
            return Err(CryptoError::MalformedToken(
                "token shorter than its nonce".to_string(),
            ));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

/// Key issuance and retirement against the secret store
#[derive(Clone)]
pub struct Encryptor {
    secrets: Arc<dyn SecretStore>,
}

impl Encryptor {
    /// Create an encryptor backed by the given secret store
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    /// Generate and persist a fresh key for the identity, overwriting any
    /// existing one
    ///
    /// Persist failure is fail-fast for the caller: handing out an encrypted
    /// secret whose key cannot later be retrieved is strictly worse than
    /// aborting the issuance.
    pub async fn issue_key(&self, identity: &str) -> Result<SecretCipher, SecretStoreError> {
        let cipher = SecretCipher::generate();
        self.secrets
            .put(&secret_name(identity), &cipher.key_material())
            .await?;
        tracing::info!(identity = %identity, "Stored fresh encryption key");
        Ok(cipher)
    }

    /// Delete the identity's key material
    pub async fn delete_key(&self, identity: &str) -> Result<(), SecretStoreError> {
        self.secrets.delete(&secret_name(identity)).await
    }
}

fn b64_encode(input: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, input)
}

fn b64_decode(input: &str) -> Result<Vec<u8>, CryptoError> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, input)
        .map_err(|e| CryptoError::MalformedToken(e.to_string()))
}
