//! SSM Parameter Store secret store

use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterType;

use crate::core::SecretStoreError;
use crate::traits::SecretStore;

/// Secret store backed by SecureString parameters
#[derive(Debug, Clone)]
pub struct SsmSecretStore {
    client: SsmClient,
}

impl SsmSecretStore {
    /// Create a store over the shared SDK config
    pub fn new(aws: &aws_config::SdkConfig) -> Self {
        Self {
            client: SsmClient::new(aws),
        }
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    #[tracing::instrument(skip(self, value), fields(store = "ssm", name = %name))]
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| SecretStoreError::PutFailure {
                name: name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(name = %name, "Secret stored");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(store = "ssm", name = %name))]
    async fn get(&self, name: &str) -> Result<String, SecretStoreError> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if message.contains("ParameterNotFound") {
                    SecretStoreError::NotFound {
                        name: name.to_string(),
                    }
                } else {
                    SecretStoreError::GetFailure {
                        name: name.to_string(),
                        message,
                    }
                }
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| SecretStoreError::NotFound {
                name: name.to_string(),
            })
    }

    #[tracing::instrument(skip(self), fields(store = "ssm", name = %name))]
    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        self.client
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if message.contains("ParameterNotFound") {
                    SecretStoreError::NotFound {
                        name: name.to_string(),
                    }
                } else {
                    SecretStoreError::DeleteFailure {
                        name: name.to_string(),
                        message,
                    }
                }
            })?;

        tracing::debug!(name = %name, "Secret deleted");
        Ok(())
    }
}
