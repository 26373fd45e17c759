//! IAM identity provider

use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::Tag;
use chrono::Utc;

use crate::core::{AccessKey, NewAccessKey, ProviderError};
use crate::traits::IdentityProvider;

/// Identity provider backed by AWS IAM users
#[derive(Debug, Clone)]
pub struct IamIdentityProvider {
    client: IamClient,
}

impl IamIdentityProvider {
    /// Create a provider over the shared SDK config
    pub fn new(aws: &aws_config::SdkConfig) -> Self {
        Self {
            client: IamClient::new(aws),
        }
    }
}

/// Map a rendered service error onto the provider taxonomy
///
/// The SDK surfaces service error codes inside the rendered message; matching
/// on the code substring keeps one mapping for every operation.
fn classify(action: &str, entity: &str, message: String) -> ProviderError {
    if message.contains("NoSuchEntity") {
        ProviderError::NotFound {
            entity: entity.to_string(),
        }
    } else if message.contains("LimitExceeded") && action == "CreateAccessKey" {
        ProviderError::KeyQuotaExceeded {
            identity: entity.to_string(),
        }
    } else if message.contains("Throttling") || message.contains("Rate exceeded") {
        ProviderError::RateLimited {
            action: action.to_string(),
        }
    } else if message.contains("AccessDenied") {
        ProviderError::AccessDenied {
            action: action.to_string(),
        }
    } else {
        ProviderError::Api {
            action: action.to_string(),
            message,
        }
    }
}

#[async_trait]
impl IdentityProvider for IamIdentityProvider {
    #[tracing::instrument(skip(self), fields(provider = "iam"))]
    async fn list_identities(&self) -> Result<Vec<String>, ProviderError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_users();
            if let Some(m) = &marker {
                request = request.marker(m);
            }

            let output = request.send().await.map_err(|e| {
                classify("ListUsers", "[all]", DisplayErrorContext(&e).to_string())
            })?;

            names.extend(output.users().iter().map(|u| u.user_name().to_string()));

            if output.is_truncated() {
                marker = output.marker().map(str::to_string);
                if marker.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        tracing::info!(count = names.len(), "Listed identities");
        Ok(names)
    }

    #[tracing::instrument(skip(self), fields(provider = "iam", identity = %identity))]
    async fn list_tags(&self, identity: &str) -> Result<Vec<(String, String)>, ProviderError> {
        let output = self
            .client
            .list_user_tags()
            .user_name(identity)
            .send()
            .await
            .map_err(|e| {
                classify("ListUserTags", identity, DisplayErrorContext(&e).to_string())
            })?;

        Ok(output
            .tags()
            .iter()
            .map(|t| (t.key().to_string(), t.value().to_string()))
            .collect())
    }

    #[tracing::instrument(skip(self), fields(provider = "iam", identity = %identity))]
    async fn list_access_keys(&self, identity: &str) -> Result<Vec<AccessKey>, ProviderError> {
        let output = self
            .client
            .list_access_keys()
            .user_name(identity)
            .send()
            .await
            .map_err(|e| {
                classify("ListAccessKeys", identity, DisplayErrorContext(&e).to_string())
            })?;

        let now = Utc::now().timestamp();
        let keys = output
            .access_key_metadata()
            .iter()
            .filter_map(|meta| {
                let id = meta.access_key_id()?;
                let created = meta.create_date()?;
                Some(AccessKey {
                    id: id.to_string(),
                    age_days: (now - created.secs()) / 86_400,
                })
            })
            .collect();

        Ok(keys)
    }

    #[tracing::instrument(skip(self), fields(provider = "iam", identity = %identity))]
    async fn create_access_key(&self, identity: &str) -> Result<NewAccessKey, ProviderError> {
        let output = self
            .client
            .create_access_key()
            .user_name(identity)
            .send()
            .await
            .map_err(|e| {
                classify("CreateAccessKey", identity, DisplayErrorContext(&e).to_string())
            })?;

        let key = output.access_key().ok_or_else(|| ProviderError::Api {
            action: "CreateAccessKey".to_string(),
            message: "response carried no access key".to_string(),
        })?;

        tracing::info!(identity = %identity, key_id = %key.access_key_id(), "Created access key");
        Ok(NewAccessKey {
            id: key.access_key_id().to_string(),
            secret: key.secret_access_key().to_string(),
        })
    }

    #[tracing::instrument(skip(self), fields(provider = "iam", identity = %identity, key_id = %key_id))]
    async fn delete_access_key(&self, identity: &str, key_id: &str) -> Result<(), ProviderError> {
        self.client
            .delete_access_key()
            .user_name(identity)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| {
                classify("DeleteAccessKey", key_id, DisplayErrorContext(&e).to_string())
            })?;

        tracing::info!(identity = %identity, key_id = %key_id, "Deleted access key");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(provider = "iam"))]
    async fn account_alias(&self) -> Result<String, ProviderError> {
        let output = self
            .client
            .list_account_aliases()
            .send()
            .await
            .map_err(|e| {
                classify(
                    "ListAccountAliases",
                    "[account]",
                    DisplayErrorContext(&e).to_string(),
                )
            })?;

        Ok(output.account_aliases().first().cloned().unwrap_or_default())
    }

    #[tracing::instrument(skip(self, tags), fields(provider = "iam", identity = %identity))]
    async fn tag_identity(
        &self,
        identity: &str,
        tags: &[(String, String)],
    ) -> Result<(), ProviderError> {
        let mut built = Vec::with_capacity(tags.len());
        for (key, value) in tags {
            built.push(
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| ProviderError::Api {
                        action: "TagUser".to_string(),
                        message: e.to_string(),
                    })?,
            );
        }

        self.client
            .tag_user()
            .user_name(identity)
            .set_tags(Some(built))
            .send()
            .await
            .map_err(|e| classify("TagUser", identity, DisplayErrorContext(&e).to_string()))?;

        tracing::info!(identity = %identity, count = tags.len(), "Tagged identity");
        Ok(())
    }
}
