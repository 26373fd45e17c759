//! Webhook relay transport
//!
//! Posts the message as a form to an HTTP relay (Mailgun-style API). The
//! relay API key lives in the secret store and is fetched per send.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Mailer, Message};
use crate::config::WebhookConfig;
use crate::core::TransportError;
use crate::traits::SecretStore;

/// HTTP relay transport
pub struct WebhookMailer {
    http: reqwest::Client,
    config: WebhookConfig,
    from: String,
    secrets: Arc<dyn SecretStore>,
}

impl WebhookMailer {
    /// Create a relay mailer with a bounded request timeout
    pub fn new(
        config: WebhookConfig,
        from: String,
        timeout: Duration,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client with static options");
        Self {
            http,
            config,
            from,
            secrets,
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    #[tracing::instrument(skip(self, message), fields(transport = "webhook", to = %message.to))]
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let api_key = self
            .secrets
            .get(&self.config.api_key_secret)
            .await
            .map_err(|e| TransportError::MissingSecret {
                name: self.config.api_key_secret.clone(),
                source: e,
            })?;

        let response = self
            .http
            .post(&self.config.api_url)
            .basic_auth("api", Some(&api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", message.to.as_str()),
                ("subject", message.subject.as_str()),
                ("text", message.text_body.as_str()),
                ("html", message.html_body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::Http {
                url: self.config.api_url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                recipient: message.to.clone(),
                message: format!("{status}: {body}"),
            });
        }

        tracing::info!(to = %message.to, name = %message.display_name, "Mail sent via relay");
        Ok(())
    }
}
