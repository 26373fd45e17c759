//! Transactional email via AWS SES

use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message as EmailMessage};

use async_trait::async_trait;

use super::{Mailer, Message};
use crate::core::TransportError;

/// SES transport
#[derive(Debug, Clone)]
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    /// Create a mailer over the shared SDK config
    pub fn new(aws: &aws_config::SdkConfig, from: String) -> Self {
        Self {
            client: SesClient::new(aws),
            from,
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    #[tracing::instrument(skip(self, message), fields(transport = "ses", to = %message.to))]
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let api_err = |e: &dyn std::fmt::Display| TransportError::Api {
            recipient: message.to.clone(),
            message: e.to_string(),
        };

        let content = |data: &str| {
            Content::builder()
                .data(data)
                .charset("UTF-8")
                .build()
                .map_err(|e| api_err(&e))
        };

        let email = EmailMessage::builder()
            .subject(content(&message.subject)?)
            .body(
                Body::builder()
                    .text(content(&message.text_body)?)
                    .html(content(&message.html_body)?)
                    .build(),
            )
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&message.to).build())
            .content(EmailContent::builder().simple(email).build())
            .send()
            .await
            .map_err(|e| api_err(&aws_sdk_sesv2::error::DisplayErrorContext(&e)))?;

        tracing::info!(to = %message.to, name = %message.display_name, "Mail sent via SES");
        Ok(())
    }
}
