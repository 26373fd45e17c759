//! Direct mail submission over SMTP
//!
//! Submits through the configured server over implicit TLS or STARTTLS. The
//! mailbox password lives in the secret store and is fetched per send; the
//! sender address doubles as the login name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as Email, Tokio1Executor};

use super::{Mailer, Message};
use crate::config::{SmtpConfig, SmtpProtocol};
use crate::core::TransportError;
use crate::traits::SecretStore;

/// SMTP submission transport
pub struct SmtpMailer {
    config: SmtpConfig,
    from: String,
    timeout: Duration,
    secrets: Arc<dyn SecretStore>,
}

impl SmtpMailer {
    /// Create an SMTP mailer with a bounded connection timeout
    pub fn new(
        config: SmtpConfig,
        from: String,
        timeout: Duration,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            config,
            from,
            timeout,
            secrets,
        }
    }

    fn smtp_err(&self, recipient: &str, e: &dyn std::fmt::Display) -> TransportError {
        TransportError::Smtp {
            recipient: recipient.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(skip(self, message), fields(transport = "smtp", to = %message.to))]
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let password = self
            .secrets
            .get(&self.config.password_secret)
            .await
            .map_err(|e| TransportError::MissingSecret {
                name: self.config.password_secret.clone(),
                source: e,
            })?;

        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| self.smtp_err(&message.to, &e))?;
        let to = Mailbox::new(
            Some(message.display_name.clone()),
            message
                .to
                .parse()
                .map_err(|e| self.smtp_err(&message.to, &e))?,
        );

        let email = Email::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                message.html_body.clone(),
            ))
            .map_err(|e| self.smtp_err(&message.to, &e))?;

        let builder = match self.config.protocol {
            SmtpProtocol::Ssl => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.server)
            }
            SmtpProtocol::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            }
        }
        .map_err(|e| self.smtp_err(&message.to, &e))?;

        let transport = builder
            .port(self.config.port)
            .timeout(Some(self.timeout))
            .credentials(Credentials::new(self.from.clone(), password))
            .build();

        transport
            .send(email)
            .await
            .map_err(|e| self.smtp_err(&message.to, &e))?;

        tracing::info!(to = %message.to, name = %message.display_name, "Mail sent via SMTP");
        Ok(())
    }
}
