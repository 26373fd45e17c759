//! Notification transports
//!
//! Owners are notified when a replacement key is issued and when a
//! superseded key is finally deleted. Delivery is best-effort everywhere: a
//! failed send is logged by the caller and never rolls anything back, blocks
//! a record write, or gets auto-retried.
//!
//! The transport is chosen once at configuration time; an unknown selection
//! is a [`ConfigError`](crate::core::ConfigError) long before any identity is
//! touched.

mod message;
mod ses;
mod smtp;
mod webhook;

pub use message::{AccountContext, Message};
pub use ses::SesMailer;
pub use smtp::SmtpMailer;
pub use webhook::WebhookMailer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, MailerKind};
use crate::core::TransportError;
use crate::traits::SecretStore;

/// One-way notification transport
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message
    async fn send(&self, message: &Message) -> Result<(), TransportError>;
}

/// Build the configured transport
///
/// The webhook and SMTP transports fetch their credentials from the secret
/// store at send time, so a rotated relay key or mailbox password is picked
/// up without a restart.
pub fn build_mailer(
    config: &Config,
    aws: &aws_config::SdkConfig,
    secrets: Arc<dyn SecretStore>,
) -> Arc<dyn Mailer> {
    match config.mailer {
        MailerKind::Ses => Arc::new(SesMailer::new(aws, config.mail_from.clone())),
        MailerKind::Webhook => {
            let webhook = config
                .webhook
                .clone()
                .expect("webhook settings are validated at config load");
            Arc::new(WebhookMailer::new(
                webhook,
                config.mail_from.clone(),
                config.http_timeout,
                secrets,
            ))
        }
        MailerKind::Smtp => {
            let smtp = config
                .smtp
                .clone()
                .expect("smtp settings are validated at config load");
            Arc::new(SmtpMailer::new(
                smtp,
                config.mail_from.clone(),
                config.http_timeout,
                secrets,
            ))
        }
    }
}
