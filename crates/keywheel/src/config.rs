//! Environment-style configuration
//!
//! All settings come from the process environment and are validated before
//! any identity or event is processed. Missing required settings and
//! unusable values are [`ConfigError`]s that abort the whole invocation.

use std::time::Duration;

use crate::core::ConfigError;

/// Record-store table identifier (required)
const ENV_TABLE: &str = "KEYWHEEL_TABLE";
/// Sender address for notifications (required)
const ENV_MAIL_FROM: &str = "MAIL_FROM";
/// Days after which an access key is considered stale
const ENV_ROTATE_AFTER_DAYS: &str = "ROTATE_AFTER_DAYS";
/// Days to keep a superseded key alive after a replacement is issued
const ENV_DELETE_AFTER_DAYS: &str = "DELETE_AFTER_DAYS";
/// Minutes to push a failed deletion forward before the next attempt
const ENV_RETRY_AFTER_MINS: &str = "RETRY_AFTER_MINS";
/// Whether to encrypt issued key pairs before mailing them out
const ENV_ENCRYPT_KEY_PAIR: &str = "ENCRYPT_KEY_PAIR";
/// Which notification transport to use
const ENV_MAIL_CLIENT: &str = "MAIL_CLIENT";
/// Account id shown in notification bodies
const ENV_ACCOUNT_ID: &str = "ACCOUNT_ID";
/// Width of the bounded worker pools
const ENV_WORKER_POOL_SIZE: &str = "WORKER_POOL_SIZE";
/// Timeout for outbound HTTP calls, seconds
const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

const ENV_WEBHOOK_API_URL: &str = "WEBHOOK_API_URL";
const ENV_WEBHOOK_API_KEY_SECRET: &str = "WEBHOOK_API_KEY_SECRET";

const ENV_SMTP_SERVER: &str = "SMTP_SERVER";
const ENV_SMTP_PORT: &str = "SMTP_PORT";
const ENV_SMTP_PROTOCOL: &str = "SMTP_PROTOCOL";
const ENV_SMTP_PASSWORD_SECRET: &str = "SMTP_PASSWORD_SECRET";

/// Notification transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailerKind {
    /// Transactional email API
    Ses,
    /// HTTP relay with an API key from the secret store
    Webhook,
    /// Direct mail submission over TLS
    Smtp,
}

impl std::str::FromStr for MailerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ses" => Ok(Self::Ses),
            "webhook" => Ok(Self::Webhook),
            "smtp" => Ok(Self::Smtp),
            other => Err(ConfigError::InvalidValue {
                name: ENV_MAIL_CLIENT.to_string(),
                reason: format!("'{other}' is not a transport; expected ses, webhook, or smtp"),
            }),
        }
    }
}

/// Connection security for the SMTP transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpProtocol {
    /// Implicit TLS from the first byte
    Ssl,
    /// Plaintext upgraded via STARTTLS
    Tls,
}

impl std::str::FromStr for SmtpProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ssl" => Ok(Self::Ssl),
            "tls" => Ok(Self::Tls),
            other => Err(ConfigError::InvalidValue {
                name: ENV_SMTP_PROTOCOL.to_string(),
                reason: format!("'{other}' is not a protocol; expected ssl or tls"),
            }),
        }
    }
}

/// Webhook relay settings, required when the webhook transport is selected
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Relay endpoint receiving the form POST
    pub api_url: String,
    /// Secret-store name holding the relay API key
    pub api_key_secret: String,
}

/// SMTP settings, required when the SMTP transport is selected
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Server host name
    pub server: String,
    /// Submission port
    pub port: u16,
    /// Implicit TLS or STARTTLS
    pub protocol: SmtpProtocol,
    /// Secret-store name holding the account password
    pub password_secret: String,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Record-store table identifier
    pub table: String,
    /// Sender address
    pub mail_from: String,
    /// Default rotation age, days
    pub rotate_after_days: i64,
    /// Default deletion grace, days
    pub delete_after_days: i64,
    /// Retry interval after a failed deletion, minutes
    pub retry_after_mins: i64,
    /// Encrypt issued key pairs before sharing
    pub encrypt_key_pair: bool,
    /// Selected notification transport
    pub mailer: MailerKind,
    /// Account id shown in notification bodies
    pub account_id: String,
    /// Width of the bounded worker pools
    pub pool_size: usize,
    /// Timeout applied to outbound network calls
    pub http_timeout: Duration,
    /// Present iff the webhook transport is selected
    pub webhook: Option<WebhookConfig>,
    /// Present iff the SMTP transport is selected
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary lookup, so tests can run without touching the
    /// process environment
    pub fn load(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let table = require(&get, ENV_TABLE)?;
        let mail_from = require(&get, ENV_MAIL_FROM)?;

        let rotate_after_days = parse_or(&get, ENV_ROTATE_AFTER_DAYS, 85)?;
        let delete_after_days = parse_or(&get, ENV_DELETE_AFTER_DAYS, 5)?;
        let retry_after_mins = parse_or(&get, ENV_RETRY_AFTER_MINS, 5)?;
        for (name, value) in [
            (ENV_ROTATE_AFTER_DAYS, rotate_after_days),
            (ENV_DELETE_AFTER_DAYS, delete_after_days),
            (ENV_RETRY_AFTER_MINS, retry_after_mins),
        ] {
            // Deletion schedules must only ever move forward
            if value < 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: format!("must not be negative, got {value}"),
                });
            }
        }
        let encrypt_key_pair = parse_bool_or(&get, ENV_ENCRYPT_KEY_PAIR, true)?;
        let pool_size = parse_or(&get, ENV_WORKER_POOL_SIZE, 10)?;
        let http_timeout_secs: u64 = parse_or(&get, ENV_HTTP_TIMEOUT_SECS, 10)?;

        let mailer = match get(ENV_MAIL_CLIENT) {
            Some(raw) => raw.parse::<MailerKind>()?,
            None => MailerKind::Ses,
        };

        let webhook = if mailer == MailerKind::Webhook {
            Some(WebhookConfig {
                api_url: require(&get, ENV_WEBHOOK_API_URL)?,
                api_key_secret: require(&get, ENV_WEBHOOK_API_KEY_SECRET)?,
            })
        } else {
            None
        };

        let smtp = if mailer == MailerKind::Smtp {
            let protocol = match get(ENV_SMTP_PROTOCOL) {
                Some(raw) => raw.parse::<SmtpProtocol>()?,
                None => SmtpProtocol::Ssl,
            };
            Some(SmtpConfig {
                server: require(&get, ENV_SMTP_SERVER)?,
                port: parse_or(&get, ENV_SMTP_PORT, 465)?,
                protocol,
                password_secret: require(&get, ENV_SMTP_PASSWORD_SECRET)?,
            })
        } else {
            None
        };

        Ok(Self {
            table,
            mail_from,
            rotate_after_days,
            delete_after_days,
            retry_after_mins,
            encrypt_key_pair,
            mailer,
            account_id: get(ENV_ACCOUNT_ID).unwrap_or_default(),
            pool_size,
            http_timeout: Duration::from_secs(http_timeout_secs),
            webhook,
            smtp,
        })
    }
}

fn require(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    match get(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequired {
            name: name.to_string(),
        }),
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool_or(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("'{other}' is not a boolean"),
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::load(|name| vars.get(name).cloned())
    }

    #[test]
    fn minimal_environment_gets_defaults() {
        let cfg = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
        ]))
        .unwrap();

        assert_eq!(cfg.rotate_after_days, 85);
        assert_eq!(cfg.delete_after_days, 5);
        assert_eq!(cfg.retry_after_mins, 5);
        assert!(cfg.encrypt_key_pair);
        assert_eq!(cfg.mailer, MailerKind::Ses);
        assert_eq!(cfg.pool_size, 10);
        assert!(cfg.webhook.is_none());
        assert!(cfg.smtp.is_none());
    }

    #[test]
    fn missing_table_is_rejected_up_front() {
        let err = load(&env(&[("MAIL_FROM", "security@example.com")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref name } if name == "KEYWHEEL_TABLE"));
    }

    #[test]
    fn missing_sender_is_rejected_up_front() {
        let err = load(&env(&[("KEYWHEEL_TABLE", "keywheel")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref name } if name == "MAIL_FROM"));
    }

    #[test]
    fn unknown_transport_is_a_config_error() {
        let err = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("MAIL_CLIENT", "pigeon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn webhook_transport_requires_relay_settings() {
        let err = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("MAIL_CLIENT", "webhook"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref name } if name == "WEBHOOK_API_URL"));

        let cfg = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("MAIL_CLIENT", "webhook"),
            ("WEBHOOK_API_URL", "https://relay.example.com/send"),
            ("WEBHOOK_API_KEY_SECRET", "keywheel/webhook/api-key"),
        ]))
        .unwrap();
        assert_eq!(cfg.mailer, MailerKind::Webhook);
        assert!(cfg.webhook.is_some());
    }

    #[test]
    fn smtp_transport_parses_protocol_and_port() {
        let cfg = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("MAIL_CLIENT", "smtp"),
            ("SMTP_SERVER", "mail.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_PROTOCOL", "tls"),
            ("SMTP_PASSWORD_SECRET", "keywheel/smtp/password"),
        ]))
        .unwrap();

        let smtp = cfg.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.protocol, SmtpProtocol::Tls);
    }

    #[test]
    fn unparseable_day_count_is_rejected() {
        let err = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("ROTATE_AFTER_DAYS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "ROTATE_AFTER_DAYS"));
    }

    #[test]
    fn negative_retry_interval_is_rejected() {
        let err = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("RETRY_AFTER_MINS", "-5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "RETRY_AFTER_MINS"));
    }

    #[test]
    fn encryption_flag_accepts_false() {
        let cfg = load(&env(&[
            ("KEYWHEEL_TABLE", "keywheel"),
            ("MAIL_FROM", "security@example.com"),
            ("ENCRYPT_KEY_PAIR", "false"),
        ]))
        .unwrap();
        assert!(!cfg.encrypt_key_pair);
    }
}
