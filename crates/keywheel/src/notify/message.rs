//! Notification messages
//!
//! Every message carries both a plaintext and an HTML rendering, built here
//! so the transports stay dumb pipes.

/// Account shown in message bodies so owners know which account the key
/// belongs to
#[derive(Debug, Clone, Default)]
pub struct AccountContext {
    /// Numeric account id
    pub id: String,
    /// Human-readable alias, may be empty
    pub alias: String,
}

impl AccountContext {
    fn display(&self) -> String {
        if self.alias.is_empty() {
            self.id.clone()
        } else {
            format!("{} ({})", self.id, self.alias)
        }
    }
}

/// One notification ready for any transport
#[derive(Debug, Clone)]
pub struct Message {
    /// Recipient address
    pub to: String,
    /// Recipient display name
    pub display_name: String,
    /// Subject line
    pub subject: String,
    /// Plaintext body
    pub text_body: String,
    /// HTML body
    pub html_body: String,
}

impl Message {
    /// Notice that a replacement key pair was issued
    ///
    /// `access_key` and `secret_key` are either the raw values or the
    /// encrypted tokens, depending on whether encryption is enabled; the
    /// instruction text already explains how to decrypt in the latter case.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn key_issued(
        email: &str,
        identity: &str,
        account: &AccountContext,
        access_key: &str,
        secret_key: &str,
        instruction: &str,
        retiring_key_id: &str,
        grace_days: i64,
    ) -> Self {
        let subject = "New Access Key Pair".to_string();

        let text_body = format!(
            "Hey {identity},\n\n\
             A new access key pair has been generated for you. Please update it wherever necessary.\n\n\
             Account: {account}\n\
             Access Key: {access_key}\n\
             Secret Access Key: {secret_key}\n\
             Instruction: {instruction}\n\n\
             Note: Existing key pair {retiring_key_id} will be deleted after {grace_days} day(s), \
             so please update the key pair wherever required.\n\n\
             Thanks,\nYour Security Team",
            account = account.display(),
        );

        let html_body = format!(
            "<!DOCTYPE html>\n\
             <html>\n\
             <head><meta charset=\"utf-8\"><title>{subject}</title></head>\n\
             <body style=\"font-family: Helvetica, Arial, sans-serif; font-size: 14px;\">\n\
             <p>Hey {identity},</p>\n\
             <p>A new access key pair has been generated for you. Please update it wherever necessary.</p>\n\
             <p>Account: <b>{account}</b><br/>\n\
             Access Key: <b>{access_key}</b><br/>\n\
             Secret Access Key: <b>{secret_key}</b><br/>\n\
             Instruction: <b>{instruction}</b></p>\n\
             <p><b>Note:</b> Existing key pair <b>{retiring_key_id}</b> will be deleted after \
             <b>{grace_days}</b> day(s), so please update the key pair wherever required.</p>\n\
             <p>Thanks,<br/>Your Security Team</p>\n\
             </body>\n\
             </html>",
            account = account.display(),
        );

        Self {
            to: email.to_string(),
            display_name: identity.to_string(),
            subject,
            text_body,
            html_body,
        }
    }

    /// Notice that a superseded key pair was deleted
    #[must_use]
    pub fn key_deleted(
        email: &str,
        identity: &str,
        account: &AccountContext,
        deleted_key_id: &str,
    ) -> Self {
        let subject = "Old Access Key Pair Deleted".to_string();

        let text_body = format!(
            "Hey {identity},\n\n\
             An existing access key pair associated with your username has been deleted \
             because it reached end of life.\n\n\
             Account: {account}\n\
             Access Key: {deleted_key_id}\n\n\
             Thanks,\nYour Security Team",
            account = account.display(),
        );

        let html_body = format!(
            "<!DOCTYPE html>\n\
             <html>\n\
             <head><meta charset=\"utf-8\"><title>{subject}</title></head>\n\
             <body style=\"font-family: Helvetica, Arial, sans-serif; font-size: 14px;\">\n\
             <p>Hey {identity},</p>\n\
             <p>An existing access key pair associated with your username has been deleted \
             because it reached end of life.</p>\n\
             <p>Account: <b>{account}</b><br/>\n\
             Access Key: <b>{deleted_key_id}</b></p>\n\
             <p>Thanks,<br/>Your Security Team</p>\n\
             </body>\n\
             </html>",
            account = account.display(),
        );

        Self {
            to: email.to_string(),
            display_name: identity.to_string(),
            subject,
            text_body,
            html_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountContext {
        AccountContext {
            id: "123456789012".to_string(),
            alias: "prod".to_string(),
        }
    }

    #[test]
    fn issued_notice_carries_all_context() {
        let msg = Message::key_issued(
            "alice@example.com",
            "alice",
            &account(),
            "AKIANEW",
            "SECRETVALUE",
            "Update the CI secret.",
            "AKIAOLD",
            5,
        );

        assert_eq!(msg.to, "alice@example.com");
        assert_eq!(msg.display_name, "alice");
        for body in [&msg.text_body, &msg.html_body] {
            assert!(body.contains("123456789012 (prod)"));
            assert!(body.contains("AKIANEW"));
            assert!(body.contains("SECRETVALUE"));
            assert!(body.contains("Update the CI secret."));
            assert!(body.contains("AKIAOLD"));
            assert!(body.contains('5'));
        }
    }

    #[test]
    fn deleted_notice_names_the_key() {
        let msg = Message::key_deleted("bob@example.com", "bob", &account(), "AKIAGONE");
        assert_eq!(msg.subject, "Old Access Key Pair Deleted");
        assert!(msg.text_body.contains("AKIAGONE"));
        assert!(msg.html_body.contains("AKIAGONE"));
    }

    #[test]
    fn account_without_alias_shows_bare_id() {
        let account = AccountContext {
            id: "123456789012".to_string(),
            alias: String::new(),
        };
        let msg = Message::key_deleted("bob@example.com", "bob", &account, "AKIAGONE");
        assert!(msg.text_body.contains("Account: 123456789012\n"));
        assert!(!msg.text_body.contains('('));
    }
}
