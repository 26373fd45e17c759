//! keywheel command-line entrypoint
//!
//! One binary, two triggered phases: `rotate` runs the creator pipeline end
//! to end, `sweep` runs the destructor over a batch of change events. The
//! `decrypt` and `tag` helpers cover the owner-side and operator-side chores
//! around them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use tracing_subscriber::EnvFilter;

use keywheel::config::Config;
use keywheel::core::ChangeEvent;
use keywheel::destructor::DestructionHandler;
use keywheel::encryption::{Encryptor, SecretCipher};
use keywheel::issuer::CredentialIssuer;
use keywheel::notify::{AccountContext, build_mailer};
use keywheel::planner::RotationPlanner;
use keywheel::providers::{DynamoDeletionStore, IamIdentityProvider, SsmSecretStore};
use keywheel::scan::IdentityScan;
use keywheel::traits::{IdentityProvider, SecretStore};

/// Worker-pool width for the tagging helper, which runs without a full
/// service configuration
const TAG_POOL_SIZE: usize = 10;

#[derive(Parser)]
#[command(name = "keywheel", version, about = "Access-key rotation with deferred deletion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rotate stale access keys: discover identities, issue replacements,
    /// schedule the old keys for deletion
    Rotate,

    /// Process a batch of record-store change events (JSON array of
    /// {kind, old_image} objects) and delete the expired keys
    Sweep {
        /// Path to the change-event batch
        #[arg(long)]
        events: PathBuf,
    },

    /// Decrypt a token from a rotation notice using the identity's stored
    /// encryption key
    Decrypt {
        /// Base64 key material from the secret store
        #[arg(long)]
        key: String,
        /// Base64 token from the notice
        #[arg(long)]
        token: String,
    },

    /// Bulk-apply tags to identities from a JSON map
    /// (identity -> {tag: value})
    Tag {
        /// Path to the tag map
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Rotate => rotate().await,
        Command::Sweep { events } => sweep(&events).await,
        Command::Decrypt { key, token } => decrypt(&key, &token),
        Command::Tag { file } => tag(&file).await,
    }
}

/// Build the shared SDK config with the configured operation timeout
async fn load_aws(config: &Config) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .timeout_config(
            aws_config::timeout::TimeoutConfig::builder()
                .operation_timeout(config.http_timeout)
                .build(),
        )
        .load()
        .await
}

/// Account context for notification bodies; the alias lookup is best-effort
async fn account_context(config: &Config, provider: &dyn IdentityProvider) -> AccountContext {
    let alias = match provider.account_alias().await {
        Ok(alias) => alias,
        Err(e) => {
            tracing::warn!(error = %e, "Could not resolve account alias");
            String::new()
        }
    };
    AccountContext {
        id: config.account_id.clone(),
        alias,
    }
}

async fn rotate() -> Result<()> {
    let config = Config::from_env()?;
    let aws = load_aws(&config).await;

    let provider = Arc::new(IamIdentityProvider::new(&aws));
    let store = Arc::new(DynamoDeletionStore::new(&aws, config.table.clone()));
    let secrets: Arc<dyn SecretStore> = Arc::new(SsmSecretStore::new(&aws));
    let mailer = build_mailer(&config, &aws, secrets.clone());
    let account = account_context(&config, provider.as_ref()).await;

    let identities = IdentityScan::new(provider.clone(), config.pool_size)
        .run()
        .await?;
    let tasks = RotationPlanner::new(config.rotate_after_days).plan(identities);
    tracing::info!(due = tasks.len(), "Rotation plan ready");

    let issuer = CredentialIssuer::new(
        provider,
        store,
        mailer,
        config
            .encrypt_key_pair
            .then(|| Encryptor::new(secrets.clone())),
        account,
        config.delete_after_days,
        config.pool_size,
    );

    let report = issuer.issue_all(tasks).await?;
    tracing::info!(
        attempted = report.attempted,
        issued = report.issued,
        failed = report.failed,
        "Rotation run complete"
    );

    if report.failed > 0 {
        bail!("{} of {} issuances failed", report.failed, report.attempted);
    }
    Ok(())
}

async fn sweep(events_path: &Path) -> Result<()> {
    let config = Config::from_env()?;
    let aws = load_aws(&config).await;

    let raw = std::fs::read_to_string(events_path)
        .with_context(|| format!("reading change events from {}", events_path.display()))?;
    let events: Vec<ChangeEvent> =
        serde_json::from_str(&raw).context("parsing change-event batch")?;

    let provider = Arc::new(IamIdentityProvider::new(&aws));
    let store = Arc::new(DynamoDeletionStore::new(&aws, config.table.clone()));
    let secrets: Arc<dyn SecretStore> = Arc::new(SsmSecretStore::new(&aws));
    let mailer = build_mailer(&config, &aws, secrets.clone());
    let account = account_context(&config, provider.as_ref()).await;

    let handler = DestructionHandler::new(
        provider,
        store,
        Encryptor::new(secrets),
        mailer,
        account,
        config.retry_after_mins,
        config.pool_size,
    );

    let report = handler.handle_batch(events).await;
    tracing::info!(
        processed = report.processed,
        deleted = report.deleted,
        requeued = report.requeued,
        skipped = report.skipped,
        failed = report.failed,
        "Sweep complete"
    );

    if report.failed > 0 {
        bail!("{} of {} events failed", report.failed, report.processed);
    }
    Ok(())
}

fn decrypt(key: &str, token: &str) -> Result<()> {
    let cipher = SecretCipher::from_key_material(key).context("reading key material")?;
    let plaintext = cipher.decrypt(token).context("decrypting token")?;
    println!("{plaintext}");
    Ok(())
}

async fn tag(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading tag map from {}", file.display()))?;
    let wanted: HashMap<String, HashMap<String, String>> =
        serde_json::from_str(&raw).context("parsing tag map")?;
    if wanted.is_empty() {
        tracing::warn!("Tag map is empty, nothing to do");
        return Ok(());
    }

    let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let provider = Arc::new(IamIdentityProvider::new(&aws));

    let outcomes: Vec<(String, bool)> = stream::iter(wanted)
        .map(|(identity, tags)| {
            let provider = Arc::clone(&provider);
            async move {
                let tags: Vec<(String, String)> = tags.into_iter().collect();
                match provider.tag_identity(&identity, &tags).await {
                    Ok(()) => (identity, true),
                    Err(e) => {
                        tracing::error!(identity = %identity, error = %e, "Failed to tag identity");
                        (identity, false)
                    }
                }
            }
        })
        .buffer_unordered(TAG_POOL_SIZE)
        .collect()
        .await;

    let failed = outcomes.iter().filter(|(_, ok)| !ok).count();
    tracing::info!(
        tagged = outcomes.len() - failed,
        failed,
        "Tagging complete"
    );

    if failed > 0 {
        bail!("{failed} of {} identities failed to tag", outcomes.len());
    }
    Ok(())
}
