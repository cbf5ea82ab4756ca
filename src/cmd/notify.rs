//! Merge request notification: `codeowners-rotator notify`.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::{info, warn};

use codeowners_rotator::config::{RotatorConfig, is_valid_repository};
use codeowners_rotator::host::GitLabHost;
use codeowners_rotator::notify::{
    MergeRequestContext, Notifier, SlackTransport, UserIdentityMap, resolve_owners,
};
use codeowners_rotator::state::StateStore;
use codeowners_rotator::ui;

pub async fn cmd_notify(
    config_path: &Path,
    mr: MergeRequestContext,
    force_notify: bool,
) -> Result<()> {
    let config = RotatorConfig::load(config_path)?;
    config
        .validate_for_notify()
        .context("Invalid configuration")?;
    if !is_valid_repository(&mr.repository) {
        bail!(
            "Invalid repository name '{}': expected namespace/name",
            mr.repository
        );
    }

    let host = GitLabHost::new(&config.gitlab.url, &config.gitlab.token);
    // The state store is only a last resort for finding owners.
    let store = match StateStore::from_config(&config.storage) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "Rotation state unavailable; owners come from the ownership file only");
            None
        }
    };

    let resolved = resolve_owners(
        &host,
        store.as_ref(),
        &mr,
        &config.rotation.codeowners_paths,
    )
    .await?;
    if !resolved.owners.is_empty() {
        info!(
            repository = %mr.repository,
            owners = %resolved.owners.join(", "),
            source = ?resolved.source,
            "Found reviewers"
        );
    }

    let token = config
        .notification
        .slack_token
        .as_deref()
        .context("notification.slack_token is required")?;
    let transport = SlackTransport::new(token);
    let notifier = Notifier::new(
        &transport,
        UserIdentityMap::new(config.notification.user_mapping.clone()),
        config.notification.fallback_channel.clone(),
    );

    let report = notifier
        .notify(&mr, &resolved.owners, force_notify)
        .await
        .with_context(|| format!("Failed to notify reviewers of !{}", mr.id))?;
    ui::print_dispatch_report(&report);
    Ok(())
}
