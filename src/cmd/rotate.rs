//! Reviewer rotation: `codeowners-rotator rotate`.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};

use codeowners_rotator::config::{RotatorConfig, is_valid_repository};
use codeowners_rotator::host::GitLabHost;
use codeowners_rotator::orchestrator::{Orchestrator, RunOptions};
use codeowners_rotator::state::StateStore;
use codeowners_rotator::ui;

pub async fn cmd_rotate(
    config_path: &Path,
    dry_run: bool,
    force: bool,
    only: &[String],
) -> Result<()> {
    let config = RotatorConfig::load(config_path)?;
    config.validate().context("Invalid configuration")?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let repositories = if only.is_empty() {
        config.repositories.clone()
    } else {
        if let Some(bad) = only.iter().find(|r| !is_valid_repository(r)) {
            bail!("Invalid repository name '{}': expected namespace/name", bad);
        }
        only.to_vec()
    };

    let host = GitLabHost::new(&config.gitlab.url, &config.gitlab.token);
    let store = StateStore::from_config(&config.storage)?;
    info!(
        repositories = repositories.len(),
        reviewers = config.reviewers.len(),
        slots = config.num_reviewers,
        storage = %store.describe(),
        dry_run,
        "Starting rotation"
    );

    let orchestrator = Orchestrator::from_config(&config, &host, store)?;
    let opts = RunOptions {
        dry_run,
        force,
        now: Utc::now(),
    };
    let report = orchestrator.run(&repositories, opts).await;
    ui::print_run_report(&report, dry_run);

    if !report.is_success() {
        bail!(
            "Rotation failed for {} of {} repositories",
            report.failed().count(),
            report.repositories.len()
        );
    }
    Ok(())
}
