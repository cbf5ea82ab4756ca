use tracing::{error, info, warn};

use super::report::{RepositoryReport, RotationOutcome, RunReport};
use super::{RunOptions, rotation_epoch};
use crate::codeowners::{self, line_diff, rules_for};
use crate::config::RotatorConfig;
use crate::errors::{ConfigError, RotationError};
use crate::host::{SourceHost, find_ownership_file};
use crate::selector::{ReviewerPool, select};
use crate::state::{RotationState, StateStore};

/// The rotation-relevant slice of the configuration.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub slots: usize,
    pub interval_days: u32,
    pub paths: Vec<String>,
    pub codeowners_paths: Vec<String>,
    pub commit_message: String,
}

impl RotationSettings {
    pub fn from_config(config: &RotatorConfig) -> Self {
        Self {
            slots: config.num_reviewers,
            interval_days: config.rotation.interval_days,
            paths: config.rotation.paths.clone(),
            codeowners_paths: config.rotation.codeowners_paths.clone(),
            commit_message: config.rotation.commit_message.clone(),
        }
    }
}

pub struct Orchestrator<'a> {
    pool: ReviewerPool,
    settings: RotationSettings,
    host: &'a dyn SourceHost,
    store: StateStore,
}

impl<'a> Orchestrator<'a> {
    /// Fails with a configuration error, before anything is read or written,
    /// when the slot count cannot be satisfied by the pool.
    pub fn new(
        pool: ReviewerPool,
        settings: RotationSettings,
        host: &'a dyn SourceHost,
        store: StateStore,
    ) -> Result<Self, ConfigError> {
        pool.check_slots(settings.slots)?;
        Ok(Self {
            pool,
            settings,
            host,
            store,
        })
    }

    pub fn from_config(
        config: &RotatorConfig,
        host: &'a dyn SourceHost,
        store: StateStore,
    ) -> Result<Self, ConfigError> {
        Self::new(
            config.pool()?,
            RotationSettings::from_config(config),
            host,
            store,
        )
    }

    /// Rotate every repository in order. One repository failing never stops
    /// the others. After a real run the summary is stored next to the state.
    pub async fn run(&self, repositories: &[String], opts: RunOptions) -> RunReport {
        let mut report = RunReport::default();
        for repository in repositories {
            report.repositories.push(self.rotate(repository, opts).await);
        }

        if !opts.dry_run {
            let summary = report.summary(opts.now);
            if let Err(e) = self.store.put_run_summary(&summary).await {
                warn!(error = %e, "Failed to save run summary");
            }
        }
        report
    }

    pub async fn rotate(&self, repository: &str, opts: RunOptions) -> RepositoryReport {
        let mut report = RepositoryReport::new(repository);

        let result = self.try_rotate(repository, opts, &mut report).await;
        report.outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(repository, kind = e.kind(), error = %e, "Rotation failed");
                RotationOutcome::Failed(e)
            }
        };
        report
    }

    async fn try_rotate(
        &self,
        repository: &str,
        opts: RunOptions,
        report: &mut RepositoryReport,
    ) -> Result<RotationOutcome, RotationError> {
        let branch = self.host.resolve_default_branch(repository).await?;
        report.branch = Some(branch.clone());

        let (path, current) = find_ownership_file(
            self.host,
            repository,
            &branch,
            &self.settings.codeowners_paths,
        )
        .await?;
        report.path = Some(path.clone());

        let prior = self
            .store
            .get_state(repository)
            .await?
            .unwrap_or_else(|| RotationState::empty(repository));

        let epoch = rotation_epoch(opts.now, self.settings.interval_days);
        let next = if self.should_advance(&prior, epoch, opts.force) {
            let selection = select(&self.pool, self.settings.slots, &prior)?;
            Some(prior.advanced(&selection, epoch, opts.now))
        } else {
            None
        };
        let selected = next
            .as_ref()
            .map_or(&prior.last_selected, |state| &state.last_selected)
            .clone();
        report.selected = selected.clone();

        let rules = rules_for(&self.settings.paths, &selected);
        let rendered = codeowners::render(current.as_deref(), &rules)?;
        let file_changed = current.as_deref() != Some(rendered.as_str());
        if file_changed {
            report.diff = line_diff(current.as_deref().unwrap_or(""), &rendered);
        }

        // The file already carries a selection the state never recorded: an
        // earlier run wrote the file and then failed to save state.
        let drifted = next.is_some() && !file_changed && selected != prior.last_selected;

        if opts.dry_run {
            if drifted {
                return Err(RotationError::StateDrift {
                    repository: repository.to_string(),
                    selected,
                });
            }
            info!(
                repository,
                branch = %branch,
                path = %path,
                changed = file_changed,
                "Dry run, nothing written"
            );
            return Ok(if file_changed {
                RotationOutcome::Updated { dry_run: true }
            } else {
                RotationOutcome::Unchanged
            });
        }

        if file_changed {
            self.host
                .put_file(
                    repository,
                    &path,
                    &branch,
                    &rendered,
                    &self.settings.commit_message,
                )
                .await?;
            info!(
                repository,
                branch = %branch,
                path = %path,
                reviewers = %selected.join(", "),
                "Updated ownership file"
            );
        }

        if let Some(state) = &next {
            self.store.put_state(repository, state).await?;
        }

        if drifted {
            warn!(
                repository,
                selected = %selected.join(", "),
                "Committed state recovered from the ownership file"
            );
            return Err(RotationError::StateDrift {
                repository: repository.to_string(),
                selected,
            });
        }

        Ok(if file_changed {
            RotationOutcome::Updated { dry_run: false }
        } else {
            RotationOutcome::Unchanged
        })
    }

    fn should_advance(&self, prior: &RotationState, epoch: i64, force: bool) -> bool {
        force || prior.is_fresh() || prior.epoch != epoch || !self.is_current(&prior.last_selected)
    }

    /// Whether a stored selection still fits the configured pool and slot count.
    fn is_current(&self, selected: &[String]) -> bool {
        selected.len() == self.settings.slots
            && selected.iter().all(|r| self.pool.contains(r))
            && selected
                .iter()
                .enumerate()
                .all(|(i, r)| !selected[..i].contains(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::state::MemoryBlobStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    const REPO: &str = "group/app";

    fn settings(slots: usize) -> RotationSettings {
        RotationSettings {
            slots,
            interval_days: 1,
            paths: vec!["*".to_string()],
            codeowners_paths: vec!["CODEOWNERS".to_string(), ".gitlab/CODEOWNERS".to_string()],
            commit_message: "rotate reviewers".to_string(),
        }
    }

    fn pool(names: &[&str]) -> ReviewerPool {
        ReviewerPool::new(names.iter().copied()).unwrap()
    }

    fn opts(day: u32) -> RunOptions {
        RunOptions::at(Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_new_rejects_more_slots_than_reviewers() {
        let host = MemoryHost::new();
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let err = Orchestrator::new(pool(&["a", "b"]), settings(3), &host, store)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::InvalidSlotCount {
                slots: 3,
                pool_size: 2
            }
        );
    }

    #[tokio::test]
    async fn test_first_rotation_creates_file_and_state() {
        let host = MemoryHost::new();
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let orch = Orchestrator::new(pool(&["a", "b", "c"]), settings(2), &host, store.clone())
            .unwrap();

        let report = orch.rotate(REPO, opts(2)).await;
        assert!(matches!(
            report.outcome,
            RotationOutcome::Updated { dry_run: false }
        ));
        assert_eq!(report.selected, vec!["a", "b"]);
        assert_eq!(report.path.as_deref(), Some("CODEOWNERS"));

        let file = host.file(REPO, "CODEOWNERS", "main").unwrap();
        assert!(file.contains("* @a @b"));
        let state = store.get_state(REPO).await.unwrap().unwrap();
        assert_eq!(state.last_selected, vec!["a", "b"]);
        assert_eq!(state.pending, vec!["c"]);
    }

    #[tokio::test]
    async fn test_existing_file_location_is_reused() {
        let host = MemoryHost::new();
        host.set_default_branch(REPO, "develop");
        host.insert_file(REPO, ".gitlab/CODEOWNERS", "develop", "/docs/ @writer\n");
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let orch = Orchestrator::new(pool(&["a", "b"]), settings(1), &host, store).unwrap();

        let report = orch.rotate(REPO, opts(2)).await;
        assert_eq!(report.branch.as_deref(), Some("develop"));
        assert_eq!(report.path.as_deref(), Some(".gitlab/CODEOWNERS"));
        let writes = host.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].path, ".gitlab/CODEOWNERS");
        assert_eq!(writes[0].commit_message, "rotate reviewers");
        assert!(writes[0].content.ends_with("/docs/ @writer\n"));
    }

    #[tokio::test]
    async fn test_force_advances_within_epoch() {
        let host = MemoryHost::new();
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let orch = Orchestrator::new(pool(&["a", "b", "c", "d"]), settings(2), &host, store)
            .unwrap();

        orch.rotate(REPO, opts(2)).await;
        let same_day = orch.rotate(REPO, opts(2)).await;
        assert!(matches!(same_day.outcome, RotationOutcome::Unchanged));
        assert_eq!(same_day.selected, vec!["a", "b"]);

        let forced = orch
            .rotate(
                REPO,
                RunOptions {
                    force: true,
                    ..opts(2)
                },
            )
            .await;
        assert_eq!(forced.selected, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_slot_change_advances_within_epoch() {
        let host = MemoryHost::new();
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        Orchestrator::new(pool(&["a", "b", "c"]), settings(2), &host, store.clone())
            .unwrap()
            .rotate(REPO, opts(2))
            .await;

        let report = Orchestrator::new(pool(&["a", "b", "c"]), settings(1), &host, store)
            .unwrap()
            .rotate(REPO, opts(2))
            .await;
        assert_eq!(report.selected, vec!["c"]);
    }

    #[tokio::test]
    async fn test_host_failure_is_reported_not_raised() {
        let host = MemoryHost::new();
        host.fail_reads("group/broken");
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let orch = Orchestrator::new(pool(&["a", "b"]), settings(1), &host, store).unwrap();

        let run = orch
            .run(&["group/broken".to_string(), REPO.to_string()], opts(2))
            .await;
        assert!(!run.is_success());
        assert_eq!(run.repositories.len(), 2);
        assert!(matches!(
            run.repositories[0].outcome,
            RotationOutcome::Failed(RotationError::Host(_))
        ));
        assert!(matches!(
            run.repositories[1].outcome,
            RotationOutcome::Updated { .. }
        ));
    }

    #[tokio::test]
    async fn test_run_records_summary_unless_dry_run() {
        let host = MemoryHost::new();
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let orch =
            Orchestrator::new(pool(&["a", "b"]), settings(1), &host, store.clone()).unwrap();
        let repos = vec![REPO.to_string()];

        orch.run(
            &repos,
            RunOptions {
                dry_run: true,
                ..opts(2)
            },
        )
        .await;
        assert!(store.get_run_summary().await.unwrap().is_none());

        orch.run(&repos, opts(2)).await;
        let summary = store.get_run_summary().await.unwrap().unwrap();
        assert_eq!(summary.updated, vec![REPO]);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn test_summary_write_failure_does_not_fail_run() {
        let host = MemoryHost::new();
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = StateStore::new(blobs.clone());
        let orch = Orchestrator::new(pool(&["a", "b"]), settings(1), &host, store).unwrap();

        orch.run(&[REPO.to_string()], opts(2)).await;
        blobs.fail_writes(true);
        // Same epoch: nothing to write except the summary, which fails quietly.
        let run = orch.run(&[REPO.to_string()], opts(2)).await;
        assert!(run.is_success());
    }
}
