//! End-to-end rotation scenarios against in-memory collaborators.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use codeowners_rotator::codeowners::managed_owners;
use codeowners_rotator::errors::RotationError;
use codeowners_rotator::host::MemoryHost;
use codeowners_rotator::orchestrator::{
    Orchestrator, RepositoryReport, RotationOutcome, RotationSettings, RunOptions,
};
use codeowners_rotator::selector::ReviewerPool;
use codeowners_rotator::state::{MemoryBlobStore, StateStore};

const REPO: &str = "platform/api";

struct Harness {
    host: MemoryHost,
    blobs: Arc<MemoryBlobStore>,
    store: StateStore,
}

impl Harness {
    fn new() -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        Self {
            host: MemoryHost::new(),
            store: StateStore::new(blobs.clone()),
            blobs,
        }
    }

    fn orchestrator(&self, reviewers: &[&str], slots: usize) -> Orchestrator<'_> {
        let pool = ReviewerPool::new(reviewers.iter().copied()).unwrap();
        let settings = RotationSettings {
            slots,
            interval_days: 1,
            paths: vec!["*".to_string()],
            codeowners_paths: vec!["CODEOWNERS".to_string()],
            commit_message: "chore: rotate reviewers".to_string(),
        };
        Orchestrator::new(pool, settings, &self.host, self.store.clone()).unwrap()
    }

    fn owners(&self, repo: &str) -> Vec<String> {
        let file = self.host.file(repo, "CODEOWNERS", "main").unwrap();
        managed_owners(&file).unwrap()
    }
}

fn day(d: u32) -> RunOptions {
    RunOptions::at(Utc.with_ymd_and_hms(2026, 4, d, 6, 0, 0).unwrap())
}

fn dry(d: u32) -> RunOptions {
    RunOptions {
        dry_run: true,
        ..day(d)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn assert_updated(report: &RepositoryReport) {
    assert!(
        matches!(report.outcome, RotationOutcome::Updated { dry_run: false }),
        "expected updated, got {:?}",
        report.outcome
    );
}

#[tokio::test]
async fn four_reviewers_two_slots_alternate_pairs() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);

    let first = orch.rotate(REPO, day(1)).await;
    assert_updated(&first);
    assert_eq!(first.selected, names(&["a", "b"]));
    assert_eq!(h.owners(REPO), names(&["a", "b"]));

    let second = orch.rotate(REPO, day(2)).await;
    assert_updated(&second);
    assert_eq!(second.selected, names(&["c", "d"]));

    let third = orch.rotate(REPO, day(3)).await;
    assert_updated(&third);
    assert_eq!(third.selected, names(&["a", "b"]));

    let state = h.store.get_state(REPO).await.unwrap().unwrap();
    assert_eq!(state.cycle, 2);
}

#[tokio::test]
async fn everyone_reviews_once_before_anyone_twice() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d", "e"], 2);

    let mut drawn = Vec::new();
    for d in 1..=5 {
        drawn.extend(orch.rotate(REPO, day(d)).await.selected);
    }
    // Five reviewers, ten draws: two full passes in pool order.
    assert_eq!(
        drawn,
        names(&["a", "b", "c", "d", "e", "a", "b", "c", "d", "e"])
    );
}

#[tokio::test]
async fn second_rotation_in_same_interval_is_unchanged() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);

    assert_updated(&orch.rotate(REPO, day(1)).await);
    let file_writes = h.host.writes().len();
    let state_writes = h.blobs.write_count();

    let again = orch.rotate(REPO, day(1)).await;
    assert!(matches!(again.outcome, RotationOutcome::Unchanged));
    assert_eq!(again.selected, names(&["a", "b"]));
    assert_eq!(h.host.writes().len(), file_writes);
    assert_eq!(h.blobs.write_count(), state_writes);
}

#[tokio::test]
async fn manual_edit_inside_section_is_repaired_within_interval() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c"], 1);
    orch.rotate(REPO, day(1)).await;

    let tampered = h
        .host
        .file(REPO, "CODEOWNERS", "main")
        .unwrap()
        .replace("* @a", "* @mallory");
    h.host.insert_file(REPO, "CODEOWNERS", "main", &tampered);

    let repaired = orch.rotate(REPO, day(1)).await;
    assert_updated(&repaired);
    assert_eq!(h.owners(REPO), names(&["a"]));
}

#[tokio::test]
async fn lines_outside_managed_section_are_preserved() {
    let h = Harness::new();
    let manual = "# Owned by humans\n/docs/ @writers\n\n[Database] @dba-team\n/db/ @dba\n";
    h.host.insert_file(REPO, "CODEOWNERS", "main", manual);
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);

    orch.rotate(REPO, day(1)).await;
    orch.rotate(REPO, day(2)).await;

    let file = h.host.file(REPO, "CODEOWNERS", "main").unwrap();
    assert!(file.ends_with(&format!("\n{}", manual)));
    assert_eq!(h.owners(REPO), names(&["c", "d"]));
}

#[tokio::test]
async fn dry_run_reports_diff_without_writing() {
    let h = Harness::new();
    h.host
        .insert_file(REPO, "CODEOWNERS", "main", "/docs/ @writers\n");
    let orch = h.orchestrator(&["a", "b", "c"], 2);

    let report = orch.rotate(REPO, dry(1)).await;
    assert!(matches!(
        report.outcome,
        RotationOutcome::Updated { dry_run: true }
    ));
    assert!(report.diff.contains(&"+* @a @b".to_string()));
    assert!(h.host.writes().is_empty());
    assert_eq!(h.blobs.write_count(), 0);
    assert!(h.store.get_state(REPO).await.unwrap().is_none());
}

#[tokio::test]
async fn dry_run_predicts_the_real_run() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);
    orch.rotate(REPO, day(1)).await;

    let predicted = orch.rotate(REPO, dry(2)).await;
    let actual = orch.rotate(REPO, day(2)).await;
    assert_eq!(predicted.selected, actual.selected);
    assert_eq!(predicted.diff, actual.diff);
}

#[tokio::test]
async fn removed_reviewer_is_never_selected() {
    let h = Harness::new();
    h.orchestrator(&["a", "b", "c", "d"], 2)
        .rotate(REPO, day(1))
        .await;

    // c leaves while still pending.
    let orch = h.orchestrator(&["a", "b", "d"], 2);
    let report = orch.rotate(REPO, day(2)).await;
    assert_updated(&report);
    assert_eq!(report.selected, names(&["d", "a"]));
    for d in 3..=6 {
        let report = orch.rotate(REPO, day(d)).await;
        assert!(!report.selected.contains(&"c".to_string()));
    }
}

#[tokio::test]
async fn removing_a_current_reviewer_rotates_immediately() {
    let h = Harness::new();
    h.orchestrator(&["a", "b", "c", "d"], 2)
        .rotate(REPO, day(1))
        .await;

    let report = h
        .orchestrator(&["b", "c", "d"], 2)
        .rotate(REPO, day(1))
        .await;
    assert_updated(&report);
    assert_eq!(report.selected, names(&["c", "d"]));
    assert!(!h.owners(REPO).contains(&"a".to_string()));
}

#[tokio::test]
async fn newcomer_joins_the_current_cycle() {
    let h = Harness::new();
    h.orchestrator(&["a", "b", "c"], 2)
        .rotate(REPO, day(1))
        .await;

    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);
    assert_eq!(orch.rotate(REPO, day(2)).await.selected, names(&["c", "d"]));
    assert_eq!(orch.rotate(REPO, day(3)).await.selected, names(&["a", "b"]));
}

#[tokio::test]
async fn slots_equal_to_pool_stay_unchanged_across_intervals() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b"], 2);

    assert_updated(&orch.rotate(REPO, day(1)).await);
    let next = orch.rotate(REPO, day(2)).await;
    assert!(matches!(next.outcome, RotationOutcome::Unchanged));
    assert_eq!(next.selected, names(&["a", "b"]));
}

#[tokio::test]
async fn failed_file_write_leaves_state_untouched() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);
    orch.rotate(REPO, day(1)).await;
    let before = h.store.get_state(REPO).await.unwrap();
    let state_writes = h.blobs.write_count();

    h.host.fail_writes(REPO);
    let failed = orch.rotate(REPO, day(2)).await;
    assert!(matches!(
        failed.outcome,
        RotationOutcome::Failed(RotationError::Host(_))
    ));
    assert_eq!(h.store.get_state(REPO).await.unwrap(), before);
    assert_eq!(h.blobs.write_count(), state_writes);

    h.host.heal(REPO);
    let retried = orch.rotate(REPO, day(2)).await;
    assert_updated(&retried);
    assert_eq!(retried.selected, names(&["c", "d"]));
}

#[tokio::test]
async fn failed_state_write_is_surfaced_then_recovered() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);
    orch.rotate(REPO, day(1)).await;

    h.blobs.fail_writes(true);
    let failed = orch.rotate(REPO, day(2)).await;
    assert!(matches!(
        failed.outcome,
        RotationOutcome::Failed(RotationError::State(_))
    ));
    // The file was written before the state write failed.
    assert_eq!(h.owners(REPO), names(&["c", "d"]));
    h.blobs.fail_writes(false);

    let file_writes = h.host.writes().len();
    let next = orch.rotate(REPO, day(2)).await;
    match &next.outcome {
        RotationOutcome::Failed(RotationError::StateDrift { selected, .. }) => {
            assert_eq!(selected, &names(&["c", "d"]));
        }
        other => panic!("expected state drift, got {:?}", other),
    }
    assert_eq!(h.host.writes().len(), file_writes);

    let state = h.store.get_state(REPO).await.unwrap().unwrap();
    assert_eq!(state.last_selected, names(&["c", "d"]));

    let clean = orch.rotate(REPO, day(2)).await;
    assert!(matches!(clean.outcome, RotationOutcome::Unchanged));

    // Fairness is intact: the next interval returns to a and b.
    assert_eq!(orch.rotate(REPO, day(3)).await.selected, names(&["a", "b"]));
}

#[tokio::test]
async fn dry_run_surfaces_state_left_behind_by_failed_write() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);
    orch.rotate(REPO, day(1)).await;

    h.blobs.fail_writes(true);
    orch.rotate(REPO, day(2)).await;
    h.blobs.fail_writes(false);

    let file_writes = h.host.writes().len();
    let state_writes = h.blobs.write_count();
    let before = h.store.get_state(REPO).await.unwrap();

    let predicted = orch.rotate(REPO, dry(3)).await;
    match &predicted.outcome {
        RotationOutcome::Failed(RotationError::StateDrift { selected, .. }) => {
            assert_eq!(selected, &names(&["c", "d"]));
        }
        other => panic!("expected state drift, got {:?}", other),
    }
    assert_eq!(h.host.writes().len(), file_writes);
    assert_eq!(h.blobs.write_count(), state_writes);
    assert_eq!(h.store.get_state(REPO).await.unwrap(), before);

    let actual = orch.rotate(REPO, day(3)).await;
    assert!(matches!(
        actual.outcome,
        RotationOutcome::Failed(RotationError::StateDrift { .. })
    ));
    assert_eq!(predicted.selected, actual.selected);
}

#[tokio::test]
async fn repositories_rotate_independently() {
    let h = Harness::new();
    let orch = h.orchestrator(&["a", "b", "c", "d"], 2);
    h.host.fail_reads("platform/broken");

    let repos = names(&["platform/broken", "platform/api", "platform/web"]);
    let run = orch.run(&repos, day(1)).await;
    assert!(!run.is_success());
    assert_eq!(run.failed().count(), 1);
    assert_eq!(run.updated().count(), 2);

    // Each repository keeps its own cycle.
    orch.rotate("platform/api", day(2)).await;
    assert_eq!(h.owners("platform/api"), names(&["c", "d"]));
    assert_eq!(h.owners("platform/web"), names(&["a", "b"]));

    let summary = h.store.get_run_summary().await.unwrap().unwrap();
    assert_eq!(summary.failed, names(&["platform/broken"]));
}

#[tokio::test]
async fn invalid_slot_count_aborts_before_any_io() {
    let h = Harness::new();
    let pool = ReviewerPool::new(["a", "b"]).unwrap();
    let settings = RotationSettings {
        slots: 0,
        interval_days: 1,
        paths: vec!["*".to_string()],
        codeowners_paths: vec!["CODEOWNERS".to_string()],
        commit_message: "rotate".to_string(),
    };
    assert!(Orchestrator::new(pool, settings, &h.host, h.store.clone()).is_err());
    assert!(h.host.writes().is_empty());
    assert_eq!(h.blobs.write_count(), 0);
}
