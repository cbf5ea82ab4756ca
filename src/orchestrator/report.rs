//! Per-repository outcomes and the aggregate run report.

use chrono::{DateTime, Utc};

use crate::errors::RotationError;
use crate::state::RunSummary;

#[derive(Debug)]
pub enum RotationOutcome {
    /// The ownership file already matched; nothing was written.
    Unchanged,
    /// The ownership file was (or, in a dry run, would be) rewritten.
    Updated { dry_run: bool },
    Failed(RotationError),
}

impl RotationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RotationOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RotationOutcome::Unchanged => "unchanged",
            RotationOutcome::Updated { dry_run: true } => "would update",
            RotationOutcome::Updated { dry_run: false } => "updated",
            RotationOutcome::Failed(_) => "failed",
        }
    }
}

/// What happened to one repository.
#[derive(Debug)]
pub struct RepositoryReport {
    pub repository: String,
    /// Branch the ownership file lives on, once resolved.
    pub branch: Option<String>,
    /// Ownership file path, once discovered.
    pub path: Option<String>,
    /// Reviewers assigned by this run (empty if the run failed early).
    pub selected: Vec<String>,
    pub outcome: RotationOutcome,
    /// `-`/`+` line diff of the ownership file.
    pub diff: Vec<String>,
}

impl RepositoryReport {
    /// A report with nothing resolved yet.
    pub fn new(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            branch: None,
            path: None,
            selected: Vec::new(),
            outcome: RotationOutcome::Unchanged,
            diff: Vec::new(),
        }
    }
}

/// Outcomes for every configured repository, in processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub repositories: Vec<RepositoryReport>,
}

impl RunReport {
    /// True when no repository failed.
    pub fn is_success(&self) -> bool {
        !self.repositories.iter().any(|r| r.outcome.is_failed())
    }

    pub fn updated(&self) -> impl Iterator<Item = &RepositoryReport> {
        self.repositories
            .iter()
            .filter(|r| matches!(r.outcome, RotationOutcome::Updated { .. }))
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &RepositoryReport> {
        self.repositories
            .iter()
            .filter(|r| matches!(r.outcome, RotationOutcome::Unchanged))
    }

    pub fn failed(&self) -> impl Iterator<Item = &RepositoryReport> {
        self.repositories.iter().filter(|r| r.outcome.is_failed())
    }

    pub fn summary(&self, timestamp: DateTime<Utc>) -> RunSummary {
        RunSummary {
            timestamp,
            updated: names(self.updated()),
            unchanged: names(self.unchanged()),
            failed: names(self.failed()),
        }
    }
}

fn names<'a>(reports: impl Iterator<Item = &'a RepositoryReport>) -> Vec<String> {
    reports.map(|r| r.repository.clone()).collect()
}
