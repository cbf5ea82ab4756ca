//! Human-readable summaries printed to stdout.

use std::fmt::Write;

use console::style;

use super::icons::{CHANNEL, CHECK, CROSS, DRY_RUN, FILE_MOD, MESSAGE, ROTATE, UNCHANGED, WARNING};
use crate::notify::DispatchReport;
use crate::orchestrator::{RotationOutcome, RunReport};
use crate::state::{RotationState, RunSummary};

pub fn format_run_report(report: &RunReport, dry_run: bool) -> String {
    let mut out = String::new();
    let title = if dry_run {
        "Reviewer Rotation (dry run)"
    } else {
        "Reviewer Rotation"
    };
    let _ = writeln!(out, "{}{}", ROTATE, style(title).bold().cyan());
    let _ = writeln!(out);

    for repo in &report.repositories {
        let icon = match &repo.outcome {
            RotationOutcome::Unchanged => UNCHANGED,
            RotationOutcome::Updated { dry_run: true } => DRY_RUN,
            RotationOutcome::Updated { dry_run: false } => CHECK,
            RotationOutcome::Failed(_) => CROSS,
        };
        let _ = write!(
            out,
            "{}{} {}",
            icon,
            style(&repo.repository).bold(),
            style(repo.outcome.label()).dim()
        );
        if !repo.selected.is_empty() {
            let _ = write!(out, " -> {}", repo.selected.join(", "));
        }
        let _ = writeln!(out);

        if let (Some(path), Some(branch)) = (&repo.path, &repo.branch) {
            let _ = writeln!(out, "   {}{}@{}", FILE_MOD, path, branch);
        }
        if let RotationOutcome::Failed(e) = &repo.outcome {
            let _ = writeln!(
                out,
                "   {} {}",
                style(format!("{}:", e.kind())).red().bold(),
                e
            );
        }
        if dry_run {
            for line in &repo.diff {
                let styled = if line.starts_with('+') {
                    style(line).green()
                } else {
                    style(line).red()
                };
                let _ = writeln!(out, "   {}", styled);
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} updated, {} unchanged, {} failed",
        report.updated().count(),
        report.unchanged().count(),
        report.failed().count()
    );
    out
}

pub fn print_run_report(report: &RunReport, dry_run: bool) {
    print!("{}", format_run_report(report, dry_run));
}

pub fn format_dispatch_report(report: &DispatchReport) -> String {
    let mut out = String::new();
    for owner in &report.direct {
        let _ = writeln!(out, "{}{}", MESSAGE, owner);
    }
    for owner in &report.failed_direct {
        let _ = writeln!(
            out,
            "{}{} {}",
            WARNING,
            owner,
            style("direct message failed").yellow()
        );
    }
    if let Some(channel) = &report.fallback_channel {
        let who = if report.via_fallback.is_empty() {
            "no reviewers found".to_string()
        } else {
            report.via_fallback.join(", ")
        };
        let _ = writeln!(out, "{}{} ({})", CHANNEL, channel, who);
    }
    out
}

pub fn print_dispatch_report(report: &DispatchReport) {
    print!("{}", format_dispatch_report(report));
}

pub fn format_state(state: &RotationState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style(&state.repository).bold());
    let _ = writeln!(out, "  last selected: {}", or_none(&state.last_selected));
    let _ = writeln!(out, "  pending:       {}", or_none(&state.pending));
    let _ = writeln!(out, "  known pool:    {}", or_none(&state.known_pool));
    let _ = writeln!(out, "  cycle:         {}", state.cycle);
    let _ = writeln!(out, "  epoch:         {}", state.epoch);
    let _ = writeln!(out, "  updated at:    {}", state.updated_at.to_rfc3339());
    out
}

pub fn print_state(state: &RotationState) {
    print!("{}", format_state(state));
}

pub fn format_run_summary(summary: &RunSummary) -> String {
    format!(
        "Last run {}: updated [{}], unchanged [{}], failed [{}]\n",
        summary.timestamp.to_rfc3339(),
        summary.updated.join(", "),
        summary.unchanged.join(", "),
        summary.failed.join(", ")
    )
}

fn or_none(list: &[String]) -> String {
    if list.is_empty() {
        "(none)".to_string()
    } else {
        list.join(", ")
    }
}
