//! Command implementations.

mod report;
mod run;
mod status;

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::report::Report;

pub(super) use report::cmd_report;
pub(super) use run::cmd_run;
pub(super) use status::cmd_status;

/// Write the extracted modules to `path` as JSON.
fn write_json(report: &Report, path: &Path) -> anyhow::Result<()> {
    let json = report.to_json().context("Failed to serialize modules")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!(
        "{} Wrote modules to {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

/// Print extraction failures and module counts to stderr.
fn print_extraction_summary(report: &Report) {
    let modules: Vec<_> = report
        .entries()
        .iter()
        .filter_map(|e| e.record.as_ref().ok())
        .collect();
    let lessons: usize = modules.iter().map(|m| m.lesson_count()).sum();

    for (url, err) in report.failures() {
        eprintln!("  {} {}: {}", style("✗").red(), url, err);
    }
    eprintln!(
        "{} Extracted {} modules ({} lessons)",
        style("✓").green(),
        modules.len(),
        lessons
    );
}
