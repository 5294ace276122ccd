//! Colored CLI output for one-shot commands.

use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use owo_colors::OwoColorize;

use crate::renamer::{RenameError, RenameOutcome};

/// Local timestamp prefix for printed lines.
fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Plain-text summary of a rename outcome.
#[must_use]
pub fn describe_outcome(outcome: &RenameOutcome) -> String {
    match outcome {
        RenameOutcome::Renamed { from, to } => {
            format!("{} -> {}", from.display(), to.display())
        }
        RenameOutcome::Unchanged(path) => format!("{} already has the correct name", path.display()),
        RenameOutcome::Skipped(reason) => format!("skipped ({reason})"),
    }
}

/// Print the outcome of renaming `path`.
pub fn print_outcome(path: &Path, outcome: &RenameOutcome) {
    let label = match outcome {
        RenameOutcome::Renamed { .. } => "[RENAMED]".green().bold().to_string(),
        RenameOutcome::Unchanged(_) => "[UNCHANGED]".dimmed().to_string(),
        RenameOutcome::Skipped(_) => "[SKIPPED]".yellow().bold().to_string(),
    };
    let detail = match outcome {
        RenameOutcome::Skipped(_) => format!("{} {}", path.display(), describe_outcome(outcome)),
        _ => describe_outcome(outcome),
    };
    println!("{} {label} {detail}", timestamp().dimmed());
    let _ = io::stdout().flush();
}

/// Print a rename failure to stderr.
pub fn print_error(path: &Path, error: &RenameError) {
    eprintln!(
        "{} {} {}: {}",
        timestamp().dimmed(),
        "[ERROR]".red().bold(),
        path.display(),
        error
    );
}
