//! Formatting check for changed files.
//!
//! A separate, simpler pipeline than lint: every changed file is checked
//! with the formatter in check-only, diff-producing mode and either passes,
//! needs formatting, or could not be checked. Files are never rewritten.

use crate::exec::{self, ExecError};
use crate::models::Decision;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStatus {
    Formatted,
    NeedsFormatting,
    /// The formatter could not run or rejected the file (e.g. syntax error).
    Unchecked,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatOutcome {
    pub file: String,
    pub status: FormatStatus,
    pub diff: Option<String>,
    pub reason: Option<String>,
}

/// Checks formatting of one file without modifying it.
pub trait Formatter: Sync {
    fn check(&self, root: &Path, file: &str) -> FormatOutcome;
}

#[derive(Debug, Clone)]
/// `terraform fmt -check -diff`.
pub struct TerraformFmt {
    pub bin: String,
    pub timeout: Duration,
}

impl TerraformFmt {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        TerraformFmt {
            bin: bin.into(),
            timeout,
        }
    }
}

impl Formatter for TerraformFmt {
    fn check(&self, root: &Path, file: &str) -> FormatOutcome {
        let args = ["fmt", "-check", "-diff", "-no-color", file];
        let outcome = |status: FormatStatus, diff: Option<String>, reason: Option<String>| FormatOutcome {
            file: file.to_string(),
            status,
            diff,
            reason,
        };
        match exec::run(&self.bin, args, root, self.timeout) {
            Ok(out) if out.success() => outcome(FormatStatus::Formatted, None, None),
            Ok(out) => {
                let diff = out.stdout_lossy().trim_end().to_string();
                if diff.is_empty() {
                    let reason = match out.stderr_lossy().trim() {
                        "" => format!("formatter exited with code {}", out.code),
                        s => s.to_string(),
                    };
                    outcome(FormatStatus::Unchecked, None, Some(reason))
                } else {
                    outcome(FormatStatus::NeedsFormatting, Some(diff), None)
                }
            }
            Err(ExecError::Signaled { .. }) => outcome(
                FormatStatus::Unchecked,
                None,
                Some("formatter terminated by signal".to_string()),
            ),
            Err(e) => outcome(FormatStatus::Unchecked, None, Some(e.to_string())),
        }
    }
}

/// Check every file with up to `jobs` workers; results sorted by file.
pub fn check_all(fmt: &dyn Formatter, root: &Path, files: &BTreeSet<String>, jobs: usize) -> Vec<FormatOutcome> {
    let ordered: Vec<&String> = files.iter().collect();
    let run_one = |file: &&String| {
        let o = fmt.check(root, file);
        match o.status {
            FormatStatus::Unchecked => warn!(file = %o.file, reason = ?o.reason, "formatter could not check file"),
            status => debug!(file = %o.file, ?status, "formatter checked file"),
        }
        o
    };
    let mut outcomes: Vec<FormatOutcome> = match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
    {
        Ok(pool) => pool.install(|| ordered.par_iter().map(run_one).collect()),
        Err(e) => {
            warn!(error = %e, "worker pool unavailable; running sequentially");
            ordered.iter().map(run_one).collect()
        }
    };
    outcomes.sort_by(|a, b| a.file.cmp(&b.file));
    info!(files = outcomes.len(), "format check complete");
    outcomes
}

/// Unchecked files fail the run first, then files needing formatting.
pub fn decide(outcomes: &[FormatOutcome]) -> Decision {
    let unchecked = outcomes
        .iter()
        .filter(|o| o.status == FormatStatus::Unchecked)
        .count();
    let needs = outcomes
        .iter()
        .filter(|o| o.status == FormatStatus::NeedsFormatting)
        .count();
    if unchecked > 0 {
        Decision {
            should_fail: true,
            reason: "format check incomplete".to_string(),
        }
    } else if needs > 0 {
        Decision {
            should_fail: true,
            reason: format!(
                "{} {} formatting",
                needs,
                if needs == 1 { "file needs" } else { "files need" }
            ),
        }
    } else {
        Decision {
            should_fail: false,
            reason: "all files formatted".to_string(),
        }
    }
}
