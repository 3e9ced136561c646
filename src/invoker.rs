//! Analyzer invocation across target directories.
//!
//! Every directory gets one independent invocation. Failures are recorded
//! per directory and never abort the remaining ones; exit codes are kept
//! but not interpreted here. Results come back in lexicographic directory
//! order regardless of how the worker pool scheduled them.

use crate::exec::{self, ExecError};
use crate::materialize::ResolvedConfig;
use crate::models::{InvocationResult, TargetDirectory};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs the external analyzer for one directory.
///
/// Implementations must not touch the parent's working directory.
pub trait Analyzer: Sync {
    fn analyze(&self, root: &Path, dir: &TargetDirectory, config: &Path) -> InvocationResult;

    /// One-time setup before the fan-out (plugin installation).
    fn prepare(&self, _root: &Path, _config: &Path) {}

    /// Version line of the analyzer, when it can be queried.
    fn version(&self, _root: &Path) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
/// The `tflint` command-line analyzer.
pub struct Tflint {
    pub bin: String,
    pub timeout: Duration,
}

impl Tflint {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Tflint {
            bin: bin.into(),
            timeout,
        }
    }
}

impl Analyzer for Tflint {
    fn analyze(&self, root: &Path, dir: &TargetDirectory, config: &Path) -> InvocationResult {
        let cwd = root.join(dir.as_str());
        let cfg = format!("--config={}", config.display());
        let args = ["--format=json", "--no-color", cfg.as_str()];
        match exec::run(&self.bin, args, &cwd, self.timeout) {
            Ok(out) => {
                let stderr = out.stderr_lossy();
                InvocationResult::completed(dir.clone(), Some(out.code), out.stdout, stderr)
            }
            Err(ExecError::Signaled { stderr }) => {
                let mut r = InvocationResult::failed(dir.clone(), "analyzer terminated by signal");
                r.stderr = stderr;
                r
            }
            Err(e) => InvocationResult::failed(dir.clone(), e.to_string()),
        }
    }

    /// Install plugins declared by `config`. Failures are logged only: any
    /// directory that then cannot be analyzed reports its own error.
    fn prepare(&self, root: &Path, config: &Path) {
        let cfg = format!("--config={}", config.display());
        match exec::run(&self.bin, ["--init", cfg.as_str()], root, self.timeout) {
            Ok(out) if out.success() => debug!("analyzer plugins initialized"),
            Ok(out) => warn!(code = out.code, stderr = %out.stderr_lossy().trim(), "analyzer --init failed"),
            Err(e) => warn!(error = %e, "analyzer --init could not run"),
        }
    }

    fn version(&self, root: &Path) -> Option<String> {
        let out = exec::run(&self.bin, ["--version"], root, self.timeout).ok()?;
        out.stdout_lossy().lines().next().map(|l| l.trim().to_string())
    }
}

/// Check the analyzer version against a pin. `"latest"` accepts anything.
///
/// Returns a human-readable mismatch note, or `None` when acceptable.
pub fn check_version(pinned: &str, reported: Option<&str>) -> Option<String> {
    let pinned = pinned.trim();
    if pinned.is_empty() || pinned.eq_ignore_ascii_case("latest") {
        return None;
    }
    let want = pinned.trim_start_matches('v');
    match reported {
        Some(line) if line.contains(want) => None,
        Some(line) => Some(format!("expected analyzer {}, found '{}'", pinned, line)),
        None => Some(format!("expected analyzer {}, version could not be determined", pinned)),
    }
}

/// Invoke `analyzer` once per directory using up to `jobs` workers.
///
/// Returns only after every invocation has finished or timed out.
pub fn invoke_all(
    analyzer: &dyn Analyzer,
    root: &Path,
    dirs: &BTreeSet<TargetDirectory>,
    config: &ResolvedConfig,
    jobs: usize,
) -> Vec<InvocationResult> {
    let ordered: Vec<&TargetDirectory> = dirs.iter().collect();
    let run_one = |dir: &&TargetDirectory| {
        debug!(dir = %dir, "invoking analyzer");
        let res = analyzer.analyze(root, dir, &config.path);
        match &res.failure {
            Some(reason) => warn!(dir = %dir, reason = %reason, "analyzer invocation failed"),
            None => debug!(dir = %dir, code = ?res.exit_code, bytes = res.raw_output.len(), "analyzer finished"),
        }
        res
    };

    let mut results: Vec<InvocationResult> = match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
    {
        Ok(pool) => pool.install(|| ordered.par_iter().map(run_one).collect()),
        Err(e) => {
            warn!(error = %e, "worker pool unavailable; running sequentially");
            ordered.iter().map(run_one).collect()
        }
    };
    results.sort_by(|a, b| a.directory.cmp(&b.directory));
    info!(
        directories = results.len(),
        failed = results.iter().filter(|r| !r.succeeded()).count(),
        "analyzer fan-out complete"
    );
    results
}
