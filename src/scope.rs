//! Change scope resolution.
//!
//! Turns the set of files changed by a revision into the minimal set of
//! directories to analyze: changed paths are restricted to the working
//! root, matched against the configured glob patterns, and collapsed to
//! their unique parent directories.

use crate::error::ScopeError;
use crate::exec::{self, ExecError};
use crate::models::TargetDirectory;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const GIT_TIMEOUT: Duration = Duration::from_secs(120);

const MATCH_OPTS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
/// Where the list of changed files comes from.
pub enum ChangeSource {
    /// Files differing between `base` and `head` (merge-base comparison).
    Git { base: String, head: String },
    /// A newline-separated list of repo-relative paths; `-` reads stdin.
    List(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Resolved scope of one run.
pub struct Scope {
    /// Matching changed files, relative to the working root.
    pub files: BTreeSet<String>,
    /// Unique parent directories of `files`.
    pub directories: BTreeSet<TargetDirectory>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Collect changed paths (repository-relative) from `source`.
pub fn changed_files(repo_root: &Path, source: &ChangeSource) -> Result<Vec<String>, ScopeError> {
    match source {
        ChangeSource::Git { base, head } => git_changed_files(repo_root, base, head),
        ChangeSource::List(path) => read_changed_list(path),
    }
}

fn read_changed_list(path: &Path) -> Result<Vec<String>, ScopeError> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        fs::read_to_string(path)
    }
    .map_err(|source| ScopeError::ChangedList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToOwned::to_owned)
        .collect())
}

fn git(repo_root: &Path, args: &[&str]) -> Result<exec::ExecOutput, ScopeError> {
    exec::run("git", args, repo_root, GIT_TIMEOUT).map_err(|e| match e {
        ExecError::Spawn { source, .. } => ScopeError::GitUnavailable(source),
        other => ScopeError::Git {
            args: args.join(" "),
            stderr: other.to_string(),
        },
    })
}

/// List files added, copied, modified or renamed between `base` and `head`.
///
/// Fails when the clone is shallow or either revision is missing; a partial
/// history would silently shrink the scope.
pub fn git_changed_files(repo_root: &Path, base: &str, head: &str) -> Result<Vec<String>, ScopeError> {
    let shallow = git(repo_root, &["rev-parse", "--is-shallow-repository"])?;
    if shallow.success() && shallow.stdout_lossy().trim() == "true" {
        return Err(ScopeError::ShallowClone);
    }
    for rev in [base, head] {
        let spec = format!("{}^{{commit}}", rev);
        let out = git(repo_root, &["rev-parse", "--verify", "--quiet", &spec])?;
        if !out.success() {
            return Err(ScopeError::UnknownRevision {
                rev: rev.to_string(),
            });
        }
    }
    let range = format!("{}...{}", base, head);
    let args = ["diff", "--name-only", "--diff-filter=ACMR", "-z", range.as_str()];
    let out = git(repo_root, &args)?;
    if !out.success() {
        return Err(ScopeError::Git {
            args: args.join(" "),
            stderr: out.stderr_lossy().trim().to_string(),
        });
    }
    let files: Vec<String> = out
        .stdout_lossy()
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    debug!(base, head, count = files.len(), "git reported changed files");
    Ok(files)
}

/// Compile glob patterns; `**` crosses directories, `*` does not.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, ScopeError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ScopeError::BadPattern {
                pattern: p.clone(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}

/// Re-express a repository-relative path relative to `working_root`.
///
/// Returns `None` for paths outside the working root.
fn relative_to_root(path: &str, working_root: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    let root = working_root.trim_matches('/');
    let root = root.strip_prefix("./").unwrap_or(root);
    if root.is_empty() || root == "." {
        return Some(path.to_string());
    }
    path.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .map(ToOwned::to_owned)
}

fn parent_dir(file: &str) -> TargetDirectory {
    match file.rfind('/') {
        Some(idx) => TargetDirectory::new(&file[..idx]),
        None => TargetDirectory::new("."),
    }
}

/// Resolve changed files into the analysis scope.
pub fn resolve<S: AsRef<str>>(
    changed: &[S],
    working_root: &str,
    patterns: &[String],
) -> Result<Scope, ScopeError> {
    let compiled = compile_patterns(patterns)?;
    let mut scope = Scope::default();
    for raw in changed {
        let Some(rel) = relative_to_root(raw.as_ref().trim(), working_root) else {
            continue;
        };
        if compiled.iter().any(|p| p.matches_with(&rel, MATCH_OPTS)) {
            scope.directories.insert(parent_dir(&rel));
            scope.files.insert(rel);
        }
    }
    info!(
        files = scope.files.len(),
        directories = scope.directories.len(),
        "resolved change scope"
    );
    Ok(scope)
}
