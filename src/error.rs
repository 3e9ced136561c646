//! Fatal error taxonomy.
//!
//! Per-directory invocation and parse failures are not errors here: they
//! are recorded as `InvocationError` values and surfaced in the report.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Changed-file resolution failed; nothing can be analyzed.
pub enum ScopeError {
    #[error("repository is a shallow clone; fetch full history before resolving changes")]
    ShallowClone,

    #[error("revision '{rev}' is not available in the local history")]
    UnknownRevision { rev: String },

    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },

    #[error("failed to run git: {0}")]
    GitUnavailable(#[source] std::io::Error),

    #[error("invalid pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },

    #[error("failed to read changed-file list {path}: {source}")]
    ChangedList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
/// The report could not be delivered. Aggregation results stay intact.
pub enum PublishError {
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report to stdout: {0}")]
    Stdout(#[source] std::io::Error),
}

#[derive(Debug, Error)]
#[error("failed to write run state {path}: {source}")]
/// The run-scoped state document could not be written.
pub struct StateError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
/// Any error that aborts a run.
pub enum GateError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

pub type Result<T> = std::result::Result<T, GateError>;
