//! Per-directory analyzer invocation records.

use super::TargetDirectory;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Whether the analyzer process ran to completion.
///
/// A non-zero exit code still counts as `Succeeded`; only launch failures,
/// timeouts and signal deaths are `Failed`.
pub enum InvocationStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
/// Raw outcome of running the analyzer in one directory.
pub struct InvocationResult {
    pub directory: TargetDirectory,
    pub status: InvocationStatus,
    pub exit_code: Option<i32>,
    /// Captured stdout, where the structured output lives.
    pub raw_output: Vec<u8>,
    /// Captured stderr, used only for diagnostics.
    pub stderr: String,
    /// Why the invocation failed, when `status == Failed`.
    pub failure: Option<String>,
}

impl InvocationResult {
    pub fn completed(
        directory: TargetDirectory,
        exit_code: Option<i32>,
        raw_output: Vec<u8>,
        stderr: String,
    ) -> Self {
        InvocationResult {
            directory,
            status: InvocationStatus::Succeeded,
            exit_code,
            raw_output,
            stderr,
            failure: None,
        }
    }

    pub fn failed(directory: TargetDirectory, reason: impl Into<String>) -> Self {
        InvocationResult {
            directory,
            status: InvocationStatus::Failed,
            exit_code: None,
            raw_output: Vec::new(),
            stderr: String::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationErrorKind {
    /// The process could not start, timed out, or crashed.
    Invocation,
    /// The process ran but its output was not a valid violation list.
    Parse,
}

impl fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationErrorKind::Invocation => f.write_str("invocation"),
            InvocationErrorKind::Parse => f.write_str("parse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A directory whose analysis could not be completed.
pub struct InvocationError {
    pub directory: TargetDirectory,
    pub kind: InvocationErrorKind,
    pub reason: String,
}
