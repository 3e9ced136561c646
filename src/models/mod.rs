//! Shared data models flowing between pipeline stages.
//!
//! Values here are created once and never mutated after a stage hands them
//! to the next one: `TargetDirectory` → `InvocationResult` →
//! `AggregatedReport` → `Decision`.

pub mod invocation;
pub mod wire;

pub use invocation::{InvocationError, InvocationErrorKind, InvocationResult, InvocationStatus};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Violation severity. Variant order is report order: error first.
pub enum Severity {
    Error,
    Warning,
    Notice,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
        }
    }

    /// Plural heading used in report sections.
    pub fn heading(&self) -> &'static str {
        match self {
            Severity::Error => "Errors",
            Severity::Warning => "Warnings",
            Severity::Notice => "Notices",
            Severity::Info => "Info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Case-insensitive; accepts `warn` as an alias of `warning`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "notice" => Ok(Severity::Notice),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
/// A directory to analyze, `/`-separated and relative to the working root.
/// The working root itself is `.`.
pub struct TargetDirectory(String);

impl TargetDirectory {
    pub fn new(dir: impl Into<String>) -> Self {
        let raw: String = dir.into().replace('\\', "/");
        let trimmed = raw.trim_end_matches('/');
        let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
        if trimmed.is_empty() {
            TargetDirectory(".".to_string())
        } else {
            TargetDirectory(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    /// Qualify a filename reported relative to this directory.
    ///
    /// The result is lexically normalized, so `envs/dev` reporting
    /// `../../modules/vpc/main.tf` yields `modules/vpc/main.tf`. Absolute
    /// paths are kept as reported.
    pub fn qualify(&self, file: &str) -> String {
        let file = file.replace('\\', "/");
        if file.starts_with('/') {
            return file;
        }
        normalize(&format!("{}/{}", self.0, file))
    }
}

/// Resolve `.` and `..` segments without touching the filesystem.
/// Leading `..` that climb above the working root are kept.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

impl fmt::Display for TargetDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One analyzer finding. `line` and `column` are 1-based.
pub struct Violation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Violation {
    /// Identity used for deduplication; the message is deliberately excluded.
    pub fn key(&self) -> (&str, &str, u32, u32) {
        (&self.rule, &self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Per-severity counters.
pub struct Totals {
    pub error: usize,
    pub warning: usize,
    pub notice: usize,
    pub info: usize,
}

impl Totals {
    pub fn get(&self, sev: Severity) -> usize {
        match sev {
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Notice => self.notice,
            Severity::Info => self.info,
        }
    }

    pub fn bump(&mut self, sev: Severity) {
        match sev {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Notice => self.notice += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.error + self.warning + self.notice + self.info
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Merged, deduplicated and classified result of one run.
pub struct AggregatedReport {
    /// Directories that were in scope, in processing order.
    pub directories: Vec<TargetDirectory>,
    /// Each bucket is sorted by (file, line, column).
    pub violations: BTreeMap<Severity, Vec<Violation>>,
    pub totals: Totals,
    pub invocation_errors: Vec<InvocationError>,
}

impl AggregatedReport {
    pub fn violations_for(&self, sev: Severity) -> &[Violation] {
        self.violations.get(&sev).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All violations in report order (severity, then file/line/column).
    pub fn all_violations(&self) -> impl Iterator<Item = &Violation> {
        Severity::ALL
            .iter()
            .flat_map(move |sev| self.violations_for(*sev).iter())
    }

    pub fn is_complete(&self) -> bool {
        self.invocation_errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Pass/fail outcome of a run.
pub struct Decision {
    pub should_fail: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_matches_report_order() {
        let mut v = vec![Severity::Info, Severity::Error, Severity::Notice, Severity::Warning];
        v.sort();
        assert_eq!(v, Severity::ALL.to_vec());
        assert_eq!("WARN".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_target_directory_normalizes_and_qualifies() {
        assert_eq!(TargetDirectory::new("").as_str(), ".");
        assert_eq!(TargetDirectory::new("./modules/vpc/").as_str(), "modules/vpc");
        let dir = TargetDirectory::new("modules/vpc");
        assert_eq!(dir.qualify("main.tf"), "modules/vpc/main.tf");
        assert_eq!(dir.qualify(""), "modules/vpc");
        assert_eq!(TargetDirectory::new(".").qualify("./main.tf"), "main.tf");
    }

    #[test]
    fn test_qualify_resolves_parent_segments() {
        let dev = TargetDirectory::new("envs/dev");
        assert_eq!(dev.qualify("../../modules/vpc/main.tf"), "modules/vpc/main.tf");
        assert_eq!(dev.qualify("./sub/../main.tf"), "envs/dev/main.tf");
        assert_eq!(TargetDirectory::new(".").qualify("../shared/x.tf"), "../shared/x.tf");
        assert_eq!(dev.qualify("/abs/main.tf"), "/abs/main.tf");
        // a nested path that repeats the directory name is still nested
        let modules = TargetDirectory::new("modules");
        assert_eq!(modules.qualify("modules/child/main.tf"), "modules/modules/child/main.tf");
    }
}
