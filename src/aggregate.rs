//! Result aggregation.
//!
//! Folds every `InvocationResult` of a run into one `AggregatedReport`:
//! outputs are parsed per directory, concatenated in directory order,
//! deduplicated on (rule, file, line, column) keeping the first occurrence,
//! then partitioned by severity. A directory whose invocation failed or
//! whose output is unusable contributes no violations and exactly one
//! `InvocationError`.

use crate::error::StateError;
use crate::models::wire::{AnalyzerOutput, WireIssue, WirePos, WireRange, WireRule};
use crate::models::{
    AggregatedReport, InvocationError, InvocationErrorKind, InvocationResult, Severity, TargetDirectory,
    Violation,
};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Longest stderr excerpt attached to an error reason.
const STDERR_EXCERPT: usize = 400;

fn stderr_excerpt(stderr: &str) -> Option<String> {
    let t = stderr.trim();
    if t.is_empty() {
        return None;
    }
    let mut s: String = t.chars().take(STDERR_EXCERPT).collect();
    if t.chars().count() > STDERR_EXCERPT {
        s.push('…');
    }
    Some(s)
}

fn with_stderr(reason: String, stderr: &str) -> String {
    match stderr_excerpt(stderr) {
        Some(ex) => format!("{} (stderr: {})", reason, ex),
        None => reason,
    }
}

fn to_position(v: i64) -> u32 {
    u32::try_from(v.max(1)).unwrap_or(u32::MAX)
}

fn to_violation(
    dir: &TargetDirectory,
    issue: WireIssue,
    overrides: &BTreeMap<String, Severity>,
) -> Result<Violation, String> {
    let severity = match overrides.get(&issue.rule.name) {
        Some(sev) => *sev,
        None => issue
            .rule
            .severity
            .parse::<Severity>()
            .map_err(|e| format!("rule '{}': {}", issue.rule.name, e))?,
    };
    Ok(Violation {
        rule: issue.rule.name,
        severity,
        message: issue.message,
        file: dir.qualify(&issue.range.filename),
        line: to_position(issue.range.start.line),
        column: to_position(issue.range.start.column),
    })
}

/// Parse one invocation's raw output into violations.
pub fn parse_invocation(
    res: &InvocationResult,
    overrides: &BTreeMap<String, Severity>,
) -> Result<Vec<Violation>, InvocationError> {
    let fail = |kind, reason: String| InvocationError {
        directory: res.directory.clone(),
        kind,
        reason,
    };
    if !res.succeeded() {
        let reason = res
            .failure
            .clone()
            .unwrap_or_else(|| "analyzer invocation failed".to_string());
        return Err(fail(InvocationErrorKind::Invocation, with_stderr(reason, &res.stderr)));
    }
    if res.raw_output.iter().all(u8::is_ascii_whitespace) {
        let reason = match res.exit_code {
            Some(code) => format!("analyzer produced no output (exit code {})", code),
            None => "analyzer produced no output".to_string(),
        };
        return Err(fail(InvocationErrorKind::Parse, with_stderr(reason, &res.stderr)));
    }
    let parsed: AnalyzerOutput = serde_json::from_slice(&res.raw_output).map_err(|e| {
        fail(
            InvocationErrorKind::Parse,
            with_stderr(format!("malformed analyzer output: {}", e), &res.stderr),
        )
    })?;
    let issues = match parsed {
        AnalyzerOutput::Issues(issues) => issues,
        AnalyzerOutput::Envelope { errors, .. } if !errors.is_empty() => {
            let joined = errors
                .iter()
                .map(|e| e.text())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(fail(
                InvocationErrorKind::Parse,
                format!("analyzer reported errors: {}", joined),
            ));
        }
        AnalyzerOutput::Envelope { issues, .. } => issues,
    };
    issues
        .into_iter()
        .map(|issue| to_violation(&res.directory, issue, overrides))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| fail(InvocationErrorKind::Parse, format!("invalid violation: {}", e)))
}

/// Merge all invocation results of a run.
///
/// Must only be called once every invocation has completed.
pub fn aggregate(results: &[InvocationResult], overrides: &BTreeMap<String, Severity>) -> AggregatedReport {
    let mut report = AggregatedReport::default();
    let mut seen: HashSet<(String, String, u32, u32)> = HashSet::new();
    let mut merged: Vec<Violation> = Vec::new();

    for res in results {
        report.directories.push(res.directory.clone());
        match parse_invocation(res, overrides) {
            Ok(found) => {
                debug!(dir = %res.directory, violations = found.len(), "parsed analyzer output");
                for v in found {
                    let key = (v.rule.clone(), v.file.clone(), v.line, v.column);
                    if seen.insert(key) {
                        merged.push(v);
                    } else {
                        debug!(rule = %v.rule, file = %v.file, line = v.line, "dropping duplicate violation");
                    }
                }
            }
            Err(err) => {
                warn!(dir = %err.directory, kind = %err.kind, reason = %err.reason, "directory analysis incomplete");
                report.invocation_errors.push(err);
            }
        }
    }

    for v in merged {
        report.totals.bump(v.severity);
        report.violations.entry(v.severity).or_default().push(v);
    }
    for bucket in report.violations.values_mut() {
        bucket.sort_by(|a, b| (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column)));
    }
    report
}

fn to_wire(v: &Violation) -> WireIssue {
    WireIssue {
        rule: WireRule {
            name: v.rule.clone(),
            severity: v.severity.as_str().to_string(),
        },
        message: v.message.clone(),
        range: WireRange {
            filename: v.file.clone(),
            start: WirePos {
                line: i64::from(v.line),
                column: i64::from(v.column),
            },
        },
    }
}

/// Serialize the merged violations in analyzer wire shape (`[]` when empty).
pub fn state_json(report: &AggregatedReport) -> String {
    let items: Vec<WireIssue> = report.all_violations().map(to_wire).collect();
    serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
}

/// Write the run-scoped state document.
pub fn write_state(path: &Path, report: &AggregatedReport) -> Result<(), StateError> {
    let err = |source| StateError {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(err)?;
        }
    }
    let mut body = state_json(report);
    body.push('\n');
    fs::write(path, body).map_err(err)
}
