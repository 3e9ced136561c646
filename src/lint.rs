//! End-to-end pipelines.
//!
//! `run_lint`: changed paths → scope → analyzer config → per-directory
//! invocation → aggregation → state document → report → decision → one
//! publish. `run_fmt` is the formatter counterpart. Fatal errors stop the
//! pipeline; per-directory problems travel inside the report.

use crate::aggregate;
use crate::config::Effective;
use crate::error::Result;
use crate::format::{self, FormatOutcome, Formatter};
use crate::invoker::{self, Analyzer};
use crate::materialize;
use crate::models::{AggregatedReport, Decision};
use crate::output::{self, ReportMeta};
use crate::policy;
use crate::publish::Publisher;
use crate::scope::{self, ChangeSource, Scope};
use tracing::{info, warn};

#[derive(Debug)]
/// Result of a lint run.
pub enum LintOutcome {
    /// No changed file matched; nothing was analyzed or published.
    NothingToCheck,
    Completed {
        report: AggregatedReport,
        decision: Decision,
        rendered: String,
    },
}

#[derive(Debug)]
/// Result of a format run.
pub enum FmtOutcome {
    NothingToCheck,
    Completed {
        outcomes: Vec<FormatOutcome>,
        decision: Decision,
        rendered: String,
    },
}

/// The change source selected by the effective configuration.
pub fn change_source(eff: &Effective) -> ChangeSource {
    match &eff.changed_files {
        Some(path) => ChangeSource::List(path.clone()),
        None => ChangeSource::Git {
            base: eff.base.clone(),
            head: eff.head.clone(),
        },
    }
}

/// Resolve the analysis scope for the configured change source.
pub fn resolve_scope(eff: &Effective, source: &ChangeSource, patterns: &[String]) -> Result<Scope> {
    let changed = scope::changed_files(&eff.repo_root, source)?;
    Ok(scope::resolve(&changed, &eff.working_root, patterns)?)
}

/// Run the lint gate once.
pub fn run_lint(
    eff: &Effective,
    source: &ChangeSource,
    analyzer: &dyn Analyzer,
    publisher: &dyn Publisher,
) -> Result<LintOutcome> {
    let scope = resolve_scope(eff, source, &eff.patterns)?;
    if scope.directories.is_empty() {
        aggregate::write_state(&eff.state_file(), &AggregatedReport::default())?;
        info!("no changed files in scope; nothing to check");
        return Ok(LintOutcome::NothingToCheck);
    }

    let cfg = materialize::materialize(
        &eff.repo_root,
        &eff.config,
        &eff.state_dir,
        &eff.severity_overrides,
    )?;
    let work_dir = eff.working_dir();
    if eff.init {
        analyzer.prepare(&work_dir, &cfg.path);
    }
    let reported = analyzer.version(&work_dir);
    let analyzer_note = match invoker::check_version(&eff.analyzer_version, reported.as_deref()) {
        Some(mismatch) => {
            warn!(%mismatch, "analyzer version does not match pin");
            Some(mismatch)
        }
        None => reported,
    };

    let results = invoker::invoke_all(analyzer, &work_dir, &scope.directories, &cfg, eff.jobs);
    let report = aggregate::aggregate(&results, &cfg.severity_overrides);
    aggregate::write_state(&eff.state_file(), &report)?;

    let decision = policy::decide(&report, eff.fail_on_warnings);
    let meta = ReportMeta {
        config: cfg.describe(),
        analyzer: analyzer_note,
        include_info_in_summary: eff.include_info_in_summary,
    };
    let rendered = output::render_lint_report(&report, &decision, &meta);
    publisher.publish(&rendered, &decision)?;
    info!(should_fail = decision.should_fail, reason = %decision.reason, "lint decision");
    Ok(LintOutcome::Completed {
        report,
        decision,
        rendered,
    })
}

/// Run the formatter check once.
pub fn run_fmt(
    eff: &Effective,
    source: &ChangeSource,
    formatter: &dyn Formatter,
    publisher: &dyn Publisher,
) -> Result<FmtOutcome> {
    let scope = resolve_scope(eff, source, &eff.format_patterns)?;
    if scope.files.is_empty() {
        info!("no changed files in scope; nothing to check");
        return Ok(FmtOutcome::NothingToCheck);
    }
    let outcomes = format::check_all(formatter, &eff.working_dir(), &scope.files, eff.jobs);
    let decision = format::decide(&outcomes);
    let rendered = output::render_fmt_report(&outcomes, &decision);
    publisher.publish(&rendered, &decision)?;
    info!(should_fail = decision.should_fail, reason = %decision.reason, "format decision");
    Ok(FmtOutcome::Completed {
        outcomes,
        decision,
        rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_effective, CliOverrides};
    use crate::error::{GateError, PublishError};
    use crate::format::FormatStatus;
    use crate::models::{InvocationResult, Severity, TargetDirectory};
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Analyzer answering from a fixed table; unknown directories time out.
    struct Canned {
        outputs: HashMap<&'static str, String>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(outputs: &[(&'static str, String)]) -> Self {
            Canned {
                outputs: outputs.iter().cloned().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Analyzer for Canned {
        fn analyze(&self, _root: &Path, dir: &TargetDirectory, config: &Path) -> InvocationResult {
            assert!(config.is_file(), "config must be materialized before invocation");
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outputs.get(dir.as_str()) {
                Some(body) => InvocationResult::completed(dir.clone(), Some(2), body.clone().into_bytes(), String::new()),
                None => InvocationResult::failed(dir.clone(), "timed out after 300s"),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        posts: Mutex<Vec<(String, Decision)>>,
        fail: bool,
    }

    impl Publisher for Recorder {
        fn publish(&self, report: &str, decision: &Decision) -> std::result::Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Stdout(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed")));
            }
            self.posts.lock().unwrap().push((report.to_string(), decision.clone()));
            Ok(())
        }
    }

    fn issue(rule: &str, sev: &str, file: &str, line: u32, col: u32) -> String {
        format!(
            r#"{{"rule":{{"name":"{}","severity":"{}"}},"message":"found {}","range":{{"filename":"{}","start":{{"line":{},"column":{}}}}}}}"#,
            rule, sev, rule, file, line, col
        )
    }

    fn envelope(issues: &[String]) -> String {
        format!(r#"{{"issues":[{}],"errors":[]}}"#, issues.join(","))
    }

    fn setup(changed: &[&str], strict: bool) -> (TempDir, Effective, ChangeSource) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let list = dir.path().join("changed.txt");
        fs::write(&list, changed.join("\n")).unwrap();
        let cli = CliOverrides {
            repo_root: dir.path().to_str().map(str::to_string),
            fail_on_warnings: Some(strict),
            changed_files: list.to_str().map(str::to_string),
            jobs: Some(2),
            ..Default::default()
        };
        let mut eff = resolve_effective(&cli).unwrap();
        eff.init = false;
        let source = change_source(&eff);
        (dir, eff, source)
    }

    fn completed(outcome: LintOutcome) -> (AggregatedReport, Decision, String) {
        match outcome {
            LintOutcome::Completed { report, decision, rendered } => (report, decision, rendered),
            LintOutcome::NothingToCheck => panic!("expected a completed run"),
        }
    }

    #[test]
    fn test_single_error_fails_regardless_of_strictness() {
        for strict in [false, true] {
            let (_dir, eff, source) = setup(&["modules/vpc/main.tf"], strict);
            let analyzer = Canned::new(&[(
                "modules/vpc",
                envelope(&[issue("terraform_deprecated_interpolation", "error", "main.tf", 12, 3)]),
            )]);
            let publisher = Recorder::default();
            let (report, decision, _) = completed(run_lint(&eff, &source, &analyzer, &publisher).unwrap());
            assert_eq!(report.totals.error, 1);
            assert!(decision.should_fail);
            assert_eq!(publisher.posts.lock().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_nothing_in_scope_skips_invocation_and_publish() {
        let (_dir, eff, source) = setup(&["README.md", "docs/x.md"], false);
        let analyzer = Canned::new(&[]);
        let publisher = Recorder::default();
        let outcome = run_lint(&eff, &source, &analyzer, &publisher).unwrap();
        assert!(matches!(outcome, LintOutcome::NothingToCheck));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        assert!(publisher.posts.lock().unwrap().is_empty());
        assert_eq!(fs::read_to_string(eff.state_file()).unwrap().trim(), "[]");
    }

    #[test]
    fn test_timed_out_directory_keeps_other_findings() {
        let (_dir, eff, source) = setup(&["envs/dev/main.tf", "envs/slow/main.tf"], false);
        let analyzer = Canned::new(&[(
            "envs/dev",
            envelope(&[issue("terraform_naming_convention", "warning", "main.tf", 4, 1)]),
        )]);
        let publisher = Recorder::default();
        let (report, decision, rendered) = completed(run_lint(&eff, &source, &analyzer, &publisher).unwrap());
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.violations_for(Severity::Warning).len(), 1);
        assert_eq!(report.invocation_errors.len(), 1);
        assert_eq!(report.invocation_errors[0].directory.as_str(), "envs/slow");
        assert!(decision.should_fail);
        assert_eq!(decision.reason, "analysis incomplete");
        assert!(rendered.contains("envs/dev/main.tf:4"));
        assert!(rendered.contains("Could not complete analysis"));
    }

    #[test]
    fn test_warnings_respect_strict_mode_and_builtin_tiers() {
        let body = envelope(&[
            issue("terraform_naming_convention", "warning", "main.tf", 1, 1),
            // analyzer says warning, built-in tier says info
            issue("terraform_documented_outputs", "warning", "outputs.tf", 1, 1),
        ]);
        let (_d1, lax, src1) = setup(&["m/main.tf"], false);
        let (report, decision, _) = completed(
            run_lint(&lax, &src1, &Canned::new(&[("m", body.clone())]), &Recorder::default()).unwrap(),
        );
        assert_eq!(report.totals.warning, 1);
        assert_eq!(report.totals.info, 1);
        assert!(!decision.should_fail);

        let (_d2, strict, src2) = setup(&["m/main.tf"], true);
        let (_, decision, _) =
            completed(run_lint(&strict, &src2, &Canned::new(&[("m", body)]), &Recorder::default()).unwrap());
        assert!(decision.should_fail);
        assert_eq!(decision.reason, "1 warning found under strict mode");
    }

    #[test]
    fn test_rendered_report_is_idempotent() {
        let body = envelope(&[
            issue("b_rule", "notice", "b.tf", 2, 1),
            issue("a_rule", "error", "a.tf", 1, 1),
        ]);
        let render = || {
            let (_dir, eff, source) = setup(&["x/a.tf", "y/b.tf"], false);
            let analyzer = Canned::new(&[("x", body.clone()), ("y", body.clone())]);
            let (_, _, rendered) = completed(run_lint(&eff, &source, &analyzer, &Recorder::default()).unwrap());
            let state = fs::read_to_string(eff.state_file()).unwrap();
            (rendered, state)
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_publish_failure_is_fatal_but_state_survives() {
        let (_dir, eff, source) = setup(&["m/main.tf"], false);
        let analyzer = Canned::new(&[("m", envelope(&[issue("r", "error", "main.tf", 1, 1)]))]);
        let publisher = Recorder { fail: true, ..Default::default() };
        let err = run_lint(&eff, &source, &analyzer, &publisher).unwrap_err();
        assert!(matches!(err, GateError::Publish(_)));
        let state = fs::read_to_string(eff.state_file()).unwrap();
        assert!(state.contains("\"m/main.tf\""));
    }

    #[test]
    fn test_scope_failure_aborts_before_invocation() {
        let (_dir, mut eff, _) = setup(&[], false);
        eff.changed_files = Some(PathBuf::from("/definitely/missing/changed.txt"));
        let analyzer = Canned::new(&[]);
        let err = run_lint(&eff, &change_source(&eff), &analyzer, &Recorder::default()).unwrap_err();
        assert!(matches!(err, GateError::Scope(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    }

    struct AlwaysUgly;

    impl Formatter for AlwaysUgly {
        fn check(&self, _root: &Path, file: &str) -> FormatOutcome {
            FormatOutcome {
                file: file.to_string(),
                status: FormatStatus::NeedsFormatting,
                diff: Some("-a=1\n+a = 1".into()),
                reason: None,
            }
        }
    }

    #[test]
    fn test_fmt_pipeline_publishes_once() {
        let (_dir, eff, source) = setup(&["m/main.tf", "m/terraform.tfvars", "m/notes.md"], false);
        let publisher = Recorder::default();
        match run_fmt(&eff, &source, &AlwaysUgly, &publisher).unwrap() {
            FmtOutcome::Completed { outcomes, decision, .. } => {
                assert_eq!(outcomes.len(), 2);
                assert_eq!(decision.reason, "2 files need formatting");
            }
            FmtOutcome::NothingToCheck => panic!("expected files in scope"),
        }
        assert_eq!(publisher.posts.lock().unwrap().len(), 1);

        let (_d2, eff2, src2) = setup(&["notes.md"], false);
        assert!(matches!(
            run_fmt(&eff2, &src2, &AlwaysUgly, &publisher).unwrap(),
            FmtOutcome::NothingToCheck
        ));
        assert_eq!(publisher.posts.lock().unwrap().len(), 1);
    }
}
