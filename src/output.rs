//! Report rendering.
//!
//! `render_lint_report` / `render_fmt_report` build the markdown published
//! as a review comment; they are pure and byte-for-byte deterministic for
//! the same input. `print_lint` / `print_fmt` write the console view in
//! `human` (default) or `json` mode.

use crate::format::{FormatOutcome, FormatStatus};
use crate::models::{AggregatedReport, Decision, Severity};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

/// Marker heading the lint report, stable across runs.
pub const LINT_MARKER: &str = "<!-- tfgate:lint -->";
/// Marker heading the formatter report.
pub const FMT_MARKER: &str = "<!-- tfgate:fmt -->";

/// Context printed alongside the lint findings.
#[derive(Debug, Clone, Default)]
pub struct ReportMeta {
    /// Analyzer config identifier.
    pub config: String,
    /// Analyzer version line or pin mismatch note.
    pub analyzer: Option<String>,
    pub include_info_in_summary: bool,
}

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

/// Escape text for a markdown table cell. Backslashes go first so an
/// escaped pipe cannot be un-escaped by a preceding backslash.
pub fn escape_cell(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push_str("<br>");
                }
            }
            '\n' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}

/// Inline code span that survives backticks in `s`.
fn code(s: &str) -> String {
    let s = s.replace('|', "\\|").replace(['\n', '\r'], " ");
    let longest = longest_run(&s, '`');
    let ticks = "`".repeat(longest + 1);
    if longest > 0 {
        format!("{} {} {}", ticks, s, ticks)
    } else {
        format!("{}{}{}", ticks, s, ticks)
    }
}

fn longest_run(s: &str, ch: char) -> usize {
    let (mut best, mut cur) = (0, 0);
    for c in s.chars() {
        if c == ch {
            cur += 1;
            best = best.max(cur);
        } else {
            cur = 0;
        }
    }
    best
}

/// Fenced block whose fence is longer than any backtick run inside.
fn fenced(lang: &str, body: &str) -> String {
    let fence = "`".repeat(longest_run(body, '`').max(2) + 1);
    let body = body.trim_end_matches('\n');
    format!("{}{}\n{}\n{}\n", fence, lang, body, fence)
}

fn count(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// One-line totals: error, warning, notice, and info when requested.
pub fn summary_line(report: &AggregatedReport, include_info: bool) -> String {
    let t = &report.totals;
    let mut parts = vec![
        count(t.error, "error"),
        count(t.warning, "warning"),
        count(t.notice, "notice"),
    ];
    if include_info {
        parts.push(format!("{} info", t.info));
    }
    parts.join(" · ")
}

fn verdict(decision: &Decision) -> String {
    if decision.should_fail {
        format!("**Result:** ❌ failed: {}", escape_cell(&decision.reason))
    } else {
        format!("**Result:** ✅ passed: {}", escape_cell(&decision.reason))
    }
}

/// Render the lint report published for a run.
pub fn render_lint_report(report: &AggregatedReport, decision: &Decision, meta: &ReportMeta) -> String {
    let mut out = String::new();
    out.push_str(LINT_MARKER);
    out.push_str("\n## Terraform lint\n\n");
    out.push_str(&format!(
        "**{}** across {}\n\n",
        summary_line(report, meta.include_info_in_summary),
        match report.directories.len() {
            1 => "1 directory".to_string(),
            n => format!("{} directories", n),
        }
    ));

    if !report.invocation_errors.is_empty() {
        out.push_str("### ⚠️ Could not complete analysis\n\n");
        out.push_str("These directories were not fully analyzed; their findings are missing from this report.\n\n");
        out.push_str("| Directory | Stage | Reason |\n| --- | --- | --- |\n");
        for e in &report.invocation_errors {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                code(e.directory.as_str()),
                e.kind,
                escape_cell(&e.reason)
            ));
        }
        out.push('\n');
    }

    for sev in Severity::ALL {
        let items = report.violations_for(sev);
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("### {} ({})\n\n", sev.heading(), items.len()));
        out.push_str("| Location | Rule | Message |\n| --- | --- | --- |\n");
        for v in items {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                code(&format!("{}:{}", v.file, v.line)),
                code(&v.rule),
                escape_cell(&v.message)
            ));
        }
        out.push('\n');
    }

    out.push_str(&verdict(decision));
    out.push_str("\n\n");
    let mut footer = format!("config: {}", escape_cell(&meta.config));
    if let Some(a) = &meta.analyzer {
        footer.push_str(&format!(" · analyzer: {}", escape_cell(a)));
    }
    out.push_str(&format!("<sub>{}</sub>\n", footer));
    out
}

/// Render the formatter report published for a run.
pub fn render_fmt_report(outcomes: &[FormatOutcome], decision: &Decision) -> String {
    let needs: Vec<&FormatOutcome> = outcomes
        .iter()
        .filter(|o| o.status == FormatStatus::NeedsFormatting)
        .collect();
    let unchecked: Vec<&FormatOutcome> = outcomes
        .iter()
        .filter(|o| o.status == FormatStatus::Unchecked)
        .collect();

    let mut out = String::new();
    out.push_str(FMT_MARKER);
    out.push_str("\n## Terraform format\n\n");
    out.push_str(&format!(
        "**{} need formatting** out of {} checked\n\n",
        needs.len(),
        count(outcomes.len(), "file")
    ));

    if !unchecked.is_empty() {
        out.push_str("### ⚠️ Could not check\n\n| File | Reason |\n| --- | --- |\n");
        for o in &unchecked {
            out.push_str(&format!(
                "| {} | {} |\n",
                code(&o.file),
                escape_cell(o.reason.as_deref().unwrap_or("unknown failure"))
            ));
        }
        out.push('\n');
    }

    for o in &needs {
        out.push_str(&format!("<details><summary>{}</summary>\n\n", code(&o.file)));
        out.push_str(&fenced("diff", o.diff.as_deref().unwrap_or("")));
        out.push_str("\n</details>\n\n");
    }

    out.push_str(&verdict(decision));
    out.push('\n');
    out
}

/// Compose lint JSON (pure) for machine consumers and tests.
pub fn compose_lint_json(report: &AggregatedReport, decision: &Decision) -> JsonVal {
    let violations: Vec<&crate::models::Violation> = report.all_violations().collect();
    json!({
        "directories": report.directories,
        "violations": violations,
        "totals": report.totals,
        "invocation_errors": report.invocation_errors,
        "decision": decision,
    })
}

/// Compose formatter JSON (pure).
pub fn compose_fmt_json(outcomes: &[FormatOutcome], decision: &Decision) -> JsonVal {
    json!({
        "results": outcomes,
        "summary": {
            "needs_formatting": outcomes.iter().filter(|o| o.status == FormatStatus::NeedsFormatting).count(),
            "unchecked": outcomes.iter().filter(|o| o.status == FormatStatus::Unchecked).count(),
            "total": outcomes.len(),
        },
        "decision": decision,
    })
}

fn print_json(v: &JsonVal) {
    match serde_json::to_string_pretty(v) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("{} {}", crate::utils::error_prefix(), e),
    }
}

fn severity_badge(sev: Severity, color: bool) -> (String, String) {
    let (icon, label) = match sev {
        Severity::Error => ("✖", "⟦error⟧"),
        Severity::Warning => ("▲", "⟦warn⟧"),
        Severity::Notice => ("●", "⟦notice⟧"),
        Severity::Info => ("◆", "⟦info⟧"),
    };
    if !color {
        return (icon.to_string(), label.to_string());
    }
    match sev {
        Severity::Error => (icon.red().to_string(), label.red().bold().to_string()),
        Severity::Warning => (icon.yellow().to_string(), label.yellow().bold().to_string()),
        Severity::Notice => (icon.cyan().to_string(), label.cyan().bold().to_string()),
        Severity::Info => (icon.blue().to_string(), label.blue().bold().to_string()),
    }
}

/// Print lint results to the console.
pub fn print_lint(report: &AggregatedReport, decision: &Decision, output: &str) {
    if output == "json" {
        print_json(&compose_lint_json(report, decision));
        return;
    }
    let color = use_colors(output);
    for e in &report.invocation_errors {
        let tag = if color {
            "⟦incomplete⟧".magenta().bold().to_string()
        } else {
            "⟦incomplete⟧".to_string()
        };
        println!("⚠ {} {} ❲{}❳ — {}", tag, e.directory, e.kind, e.reason);
    }
    for v in report.all_violations() {
        let (icon, sev) = severity_badge(v.severity, color);
        let loc = format!("{}:{}:{}", v.file, v.line, v.column);
        let loc = if color { loc.bold().to_string() } else { loc };
        println!("{} {} {} ❲{}❳ — {}", icon, sev, loc, v.rule, v.message);
    }
    let summary = format!(
        "— Summary — errors={} warnings={} notices={} infos={} directories={} incomplete={}",
        report.totals.error,
        report.totals.warning,
        report.totals.notice,
        report.totals.info,
        report.directories.len(),
        report.invocation_errors.len()
    );
    if color {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary);
    }
}

/// Print formatter results to the console.
pub fn print_fmt(outcomes: &[FormatOutcome], decision: &Decision, output: &str) {
    if output == "json" {
        print_json(&compose_fmt_json(outcomes, decision));
        return;
    }
    let color = use_colors(output);
    for o in outcomes {
        match o.status {
            FormatStatus::Formatted => {
                if color {
                    println!("{} {}", "formatted:".bright_black(), o.file);
                } else {
                    println!("formatted: {}", o.file);
                }
            }
            FormatStatus::NeedsFormatting => {
                let diff = o.diff.as_deref().unwrap_or("");
                if color {
                    println!("{} {}\n{}", "---".cyan().bold(), o.file.bold(), diff);
                } else {
                    println!("--- {}\n{}", o.file, diff);
                }
            }
            FormatStatus::Unchecked => {
                let reason = o.reason.as_deref().unwrap_or("unknown failure");
                if color {
                    println!("{} {} — {}", "could not check:".magenta().bold(), o.file, reason);
                } else {
                    println!("could not check: {} — {}", o.file, reason);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvocationError, InvocationErrorKind, TargetDirectory, Violation};
    use crate::policy;

    fn violation(rule: &str, sev: Severity, msg: &str, file: &str, line: u32) -> Violation {
        Violation {
            rule: rule.into(),
            severity: sev,
            message: msg.into(),
            file: file.into(),
            line,
            column: 1,
        }
    }

    fn sample() -> AggregatedReport {
        let mut r = AggregatedReport::default();
        r.directories = vec![TargetDirectory::new("a"), TargetDirectory::new("b")];
        for v in [
            violation("terraform_naming_convention", Severity::Warning, "bad | name\nsecond", "a/main.tf", 3),
            violation("terraform_deprecated_index", Severity::Error, "use [0]", "b/x.tf", 7),
            violation("terraform_documented_outputs", Severity::Info, "doc it", "a/out.tf", 1),
        ] {
            r.totals.bump(v.severity);
            r.violations.entry(v.severity).or_default().push(v);
        }
        r
    }

    #[test]
    fn test_escape_cell_keeps_table_well_formed() {
        assert_eq!(escape_cell("a|b"), "a\\|b");
        assert_eq!(escape_cell("a\\|b"), "a\\\\\\|b");
        assert_eq!(escape_cell("x\r\ny\nz"), "x<br>y<br>z");
        assert_eq!(escape_cell("<!-- hi -->"), "&lt;!-- hi --&gt;");
        assert_eq!(escape_cell("use &lt; or &amp;"), "use &amp;lt; or &amp;amp;");
    }

    #[test]
    fn test_code_span_handles_backticks() {
        assert_eq!(code("main.tf"), "`main.tf`");
        assert_eq!(code("a`b"), "`` a`b ``");
    }

    #[test]
    fn test_lint_report_layout_and_order() {
        let r = sample();
        let d = policy::decide(&r, false);
        let out = render_lint_report(&r, &d, &ReportMeta { config: "built-in ruleset v1".into(), ..Default::default() });
        assert!(out.starts_with(LINT_MARKER));
        assert!(out.contains("**1 error · 1 warning · 0 notices** across 2 directories"));
        let e = out.find("### Errors (1)").unwrap();
        let w = out.find("### Warnings (1)").unwrap();
        let i = out.find("### Info (1)").unwrap();
        assert!(e < w && w < i);
        assert!(!out.contains("### Notices"));
        assert!(out.contains("| `a/main.tf:3` | `terraform_naming_convention` | bad \\| name<br>second |"));
        assert!(out.contains("**Result:** ❌ failed: 1 error found"));
        assert!(!out.contains("Could not complete analysis"));
    }

    #[test]
    fn test_info_in_summary_is_configurable() {
        let r = sample();
        assert!(!summary_line(&r, false).contains("info"));
        assert_eq!(summary_line(&r, true), "1 error · 1 warning · 0 notices · 1 info");
    }

    #[test]
    fn test_incomplete_section_is_never_dropped() {
        let mut r = AggregatedReport::default();
        r.directories = vec![TargetDirectory::new("slow")];
        r.invocation_errors.push(InvocationError {
            directory: TargetDirectory::new("slow"),
            kind: InvocationErrorKind::Invocation,
            reason: "timed out after 300s".into(),
        });
        let d = policy::decide(&r, false);
        let out = render_lint_report(&r, &d, &ReportMeta::default());
        assert!(out.contains("### ⚠️ Could not complete analysis"));
        assert!(out.contains("| `slow` | invocation | timed out after 300s |"));
        assert!(out.contains("❌ failed: analysis incomplete"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let r = sample();
        let d = policy::decide(&r, true);
        let meta = ReportMeta { config: "c".into(), analyzer: Some("TFLint version 0.50.3".into()), include_info_in_summary: true };
        assert_eq!(render_lint_report(&r, &d, &meta), render_lint_report(&r, &d, &meta));
    }

    #[test]
    fn test_fmt_report_uses_safe_fence() {
        let outcomes = vec![
            FormatOutcome {
                file: "a.tf".into(),
                status: FormatStatus::NeedsFormatting,
                diff: Some("-x=1\n+x = 1 # ```\n".into()),
                reason: None,
            },
            FormatOutcome {
                file: "b.tf".into(),
                status: FormatStatus::Formatted,
                diff: None,
                reason: None,
            },
        ];
        let d = crate::format::decide(&outcomes);
        let out = render_fmt_report(&outcomes, &d);
        assert!(out.starts_with(FMT_MARKER));
        assert!(out.contains("**1 need formatting** out of 2 files checked"));
        assert!(out.contains("````diff\n-x=1\n+x = 1 # ```\n````\n"));
    }

    #[test]
    fn test_compose_lint_json_shape() {
        let r = sample();
        let d = policy::decide(&r, false);
        let out = compose_lint_json(&r, &d);
        assert_eq!(out["totals"]["error"], 1);
        assert_eq!(out["violations"][0]["severity"], "error");
        assert_eq!(out["violations"][1]["rule"], "terraform_naming_convention");
        assert_eq!(out["decision"]["should_fail"], true);
        assert_eq!(out["directories"][1], "b");
    }
}
