//! Pass/fail policy.
//!
//! Rules are evaluated in order and the first match wins:
//! 1. any directory could not be analyzed ⇒ fail ("analysis incomplete")
//! 2. any error ⇒ fail
//! 3. strict mode and any warning ⇒ fail
//! 4. otherwise pass

use crate::models::{AggregatedReport, Decision, Totals};

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// Decide from counts, strictness, and whether analysis was complete.
pub fn evaluate(totals: &Totals, fail_on_warnings: bool, incomplete: bool) -> Decision {
    if incomplete {
        return Decision {
            should_fail: true,
            reason: "analysis incomplete".to_string(),
        };
    }
    if totals.error > 0 {
        return Decision {
            should_fail: true,
            reason: format!("{} found", plural(totals.error, "error")),
        };
    }
    if fail_on_warnings && totals.warning > 0 {
        return Decision {
            should_fail: true,
            reason: format!("{} found under strict mode", plural(totals.warning, "warning")),
        };
    }
    Decision {
        should_fail: false,
        reason: if totals.total() == 0 {
            "no findings".to_string()
        } else {
            format!("{} below the failure threshold", plural(totals.total(), "finding"))
        },
    }
}

/// Convenience wrapper over a complete report.
pub fn decide(report: &AggregatedReport, fail_on_warnings: bool) -> Decision {
    evaluate(&report.totals, fail_on_warnings, !report.is_complete())
}
