//! Analyzer wire schema.
//!
//! The analyzer emits either a bare array of issues or an envelope of the
//! form `{"issues": [...], "errors": [...]}`. The same issue shape is used
//! for the persisted `violations.json` state document.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
/// Accepted top-level shapes of analyzer output.
pub enum AnalyzerOutput {
    Issues(Vec<WireIssue>),
    Envelope {
        issues: Vec<WireIssue>,
        #[serde(default)]
        errors: Vec<WireError>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// A single issue as emitted by the analyzer.
pub struct WireIssue {
    pub rule: WireRule,
    pub message: String,
    pub range: WireRange,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireRule {
    pub name: String,
    pub severity: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireRange {
    #[serde(default)]
    pub filename: String,
    pub start: WirePos,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WirePos {
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub column: i64,
}

#[derive(Debug, Clone, Deserialize)]
/// An analyzer-level error (bad config, unloadable module, ...).
pub struct WireError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl WireError {
    pub fn text(&self) -> String {
        match (&self.summary, self.message.is_empty()) {
            (Some(s), true) => s.clone(),
            (Some(s), false) if !self.message.contains(s.as_str()) => {
                format!("{}: {}", s, self.message)
            }
            _ => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bare_array_and_envelope() {
        let bare = r#"[{"rule":{"name":"r","severity":"error"},"message":"m","range":{"filename":"main.tf","start":{"line":1,"column":2}}}]"#;
        match serde_json::from_str::<AnalyzerOutput>(bare).unwrap() {
            AnalyzerOutput::Issues(v) => assert_eq!(v.len(), 1),
            _ => panic!("expected bare array"),
        }
        let env = r#"{"issues":[],"errors":[{"message":"Failed to load configurations"}]}"#;
        match serde_json::from_str::<AnalyzerOutput>(env).unwrap() {
            AnalyzerOutput::Envelope { issues, errors } => {
                assert!(issues.is_empty());
                assert_eq!(errors[0].text(), "Failed to load configurations");
            }
            _ => panic!("expected envelope"),
        }
    }

    #[test]
    fn test_rejects_object_without_issues() {
        assert!(serde_json::from_str::<AnalyzerOutput>(r#"{"status":"ok"}"#).is_err());
    }

    #[test]
    fn test_rejects_issue_missing_rule() {
        let bad = r#"[{"message":"m","range":{"filename":"a.tf","start":{"line":1,"column":1}}}]"#;
        assert!(serde_json::from_str::<AnalyzerOutput>(bad).is_err());
    }
}
