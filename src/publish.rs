//! Feedback delivery.
//!
//! The pipeline calls `publish` exactly once per run with the complete
//! rendered report; a run with nothing in scope publishes nothing. Posting
//! the report to a review system is the job of whatever consumes the file
//! written here.

use crate::error::PublishError;
use crate::models::Decision;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

pub trait Publisher {
    fn publish(&self, report: &str, decision: &Decision) -> Result<(), PublishError>;
}

/// Writes the report to a file for a later review-comment step.
pub struct FilePublisher {
    pub path: PathBuf,
}

impl Publisher for FilePublisher {
    fn publish(&self, report: &str, decision: &Decision) -> Result<(), PublishError> {
        let err = |source| PublishError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(err)?;
            }
        }
        fs::write(&self.path, report).map_err(err)?;
        info!(path = %self.path.display(), should_fail = decision.should_fail, "report published");
        Ok(())
    }
}

/// Writes the report to stdout.
pub struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn publish(&self, report: &str, _decision: &Decision) -> Result<(), PublishError> {
        let mut out = std::io::stdout().lock();
        out.write_all(report.as_bytes())
            .and_then(|_| out.flush())
            .map_err(PublishError::Stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_publisher_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let p = FilePublisher {
            path: dir.path().join("out/report.md"),
        };
        let d = Decision { should_fail: false, reason: "no findings".into() };
        p.publish("# report\n", &d).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out/report.md")).unwrap(), "# report\n");
    }

    #[test]
    fn test_file_publisher_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocker"), "file").unwrap();
        let p = FilePublisher {
            path: dir.path().join("blocker/report.md"),
        };
        let d = Decision { should_fail: true, reason: "x".into() };
        assert!(matches!(p.publish("r", &d), Err(PublishError::Write { .. })));
    }
}
