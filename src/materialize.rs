//! Analyzer configuration resolution.
//!
//! A run uses exactly one analyzer config: the user's file when it exists,
//! otherwise the built-in ruleset written into the run's state directory.
//! User files are used verbatim and never merged with the defaults.

use crate::error::ConfigError;
use crate::models::Severity;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Version stamp of the built-in ruleset. Bump whenever `DEFAULT_RULES` changes.
pub const DEFAULT_CONFIG_VERSION: &str = "1";

/// File name of the materialized built-in config inside the state directory.
pub const DEFAULT_CONFIG_FILE: &str = "tflint.default.hcl";

/// One rule of the built-in ruleset.
pub struct DefaultRule {
    pub name: &'static str,
    pub severity: Severity,
    /// Extra `key = value` lines rendered inside the rule block.
    pub attrs: &'static [(&'static str, &'static str)],
}

/// Built-in ruleset with its initial severity tiers.
///
/// Structural and deprecation problems are errors, style and convention
/// problems are warnings, documentation completeness is notice or info.
pub const DEFAULT_RULES: &[DefaultRule] = &[
    DefaultRule { name: "terraform_deprecated_interpolation", severity: Severity::Error, attrs: &[] },
    DefaultRule { name: "terraform_deprecated_index", severity: Severity::Error, attrs: &[] },
    DefaultRule { name: "terraform_map_duplicate_keys", severity: Severity::Error, attrs: &[] },
    DefaultRule { name: "terraform_module_pinned_source", severity: Severity::Error, attrs: &[("style", "\"flexible\"")] },
    DefaultRule { name: "terraform_module_version", severity: Severity::Error, attrs: &[] },
    DefaultRule { name: "terraform_required_version", severity: Severity::Error, attrs: &[] },
    DefaultRule { name: "terraform_required_providers", severity: Severity::Error, attrs: &[] },
    DefaultRule { name: "terraform_naming_convention", severity: Severity::Warning, attrs: &[("format", "\"snake_case\"")] },
    DefaultRule { name: "terraform_typed_variables", severity: Severity::Warning, attrs: &[] },
    DefaultRule { name: "terraform_comment_syntax", severity: Severity::Warning, attrs: &[] },
    DefaultRule { name: "terraform_standard_module_structure", severity: Severity::Warning, attrs: &[] },
    DefaultRule { name: "terraform_unused_declarations", severity: Severity::Warning, attrs: &[] },
    DefaultRule { name: "terraform_unused_required_providers", severity: Severity::Warning, attrs: &[] },
    DefaultRule { name: "terraform_documented_variables", severity: Severity::Notice, attrs: &[] },
    DefaultRule { name: "terraform_documented_outputs", severity: Severity::Info, attrs: &[] },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    User,
    BuiltIn { version: &'static str },
}

#[derive(Debug, Clone)]
/// The analyzer config shared by every invocation of a run.
pub struct ResolvedConfig {
    /// Absolute path handed to the analyzer.
    pub path: PathBuf,
    pub source: ConfigSource,
    /// Rule → severity remapping applied during aggregation.
    pub severity_overrides: BTreeMap<String, Severity>,
}

impl ResolvedConfig {
    /// Short identifier shown in reports.
    pub fn describe(&self) -> String {
        match &self.source {
            ConfigSource::User => self.path.display().to_string(),
            ConfigSource::BuiltIn { version } => format!("built-in ruleset v{}", version),
        }
    }
}

/// Render the built-in ruleset as analyzer HCL.
pub fn render_default_config() -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# tfgate built-in analyzer configuration v{}\n\n",
        DEFAULT_CONFIG_VERSION
    ));
    out.push_str("config {\n  call_module_type = \"local\"\n  force = false\n}\n\n");
    out.push_str("plugin \"terraform\" {\n  enabled = true\n  preset  = \"recommended\"\n}\n");
    for rule in DEFAULT_RULES {
        out.push_str(&format!("\n# severity: {}\n", rule.severity));
        out.push_str(&format!("rule \"{}\" {{\n  enabled = true\n", rule.name));
        for (k, v) in rule.attrs {
            out.push_str(&format!("  {} = {}\n", k, v));
        }
        out.push_str("}\n");
    }
    out
}

/// Severity tiers of the built-in ruleset.
pub fn default_severities() -> BTreeMap<String, Severity> {
    DEFAULT_RULES
        .iter()
        .map(|r| (r.name.to_string(), r.severity))
        .collect()
}

fn absolutize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Resolve the analyzer config for a run.
///
/// - `user_path` empty or not an existing file ⇒ built-in ruleset, written
///   to `state_dir/tflint.default.hcl`, with its severity tiers applied.
/// - otherwise ⇒ the user's file verbatim.
///
/// `overrides` (from the run configuration) always win over the tiers.
pub fn materialize(
    repo_root: &Path,
    user_path: &str,
    state_dir: &Path,
    overrides: &BTreeMap<String, Severity>,
) -> Result<ResolvedConfig, ConfigError> {
    let trimmed = user_path.trim();
    if !trimmed.is_empty() {
        let candidate = repo_root.join(trimmed);
        if candidate.is_file() {
            info!(path = %candidate.display(), "using user-supplied analyzer config");
            return Ok(ResolvedConfig {
                path: absolutize(&candidate),
                source: ConfigSource::User,
                severity_overrides: overrides.clone(),
            });
        }
        warn!(path = %candidate.display(), "analyzer config not found; falling back to built-in ruleset");
    }

    fs::create_dir_all(state_dir).map_err(|source| ConfigError::Write {
        path: state_dir.to_path_buf(),
        source,
    })?;
    let path = state_dir.join(DEFAULT_CONFIG_FILE);
    fs::write(&path, render_default_config()).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    let mut severity_overrides = default_severities();
    severity_overrides.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
    info!(path = %path.display(), version = DEFAULT_CONFIG_VERSION, "materialized built-in analyzer config");
    Ok(ResolvedConfig {
        path: absolutize(&path),
        source: ConfigSource::BuiltIn {
            version: DEFAULT_CONFIG_VERSION,
        },
        severity_overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_path_materializes_builtin() {
        let dir = tempdir().unwrap();
        let state = dir.path().join(".tfgate");
        let cfg = materialize(dir.path(), "", &state, &BTreeMap::new()).unwrap();
        assert_eq!(cfg.source, ConfigSource::BuiltIn { version: DEFAULT_CONFIG_VERSION });
        assert!(cfg.path.is_absolute());
        let body = fs::read_to_string(&cfg.path).unwrap();
        assert_eq!(body, render_default_config());
        assert_eq!(
            cfg.severity_overrides.get("terraform_documented_outputs"),
            Some(&Severity::Info)
        );
    }

    #[test]
    fn test_missing_user_file_falls_back() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state");
        let cfg = materialize(dir.path(), "nope/.tflint.hcl", &state, &BTreeMap::new()).unwrap();
        assert!(matches!(cfg.source, ConfigSource::BuiltIn { .. }));
        assert!(state.join(DEFAULT_CONFIG_FILE).is_file());
    }

    #[test]
    fn test_user_file_used_verbatim_without_default_tiers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".tflint.hcl"), "plugin \"aws\" {}\n").unwrap();
        let mut ov = BTreeMap::new();
        ov.insert("aws_instance_invalid_type".to_string(), Severity::Warning);
        let cfg = materialize(dir.path(), ".tflint.hcl", &dir.path().join("s"), &ov).unwrap();
        assert_eq!(cfg.source, ConfigSource::User);
        assert_eq!(fs::read_to_string(&cfg.path).unwrap(), "plugin \"aws\" {}\n");
        assert_eq!(cfg.severity_overrides, ov);
        assert!(!dir.path().join("s").exists());
    }

    #[test]
    fn test_overrides_win_over_builtin_tiers() {
        let dir = tempdir().unwrap();
        let mut ov = BTreeMap::new();
        ov.insert("terraform_naming_convention".to_string(), Severity::Error);
        let cfg = materialize(dir.path(), "", &dir.path().join("s"), &ov).unwrap();
        assert_eq!(
            cfg.severity_overrides.get("terraform_naming_convention"),
            Some(&Severity::Error)
        );
    }

    #[test]
    fn test_default_config_is_deterministic_and_complete() {
        let a = render_default_config();
        assert_eq!(a, render_default_config());
        for rule in DEFAULT_RULES {
            assert!(a.contains(&format!("rule \"{}\"", rule.name)));
        }
        assert!(a.contains("format = \"snake_case\""));
    }
}
