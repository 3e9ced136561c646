//! Configuration discovery and effective settings resolution.
//!
//! tfgate reads `tfgate.toml|yaml|yml` from the repository root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `analyzer_version`: `latest`, `analyzer_bin`: `tflint`
//! - `config`: empty (built-in ruleset)
//! - `working_root`: `.`, `patterns`: `["**/*.tf"]`
//! - `base`/`head`: `origin/main`/`HEAD`
//! - `fail_on_warnings`: false
//! - `jobs`: available parallelism, `timeout_secs`: 300, `init`: true
//! - `output`: `human`, `state_dir`: `.tfgate`
//! - `report.path`: empty (stdout), `report.include_info_in_summary`: false
//! - `format.bin`: `terraform`, `format.patterns`: `["**/*.tf", "**/*.tfvars"]`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::ConfigError;
use crate::models::Severity;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Deserialize, Clone)]
/// Report section under `[report]`.
pub struct ReportCfg {
    pub path: Option<String>,
    pub include_info_in_summary: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Formatter section under `[format]`.
pub struct FormatCfg {
    pub bin: Option<String>,
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
/// Root configuration loaded from `tfgate.toml|yaml`.
pub struct GateConfig {
    pub analyzer_version: Option<String>,
    pub analyzer_bin: Option<String>,
    pub config: Option<String>,
    pub working_root: Option<String>,
    pub fail_on_warnings: Option<bool>,
    pub patterns: Option<Vec<String>>,
    pub base: Option<String>,
    pub head: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub init: Option<bool>,
    pub output: Option<String>,
    pub state_dir: Option<String>,
    pub report: Option<ReportCfg>,
    /// `[severity]` rule → severity overrides.
    pub severity: Option<BTreeMap<String, String>>,
    pub format: Option<FormatCfg>,
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line; `None` defers to the config file.
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub analyzer_version: Option<String>,
    pub config: Option<String>,
    pub working_root: Option<String>,
    pub fail_on_warnings: Option<bool>,
    pub base: Option<String>,
    pub head: Option<String>,
    pub changed_files: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub output: Option<String>,
    pub report_path: Option<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub analyzer_version: String,
    pub analyzer_bin: String,
    pub config: String,
    pub working_root: String,
    pub fail_on_warnings: bool,
    pub patterns: Vec<String>,
    pub base: String,
    pub head: String,
    pub changed_files: Option<PathBuf>,
    pub jobs: usize,
    pub timeout: Duration,
    pub init: bool,
    pub output: String,
    pub state_dir: PathBuf,
    pub report_path: Option<PathBuf>,
    pub include_info_in_summary: bool,
    pub severity_overrides: BTreeMap<String, Severity>,
    /// The `tfgate.toml|yaml|yml` that was loaded, if any.
    pub config_file: Option<PathBuf>,
    pub format_bin: String,
    pub format_patterns: Vec<String>,
}

impl Effective {
    /// Absolute-or-repo-relative path of the working root.
    pub fn working_dir(&self) -> PathBuf {
        if self.working_root == "." {
            self.repo_root.clone()
        } else {
            self.repo_root.join(&self.working_root)
        }
    }

    /// Location of the merged violation document.
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("violations.json")
    }
}

const CONFIG_NAMES: [&str; 3] = ["tfgate.toml", "tfgate.yaml", "tfgate.yml"];

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `tfgate.toml|yaml|yml` or a `.git` entry is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) if !p.as_os_str().is_empty() => cur = p,
            _ => return start.to_path_buf(),
        }
    }
}

/// Load `GateConfig` from `tfgate.toml` or `tfgate.yaml|yml` if present,
/// along with the path it was read from.
///
/// A present but unparseable file is an error, never silently skipped.
pub fn load_config(root: &Path) -> Result<Option<(PathBuf, GateConfig)>, ConfigError> {
    for name in CONFIG_NAMES {
        let path = root.join(name);
        if !path.is_file() {
            continue;
        }
        let s = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed = if name.ends_with(".toml") {
            toml::from_str::<GateConfig>(&s).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<GateConfig>(&s).map_err(|e| e.to_string())
        };
        return match parsed {
            Ok(cfg) => Ok(Some((path, cfg))),
            Err(reason) => Err(ConfigError::Parse { path, reason }),
        };
    }
    Ok(None)
}

fn normalize_root(repo_root: &Path, raw: &str) -> String {
    let raw = raw.trim();
    let rel = if Path::new(raw).is_absolute() {
        let abs_repo = fs::canonicalize(repo_root).unwrap_or_else(|_| repo_root.to_path_buf());
        let abs_raw = fs::canonicalize(raw).unwrap_or_else(|_| PathBuf::from(raw));
        pathdiff::diff_paths(&abs_raw, &abs_repo)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| raw.to_string())
    } else {
        raw.to_string()
    };
    let rel = rel.replace('\\', "/");
    let rel = rel.trim_end_matches('/');
    let rel = rel.strip_prefix("./").unwrap_or(rel);
    if rel.is_empty() {
        ".".to_string()
    } else {
        rel.to_string()
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective, ConfigError> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let (config_file, cfg) = match load_config(&repo_root)? {
        Some((path, cfg)) => (Some(path), cfg),
        None => (None, GateConfig::default()),
    };
    let report = cfg.report.clone().unwrap_or_default();
    let fmt = cfg.format.clone().unwrap_or_default();

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(ConfigError::Invalid {
            key: "output".into(),
            reason: format!("expected human|json, got '{}'", output),
        });
    }

    let jobs = cli.jobs.or(cfg.jobs).unwrap_or_else(default_jobs);
    if jobs == 0 {
        return Err(ConfigError::Invalid {
            key: "jobs".into(),
            reason: "must be at least 1".into(),
        });
    }
    let timeout_secs = cli.timeout_secs.or(cfg.timeout_secs).unwrap_or(300);
    if timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            key: "timeout_secs".into(),
            reason: "must be at least 1".into(),
        });
    }

    let mut severity_overrides = BTreeMap::new();
    for (rule, sev) in cfg.severity.unwrap_or_default() {
        let parsed = sev.parse::<Severity>().map_err(|reason| ConfigError::Invalid {
            key: format!("severity.{}", rule),
            reason,
        })?;
        severity_overrides.insert(rule, parsed);
    }

    let working_root = normalize_root(
        &repo_root,
        cli.working_root
            .as_deref()
            .or(cfg.working_root.as_deref())
            .unwrap_or("."),
    );
    let state_dir = repo_root.join(cfg.state_dir.as_deref().unwrap_or(".tfgate"));
    let report_path = cli
        .report_path
        .clone()
        .or(report.path)
        .filter(|p| !p.trim().is_empty())
        .map(|p| repo_root.join(p));

    Ok(Effective {
        analyzer_version: cli
            .analyzer_version
            .clone()
            .or(cfg.analyzer_version)
            .unwrap_or_else(|| "latest".to_string()),
        analyzer_bin: cfg.analyzer_bin.unwrap_or_else(|| "tflint".to_string()),
        config: cli.config.clone().or(cfg.config).unwrap_or_default(),
        working_root,
        fail_on_warnings: cli.fail_on_warnings.or(cfg.fail_on_warnings).unwrap_or(false),
        patterns: cfg
            .patterns
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| vec!["**/*.tf".to_string()]),
        base: cli
            .base
            .clone()
            .or(cfg.base)
            .unwrap_or_else(|| "origin/main".to_string()),
        head: cli.head.clone().or(cfg.head).unwrap_or_else(|| "HEAD".to_string()),
        changed_files: cli.changed_files.as_ref().map(PathBuf::from),
        jobs,
        timeout: Duration::from_secs(timeout_secs),
        init: cfg.init.unwrap_or(true),
        output,
        state_dir,
        report_path,
        include_info_in_summary: report.include_info_in_summary.unwrap_or(false),
        severity_overrides,
        config_file,
        format_bin: fmt.bin.unwrap_or_else(|| "terraform".to_string()),
        format_patterns: fmt
            .patterns
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| vec!["**/*.tf".to_string(), "**/*.tfvars".to_string()]),
        repo_root,
    })
}
