//! tfgate CLI binary entry point.
//! Resolves configuration, delegates to the library pipelines, and maps
//! outcomes to exit codes: 0 pass, 1 blocked by policy, 2 fatal error.

use clap::Parser;
use std::fs;
use tfgate::cli::{Cli, Commands, RunArgs, ScopeArgs};
use tfgate::config::{self, CliOverrides, Effective};
use tfgate::format::TerraformFmt;
use tfgate::invoker::Tflint;
use tfgate::lint::{self, FmtOutcome, LintOutcome};
use tfgate::publish::{FilePublisher, Publisher, StdoutPublisher};
use tfgate::{materialize, output, utils};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("TFGATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn fatal(e: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", utils::error_prefix(), e);
    std::process::exit(2);
}

fn overrides(scope: &ScopeArgs, run: Option<&RunArgs>) -> CliOverrides {
    let run = run.cloned().unwrap_or_default();
    CliOverrides {
        repo_root: scope.repo_root.clone(),
        working_root: scope.working_root.clone(),
        base: scope.base.clone(),
        head: scope.head.clone(),
        changed_files: scope.changed_files.clone(),
        jobs: run.jobs,
        timeout_secs: run.timeout_secs,
        output: run.output,
        report_path: run.report_path,
        ..Default::default()
    }
}

fn resolve(cli: &CliOverrides) -> Effective {
    let eff = config::resolve_effective(cli).unwrap_or_else(|e| fatal(e));
    if eff.config_file.is_none() {
        eprintln!("{} No tfgate.toml found; using defaults.", utils::note_prefix());
    }
    eff
}

/// Report destination. Without a configured path the report goes to
/// stdout, except in JSON mode where stdout carries the JSON document and
/// the report lands in the state directory instead.
fn publisher_for(eff: &Effective) -> Box<dyn Publisher> {
    match &eff.report_path {
        Some(path) => Box::new(FilePublisher { path: path.clone() }),
        None if eff.output == "json" => Box::new(FilePublisher {
            path: eff.state_dir.join("report.md"),
        }),
        None => Box::new(StdoutPublisher),
    }
}

fn wants_console(eff: &Effective) -> bool {
    eff.report_path.is_some() || eff.output == "json"
}

fn exit_for(should_fail: bool, reason: &str) -> ! {
    if should_fail {
        eprintln!("{} {}", utils::error_prefix(), reason);
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::DefaultConfig { write } => {
            let body = materialize::render_default_config();
            match write {
                Some(path) => {
                    if let Err(e) = fs::write(&path, body) {
                        fatal(format!("failed to write {}: {}", path, e));
                    }
                    eprintln!("{} wrote built-in ruleset to {}", utils::info_prefix(), path);
                }
                None => print!("{}", body),
            }
        }
        Commands::Scope { scope } => {
            let eff = resolve(&overrides(&scope, None));
            let source = lint::change_source(&eff);
            match lint::resolve_scope(&eff, &source, &eff.patterns) {
                Ok(s) => {
                    for dir in &s.directories {
                        println!("{}", dir);
                    }
                }
                Err(e) => fatal(e),
            }
        }
        Commands::Lint {
            scope,
            run,
            config: analyzer_config,
            analyzer_version,
            fail_on_warnings,
            no_fail_on_warnings,
        } => {
            let mut ov = overrides(&scope, Some(&run));
            ov.config = analyzer_config;
            ov.analyzer_version = analyzer_version;
            ov.fail_on_warnings = if fail_on_warnings {
                Some(true)
            } else if no_fail_on_warnings {
                Some(false)
            } else {
                None
            };
            let eff = resolve(&ov);
            let source = lint::change_source(&eff);
            let analyzer = Tflint::new(eff.analyzer_bin.clone(), eff.timeout);
            let publisher = publisher_for(&eff);
            match lint::run_lint(&eff, &source, &analyzer, publisher.as_ref()) {
                Ok(LintOutcome::NothingToCheck) => {
                    eprintln!("{} No changed Terraform files; nothing to check.", utils::info_prefix());
                }
                Ok(LintOutcome::Completed { report, decision, .. }) => {
                    if wants_console(&eff) {
                        output::print_lint(&report, &decision, &eff.output);
                    }
                    exit_for(decision.should_fail, &decision.reason);
                }
                Err(e) => fatal(e),
            }
        }
        Commands::Fmt { scope, run } => {
            let eff = resolve(&overrides(&scope, Some(&run)));
            let source = lint::change_source(&eff);
            let formatter = TerraformFmt::new(eff.format_bin.clone(), eff.timeout);
            let publisher = publisher_for(&eff);
            match lint::run_fmt(&eff, &source, &formatter, publisher.as_ref()) {
                Ok(FmtOutcome::NothingToCheck) => {
                    eprintln!("{} No changed Terraform files; nothing to check.", utils::info_prefix());
                }
                Ok(FmtOutcome::Completed { outcomes, decision, .. }) => {
                    if wants_console(&eff) {
                        output::print_fmt(&outcomes, &decision, &eff.output);
                    }
                    exit_for(decision.should_fail, &decision.reason);
                }
                Err(e) => fatal(e),
            }
        }
    }
}
