//! CLI argument parsing via `clap`.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tfgate",
    version,
    about = "Incremental Terraform lint gate",
    long_about = "tfgate lints and format-checks only the Terraform directories touched by a change, merges the analyzer's findings into one report, and decides whether the change should be blocked.\n\nConfiguration precedence: CLI > tfgate.toml > defaults.",
    after_help = "Examples:\n  tfgate lint --base origin/main --head HEAD\n  tfgate lint --changed-files changed.txt --fail-on-warnings\n  tfgate fmt --base origin/main --report-path .tfgate/fmt.md\n  tfgate scope --base origin/main\n  tfgate default-config --write .tflint.hcl",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(long, short, global = true, action = clap::ArgAction::SetTrue, help = "Enable debug logging (overridden by TFGATE_LOG)")]
    pub verbose: bool,
    #[arg(long, global = true, action = clap::ArgAction::SetTrue, help = "Emit logs as JSON lines on stderr")]
    pub log_json: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Clone, Default)]
/// Options shared by every command that resolves a change scope.
pub struct ScopeArgs {
    #[arg(long, help = "Repository root (default: current dir)")]
    pub repo_root: Option<String>,
    #[arg(long, help = "Directory the glob patterns are relative to (default: .)")]
    pub working_root: Option<String>,
    #[arg(long, help = "Base revision to compare against (default: origin/main)")]
    pub base: Option<String>,
    #[arg(long, help = "Head revision (default: HEAD)")]
    pub head: Option<String>,
    #[arg(long, help = "Read changed paths from a file instead of git ('-' for stdin)")]
    pub changed_files: Option<String>,
}

#[derive(Args, Clone, Default)]
/// Options shared by commands that run external tools and publish a report.
pub struct RunArgs {
    #[arg(long, help = "Maximum parallel invocations (default: CPU count)")]
    pub jobs: Option<usize>,
    #[arg(long, help = "Per-invocation timeout in seconds (default: 300)")]
    pub timeout_secs: Option<u64>,
    #[arg(long, help = "Output mode: human|json (default: human)")]
    pub output: Option<String>,
    #[arg(long, help = "Write the rendered report here instead of stdout")]
    pub report_path: Option<String>,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current tfgate version.")]
    Version,
    /// Lint changed directories
    #[command(
        about = "Run the analyzer on changed directories",
        long_about = "Resolve changed Terraform files to their directories, run the analyzer once per directory, merge and classify the findings, publish one report, and exit non-zero when the change should be blocked.",
        after_help = "Exit codes:\n  0  passed or nothing to check\n  1  blocked by policy\n  2  configuration, scope or publish failure"
    )]
    Lint {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, help = "Analyzer config file (default: built-in ruleset)")]
        config: Option<String>,
        #[arg(long, help = "Expected analyzer version (default: latest)")]
        analyzer_version: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "no_fail_on_warnings", help = "Block on warnings too")]
        fail_on_warnings: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Do not block on warnings even if configured")]
        no_fail_on_warnings: bool,
    },
    /// Check formatting of changed files
    #[command(
        about = "Check formatting of changed files",
        long_about = "Run the formatter in check-only diff mode on every changed Terraform file and publish one report. Files are never rewritten."
    )]
    Fmt {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the directories a change would analyze
    #[command(
        about = "Print the analysis scope",
        long_about = "Print the unique directories containing changed Terraform files, one per line, in analysis order."
    )]
    Scope {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Print or write the built-in analyzer config
    #[command(
        about = "Print the built-in analyzer config",
        long_about = "Print the built-in analyzer ruleset, or write it to a file to start a custom config."
    )]
    DefaultConfig {
        #[arg(long, help = "Write to this path instead of stdout")]
        write: Option<String>,
    },
}
