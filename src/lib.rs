//! tfgate core library.
//!
//! Incremental lint gate for Terraform changes: only directories touched by
//! a change are analyzed, the analyzer's per-directory findings are merged
//! into one deduplicated report, and a policy decides whether to block.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `scope`: Changed paths → directories to analyze.
//! - `materialize`: User analyzer config or the built-in ruleset.
//! - `exec`: Subprocess execution with timeouts.
//! - `invoker`: Per-directory analyzer fan-out.
//! - `aggregate`: Parsing, merging and deduplicating findings.
//! - `output`: Markdown report plus human/JSON printers.
//! - `policy`: Pass/fail decision.
//! - `format`: Formatter check of changed files.
//! - `publish`: Report delivery.
//! - `lint`: End-to-end pipelines.
//! - `models`: Data models shared by the stages.
//! - `error`: Fatal error types.
//! - `utils`: Supporting helpers.
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod format;
pub mod invoker;
pub mod lint;
pub mod materialize;
pub mod models;
pub mod output;
pub mod policy;
pub mod publish;
pub mod scope;
pub mod utils;
