//! Command-line interface for `jsontest`
//!
//! ```text
//! jsontest <JSON_FILE> [--module NAME] [--verbosity 0|1|2] [--ftol RTOL]
//! jsontest --list-modules
//! ```
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use crate::compare::FloatTolerance;
use crate::config::{RunConfig, Verbosity};
use crate::registry::Registry;
use crate::runner::{TestReporter, TextReporter, run_json_tests_with};
use crate::targets::builtin_registry;
use crate::version::JSONTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a setup error through miette.
    pub fn diagnostic(error: crate::Error) -> Self {
        Self::failure(format!("{:?}", miette::Report::new(error)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run the test cases of a JSON file against registered functions
#[derive(Parser, Debug)]
#[command(name = "jsontest")]
#[command(version = JSONTEST_VERSION)]
#[command(about = "Run data-driven tests described in a JSON file", long_about = None)]
pub struct Cli {
    /// JSON file mapping function names to test cases
    #[arg(value_name = "JSON_FILE", required_unless_present = "list_modules")]
    pub json_file: Option<PathBuf>,

    /// Module to look functions up in (default: the main scope)
    #[arg(long, value_name = "NAME", default_value = "")]
    pub module: String,

    /// 0 = summary only, 1 = one character per test, 2 = one line per test
    #[arg(long, value_name = "LEVEL", default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=2))]
    pub verbosity: u8,

    /// Relative tolerance for float comparisons
    #[arg(long, value_name = "RTOL", default_value = "1e-7")]
    pub ftol: FloatTolerance,

    /// Print the available modules and their functions, then exit
    #[arg(long)]
    pub list_modules: bool,
}

impl Cli {
    /// Settings for the run described by these arguments.
    pub fn run_config(&self) -> CliResult<RunConfig> {
        let verbosity = Verbosity::try_from(self.verbosity).map_err(|e| CliError::failure(e.to_string()))?;
        Ok(RunConfig::new()
            .with_module(self.module.as_str())
            .with_float_tolerance(self.ftol)
            .with_verbosity(verbosity))
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command against the built-in registry.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let registry = builtin_registry();
    if cli.list_modules {
        return list_modules(&registry, &mut io::stdout());
    }

    let config = cli.run_config()?;
    let mut reporter = TextReporter::stderr(config.verbosity);
    execute_with(&cli, &registry, &config, &mut reporter)
}

/// Run the JSON file named by `cli` against `registry`.
pub fn execute_with(
    cli: &Cli,
    registry: &Registry,
    config: &RunConfig,
    reporter: &mut dyn TestReporter,
) -> CliResult<ExitCode> {
    let Some(json_file) = &cli.json_file else {
        return Err(CliError::failure("Error: a JSON file is required"));
    };

    let summary = run_json_tests_with(json_file, registry, config, reporter).map_err(CliError::diagnostic)?;
    tracing::info!(
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors,
        "run complete"
    );

    if summary.was_successful() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn list_modules(registry: &Registry, out: &mut dyn Write) -> CliResult<ExitCode> {
    let mut text = String::new();
    for module in registry.modules() {
        let functions: Vec<&str> = module.function_names().collect();
        text.push_str(&format!("{}: {}\n", module.name(), functions.join(", ")));
    }
    out.write_all(text.as_bytes())
        .map_err(|e| CliError::failure(format!("Error writing module list: {e}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Tests
// ============================================================================
