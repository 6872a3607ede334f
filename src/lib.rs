#![forbid(unsafe_code)]
//! Data-driven testing from JSON files
//!
//! A JSON file maps function names to test cases:
//!
//! ```json
//! {"add": [{"params": {"a": 1, "b": 2}, "results": [3]}]}
//! ```
//!
//! Each name is resolved in a [`Registry`] of named [`Module`]s, each case
//! becomes one test that calls the function with the given named parameters
//! and compares its return values against `results`. Float-only values are
//! compared with a relative tolerance, everything else structurally.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Target functions**: a panicking target is caught by the runner and reported as an error for that test only.

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod registry;
pub mod runner;
pub mod spec;
pub mod suite;
pub mod targets;
pub mod version;

pub use compare::{FloatTolerance, Mismatch, assert_close_or_equal};
pub use config::{RunConfig, Verbosity};
pub use error::{Error, Result};
pub use registry::{Args, CallError, Module, Registry, ResolutionError, Returns, Target};
pub use runner::{RunSummary, TestReporter, TextReporter, run_json_tests, run_json_tests_with, run_suite};
pub use spec::{SpecLoadError, TestCaseSpec, TestSuiteSpec, load_spec_file};
pub use suite::{TestSuite, generate_test_suite, generate_test_suite_from_json_file};
