//! Suite runner and text reporting
//!
//! ## TestReporter Trait
//!
//! The runner uses a `TestReporter` trait to separate reporting from
//! execution. [`TextReporter`] prints unittest-style output; other formats
//! can be added by implementing the trait.
//!
//! Tests run one after another in suite order. A failing test is reported
//! once and never retried.

use std::cell::Cell;
use std::io::{self, Write};
use std::panic;
use std::path::Path;
use std::sync::Once;
use std::time::{Duration, Instant};

use crate::config::{RunConfig, Verbosity};
use crate::error::Result;
use crate::registry::Registry;
use crate::suite::{CaseFailure, TestId, TestSuite, generate_test_suite_from_json_file};

const SEPARATOR_HEAVY: &str = "======================================================================";
const SEPARATOR_LIGHT: &str = "----------------------------------------------------------------------";

/// Result of running a single test
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Passed(Duration),
    /// An expected value did not match
    Failed(Duration, String),
    /// The target could not be called or panicked
    Errored(Duration, String),
}

impl TestResult {
    fn from_outcome(outcome: std::result::Result<(), CaseFailure>, duration: Duration) -> Self {
        match outcome {
            Ok(()) => TestResult::Passed(duration),
            Err(failure) if failure.is_assertion() => TestResult::Failed(duration, failure.to_string()),
            Err(failure) => TestResult::Errored(duration, failure.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Passed(_))
    }
}

/// Summary of test run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn was_successful(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    fn record(&mut self, result: &TestResult) {
        self.total += 1;
        match result {
            TestResult::Passed(_) => self.passed += 1,
            TestResult::Failed(..) => self.failed += 1,
            TestResult::Errored(..) => self.errors += 1,
        }
    }
}

/// Trait for reporting test execution results.
pub trait TestReporter {
    /// Called before the first test runs
    fn on_run_start(&mut self, _test_count: usize) {}

    /// Called when a test begins
    fn on_test_start(&mut self, _test: &TestId) {}

    /// Called when a test completes
    fn on_test_complete(&mut self, test: &TestId, result: &TestResult);

    /// Called when all tests have completed
    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// unittest-style text output.
///
/// - verbosity 0: summary only
/// - verbosity 1: `.`, `F` or `E` per test
/// - verbosity 2: `test_0 (__main__.Test_add) ... ok` per test
///
/// Failure and error details are printed after the run, errors first.
pub struct TextReporter<W: Write> {
    out: W,
    verbosity: Verbosity,
    errors: Vec<(TestId, String)>,
    failures: Vec<(TestId, String)>,
}

impl TextReporter<io::Stderr> {
    pub fn stderr(verbosity: Verbosity) -> Self {
        Self::new(io::stderr(), verbosity)
    }
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W, verbosity: Verbosity) -> Self {
        Self {
            out,
            verbosity,
            errors: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // write errors are ignored
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn emit_details(&mut self, flavour: &str, entries: &[(TestId, String)]) {
        for (test, message) in entries {
            let block = format!(
                "{SEPARATOR_HEAVY}\n{flavour}: {}\n{SEPARATOR_LIGHT}\n{message}\n\n",
                test.description()
            );
            self.emit(&block);
        }
    }
}

impl<W: Write> TestReporter for TextReporter<W> {
    fn on_test_start(&mut self, test: &TestId) {
        if self.verbosity == Verbosity::Verbose {
            let line = format!("{} ... ", test.description());
            self.emit(&line);
        }
    }

    fn on_test_complete(&mut self, test: &TestId, result: &TestResult) {
        let (short, long) = match result {
            TestResult::Passed(_) => (".", "ok"),
            TestResult::Failed(..) => ("F", "FAIL"),
            TestResult::Errored(..) => ("E", "ERROR"),
        };

        match self.verbosity {
            Verbosity::Quiet => {}
            Verbosity::Normal => self.emit(short),
            Verbosity::Verbose => self.emit(&format!("{long}\n")),
        }

        match result {
            TestResult::Passed(_) => {}
            TestResult::Failed(_, message) => self.failures.push((test.clone(), message.clone())),
            TestResult::Errored(_, message) => self.errors.push((test.clone(), message.clone())),
        }
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        if self.verbosity == Verbosity::Normal && summary.total > 0 {
            self.emit("\n");
        }

        let errors = std::mem::take(&mut self.errors);
        let failures = std::mem::take(&mut self.failures);
        self.emit_details("ERROR", &errors);
        self.emit_details("FAIL", &failures);

        let plural = if summary.total == 1 { "" } else { "s" };
        let mut text = format!(
            "{SEPARATOR_LIGHT}\nRan {} test{plural} in {:.3}s\n\n",
            summary.total,
            summary.duration.as_secs_f64()
        );

        if summary.was_successful() {
            text.push_str("OK\n");
        } else {
            let mut parts = Vec::new();
            if summary.failed > 0 {
                parts.push(format!("failures={}", summary.failed));
            }
            if summary.errors > 0 {
                parts.push(format!("errors={}", summary.errors));
            }
            text.push_str(&format!("FAILED ({})\n", parts.join(", ")));
        }
        self.emit(&text);
    }
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static INSTALL_QUIET_HOOK: Once = Once::new();

/// Silences the panic hook on this thread until dropped. Caught target
/// panics are reported by the runner; other threads keep the previous hook.
struct QuietPanics {
    was_quiet: bool,
}

impl QuietPanics {
    fn enter() -> Self {
        INSTALL_QUIET_HOOK.call_once(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                if !QUIET_PANICS.with(Cell::get) {
                    previous(info);
                }
            }));
        });
        Self {
            was_quiet: QUIET_PANICS.with(|quiet| quiet.replace(true)),
        }
    }

    #[cfg(test)]
    fn is_active() -> bool {
        QUIET_PANICS.with(Cell::get)
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        QUIET_PANICS.with(|quiet| quiet.set(self.was_quiet));
    }
}

/// Run every test of `suite` in order.
#[tracing::instrument(skip_all, fields(test_count = suite.len()))]
pub fn run_suite(suite: &TestSuite, reporter: &mut dyn TestReporter) -> RunSummary {
    let _quiet = QuietPanics::enter();
    let start_time = Instant::now();
    let mut summary = RunSummary::default();

    reporter.on_run_start(suite.len());

    for test in suite.iter() {
        reporter.on_test_start(test.id());

        let start = Instant::now();
        let result = TestResult::from_outcome(test.run(), start.elapsed());
        tracing::debug!(test = %test.id(), passed = result.is_success(), "test finished");

        summary.record(&result);
        reporter.on_test_complete(test.id(), &result);
    }

    summary.duration = start_time.elapsed();
    reporter.on_run_complete(&summary);
    summary
}

/// Load `json_file`, build its suite and run it with `reporter`.
pub fn run_json_tests_with(
    json_file: impl AsRef<Path>,
    registry: &Registry,
    config: &RunConfig,
    reporter: &mut dyn TestReporter,
) -> Result<RunSummary> {
    let suite = generate_test_suite_from_json_file(json_file, registry, config)?;
    Ok(run_suite(&suite, reporter))
}

/// Load `json_file`, build its suite and run it, reporting to stderr.
pub fn run_json_tests(json_file: impl AsRef<Path>, registry: &Registry, config: &RunConfig) -> Result<RunSummary> {
    let mut reporter = TextReporter::stderr(config.verbosity);
    run_json_tests_with(json_file, registry, config, &mut reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::FloatTolerance;
    use crate::registry::{Args, CallError, Returns, Target};
    use crate::spec::TestSuiteSpec;
    use crate::suite::generate_test_suite;
    use serde_json::json;

    fn id(function: &str, index: usize) -> TestId {
        TestId::new("__main__", function, index)
    }

    fn render(verbosity: Verbosity, results: &[(TestId, TestResult)]) -> String {
        let mut reporter = TextReporter::new(Vec::new(), verbosity);
        let mut summary = RunSummary::default();
        reporter.on_run_start(results.len());
        for (test, result) in results {
            reporter.on_test_start(test);
            summary.record(result);
            reporter.on_test_complete(test, result);
        }
        reporter.on_run_complete(&summary);
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn mixed_results() -> Vec<(TestId, TestResult)> {
        vec![
            (id("add", 0), TestResult::Passed(Duration::ZERO)),
            (
                id("add", 1),
                TestResult::Failed(Duration::ZERO, "AssertionError: result[0]: 3 != 4".to_string()),
            ),
            (
                id("div", 0),
                TestResult::Errored(Duration::ZERO, "CallError: division by zero".to_string()),
            ),
        ]
    }

    #[test]
    fn test_quiet_report() {
        insta::assert_snapshot!(render(Verbosity::Quiet, &mixed_results()), @r"
        ======================================================================
        ERROR: test_0 (__main__.Test_div)
        ----------------------------------------------------------------------
        CallError: division by zero

        ======================================================================
        FAIL: test_1 (__main__.Test_add)
        ----------------------------------------------------------------------
        AssertionError: result[0]: 3 != 4

        ----------------------------------------------------------------------
        Ran 3 tests in 0.000s

        FAILED (failures=1, errors=1)
        ");
    }

    #[test]
    fn test_dots_report() {
        let results = vec![
            (id("add", 0), TestResult::Passed(Duration::ZERO)),
            (id("add", 1), TestResult::Passed(Duration::ZERO)),
        ];
        insta::assert_snapshot!(render(Verbosity::Normal, &results), @r"
        ..
        ----------------------------------------------------------------------
        Ran 2 tests in 0.000s

        OK
        ");
    }

    #[test]
    fn test_verbose_report_lines() {
        let text = render(Verbosity::Verbose, &mixed_results());
        let lines: Vec<&str> = text.lines().take(3).collect();
        assert_eq!(
            lines,
            [
                "test_0 (__main__.Test_add) ... ok",
                "test_1 (__main__.Test_add) ... FAIL",
                "test_0 (__main__.Test_div) ... ERROR"
            ]
        );
    }

    #[test]
    fn test_empty_run_is_ok() {
        let text = render(Verbosity::Normal, &[]);
        assert!(text.starts_with(SEPARATOR_LIGHT), "{text}");
        assert!(text.contains("Ran 0 tests in"));
        assert!(text.ends_with("OK\n"));
    }

    #[test]
    fn test_single_test_is_singular() {
        let text = render(Verbosity::Quiet, &[(id("add", 0), TestResult::Passed(Duration::ZERO))]);
        assert!(text.contains("Ran 1 test in"), "{text}");
    }

    #[test]
    fn test_panic_output_is_silenced_only_during_a_run() {
        assert!(!QuietPanics::is_active());
        {
            let _outer = QuietPanics::enter();
            assert!(QuietPanics::is_active());
            {
                let _inner = QuietPanics::enter();
            }
            assert!(QuietPanics::is_active());
        }
        assert!(!QuietPanics::is_active());
    }

    #[test]
    fn test_panicking_target_leaves_report_clean() {
        struct Observer(Vec<bool>);
        impl TestReporter for Observer {
            fn on_test_start(&mut self, _test: &TestId) {
                self.0.push(QuietPanics::is_active());
            }
            fn on_test_complete(&mut self, _test: &TestId, _result: &TestResult) {}
            fn on_run_complete(&mut self, _summary: &RunSummary) {}
        }

        let mut registry = Registry::new();
        registry
            .main_scope_mut()
            .register(Target::new("explode", |_: &Args<'_>| panic!("boom")));
        let spec = TestSuiteSpec::from_value(json!({"explode": [{"params": {}, "results": []}]})).unwrap();
        let suite = generate_test_suite(&spec, &registry, None, FloatTolerance::DEFAULT).unwrap();

        let mut observer = Observer(Vec::new());
        let summary = run_suite(&suite, &mut observer);

        assert_eq!(summary.errors, 1);
        assert_eq!(observer.0, [true]);
        assert!(!QuietPanics::is_active());
    }

    #[test]
    fn test_run_suite_counts_outcomes() {
        let mut registry = Registry::new();
        registry.main_scope_mut().register(Target::new("half", |args: &Args<'_>| {
            let x: f64 = args.get("x")?;
            if x.is_nan() {
                return Err(CallError::failed("not a number"));
            }
            Returns::single(x / 2.0)
        }));

        let spec = TestSuiteSpec::from_value(json!({
            "half": [
                {"params": {"x": 3}, "results": [1.5]},
                {"params": {"x": 3}, "results": [2.5]},
                {"params": {"x": "three"}, "results": [1.5]}
            ]
        }))
        .unwrap();
        let suite = generate_test_suite(&spec, &registry, None, FloatTolerance::DEFAULT).unwrap();

        let mut reporter = TextReporter::new(Vec::new(), Verbosity::Normal);
        let summary = run_suite(&suite, &mut reporter);

        assert_eq!((summary.total, summary.passed, summary.failed, summary.errors), (3, 1, 1, 1));
        assert!(!summary.was_successful());

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.starts_with(".FE\n"), "{text}");
        assert!(text.contains("FAILED (failures=1, errors=1)"));
    }
}
