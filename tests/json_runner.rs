//! End-to-end tests: JSON file in, run summary and report out

use std::io::Write;
use std::path::{Path, PathBuf};

use jsontest::spec::SpecLoadError;
use jsontest::targets::builtin_registry;
use jsontest::{
    Args, Error, FloatTolerance, Module, Registry, ResolutionError, Returns, RunConfig, RunSummary, TextReporter,
    Verbosity, run_json_tests_with,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn write_spec(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("jsontest-")
        .suffix(".json")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn run(path: &Path, registry: &Registry, config: &RunConfig) -> (jsontest::Result<RunSummary>, String) {
    let mut reporter = TextReporter::new(Vec::new(), config.verbosity);
    let summary = run_json_tests_with(path, registry, config, &mut reporter);
    (summary, String::from_utf8(reporter.into_inner()).unwrap())
}

/// `add(a, b) = a + b` in the main scope, accepting ints or floats.
fn add_registry() -> Registry {
    let mut registry = Registry::new();
    registry.main_scope_mut().register(
        jsontest::Target::new("add", |args: &Args<'_>| {
            let a: f64 = args.get("a")?;
            let b: f64 = args.get("b")?;
            Returns::single(a + b)
        })
        .with_params(&["a", "b"]),
    );
    registry
}

#[test]
fn test_integer_addition_passes() {
    let file = write_spec(r#"{"add": [{"params": {"a": 1, "b": 2}, "results": [3]}]}"#);
    let (summary, report) = run(file.path(), &add_registry(), &RunConfig::new());

    let summary = summary.unwrap();
    assert_eq!((summary.total, summary.passed), (1, 1));
    assert!(summary.was_successful());
    assert!(report.contains("Ran 1 test in"), "{report}");
    assert!(report.ends_with("OK\n"), "{report}");
}

#[test]
fn test_float_tolerance_boundary() {
    let file = write_spec(r#"{"add": [{"params": {"a": 0.1, "b": 1e-10}, "results": [0.1]}]}"#);

    let (loose, _) = run(file.path(), &add_registry(), &RunConfig::new());
    assert!(loose.unwrap().was_successful());

    let tight_config = RunConfig::new().with_float_tolerance(FloatTolerance::new(1e-12).unwrap());
    let (tight, report) = run(file.path(), &add_registry(), &tight_config);
    let tight = tight.unwrap();
    assert_eq!(tight.failed, 1);
    assert!(report.contains("FAIL: test_0 (__main__.Test_add)"), "{report}");
    assert!(report.contains("Not equal to tolerance rtol=1e-12"), "{report}");
}

#[test]
fn test_unknown_function_fails_before_any_test_runs() {
    let (result, report) = run(&fixture("unknown_function.json"), &builtin_registry(), &RunConfig::new());

    match result {
        Err(Error::Resolution(ResolutionError::UnknownFunction { module, function })) => {
            assert_eq!(module, "__main__");
            assert_eq!(function, "no_such_function");
        }
        other => panic!("expected an unknown-function error, got {other:?}"),
    }
    assert!(report.is_empty(), "no test should have been reported: {report}");
}

#[test]
fn test_unknown_module() {
    let file = write_spec(r#"{"add": []}"#);
    let config = RunConfig::new().with_module("statistics");
    let (result, _) = run(file.path(), &builtin_registry(), &config);

    assert!(matches!(
        result,
        Err(Error::Resolution(ResolutionError::UnknownModule { ref name, .. })) if name == "statistics"
    ));
}

#[test]
fn test_builtin_fixture_passes() {
    let config = RunConfig::new().with_verbosity(Verbosity::Normal);
    let (summary, report) = run(&fixture("builtin_pass.json"), &builtin_registry(), &config);

    let summary = summary.unwrap();
    assert_eq!(summary.total, 6);
    assert!(summary.was_successful(), "{report}");
    assert!(report.starts_with("......\n"), "{report}");
}

#[test]
fn test_mixed_outcomes_are_all_reported() {
    let config = RunConfig::new().with_verbosity(Verbosity::Verbose);
    let (summary, report) = run(&fixture("builtin_mixed.json"), &builtin_registry(), &config);

    let summary = summary.unwrap();
    assert_eq!((summary.passed, summary.failed, summary.errors), (1, 1, 1));
    assert!(report.contains("test_0 (__main__.Test_add) ... FAIL"), "{report}");
    assert!(report.contains("test_0 (__main__.Test_divide) ... ERROR"), "{report}");
    assert!(report.contains("test_0 (__main__.Test_sqrt) ... ok"), "{report}");

    // errors are listed before failures
    let error_block = report.find("ERROR: test_0 (__main__.Test_divide)").unwrap();
    let fail_block = report.find("FAIL: test_0 (__main__.Test_add)").unwrap();
    assert!(error_block < fail_block);
    assert!(report.contains("CallError: division by zero"), "{report}");
    assert!(report.ends_with("FAILED (failures=1, errors=1)\n"), "{report}");
}

#[test]
fn test_named_module_selection() {
    let file = write_spec(r#"{"upper": [{"params": {"s": "ok"}, "results": ["OK"]}]}"#);

    let (in_text, report) = run(file.path(), &builtin_registry(), &RunConfig::new().with_module("text"));
    assert!(in_text.unwrap().was_successful());
    assert!(report.ends_with("OK\n"));

    let (in_math, _) = run(file.path(), &builtin_registry(), &RunConfig::new().with_module("math"));
    assert!(matches!(in_math, Err(Error::Resolution(ResolutionError::UnknownFunction { .. }))));
}

#[test]
fn test_malformed_json_reports_location() {
    let (result, _) = run(&fixture("malformed.json"), &builtin_registry(), &RunConfig::new());

    match result {
        Err(Error::SpecLoad(SpecLoadError::Parse { span, .. })) => assert!(span.is_some()),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_empty_spec_is_a_successful_run() {
    let file = write_spec("{}");
    let (summary, report) = run(file.path(), &builtin_registry(), &RunConfig::new());

    let summary = summary.unwrap();
    assert_eq!(summary.total, 0);
    assert!(summary.was_successful());
    assert!(report.contains("Ran 0 tests in"), "{report}");
}

#[test]
fn test_tuple_results_and_panics() {
    let mut registry = Registry::new();
    registry.register_module(
        Module::new("shapes")
            .function("bounds", &["values"], |args| {
                let values: Vec<i64> = args.get("values")?;
                let min = values.iter().min().copied();
                let max = values.iter().max().copied();
                Returns::tuple((min, max))
            })
            .function("explode", &[], |_| panic!("boom")),
    );

    let file = write_spec(
        r#"{
            "bounds": [{"params": {"values": [3, 1, 2]}, "results": [1, 3]}],
            "explode": [{"params": {}, "results": [null]}]
        }"#,
    );
    let config = RunConfig::new().with_module("shapes");
    let (summary, report) = run(file.path(), &registry, &config);

    let summary = summary.unwrap();
    assert_eq!((summary.passed, summary.errors), (1, 1));
    assert!(report.contains("ERROR: test_0 (shapes.Test_explode)"), "{report}");
    assert!(report.contains("Panic: boom"), "{report}");
}
