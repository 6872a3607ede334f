//! Test synthesis and aggregation
//!
//! Every case of the spec becomes one named test closure. Cases of the same
//! function share a group named `Test_<function>`, and each case is named
//! `test_<index>` after its position in the spec, so the third `add` case of
//! the main scope is `__main__.Test_add.test_2`.
//!
//! A test calls its target with the case's named parameters, turns the return
//! into a sequence and compares it pairwise with the expected results. The
//! first mismatching pair fails the test.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::compare::{FloatTolerance, Mismatch, assert_close_or_equal};
use crate::config::RunConfig;
use crate::error::Result;
use crate::registry::{CallError, Registry, ResolutionError, Target};
use crate::spec::{TestCaseSpec, TestSuiteSpec, load_spec_file};

/// Fully qualified test name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestId {
    pub module: String,
    pub function: String,
    pub index: usize,
}

impl TestId {
    pub fn new(module: impl Into<String>, function: impl Into<String>, index: usize) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            index,
        }
    }

    /// `Test_<function>`
    pub fn group(&self) -> String {
        format!("Test_{}", self.function)
    }

    /// `test_<index>`
    pub fn method(&self) -> String {
        format!("test_{}", self.index)
    }

    /// `test_0 (__main__.Test_add)`, as printed by the text reporter.
    pub fn description(&self) -> String {
        format!("{} ({}.{})", self.method(), self.module, self.group())
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.module, self.group(), self.method())
    }
}

/// Why a test did not pass.
#[derive(Debug)]
pub enum CaseFailure {
    /// Returned value `position` did not match its expected value.
    Assertion { position: usize, mismatch: Mismatch },
    /// The target returned an error.
    Call(CallError),
    /// The target panicked.
    Panic(String),
}

impl CaseFailure {
    pub fn is_assertion(&self) -> bool {
        matches!(self, CaseFailure::Assertion { .. })
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseFailure::Assertion { position, mismatch } => {
                write!(f, "AssertionError: result[{position}]: {mismatch}")
            }
            CaseFailure::Call(err) => write!(f, "CallError: {err}"),
            CaseFailure::Panic(message) => write!(f, "Panic: {message}"),
        }
    }
}

impl std::error::Error for CaseFailure {}

type TestFn = dyn Fn() -> std::result::Result<(), CaseFailure>;

/// One named, runnable test.
pub struct TestCase {
    id: TestId,
    body: Box<TestFn>,
}

impl TestCase {
    pub fn new<F>(id: TestId, body: F) -> Self
    where
        F: Fn() -> std::result::Result<(), CaseFailure> + 'static,
    {
        Self {
            id,
            body: Box::new(body),
        }
    }

    pub fn id(&self) -> &TestId {
        &self.id
    }

    /// Run the test body. Panics inside the target are caught and reported.
    pub fn run(&self) -> std::result::Result<(), CaseFailure> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)())) {
            Ok(outcome) => outcome,
            Err(payload) => Err(CaseFailure::Panic(panic_message(&*payload))),
        }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Ordered collection of tests.
#[derive(Debug, Default)]
pub struct TestSuite {
    tests: Vec<TestCase>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.iter()
    }
}

impl Extend<TestCase> for TestSuite {
    fn extend<I: IntoIterator<Item = TestCase>>(&mut self, iter: I) {
        self.tests.extend(iter);
    }
}

impl IntoIterator for TestSuite {
    type Item = TestCase;
    type IntoIter = std::vec::IntoIter<TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.into_iter()
    }
}

/// Build the test body for one case.
pub fn generate_test(
    id: &TestId,
    target: Arc<Target>,
    params: Map<String, Value>,
    expected: Vec<Value>,
    tolerance: FloatTolerance,
) -> impl Fn() -> std::result::Result<(), CaseFailure> + 'static {
    let name = id.to_string();
    move || {
        let returned = target.call(&params).map_err(CaseFailure::Call)?.into_values();

        if returned.len() != expected.len() {
            tracing::warn!(
                test = %name,
                expected = expected.len(),
                returned = returned.len(),
                "result count differs from expected, comparing the common prefix"
            );
        }

        for (position, (e, r)) in expected.iter().zip(&returned).enumerate() {
            assert_close_or_equal(e, r, tolerance).map_err(|mismatch| CaseFailure::Assertion { position, mismatch })?;
        }
        Ok(())
    }
}

/// Build one test per case of a single function.
pub fn generate_tests(
    module: &str,
    target: &Arc<Target>,
    cases: &[TestCaseSpec],
    tolerance: FloatTolerance,
) -> Vec<TestCase> {
    cases
        .iter()
        .enumerate()
        .map(|(index, case)| {
            let id = TestId::new(module, target.name(), index);
            let body = generate_test(&id, Arc::clone(target), case.params.clone(), case.results.clone(), tolerance);
            TestCase::new(id, body)
        })
        .collect()
}

/// Resolve every function of `spec` in `module` and build the suite.
///
/// All names are resolved before any test is built, so an unknown function
/// fails here and no test of the spec runs.
#[tracing::instrument(skip_all, fields(module = module.unwrap_or(""), functions = spec.len()))]
pub fn generate_test_suite(
    spec: &TestSuiteSpec,
    registry: &Registry,
    module: Option<&str>,
    tolerance: FloatTolerance,
) -> std::result::Result<TestSuite, ResolutionError> {
    let scope = registry.module(module)?;
    let resolved = spec
        .functions()
        .map(|function| scope.resolve(&function.name).map(|target| (target, function)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut suite = TestSuite::new();
    for (target, function) in resolved {
        suite.extend(generate_tests(scope.name(), &target, &function.cases, tolerance));
    }

    tracing::debug!(tests = suite.len(), "generated test suite");
    Ok(suite)
}

/// Load a spec file and build its suite.
pub fn generate_test_suite_from_json_file(
    json_file: impl AsRef<Path>,
    registry: &Registry,
    config: &RunConfig,
) -> Result<TestSuite> {
    let spec = load_spec_file(json_file)?;
    let suite = generate_test_suite(&spec, registry, config.module(), config.float_tolerance)?;
    Ok(suite)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "target panicked".to_string()
    }
}
