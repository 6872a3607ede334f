//! Test suite specification loading
//!
//! A spec is a JSON object mapping function names to arrays of cases:
//!
//! ```json
//! {
//!     "add": [
//!         {"params": {"a": 1, "b": 2}, "results": [3]},
//!         {"params": {"a": 0.1, "b": 0.2}, "results": [0.3]}
//!     ]
//! }
//! ```
//!
//! Functions keep the order they appear in the document. When a function name
//! is repeated, the last array wins but the first position is kept.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One invocation of a target function and the values it should return.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestCaseSpec {
    /// Named arguments passed to the target
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Expected return values, one per returned value in order
    #[serde(default)]
    pub results: Vec<Value>,
}

/// All cases for one target function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCases {
    pub name: String,
    pub cases: Vec<TestCaseSpec>,
}

/// The full JSON document: every function and its cases, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestSuiteSpec {
    functions: Vec<FunctionCases>,
}

/// Errors raised while loading a spec. All of them abort the run.
#[derive(Debug, Error, Diagnostic)]
pub enum SpecLoadError {
    #[error("failed to read test spec '{}'", path.display())]
    #[diagnostic(code(jsontest::spec::io), help("check that the file exists and is readable"))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test spec: {message}")]
    #[diagnostic(
        code(jsontest::spec::parse),
        help("expected an object mapping function names to arrays of {{\"params\": {{..}}, \"results\": [..]}}")
    )]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("invalid test spec: {message}")]
    #[diagnostic(code(jsontest::spec::shape))]
    Shape { message: String },
}

impl TestSuiteSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a spec from JSON text. `origin` names the source in diagnostics.
    pub fn parse(source: &str, origin: &str) -> Result<Self, SpecLoadError> {
        serde_json::from_str(source).map_err(|e| parse_error(&e, source, origin))
    }

    /// Build a spec from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, SpecLoadError> {
        serde_json::from_value(value).map_err(|e| SpecLoadError::Shape { message: e.to_string() })
    }

    /// Add (or replace) the cases for a function.
    pub fn insert(&mut self, name: impl Into<String>, cases: Vec<TestCaseSpec>) {
        let name = name.into();
        match self.functions.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.cases = cases,
            None => self.functions.push(FunctionCases { name, cases }),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, cases: Vec<TestCaseSpec>) -> Self {
        self.insert(name, cases);
        self
    }

    /// Functions in document order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionCases> {
        self.functions.iter()
    }

    pub fn get(&self, name: &str) -> Option<&[TestCaseSpec]> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.cases.as_slice())
    }

    /// Number of functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Total number of cases across all functions.
    pub fn case_count(&self) -> usize {
        self.functions.iter().map(|f| f.cases.len()).sum()
    }
}

impl FromStr for TestSuiteSpec {
    type Err = SpecLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, "<string>")
    }
}

impl<'de> Deserialize<'de> for TestSuiteSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = TestSuiteSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping function names to arrays of test cases")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut spec = TestSuiteSpec::new();
                while let Some((name, cases)) = map.next_entry::<String, Vec<TestCaseSpec>>()? {
                    spec.insert(name, cases);
                }
                Ok(spec)
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

impl Serialize for TestSuiteSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.functions.len()))?;
        for function in &self.functions {
            map.serialize_entry(&function.name, &function.cases)?;
        }
        map.end()
    }
}

/// Read and parse a spec file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_spec_file(path: impl AsRef<Path>) -> Result<TestSuiteSpec, SpecLoadError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| SpecLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let spec = TestSuiteSpec::parse(&source, &path.display().to_string())?;
    tracing::debug!(functions = spec.len(), cases = spec.case_count(), "loaded test spec");
    Ok(spec)
}

fn parse_error(err: &serde_json::Error, source: &str, origin: &str) -> SpecLoadError {
    let span = offset_of(source, err.line(), err.column()).map(|offset| SourceSpan::from((offset, 0)));
    SpecLoadError::Parse {
        message: err.to_string(),
        src: NamedSource::new(origin, source.to_string()),
        span,
    }
}

/// Convert serde_json's 1-based line and column into a byte offset.
fn offset_of(source: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    let line_len = source[line_start..].find('\n').unwrap_or(source.len() - line_start);
    Some(line_start + column.saturating_sub(1).min(line_len))
}
