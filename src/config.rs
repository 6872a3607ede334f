//! Run configuration

use std::fmt;

use thiserror::Error;

pub use crate::compare::FloatTolerance;

/// How much the text reporter prints while tests run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Summary only
    #[default]
    Quiet,
    /// One character per test
    Normal,
    /// One line per test
    Verbose,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("verbosity must be 0, 1 or 2 (got {0})")]
pub struct InvalidVerbosity(pub u8);

impl TryFrom<u8> for Verbosity {
    type Error = InvalidVerbosity;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Verbosity::Quiet),
            1 => Ok(Verbosity::Normal),
            2 => Ok(Verbosity::Verbose),
            other => Err(InvalidVerbosity(other)),
        }
    }
}

impl From<Verbosity> for u8 {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Quiet => 0,
            Verbosity::Normal => 1,
            Verbosity::Verbose => 2,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Settings for one run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Module to resolve functions in; `None` selects the main scope
    pub module: Option<String>,
    /// Relative tolerance for float comparisons
    pub float_tolerance: FloatTolerance,
    pub verbosity: Verbosity,
}

impl RunConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve functions in `module`. An empty name selects the main scope.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        let module = module.into();
        self.module = if module.is_empty() { None } else { Some(module) };
        self
    }

    pub fn with_float_tolerance(mut self, tolerance: FloatTolerance) -> Self {
        self.float_tolerance = tolerance;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }
}
