//! Setup errors
//!
//! Anything that stops a suite from being built. Per-test failures are not
//! errors at this level; they are reported by the runner.

use miette::Diagnostic;
use thiserror::Error;

use crate::registry::ResolutionError;
use crate::spec::SpecLoadError;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    SpecLoad(#[from] SpecLoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
