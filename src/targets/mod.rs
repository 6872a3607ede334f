//! Built-in target modules
//!
//! The `jsontest` binary cannot see functions of other programs, so it ships
//! with a few modules of its own:
//!
//! - `math` - arithmetic, roots, vectors and small matrices
//! - `text` - string helpers
//!
//! The binary's main scope exposes the functions of both modules.

pub mod math;
pub mod text;

use serde_json::Value;

use crate::registry::{Args, CallError, Registry};

/// Registry used by the command-line runner.
pub fn builtin_registry() -> Registry {
    let math = math::module();
    let text = text::module();

    let mut registry = Registry::new();
    registry.main_scope_mut().reexport(&math).reexport(&text);
    registry.with_module(math).with_module(text)
}

/// A JSON number, keeping integers exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

/// Read a numeric parameter.
pub(crate) fn number(args: &Args<'_>, name: &str) -> Result<Num, CallError> {
    match args.value(name)? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Num::Int(i)),
            None => Ok(Num::Float(n.as_f64().unwrap_or(f64::NAN))),
        },
        // let the deserializer produce the error message
        _ => args.get::<f64>(name).map(Num::Float),
    }
}
