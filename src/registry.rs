//! Function registry
//!
//! Targets are looked up by name in a [`Module`]. A [`Registry`] holds the
//! main scope (the program's own top-level functions, named `__main__`) plus
//! any number of named modules.
//!
//! ## Calling convention
//!
//! Every target receives its parameters by name as [`Args`] and returns
//! [`Returns`]. A target that declares its parameter names rejects any other
//! name, the same way a call with an unknown keyword argument fails.
//!
//! ```
//! use jsontest::registry::{Args, Module, Returns};
//!
//! let module = Module::new("geometry").function("area", &["w", "h"], |args: &Args<'_>| {
//!     let w: f64 = args.get("w")?;
//!     let h: f64 = args.get("h")?;
//!     Returns::single(w * h)
//! });
//! assert!(module.resolve("area").is_ok());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the main scope.
pub const MAIN_MODULE: &str = "__main__";

/// Errors raised by a target while it runs. Reported as test errors.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("missing required argument '{0}'")]
    MissingParam(String),

    #[error("unexpected keyword argument '{0}'")]
    UnexpectedParam(String),

    #[error("invalid value for argument '{name}': {source}")]
    InvalidParam {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("return value is not representable as JSON: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

impl CallError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure to find a module or function. Aborts suite construction.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolutionError {
    #[error("no module named '{name}'")]
    #[diagnostic(code(jsontest::resolve::module), help("available modules: {available}"))]
    UnknownModule { name: String, available: String },

    #[error("module '{module}' has no function '{function}'")]
    #[diagnostic(code(jsontest::resolve::function))]
    UnknownFunction { module: String, function: String },
}

/// Named arguments for one call.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    params: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub fn new(params: &'a Map<String, Value>) -> Self {
        Self { params }
    }

    /// Raw JSON value of a parameter.
    pub fn value(&self, name: &str) -> Result<&'a Value, CallError> {
        self.params
            .get(name)
            .ok_or_else(|| CallError::MissingParam(name.to_string()))
    }

    /// Deserialize a required parameter.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, CallError> {
        let value = self.value(name)?;
        T::deserialize(value).map_err(|source| CallError::InvalidParam {
            name: name.to_string(),
            source,
        })
    }

    /// Deserialize an optional parameter, falling back to `default`.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, CallError> {
        if self.contains(name) {
            self.get(name)
        } else {
            Ok(default)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> {
        self.params.keys().map(String::as_str)
    }
}

/// What a target returned.
///
/// Only `Tuple` is a multi-value return. A JSON array returned as `Single`
/// is one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Returns {
    Single(Value),
    Tuple(Vec<Value>),
}

impl Returns {
    pub fn single(value: impl Serialize) -> Result<Self, CallError> {
        serde_json::to_value(value)
            .map(Returns::Single)
            .map_err(CallError::Serialize)
    }

    pub fn tuple(values: impl ReturnTuple) -> Result<Self, CallError> {
        values
            .into_values()
            .map(Returns::Tuple)
            .map_err(CallError::Serialize)
    }

    /// Normalize to a sequence of returned values.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Returns::Single(value) => vec![value],
            Returns::Tuple(values) => values,
        }
    }
}

/// Tuples whose elements serialize to JSON.
pub trait ReturnTuple {
    fn into_values(self) -> Result<Vec<Value>, serde_json::Error>;
}

impl ReturnTuple for Vec<Value> {
    fn into_values(self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(self)
    }
}

macro_rules! impl_return_tuple {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> ReturnTuple for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Result<Vec<Value>, serde_json::Error> {
                let ($($name,)+) = self;
                Ok(vec![$(serde_json::to_value($name)?),+])
            }
        }
    };
}

impl_return_tuple!(A);
impl_return_tuple!(A, B);
impl_return_tuple!(A, B, C);
impl_return_tuple!(A, B, C, D);
impl_return_tuple!(A, B, C, D, E);

type TargetFn = dyn Fn(&Args<'_>) -> Result<Returns, CallError> + Send + Sync;

/// A callable registered under a name.
pub struct Target {
    name: String,
    params: Option<Vec<String>>,
    func: Box<TargetFn>,
}

impl Target {
    /// A target that accepts any parameter names.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Args<'_>) -> Result<Returns, CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: None,
            func: Box::new(func),
        }
    }

    /// Restrict the accepted parameter names.
    pub fn with_params(mut self, names: &[&str]) -> Self {
        self.params = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> Option<&[String]> {
        self.params.as_deref()
    }

    pub fn call(&self, params: &Map<String, Value>) -> Result<Returns, CallError> {
        if let Some(declared) = &self.params {
            if let Some(unknown) = params.keys().find(|k| !declared.iter().any(|d| d == *k)) {
                return Err(CallError::UnexpectedParam(unknown.clone()));
            }
        }
        (self.func)(&Args::new(params))
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A named collection of targets.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    functions: BTreeMap<String, Arc<Target>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a target, replacing any target of the same name.
    pub fn register(&mut self, target: Target) -> &mut Self {
        self.functions.insert(target.name.clone(), Arc::new(target));
        self
    }

    /// Builder form of [`Module::register`] with declared parameter names.
    pub fn function<F>(mut self, name: &str, params: &[&str], func: F) -> Self
    where
        F: Fn(&Args<'_>) -> Result<Returns, CallError> + Send + Sync + 'static,
    {
        self.register(Target::new(name, func).with_params(params));
        self
    }

    /// Make every target of `other` available here as well.
    pub fn reexport(&mut self, other: &Module) -> &mut Self {
        for (name, target) in &other.functions {
            self.functions.insert(name.clone(), Arc::clone(target));
        }
        self
    }

    pub fn resolve(&self, function: &str) -> Result<Arc<Target>, ResolutionError> {
        self.functions
            .get(function)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownFunction {
                module: self.name.clone(),
                function: function.to_string(),
            })
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// The main scope plus named modules.
#[derive(Debug, Clone)]
pub struct Registry {
    main: Module,
    modules: BTreeMap<String, Module>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            main: Module::new(MAIN_MODULE),
            modules: BTreeMap::new(),
        }
    }

    pub fn main_scope(&self) -> &Module {
        &self.main
    }

    pub fn main_scope_mut(&mut self) -> &mut Module {
        &mut self.main
    }

    pub fn register_module(&mut self, module: Module) -> &mut Self {
        self.modules.insert(module.name.clone(), module);
        self
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.register_module(module);
        self
    }

    /// Look up a module. `None`, `""` and `"__main__"` select the main scope.
    pub fn module(&self, name: Option<&str>) -> Result<&Module, ResolutionError> {
        match name {
            None | Some("") | Some(MAIN_MODULE) => Ok(&self.main),
            Some(name) => self
                .modules
                .get(name)
                .ok_or_else(|| ResolutionError::UnknownModule {
                    name: name.to_string(),
                    available: self.module_names().collect::<Vec<_>>().join(", "),
                }),
        }
    }

    pub fn resolve(&self, module: Option<&str>, function: &str) -> Result<Arc<Target>, ResolutionError> {
        self.module(module)?.resolve(function)
    }

    /// Main scope first, then named modules alphabetically.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        std::iter::once(&self.main).chain(self.modules.values())
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules().map(Module::name)
    }
}
