//! Expected-vs-actual comparison
//!
//! Expected values that are floats, or arrays (at any depth) holding only
//! floats, are compared numerically with a relative tolerance:
//!
//! ```text
//! |expected - actual| <= rtol * |expected|
//! ```
//!
//! Everything else must be structurally equal. A number is a float when its
//! literal has a fraction or an exponent; integers of any size compare
//! exactly. Integers and floats compare by exact value, so an expected `3`
//! matches an actual `3.0` but `9007199254740993` does not match
//! `9007199254740992.0`.
//!
//! Booleans are never equal to numbers: an expected `1` does not match an
//! actual `true`. This keeps JSON types distinct, unlike Python's `1 == True`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};
use thiserror::Error;

/// Relative tolerance applied to every numeric comparison of a run.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FloatTolerance(f64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToleranceError {
    #[error("tolerance must be a finite, non-negative number (got {0})")]
    OutOfRange(f64),
    #[error("invalid tolerance '{0}': expected a number such as 1e-7")]
    NotANumber(String),
}

impl FloatTolerance {
    pub const DEFAULT: FloatTolerance = FloatTolerance(1e-7);

    pub fn new(rtol: f64) -> Result<Self, ToleranceError> {
        if rtol.is_finite() && rtol >= 0.0 {
            Ok(Self(rtol))
        } else {
            Err(ToleranceError::OutOfRange(rtol))
        }
    }

    pub fn rtol(self) -> f64 {
        self.0
    }

    /// NaN on either side is never close.
    pub fn is_close(self, expected: f64, actual: f64) -> bool {
        (expected - actual).abs() <= self.0 * expected.abs()
    }
}

impl Default for FloatTolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for FloatTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e}", self.0)
    }
}

impl FromStr for FloatTolerance {
    type Err = ToleranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rtol: f64 = s
            .trim()
            .parse()
            .map_err(|_| ToleranceError::NotANumber(s.to_string()))?;
        Self::new(rtol)
    }
}

/// An assertion failure for one expected/actual pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// Numeric leaves outside the tolerance.
    Tolerance {
        rtol: FloatTolerance,
        mismatched: usize,
        total: usize,
        max_abs_diff: f64,
        max_rel_diff: f64,
        expected: Value,
        actual: Value,
    },
    /// The actual value does not have the layout of the float-only expected value.
    Shape {
        path: String,
        detail: String,
        expected: Value,
        actual: Value,
    },
    /// Structural inequality. `path` locates the first difference ("" at the root).
    NotEqual {
        path: String,
        expected: Value,
        actual: Value,
        first_expected: Value,
        first_actual: Value,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Tolerance {
                rtol,
                mismatched,
                total,
                max_abs_diff,
                max_rel_diff,
                expected,
                actual,
            } => {
                let pct = if *total == 0 {
                    0.0
                } else {
                    100.0 * *mismatched as f64 / *total as f64
                };
                writeln!(f, "Not equal to tolerance rtol={rtol}")?;
                writeln!(f)?;
                writeln!(f, "Mismatched elements: {mismatched} / {total} ({pct:.1}%)")?;
                writeln!(f, "Max absolute difference: {max_abs_diff:e}")?;
                writeln!(f, "Max relative difference: {max_rel_diff:e}")?;
                writeln!(f, " expected: {expected}")?;
                write!(f, " actual:   {actual}")
            }
            Mismatch::Shape {
                path,
                detail,
                expected,
                actual,
            } => {
                if path.is_empty() {
                    writeln!(f, "shape mismatch: {detail}")?;
                } else {
                    writeln!(f, "shape mismatch at {path}: {detail}")?;
                }
                writeln!(f, " expected: {expected}")?;
                write!(f, " actual:   {actual}")
            }
            Mismatch::NotEqual {
                path,
                expected,
                actual,
                first_expected,
                first_actual,
            } => {
                write!(f, "{expected} != {actual}")?;
                if !path.is_empty() {
                    write!(f, "\n\nFirst differing element {path}:\n{first_expected}\n{first_actual}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Mismatch {}

/// True for a float, or an array whose leaves are all floats (empty arrays included).
pub fn is_float_tree(value: &Value) -> bool {
    match value {
        Value::Number(n) => matches!(Numeric::of(n), Numeric::Float(_)),
        Value::Array(items) => items.iter().all(is_float_tree),
        _ => false,
    }
}

/// Compare one returned value against its expected value.
pub fn assert_close_or_equal(expected: &Value, actual: &Value, tolerance: FloatTolerance) -> Result<(), Mismatch> {
    if is_float_tree(expected) {
        assert_allclose(expected, actual, tolerance)
    } else {
        assert_equal(expected, actual)
    }
}

/// Elementwise tolerance comparison. `expected` is expected to be a float tree.
pub fn assert_allclose(expected: &Value, actual: &Value, tolerance: FloatTolerance) -> Result<(), Mismatch> {
    let mut stats = CloseStats::default();
    let mut path = Path::default();

    if let Err((detail, at)) = walk_close(expected, actual, tolerance, &mut path, &mut stats) {
        return Err(Mismatch::Shape {
            path: at,
            detail,
            expected: expected.clone(),
            actual: actual.clone(),
        });
    }

    if stats.mismatched == 0 {
        return Ok(());
    }

    Err(Mismatch::Tolerance {
        rtol: tolerance,
        mismatched: stats.mismatched,
        total: stats.total,
        max_abs_diff: stats.max_abs_diff,
        max_rel_diff: stats.max_rel_diff,
        expected: expected.clone(),
        actual: actual.clone(),
    })
}

/// Deep structural equality.
pub fn assert_equal(expected: &Value, actual: &Value) -> Result<(), Mismatch> {
    let mut path = Path::default();
    match first_difference(expected, actual, &mut path) {
        None => Ok(()),
        Some((at, first_expected, first_actual)) => Err(Mismatch::NotEqual {
            path: at,
            expected: expected.clone(),
            actual: actual.clone(),
            first_expected: first_expected.clone(),
            first_actual: first_actual.clone(),
        }),
    }
}

#[derive(Default)]
struct CloseStats {
    total: usize,
    mismatched: usize,
    max_abs_diff: f64,
    max_rel_diff: f64,
}

impl CloseStats {
    fn record(&mut self, expected: f64, actual: f64, tolerance: FloatTolerance) {
        self.total += 1;
        if tolerance.is_close(expected, actual) {
            return;
        }
        self.mismatched += 1;

        let abs_diff = (expected - actual).abs();
        let rel_diff = if expected == 0.0 {
            f64::INFINITY
        } else {
            abs_diff / expected.abs()
        };
        // NaN differences stick so they are visible in the report
        if abs_diff.is_nan() || abs_diff > self.max_abs_diff {
            self.max_abs_diff = abs_diff;
        }
        if rel_diff.is_nan() || rel_diff > self.max_rel_diff {
            self.max_rel_diff = rel_diff;
        }
    }
}

#[derive(Default)]
struct Path(Vec<Segment>);

enum Segment {
    Index(usize),
    Key(String),
}

impl Path {
    fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                Segment::Index(i) => out.push_str(&format!("[{i}]")),
                Segment::Key(k) => out.push_str(&format!(".{k}")),
            }
        }
        out
    }
}

fn walk_close(
    expected: &Value,
    actual: &Value,
    tolerance: FloatTolerance,
    path: &mut Path,
    stats: &mut CloseStats,
) -> Result<(), (String, String)> {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            stats.record(as_f64(e), as_f64(a), tolerance);
            Ok(())
        }
        (Value::Array(es), Value::Array(acts)) => {
            if es.len() != acts.len() {
                return Err((
                    format!("expected {} elements, got {}", es.len(), acts.len()),
                    path.render(),
                ));
            }
            for (i, (e, a)) in es.iter().zip(acts).enumerate() {
                path.0.push(Segment::Index(i));
                walk_close(e, a, tolerance, path, stats)?;
                path.0.pop();
            }
            Ok(())
        }
        (Value::Array(_), other) => Err((format!("expected an array, got {}", kind(other)), path.render())),
        (_, other) => Err((format!("expected a number, got {}", kind(other)), path.render())),
    }
}

fn first_difference<'a>(
    expected: &'a Value,
    actual: &'a Value,
    path: &mut Path,
) -> Option<(String, &'a Value, &'a Value)> {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            if numbers_equal(e, a) {
                None
            } else {
                Some((path.render(), expected, actual))
            }
        }
        (Value::Array(es), Value::Array(acts)) => {
            if es.len() != acts.len() {
                return Some((path.render(), expected, actual));
            }
            for (i, (e, a)) in es.iter().zip(acts).enumerate() {
                path.0.push(Segment::Index(i));
                let found = first_difference(e, a, path);
                path.0.pop();
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        (Value::Object(es), Value::Object(acts)) => {
            if es.len() != acts.len() || es.keys().any(|k| !acts.contains_key(k)) {
                return Some((path.render(), expected, actual));
            }
            for (key, e) in es {
                let Some(a) = acts.get(key) else {
                    return Some((path.render(), expected, actual));
                };
                path.0.push(Segment::Key(key.clone()));
                let found = first_difference(e, a, path);
                path.0.pop();
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        _ => {
            if expected == actual {
                None
            } else {
                Some((path.render(), expected, actual))
            }
        }
    }
}

/// A JSON number as written.
enum Numeric {
    /// Canonical decimal digits, exact at any size
    Int(String),
    Float(f64),
}

impl Numeric {
    fn of(n: &Number) -> Self {
        if let Some(i) = n.as_i64() {
            return Numeric::Int(i.to_string());
        }
        if let Some(u) = n.as_u64() {
            return Numeric::Int(u.to_string());
        }
        let literal = n.to_string();
        if literal.contains(['.', 'e', 'E']) {
            Numeric::Float(as_f64(n))
        } else {
            Numeric::Int(literal)
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (Numeric::of(a), Numeric::of(b)) {
        (Numeric::Int(x), Numeric::Int(y)) => x == y,
        (Numeric::Float(x), Numeric::Float(y)) => x == y,
        (Numeric::Int(i), Numeric::Float(f)) | (Numeric::Float(f), Numeric::Int(i)) => float_equals_integer(f, &i),
    }
}

/// Exact comparison: the float must be integral and print as the same digits.
fn float_equals_integer(f: f64, digits: &str) -> bool {
    if !f.is_finite() || f.fract() != 0.0 {
        return false;
    }
    if f == 0.0 {
        return digits == "0";
    }
    format!("{f:.0}") == digits
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
