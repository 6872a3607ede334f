//! `math` target module
//!
//! Integer inputs stay integers where the operation allows it (`add`,
//! `subtract`, `multiply`, `divmod`, integer `power`); anything involving a
//! float produces a float.

use std::f64::consts::PI;

use crate::registry::{Args, CallError, Module, Returns};

use super::{Num, number};

pub fn module() -> Module {
    Module::new("math")
        .function("add", &["a", "b"], |args| {
            arith(args, i64::checked_add, |a, b| a + b)
        })
        .function("subtract", &["a", "b"], |args| {
            arith(args, i64::checked_sub, |a, b| a - b)
        })
        .function("multiply", &["a", "b"], |args| {
            arith(args, i64::checked_mul, |a, b| a * b)
        })
        .function("divide", &["a", "b"], divide)
        .function("divmod", &["a", "b"], divmod)
        .function("power", &["base", "exp"], power)
        .function("sqrt", &["x"], sqrt)
        .function("hypot", &["x", "y"], |args| {
            let x: f64 = args.get("x")?;
            let y: f64 = args.get("y")?;
            Returns::single(x.hypot(y))
        })
        .function("polar", &["x", "y"], |args| {
            let x: f64 = args.get("x")?;
            let y: f64 = args.get("y")?;
            Returns::tuple((x.hypot(y), y.atan2(x)))
        })
        .function("degrees", &["radians"], |args| {
            let radians: f64 = args.get("radians")?;
            Returns::single(radians * 180.0 / PI)
        })
        .function("mean", &["values"], |args| {
            let values: Vec<f64> = args.get("values")?;
            Returns::single(mean(&values)?)
        })
        .function("stats", &["values"], stats)
        .function("scale", &["values", "factor"], |args| {
            let values: Vec<f64> = args.get("values")?;
            let factor: f64 = args.get("factor")?;
            Returns::single(values.iter().map(|v| v * factor).collect::<Vec<_>>())
        })
        .function("linspace", &["start", "stop", "num"], linspace)
        .function("dot", &["a", "b"], |args| {
            let a: Vec<f64> = args.get("a")?;
            let b: Vec<f64> = args.get("b")?;
            if a.len() != b.len() {
                return Err(CallError::failed(format!(
                    "shapes ({},) and ({},) not aligned",
                    a.len(),
                    b.len()
                )));
            }
            Returns::single(a.iter().zip(&b).map(|(x, y)| x * y).sum::<f64>())
        })
        .function("matmul", &["a", "b"], matmul)
}

fn arith(
    args: &Args<'_>,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Returns, CallError> {
    match (number(args, "a")?, number(args, "b")?) {
        (Num::Int(a), Num::Int(b)) => match int_op(a, b) {
            Some(exact) => Returns::single(exact),
            // overflow falls back to floating point
            None => Returns::single(float_op(a as f64, b as f64)),
        },
        (a, b) => Returns::single(float_op(a.as_f64(), b.as_f64())),
    }
}

fn divide(args: &Args<'_>) -> Result<Returns, CallError> {
    let a = number(args, "a")?.as_f64();
    let b = number(args, "b")?.as_f64();
    if b == 0.0 {
        return Err(CallError::failed("division by zero"));
    }
    Returns::single(a / b)
}

/// Floor division and remainder, remainder takes the sign of the divisor.
fn divmod(args: &Args<'_>) -> Result<Returns, CallError> {
    match (number(args, "a")?, number(args, "b")?) {
        (_, Num::Int(0)) => Err(CallError::failed("integer division or modulo by zero")),
        (Num::Int(a), Num::Int(b)) if a.checked_rem(b).is_some() => {
            let mut quotient = a / b;
            let mut remainder = a % b;
            if remainder != 0 && (remainder < 0) != (b < 0) {
                quotient -= 1;
                remainder += b;
            }
            Returns::tuple((quotient, remainder))
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(CallError::failed("float divmod()"));
            }
            let quotient = (a / b).floor();
            Returns::tuple((quotient, a - quotient * b))
        }
    }
}

fn power(args: &Args<'_>) -> Result<Returns, CallError> {
    match (number(args, "base")?, number(args, "exp")?) {
        (Num::Int(base), Num::Int(exp)) if exp >= 0 => {
            let exact = u32::try_from(exp).ok().and_then(|e| base.checked_pow(e));
            match exact {
                Some(value) => Returns::single(value),
                None => Returns::single((base as f64).powf(exp as f64)),
            }
        }
        (base, exp) => {
            let (base, exp) = (base.as_f64(), exp.as_f64());
            if base == 0.0 && exp < 0.0 {
                return Err(CallError::failed("0.0 cannot be raised to a negative power"));
            }
            Returns::single(base.powf(exp))
        }
    }
}

fn sqrt(args: &Args<'_>) -> Result<Returns, CallError> {
    let x = number(args, "x")?.as_f64();
    if x < 0.0 {
        return Err(CallError::failed("math domain error"));
    }
    Returns::single(x.sqrt())
}

fn mean(values: &[f64]) -> Result<f64, CallError> {
    if values.is_empty() {
        return Err(CallError::failed("mean requires at least one data point"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// `(min, max, mean)`
fn stats(args: &Args<'_>) -> Result<Returns, CallError> {
    let values: Vec<f64> = args.get("values")?;
    let avg = mean(&values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Returns::tuple((min, max, avg))
}

/// `num` evenly spaced values over `[start, stop]`.
fn linspace(args: &Args<'_>) -> Result<Returns, CallError> {
    let start: f64 = args.get("start")?;
    let stop: f64 = args.get("stop")?;
    let num: usize = args.get_or("num", 50)?;

    let values: Vec<f64> = match num {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    };
    Returns::single(values)
}

fn matmul(args: &Args<'_>) -> Result<Returns, CallError> {
    let a: Vec<Vec<f64>> = args.get("a")?;
    let b: Vec<Vec<f64>> = args.get("b")?;

    let inner = b.len();
    let cols = b.first().map_or(0, Vec::len);
    if a.iter().any(|row| row.len() != inner) || b.iter().any(|row| row.len() != cols) {
        return Err(CallError::failed("matmul: mismatched or ragged dimensions"));
    }

    let product: Vec<Vec<f64>> = a
        .iter()
        .map(|row| {
            (0..cols)
                .map(|j| row.iter().zip(&b).map(|(x, b_row)| x * b_row[j]).sum::<f64>())
                .collect()
        })
        .collect();
    Returns::single(product)
}
