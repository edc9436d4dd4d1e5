//! Arithmetic, bitwise and comparison helpers.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::float_cmp)]

use std::cmp::Ordering;
use std::rc::Rc;

use super::error::{ExceptionKind, RuntimeError};
use super::value::Value;
use super::RtResult;
use crate::target::{BinOperator, CmpOperator};

/// Truthiness of values without user-defined `__bool__`.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::None => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::Complex(re, im) => *re != 0.0 || *im != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.borrow().is_empty(),
        Value::Tuple(items) => !items.is_empty(),
        Value::Dict(d) | Value::Set(d) => !d.borrow().is_empty(),
        Value::Range(r) => !r.is_empty(),
        _ => true,
    }
}

fn unsupported(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand types for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    ))
}

fn overflow() -> RuntimeError {
    RuntimeError::new(ExceptionKind::OverflowError, "integer overflow")
}

fn zero_division() -> RuntimeError {
    RuntimeError::new(ExceptionKind::ZeroDivisionError, "division by zero")
}

fn complex_parts(v: &Value) -> Option<(f64, f64)> {
    match v {
        Value::Complex(re, im) => Some((*re, *im)),
        other => other.as_float().map(|f| (f, 0.0)),
    }
}

fn is_complex(a: &Value, b: &Value) -> bool {
    matches!(a, Value::Complex(..)) || matches!(b, Value::Complex(..))
}

fn repeat(items: &[Value], times: i64) -> Vec<Value> {
    let n = usize::try_from(times).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len() * n);
    for _ in 0..n {
        out.extend_from_slice(items);
    }
    out
}

/// Applies an arithmetic or bitwise operator to built-in values.
pub(crate) fn binary_values(op: BinOperator, a: &Value, b: &Value) -> RtResult<Value> {
    match op {
        BinOperator::Add => add_values(a, b),
        BinOperator::Sub => sub_values(a, b),
        BinOperator::Mult => mul_values(a, b),
        BinOperator::Div => div_values(a, b),
        BinOperator::FloorDiv => floor_div_values(a, b),
        BinOperator::Mod => mod_values(a, b),
        BinOperator::Pow => pow_values(a, b),
        BinOperator::LShift
        | BinOperator::RShift
        | BinOperator::BitOr
        | BinOperator::BitXor
        | BinOperator::BitAnd => bitwise_values(op, a, b),
    }
}

/// Adds two values.
pub(crate) fn add_values(a: &Value, b: &Value) -> RtResult<Value> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::str(format!("{x}{y}"))),
        (Value::List(x), Value::List(y)) => {
            let mut out = x.borrow().clone();
            out.extend(y.borrow().iter().cloned());
            Ok(Value::list(out))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            let mut out = x.as_ref().clone();
            out.extend(y.iter().cloned());
            Ok(Value::tuple(out))
        }
        _ if is_complex(a, b) => match (complex_parts(a), complex_parts(b)) {
            (Some((ar, ai)), Some((br, bi))) => Ok(Value::Complex(ar + br, ai + bi)),
            _ => Err(unsupported("+", a, b)),
        },
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Value::Float(x + y)),
                _ => Err(unsupported("+", a, b)),
            },
        },
    }
}

/// Subtracts two values.
pub(crate) fn sub_values(a: &Value, b: &Value) -> RtResult<Value> {
    if is_complex(a, b) {
        return match (complex_parts(a), complex_parts(b)) {
            (Some((ar, ai)), Some((br, bi))) => Ok(Value::Complex(ar - br, ai - bi)),
            _ => Err(unsupported("-", a, b)),
        };
    }
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        let y = y.borrow();
        let mut out = super::value::Dict::new();
        for (k, _) in x.borrow().iter() {
            if !y.contains(k)? {
                out.insert(k.clone(), Value::None)?;
            }
        }
        return Ok(Value::Set(Rc::new(std::cell::RefCell::new(out))));
    }
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(x - y)),
            _ => Err(unsupported("-", a, b)),
        },
    }
}

/// Multiplies two values.
pub(crate) fn mul_values(a: &Value, b: &Value) -> RtResult<Value> {
    match (a, b) {
        (Value::Str(s), n) | (n, Value::Str(s)) if n.as_int().is_some() => {
            let times = usize::try_from(n.as_int().unwrap_or(0)).unwrap_or(0);
            Ok(Value::str(s.repeat(times)))
        }
        (Value::List(items), n) | (n, Value::List(items)) if n.as_int().is_some() => {
            Ok(Value::list(repeat(&items.borrow(), n.as_int().unwrap_or(0))))
        }
        (Value::Tuple(items), n) | (n, Value::Tuple(items)) if n.as_int().is_some() => {
            Ok(Value::tuple(repeat(items, n.as_int().unwrap_or(0))))
        }
        _ if is_complex(a, b) => match (complex_parts(a), complex_parts(b)) {
            (Some((ar, ai)), Some((br, bi))) => {
                Ok(Value::Complex(ar * br - ai * bi, ar * bi + ai * br))
            }
            _ => Err(unsupported("*", a, b)),
        },
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Value::Float(x * y)),
                _ => Err(unsupported("*", a, b)),
            },
        },
    }
}

/// True division; always produces a float for real operands.
pub(crate) fn div_values(a: &Value, b: &Value) -> RtResult<Value> {
    if is_complex(a, b) {
        let ((ar, ai), (br, bi)) = complex_parts(a)
            .zip(complex_parts(b))
            .ok_or_else(|| unsupported("/", a, b))?;
        let denom = br * br + bi * bi;
        if denom == 0.0 {
            return Err(zero_division());
        }
        return Ok(Value::Complex(
            (ar * br + ai * bi) / denom,
            (ai * br - ar * bi) / denom,
        ));
    }
    match (a.as_float(), b.as_float()) {
        (Some(_), Some(y)) if y == 0.0 => Err(zero_division()),
        (Some(x), Some(y)) => Ok(Value::Float(x / y)),
        _ => Err(unsupported("/", a, b)),
    }
}

/// Floor division, rounding toward negative infinity.
pub(crate) fn floor_div_values(a: &Value, b: &Value) -> RtResult<Value> {
    match (a.as_int(), b.as_int()) {
        (Some(_), Some(0)) => Err(zero_division()),
        (Some(x), Some(y)) => {
            let q = x.checked_div(y).ok_or_else(overflow)?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        _ => match (a.as_float(), b.as_float()) {
            (Some(_), Some(y)) if y == 0.0 => Err(zero_division()),
            (Some(x), Some(y)) => Ok(Value::Float((x / y).floor())),
            _ => Err(unsupported("//", a, b)),
        },
    }
}

/// Modulo whose result takes the sign of the divisor.
pub(crate) fn mod_values(a: &Value, b: &Value) -> RtResult<Value> {
    match (a.as_int(), b.as_int()) {
        (Some(_), Some(0)) => Err(zero_division()),
        (Some(x), Some(y)) => {
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
        }
        _ => match (a.as_float(), b.as_float()) {
            (Some(_), Some(y)) if y == 0.0 => Err(zero_division()),
            (Some(x), Some(y)) => {
                let r = x % y;
                Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }))
            }
            _ => Err(unsupported("%", a, b)),
        },
    }
}

/// Exponentiation; integer bases with non-negative integer exponents stay integral.
pub(crate) fn pow_values(a: &Value, b: &Value) -> RtResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        if y >= 0 {
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            return x.checked_pow(exp).map(Value::Int).ok_or_else(overflow);
        }
    }
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(_)) if x == 0.0 && b.as_float().is_some_and(|y| y < 0.0) => {
            Err(zero_division())
        }
        (Some(x), Some(y)) => Ok(Value::Float(x.powf(y))),
        _ => Err(unsupported("**", a, b)),
    }
}

fn bitwise_values(op: BinOperator, a: &Value, b: &Value) -> RtResult<Value> {
    let (Some(x), Some(y)) = (a.as_int(), b.as_int()) else {
        return Err(unsupported(op.symbol(), a, b));
    };
    let shift = || u32::try_from(y).map_err(|_| RuntimeError::value_error("negative shift count"));
    Ok(Value::Int(match op {
        BinOperator::LShift => x.checked_shl(shift()?).ok_or_else(overflow)?,
        BinOperator::RShift => x.checked_shr(shift()?).unwrap_or(if x < 0 { -1 } else { 0 }),
        BinOperator::BitOr => x | y,
        BinOperator::BitXor => x ^ y,
        BinOperator::BitAnd => x & y,
        _ => return Err(unsupported(op.symbol(), a, b)),
    }))
}

/// Orders two built-in values.
pub(crate) fn compare_values(a: &Value, b: &Value) -> RtResult<Ordering> {
    let incomparable = || {
        RuntimeError::type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))
    };
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => compare_seq(&x.borrow(), &y.borrow()),
        (Value::Tuple(x), Value::Tuple(y)) => compare_seq(x, y),
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Ok(x.cmp(&y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(incomparable),
                _ => Err(incomparable()),
            },
        },
    }
}

fn compare_seq(a: &[Value], b: &[Value]) -> RtResult<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return compare_values(x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Evaluates one comparison operator on built-in values.
pub(crate) fn compare_op(op: CmpOperator, a: &Value, b: &Value) -> RtResult<bool> {
    Ok(match op {
        CmpOperator::Eq => a == b,
        CmpOperator::NotEq => a != b,
        CmpOperator::Lt => compare_values(a, b)? == Ordering::Less,
        CmpOperator::LtE => compare_values(a, b)? != Ordering::Greater,
        CmpOperator::Gt => compare_values(a, b)? == Ordering::Greater,
        CmpOperator::GtE => compare_values(a, b)? != Ordering::Less,
    })
}

/// Dunder method implementing a binary operator on instances.
pub(crate) const fn binary_dunder(op: BinOperator) -> &'static str {
    match op {
        BinOperator::Add => "__add__",
        BinOperator::Sub => "__sub__",
        BinOperator::Mult => "__mul__",
        BinOperator::Div => "__truediv__",
        BinOperator::FloorDiv => "__floordiv__",
        BinOperator::Mod => "__mod__",
        BinOperator::Pow => "__pow__",
        BinOperator::LShift => "__lshift__",
        BinOperator::RShift => "__rshift__",
        BinOperator::BitOr => "__or__",
        BinOperator::BitXor => "__xor__",
        BinOperator::BitAnd => "__and__",
    }
}

/// Dunder method implementing a comparison on instances.
pub(crate) const fn compare_dunder(op: CmpOperator) -> &'static str {
    match op {
        CmpOperator::Eq => "__eq__",
        CmpOperator::NotEq => "__ne__",
        CmpOperator::Lt => "__lt__",
        CmpOperator::LtE => "__le__",
        CmpOperator::Gt => "__gt__",
        CmpOperator::GtE => "__ge__",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(add_values(&Value::Int(2), &Value::Int(3)).expect("add"), Value::Int(5));
        assert!(matches!(
            mul_values(&Value::Int(2), &Value::Int(3)).expect("mul"),
            Value::Int(6)
        ));
    }

    #[test]
    fn true_division_yields_float() {
        assert!(matches!(
            div_values(&Value::Int(16), &Value::Int(4)).expect("div"),
            Value::Float(f) if (f - 4.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(floor_div_values(&Value::Int(-7), &Value::Int(2)).expect("fd"), Value::Int(-4));
        assert_eq!(floor_div_values(&Value::Int(7), &Value::Int(-2)).expect("fd"), Value::Int(-4));
        assert_eq!(floor_div_values(&Value::Int(7), &Value::Int(2)).expect("fd"), Value::Int(3));
        assert_eq!(mod_values(&Value::Int(-7), &Value::Int(3)).expect("mod"), Value::Int(2));
        assert_eq!(mod_values(&Value::Int(7), &Value::Int(-3)).expect("mod"), Value::Int(-2));
    }

    #[test]
    fn division_by_zero_raises() {
        let err = div_values(&Value::Int(1), &Value::Int(0)).expect_err("zero");
        assert_eq!(err.class_name(), "ZeroDivisionError");
        assert!(mod_values(&Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn overflow_raises() {
        let err = mul_values(&Value::Int(i64::MAX), &Value::Int(2)).expect_err("overflow");
        assert_eq!(err.class_name(), "OverflowError");
    }

    #[test]
    fn power_keeps_integers() {
        assert_eq!(pow_values(&Value::Int(8), &Value::Int(2)).expect("pow"), Value::Int(64));
        assert!(matches!(
            pow_values(&Value::Int(2), &Value::Int(-1)).expect("pow"),
            Value::Float(f) if (f - 0.5).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn bitwise_operators() {
        let v = binary_values(BinOperator::BitOr, &Value::Int(0b1010), &Value::Int(0b0101)).expect("or");
        assert_eq!(v, Value::Int(15));
        let v = binary_values(BinOperator::LShift, &Value::Int(1), &Value::Int(4)).expect("shl");
        assert_eq!(v, Value::Int(16));
    }

    #[test]
    fn sequences_concatenate_and_repeat() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(2)]);
        assert_eq!(add_values(&a, &b).expect("concat").to_string(), "[1, 2]");
        assert_eq!(mul_values(&Value::str("ab"), &Value::Int(3)).expect("repeat"), Value::str("ababab"));
    }

    #[test]
    fn comparisons_order_mixed_numbers() {
        assert!(compare_op(CmpOperator::Lt, &Value::Int(1), &Value::Float(1.5)).expect("lt"));
        assert!(compare_op(CmpOperator::GtE, &Value::str("b"), &Value::str("a")).expect("ge"));
        assert!(compare_op(CmpOperator::Lt, &Value::Int(1), &Value::str("a")).is_err());
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::None));
        assert!(!is_truthy(&Value::Int(0)));
        assert!(!is_truthy(&Value::str("")));
        assert!(is_truthy(&Value::list(vec![Value::None])));
    }
}
