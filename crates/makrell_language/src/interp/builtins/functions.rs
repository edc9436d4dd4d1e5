//! Global built-in functions.

use std::cmp::Ordering;
use std::rc::Rc;

use super::{make_range, register};
use crate::interp::error::ExceptionKind;
use crate::interp::ops::{self, compare_values};
use crate::interp::value::{Args, BuiltinType, NodeClass, Value};
use crate::interp::{Interpreter, IterState, RtResult, RuntimeError};

pub(super) fn install(interp: &Interpreter) {
    register(interp, "print", native_print);
    register(interp, "len", native_len);
    register(interp, "repr", native_repr);
    register(interp, "range", native_range);
    register(interp, "map", native_map);
    register(interp, "filter", native_filter);
    register(interp, "zip", native_zip);
    register(interp, "enumerate", native_enumerate);
    register(interp, "sum", native_sum);
    register(interp, "min", native_min);
    register(interp, "max", native_max);
    register(interp, "abs", native_abs);
    register(interp, "sorted", native_sorted);
    register(interp, "reversed", native_reversed);
    register(interp, "any", native_any);
    register(interp, "all", native_all);
    register(interp, "isinstance", native_isinstance);
    register(interp, "type", native_type);
    register(interp, "getattr", native_getattr);
    register(interp, "setattr", native_setattr);
    register(interp, "hasattr", native_hasattr);
    register(interp, "iter", native_iter);
    register(interp, "next", native_next);
    register(interp, "round", native_round);
    register(interp, "ord", native_ord);
    register(interp, "chr", native_chr);
    register(interp, "callable", native_callable);
}

/// print: writes the arguments separated by `sep` (default a space)
fn native_print(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let sep = match args.keyword("sep") {
        Some(v) => interp.str_of(v)?,
        None => " ".to_string(),
    };
    let mut parts = Vec::with_capacity(args.len());
    for value in &args.positional {
        parts.push(interp.str_of(value)?);
    }
    interp.write_line(parts.join(&sep));
    Ok(Value::None)
}

/// len
#[allow(clippy::cast_possible_wrap)]
fn native_len(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("len", 1, 1)?;
    let value = args.arg("len", 0)?;
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(d) | Value::Set(d) => d.borrow().len(),
        Value::Range(r) => r.len(),
        Value::Node(n) => n.as_sequence().map_or(0, |s| s.nodes.len()),
        Value::Instance(_) if interp.has_method(value, "__len__") => {
            return interp.call_method(value, "__len__", Args::default());
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(len as i64))
}

/// repr
fn native_repr(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("repr", 1, 1)?;
    Ok(Value::str(interp.repr_of(args.arg("repr", 0)?)?))
}

/// range: one to three integer bounds
pub(super) fn native_range(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    Ok(Value::Range(make_range(&args)?))
}

/// map: applies a function across one or more iterables, stopping at the shortest
fn native_map(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    if args.len() < 2 {
        return Err(RuntimeError::type_error("map() must have at least two arguments"));
    }
    let func = args.positional[0].clone();
    let columns = collect_columns(interp, &args.positional[1..])?;
    let mut out = Vec::with_capacity(columns.len());
    for row in columns {
        out.push(interp.call(&func, Args::new(row))?);
    }
    Ok(Value::list(out))
}

/// filter: keeps items for which the predicate is truthy; `null` keeps truthy items
fn native_filter(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("filter", 2, 2)?;
    let func = args.positional[0].clone();
    let mut out = Vec::new();
    for item in interp.iter_values(&args.positional[1])? {
        let keep = if func.is_none() {
            interp.truthy(&item)?
        } else {
            let result = interp.call(&func, Args::new(vec![item.clone()]))?;
            interp.truthy(&result)?
        };
        if keep {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

/// zip
fn native_zip(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let columns = collect_columns(interp, &args.positional)?;
    Ok(Value::list(columns.into_iter().map(Value::tuple).collect()))
}

fn collect_columns(interp: &mut Interpreter, iterables: &[Value]) -> RtResult<Vec<Vec<Value>>> {
    let mut lists = Vec::with_capacity(iterables.len());
    for iterable in iterables {
        lists.push(interp.iter_values(iterable)?);
    }
    let len = lists.iter().map(Vec::len).min().unwrap_or(0);
    Ok((0..len)
        .map(|i| lists.iter().map(|l| l[i].clone()).collect())
        .collect())
}

/// enumerate
fn native_enumerate(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("enumerate", 1, 2)?;
    let start = match args.get(1).or_else(|| args.keyword("start")) {
        Some(v) => v
            .as_int()
            .ok_or_else(|| RuntimeError::type_error("enumerate() start must be an integer"))?,
        None => 0,
    };
    let items = interp.iter_values(&args.positional[0])?;
    Ok(Value::list(
        (start..)
            .zip(items)
            .map(|(i, v)| Value::tuple(vec![Value::Int(i), v]))
            .collect(),
    ))
}

/// sum
fn native_sum(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("sum", 1, 2)?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    for item in interp.iter_values(&args.positional[0])? {
        total = ops::add_values(&total, &item)?;
    }
    Ok(total)
}

/// min
fn native_min(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    extreme(interp, args, "min", Ordering::Less)
}

/// max
fn native_max(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    extreme(interp, args, "max", Ordering::Greater)
}

fn extreme(interp: &mut Interpreter, args: Args, name: &str, wanted: Ordering) -> RtResult<Value> {
    let items = if args.len() == 1 {
        interp.iter_values(&args.positional[0])?
    } else {
        args.positional.clone()
    };
    let key = args.keyword("key").cloned();
    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let k = match &key {
            Some(f) => interp.call(f, Args::new(vec![item.clone()]))?,
            None => item.clone(),
        };
        let better = match &best {
            None => true,
            Some((best_key, _)) => compare_values(&k, best_key)? == wanted,
        };
        if better {
            best = Some((k, item));
        }
    }
    if let Some((_, item)) = best {
        return Ok(item);
    }
    args.keyword("default").cloned().ok_or_else(|| {
        RuntimeError::value_error(format!("{name}() arg is an empty sequence"))
    })
}

/// abs
fn native_abs(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("abs", 1, 1)?;
    match &args.positional[0] {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::new(ExceptionKind::OverflowError, "integer overflow")),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Complex(re, im) => Ok(Value::Float(re.hypot(*im))),
        other => Err(RuntimeError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// sorted: stable sort with optional `key` and `reverse`
fn native_sorted(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("sorted", 1, 1)?;
    let items = interp.iter_values(&args.positional[0])?;
    let reverse = match args.keyword("reverse") {
        Some(v) => interp.truthy(v)?,
        None => false,
    };
    let key = args.keyword("key").cloned();
    Ok(Value::list(sort_values(interp, items, key.as_ref(), reverse)?))
}

/// Sorts values, computing keys once per item.
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> RtResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let k = match key {
            Some(f) if !f.is_none() => interp.call(f, Args::new(vec![item.clone()]))?,
            _ => item.clone(),
        };
        keyed.push((k, item));
    }
    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_values(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        });
        if reverse { ordering.reverse() } else { ordering }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(keyed.into_iter().map(|(_, v)| v).collect())
}

/// reversed
fn native_reversed(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("reversed", 1, 1)?;
    let mut items = interp.iter_values(&args.positional[0])?;
    items.reverse();
    Ok(Value::list(items))
}

/// any
fn native_any(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("any", 1, 1)?;
    for item in interp.iter_values(&args.positional[0])? {
        if interp.truthy(&item)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// all
fn native_all(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("all", 1, 1)?;
    for item in interp.iter_values(&args.positional[0])? {
        if !interp.truthy(&item)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// isinstance: accepts a class, a built-in type or a tuple of them
fn native_isinstance(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("isinstance", 2, 2)?;
    Ok(Value::Bool(is_instance(&args.positional[0], &args.positional[1])?))
}

pub(crate) fn is_instance(value: &Value, class: &Value) -> RtResult<bool> {
    Ok(match class {
        Value::Class(class) => match value {
            Value::Instance(inst) => inst.class.is_subclass_of(class),
            _ => false,
        },
        Value::Type(ty) => matches_type(value, *ty),
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if is_instance(value, c)? {
                    return Ok(true);
                }
            }
            false
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "isinstance() arg 2 must be a type, not {}",
                other.type_name()
            )));
        }
    })
}

fn matches_type(value: &Value, ty: BuiltinType) -> bool {
    match (ty, value) {
        (BuiltinType::Object, _) => true,
        (BuiltinType::Bool, Value::Bool(_)) => true,
        (BuiltinType::Int, Value::Int(_) | Value::Bool(_)) => true,
        (BuiltinType::Float, Value::Float(_)) => true,
        (BuiltinType::Complex, Value::Complex(..)) => true,
        (BuiltinType::Str, Value::Str(_)) => true,
        (BuiltinType::List, Value::List(_)) => true,
        (BuiltinType::Tuple, Value::Tuple(_)) => true,
        (BuiltinType::Dict, Value::Dict(_)) => true,
        (BuiltinType::Set, Value::Set(_)) => true,
        (BuiltinType::Range, Value::Range(_)) => true,
        (BuiltinType::Node(class), Value::Node(node)) => class.matches(node),
        _ => false,
    }
}

/// type
fn native_type(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("type", 1, 1)?;
    Ok(match &args.positional[0] {
        Value::Instance(inst) => Value::Class(Rc::clone(&inst.class)),
        Value::Bool(_) => Value::Type(BuiltinType::Bool),
        Value::Int(_) => Value::Type(BuiltinType::Int),
        Value::Float(_) => Value::Type(BuiltinType::Float),
        Value::Complex(..) => Value::Type(BuiltinType::Complex),
        Value::Str(_) => Value::Type(BuiltinType::Str),
        Value::List(_) => Value::Type(BuiltinType::List),
        Value::Tuple(_) => Value::Type(BuiltinType::Tuple),
        Value::Dict(_) => Value::Type(BuiltinType::Dict),
        Value::Set(_) => Value::Type(BuiltinType::Set),
        Value::Range(_) => Value::Type(BuiltinType::Range),
        Value::Node(node) => {
            let class = NodeClass::ALL
                .into_iter()
                .find(|c| *c != NodeClass::Node && *c != NodeClass::Sequence && c.matches(node))
                .unwrap_or(NodeClass::Sequence);
            Value::Type(BuiltinType::Node(class))
        }
        other => Value::str(other.type_name()),
    })
}

/// getattr: with an optional default
fn native_getattr(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("getattr", 2, 3)?;
    let name = attr_name(&args, "getattr")?;
    match interp.get_attr(&args.positional[0], &name) {
        Ok(v) => Ok(v),
        Err(err) if args.len() == 3 && err.class_name() == "AttributeError" => {
            Ok(args.positional[2].clone())
        }
        Err(err) => Err(err),
    }
}

/// setattr
fn native_setattr(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("setattr", 3, 3)?;
    let name = attr_name(&args, "setattr")?;
    interp.set_attr(&args.positional[0], &name, args.positional[2].clone())?;
    Ok(Value::None)
}

/// hasattr
fn native_hasattr(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("hasattr", 2, 2)?;
    let name = attr_name(&args, "hasattr")?;
    Ok(Value::Bool(interp.get_attr(&args.positional[0], &name).is_ok()))
}

fn attr_name(args: &Args, func: &str) -> RtResult<String> {
    args.positional[1]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RuntimeError::type_error(format!("{func}(): attribute name must be string")))
}

/// iter
fn native_iter(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("iter", 1, 1)?;
    Ok(Value::Iterator(interp.make_iter(&args.positional[0])?))
}

/// next: with an optional default when exhausted
fn native_next(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("next", 1, 2)?;
    let iterator = match &args.positional[0] {
        Value::Iterator(state) => Rc::clone(state),
        Value::Instance(_) => {
            let object = args.positional[0].clone();
            Rc::new(std::cell::RefCell::new(IterState::Object(object)))
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "'{}' object is not an iterator",
                other.type_name()
            )));
        }
    };
    match interp.next_value(&iterator)? {
        Some(v) => Ok(v),
        None => args
            .get(1)
            .cloned()
            .ok_or_else(|| RuntimeError::new(ExceptionKind::StopIteration, "")),
    }
}

/// round: half to even, like the host's float formatting
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn native_round(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("round", 1, 2)?;
    let value = &args.positional[0];
    let digits = args.get(1).and_then(Value::as_int);
    match (value, digits) {
        (Value::Int(_) | Value::Bool(_), _) => Ok(Value::Int(value.as_int().unwrap_or(0))),
        (Value::Float(f), None) => Ok(Value::Int(f.round_ties_even() as i64)),
        (Value::Float(f), Some(d)) => {
            let d = i32::try_from(d).unwrap_or(0);
            let scale = 10f64.powi(d);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
        (other, _) => Err(RuntimeError::type_error(format!(
            "type {} doesn't define __round__",
            other.type_name()
        ))),
    }
}

/// ord
fn native_ord(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("ord", 1, 1)?;
    let s = args.positional[0]
        .as_str()
        .ok_or_else(|| RuntimeError::type_error("ord() expected a string"))?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
        _ => Err(RuntimeError::type_error(
            "ord() expected a character",
        )),
    }
}

/// chr
fn native_chr(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("chr", 1, 1)?;
    let code = args.positional[0]
        .as_int()
        .ok_or_else(|| RuntimeError::type_error("chr() expected an integer"))?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::str(c.to_string()))
        .ok_or_else(|| RuntimeError::value_error("chr() arg not in range"))
}

/// callable
fn native_callable(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("callable", 1, 1)?;
    let value = &args.positional[0];
    Ok(Value::Bool(match value {
        Value::Function(_)
        | Value::Native(_)
        | Value::BoundMethod(_)
        | Value::Class(_)
        | Value::Type(_) => true,
        Value::Instance(_) => interp.has_method(value, "__call__"),
        _ => false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> RtResult<Value> {
        let mut interp = Interpreter::new();
        let func = interp.builtins().get_local(name).expect("builtin");
        interp.call(&func, Args::new(args))
    }

    fn ints(ns: &[i64]) -> Value {
        Value::list(ns.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn print_collects_output() {
        let mut interp = Interpreter::new();
        let print = interp.builtins().get_local("print").expect("builtin");
        interp
            .call(&print, Args::new(vec![Value::Int(1), Value::str("a")]))
            .expect("prints");
        assert_eq!(interp.output(), ["1 a".to_string()]);
    }

    #[test]
    fn sorted_sum_min_max() {
        assert_eq!(call("sorted", vec![ints(&[3, 1, 2])]).expect("ok"), ints(&[1, 2, 3]));
        assert_eq!(call("sum", vec![ints(&[1, 2, 3])]).expect("ok"), Value::Int(6));
        assert_eq!(call("min", vec![ints(&[4, 2, 9])]).expect("ok"), Value::Int(2));
        assert_eq!(
            call("max", vec![Value::Int(4), Value::Int(9), Value::Int(2)]).expect("ok"),
            Value::Int(9)
        );
        assert!(call("max", vec![ints(&[])]).is_err());
    }

    #[test]
    fn sorting_mixed_types_fails() {
        let mixed = Value::list(vec![Value::Int(1), Value::str("a")]);
        let err = call("sorted", vec![mixed]).expect_err("incomparable");
        assert_eq!(err.class_name(), "TypeError");
    }

    #[test]
    fn zip_stops_at_shortest() {
        let zipped = call("zip", vec![ints(&[1, 2, 3]), ints(&[4, 5])]).expect("ok");
        assert_eq!(zipped.to_string(), "[(1, 4), (2, 5)]");
    }

    #[test]
    fn round_uses_banker_rounding() {
        assert_eq!(call("round", vec![Value::Float(2.5)]).expect("ok"), Value::Int(2));
        assert_eq!(call("round", vec![Value::Float(3.5)]).expect("ok"), Value::Int(4));
    }

    #[test]
    fn ord_and_chr_invert() {
        assert_eq!(call("ord", vec![Value::str("A")]).expect("ok"), Value::Int(65));
        assert_eq!(call("chr", vec![Value::Int(65)]).expect("ok"), Value::str("A"));
    }

    #[test]
    fn isinstance_checks_builtin_types() {
        let yes = is_instance(&Value::Bool(true), &Value::Type(BuiltinType::Int)).expect("ok");
        assert!(yes);
        let no = is_instance(&Value::str("x"), &Value::Type(BuiltinType::Int)).expect("ok");
        assert!(!no);
    }
}
