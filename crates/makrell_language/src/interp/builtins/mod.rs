//! Built-in functions, types and native modules.
//!
//! Natives are plain functions `fn(&mut Interpreter, Args) -> RtResult<Value>`
//! registered by name into the built-in scope.

#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]

pub(crate) mod functions;
pub(crate) mod methods;
pub(crate) mod modules;
pub mod nodes;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::error::ExceptionKind;
use super::value::{Args, BuiltinType, Class, Dict, NativeFunction, NodeClass, Range, Value};
use super::{Interpreter, RtResult, RuntimeError};

/// Native function pointer.
pub type Native = fn(&mut Interpreter, Args) -> RtResult<Value>;

/// Binds a native function in the built-in scope.
pub fn register(interp: &Interpreter, name: &str, func: Native) {
    interp.define_builtin(name, NativeFunction::value(name, func));
}

/// Installs every built-in into a fresh interpreter.
pub(crate) fn install(interp: &mut Interpreter) {
    install_exceptions(interp);

    for ty in [
        BuiltinType::Bool,
        BuiltinType::Int,
        BuiltinType::Float,
        BuiltinType::Complex,
        BuiltinType::Str,
        BuiltinType::List,
        BuiltinType::Tuple,
        BuiltinType::Dict,
        BuiltinType::Set,
        BuiltinType::Range,
        BuiltinType::Object,
    ] {
        interp.define_builtin(ty.name(), Value::Type(ty));
    }
    for class in NodeClass::ALL {
        interp.define_builtin(class.name(), Value::Type(BuiltinType::Node(class)));
    }

    functions::install(interp);
    nodes::install(interp);
}

fn install_exceptions(interp: &mut Interpreter) {
    let mut classes: HashMap<ExceptionKind, Rc<Class>> = HashMap::new();
    for kind in ExceptionKind::ALL {
        let bases = kind
            .parent()
            .and_then(|p| classes.get(&p).cloned())
            .into_iter()
            .collect();
        let class = Rc::new(Class {
            name: kind.name().to_string(),
            bases,
            attrs: RefCell::new(HashMap::new()),
            builtin: Some(kind),
        });
        classes.insert(kind, Rc::clone(&class));
        interp.define_builtin(kind.name(), Value::Class(Rc::clone(&class)));
        interp.register_exception_class(kind, class);
    }
}

/// Calls a built-in type as a conversion function.
///
/// # Errors
/// Raises `TypeError` or `ValueError` for values that do not convert.
pub(crate) fn convert(interp: &mut Interpreter, ty: BuiltinType, args: Args) -> RtResult<Value> {
    let name = ty.name();
    match ty {
        BuiltinType::Node(class) => return nodes::construct(interp, class, args),
        BuiltinType::Range => return functions::native_range(interp, args),
        BuiltinType::Dict => return convert_dict(interp, args),
        BuiltinType::Object => {
            return Err(RuntimeError::type_error("object() cannot be instantiated"));
        }
        _ => {}
    }
    args.check(name, 0, 1)?;
    let Some(value) = args.get(0).cloned() else {
        return Ok(match ty {
            BuiltinType::Bool => Value::Bool(false),
            BuiltinType::Int => Value::Int(0),
            BuiltinType::Float => Value::Float(0.0),
            BuiltinType::Complex => Value::Complex(0.0, 0.0),
            BuiltinType::Str => Value::str(""),
            BuiltinType::List => Value::list(Vec::new()),
            BuiltinType::Tuple => Value::tuple(Vec::new()),
            _ => Value::Set(Rc::new(RefCell::new(Dict::new()))),
        });
    };
    match ty {
        BuiltinType::Bool => Ok(Value::Bool(interp.truthy(&value)?)),
        BuiltinType::Int => to_int(&value),
        BuiltinType::Float => to_float(&value),
        BuiltinType::Complex => match value {
            Value::Complex(..) => Ok(value),
            other => other
                .as_float()
                .map(|re| Value::Complex(re, 0.0))
                .ok_or_else(|| RuntimeError::type_error("complex() argument must be a number")),
        },
        BuiltinType::Str => Ok(Value::str(interp.str_of(&value)?)),
        BuiltinType::List => Ok(Value::list(interp.iter_values(&value)?)),
        BuiltinType::Tuple => Ok(Value::tuple(interp.iter_values(&value)?)),
        _ => {
            let items = interp.iter_values(&value)?;
            let set = Dict::from_pairs(items.into_iter().map(|v| (v, Value::None)))?;
            Ok(Value::Set(Rc::new(RefCell::new(set))))
        }
    }
}

fn convert_dict(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("dict", 0, 1)?;
    let mut dict = Dict::new();
    if let Some(source) = args.get(0) {
        if let Value::Dict(existing) = source {
            dict = existing.borrow().clone();
        } else {
            for pair in interp.iter_values(source)? {
                let items = interp.iter_values(&pair)?;
                let [key, value] = <[Value; 2]>::try_from(items).map_err(|_| {
                    RuntimeError::value_error("dictionary update sequence element has wrong length")
                })?;
                dict.insert(key, value)?;
            }
        }
    }
    for (key, value) in args.keywords {
        dict.insert(Value::str(key), value)?;
    }
    Ok(Value::dict(dict))
}

#[allow(clippy::cast_possible_truncation)]
fn to_int(value: &Value) -> RtResult<Value> {
    match value {
        Value::Int(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Float(_) => Err(RuntimeError::new(
            ExceptionKind::OverflowError,
            "cannot convert float infinity or NaN to integer",
        )),
        Value::Str(s) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::value_error(format!("invalid literal for int(): {}", value.repr()))
        }),
        other => Err(RuntimeError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> RtResult<Value> {
    match value {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => other.parse::<f64>(),
            };
            parsed.map(Value::Float).map_err(|_| {
                RuntimeError::value_error(format!("could not convert string to float: {}", value.repr()))
            })
        }
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            RuntimeError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

/// Builds a range from one to three integer bounds.
pub(crate) fn make_range(args: &Args) -> RtResult<Range> {
    args.check("range", 1, 3)?;
    let int = |i: usize| -> RtResult<i64> {
        args.arg("range", i)?
            .as_int()
            .ok_or_else(|| RuntimeError::type_error("range() arguments must be integers"))
    };
    let (start, stop, step) = match args.len() {
        1 => (0, int(0)?, 1),
        2 => (int(0)?, int(1)?, 1),
        _ => (int(0)?, int(1)?, int(2)?),
    };
    if step == 0 {
        return Err(RuntimeError::value_error("range() arg 3 must not be zero"));
    }
    Ok(Range { start, stop, step })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_classes_form_a_hierarchy() {
        let interp = Interpreter::new();
        let recursion = interp
            .exception_class(ExceptionKind::RecursionError)
            .expect("installed");
        let runtime = interp
            .exception_class(ExceptionKind::RuntimeError)
            .expect("installed");
        let root = interp.exception_class(ExceptionKind::Exception).expect("installed");
        assert!(recursion.is_subclass_of(&runtime));
        assert!(recursion.is_subclass_of(&root));
        assert!(!runtime.is_subclass_of(&recursion));
    }

    #[test]
    fn conversions() {
        let mut interp = Interpreter::new();
        let int = convert(&mut interp, BuiltinType::Int, Args::new(vec![Value::str(" 42 ")]));
        assert_eq!(int.expect("converts"), Value::Int(42));
        let float = convert(&mut interp, BuiltinType::Float, Args::new(vec![Value::Int(3)]));
        assert_eq!(float.expect("converts").to_string(), "3.0");
        let bad = convert(&mut interp, BuiltinType::Int, Args::new(vec![Value::str("x")]));
        assert_eq!(bad.expect_err("fails").class_name(), "ValueError");
    }

    #[test]
    fn dict_from_pairs_and_keywords() {
        let mut interp = Interpreter::new();
        let pairs = Value::list(vec![Value::tuple(vec![Value::str("a"), Value::Int(1)])]);
        let mut args = Args::new(vec![pairs]);
        args.keywords.push(("b".into(), Value::Int(2)));
        let dict = convert(&mut interp, BuiltinType::Dict, args).expect("converts");
        assert_eq!(dict.to_string(), "{\"a\": 1, \"b\": 2}");
    }
}
