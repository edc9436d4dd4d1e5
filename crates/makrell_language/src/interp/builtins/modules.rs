//! Native modules: `math` and `asyncio`.

use std::cell::RefCell;
use std::rc::Rc;

use super::Native;
use crate::interp::value::{Args, Coroutine, Module, NativeFunction, Value};
use crate::interp::{Interpreter, RtResult, RuntimeError, Scope, ScopeKind};

/// Builds the native module `name`, if there is one.
pub(crate) fn native_module(interp: &Interpreter, name: &str) -> Option<Rc<Module>> {
    let scope = Scope::child(interp.builtins(), ScopeKind::Module);
    match name {
        "math" => install_math(&scope),
        "asyncio" => install_asyncio(&scope),
        _ => return None,
    }
    Some(Rc::new(Module {
        name: name.to_string(),
        scope,
    }))
}

fn define(scope: &Scope, name: &str, func: Native) {
    scope.set_local(name, NativeFunction::value(name, func));
}

fn number(args: &Args, func: &str, i: usize) -> RtResult<f64> {
    args.arg(func, i)?
        .as_float()
        .ok_or_else(|| RuntimeError::type_error(format!("{func}() argument must be a number")))
}

macro_rules! unary_math {
    ($scope:expr, $($name:literal => $f:expr),* $(,)?) => {
        $(
            define($scope, $name, |_, args| {
                args.check($name, 1, 1)?;
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Float(f(number(&args, $name, 0)?)))
            });
        )*
    };
}

fn install_math(scope: &Scope) {
    scope.set_local("pi", Value::Float(std::f64::consts::PI));
    scope.set_local("tau", Value::Float(std::f64::consts::TAU));
    scope.set_local("e", Value::Float(std::f64::consts::E));
    scope.set_local("inf", Value::Float(f64::INFINITY));
    scope.set_local("nan", Value::Float(f64::NAN));
    unary_math!(scope,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "asin" => f64::asin,
        "acos" => f64::acos,
        "atan" => f64::atan,
        "exp" => f64::exp,
        "log10" => f64::log10,
        "log2" => f64::log2,
        "radians" => f64::to_radians,
        "degrees" => f64::to_degrees,
    );
    define(scope, "sqrt", |_, args| {
        args.check("sqrt", 1, 1)?;
        let x = number(&args, "sqrt", 0)?;
        if x < 0.0 {
            return Err(RuntimeError::value_error("math domain error"));
        }
        Ok(Value::Float(x.sqrt()))
    });
    define(scope, "log", |_, args| {
        args.check("log", 1, 2)?;
        let x = number(&args, "log", 0)?;
        if x <= 0.0 {
            return Err(RuntimeError::value_error("math domain error"));
        }
        Ok(Value::Float(match args.get(1) {
            Some(_) => x.ln() / number(&args, "log", 1)?.ln(),
            None => x.ln(),
        }))
    });
    define(scope, "atan2", |_, args| {
        args.check("atan2", 2, 2)?;
        Ok(Value::Float(number(&args, "atan2", 0)?.atan2(number(&args, "atan2", 1)?)))
    });
    define(scope, "hypot", |_, args| {
        args.check("hypot", 2, 2)?;
        Ok(Value::Float(number(&args, "hypot", 0)?.hypot(number(&args, "hypot", 1)?)))
    });
    define(scope, "floor", |_, args| integral(&args, "floor", f64::floor));
    define(scope, "ceil", |_, args| integral(&args, "ceil", f64::ceil));
    define(scope, "trunc", |_, args| integral(&args, "trunc", f64::trunc));
    define(scope, "isclose", |_, args| {
        args.check("isclose", 2, 2)?;
        let (a, b) = (number(&args, "isclose", 0)?, number(&args, "isclose", 1)?);
        let tolerance = 1e-9 * a.abs().max(b.abs());
        Ok(Value::Bool((a - b).abs() <= tolerance))
    });
}

#[allow(clippy::cast_possible_truncation)]
fn integral(args: &Args, func: &str, round: fn(f64) -> f64) -> RtResult<Value> {
    args.check(func, 1, 1)?;
    match args.arg(func, 0)? {
        Value::Int(n) => Ok(Value::Int(*n)),
        _ => {
            let x = round(number(args, func, 0)?);
            if !x.is_finite() {
                return Err(RuntimeError::value_error("cannot convert to integer"));
            }
            Ok(Value::Int(x as i64))
        }
    }
}

fn install_asyncio(scope: &Scope) {
    define(scope, "run", native_asyncio_run);
    define(scope, "sleep", native_asyncio_sleep);
    define(scope, "gather", native_asyncio_gather);
}

/// asyncio.run: runs a coroutine to completion
fn native_asyncio_run(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("run", 1, 1)?;
    interp.await_value(args.positional[0].clone())
}

/// asyncio.sleep: resolves immediately with its optional result
fn native_asyncio_sleep(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    args.check("sleep", 1, 2)?;
    let result = args.get(1).cloned().unwrap_or(Value::None);
    Ok(Value::Coroutine(Rc::new(RefCell::new(Coroutine::Done(result)))))
}

/// asyncio.gather: awaits each argument in order
fn native_asyncio_gather(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let mut results = Vec::with_capacity(args.len());
    for awaitable in args.positional {
        results.push(interp.await_value(awaitable)?);
    }
    Ok(Value::Coroutine(Rc::new(RefCell::new(Coroutine::Done(
        Value::list(results),
    )))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math_fn(interp: &mut Interpreter, name: &str) -> Value {
        let module = interp.import_module("math").expect("math");
        module.scope.get_local(name).expect("defined")
    }

    #[test]
    fn math_functions() {
        let mut interp = Interpreter::new();
        let sqrt = math_fn(&mut interp, "sqrt");
        let result = interp.call(&sqrt, Args::new(vec![Value::Int(16)])).expect("ok");
        assert_eq!(result, Value::Float(4.0));
        let floor = math_fn(&mut interp, "floor");
        let result = interp.call(&floor, Args::new(vec![Value::Float(-1.5)])).expect("ok");
        assert_eq!(result, Value::Int(-2));
        let err = interp
            .call(&sqrt, Args::new(vec![Value::Int(-1)]))
            .expect_err("domain");
        assert_eq!(err.class_name(), "ValueError");
    }

    #[test]
    fn imported_modules_are_cached() {
        let mut interp = Interpreter::new();
        let a = interp.import_module("math").expect("math");
        let b = interp.import_module("math").expect("math");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(interp.import_module("no_such_module").is_err());
    }

    #[test]
    fn gather_collects_results() {
        let mut interp = Interpreter::new();
        let asyncio = interp.import_module("asyncio").expect("asyncio");
        let sleep = asyncio.scope.get_local("sleep").expect("sleep");
        let gather = asyncio.scope.get_local("gather").expect("gather");
        let a = interp
            .call(&sleep, Args::new(vec![Value::Int(0), Value::str("a")]))
            .expect("ok");
        let gathered = interp.call(&gather, Args::new(vec![a])).expect("ok");
        let result = interp.await_value(gathered).expect("ok");
        assert_eq!(result.to_string(), "[\"a\"]");
    }
}
