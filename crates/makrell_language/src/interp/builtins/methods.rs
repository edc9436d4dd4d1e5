//! Methods and attributes of built-in values.
//!
//! `lookup` resolves `value.name` for strings, lists, mappings, sets,
//! numbers, dates and regular expressions. Methods come back bound to
//! their receiver, so the receiver is always positional argument 0.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Datelike, Timelike};

use super::Native;
use super::functions::sort_values;
use crate::interp::error::ExceptionKind;
use crate::interp::value::{Args, BoundMethod, Dict, NativeFunction, Value};
use crate::interp::{Interpreter, RtResult, RuntimeError};

/// Resolves an attribute of a built-in value.
pub(crate) fn lookup(receiver: &Value, name: &str) -> Option<Value> {
    if let Some(attr) = attribute(receiver, name) {
        return Some(attr);
    }
    let method: Native = match receiver {
        Value::Str(_) => str_method(name)?,
        Value::List(_) => list_method(name)?,
        Value::Dict(_) => dict_method(name)?,
        Value::Set(_) => set_method(name)?,
        Value::Regex(_) => regex_method(name)?,
        Value::DateTime(_) => datetime_method(name)?,
        _ => return None,
    };
    Some(Value::BoundMethod(Rc::new(BoundMethod {
        receiver: receiver.clone(),
        method: NativeFunction::value(name, method),
    })))
}

#[allow(clippy::cast_possible_wrap)]
fn attribute(receiver: &Value, name: &str) -> Option<Value> {
    Some(match (receiver, name) {
        (Value::Complex(re, _), "real") => Value::Float(*re),
        (Value::Complex(_, im), "imag") => Value::Float(*im),
        (Value::DateTime(dt), "year") => Value::Int(i64::from(dt.year())),
        (Value::DateTime(dt), "month") => Value::Int(i64::from(dt.month())),
        (Value::DateTime(dt), "day") => Value::Int(i64::from(dt.day())),
        (Value::DateTime(dt), "hour") => Value::Int(i64::from(dt.hour())),
        (Value::DateTime(dt), "minute") => Value::Int(i64::from(dt.minute())),
        (Value::DateTime(dt), "second") => Value::Int(i64::from(dt.second())),
        (Value::Regex(r), "pattern") => Value::str(r.as_str()),
        (Value::Slice(s), "start") => s.lower.clone(),
        (Value::Slice(s), "stop") => s.upper.clone(),
        (Value::Slice(s), "step") => s.step.clone(),
        (Value::Range(r), "start") => Value::Int(r.start),
        (Value::Range(r), "stop") => Value::Int(r.stop),
        (Value::Range(r), "step") => Value::Int(r.step),
        _ => return None,
    })
}

fn receiver_str(args: &Args) -> RtResult<Rc<str>> {
    match args.get(0) {
        Some(Value::Str(s)) => Ok(Rc::clone(s)),
        _ => Err(RuntimeError::type_error("descriptor requires a 'str' receiver")),
    }
}

fn str_arg(args: &Args, i: usize, method: &str) -> RtResult<String> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(RuntimeError::type_error(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
        None => Err(RuntimeError::type_error(format!("{method}() missing argument"))),
    }
}

fn str_method(name: &str) -> Option<Native> {
    Some(match name {
        "upper" => |_, args| Ok(Value::str(receiver_str(&args)?.to_uppercase())),
        "lower" => |_, args| Ok(Value::str(receiver_str(&args)?.to_lowercase())),
        "strip" => |_, args| Ok(Value::str(receiver_str(&args)?.trim())),
        "lstrip" => |_, args| Ok(Value::str(receiver_str(&args)?.trim_start())),
        "rstrip" => |_, args| Ok(Value::str(receiver_str(&args)?.trim_end())),
        "split" => native_str_split,
        "join" => native_str_join,
        "replace" => native_str_replace,
        "startswith" => |_, args| {
            let s = receiver_str(&args)?;
            Ok(Value::Bool(s.starts_with(str_arg(&args, 1, "startswith")?.as_str())))
        },
        "endswith" => |_, args| {
            let s = receiver_str(&args)?;
            Ok(Value::Bool(s.ends_with(str_arg(&args, 1, "endswith")?.as_str())))
        },
        "find" => native_str_find,
        "count" => |_, args| {
            let s = receiver_str(&args)?;
            let needle = str_arg(&args, 1, "count")?;
            #[allow(clippy::cast_possible_wrap)]
            let count = s.matches(needle.as_str()).count() as i64;
            Ok(Value::Int(count))
        },
        "isdigit" => |_, args| {
            let s = receiver_str(&args)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
        },
        "isalpha" => |_, args| {
            let s = receiver_str(&args)?;
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
        },
        _ => return None,
    })
}

/// str.split: on whitespace, or on a separator
fn native_str_split(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let s = receiver_str(&args)?;
    let parts: Vec<Value> = match args.get(1) {
        None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
        Some(_) => {
            let sep = str_arg(&args, 1, "split")?;
            if sep.is_empty() {
                return Err(RuntimeError::value_error("empty separator"));
            }
            s.split(sep.as_str()).map(Value::str).collect()
        }
    };
    Ok(Value::list(parts))
}

/// str.join
fn native_str_join(interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let sep = receiver_str(&args)?;
    let items = interp.iter_values(args.arg("join", 1)?)?;
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Str(s) => parts.push(s.to_string()),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "sequence item: expected str instance, {} found",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::str(parts.join(&sep)))
}

/// str.replace
fn native_str_replace(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let s = receiver_str(&args)?;
    let from = str_arg(&args, 1, "replace")?;
    let to = str_arg(&args, 2, "replace")?;
    Ok(Value::str(s.replace(from.as_str(), &to)))
}

/// str.find: character index or -1
#[allow(clippy::cast_possible_wrap)]
fn native_str_find(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let s = receiver_str(&args)?;
    let needle = str_arg(&args, 1, "find")?;
    Ok(Value::Int(match s.find(needle.as_str()) {
        Some(byte) => s[..byte].chars().count() as i64,
        None => -1,
    }))
}

fn receiver_list(args: &Args) -> RtResult<Rc<RefCell<Vec<Value>>>> {
    match args.get(0) {
        Some(Value::List(items)) => Ok(Rc::clone(items)),
        _ => Err(RuntimeError::type_error("descriptor requires a 'list' receiver")),
    }
}

fn list_method(name: &str) -> Option<Native> {
    Some(match name {
        "append" => |_, args| {
            let list = receiver_list(&args)?;
            list.borrow_mut().push(args.arg("append", 1)?.clone());
            Ok(Value::None)
        },
        "extend" => |interp, args| {
            let list = receiver_list(&args)?;
            let items = interp.iter_values(args.arg("extend", 1)?)?;
            list.borrow_mut().extend(items);
            Ok(Value::None)
        },
        "insert" => |_, args| {
            let list = receiver_list(&args)?;
            let index = args
                .arg("insert", 1)?
                .as_int()
                .ok_or_else(|| RuntimeError::type_error("insert() index must be an integer"))?;
            let mut items = list.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(usize::try_from(at).unwrap_or(0), args.arg("insert", 2)?.clone());
            Ok(Value::None)
        },
        "pop" => native_list_pop,
        "remove" => |_, args| {
            let list = receiver_list(&args)?;
            let target = args.arg("remove", 1)?;
            let mut items = list.borrow_mut();
            let pos = items
                .iter()
                .position(|v| v == target)
                .ok_or_else(|| RuntimeError::value_error("list.remove(x): x not in list"))?;
            items.remove(pos);
            Ok(Value::None)
        },
        "index" => |_, args| {
            let list = receiver_list(&args)?;
            let target = args.arg("index", 1)?;
            let pos = list
                .borrow()
                .iter()
                .position(|v| v == target)
                .ok_or_else(|| RuntimeError::value_error("value is not in list"))?;
            Ok(Value::Int(i64::try_from(pos).unwrap_or(i64::MAX)))
        },
        "count" => |_, args| {
            let list = receiver_list(&args)?;
            let target = args.arg("count", 1)?;
            let n = list.borrow().iter().filter(|v| *v == target).count();
            Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
        },
        "reverse" => |_, args| {
            receiver_list(&args)?.borrow_mut().reverse();
            Ok(Value::None)
        },
        "sort" => |interp, args| {
            let list = receiver_list(&args)?;
            let reverse = match args.keyword("reverse") {
                Some(v) => interp.truthy(v)?,
                None => false,
            };
            let items = list.borrow().clone();
            let sorted = sort_values(interp, items, args.keyword("key"), reverse)?;
            *list.borrow_mut() = sorted;
            Ok(Value::None)
        },
        "copy" => |_, args| Ok(Value::list(receiver_list(&args)?.borrow().clone())),
        "clear" => |_, args| {
            receiver_list(&args)?.borrow_mut().clear();
            Ok(Value::None)
        },
        _ => return None,
    })
}

/// list.pop: removes the item at an index, default the last
fn native_list_pop(_interp: &mut Interpreter, args: Args) -> RtResult<Value> {
    let list = receiver_list(&args)?;
    let mut items = list.borrow_mut();
    if items.is_empty() {
        return Err(RuntimeError::new(ExceptionKind::IndexError, "pop from empty list"));
    }
    let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let index = args.get(1).and_then(Value::as_int).unwrap_or(-1);
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        return Err(RuntimeError::new(ExceptionKind::IndexError, "pop index out of range"));
    }
    Ok(items.remove(usize::try_from(resolved).unwrap_or(0)))
}

fn receiver_dict(args: &Args) -> RtResult<Rc<RefCell<Dict>>> {
    match args.get(0) {
        Some(Value::Dict(d) | Value::Set(d)) => Ok(Rc::clone(d)),
        _ => Err(RuntimeError::type_error("descriptor requires a mapping receiver")),
    }
}

fn dict_method(name: &str) -> Option<Native> {
    Some(match name {
        "get" => |_, args| {
            let dict = receiver_dict(&args)?;
            let found = dict.borrow().get(args.arg("get", 1)?)?;
            Ok(found.unwrap_or_else(|| args.get(2).cloned().unwrap_or(Value::None)))
        },
        "keys" => |_, args| Ok(Value::list(receiver_dict(&args)?.borrow().keys())),
        "values" => |_, args| Ok(Value::list(receiver_dict(&args)?.borrow().values())),
        "items" => |_, args| {
            let dict = receiver_dict(&args)?;
            let items = dict
                .borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(items))
        },
        "pop" => |_, args| {
            let dict = receiver_dict(&args)?;
            let key = args.arg("pop", 1)?;
            let removed = dict.borrow_mut().remove(key)?;
            match (removed, args.get(2)) {
                (Some(v), _) => Ok(v),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(RuntimeError::new(ExceptionKind::KeyError, key.repr())),
            }
        },
        "setdefault" => |_, args| {
            let dict = receiver_dict(&args)?;
            let key = args.arg("setdefault", 1)?;
            let existing = dict.borrow().get(key)?;
            if let Some(v) = existing {
                return Ok(v);
            }
            let default = args.get(2).cloned().unwrap_or(Value::None);
            dict.borrow_mut().insert(key.clone(), default.clone())?;
            Ok(default)
        },
        "update" => |interp, args| {
            let dict = receiver_dict(&args)?;
            let source = args.arg("update", 1)?;
            let pairs: Vec<(Value, Value)> = match source {
                Value::Dict(other) => other.borrow().iter().cloned().collect(),
                other => {
                    let mut pairs = Vec::new();
                    for pair in interp.iter_values(other)? {
                        let items = interp.iter_values(&pair)?;
                        let [k, v] = <[Value; 2]>::try_from(items)
                            .map_err(|_| RuntimeError::value_error("update() expects pairs"))?;
                        pairs.push((k, v));
                    }
                    pairs
                }
            };
            let mut target = dict.borrow_mut();
            for (k, v) in pairs {
                target.insert(k, v)?;
            }
            Ok(Value::None)
        },
        "copy" => |_, args| Ok(Value::dict(receiver_dict(&args)?.borrow().clone())),
        "clear" => |_, args| {
            receiver_dict(&args)?.borrow_mut().clear();
            Ok(Value::None)
        },
        _ => return None,
    })
}

fn set_method(name: &str) -> Option<Native> {
    Some(match name {
        "add" => |_, args| {
            let set = receiver_dict(&args)?;
            set.borrow_mut().insert(args.arg("add", 1)?.clone(), Value::None)?;
            Ok(Value::None)
        },
        "remove" => |_, args| {
            let set = receiver_dict(&args)?;
            let key = args.arg("remove", 1)?;
            match set.borrow_mut().remove(key)? {
                Some(_) => Ok(Value::None),
                None => Err(RuntimeError::new(ExceptionKind::KeyError, key.repr())),
            }
        },
        "discard" => |_, args| {
            let set = receiver_dict(&args)?;
            set.borrow_mut().remove(args.arg("discard", 1)?)?;
            Ok(Value::None)
        },
        "union" => |interp, args| {
            let mut result = receiver_dict(&args)?.borrow().clone();
            for other in &args.positional[1..] {
                for item in interp.iter_values(other)? {
                    result.insert(item, Value::None)?;
                }
            }
            Ok(Value::Set(Rc::new(RefCell::new(result))))
        },
        "intersection" => |interp, args| {
            let set = receiver_dict(&args)?;
            let other = interp.iter_values(args.arg("intersection", 1)?)?;
            let mut result = Dict::new();
            for item in other {
                if set.borrow().contains(&item)? {
                    result.insert(item, Value::None)?;
                }
            }
            Ok(Value::Set(Rc::new(RefCell::new(result))))
        },
        "copy" => |_, args| {
            let copy = receiver_dict(&args)?.borrow().clone();
            Ok(Value::Set(Rc::new(RefCell::new(copy))))
        },
        _ => return None,
    })
}

fn receiver_regex(args: &Args) -> RtResult<Rc<regex::Regex>> {
    match args.get(0) {
        Some(Value::Regex(r)) => Ok(Rc::clone(r)),
        _ => Err(RuntimeError::type_error("descriptor requires a 'regex' receiver")),
    }
}

fn regex_method(name: &str) -> Option<Native> {
    Some(match name {
        "test" => |_, args| {
            let re = receiver_regex(&args)?;
            Ok(Value::Bool(re.is_match(&str_arg(&args, 1, "test")?)))
        },
        "search" => |_, args| {
            let re = receiver_regex(&args)?;
            let text = str_arg(&args, 1, "search")?;
            Ok(re.find(&text).map_or(Value::None, |m| Value::str(m.as_str())))
        },
        "findall" => |_, args| {
            let re = receiver_regex(&args)?;
            let text = str_arg(&args, 1, "findall")?;
            Ok(Value::list(re.find_iter(&text).map(|m| Value::str(m.as_str())).collect()))
        },
        "sub" => |_, args| {
            let re = receiver_regex(&args)?;
            let replacement = str_arg(&args, 1, "sub")?;
            let text = str_arg(&args, 2, "sub")?;
            Ok(Value::str(re.replace_all(&text, replacement.as_str())))
        },
        "split" => |_, args| {
            let re = receiver_regex(&args)?;
            let text = str_arg(&args, 1, "split")?;
            Ok(Value::list(re.split(&text).map(Value::str).collect()))
        },
        _ => return None,
    })
}

fn datetime_method(name: &str) -> Option<Native> {
    Some(match name {
        "isoformat" => |_, args| match args.get(0) {
            Some(Value::DateTime(dt)) => Ok(Value::str(dt.format("%Y-%m-%dT%H:%M:%S").to_string())),
            _ => Err(RuntimeError::type_error("descriptor requires a 'datetime' receiver")),
        },
        "strftime" => |_, args| match args.get(0) {
            Some(Value::DateTime(dt)) => {
                let fmt = str_arg(&args, 1, "strftime")?;
                let items: Vec<chrono::format::Item<'_>> =
                    chrono::format::StrftimeItems::new(&fmt).collect();
                if items.contains(&chrono::format::Item::Error) {
                    return Err(RuntimeError::value_error("invalid format string"));
                }
                Ok(Value::str(dt.format_with_items(items.into_iter()).to_string()))
            }
            _ => Err(RuntimeError::type_error("descriptor requires a 'datetime' receiver")),
        },
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(interp: &mut Interpreter, receiver: Value, name: &str, rest: Vec<Value>) -> RtResult<Value> {
        let method = lookup(&receiver, name).expect("method exists");
        interp.call(&method, Args::new(rest))
    }

    #[test]
    fn string_methods() {
        let mut interp = Interpreter::new();
        let up = call(&mut interp, Value::str("abc"), "upper", Vec::new()).expect("ok");
        assert_eq!(up, Value::str("ABC"));
        let parts = call(&mut interp, Value::str("a b  c"), "split", Vec::new()).expect("ok");
        assert_eq!(parts.to_string(), "[\"a\", \"b\", \"c\"]");
        let joined = call(
            &mut interp,
            Value::str("-"),
            "join",
            vec![Value::list(vec![Value::str("x"), Value::str("y")])],
        )
        .expect("ok");
        assert_eq!(joined, Value::str("x-y"));
    }

    #[test]
    fn list_mutation_is_shared() {
        let mut interp = Interpreter::new();
        let list = Value::list(vec![Value::Int(3), Value::Int(1)]);
        call(&mut interp, list.clone(), "append", vec![Value::Int(2)]).expect("ok");
        call(&mut interp, list.clone(), "sort", Vec::new()).expect("ok");
        assert_eq!(list.to_string(), "[1, 2, 3]");
        let popped = call(&mut interp, list.clone(), "pop", Vec::new()).expect("ok");
        assert_eq!(popped, Value::Int(3));
    }

    #[test]
    fn dict_get_with_default() {
        let mut interp = Interpreter::new();
        let dict = Value::dict(Dict::new());
        let got = call(&mut interp, dict, "get", vec![Value::str("k"), Value::Int(7)]).expect("ok");
        assert_eq!(got, Value::Int(7));
    }

    #[test]
    fn regex_methods() {
        let mut interp = Interpreter::new();
        let re = Value::Regex(Rc::new(regex::Regex::new("[0-9]+").expect("valid")));
        let found = call(&mut interp, re.clone(), "findall", vec![Value::str("a1b22")]).expect("ok");
        assert_eq!(found.to_string(), "[\"1\", \"22\"]");
        assert_eq!(
            call(&mut interp, re, "test", vec![Value::str("abc")]).expect("ok"),
            Value::Bool(false)
        );
    }

    #[test]
    fn unknown_methods_are_absent() {
        assert!(lookup(&Value::Int(1), "upper").is_none());
        assert!(lookup(&Value::str("x"), "nope").is_none());
    }
}
