//! Iterator state.

use std::collections::VecDeque;
use std::fmt;

use super::value::{Range, Value};

/// What an iterator yields next.
pub enum IterState {
    /// Precomputed items, also used for collected generators.
    Items(VecDeque<Value>),
    /// Lazy integer range.
    Range {
        /// Next value.
        next: i64,
        /// Exclusive end.
        stop: i64,
        /// Increment.
        step: i64,
    },
    /// User object implementing `__next__`.
    Object(Value),
}

/// One step of a built-in iterator.
pub enum Step {
    /// The next value.
    Yield(Value),
    /// Exhausted.
    Done,
    /// The caller must invoke `__next__` on this object.
    Delegate(Value),
}

impl IterState {
    /// Iterator over a list of values.
    #[must_use]
    pub fn from_items(items: Vec<Value>) -> Self {
        Self::Items(items.into())
    }

    /// Lazy iterator over a range.
    #[must_use]
    pub const fn from_range(range: Range) -> Self {
        Self::Range {
            next: range.start,
            stop: range.stop,
            step: range.step,
        }
    }

    /// Advances a built-in iterator.
    pub fn advance(&mut self) -> Step {
        match self {
            Self::Items(items) => items.pop_front().map_or(Step::Done, Step::Yield),
            Self::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return Step::Done;
                }
                let value = *next;
                match next.checked_add(*step) {
                    Some(n) => *next = n,
                    None => *next = *stop,
                }
                Step::Yield(Value::Int(value))
            }
            Self::Object(obj) => Step::Delegate(obj.clone()),
        }
    }
}

impl fmt::Debug for IterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Items(items) => write!(f, "Items({})", items.len()),
            Self::Range { next, stop, step } => write!(f, "Range({next}, {stop}, {step})"),
            Self::Object(obj) => write!(f, "Object({})", obj.type_name()),
        }
    }
}

/// Elements of a built-in iterable, without running user code.
///
/// Strings yield their characters, mappings their keys. Returns `None` for
/// values that need the interpreter (iterators, user objects).
#[must_use]
pub fn builtin_items(value: &Value) -> Option<Vec<Value>> {
    Some(match value {
        Value::List(items) => items.borrow().clone(),
        Value::Tuple(items) => items.as_ref().clone(),
        Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
        Value::Dict(d) | Value::Set(d) => d.borrow().keys(),
        Value::Range(r) => {
            let mut state = IterState::from_range(*r);
            let mut out = Vec::with_capacity(r.len());
            while let Step::Yield(v) = state.advance() {
                out.push(v);
            }
            out
        }
        Value::Node(node) => node
            .as_sequence()
            .map(|seq| seq.nodes.iter().cloned().map(Value::node).collect())?,
        _ => return None,
    })
}
