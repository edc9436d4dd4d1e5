//! Runtime values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::NaiveDateTime;

use super::env::Scope;
use super::error::{ExceptionKind, RuntimeError};
use super::iter::IterState;
use super::Interpreter;
use crate::node::{Node, NodeKind};
use crate::target::{Expr, FunctionDef};

/// Signature of native functions.
pub type NativeFn = dyn Fn(&mut Interpreter, Args) -> Result<Value, RuntimeError>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// `null`.
    None,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Complex number `(re, im)`.
    Complex(f64, f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Mutable list.
    List(Rc<RefCell<Vec<Value>>>),
    /// Immutable tuple.
    Tuple(Rc<Vec<Value>>),
    /// Insertion-ordered mapping.
    Dict(Rc<RefCell<Dict>>),
    /// Insertion-ordered set, stored as a mapping to `None`.
    Set(Rc<RefCell<Dict>>),
    /// Slice bounds.
    Slice(Rc<SliceValue>),
    /// Integer range.
    Range(Range),
    /// Stateful iterator.
    Iterator(Rc<RefCell<IterState>>),
    /// User function or lambda.
    Function(Rc<Closure>),
    /// Native function.
    Native(Rc<NativeFunction>),
    /// Function bound to a receiver.
    BoundMethod(Rc<BoundMethod>),
    /// User or built-in exception class.
    Class(Rc<Class>),
    /// Class instance.
    Instance(Rc<Instance>),
    /// Imported module.
    Module(Rc<Module>),
    /// Syntax node.
    Node(Rc<Node>),
    /// Built-in type object.
    Type(BuiltinType),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// Compiled regular expression.
    Regex(Rc<regex::Regex>),
    /// Result of calling an async function.
    Coroutine(Rc<RefCell<Coroutine>>),
}

/// Positional and keyword arguments of a call.
#[derive(Clone, Debug, Default)]
pub struct Args {
    /// Positional arguments.
    pub positional: Vec<Value>,
    /// Keyword arguments in call order.
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    /// Positional-only arguments.
    #[must_use]
    pub const fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    /// Number of positional arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// Returns true if there are no positional arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    /// Positional argument `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.positional.get(i)
    }

    /// Keyword argument by name.
    #[must_use]
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Checks the positional count against `min..=max`.
    ///
    /// # Errors
    /// Returns a `TypeError` naming the function.
    pub fn check(&self, name: &str, min: usize, max: usize) -> Result<(), RuntimeError> {
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(RuntimeError::type_error(format!(
                "{name}() takes {expected} arguments ({n} given)"
            )));
        }
        Ok(())
    }

    /// Positional argument `i`, or a `TypeError`.
    ///
    /// # Errors
    /// Fails when the argument is missing.
    pub fn arg(&self, name: &str, i: usize) -> Result<&Value, RuntimeError> {
        self.positional
            .get(i)
            .ok_or_else(|| RuntimeError::type_error(format!("{name}() missing argument {}", i + 1)))
    }
}

/// Slice bounds; any bound may be `None`.
#[derive(Clone, Debug)]
pub struct SliceValue {
    /// Start.
    pub lower: Value,
    /// End.
    pub upper: Value,
    /// Step.
    pub step: Value,
}

/// An integer range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// First value.
    pub start: i64,
    /// Exclusive end.
    pub stop: i64,
    /// Increment, never zero.
    pub step: i64,
}

impl Range {
    /// Number of values in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs();
        usize::try_from((span.unsigned_abs() + step - 1) / step).unwrap_or(usize::MAX)
    }

    /// Returns true if the range yields nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of a user function.
#[derive(Clone, Debug)]
pub enum FunctionBody {
    /// Statement body of a named or hoisted function.
    Block(Rc<FunctionDef>),
    /// Single-expression lambda body.
    Expr(Rc<Expr>),
}

/// A user function together with its defining scope.
pub struct Closure {
    /// Function name (`<lambda>` for lambdas).
    pub name: String,
    /// Parameter names.
    pub params: Vec<String>,
    /// Body.
    pub body: FunctionBody,
    /// Whether calling returns a coroutine.
    pub is_async: bool,
    /// Whether the body yields.
    pub is_generator: bool,
    /// Scope captured at definition.
    pub scope: Rc<Scope>,
}

/// A native function.
pub struct NativeFunction {
    /// Name used in messages.
    pub name: String,
    /// Implementation.
    pub func: Box<NativeFn>,
}

impl NativeFunction {
    /// Wraps a closure as a native function value.
    pub fn value(
        name: impl Into<String>,
        func: impl Fn(&mut Interpreter, Args) -> Result<Value, RuntimeError> + 'static,
    ) -> Value {
        Value::Native(Rc::new(Self {
            name: name.into(),
            func: Box::new(func),
        }))
    }
}

/// A method bound to its receiver.
#[derive(Clone)]
pub struct BoundMethod {
    /// Receiver, passed as the first argument.
    pub receiver: Value,
    /// Underlying function.
    pub method: Value,
}

/// A class.
pub struct Class {
    /// Class name.
    pub name: String,
    /// Direct base classes.
    pub bases: Vec<Rc<Class>>,
    /// Class attributes and methods.
    pub attrs: RefCell<HashMap<String, Value>>,
    /// Built-in exception class this is, if any.
    pub builtin: Option<ExceptionKind>,
}

impl Class {
    /// Looks up an attribute along the base chain, depth first.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.attrs.borrow().get(name) {
            return Some(v.clone());
        }
        self.bases.iter().find_map(|b| b.lookup(name))
    }

    /// Returns true if `self` is `other` or derives from it.
    #[must_use]
    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Self>) -> bool {
        Rc::ptr_eq(self, other) || self.bases.iter().any(|b| b.is_subclass_of(other))
    }

    /// The nearest built-in exception ancestor.
    #[must_use]
    pub fn exception_kind(&self) -> Option<ExceptionKind> {
        self.builtin
            .or_else(|| self.bases.iter().find_map(|b| b.exception_kind()))
    }
}

/// An instance of a user class.
pub struct Instance {
    /// The instance's class.
    pub class: Rc<Class>,
    /// Instance attributes.
    pub attrs: RefCell<HashMap<String, Value>>,
}

/// A loaded module.
pub struct Module {
    /// Dotted name.
    pub name: String,
    /// Top-level bindings.
    pub scope: Rc<Scope>,
}

/// State of a coroutine.
pub enum Coroutine {
    /// Not yet awaited.
    Pending {
        /// Function to run.
        closure: Rc<Closure>,
        /// Call arguments.
        args: Args,
    },
    /// Already resolved.
    Done(Value),
}

/// Node variants usable as runtime types and constructors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeClass {
    /// Any node.
    Node,
    /// Whitespace.
    Whitespace,
    /// Comment.
    Comment,
    /// Unknown run.
    Unknown,
    /// Identifier.
    Identifier,
    /// Operator.
    Operator,
    /// String literal.
    String,
    /// Number literal.
    Number,
    /// Binary operation.
    BinOp,
    /// Bare sequence.
    Sequence,
    /// `( )`
    RoundBrackets,
    /// `[ ]`
    SquareBrackets,
    /// `{ }`
    CurlyBrackets,
}

impl NodeClass {
    /// Every node class.
    pub const ALL: [Self; 13] = [
        Self::Node,
        Self::Whitespace,
        Self::Comment,
        Self::Unknown,
        Self::Identifier,
        Self::Operator,
        Self::String,
        Self::Number,
        Self::BinOp,
        Self::Sequence,
        Self::RoundBrackets,
        Self::SquareBrackets,
        Self::CurlyBrackets,
    ];

    /// Class name, equal to the node variant name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Node => "Node",
            Self::Whitespace => "Whitespace",
            Self::Comment => "Comment",
            Self::Unknown => "Unknown",
            Self::Identifier => "Identifier",
            Self::Operator => "Operator",
            Self::String => "String",
            Self::Number => "Number",
            Self::BinOp => "BinOp",
            Self::Sequence => "Sequence",
            Self::RoundBrackets => "RoundBrackets",
            Self::SquareBrackets => "SquareBrackets",
            Self::CurlyBrackets => "CurlyBrackets",
        }
    }

    /// Returns true if `node` is an instance of this class.
    #[must_use]
    pub fn matches(self, node: &Node) -> bool {
        match self {
            Self::Node => true,
            Self::Sequence => matches!(node.kind, NodeKind::Sequence(_)),
            other => node.variant_name() == other.name(),
        }
    }
}

/// Built-in types, callable as conversion functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `complex`
    Complex,
    /// `str`
    Str,
    /// `list`
    List,
    /// `tuple`
    Tuple,
    /// `dict`
    Dict,
    /// `set`
    Set,
    /// `range`
    Range,
    /// `object`
    Object,
    /// A syntax node class.
    Node(NodeClass),
}

impl BuiltinType {
    /// Type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Str => "str",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Dict => "dict",
            Self::Set => "set",
            Self::Range => "range",
            Self::Object => "object",
            Self::Node(class) => class.name(),
        }
    }
}

/// Key used to index mappings and sets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKey {
    /// `null`.
    None,
    /// Integers, booleans and integral floats.
    Int(i64),
    /// Other floats, by bit pattern.
    Float(u64),
    /// Strings.
    Str(Rc<str>),
    /// Tuples.
    Tuple(Vec<HashKey>),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// Syntax nodes, by variant and source text.
    Node(&'static str, String),
    /// Objects hashed by identity.
    Identity(usize),
}

impl HashKey {
    /// Computes the key of a hashable value.
    ///
    /// # Errors
    /// Returns a `TypeError` for lists, mappings and sets.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp, clippy::cast_precision_loss)]
    pub fn of(value: &Value) -> Result<Self, RuntimeError> {
        Ok(match value {
            Value::None => Self::None,
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Int(n) => Self::Int(*n),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Self::Int(*f as i64),
            Value::Float(f) => Self::Float(f.to_bits()),
            Value::Str(s) => Self::Str(Rc::clone(s)),
            Value::Tuple(items) => Self::Tuple(items.iter().map(Self::of).collect::<Result<_, _>>()?),
            Value::DateTime(dt) => Self::DateTime(*dt),
            Value::Node(n) => Self::Node(n.variant_name(), n.to_string()),
            Value::Type(t) => Self::Str(Rc::from(format!("<type {}>", t.name()))),
            Value::List(_) | Value::Dict(_) | Value::Set(_) => {
                return Err(RuntimeError::type_error(format!(
                    "unhashable type: '{}'",
                    value.type_name()
                )));
            }
            other => Self::Identity(other.identity()),
        })
    }
}

/// Insertion-ordered mapping with hashed lookup.
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: HashMap<HashKey, usize>,
}

impl Dict {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from pairs; later keys win.
    ///
    /// # Errors
    /// Fails on an unhashable key.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Result<Self, RuntimeError> {
        let mut dict = Self::new();
        for (k, v) in pairs {
            dict.insert(k, v)?;
        }
        Ok(dict)
    }

    /// Value stored under `key`.
    ///
    /// # Errors
    /// Fails on an unhashable key.
    pub fn get(&self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let hash = HashKey::of(key)?;
        Ok(self.index.get(&hash).map(|&i| self.entries[i].1.clone()))
    }

    /// Returns true if `key` is present.
    ///
    /// # Errors
    /// Fails on an unhashable key.
    pub fn contains(&self, key: &Value) -> Result<bool, RuntimeError> {
        Ok(self.index.contains_key(&HashKey::of(key)?))
    }

    /// Inserts or replaces an entry, keeping the original position.
    ///
    /// # Errors
    /// Fails on an unhashable key.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        let hash = HashKey::of(&key)?;
        match self.index.get(&hash) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hash, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    /// Removes an entry.
    ///
    /// # Errors
    /// Fails on an unhashable key.
    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let hash = HashKey::of(key)?;
        let Some(i) = self.index.remove(&hash) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Values in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(s.as_ref()))
    }

    /// Creates a list value.
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Creates a tuple value.
    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    /// Creates a mapping value.
    #[must_use]
    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Creates a syntax node value.
    #[must_use]
    pub fn node(node: Node) -> Self {
        Self::Node(Rc::new(node))
    }

    /// Type name used in messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".into(),
            Self::Bool(_) => "bool".into(),
            Self::Int(_) => "int".into(),
            Self::Float(_) => "float".into(),
            Self::Complex(..) => "complex".into(),
            Self::Str(_) => "str".into(),
            Self::List(_) => "list".into(),
            Self::Tuple(_) => "tuple".into(),
            Self::Dict(_) => "dict".into(),
            Self::Set(_) => "set".into(),
            Self::Slice(_) => "slice".into(),
            Self::Range(_) => "range".into(),
            Self::Iterator(_) => "iterator".into(),
            Self::Function(_) => "function".into(),
            Self::Native(_) => "builtin_function".into(),
            Self::BoundMethod(_) => "method".into(),
            Self::Class(_) | Self::Type(_) => "type".into(),
            Self::Instance(inst) => inst.class.name.clone(),
            Self::Module(_) => "module".into(),
            Self::Node(n) => n.variant_name().into(),
            Self::DateTime(_) => "datetime".into(),
            Self::Regex(_) => "regex".into(),
            Self::Coroutine(_) => "coroutine".into(),
        }
    }

    /// Address of the shared allocation, for identity hashing and `is`.
    #[must_use]
    pub fn identity(&self) -> usize {
        match self {
            Self::List(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Dict(rc) | Self::Set(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Tuple(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Iterator(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Function(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Native(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::BoundMethod(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Class(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Instance(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Module(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Node(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Regex(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Coroutine(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Slice(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            _ => 0,
        }
    }

    /// The string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, accepting booleans.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric payload as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The node payload, if this is a syntax node.
    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Returns true for `null`.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Class name when this value is used as an exception.
    #[must_use]
    pub fn exception_class_name(&self) -> String {
        match self {
            Self::Instance(inst) => inst.class.name.clone(),
            Self::Class(class) => class.name.clone(),
            other => other.type_name(),
        }
    }

    /// Message when this value is used as an exception.
    #[must_use]
    pub fn exception_message(&self) -> String {
        match self {
            Self::Instance(inst) => match inst.attrs.borrow().get("args") {
                Some(Self::Tuple(args)) => match args.as_slice() {
                    [] => String::new(),
                    [one] => one.to_string(),
                    many => Self::Tuple(Rc::new(many.to_vec())).repr(),
                },
                Some(other) => other.to_string(),
                None => String::new(),
            },
            Self::Class(_) => String::new(),
            other => other.to_string(),
        }
    }

    /// Source-like representation, quoting strings.
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("\"{}\"", crate::literal::escape(s)),
            Self::DateTime(dt) => format!("\"{}\"dt", dt.format("%Y-%m-%dT%H:%M:%S")),
            Self::Regex(r) => format!("\"{}\"regex", r.as_str()),
            other => other.to_string(),
        }
    }
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::Complex(re, im) => {
                if *re == 0.0 {
                    write!(f, "{}i", format_float(*im))
                } else {
                    let sign = if *im < 0.0 { "-" } else { "+" };
                    write!(f, "({}{sign}{}i)", format_float(*re), format_float(im.abs()))
                }
            }
            Self::Str(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", join_repr(&items.borrow())),
            Self::Tuple(items) => {
                if items.len() == 1 {
                    write!(f, "({},)", items[0].repr())
                } else {
                    write!(f, "({})", join_repr(items))
                }
            }
            Self::Dict(dict) => {
                let pairs: Vec<String> = dict
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Self::Set(set) => {
                let keys = set.borrow().keys();
                if keys.is_empty() {
                    f.write_str("set()")
                } else {
                    write!(f, "{{{}}}", join_repr(&keys))
                }
            }
            Self::Slice(s) => write!(f, "slice({}, {}, {})", s.lower.repr(), s.upper.repr(), s.step.repr()),
            Self::Range(r) => write!(f, "range({}, {}, {})", r.start, r.stop, r.step),
            Self::Iterator(_) => f.write_str("<iterator>"),
            Self::Function(c) => write!(f, "<function {}>", c.name),
            Self::Native(n) => write!(f, "<built-in function {}>", n.name),
            Self::BoundMethod(m) => write!(f, "<bound method of {}>", m.receiver.type_name()),
            Self::Class(c) => write!(f, "<class {}>", c.name),
            Self::Instance(inst) => {
                if inst.class.exception_kind().is_some() {
                    f.write_str(&self.exception_message())
                } else {
                    write!(f, "<{} object>", inst.class.name)
                }
            }
            Self::Module(m) => write!(f, "<module {}>", m.name),
            Self::Node(n) => write!(f, "{n}"),
            Self::Type(t) => write!(f, "<type {}>", t.name()),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Regex(r) => f.write_str(r.as_str()),
            Self::Coroutine(_) => f.write_str("<coroutine>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(n) => write!(f, "Node({:?}, {n})", n.variant_name()),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({}({}))", self.name, self.params.join(", "))
    }
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Complex(a, b), Self::Complex(c, d)) => a == c && b == d,
            (Self::List(a), Self::List(b)) => *a.borrow() == *b.borrow(),
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) | (Self::Set(a), Self::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| matches!(b.get(k), Ok(Some(w)) if *v == w))
            }
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => {
                a.variant_name() == b.variant_name() && a.to_string() == b.to_string()
            }
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => {
                    match (a.as_int(), b.as_int()) {
                        (Some(i), Some(j)) => i == j,
                        _ => x == y,
                    }
                }
                _ => {
                    let (ia, ib) = (a.identity(), b.identity());
                    ia != 0 && ia == ib
                }
            },
        }
    }
}
