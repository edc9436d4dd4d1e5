//! Tree-walking interpreter for compiled programs.
//!
//! The interpreter is the host execution substrate of the compiler: the
//! meta engine runs macro and operator definitions through it during
//! compilation, and [`crate::Context::eval_source`] runs whole programs.
//!
//! Values are reference counted and single threaded. Exceptions travel as
//! [`RuntimeError`] values; built-in errors become instances of the
//! matching exception class as soon as program code catches them.
//!
//! Output of `print` is collected in an output buffer and, when echo is
//! enabled, also written to standard output.

#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

pub mod builtins;
mod env;
mod error;
mod iter;
mod ops;
mod value;

pub use env::{Scope, ScopeKind};
pub use error::{ExceptionKind, RuntimeError};
pub use iter::IterState;
pub use value::{
    Args, BoundMethod, BuiltinType, Class, Closure, Coroutine, Dict, FunctionBody, HashKey,
    Instance, Module, NativeFn, NativeFunction, NodeClass, Range, SliceValue, Value,
};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use iter::{Step, builtin_items};

use crate::literal::Literal;
use crate::modules::ModuleResolver;
use crate::target::{
    BoolOperator, Constant, Expr, ExprKind, FunctionDef, Handler, ImportAlias, Program, Stmt,
    StmtKind,
};

/// Result of running program code.
pub type RtResult<T> = std::result::Result<T, RuntimeError>;

/// Default limit on nested user function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 150;

/// How a block finished.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// The interpreter state shared by every module it runs.
pub struct Interpreter {
    builtins: Rc<Scope>,
    exceptions: HashMap<ExceptionKind, Rc<Class>>,
    modules: HashMap<String, Rc<Module>>,
    resolver: Option<Rc<dyn ModuleResolver>>,
    depth: usize,
    max_depth: usize,
    yields: Vec<Vec<Value>>,
    handling: Vec<RuntimeError>,
    output: Vec<String>,
    echo: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Creates an interpreter with the built-in functions installed.
    #[must_use]
    pub fn new() -> Self {
        let mut interp = Self {
            builtins: Scope::new(ScopeKind::Builtins, None),
            exceptions: HashMap::new(),
            modules: HashMap::new(),
            resolver: None,
            depth: 0,
            max_depth: DEFAULT_MAX_CALL_DEPTH,
            yields: Vec::new(),
            handling: Vec::new(),
            output: Vec::new(),
            echo: false,
        };
        builtins::install(&mut interp);
        interp
    }

    /// Sets the resolver used by runtime `import`.
    pub fn set_resolver(&mut self, resolver: Rc<dyn ModuleResolver>) {
        self.resolver = Some(resolver);
    }

    /// Sets the limit on nested calls.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Also write `print` output to standard output.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Lines printed so far.
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Takes the printed lines, leaving the buffer empty.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn write_line(&mut self, line: String) {
        if self.echo {
            println!("{line}");
        }
        self.output.push(line);
    }

    /// The scope holding built-in names.
    #[must_use]
    pub fn builtins(&self) -> &Rc<Scope> {
        &self.builtins
    }

    /// Binds a name in the built-in scope.
    pub fn define_builtin(&self, name: &str, value: Value) {
        self.builtins.set_local(name, value);
    }

    /// A fresh module-level scope.
    #[must_use]
    pub fn module_scope(&self) -> Rc<Scope> {
        Scope::child(&self.builtins, ScopeKind::Module)
    }

    /// The class object of a built-in exception.
    #[must_use]
    pub fn exception_class(&self, kind: ExceptionKind) -> Option<Rc<Class>> {
        self.exceptions.get(&kind).cloned()
    }

    pub(crate) fn register_exception_class(&mut self, kind: ExceptionKind, class: Rc<Class>) {
        self.exceptions.insert(kind, class);
    }

    /// Registers a module so `import` finds it without the resolver.
    pub fn register_module(&mut self, module: Rc<Module>) {
        self.modules.insert(module.name.clone(), module);
    }

    /// Runs a program in `scope`.
    ///
    /// Returns the value of the final statement when it is an expression
    /// statement, and `null` otherwise.
    ///
    /// # Errors
    /// Returns the exception that escaped the program.
    pub fn run_program(&mut self, program: &Program, scope: &Rc<Scope>) -> RtResult<Value> {
        self.run_statements(&program.body, scope)
    }

    /// Runs statements like [`Interpreter::run_program`].
    ///
    /// # Errors
    /// Returns the exception that escaped.
    pub fn run_statements(&mut self, stmts: &[Stmt], scope: &Rc<Scope>) -> RtResult<Value> {
        let mut last = Value::None;
        for stmt in stmts {
            if let StmtKind::Expr(expr) = &stmt.kind {
                last = self.eval(expr, scope)?;
                continue;
            }
            last = Value::None;
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                Flow::Return(_) => {
                    return Err(RuntimeError::new(
                        ExceptionKind::RuntimeError,
                        "'return' outside function",
                    ));
                }
                Flow::Break | Flow::Continue => {
                    return Err(RuntimeError::new(
                        ExceptionKind::RuntimeError,
                        "'break' or 'continue' outside loop",
                    ));
                }
            }
        }
        Ok(last)
    }

    pub(crate) fn exec_block(&mut self, stmts: &[Stmt], scope: &Rc<Scope>) -> RtResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> RtResult<Flow> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value, scope)?;
            }
            StmtKind::FunctionDef(def) => {
                let closure = make_function(def, scope);
                scope.assign(&def.name, closure);
            }
            StmtKind::ClassDef {
                name,
                bases,
                keywords,
                body,
            } => {
                let class = self.exec_class(name, bases, keywords, body, scope)?;
                scope.assign(name, class);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { test, body, orelse } => {
                let test = self.eval(test, scope)?;
                let branch = if self.truthy(&test)? { body } else { orelse };
                return self.exec_block(branch, scope);
            }
            StmtKind::While { test, body } => loop {
                let test = self.eval(test, scope)?;
                if !self.truthy(&test)? {
                    break;
                }
                match self.exec_block(body, scope)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::For {
                target, iter, body, ..
            } => {
                let iterable = self.eval(iter, scope)?;
                let iterator = self.make_iter(&iterable)?;
                while let Some(item) = self.next_value(&iterator)? {
                    self.assign(target, item, scope)?;
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::With {
                context,
                target,
                body,
                is_async,
            } => return self.exec_with(context, target.as_deref(), body, *is_async, scope),
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => return self.exec_try(body, handlers, orelse, finalbody, scope),
            StmtKind::Raise { exc, cause } => {
                if let Some(cause) = cause {
                    self.eval(cause, scope)?;
                }
                let err = match exc {
                    Some(expr) => {
                        let value = self.eval(expr, scope)?;
                        self.to_exception(value)?
                    }
                    None => self.handling.last().cloned().ok_or_else(|| {
                        RuntimeError::new(ExceptionKind::RuntimeError, "no active exception to re-raise")
                    })?,
                };
                return Err(err);
            }
            StmtKind::Assert { test, msg } => {
                let value = self.eval(test, scope)?;
                if !self.truthy(&value)? {
                    let message = match msg {
                        Some(expr) => {
                            let v = self.eval(expr, scope)?;
                            self.str_of(&v)?
                        }
                        None => String::new(),
                    };
                    return Err(RuntimeError::new(ExceptionKind::AssertionError, message));
                }
            }
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.delete(target, scope)?;
                }
            }
            StmtKind::Import(aliases) => {
                for alias in aliases {
                    let module = self.import_module(&alias.name)?;
                    match &alias.alias {
                        Some(local) => scope.assign(local, Value::Module(module)),
                        None => bind_dotted(scope, &alias.name, module),
                    }
                }
            }
            StmtKind::ImportFrom { module, names } => {
                let module = self.import_module(module)?;
                self.import_names(&module, names, scope)?;
            }
            StmtKind::Global(names) => scope.declare_global(names),
            StmtKind::Nonlocal(names) => scope.declare_nonlocal(names),
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn exec_class(
        &mut self,
        name: &str,
        bases: &[Expr],
        keywords: &[crate::target::Keyword],
        body: &[Stmt],
        scope: &Rc<Scope>,
    ) -> RtResult<Value> {
        let mut base_classes = Vec::with_capacity(bases.len());
        for base in bases {
            match self.eval(base, scope)? {
                Value::Class(class) => base_classes.push(class),
                Value::Type(BuiltinType::Object) => {}
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "cannot inherit from {}",
                        other.type_name()
                    )));
                }
            }
        }
        let class_scope = Scope::child(scope, ScopeKind::Class);
        match self.exec_block(body, &class_scope)? {
            Flow::Normal => {}
            _ => {
                return Err(RuntimeError::new(
                    ExceptionKind::RuntimeError,
                    "control flow statement in class body",
                ));
            }
        }
        let mut attrs = class_scope.locals();
        for keyword in keywords {
            let value = self.eval(&keyword.value, scope)?;
            attrs.insert(keyword.name.clone(), value);
        }
        Ok(Value::Class(Rc::new(Class {
            name: name.to_string(),
            bases: base_classes,
            attrs: RefCell::new(attrs),
            builtin: None,
        })))
    }

    fn exec_with(
        &mut self,
        context: &Expr,
        target: Option<&str>,
        body: &[Stmt],
        is_async: bool,
        scope: &Rc<Scope>,
    ) -> RtResult<Flow> {
        let manager = self.eval(context, scope)?;
        let (enter, exit) = if is_async && self.has_method(&manager, "__aenter__") {
            ("__aenter__", "__aexit__")
        } else {
            ("__enter__", "__exit__")
        };
        let mut entered = self.call_method(&manager, enter, Args::default())?;
        if is_async {
            entered = self.await_value(entered)?;
        }
        if let Some(name) = target {
            scope.assign(name, entered);
        }
        let outcome = self.exec_block(body, scope);
        match outcome {
            Ok(flow) => {
                let done = self.call_method(
                    &manager,
                    exit,
                    Args::new(vec![Value::None, Value::None, Value::None]),
                )?;
                if is_async {
                    self.await_value(done)?;
                }
                Ok(flow)
            }
            Err(err) => {
                let exc = self.exception_value(&err);
                let class = self.class_of(&exc);
                let mut suppress =
                    self.call_method(&manager, exit, Args::new(vec![class, exc, Value::None]))?;
                if is_async {
                    suppress = self.await_value(suppress)?;
                }
                if self.truthy(&suppress)? {
                    Ok(Flow::Normal)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[Handler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
        scope: &Rc<Scope>,
    ) -> RtResult<Flow> {
        let outcome = match self.exec_block(body, scope) {
            Ok(Flow::Normal) => self.exec_block(orelse, scope),
            Ok(flow) => Ok(flow),
            Err(err) => self.handle(err, handlers, scope),
        };
        if finalbody.is_empty() {
            return outcome;
        }
        match self.exec_block(finalbody, scope)? {
            Flow::Normal => outcome,
            overriding => Ok(overriding),
        }
    }

    fn handle(&mut self, err: RuntimeError, handlers: &[Handler], scope: &Rc<Scope>) -> RtResult<Flow> {
        let exc = self.exception_value(&err);
        for handler in handlers {
            let matched = match &handler.class {
                None => true,
                Some(class) => {
                    let class = self.eval(class, scope)?;
                    self.exception_matches(&exc, &class)?
                }
            };
            if !matched {
                continue;
            }
            if let Some(name) = &handler.name {
                scope.assign(name, exc.clone());
            }
            self.handling.push(RuntimeError::Raised(exc.clone()));
            let result = self.exec_block(&handler.body, scope);
            self.handling.pop();
            return result;
        }
        Err(err)
    }

    /// Converts a raised value into an exception.
    fn to_exception(&mut self, value: Value) -> RtResult<RuntimeError> {
        match value {
            Value::Class(class) if class.exception_kind().is_some() => {
                let instance = self.instantiate(&class, Args::default())?;
                Ok(RuntimeError::Raised(instance))
            }
            Value::Instance(inst) if inst.class.exception_kind().is_some() => {
                Ok(RuntimeError::Raised(Value::Instance(inst)))
            }
            other => Err(RuntimeError::type_error(format!(
                "exceptions must derive from Exception, not {}",
                other.type_name()
            ))),
        }
    }

    /// The exception object for an error, creating one for built-in errors.
    pub fn exception_value(&mut self, err: &RuntimeError) -> Value {
        match err {
            RuntimeError::Raised(value) => value.clone(),
            RuntimeError::Builtin { kind, message } => {
                let Some(class) = self.exceptions.get(kind).cloned() else {
                    return Value::str(message);
                };
                let attrs = HashMap::from([(
                    "args".to_string(),
                    Value::tuple(vec![Value::str(message)]),
                )]);
                Value::Instance(Rc::new(Instance {
                    class,
                    attrs: RefCell::new(attrs),
                }))
            }
        }
    }

    fn exception_matches(&mut self, exc: &Value, class: &Value) -> RtResult<bool> {
        match class {
            Value::Class(class) => Ok(match exc {
                Value::Instance(inst) => inst.class.is_subclass_of(class),
                _ => false,
            }),
            Value::Tuple(classes) => {
                for class in classes.iter() {
                    if self.exception_matches(exc, class)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(RuntimeError::type_error(format!(
                "catching {} is not allowed",
                other.type_name()
            ))),
        }
    }

    fn class_of(&self, value: &Value) -> Value {
        match value {
            Value::Instance(inst) => Value::Class(Rc::clone(&inst.class)),
            _ => Value::None,
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &Rc<Scope>) -> RtResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                scope.assign(name, value);
                Ok(())
            }
            ExprKind::Attribute { value: obj, attr } => {
                let obj = self.eval(obj, scope)?;
                self.set_attr(&obj, attr, value)
            }
            ExprKind::Subscript { value: obj, index } => {
                let obj = self.eval(obj, scope)?;
                let index = self.eval(index, scope)?;
                self.set_item(&obj, index, value)
            }
            ExprKind::List(targets) | ExprKind::Tuple(targets) => {
                let items = self.iter_values(&value)?;
                if items.len() != targets.len() {
                    return Err(RuntimeError::value_error(format!(
                        "expected {} values to unpack, got {}",
                        targets.len(),
                        items.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, scope)?;
                }
                Ok(())
            }
            _ => Err(RuntimeError::new(
                ExceptionKind::RuntimeError,
                "cannot assign to expression",
            )),
        }
    }

    fn delete(&mut self, target: &Expr, scope: &Rc<Scope>) -> RtResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                if scope.remove_local(name) {
                    Ok(())
                } else {
                    Err(RuntimeError::name_error(name))
                }
            }
            ExprKind::Attribute { value, attr } => {
                let obj = self.eval(value, scope)?;
                let removed = match &obj {
                    Value::Instance(inst) => inst.attrs.borrow_mut().remove(attr).is_some(),
                    Value::Class(class) => class.attrs.borrow_mut().remove(attr).is_some(),
                    _ => false,
                };
                if removed {
                    Ok(())
                } else {
                    Err(RuntimeError::attribute_error(&obj.type_name(), attr))
                }
            }
            ExprKind::Subscript { value, index } => {
                let obj = self.eval(value, scope)?;
                let index = self.eval(index, scope)?;
                self.del_item(&obj, &index)
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.delete(item, scope)?;
                }
                Ok(())
            }
            _ => Err(RuntimeError::new(
                ExceptionKind::RuntimeError,
                "cannot delete expression",
            )),
        }
    }

    /// Evaluates an expression.
    ///
    /// # Errors
    /// Returns any exception raised during evaluation.
    pub fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> RtResult<Value> {
        match &expr.kind {
            ExprKind::Constant(constant) => constant_value(constant),
            ExprKind::Name(name) => scope
                .lookup(name)
                .ok_or_else(|| RuntimeError::name_error(name)),
            ExprKind::BinOp { left, op, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            ExprKind::Not(operand) => {
                let value = self.eval(operand, scope)?;
                Ok(Value::Bool(!self.truthy(&value)?))
            }
            ExprKind::BoolOp { op, left, right } => {
                let left = self.eval(left, scope)?;
                let left_true = self.truthy(&left)?;
                match op {
                    BoolOperator::And if !left_true => Ok(left),
                    BoolOperator::Or if left_true => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut current = self.eval(left, scope)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let next = self.eval(comparator, scope)?;
                    if !self.compare(*op, &current, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func, scope)?;
                let mut call_args = Args::default();
                for arg in args {
                    call_args.positional.push(self.eval(arg, scope)?);
                }
                for keyword in keywords {
                    let value = self.eval(&keyword.value, scope)?;
                    call_args.keywords.push((keyword.name.clone(), value));
                }
                self.call(&callee, call_args)
            }
            ExprKind::Lambda { params, body } => Ok(Value::Function(Rc::new(Closure {
                name: "<lambda>".to_string(),
                params: params.clone(),
                is_generator: expr_yields(body),
                body: FunctionBody::Expr(Rc::new(body.as_ref().clone())),
                is_async: false,
                scope: Rc::clone(scope),
            }))),
            ExprKind::Function(def) => Ok(make_function(def, scope)),
            ExprKind::IfExp { test, body, orelse } => {
                let test = self.eval(test, scope)?;
                if self.truthy(&test)? {
                    self.eval(body, scope)
                } else {
                    self.eval(orelse, scope)
                }
            }
            ExprKind::Attribute { value, attr } => {
                let value = self.eval(value, scope)?;
                self.get_attr(&value, attr)
            }
            ExprKind::Subscript { value, index } => {
                let value = self.eval(value, scope)?;
                let index = self.eval(index, scope)?;
                self.subscript(&value, &index)
            }
            ExprKind::Slice { lower, upper, step } => {
                let mut bound = |b: &Option<Box<Expr>>| match b {
                    Some(e) => self.eval(e, scope),
                    None => Ok(Value::None),
                };
                Ok(Value::Slice(Rc::new(SliceValue {
                    lower: bound(lower)?,
                    upper: bound(upper)?,
                    step: bound(step)?,
                })))
            }
            ExprKind::List(items) => Ok(Value::list(self.eval_all(items, scope)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_all(items, scope)?)),
            ExprKind::Set(items) => {
                let items = self.eval_all(items, scope)?;
                let set = Dict::from_pairs(items.into_iter().map(|v| (v, Value::None)))?;
                Ok(Value::Set(Rc::new(RefCell::new(set))))
            }
            ExprKind::Dict(pairs) => {
                let mut dict = Dict::new();
                for (k, v) in pairs {
                    let key = self.eval(k, scope)?;
                    let value = self.eval(v, scope)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            ExprKind::Yield(value) => {
                let value = match value {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::None,
                };
                self.yields
                    .last_mut()
                    .ok_or_else(|| RuntimeError::new(ExceptionKind::RuntimeError, "'yield' outside function"))?
                    .push(value);
                Ok(Value::None)
            }
            ExprKind::YieldFrom(iterable) => {
                let iterable = self.eval(iterable, scope)?;
                let items = self.iter_values(&iterable)?;
                self.yields
                    .last_mut()
                    .ok_or_else(|| RuntimeError::new(ExceptionKind::RuntimeError, "'yield' outside function"))?
                    .extend(items);
                Ok(Value::None)
            }
            ExprKind::Await(value) => {
                let value = self.eval(value, scope)?;
                self.await_value(value)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], scope: &Rc<Scope>) -> RtResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, scope)).collect()
    }

    /// Applies an arithmetic operator, honoring operator methods on instances.
    ///
    /// # Errors
    /// Fails on unsupported operand types and arithmetic errors.
    pub fn binary(
        &mut self,
        op: crate::target::BinOperator,
        left: &Value,
        right: &Value,
    ) -> RtResult<Value> {
        if let Value::Instance(_) = left {
            let method = ops::binary_dunder(op);
            if self.has_method(left, method) {
                return self.call_method(left, method, Args::new(vec![right.clone()]));
            }
        }
        ops::binary_values(op, left, right)
    }

    /// Evaluates one comparison.
    ///
    /// # Errors
    /// Fails when the operands cannot be ordered.
    pub fn compare(
        &mut self,
        op: crate::target::CmpOperator,
        left: &Value,
        right: &Value,
    ) -> RtResult<bool> {
        if let Value::Instance(_) = left {
            let method = ops::compare_dunder(op);
            if self.has_method(left, method) {
                let result = self.call_method(left, method, Args::new(vec![right.clone()]))?;
                return self.truthy(&result);
            }
        }
        ops::compare_op(op, left, right)
    }

    /// Truthiness, honoring `__bool__` and `__len__`.
    ///
    /// # Errors
    /// Propagates exceptions from user methods.
    pub fn truthy(&mut self, value: &Value) -> RtResult<bool> {
        if let Value::Instance(_) = value {
            for method in ["__bool__", "__len__"] {
                if self.has_method(value, method) {
                    let result = self.call_method(value, method, Args::default())?;
                    return Ok(ops::is_truthy(&result));
                }
            }
        }
        Ok(ops::is_truthy(value))
    }

    /// Calls a callable value.
    ///
    /// # Errors
    /// Fails for non-callable values and propagates exceptions from the callee.
    pub fn call(&mut self, callee: &Value, args: Args) -> RtResult<Value> {
        match callee {
            Value::Function(closure) => {
                if closure.is_async {
                    return Ok(Value::Coroutine(Rc::new(RefCell::new(Coroutine::Pending {
                        closure: Rc::clone(closure),
                        args,
                    }))));
                }
                self.call_closure(closure, args)
            }
            Value::Native(native) => {
                let native = Rc::clone(native);
                (native.func)(self, args)
            }
            Value::BoundMethod(bound) => {
                let mut args = args;
                args.positional.insert(0, bound.receiver.clone());
                self.call(&bound.method, args)
            }
            Value::Class(class) => self.instantiate(class, args),
            Value::Type(ty) => builtins::convert(self, *ty, args),
            Value::Instance(_) if self.has_method(callee, "__call__") => {
                self.call_method(callee, "__call__", args)
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Args) -> RtResult<Value> {
        if self.depth >= self.max_depth {
            return Err(RuntimeError::new(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        let scope = Scope::child(&closure.scope, ScopeKind::Function);
        bind_params(&closure.name, &closure.params, args, &scope)?;

        self.depth += 1;
        if closure.is_generator {
            self.yields.push(Vec::new());
        }
        let result = match &closure.body {
            FunctionBody::Block(def) => self.exec_block(&def.body, &scope).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::None,
            }),
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        };
        self.depth -= 1;
        if closure.is_generator {
            let items = self.yields.pop().unwrap_or_default();
            result?;
            return Ok(Value::Iterator(Rc::new(RefCell::new(IterState::from_items(items)))));
        }
        result
    }

    /// Runs a coroutine to completion; other values pass through.
    ///
    /// # Errors
    /// Propagates exceptions from the coroutine body.
    pub fn await_value(&mut self, value: Value) -> RtResult<Value> {
        let Value::Coroutine(coroutine) = &value else {
            return Ok(value);
        };
        let pending = match &*coroutine.borrow() {
            Coroutine::Done(result) => return Ok(result.clone()),
            Coroutine::Pending { closure, args } => (Rc::clone(closure), args.clone()),
        };
        let result = self.call_closure(&pending.0, pending.1)?;
        *coroutine.borrow_mut() = Coroutine::Done(result.clone());
        Ok(result)
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: Args) -> RtResult<Value> {
        let mut attrs = HashMap::new();
        if class.exception_kind().is_some() {
            attrs.insert("args".to_string(), Value::tuple(args.positional.clone()));
        }
        let instance = Value::Instance(Rc::new(Instance {
            class: Rc::clone(class),
            attrs: RefCell::new(attrs),
        }));
        if let Some(init) = class.lookup("__init__") {
            let mut init_args = args;
            init_args.positional.insert(0, instance.clone());
            self.call(&init, init_args)?;
        }
        Ok(instance)
    }

    /// Returns true if `value` has a callable attribute `name` on its class.
    #[must_use]
    pub fn has_method(&self, value: &Value, name: &str) -> bool {
        match value {
            Value::Instance(inst) => inst.class.lookup(name).is_some(),
            _ => false,
        }
    }

    /// Calls method `name` of `receiver`.
    ///
    /// # Errors
    /// Fails when the method is missing or raises.
    pub fn call_method(&mut self, receiver: &Value, name: &str, args: Args) -> RtResult<Value> {
        let method = self.get_attr(receiver, name)?;
        self.call(&method, args)
    }

    /// Reads an attribute.
    ///
    /// # Errors
    /// Raises `AttributeError` for unknown attributes.
    pub fn get_attr(&mut self, value: &Value, attr: &str) -> RtResult<Value> {
        let missing = || RuntimeError::attribute_error(&value.type_name(), attr);
        match value {
            Value::Instance(inst) => {
                if let Some(v) = inst.attrs.borrow().get(attr) {
                    return Ok(v.clone());
                }
                if attr == "__class__" {
                    return Ok(Value::Class(Rc::clone(&inst.class)));
                }
                let found = inst.class.lookup(attr).ok_or_else(missing)?;
                Ok(match found {
                    Value::Function(_) | Value::Native(_) => {
                        Value::BoundMethod(Rc::new(BoundMethod {
                            receiver: value.clone(),
                            method: found,
                        }))
                    }
                    other => other,
                })
            }
            Value::Class(class) => match attr {
                "__name__" => Ok(Value::str(&class.name)),
                _ => class.lookup(attr).ok_or_else(missing),
            },
            Value::Module(module) => match attr {
                "__name__" => Ok(Value::str(&module.name)),
                _ => module.scope.get_local(attr).ok_or_else(missing),
            },
            Value::Node(node) => builtins::nodes::node_attr(node, attr).ok_or_else(missing),
            _ => builtins::methods::lookup(value, attr).ok_or_else(missing),
        }
    }

    /// Writes an attribute.
    ///
    /// # Errors
    /// Raises `AttributeError` for values without writable attributes.
    pub fn set_attr(&mut self, target: &Value, attr: &str, value: Value) -> RtResult<()> {
        match target {
            Value::Instance(inst) => {
                inst.attrs.borrow_mut().insert(attr.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                class.attrs.borrow_mut().insert(attr.to_string(), value);
                Ok(())
            }
            Value::Module(module) => {
                module.scope.set_local(attr, value);
                Ok(())
            }
            other => Err(RuntimeError::attribute_error(&other.type_name(), attr)),
        }
    }

    /// Indexes a value.
    ///
    /// # Errors
    /// Raises `IndexError`, `KeyError` or `TypeError`.
    pub fn subscript(&mut self, value: &Value, index: &Value) -> RtResult<Value> {
        match (value, index) {
            (Value::List(items), Value::Slice(slice)) => {
                let items = items.borrow();
                Ok(Value::list(slice_items(&items, slice)?))
            }
            (Value::Tuple(items), Value::Slice(slice)) => Ok(Value::tuple(slice_items(items, slice)?)),
            (Value::Str(s), Value::Slice(slice)) => {
                let chars: Vec<Value> = s.chars().map(|c| Value::str(c.to_string())).collect();
                let picked = slice_items(&chars, slice)?;
                Ok(Value::str(picked.iter().filter_map(Value::as_str).collect::<String>()))
            }
            (Value::List(items), _) => {
                let items = items.borrow();
                let i = sequence_index(index, items.len())?;
                Ok(items[i].clone())
            }
            (Value::Tuple(items), _) => {
                let i = sequence_index(index, items.len())?;
                Ok(items[i].clone())
            }
            (Value::Str(s), _) => {
                let chars: Vec<char> = s.chars().collect();
                let i = sequence_index(index, chars.len())?;
                Ok(Value::str(chars[i].to_string()))
            }
            (Value::Range(range), _) => {
                let i = sequence_index(index, range.len())?;
                Ok(Value::Int(range.start + range.step * i as i64))
            }
            (Value::Dict(dict), _) => dict.borrow().get(index)?.ok_or_else(|| {
                RuntimeError::new(ExceptionKind::KeyError, index.repr())
            }),
            (Value::Node(node), _) => {
                let seq = node.as_sequence().ok_or_else(|| not_subscriptable(value))?;
                let nodes: Vec<Value> = seq.nodes.iter().cloned().map(Value::node).collect();
                match index {
                    Value::Slice(slice) => Ok(Value::list(slice_items(&nodes, slice)?)),
                    _ => {
                        let i = sequence_index(index, nodes.len())?;
                        Ok(nodes[i].clone())
                    }
                }
            }
            (Value::Instance(_), _) if self.has_method(value, "__getitem__") => {
                self.call_method(value, "__getitem__", Args::new(vec![index.clone()]))
            }
            _ => Err(not_subscriptable(value)),
        }
    }

    fn set_item(&mut self, target: &Value, index: Value, value: Value) -> RtResult<()> {
        match target {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let i = sequence_index(&index, items.len())?;
                items[i] = value;
                Ok(())
            }
            Value::Dict(dict) => dict.borrow_mut().insert(index, value),
            Value::Instance(_) if self.has_method(target, "__setitem__") => {
                self.call_method(target, "__setitem__", Args::new(vec![index, value]))?;
                Ok(())
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    fn del_item(&mut self, target: &Value, index: &Value) -> RtResult<()> {
        match target {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let i = sequence_index(index, items.len())?;
                items.remove(i);
                Ok(())
            }
            Value::Dict(dict) => match dict.borrow_mut().remove(index)? {
                Some(_) => Ok(()),
                None => Err(RuntimeError::new(ExceptionKind::KeyError, index.repr())),
            },
            other => Err(RuntimeError::type_error(format!(
                "'{}' object does not support item deletion",
                other.type_name()
            ))),
        }
    }

    /// Creates an iterator over an iterable value.
    ///
    /// # Errors
    /// Raises `TypeError` for values that are not iterable.
    pub fn make_iter(&mut self, value: &Value) -> RtResult<Rc<RefCell<IterState>>> {
        match value {
            Value::Iterator(state) => Ok(Rc::clone(state)),
            Value::Range(range) => Ok(Rc::new(RefCell::new(IterState::from_range(*range)))),
            Value::Instance(_) if self.has_method(value, "__iter__") => {
                let iterator = self.call_method(value, "__iter__", Args::default())?;
                match iterator {
                    Value::Iterator(state) => Ok(state),
                    Value::Instance(_) => Ok(Rc::new(RefCell::new(IterState::Object(iterator)))),
                    other => self.make_iter(&other),
                }
            }
            Value::Instance(_) if self.has_method(value, "__next__") => {
                Ok(Rc::new(RefCell::new(IterState::Object(value.clone()))))
            }
            _ => builtin_items(value)
                .map(|items| Rc::new(RefCell::new(IterState::from_items(items))))
                .ok_or_else(|| {
                    RuntimeError::type_error(format!("'{}' object is not iterable", value.type_name()))
                }),
        }
    }

    /// Advances an iterator; `None` when exhausted.
    ///
    /// # Errors
    /// Propagates exceptions other than `StopIteration` from `__next__`.
    pub fn next_value(&mut self, iterator: &Rc<RefCell<IterState>>) -> RtResult<Option<Value>> {
        let step = iterator.borrow_mut().advance();
        match step {
            Step::Yield(value) => Ok(Some(value)),
            Step::Done => Ok(None),
            Step::Delegate(object) => match self.call_method(&object, "__next__", Args::default()) {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.is_stop_iteration() => Ok(None),
                Err(err) => Err(err),
            },
        }
    }

    /// Collects every element of an iterable.
    ///
    /// # Errors
    /// Raises `TypeError` for values that are not iterable.
    pub fn iter_values(&mut self, value: &Value) -> RtResult<Vec<Value>> {
        if let Some(items) = builtin_items(value) {
            return Ok(items);
        }
        let iterator = self.make_iter(value)?;
        let mut items = Vec::new();
        while let Some(item) = self.next_value(&iterator)? {
            items.push(item);
        }
        Ok(items)
    }

    /// String conversion, honoring `__str__`.
    ///
    /// # Errors
    /// Propagates exceptions from `__str__`.
    pub fn str_of(&mut self, value: &Value) -> RtResult<String> {
        if self.has_method(value, "__str__") {
            let s = self.call_method(value, "__str__", Args::default())?;
            return Ok(s.to_string());
        }
        Ok(value.to_string())
    }

    /// Representation, honoring `__repr__`.
    ///
    /// # Errors
    /// Propagates exceptions from `__repr__`.
    pub fn repr_of(&mut self, value: &Value) -> RtResult<String> {
        if self.has_method(value, "__repr__") {
            let s = self.call_method(value, "__repr__", Args::default())?;
            return Ok(s.to_string());
        }
        Ok(value.repr())
    }

    /// Loads a module by dotted name, running it once.
    ///
    /// # Errors
    /// Raises `ImportError` when no resolver knows the name.
    pub fn import_module(&mut self, name: &str) -> RtResult<Rc<Module>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(Rc::clone(module));
        }
        if let Some(module) = builtins::modules::native_module(self, name) {
            self.modules.insert(name.to_string(), Rc::clone(&module));
            return Ok(module);
        }
        let resolver = self.resolver.clone().ok_or_else(|| {
            RuntimeError::new(ExceptionKind::ImportError, format!("no module named '{name}'"))
        })?;
        let unit = resolver
            .resolve(name)
            .map_err(|e| RuntimeError::new(ExceptionKind::ImportError, e.to_string()))?;
        let scope = self.module_scope();
        let module = Rc::new(Module {
            name: name.to_string(),
            scope: Rc::clone(&scope),
        });
        self.modules.insert(name.to_string(), Rc::clone(&module));
        if let Err(err) = self.run_program(&unit.program, &scope) {
            self.modules.remove(name);
            return Err(err);
        }
        Ok(module)
    }

    fn import_names(
        &mut self,
        module: &Rc<Module>,
        names: &[ImportAlias],
        scope: &Rc<Scope>,
    ) -> RtResult<()> {
        for alias in names {
            if alias.name == "*" {
                for name in module.scope.local_names() {
                    if !name.starts_with('_') {
                        if let Some(value) = module.scope.get_local(&name) {
                            scope.assign(&name, value);
                        }
                    }
                }
                continue;
            }
            let value = module.scope.get_local(&alias.name).ok_or_else(|| {
                RuntimeError::new(
                    ExceptionKind::ImportError,
                    format!("cannot import name '{}' from '{}'", alias.name, module.name),
                )
            })?;
            scope.assign(alias.alias.as_deref().unwrap_or(&alias.name), value);
        }
        Ok(())
    }
}

fn make_function(def: &Rc<FunctionDef>, scope: &Rc<Scope>) -> Value {
    Value::Function(Rc::new(Closure {
        name: def.name.clone(),
        params: def.params.clone(),
        body: FunctionBody::Block(Rc::clone(def)),
        is_async: def.is_async,
        is_generator: stmts_yield(&def.body),
        scope: Rc::clone(scope),
    }))
}

fn bind_params(name: &str, params: &[String], args: Args, scope: &Rc<Scope>) -> RtResult<()> {
    let Args {
        positional,
        keywords,
    } = args;
    let variadic = params.last().and_then(|p| p.strip_prefix('*'));
    let fixed = if variadic.is_some() { &params[..params.len() - 1] } else { params };
    if positional.len() > fixed.len() && variadic.is_none() {
        return Err(RuntimeError::type_error(format!(
            "{name}() takes {} positional arguments but {} were given",
            fixed.len(),
            positional.len()
        )));
    }
    let mut positional = positional.into_iter();
    for param in fixed {
        if let Some(value) = positional.next() {
            scope.set_local(param, value);
        }
    }
    if let Some(rest) = variadic {
        scope.set_local(rest, Value::tuple(positional.collect()));
    }
    for (key, value) in keywords {
        if !fixed.contains(&key) {
            return Err(RuntimeError::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
        scope.set_local(&key, value);
    }
    if let Some(missing) = fixed.iter().find(|p| scope.get_local(p).is_none()) {
        return Err(RuntimeError::type_error(format!(
            "{name}() missing required argument '{missing}'"
        )));
    }
    Ok(())
}

fn bind_dotted(scope: &Rc<Scope>, name: &str, module: Rc<Module>) {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() == 1 {
        scope.assign(name, Value::Module(module));
        return;
    }
    let mut holder = match scope.lookup(parts[0]) {
        Some(Value::Module(existing)) => existing,
        _ => {
            let package = Rc::new(Module {
                name: parts[0].to_string(),
                scope: Scope::new(ScopeKind::Module, None),
            });
            scope.assign(parts[0], Value::Module(Rc::clone(&package)));
            package
        }
    };
    for (i, part) in parts.iter().enumerate().skip(1) {
        if i == parts.len() - 1 {
            holder.scope.set_local(part, Value::Module(Rc::clone(&module)));
            break;
        }
        let next = match holder.scope.get_local(part) {
            Some(Value::Module(existing)) => existing,
            _ => {
                let package = Rc::new(Module {
                    name: parts[..=i].join("."),
                    scope: Scope::new(ScopeKind::Module, None),
                });
                holder.scope.set_local(part, Value::Module(Rc::clone(&package)));
                package
            }
        };
        holder = next;
    }
}

fn constant_value(constant: &Constant) -> RtResult<Value> {
    Ok(match constant {
        Constant::None => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(n) => Value::Int(*n),
        Constant::Float(f) => Value::Float(*f),
        Constant::Complex(re, im) => Value::Complex(*re, *im),
        Constant::Str(s) => Value::str(s),
        Constant::DateTime(dt) => Value::DateTime(*dt),
        Constant::Regex(pattern) => Value::Regex(Rc::new(
            regex::Regex::new(pattern).map_err(|e| RuntimeError::value_error(e.to_string()))?,
        )),
    })
}

/// Converts a literal into a runtime value.
///
/// # Errors
/// Fails for an invalid regular expression.
pub fn literal_to_value(literal: Literal) -> RtResult<Value> {
    constant_value(&match literal {
        Literal::Int(n) => Constant::Int(n),
        Literal::Float(f) => Constant::Float(f),
        Literal::Complex(re, im) => Constant::Complex(re, im),
        Literal::Str(s) => Constant::Str(s),
        Literal::DateTime(dt) => Constant::DateTime(dt),
        Literal::Regex(r) => Constant::Regex(r),
    })
}

fn not_subscriptable(value: &Value) -> RuntimeError {
    RuntimeError::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

fn sequence_index(index: &Value, len: usize) -> RtResult<usize> {
    let i = index.as_int().ok_or_else(|| {
        RuntimeError::type_error(format!("indices must be integers, not {}", index.type_name()))
    })?;
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::new(ExceptionKind::IndexError, "index out of range"));
    }
    Ok(resolved as usize)
}

fn slice_items(items: &[Value], slice: &SliceValue) -> RtResult<Vec<Value>> {
    let len = items.len() as i64;
    let bound = |v: &Value| -> RtResult<Option<i64>> {
        match v {
            Value::None => Ok(None),
            other => other.as_int().map(Some).ok_or_else(|| {
                RuntimeError::type_error("slice indices must be integers or null")
            }),
        }
    };
    let step = bound(&slice.step)?.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::value_error("slice step cannot be zero"));
    }
    let clamp = |i: i64, lo: i64, hi: i64| {
        let i = if i < 0 { i + len } else { i };
        i.clamp(lo, hi)
    };
    let mut out = Vec::new();
    if step > 0 {
        let start = bound(&slice.lower)?.map_or(0, |i| clamp(i, 0, len));
        let stop = bound(&slice.upper)?.map_or(len, |i| clamp(i, 0, len));
        let mut i = start;
        while i < stop {
            out.push(items[i as usize].clone());
            i += step;
        }
    } else {
        let start = bound(&slice.lower)?.map_or(len - 1, |i| clamp(i, -1, len - 1));
        let stop = bound(&slice.upper)?.map_or(-1, |i| clamp(i, -1, len - 1));
        let mut i = start;
        while i > stop {
            out.push(items[i as usize].clone());
            i += step;
        }
    }
    Ok(out)
}

fn stmts_yield(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_yields)
}

fn stmt_yields(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Return(Some(e)) => expr_yields(e),
        StmtKind::Assign { target, value } => expr_yields(target) || expr_yields(value),
        StmtKind::If { test, body, orelse } => {
            expr_yields(test) || stmts_yield(body) || stmts_yield(orelse)
        }
        StmtKind::While { test, body } => expr_yields(test) || stmts_yield(body),
        StmtKind::For { iter, body, .. } => expr_yields(iter) || stmts_yield(body),
        StmtKind::With { context, body, .. } => expr_yields(context) || stmts_yield(body),
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            stmts_yield(body)
                || handlers.iter().any(|h| stmts_yield(&h.body))
                || stmts_yield(orelse)
                || stmts_yield(finalbody)
        }
        _ => false,
    }
}

fn expr_yields(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield(_) | ExprKind::YieldFrom(_) => true,
        ExprKind::BinOp { left, right, .. } | ExprKind::BoolOp { left, right, .. } => {
            expr_yields(left) || expr_yields(right)
        }
        ExprKind::Not(e) | ExprKind::Await(e) | ExprKind::Attribute { value: e, .. } => {
            expr_yields(e)
        }
        ExprKind::Compare {
            left, comparators, ..
        } => expr_yields(left) || comparators.iter().any(expr_yields),
        ExprKind::Call { func, args, keywords } => {
            expr_yields(func)
                || args.iter().any(expr_yields)
                || keywords.iter().any(|k| expr_yields(&k.value))
        }
        ExprKind::IfExp { test, body, orelse } => {
            expr_yields(test) || expr_yields(body) || expr_yields(orelse)
        }
        ExprKind::Subscript { value, index } => expr_yields(value) || expr_yields(index),
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
            items.iter().any(expr_yields)
        }
        ExprKind::Dict(pairs) => pairs.iter().any(|(k, v)| expr_yields(k) || expr_yields(v)),
        _ => false,
    }
}
