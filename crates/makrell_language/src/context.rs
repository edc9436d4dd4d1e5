//! The compiler context.
//!
//! A [`Context`] owns everything one compilation mutates: the operator
//! precedence table, the meta symbol table, the gensym counter, the stack of
//! hoisted helper definitions, the diagnostics sink and the interpreter that
//! runs meta blocks. Every code generation function takes the context
//! explicitly; nothing is global.
//!
//! A context is also an evaluation session. [`Context::eval_source`] runs
//! compiled code in a runtime scope that persists across calls, which is
//! what the REPL and the data-notation reader build on.
//!
//! # Example
//!
//! ```
//! use makrell_language::{Context, interp::Value};
//!
//! let mut ctx = Context::new().unwrap();
//! let value = ctx.eval_source("{fun sq [x] x * x} {sq 7}").unwrap();
//! assert_eq!(value, Value::Int(49));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use makrell_foundation::{Error, ErrorKind, Result};

use crate::diagnostics::{Diagnostics, Severity, codes};
use crate::gensym::Gensym;
use crate::include::{FileLoader, SourceLoader, expand_includes_with};
use crate::interp::builtins::nodes::{gensym_native, operator_parse_native};
use crate::interp::{Interpreter, Scope, Value};
use crate::modules::ModuleResolver;
use crate::node::{Node, regular};
use crate::operator::{OperatorTable, Precedence, parse_operators};
use crate::prelude::PRELUDE_SOURCE;
use crate::target::{CompiledUnit, Expr, FunctionDef, Program, Stmt};
use crate::trace::{TraceEvent, Tracer, TracerConfig};
use crate::tree::parse_source;

/// Default limit on nested macro expansions.
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 100;

// =============================================================================
// ContextConfig
// =============================================================================

/// Configuration of a [`Context`].
#[derive(Clone, Debug)]
pub struct ContextConfig {
    load_prelude: bool,
    source_path: Option<PathBuf>,
    max_expansion_depth: usize,
    tracer: TracerConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            load_prelude: true,
            source_path: None,
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
            tracer: TracerConfig::default(),
        }
    }
}

impl ContextConfig {
    /// The default configuration: prelude loaded, no source path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips the bootstrap prelude.
    #[must_use]
    pub const fn without_prelude(mut self) -> Self {
        self.load_prelude = false;
        self
    }

    /// Sets the path of the unit being compiled; includes resolve against it.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Sets the limit on nested macro expansions.
    #[must_use]
    pub const fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    /// Sets the tracer configuration.
    #[must_use]
    pub fn with_tracer(mut self, tracer: TracerConfig) -> Self {
        self.tracer = tracer;
        self
    }

    /// Whether the prelude is loaded.
    #[must_use]
    pub const fn loads_prelude(&self) -> bool {
        self.load_prelude
    }

    /// Path of the unit being compiled.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Limit on nested macro expansions.
    #[must_use]
    pub const fn max_expansion_depth(&self) -> usize {
        self.max_expansion_depth
    }
}

// =============================================================================
// Meta symbols
// =============================================================================

/// What a meta symbol name is bound to.
#[derive(Clone, Debug)]
pub(crate) enum MetaSymbol {
    /// A name bound by a meta block. The value lives in the meta scope;
    /// functions also keep their definition so references can embed it.
    Binding(Option<Rc<FunctionDef>>),
    /// A custom operator, compiled to a `$left`/`$right` lambda.
    Operator(Expr),
}

/// Saved compiler tables, see [`Context::checkpoint`].
#[derive(Clone, Debug)]
pub struct Checkpoint {
    operators: OperatorTable,
    symbols: im::HashMap<String, MetaSymbol>,
    diagnostics: usize,
    meta_sources: usize,
}

// =============================================================================
// Context
// =============================================================================

/// The state of one compilation unit or evaluation session.
pub struct Context {
    pub(crate) config: ContextConfig,
    pub(crate) interp: Interpreter,
    pub(crate) meta_scope: Rc<Scope>,
    runtime_scope: Rc<Scope>,
    pub(crate) gensym: Gensym,
    pub(crate) operators: Rc<RefCell<OperatorTable>>,
    pub(crate) symbols: im::HashMap<String, MetaSymbol>,
    pending: Vec<Vec<Stmt>>,
    pub(crate) meta_depth: usize,
    pub(crate) expansion_depth: usize,
    pub(crate) diagnostics: Diagnostics,
    tracer: Tracer,
    pub(crate) resolver: Option<Rc<dyn ModuleResolver>>,
    pub(crate) loader: Rc<dyn SourceLoader>,
    /// Files being compiled by `{include}` forms, outermost first.
    pub(crate) include_stack: Vec<PathBuf>,
    prelude: Vec<Stmt>,
    pub(crate) meta_sources: Vec<String>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("symbols", &self.symbols.keys().collect::<Vec<_>>())
            .field("meta_depth", &self.meta_depth)
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a context with the bootstrap prelude loaded.
    ///
    /// # Errors
    /// Fails only if the embedded prelude does not compile.
    pub fn new() -> Result<Self> {
        Self::with_config(ContextConfig::default())
    }

    /// Creates a context without the prelude.
    #[must_use]
    pub fn bare() -> Self {
        Self::empty(ContextConfig::default().without_prelude())
    }

    /// Creates a context from a configuration.
    ///
    /// # Errors
    /// Fails only if the embedded prelude does not compile.
    pub fn with_config(config: ContextConfig) -> Result<Self> {
        let load_prelude = config.load_prelude;
        let mut ctx = Self::empty(config);
        if load_prelude {
            ctx.load_prelude()?;
        }
        Ok(ctx)
    }

    fn empty(config: ContextConfig) -> Self {
        let interp = Interpreter::new();
        let gensym = Gensym::new();
        let operators = Rc::new(RefCell::new(OperatorTable::new()));
        let meta_scope = interp.module_scope();
        meta_scope.set_local("operator_parse", operator_parse_native(Rc::clone(&operators)));
        meta_scope.set_local("gensym", gensym_native(gensym.clone()));
        let runtime_scope = interp.module_scope();
        let tracer = Tracer::new(config.tracer.clone());
        Self {
            config,
            interp,
            meta_scope,
            runtime_scope,
            gensym,
            operators,
            symbols: im::HashMap::new(),
            pending: Vec::new(),
            meta_depth: 0,
            expansion_depth: 0,
            diagnostics: Diagnostics::new(),
            tracer,
            resolver: None,
            loader: Rc::new(FileLoader),
            include_stack: Vec::new(),
            prelude: Vec::new(),
            meta_sources: Vec::new(),
        }
    }

    fn load_prelude(&mut self) -> Result<()> {
        let nodes = self.parse(PRELUDE_SOURCE)?;
        let count = nodes.len();
        let stmts = self
            .compile_nodes(&nodes)
            .map_err(|e| Error::new(ErrorKind::Internal(format!("prelude: {e}"))))?;
        for scope in [Rc::clone(&self.meta_scope), Rc::clone(&self.runtime_scope)] {
            self.interp
                .run_statements(&stmts, &scope)
                .map_err(|e| Error::new(ErrorKind::Internal(format!("prelude: {e}"))))?;
        }
        self.prelude = stmts;
        self.meta_sources.clear();
        self.record(TraceEvent::PreludeLoaded { nodes: count });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Collaborators and accessors
    // -------------------------------------------------------------------------

    /// Sets the module resolver used by `import` and `importm`.
    pub fn set_resolver(&mut self, resolver: Rc<dyn ModuleResolver>) {
        self.interp.set_resolver(Rc::clone(&resolver));
        self.resolver = Some(resolver);
    }

    /// Sets the loader used for included files.
    pub fn set_loader(&mut self, loader: Rc<dyn SourceLoader>) {
        self.loader = loader;
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The interpreter running meta blocks and programs.
    #[must_use]
    pub const fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    /// Mutable access to the interpreter.
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// The scope programs run in.
    #[must_use]
    pub const fn runtime_scope(&self) -> &Rc<Scope> {
        &self.runtime_scope
    }

    /// The scope meta blocks run in.
    #[must_use]
    pub const fn meta_scope(&self) -> &Rc<Scope> {
        &self.meta_scope
    }

    /// Diagnostics recorded so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Takes the recorded diagnostics, leaving the sink empty.
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// The tracer.
    #[must_use]
    pub const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Precedence of `op` in the current table.
    #[must_use]
    pub fn precedence(&self, op: &str) -> Precedence {
        self.operators.borrow().lookup(op)
    }

    /// Returns true if `name` is bound as a macro, meta value or operator.
    #[must_use]
    pub fn is_meta_symbol(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Source text of the meta blocks run since the prelude.
    #[must_use]
    pub fn meta_sources(&self) -> &[String] {
        &self.meta_sources
    }

    /// A fresh identifier.
    #[must_use]
    pub fn gensym(&self) -> String {
        self.gensym.next()
    }

    /// Takes the lines printed by programs and meta blocks.
    pub fn take_output(&mut self) -> Vec<String> {
        self.interp.take_output()
    }

    // -------------------------------------------------------------------------
    // Checkpoints
    // -------------------------------------------------------------------------

    /// Saves the operator and meta symbol tables.
    ///
    /// Values bound by meta blocks are not part of the checkpoint.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            operators: self.operators.borrow().clone(),
            symbols: self.symbols.clone(),
            diagnostics: self.diagnostics.len(),
            meta_sources: self.meta_sources.len(),
        }
    }

    /// Restores tables saved by [`Context::checkpoint`].
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        *self.operators.borrow_mut() = checkpoint.operators;
        self.symbols = checkpoint.symbols;
        self.diagnostics.truncate(checkpoint.diagnostics);
        self.meta_sources.truncate(checkpoint.meta_sources);
        self.pending.clear();
        self.meta_depth = 0;
        self.expansion_depth = 0;
        self.include_stack.clear();
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Lexes, builds and include-expands source text into regular nodes.
    ///
    /// Brackets still open at the end of input are closed there and
    /// recorded as an incomplete-input diagnostic.
    ///
    /// # Errors
    /// Fails on lexical and mismatched bracket errors and on include
    /// failures.
    pub fn parse(&mut self, source: &str) -> Result<Vec<Node>> {
        let nodes = parse_source(source, &mut self.diagnostics)?;
        let loader = Rc::clone(&self.loader);
        let base = self.config.source_path.clone();
        let mut included = Vec::new();
        let nodes = expand_includes_with(
            &regular(&nodes),
            base.as_deref(),
            loader.as_ref(),
            &mut self.diagnostics,
            &mut |path, count| included.push((path.to_string(), count)),
        )?;
        for (path, nodes) in included {
            self.record(TraceEvent::IncludeExpanded { path, nodes });
        }
        Ok(nodes)
    }

    /// Compiles regular top-level nodes into statements.
    ///
    /// # Errors
    /// Returns the first fatal compilation error.
    pub fn compile_nodes(&mut self, nodes: &[Node]) -> Result<Vec<Stmt>> {
        self.compile_block(nodes)
    }

    /// Compiles source text into a unit.
    ///
    /// The program starts with the prelude's runtime definitions, so it
    /// runs in any fresh module scope.
    ///
    /// # Errors
    /// Fails on fatal errors and when error diagnostics were recorded.
    pub fn compile_source(&mut self, source: &str) -> Result<CompiledUnit> {
        let mark = self.diagnostics.len();
        let nodes = self.parse(source)?;
        self.check_complete(mark)?;
        let unit = self.compile_unit(&nodes)?;
        self.check_diagnostics(mark)?;
        Ok(unit)
    }

    /// Compiles source text like [`Context::compile_source`], but error
    /// diagnostics do not fail the compilation. They stay in
    /// [`Context::diagnostics`] for the caller to report, and the nodes
    /// around a problem are compiled as usual.
    ///
    /// # Errors
    /// Fails on fatal errors only.
    pub fn compile_source_recovering(&mut self, source: &str) -> Result<CompiledUnit> {
        let nodes = self.parse(source)?;
        self.compile_unit(&nodes)
    }

    fn compile_unit(&mut self, nodes: &[Node]) -> Result<CompiledUnit> {
        let body = self.compile_nodes(nodes)?;
        let mut program = self.prelude.clone();
        program.extend(body);
        Ok(CompiledUnit {
            program: Program { body: program },
            meta_sources: self.meta_sources.clone(),
        })
    }

    /// Compiles and runs source text in the runtime scope.
    ///
    /// Returns the value of the final expression statement, or `null`.
    ///
    /// # Errors
    /// Fails on compilation errors and on exceptions escaping the program.
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let mark = self.diagnostics.len();
        let nodes = self.parse(source)?;
        self.check_complete(mark)?;
        let body = self.compile_checked(&nodes, mark)?;
        self.run(&body)
    }

    /// Compiles and runs nodes in the runtime scope.
    ///
    /// # Errors
    /// Fails on compilation errors and on exceptions escaping the program.
    pub fn eval_nodes(&mut self, nodes: &[Node]) -> Result<Value> {
        let mark = self.diagnostics.len();
        let body = self.compile_checked(&regular(nodes), mark)?;
        self.run(&body)
    }

    /// Compiles source text for the runtime scope without running it.
    ///
    /// Unlike [`Context::compile_source`] the result does not repeat the
    /// prelude, which the runtime scope already holds.
    ///
    /// # Errors
    /// Fails on fatal errors and when error diagnostics were recorded.
    pub fn compile_statements(&mut self, source: &str) -> Result<Vec<Stmt>> {
        let mark = self.diagnostics.len();
        let nodes = self.parse(source)?;
        self.check_complete(mark)?;
        self.compile_checked(&nodes, mark)
    }

    /// Runs statements in the runtime scope.
    ///
    /// # Errors
    /// Returns the exception that escaped.
    pub fn run(&mut self, stmts: &[Stmt]) -> Result<Value> {
        let scope = Rc::clone(&self.runtime_scope);
        Ok(self.interp.run_statements(stmts, &scope)?)
    }

    fn compile_checked(&mut self, nodes: &[Node], mark: usize) -> Result<Vec<Stmt>> {
        let body = self.compile_nodes(nodes)?;
        self.check_diagnostics(mark)?;
        Ok(body)
    }

    /// Fails as incomplete input when brackets were left open in text
    /// parsed after `mark`, so that interactive callers can ask for more
    /// lines before anything is compiled or run.
    fn check_complete(&self, mark: usize) -> Result<()> {
        let recorded = &self.diagnostics.items()[mark..];
        let Some(open) = recorded.iter().find(|d| d.code == codes::INCOMPLETE_INPUT) else {
            return Ok(());
        };
        let err = Error::new(ErrorKind::IncompleteInput(open.message.clone()));
        Err(match open.span {
            Some(span) => err.at(span),
            None => err,
        })
    }

    /// Fails when error diagnostics were recorded after `mark`.
    fn check_diagnostics(&self, mark: usize) -> Result<()> {
        let errors: Vec<String> = self.diagnostics.items()[mark..]
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(ToString::to_string)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Diagnostics(errors.join("; "))))
        }
    }

    // -------------------------------------------------------------------------
    // Shared helpers for the code generator and meta engine
    // -------------------------------------------------------------------------

    pub(crate) fn record(&mut self, event: TraceEvent) {
        self.tracer.record(self.meta_depth, event);
    }

    /// Records an error diagnostic at `span`.
    pub(crate) fn report(&mut self, message: impl Into<String>, span: makrell_foundation::Span) {
        let message = message.into();
        self.record(TraceEvent::DiagnosticRecorded {
            message: message.clone(),
        });
        self.diagnostics.error(codes::OTHER, message, Some(span));
    }

    /// Operator-parses regular nodes with the current table.
    pub(crate) fn parse_ops(&self, nodes: &[Node]) -> Result<Vec<Node>> {
        let table = self.operators.borrow();
        parse_operators(nodes, |op| table.lookup(op))
    }

    pub(crate) fn push_pending(&mut self) {
        self.pending.push(Vec::new());
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Stmt> {
        self.pending.last_mut().map(std::mem::take).unwrap_or_default()
    }

    pub(crate) fn pop_pending(&mut self) -> Vec<Stmt> {
        self.pending.pop().unwrap_or_default()
    }

    /// Adds a helper definition to be emitted before the current statement.
    pub(crate) fn hoist(&mut self, stmt: Stmt) {
        match self.pending.last_mut() {
            Some(top) => top.push(stmt),
            None => self.pending.push(vec![stmt]),
        }
    }

    pub(crate) const fn in_meta(&self) -> bool {
        self.meta_depth > 0
    }
}
