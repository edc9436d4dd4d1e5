//! Session state shared by the CLI and the REPL.
//!
//! A session owns one compiler [`Context`] for its whole lifetime, so
//! macros, operators and runtime bindings defined by one input are visible
//! to the next. An input that fails to compile leaves the operator and
//! macro tables as they were before it.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use makrell_foundation::Result;
use makrell_language::diagnostics::Diagnostic;
use makrell_language::target::{Program, Stmt};
use makrell_language::{
    Context, ContextConfig, FileResolver, ModuleResolver, TracerConfig, Value, pretty_print,
};

use crate::cache::CachingResolver;

/// Configuration of a [`Session`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Module search roots, searched in order.
    pub roots: Vec<PathBuf>,
    /// Whether compiled modules are cached next to their sources.
    pub use_cache: bool,
    /// Whether `print` writes to standard output as well as the buffer.
    pub echo: bool,
    /// Whether each evaluation also renders its generated program.
    pub emit: bool,
    /// Path of the entry file, for includes and the default search root.
    pub source_path: Option<PathBuf>,
    /// Tracer configuration of the compiler context.
    pub tracer: TracerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            roots: vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))],
            use_cache: true,
            echo: false,
            emit: false,
            source_path: None,
            tracer: TracerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Default configuration: the current directory as the only root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module search root after the existing ones.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Disables the compiled-unit cache.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Echoes `print` output to standard output.
    #[must_use]
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Renders the generated program of every evaluation.
    #[must_use]
    pub fn with_emit(mut self) -> Self {
        self.emit = true;
        self
    }

    /// Sets the entry file; its directory becomes a search root.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(dir) = path.parent() {
            let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
            if !self.roots.iter().any(|r| r == dir) {
                self.roots.push(dir.to_path_buf());
            }
        }
        self.source_path = Some(path);
        self
    }

    /// Sets the tracer configuration.
    #[must_use]
    pub fn with_tracer(mut self, tracer: TracerConfig) -> Self {
        self.tracer = tracer;
        self
    }
}

/// What one evaluation produced.
#[derive(Debug)]
pub struct Evaluation {
    /// Value of the final expression statement.
    pub value: Value,
    /// The generated program, when emitting is on.
    pub program: Option<String>,
    /// Non-fatal diagnostics recorded while compiling.
    pub diagnostics: Vec<Diagnostic>,
    /// Lines printed while running.
    pub output: Vec<String>,
}

/// A compiler context with module resolution.
pub struct Session {
    context: Context,
    resolver: Rc<dyn ModuleResolver>,
    emit: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("emit", &self.emit)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session, loading the prelude.
    ///
    /// # Errors
    /// Fails if the prelude does not load.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut context_config = ContextConfig::new().with_tracer(config.tracer.clone());
        if let Some(path) = &config.source_path {
            context_config = context_config.with_source_path(path);
        }
        let mut context = Context::with_config(context_config)?;
        context.interpreter_mut().set_echo(config.echo);

        let resolver: Rc<dyn ModuleResolver> = if config.use_cache {
            CachingResolver::new(config.roots)
        } else {
            FileResolver::new(config.roots)
        };
        context.set_resolver(Rc::clone(&resolver));

        Ok(Self {
            context,
            resolver,
            emit: config.emit,
        })
    }

    /// The compiler context.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the compiler context.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The module resolver.
    #[must_use]
    pub fn resolver(&self) -> &Rc<dyn ModuleResolver> {
        &self.resolver
    }

    /// Whether evaluations render their generated program.
    #[must_use]
    pub const fn emits(&self) -> bool {
        self.emit
    }

    /// Turns program rendering on or off.
    pub fn set_emit(&mut self, emit: bool) {
        self.emit = emit;
    }

    /// Compiles and runs `source`.
    ///
    /// # Errors
    /// Fails on compilation errors, restoring the tables saved before the
    /// input, and on exceptions escaping the program.
    pub fn eval(&mut self, source: &str) -> Result<Evaluation> {
        let body = self.compile(source)?;
        let program = self.emit.then(|| render(&body));
        let diagnostics = self.context.take_diagnostics().items().to_vec();
        let value = self.context.run(&body);
        let output = self.context.take_output();
        Ok(Evaluation {
            value: value?,
            program,
            diagnostics,
            output,
        })
    }

    /// Reads and evaluates a file.
    ///
    /// # Errors
    /// Fails if the file cannot be read, and as [`Session::eval`].
    pub fn eval_file(&mut self, path: &Path) -> Result<Evaluation> {
        let source = std::fs::read_to_string(path)?;
        self.eval(&source)
    }

    /// Renders the program `source` compiles to, without running it.
    ///
    /// Definitions made while compiling are rolled back afterwards.
    ///
    /// # Errors
    /// Fails on compilation errors.
    pub fn emit(&mut self, source: &str) -> Result<String> {
        let checkpoint = self.context.checkpoint();
        let body = self.compile(source)?;
        self.context.restore(checkpoint);
        Ok(render(&body))
    }

    fn compile(&mut self, source: &str) -> Result<Vec<Stmt>> {
        let checkpoint = self.context.checkpoint();
        match self.context.compile_statements(source) {
            Ok(body) => Ok(body),
            Err(err) => {
                self.context.restore(checkpoint);
                Err(err)
            }
        }
    }
}

fn render(body: &[Stmt]) -> String {
    pretty_print(&Program {
        body: body.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionConfig::new().without_cache()).expect("session")
    }

    #[test]
    fn bindings_persist_between_inputs() {
        let mut session = session();
        session.eval("x = 20").expect("runs");
        let result = session.eval("x + 22").expect("runs");
        assert_eq!(result.value, Value::Int(42));
    }

    #[test]
    fn macros_persist_between_inputs() {
        let mut session = session();
        session
            .eval("{def macro twice [ns] ns = {operator_parse {regular ns}} [ns@0 ns@0]}")
            .expect("defines");
        session.eval("n = 0").expect("runs");
        session.eval("{twice n = n + 1}").expect("expands");
        assert_eq!(session.eval("n").expect("runs").value, Value::Int(2));
    }

    #[test]
    fn failed_inputs_roll_back_tables() {
        let mut session = session();
        let err = session.eval("{def operator <+> 110 $left + $right} {if}");
        assert!(err.is_err());
        assert!(!session.context().is_meta_symbol("<+>"));
    }

    #[test]
    fn output_is_collected() {
        let mut session = session();
        let result = session.eval("{print \"hi\"} 1").expect("runs");
        assert_eq!(result.output, vec!["hi".to_string()]);
        assert_eq!(result.value, Value::Int(1));
    }

    #[test]
    fn emitting_renders_without_running() {
        let mut session = session();
        let program = session.emit("y = 2 * 3").expect("compiles");
        assert!(program.contains("y = (2 * 3)"));
        assert!(session.eval("y").is_err());
    }

    #[test]
    fn emit_flag_attaches_programs() {
        let mut session = session();
        session.set_emit(true);
        let result = session.eval("1 + 1").expect("runs");
        assert_eq!(result.program.as_deref().map(str::trim), Some("(1 + 1)"));
    }

    #[test]
    fn source_path_adds_its_directory() {
        let config = SessionConfig::new().with_source_path("lib/main.mr");
        assert!(config.roots.iter().any(|r| r == Path::new("lib")));
    }
}
