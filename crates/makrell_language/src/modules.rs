//! Module resolution.
//!
//! A [`ModuleResolver`] maps a dotted module name to a compiled unit. The
//! interpreter asks it when running `import`, and the compiler asks it for
//! `importm`, which replays the unit's recorded meta blocks.
//!
//! Resolvers compile modules on demand with a fresh [`Context`] and memoize
//! the result, so every module is compiled at most once per resolver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use makrell_foundation::{Error, ErrorContext, ErrorKind, Result};

use crate::context::{Context, ContextConfig};
use crate::target::CompiledUnit;

/// Source file extension of Makrell modules.
pub const SOURCE_EXTENSION: &str = "mr";

/// File name of a package's own module.
pub const PACKAGE_MODULE: &str = "__init__";

/// Looks up compiled units by dotted module name.
pub trait ModuleResolver {
    /// Returns the compiled unit of module `name`.
    ///
    /// # Errors
    /// Fails with [`ErrorKind::ModuleNotFound`] for unknown names and with
    /// the compilation error of a module that does not compile.
    fn resolve(&self, name: &str) -> Result<Rc<CompiledUnit>>;
}

// =============================================================================
// Shared compile cache
// =============================================================================

/// Memoized units plus the stack of modules being compiled.
#[derive(Debug, Default)]
struct UnitCache {
    units: RefCell<HashMap<String, Rc<CompiledUnit>>>,
    loading: RefCell<Vec<String>>,
}

impl UnitCache {
    fn get(&self, name: &str) -> Option<Rc<CompiledUnit>> {
        self.units.borrow().get(name).cloned()
    }

    fn begin_loading(&self, name: &str) -> Result<()> {
        let mut loading = self.loading.borrow_mut();
        if let Some(pos) = loading.iter().position(|n| n == name) {
            let cycle = loading[pos..].join(" -> ");
            return Err(Error::new(ErrorKind::Internal(format!(
                "cyclic import detected: {cycle} -> {name}"
            ))));
        }
        loading.push(name.to_string());
        Ok(())
    }

    fn finish_loading(&self, name: &str) {
        let mut loading = self.loading.borrow_mut();
        if let Some(pos) = loading.iter().position(|n| n == name) {
            loading.remove(pos);
        }
    }

    /// Compiles `source` as module `name`, replaying imports through `resolver`.
    fn compile(
        &self,
        name: &str,
        source: &str,
        path: Option<&Path>,
        resolver: Option<Rc<dyn ModuleResolver>>,
    ) -> Result<Rc<CompiledUnit>> {
        if let Some(unit) = self.get(name) {
            return Ok(unit);
        }
        self.begin_loading(name)?;
        let result = compile_module(source, path, resolver);
        self.finish_loading(name);
        let unit = Rc::new(
            result.map_err(|e| e.with_context(ErrorContext::new().with_source(name)))?,
        );
        self.units
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&unit));
        Ok(unit)
    }
}

fn compile_module(
    source: &str,
    path: Option<&Path>,
    resolver: Option<Rc<dyn ModuleResolver>>,
) -> Result<CompiledUnit> {
    let mut config = ContextConfig::new();
    if let Some(path) = path {
        config = config.with_source_path(path);
    }
    let mut ctx = Context::with_config(config)?;
    if let Some(resolver) = resolver {
        ctx.set_resolver(resolver);
    }
    ctx.compile_source(source)
}

// =============================================================================
// FileResolver
// =============================================================================

/// Resolves modules from source files under a list of search roots.
///
/// `a.b` is looked up as `a/b.mr`, then as the package module
/// `a/b/__init__.mr`, in each root in order.
#[derive(Debug)]
pub struct FileResolver {
    roots: Vec<PathBuf>,
    cache: UnitCache,
    this: Weak<Self>,
}

impl FileResolver {
    /// Creates a resolver searching `roots` in order.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            roots,
            cache: UnitCache::default(),
            this: this.clone(),
        })
    }

    /// The search roots.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Finds the source file of module `name`.
    #[must_use]
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let relative: PathBuf = name.split('.').collect();
        self.roots.iter().find_map(|root| {
            let file = root.join(&relative).with_extension(SOURCE_EXTENSION);
            if file.is_file() {
                return Some(file);
            }
            let package = root
                .join(&relative)
                .join(PACKAGE_MODULE)
                .with_extension(SOURCE_EXTENSION);
            package.is_file().then_some(package)
        })
    }
}

impl ModuleResolver for FileResolver {
    fn resolve(&self, name: &str) -> Result<Rc<CompiledUnit>> {
        if let Some(unit) = self.cache.get(name) {
            return Ok(unit);
        }
        let path = self
            .locate(name)
            .ok_or_else(|| Error::new(ErrorKind::ModuleNotFound(name.to_string())))?;
        let source = std::fs::read_to_string(&path)?;
        let resolver = self.this.upgrade().map(|r| r as Rc<dyn ModuleResolver>);
        self.cache.compile(name, &source, Some(&path), resolver)
    }
}

// =============================================================================
// MemoryResolver
// =============================================================================

/// Resolves modules from in-memory sources.
#[derive(Debug)]
pub struct MemoryResolver {
    sources: RefCell<HashMap<String, String>>,
    cache: UnitCache,
    this: Weak<Self>,
}

impl MemoryResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            sources: RefCell::new(HashMap::new()),
            cache: UnitCache::default(),
            this: this.clone(),
        })
    }

    /// Adds or replaces the source of module `name`.
    ///
    /// Replacing a module drops its memoized unit.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        self.cache.units.borrow_mut().remove(&name);
        self.sources.borrow_mut().insert(name, source.into());
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Result<Rc<CompiledUnit>> {
        let source = self
            .sources
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::ModuleNotFound(name.to_string())))?;
        let resolver = self.this.upgrade().map(|r| r as Rc<dyn ModuleResolver>);
        self.cache.compile(name, &source, None, resolver)
    }
}
