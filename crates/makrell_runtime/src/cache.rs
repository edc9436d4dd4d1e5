//! Compiled-unit cache using `MessagePack`.
//!
//! A module compiled from `pkg/mod.mr` is stored in `pkg/mod.mrc` together
//! with a fingerprint of its source and of the compiler that produced it.
//! Entries whose fingerprint does not match are ignored and rewritten.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use makrell_foundation::{Error, ErrorContext, ErrorKind, Result};
use makrell_language::target::CompiledUnit;
use makrell_language::{Context, ContextConfig, FileResolver, ModuleResolver};
use serde::{Deserialize, Serialize};

/// Extension of cache files.
pub const CACHE_EXTENSION: &str = "mrc";

const CACHE_FORMAT: u32 = 1;
const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    format: u32,
    compiler: String,
    source_hash: u64,
    unit: CompiledUnit,
}

fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// The cache file of a source file.
#[must_use]
pub fn cache_path(source: &Path) -> PathBuf {
    source.with_extension(CACHE_EXTENSION)
}

/// Serializes a unit compiled from `source`.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn to_bytes(unit: &CompiledUnit, source: &str) -> Result<Vec<u8>> {
    let entry = CacheEntry {
        format: CACHE_FORMAT,
        compiler: COMPILER_VERSION.to_string(),
        source_hash: source_hash(source),
        unit: unit.clone(),
    };
    rmp_serde::to_vec_named(&entry).map_err(|e| Error::new(ErrorKind::Cache(e.to_string())))
}

/// Deserializes a cached unit, or `None` if it was compiled from other
/// source text or by another compiler version.
///
/// # Errors
/// Returns an error if the bytes are not a cache entry.
pub fn from_bytes(bytes: &[u8], source: &str) -> Result<Option<CompiledUnit>> {
    let entry: CacheEntry =
        rmp_serde::from_slice(bytes).map_err(|e| Error::new(ErrorKind::Cache(e.to_string())))?;
    let fresh = entry.format == CACHE_FORMAT
        && entry.compiler == COMPILER_VERSION
        && entry.source_hash == source_hash(source);
    Ok(fresh.then_some(entry.unit))
}

/// Resolves modules from source files like [`FileResolver`], reading and
/// writing compiled units in cache files beside the sources.
#[derive(Debug)]
pub struct CachingResolver {
    files: Rc<FileResolver>,
    units: RefCell<HashMap<String, Rc<CompiledUnit>>>,
    loading: RefCell<Vec<String>>,
    this: Weak<Self>,
}

impl CachingResolver {
    /// Creates a resolver searching `roots` in order.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            files: FileResolver::new(roots),
            units: RefCell::new(HashMap::new()),
            loading: RefCell::new(Vec::new()),
            this: this.clone(),
        })
    }

    /// The search roots.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        self.files.roots()
    }

    fn read_cached(path: &Path, source: &str) -> Option<CompiledUnit> {
        let bytes = std::fs::read(cache_path(path)).ok()?;
        from_bytes(&bytes, source).ok().flatten()
    }

    fn compile(&self, name: &str, path: &Path, source: &str) -> Result<CompiledUnit> {
        {
            let mut loading = self.loading.borrow_mut();
            if let Some(pos) = loading.iter().position(|n| n == name) {
                let cycle = loading[pos..].join(" -> ");
                return Err(Error::new(ErrorKind::Internal(format!(
                    "cyclic import detected: {cycle} -> {name}"
                ))));
            }
            loading.push(name.to_string());
        }
        let result = Context::with_config(ContextConfig::new().with_source_path(path)).and_then(
            |mut ctx| {
                if let Some(this) = self.this.upgrade() {
                    ctx.set_resolver(this);
                }
                ctx.compile_source(source)
            },
        );
        self.loading.borrow_mut().retain(|n| n != name);
        result.map_err(|e| e.with_context(ErrorContext::new().with_source(name)))
    }
}

impl ModuleResolver for CachingResolver {
    fn resolve(&self, name: &str) -> Result<Rc<CompiledUnit>> {
        if let Some(unit) = self.units.borrow().get(name) {
            return Ok(Rc::clone(unit));
        }
        let path = self
            .files
            .locate(name)
            .ok_or_else(|| Error::new(ErrorKind::ModuleNotFound(name.to_string())))?;
        let source = std::fs::read_to_string(&path)?;
        let unit = match Self::read_cached(&path, &source) {
            Some(unit) => unit,
            None => {
                let unit = self.compile(name, &path, &source)?;
                if let Ok(bytes) = to_bytes(&unit, &source) {
                    let _ = std::fs::write(cache_path(&path), bytes);
                }
                unit
            }
        };
        let unit = Rc::new(unit);
        self.units
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&unit));
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("makrell-cache-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("creates scratch dir");
        dir
    }

    #[test]
    fn bytes_round_trip_for_same_source() {
        let mut ctx = Context::bare();
        let unit = ctx.compile_source("x = 1 + 2").expect("compiles");
        let bytes = to_bytes(&unit, "x = 1 + 2").expect("serializes");
        assert_eq!(from_bytes(&bytes, "x = 1 + 2").expect("reads"), Some(unit));
    }

    #[test]
    fn changed_source_is_stale() {
        let mut ctx = Context::bare();
        let unit = ctx.compile_source("x = 1").expect("compiles");
        let bytes = to_bytes(&unit, "x = 1").expect("serializes");
        assert_eq!(from_bytes(&bytes, "x = 2").expect("reads"), None);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            from_bytes(b"not msgpack at all", "").map_err(|e| e.kind),
            Err(ErrorKind::Cache(_))
        ));
    }

    #[test]
    fn resolving_writes_a_cache_file() {
        let dir = scratch_dir("write");
        std::fs::write(dir.join("util.mr"), "{fun triple [x] x * 3}").expect("writes");
        let resolver = CachingResolver::new(vec![dir.clone()]);
        let unit = resolver.resolve("util").expect("resolves");
        assert!(dir.join("util.mrc").is_file());

        let again = CachingResolver::new(vec![dir.clone()]);
        assert_eq!(*again.resolve("util").expect("resolves from cache"), *unit);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_modules_are_reported() {
        let dir = scratch_dir("missing");
        let resolver = CachingResolver::new(vec![dir.clone()]);
        let err = resolver.resolve("nope").expect_err("missing");
        assert!(matches!(err.kind, ErrorKind::ModuleNotFound(ref n) if n == "nope"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
