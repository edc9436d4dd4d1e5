//! Textual inclusion.
//!
//! `{$include "path"}` at the top level of a unit is replaced by the nodes
//! of the named file, read relative to the including file. Included files
//! are expanded recursively. The pass runs over an already built tree and
//! is applied by callers that want it; the code generator itself only
//! knows the `{include "path"}` special form, which compiles a file in
//! place.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use makrell_foundation::{Error, ErrorKind, Result};

use crate::diagnostics::Diagnostics;
use crate::literal::{Literal, literal_value};
use crate::node::{Node, regular};
use crate::tree::parse_source;

/// Head identifier of an include node.
pub const INCLUDE_MARKER: &str = "$include";

/// Supplies the text of included files.
pub trait SourceLoader {
    /// Reads the file at `path`.
    ///
    /// # Errors
    /// Fails when the file cannot be read.
    fn load(&self, path: &Path) -> Result<String>;
}

/// Reads included files from the filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileLoader;

impl SourceLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorKind::Include {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })
    }
}

/// Serves included files from memory.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: RefCell<HashMap<PathBuf, String>>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    pub fn add(&self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), source.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<String> {
        self.files.borrow().get(path).cloned().ok_or_else(|| {
            Error::new(ErrorKind::Include {
                path: path.display().to_string(),
                message: "no such file".to_string(),
            })
        })
    }
}

/// Path of an included file, relative to the directory of `base`.
#[must_use]
pub fn include_path(base: Option<&Path>, relative: &str) -> PathBuf {
    match base.and_then(Path::parent) {
        Some(dir) => dir.join(relative),
        None => PathBuf::from(relative),
    }
}

/// The path string of an include-shaped node headed by `head`.
///
/// # Errors
/// Fails when the second child is not a plain string literal.
pub(crate) fn include_target(node: &Node, head: &str) -> Result<Option<String>> {
    let Some(seq) = node.as_sequence_of(crate::node::SequenceKind::Curly) else {
        return Ok(None);
    };
    let children = seq.regular();
    if !children.first().is_some_and(|n| n.is_identifier(head)) {
        return Ok(None);
    }
    match children.get(1).map(literal_value) {
        Some(Ok(Literal::Str(path))) if children.len() == 2 => Ok(Some(path)),
        _ => Err(Error::arity(head, children.len().saturating_sub(1)).at(node.span)),
    }
}

/// Replaces every top-level `{$include "path"}` node with the included nodes.
///
/// `base` is the path of the file `nodes` came from.
///
/// # Errors
/// Fails when a file cannot be loaded or parsed, and on cyclic includes.
pub fn expand_includes(
    nodes: &[Node],
    base: Option<&Path>,
    loader: &dyn SourceLoader,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Node>> {
    let mut stack = Vec::new();
    expand(nodes, base, loader, diagnostics, &mut stack, &mut |_, _| {})
}

/// Like [`expand_includes`], reporting each include to `on_include`.
pub(crate) fn expand_includes_with(
    nodes: &[Node],
    base: Option<&Path>,
    loader: &dyn SourceLoader,
    diagnostics: &mut Diagnostics,
    on_include: &mut dyn FnMut(&str, usize),
) -> Result<Vec<Node>> {
    let mut stack = Vec::new();
    expand(nodes, base, loader, diagnostics, &mut stack, on_include)
}

/// Fails when `path` is already being included.
pub(crate) fn check_cycle(stack: &[PathBuf], path: &Path, relative: &str) -> Result<()> {
    if stack.iter().any(|open| open == path) {
        return Err(Error::new(ErrorKind::Include {
            path: relative.to_string(),
            message: "cyclic include".to_string(),
        }));
    }
    Ok(())
}

fn expand(
    nodes: &[Node],
    base: Option<&Path>,
    loader: &dyn SourceLoader,
    diagnostics: &mut Diagnostics,
    stack: &mut Vec<PathBuf>,
    on_include: &mut dyn FnMut(&str, usize),
) -> Result<Vec<Node>> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Some(relative) = include_target(node, INCLUDE_MARKER)? else {
            out.push(node.clone());
            continue;
        };
        let path = include_path(base, &relative);
        check_cycle(stack, &path, &relative).map_err(|e| e.at(node.span))?;
        let source = loader.load(&path).map_err(|e| e.at(node.span))?;
        let parsed = parse_source(&source, diagnostics)?;
        stack.push(path.clone());
        let included = expand(&regular(&parsed), Some(&path), loader, diagnostics, stack, on_include);
        stack.pop();
        let included = included?;
        on_include(&relative, included.len());
        out.extend(included);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Node> {
        let mut diagnostics = Diagnostics::new();
        regular(&parse_source(source, &mut diagnostics).expect("parses"))
    }

    #[test]
    fn splices_included_nodes() {
        let loader = MemoryLoader::new();
        loader.add("lib/defs.mr", "a = 1 b = 2");
        let nodes = parse("x {$include \"defs.mr\"} y");
        let mut diagnostics = Diagnostics::new();
        let expanded =
            expand_includes(&nodes, Some(Path::new("lib/main.mr")), &loader, &mut diagnostics)
                .expect("expands");
        let text: Vec<String> = expanded.iter().map(ToString::to_string).collect();
        assert_eq!(text, ["x", "a", "=", "1", "b", "=", "2", "y"]);
    }

    #[test]
    fn nested_includes_resolve_relative_to_the_includer() {
        let loader = MemoryLoader::new();
        loader.add("one.mr", "{$include \"sub/two.mr\"}");
        loader.add("sub/two.mr", "{$include \"three.mr\"}");
        loader.add("sub/three.mr", "3");
        let nodes = parse("{$include \"one.mr\"}");
        let mut diagnostics = Diagnostics::new();
        let expanded = expand_includes(&nodes, None, &loader, &mut diagnostics).expect("expands");
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].to_string(), "3");
    }

    #[test]
    fn cyclic_include_fails() {
        let loader = MemoryLoader::new();
        loader.add("a.mr", "{$include \"a.mr\"}");
        let nodes = parse("{$include \"a.mr\"}");
        let mut diagnostics = Diagnostics::new();
        let err = expand_includes(&nodes, None, &loader, &mut diagnostics).expect_err("cycle");
        assert!(matches!(err.kind, ErrorKind::Include { ref message, .. } if message == "cyclic include"));
    }

    #[test]
    fn missing_file_fails() {
        let loader = MemoryLoader::new();
        let nodes = parse("{$include \"gone.mr\"}");
        let mut diagnostics = Diagnostics::new();
        assert!(expand_includes(&nodes, None, &loader, &mut diagnostics).is_err());
    }
}
