//! Lexer, bracket trees, operator parser, meta engine, code generator and
//! interpreter for Makrell.
//!
//! Source goes through these stages:
//! - [`lexer`] - tokens, trivia included
//! - [`tree`] - bracket trees of [`Node`]s, with recoverable bracket errors
//!   reported as [`Diagnostics`]
//! - [`operator`] - precedence parsing against a mutable [`OperatorTable`]
//! - [`Context`] - meta blocks, macros, operator definitions and special
//!   forms, producing the statement tree in [`target`]
//! - [`interp`] - a tree-walking interpreter running that tree
//!
//! ```ignore
//! let mut ctx = makrell_language::Context::new()?;
//! let value = ctx.eval_source("{fun sq [x] x * x} {sq 7}")?;
//! assert_eq!(value.to_string(), "49");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod codegen;
pub mod context;
pub mod diagnostics;
pub mod gensym;
pub mod include;
pub mod interp;
pub mod lexer;
pub mod literal;
mod meta;
pub mod modules;
pub mod node;
pub mod operator;
pub mod prelude;
pub mod pretty;
pub mod quote;
pub mod target;
pub mod token;
pub mod trace;
pub mod tree;


pub use codegen::Code;
pub use context::{Checkpoint, Context, ContextConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use gensym::Gensym;
pub use include::{FileLoader, MemoryLoader, SourceLoader};
pub use interp::{Interpreter, RuntimeError, Value};
pub use lexer::tokenize;
pub use modules::{FileResolver, MemoryResolver, ModuleResolver};
pub use node::{Node, NodeKind, Sequence, SequenceKind};
pub use operator::{Associativity, OperatorTable, Precedence};
pub use pretty::pretty_print;
pub use target::{CompiledUnit, Program};
pub use trace::{Tracer, TracerConfig};
pub use tree::parse_source;
