//! Makrell - an extensible bracket-and-operator language
//!
//! This crate re-exports all layers of the Makrell system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: makrell_runtime     REPL, CLI, compiled-unit cache
//! Layer 2: makrell_mron        Data-notation reader built on the core
//!          makrell_mrml        Markup reader built on the core
//! Layer 1: makrell_language    Lexer, bracket trees, operator parser,
//!                              meta engine, code generator, interpreter
//! Layer 0: makrell_foundation  Core types (Span, Error)
//! ```

pub use makrell_foundation as foundation;
pub use makrell_language as language;
pub use makrell_mrml as mrml;
pub use makrell_mron as mron;
pub use makrell_runtime as runtime;
