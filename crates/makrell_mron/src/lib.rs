//! MRON, the Makrell data notation.
//!
//! An MRON document is Makrell source read as data:
//!
//! ```text
//! name "makrell"
//! tags [lang macros]
//! owner {
//!     joined "2024-05-12"dt
//!     active true
//! }
//! ```
//!
//! The root holds zero nodes (null), one node (its value) or an even number
//! of nodes read as key/value pairs. Identifiers are bare strings except
//! `true`, `false` and `null`; strings and numbers use the literal suffix
//! table; square brackets are lists; curly and round brackets are mappings
//! of pairs. `{$ expr}` evaluates `expr` as Makrell code unless the reader
//! was built with [`Reader::data_only`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod reader;

pub use reader::{EXEC_MARKER, Reader};

use std::path::Path;

use makrell_foundation::Result;
use makrell_language::Value;

/// Reads an MRON document.
///
/// # Errors
/// Fails on bracket errors, invalid literals, an odd number (above one) of
/// root nodes, unhashable keys and failing `{$ ...}` code.
pub fn parse_str(text: &str) -> Result<Value> {
    Reader::new().parse_str(text)
}

/// Reads an MRON file.
///
/// # Errors
/// Fails if the file cannot be read, and as [`parse_str`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<Value> {
    Reader::new().parse_file(path)
}
