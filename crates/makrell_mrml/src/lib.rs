//! MRML, the Makrell markup notation.
//!
//! An MRML document is one curly form read as an element tree:
//!
//! ```text
//! {html
//!     {body [class="wide"]
//!         {h1 Hello} {p Today is {$ weekday}.}}}
//! ```
//!
//! The head of a curly form names the element. A square bracket right
//! after it holds `name=value` attributes. Everything else is content:
//! nested curly forms are child elements, strings contribute their text,
//! other nodes and the whitespace between them contribute their source
//! text, and comments are dropped. With [`Reader::with_exec`], `{$ expr}`
//! in content or as an attribute value is evaluated as Makrell code and
//! replaced by the text of its value.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod element;
mod reader;

pub use element::{Content, Element};
pub use reader::{EXEC_MARKER, Reader};

use std::path::Path;

use makrell_foundation::Result;

/// Reads an MRML document without evaluating `{$ ...}` forms.
///
/// # Errors
/// Fails on bracket errors, a document that is not exactly one curly form,
/// element names that are not identifiers or strings, malformed attributes
/// and failing `{$ ...}` code.
pub fn parse_str(text: &str) -> Result<Element> {
    Reader::new().parse_str(text)
}

/// Reads an MRML file.
///
/// # Errors
/// Fails if the file cannot be read, and as [`parse_str`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<Element> {
    Reader::new().parse_file(path)
}

/// Reads an MRML document and renders it as XML.
///
/// # Errors
/// As [`parse_str`]; `{$ ...}` forms are evaluated when `allow_exec` is set.
pub fn parse_to_xml(text: &str, allow_exec: bool) -> Result<String> {
    let mut reader = if allow_exec { Reader::with_exec() } else { Reader::new() };
    Ok(reader.parse_str(text)?.to_xml())
}
