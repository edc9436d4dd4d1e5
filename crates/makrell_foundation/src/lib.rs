//! Core types for Makrell.
//!
//! This crate provides:
//! - [`Span`] - Source positions carried by every syntax node
//! - [`Error`] - Rich error types with categorized kinds and spans

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod span;

pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use span::Span;
