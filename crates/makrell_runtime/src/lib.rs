//! REPL, CLI and compiled-unit cache for Makrell.
//!
//! This crate provides:
//! - [`Session`] - one compiler context plus module resolution, shared by
//!   the CLI and the REPL
//! - [`Repl`] - interactive read-eval-print loop on `rustyline`
//! - [`CachingResolver`] - module resolver storing compiled units as
//!   `MessagePack` next to their sources

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod editor;
pub mod highlight;
pub mod repl;
pub mod session;

pub use cache::{CACHE_EXTENSION, CachingResolver};
pub use repl::Repl;
pub use session::{Evaluation, Session, SessionConfig};
