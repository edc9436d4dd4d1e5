//! Definitions every context starts with.
//!
//! The prelude is ordinary Makrell source, compiled and run into both the
//! meta and the runtime scope when a [`crate::Context`] is created with
//! [`crate::ContextConfig::loads_prelude`] set:
//!
//! - `unless` - macro running its body when the test is falsy
//! - `>>` - operator composing two functions left to right
//! - `match` - structural matching behind `~=` and `!~=`

/// Source of the bootstrap prelude.
pub const PRELUDE_SOURCE: &str = include_str!("prelude.mr");
