//! Fresh identifier generation.
//!
//! Every hoisted helper function and every synthetic lambda parameter is
//! named with a gensym so it can never capture a user-visible name.
//!
//! # Example
//!
//! ```
//! use makrell_language::gensym::Gensym;
//!
//! let gensym = Gensym::new();
//! let a = gensym.next();
//! let b = gensym.clone().next();
//! assert_eq!(a, "__gensym_1__");
//! assert_eq!(b, "__gensym_2__");
//! ```

use std::cell::Cell;
use std::rc::Rc;

/// Monotonic identifier generator.
///
/// Clones share the counter, so a generator handed to the meta interpreter
/// keeps producing names unique within the owning compilation context.
#[derive(Clone, Debug, Default)]
pub struct Gensym {
    counter: Rc<Cell<u64>>,
}

impl Gensym {
    /// Creates a generator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh identifier of the form `__gensym_N__`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> String {
        let id = self.counter.get() + 1;
        self.counter.set(id);
        format!("__gensym_{id}__")
    }

    /// Number of identifiers generated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.counter.get()
    }

    /// Returns true if `name` has the shape of a generated identifier.
    #[must_use]
    pub fn is_gensym(name: &str) -> bool {
        name.strip_prefix("__gensym_")
            .and_then(|rest| rest.strip_suffix("__"))
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gensym_never_repeats() {
        let gensym = Gensym::new();
        let names: Vec<String> = (0..50).map(|_| gensym.next()).collect();
        let mut unique = names.clone();
        unique.dedup();
        assert_eq!(names.len(), unique.len());
        assert_eq!(gensym.count(), 50);
    }

    #[test]
    fn clones_share_the_counter() {
        let a = Gensym::new();
        let b = a.clone();
        assert_eq!(a.next(), "__gensym_1__");
        assert_eq!(b.next(), "__gensym_2__");
    }

    #[test]
    fn recognizes_generated_names() {
        assert!(Gensym::is_gensym("__gensym_12__"));
        assert!(!Gensym::is_gensym("__gensym___"));
        assert!(!Gensym::is_gensym("gensym"));
    }
}
