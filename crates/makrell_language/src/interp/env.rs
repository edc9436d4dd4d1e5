//! Lexical scopes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::value::Value;

/// What kind of block a scope belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// Built-in names.
    Builtins,
    /// A module's top level.
    Module,
    /// A function body.
    Function,
    /// A class body.
    Class,
}

/// A chain of variable bindings.
///
/// Class scopes are visible only to the statements directly in the class
/// body, never to functions nested inside it.
#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
    globals: RefCell<HashSet<String>>,
    nonlocals: RefCell<HashSet<String>>,
}

impl Scope {
    /// Creates a scope.
    #[must_use]
    pub fn new(kind: ScopeKind, parent: Option<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self {
            kind,
            vars: RefCell::new(HashMap::new()),
            parent,
            globals: RefCell::new(HashSet::new()),
            nonlocals: RefCell::new(HashSet::new()),
        })
    }

    /// Creates a child scope of `parent`.
    #[must_use]
    pub fn child(parent: &Rc<Self>, kind: ScopeKind) -> Rc<Self> {
        Self::new(kind, Some(Rc::clone(parent)))
    }

    /// Scope kind.
    #[must_use]
    pub const fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Enclosing scope.
    #[must_use]
    pub const fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// Resolves a name, starting here.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(name) {
            return Some(v.clone());
        }
        let mut current = self.parent.as_ref();
        while let Some(scope) = current {
            if scope.kind != ScopeKind::Class {
                if let Some(v) = scope.vars.borrow().get(name) {
                    return Some(v.clone());
                }
            }
            current = scope.parent.as_ref();
        }
        None
    }

    /// The nearest module scope, or the outermost scope.
    #[must_use]
    pub fn module_scope(self: &Rc<Self>) -> Rc<Self> {
        let mut current = Rc::clone(self);
        loop {
            if current.kind == ScopeKind::Module {
                return current;
            }
            match &current.parent {
                Some(parent) if parent.kind != ScopeKind::Builtins => {
                    let next = Rc::clone(parent);
                    current = next;
                }
                _ => return current,
            }
        }
    }

    /// Binds a name, honoring `global` and `nonlocal` declarations.
    pub fn assign(self: &Rc<Self>, name: &str, value: Value) {
        if self.globals.borrow().contains(name) {
            self.module_scope().set_local(name, value);
            return;
        }
        if self.nonlocals.borrow().contains(name) {
            let mut current = self.parent.as_ref();
            while let Some(scope) = current {
                if scope.kind == ScopeKind::Function && scope.vars.borrow().contains_key(name) {
                    scope.set_local(name, value);
                    return;
                }
                current = scope.parent.as_ref();
            }
        }
        self.set_local(name, value);
    }

    /// Binds a name in this scope only.
    pub fn set_local(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// A binding of this scope only.
    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    /// Removes a binding from this scope; returns whether it existed.
    pub fn remove_local(&self, name: &str) -> bool {
        self.vars.borrow_mut().remove(name).is_some()
    }

    /// Names bound in this scope.
    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of this scope's bindings.
    #[must_use]
    pub fn locals(&self) -> HashMap<String, Value> {
        self.vars.borrow().clone()
    }

    /// Declares names as module-level for assignments in this scope.
    pub fn declare_global(&self, names: &[String]) {
        self.globals.borrow_mut().extend(names.iter().cloned());
    }

    /// Declares names as belonging to an enclosing function.
    pub fn declare_nonlocal(&self, names: &[String]) {
        self.nonlocals.borrow_mut().extend(names.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outwards() {
        let module = Scope::new(ScopeKind::Module, None);
        module.set_local("x", Value::Int(1));
        let func = Scope::child(&module, ScopeKind::Function);
        assert_eq!(func.lookup("x"), Some(Value::Int(1)));
        assert_eq!(func.lookup("y"), None);
    }

    #[test]
    fn class_scope_is_invisible_to_nested_functions() {
        let module = Scope::new(ScopeKind::Module, None);
        let class = Scope::child(&module, ScopeKind::Class);
        class.set_local("attr", Value::Int(1));
        assert!(class.lookup("attr").is_some());
        let method = Scope::child(&class, ScopeKind::Function);
        assert!(method.lookup("attr").is_none());
    }

    #[test]
    fn global_declaration_redirects_assignment() {
        let module = Scope::new(ScopeKind::Module, None);
        let func = Scope::child(&module, ScopeKind::Function);
        func.declare_global(&["counter".to_string()]);
        func.assign("counter", Value::Int(5));
        assert_eq!(module.get_local("counter"), Some(Value::Int(5)));
        assert!(func.get_local("counter").is_none());
    }

    #[test]
    fn nonlocal_declaration_updates_enclosing_function() {
        let module = Scope::new(ScopeKind::Module, None);
        let outer = Scope::child(&module, ScopeKind::Function);
        outer.set_local("n", Value::Int(0));
        let inner = Scope::child(&outer, ScopeKind::Function);
        inner.declare_nonlocal(&["n".to_string()]);
        inner.assign("n", Value::Int(1));
        assert_eq!(outer.get_local("n"), Some(Value::Int(1)));
    }
}
