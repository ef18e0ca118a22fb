//! Namespaces and Vars.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::interpreter::value::Value;
use crate::span::Span;

pub const CORE_NS: &str = "core";
pub const USER_NS: &str = "user";

/// A namespace-interned, mutable value cell.
pub struct Var {
    pub ns: Rc<str>,
    pub name: Rc<str>,
    value: RefCell<Option<Value>>,
    is_macro: Cell<bool>,
}

impl Var {
    pub fn new(ns: Rc<str>, name: Rc<str>) -> Self {
        Self {
            ns,
            name,
            value: RefCell::new(None),
            is_macro: Cell::new(false),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.ns, self.name)
    }

    pub fn get(&self) -> Option<Value> {
        self.value.borrow().clone()
    }

    /// The bound value, or "Unbound var" for a declared-but-unset Var.
    pub fn deref(&self, span: Span) -> Result<Value, RuntimeError> {
        self.get()
            .ok_or_else(|| RuntimeError::unbound_var(self.qualified_name(), span))
    }

    pub fn set(&self, value: Value) {
        *self.value.borrow_mut() = Some(value);
    }

    pub fn is_bound(&self) -> bool {
        self.value.borrow().is_some()
    }

    pub fn is_macro(&self) -> bool {
        self.is_macro.get()
    }

    pub fn set_macro(&self, is_macro: bool) {
        self.is_macro.set(is_macro);
    }
}

/// A named table of Vars.
pub struct Namespace {
    pub name: Rc<str>,
    vars: IndexMap<Rc<str>, Rc<Var>, ahash::RandomState>,
}

impl Namespace {
    fn new(name: Rc<str>) -> Self {
        Self {
            name,
            vars: IndexMap::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Rc<Var>> {
        self.vars.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.vars.keys()
    }
}

/// Every namespace of one runtime plus the current one.
///
/// `core` holds the natives; every other namespace refers all of it.
pub struct GlobalEnv {
    namespaces: IndexMap<Rc<str>, Namespace, ahash::RandomState>,
    current: Rc<str>,
}

impl GlobalEnv {
    pub fn new() -> Self {
        let mut env = Self {
            namespaces: IndexMap::default(),
            current: Rc::from(USER_NS),
        };
        env.ensure(CORE_NS);
        env.ensure(USER_NS);
        env
    }

    fn ensure(&mut self, name: &str) -> &mut Namespace {
        let key: Rc<str> = Rc::from(name);
        self.namespaces
            .entry(key.clone())
            .or_insert_with(|| Namespace::new(key))
    }

    pub fn current_ns(&self) -> Rc<str> {
        self.current.clone()
    }

    /// Switch the current namespace, creating it if needed.
    pub fn in_ns(&mut self, name: &str) {
        self.ensure(name);
        self.current = Rc::from(name);
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    /// Find or create `name` in namespace `ns`.
    pub fn intern_in(&mut self, ns: &str, name: &str) -> Rc<Var> {
        let namespace = self.ensure(ns);
        if let Some(var) = namespace.vars.get(name) {
            return var.clone();
        }
        let var = Rc::new(Var::new(namespace.name.clone(), Rc::from(name)));
        namespace.vars.insert(Rc::from(name), var.clone());
        var
    }

    /// Find or create `name` in the current namespace.
    pub fn intern(&mut self, name: &str) -> Rc<Var> {
        let ns = self.current.clone();
        self.intern_in(&ns, name)
    }

    /// Resolve an unqualified name in the current namespace, then in `core`.
    pub fn lookup(&self, name: &str) -> Option<Rc<Var>> {
        self.namespaces
            .get(&self.current)
            .and_then(|ns| ns.get(name))
            .or_else(|| self.namespaces.get(CORE_NS).and_then(|ns| ns.get(name)))
    }

    /// Resolve `ns/name`.
    pub fn lookup_qualified(&self, ns: &str, name: &str) -> Option<Rc<Var>> {
        self.namespaces.get(ns).and_then(|n| n.get(name))
    }

    /// Resolve a symbol as written: qualified or not.
    pub fn resolve(&self, symbol: &str) -> Option<Rc<Var>> {
        match split_qualified(symbol) {
            Some((ns, name)) => self.lookup_qualified(ns, name),
            None => self.lookup(symbol),
        }
    }
}

impl Default for GlobalEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `ns/name`; a bare `/` (the division function) is unqualified.
pub fn split_qualified(symbol: &str) -> Option<(&str, &str)> {
    if symbol == "/" {
        return None;
    }
    match symbol.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Some((ns, name)),
        _ => None,
    }
}
