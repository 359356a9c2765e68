use crate::{eval::EvalError, value::Value};
use indexmap::IndexMap;
use std::{cell::RefCell, fmt, rc::Rc};

pub type EnvRef = Rc<RefCell<Env>>;

/// Lexical binding table. Writes always land in the local table,
/// reads fall back to the parent chain.
#[derive(Default)]
pub struct Env {
    vars: IndexMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(parent: EnvRef) -> Self {
        Self {
            vars: IndexMap::new(),
            parent: Some(parent),
        }
    }

    pub fn new_rc() -> EnvRef {
        Self::new().into_rc()
    }

    pub fn into_rc(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn parent(&self) -> Option<&EnvRef> {
        self.parent.as_ref()
    }

    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Searches this table, then every ancestor.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(val) = self.vars.get(name) {
            return Some(val.clone());
        }
        let mut next = self.parent.clone();
        while let Some(env) = next {
            let env = env.borrow();
            if let Some(val) = env.vars.get(name) {
                return Some(val.clone());
            }
            next = env.parent.clone();
        }
        None
    }

    pub fn get(&self, name: &str) -> Result<Value, EvalError> {
        self.lookup(name)
            .ok_or_else(|| EvalError::UndefinedSymbol(name.to_owned()))
    }

    /// Binds locally and hands back the stored value.
    pub fn set(&mut self, name: &str, val: Value) -> Value {
        self.vars.insert(name.to_owned(), val.clone());
        val
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// closures bound here point back at this env, so only names are printed
impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_value() {
        let mut env = Env::new();
        assert_eq!(env.set("x", Value::num(1.)), Value::num(1.));
        assert_eq!(env.get("x").unwrap(), Value::num(1.));
    }

    #[test]
    fn undefined_symbol() {
        let env = Env::new();
        let err = env.get("nope").unwrap_err();
        assert_eq!(err.to_string(), "Undefined symbol: nope");
    }

    #[test]
    fn parent_chain() {
        let root = Env::new_rc();
        root.borrow_mut().set("x", Value::num(1.));
        let middle = Env::child(root.clone()).into_rc();
        let mut leaf = Env::child(middle);
        assert_eq!(leaf.get("x").unwrap(), Value::num(1.));
        assert!(leaf.has("x"));
        assert!(leaf.get_local("x").is_none());

        leaf.set("x", Value::num(2.));
        assert_eq!(leaf.get("x").unwrap(), Value::num(2.));
        assert_eq!(root.borrow().get("x").unwrap(), Value::num(1.));
    }

    #[test]
    fn has_without_binding() {
        let env = Env::child(Env::new_rc());
        assert!(!env.has("missing"));
        assert!(env.is_empty());
    }
}
