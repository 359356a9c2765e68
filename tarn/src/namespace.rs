//! Registry of named environments.
//!
//! Every interpreter owns one [`NamespaceManager`]. The root environment is
//! always registered under [`GLOBAL`]; other namespaces are children of the
//! namespace named by their path prefix (`A/B` hangs off `A`), or of the root
//! when that prefix is not registered.

use crate::env::{Env, EnvRef};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

pub const GLOBAL: &str = "global";
pub const SEPARATOR: char = '/';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("Namespace {0} not found")]
    NotFound(String),
    #[error("Namespace {0} must start with uppercase")]
    Lowercase(String),
}

/// Splits on the final separator: `A/B/c` becomes `(Some("A/B"), "c")`.
pub fn split(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once(SEPARATOR) {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, path),
    }
}

pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_owned()
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// User-declared namespaces must start with an uppercase letter.
pub fn validate(name: &str) -> Result<(), NamespaceError> {
    if name.chars().next().is_some_and(char::is_uppercase) {
        Ok(())
    } else {
        Err(NamespaceError::Lowercase(name.to_owned()))
    }
}

#[derive(Debug)]
pub struct NamespaceManager {
    root: EnvRef,
    namespaces: IndexMap<String, EnvRef>,
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceManager {
    pub fn new() -> Self {
        Self {
            root: Env::new_rc(),
            namespaces: IndexMap::new(),
        }
    }

    pub fn root(&self) -> EnvRef {
        self.root.clone()
    }

    fn parent_for(&self, name: &str) -> EnvRef {
        match split(name) {
            (Some(prefix), _) => self.get(prefix).unwrap_or_else(|| self.root()),
            (None, _) => self.root(),
        }
    }

    /// Registers a fresh environment under `name`, replacing any previous one.
    pub fn create(&mut self, name: &str) -> EnvRef {
        if name == GLOBAL {
            self.root = Env::new_rc();
            debug!(namespace = name, "replaced root namespace");
            return self.root();
        }
        let env = Env::child(self.parent_for(name)).into_rc();
        self.namespaces.insert(name.to_owned(), env.clone());
        debug!(namespace = name, "created namespace");
        env
    }

    /// Applies `mutator` to the registered environment in place.
    pub fn extend<R>(
        &self,
        name: &str,
        mutator: impl FnOnce(&mut Env) -> R,
    ) -> Result<R, NamespaceError> {
        let env = self
            .get(name)
            .ok_or_else(|| NamespaceError::NotFound(name.to_owned()))?;
        debug!(namespace = name, "extending namespace");
        let result = mutator(&mut env.borrow_mut());
        Ok(result)
    }

    pub fn get(&self, name: &str) -> Option<EnvRef> {
        if name == GLOBAL {
            return Some(self.root());
        }
        self.namespaces.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        name == GLOBAL || self.namespaces.contains_key(name)
    }

    /// Swaps the registered environment for an empty one.
    /// Closures and namespaces that captured the old environment keep it.
    pub fn reset(&mut self, name: &str) -> Result<EnvRef, NamespaceError> {
        if !self.has(name) {
            return Err(NamespaceError::NotFound(name.to_owned()));
        }
        debug!(namespace = name, "resetting namespace");
        Ok(self.create(name))
    }

    /// The root cannot be deleted.
    pub fn delete(&mut self, name: &str) -> Option<EnvRef> {
        if name == GLOBAL {
            return None;
        }
        let removed = self.namespaces.shift_remove(name);
        if removed.is_some() {
            debug!(namespace = name, "deleted namespace");
        }
        removed
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(GLOBAL).chain(self.namespaces.keys().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::rc::Rc;

    #[test]
    fn split_and_join() {
        assert_eq!(split("List/create"), (Some("List"), "create"));
        assert_eq!(split("A/B/c"), (Some("A/B"), "c"));
        assert_eq!(split("plain"), (None, "plain"));
        assert_eq!(join("A", "B"), "A/B");
        assert_eq!(join("", "B"), "B");
    }

    #[test]
    fn validation() {
        assert!(validate("Test").is_ok());
        assert_eq!(
            validate("test").unwrap_err().to_string(),
            "Namespace test must start with uppercase"
        );
        assert!(validate("").is_err());
    }

    #[test]
    fn global_always_present() {
        let mut manager = NamespaceManager::new();
        assert!(manager.has(GLOBAL));
        assert!(Rc::ptr_eq(&manager.get(GLOBAL).unwrap(), &manager.root()));
        assert!(manager.delete(GLOBAL).is_none());
        assert!(manager.has(GLOBAL));
    }

    #[test]
    fn top_level_namespace_parents_to_root() {
        let mut manager = NamespaceManager::new();
        manager.root().borrow_mut().set("x", Value::num(1.));
        let ns = manager.create("A");
        assert!(Rc::ptr_eq(ns.borrow().parent().unwrap(), &manager.root()));
        assert_eq!(ns.borrow().get("x").unwrap(), Value::num(1.));
    }

    #[test]
    fn nested_namespace_parents_to_prefix() {
        let mut manager = NamespaceManager::new();
        let a = manager.create("A");
        let ab = manager.create("A/B");
        assert!(Rc::ptr_eq(ab.borrow().parent().unwrap(), &a));

        let orphan = manager.create("X/Y");
        assert!(Rc::ptr_eq(orphan.borrow().parent().unwrap(), &manager.root()));
    }

    #[test]
    fn extend_mutates_in_place() {
        let mut manager = NamespaceManager::new();
        let ns = manager.create("Test");
        manager
            .extend("Test", |env| env.set("a", Value::num(1.)))
            .unwrap();
        manager
            .extend("Test", |env| env.set("b", Value::num(2.)))
            .unwrap();
        assert_eq!(ns.borrow().len(), 2);
        assert_eq!(
            manager.extend("Missing", |_| ()).unwrap_err(),
            NamespaceError::NotFound("Missing".to_owned())
        );
    }

    #[test]
    fn reset_replaces_registry_entry_only() {
        let mut manager = NamespaceManager::new();
        let old = manager.create("Test");
        old.borrow_mut().set("a", Value::num(1.));
        let new = manager.reset("Test").unwrap();
        assert!(!Rc::ptr_eq(&old, &new));
        assert!(new.borrow().is_empty());
        // holders of the old env still see its bindings
        assert!(old.borrow().has("a"));
        assert!(manager.reset("Missing").is_err());
    }

    #[test]
    fn delete_and_names() {
        let mut manager = NamespaceManager::new();
        manager.create("A");
        manager.create("B");
        assert_eq!(manager.names().collect::<Vec<_>>(), vec![GLOBAL, "A", "B"]);
        assert!(manager.delete("A").is_some());
        assert!(!manager.has("A"));
        assert!(manager.delete("A").is_none());
    }
}
