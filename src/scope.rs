//! Lexical scopes and the bindings they hold.
//!
//! A [`Scope`] is a node in a parent-linked tree. Each scope owns its local bindings and may
//! carry a result automaton once the declaration it belongs to has been evaluated. Every
//! name is defined at most once; reading a declared but undefined name is an error.

use crate::evaluator::{Automaton, Value};
use crate::token::Span;
use crate::types::EvaluationError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Reserved binding holding the initial state of the automaton being declared.
pub const INITIAL_STATE: &str = "initial state";
/// Reserved binding collecting the final states of the automaton being declared.
pub const FINAL_STATES: &str = "final states";
/// Reserved binding collecting the transitions of the automaton being declared.
pub const TRANSITION_LIST: &str = "transition list";
/// Reserved binding collecting the productions of the grammar being declared.
pub const PRODUCTION_LIST: &str = "production list";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Redefinition of name '{0}'")]
    Redefinition(String),
    #[error("Name '{0}' used before definition")]
    UsedBeforeDefinition(String),
    #[error("Name '{0}' is not declared")]
    NotDeclared(String),
}

impl BindingError {
    /// Attaches the location of the offending use.
    pub fn at(self, span: Span) -> EvaluationError {
        match self {
            BindingError::Redefinition(name) => EvaluationError::Redefinition { name, span },
            BindingError::UsedBeforeDefinition(name) => {
                EvaluationError::UsedBeforeDefinition { name, span }
            }
            BindingError::NotDeclared(name) => EvaluationError::NotDeclared { name, span },
        }
    }
}

/// A declared name. `value` is `None` until the name is defined.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub value: Option<Value>,
}

impl Binding {
    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    bindings: RefCell<HashMap<String, Binding>>,
    order: RefCell<Vec<String>>,
    result: RefCell<Option<Automaton>>,
}

impl Scope {
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: Some(Rc::clone(parent)),
            ..Scope::default()
        })
    }

    /// Declares `name` in this scope without defining it.
    pub fn declare(&self, name: &str) -> Result<(), BindingError> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(BindingError::Redefinition(name.to_string()));
        }

        bindings.insert(
            name.to_string(),
            Binding {
                name: name.to_string(),
                value: None,
            },
        );
        self.order.borrow_mut().push(name.to_string());
        Ok(())
    }

    /// Defines the nearest binding of `name`.
    ///
    /// # Returns
    ///
    /// * `Err(BindingError::NotDeclared)` if no enclosing scope declares `name`.
    /// * `Err(BindingError::Redefinition)` if the binding already has a value.
    pub fn define(&self, name: &str, value: Value) -> Result<(), BindingError> {
        let owner = self.owner(name)?;
        let mut bindings = owner.bindings.borrow_mut();
        let binding = bindings
            .get_mut(name)
            .ok_or_else(|| BindingError::NotDeclared(name.to_string()))?;

        if binding.is_defined() {
            return Err(BindingError::Redefinition(name.to_string()));
        }
        log::debug!("Defined '{}'", name);
        binding.value = Some(value);
        Ok(())
    }

    /// Declares and defines `name` in this scope.
    pub fn bind(&self, name: &str, value: Value) -> Result<(), BindingError> {
        self.declare(name)?;
        self.define(name, value)
    }

    /// Returns the value of the nearest binding of `name`.
    pub fn lookup(&self, name: &str) -> Result<Value, BindingError> {
        let owner = self.owner(name)?;
        let bindings = owner.bindings.borrow();
        bindings
            .get(name)
            .and_then(|binding| binding.value.clone())
            .ok_or_else(|| BindingError::UsedBeforeDefinition(name.to_string()))
    }

    /// Changes the value of the nearest defined binding of `name` in place.
    pub fn update<T>(&self, name: &str, f: impl FnOnce(&mut Value) -> T) -> Result<T, BindingError> {
        let owner = self.owner(name)?;
        let mut bindings = owner.bindings.borrow_mut();
        match bindings.get_mut(name).and_then(|b| b.value.as_mut()) {
            Some(value) => Ok(f(value)),
            None => Err(BindingError::UsedBeforeDefinition(name.to_string())),
        }
    }

    /// Returns true if `name` is declared in this scope itself.
    pub fn is_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// The local names, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.order.borrow().clone()
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.borrow().get(name).cloned()
    }

    pub fn result(&self) -> Option<Automaton> {
        self.result.borrow().clone()
    }

    pub fn set_result(&self, automaton: Automaton) {
        *self.result.borrow_mut() = Some(automaton);
    }

    /// The automata defined directly in this scope, in declaration order.
    pub fn automata(&self) -> Vec<(String, Automaton)> {
        self.names()
            .into_iter()
            .filter_map(|name| match self.binding(&name)?.value? {
                Value::Scope(scope) => Some((name, scope.result()?)),
                _ => None,
            })
            .collect()
    }

    /// Walks the parent chain to the scope declaring `name`.
    fn owner(&self, name: &str) -> Result<&Scope, BindingError> {
        let mut scope = self;
        loop {
            if scope.is_local(name) {
                return Ok(scope);
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => return Err(BindingError::NotDeclared(name.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(name: &str) -> Value {
        Value::State(name.to_string())
    }

    #[test]
    fn test_define_once() {
        let scope = Scope::root();
        scope.declare("x").unwrap();

        assert_eq!(
            scope.lookup("x").unwrap_err(),
            BindingError::UsedBeforeDefinition("x".into())
        );
        scope.define("x", state("q0")).unwrap();
        assert!(matches!(scope.lookup("x"), Ok(Value::State(s)) if s == "q0"));
        assert_eq!(
            scope.define("x", state("q1")).unwrap_err(),
            BindingError::Redefinition("x".into())
        );
    }

    #[test]
    fn test_declare_twice() {
        let scope = Scope::root();
        scope.declare("x").unwrap();

        assert_eq!(
            scope.declare("x").unwrap_err(),
            BindingError::Redefinition("x".into())
        );
    }

    #[test]
    fn test_lookup_walks_parents() {
        let root = Scope::root();
        root.bind("outer", state("a")).unwrap();
        let child = Scope::child(&root);
        child.bind("inner", state("b")).unwrap();

        assert!(child.lookup("outer").is_ok());
        assert!(child.lookup("inner").is_ok());
        assert_eq!(
            root.lookup("inner").unwrap_err(),
            BindingError::NotDeclared("inner".into())
        );
    }

    #[test]
    fn test_child_defines_parent_binding() {
        let root = Scope::root();
        root.declare("x").unwrap();
        let child = Scope::child(&root);

        child.define("x", state("a")).unwrap();
        assert!(root.lookup("x").is_ok());
        assert!(!child.is_local("x"));
    }

    #[test]
    fn test_update_in_place() {
        let scope = Scope::root();
        scope.bind(FINAL_STATES, Value::States(vec![])).unwrap();

        scope
            .update(FINAL_STATES, |value| {
                if let Value::States(states) = value {
                    states.push("f".into());
                }
            })
            .unwrap();

        assert!(matches!(scope.lookup(FINAL_STATES), Ok(Value::States(s)) if s == vec!["f"]));
        assert!(scope.update("missing", |_| ()).is_err());
    }

    #[test]
    fn test_names_keep_declaration_order() {
        let scope = Scope::root();
        for name in ["c", "a", "b"] {
            scope.declare(name).unwrap();
        }

        assert_eq!(scope.names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_binding_error_location() {
        let error = BindingError::NotDeclared("x".into()).at(Span::default());

        assert!(matches!(error, EvaluationError::NotDeclared { name, .. } if name == "x"));
    }
}
