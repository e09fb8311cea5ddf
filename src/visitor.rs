//! Single-dispatch over syntax tree nodes.
//!
//! A [`Visitor`] lists its handlers statically. A [`HandlerTable`] merges that list into an
//! instance-level table that can be extended later. Resolution picks the most recently
//! registered handler for the node's concrete kind, falling back to the most recent
//! [`Target::Any`] handler.

use crate::ast::{Node, NodeKind};
use std::collections::HashMap;
use thiserror::Error;

/// What a handler is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Kind(NodeKind),
    /// Every node kind without a handler of its own.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("No handler registered for {0} nodes")]
    Unhandled(NodeKind),
    #[error("Handler for {expected} nodes received a {found} node")]
    Mismatch { expected: NodeKind, found: NodeKind },
}

pub type Handler<V> = fn(
    &mut V,
    &Node,
    <V as Visitor>::Arg,
) -> Result<<V as Visitor>::Output, <V as Visitor>::Error>;

pub trait Visitor: Sized {
    /// Threaded through every handler call.
    type Arg: Clone;
    type Output;
    type Error: From<DispatchError>;

    /// The handlers every instance starts with, in registration order.
    fn handlers() -> Vec<(Target, Handler<Self>)>;
}

/// Pairs a node kind with its handler.
pub fn handle<V: Visitor>(kind: NodeKind, handler: Handler<V>) -> (Target, Handler<V>) {
    (Target::Kind(kind), handler)
}

/// Registers a handler for every node kind.
pub fn fallback<V: Visitor>(handler: Handler<V>) -> (Target, Handler<V>) {
    (Target::Any, handler)
}

pub struct HandlerTable<V: Visitor> {
    handlers: HashMap<Target, Vec<Handler<V>>>,
}

impl<V: Visitor> Clone for HandlerTable<V> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<V: Visitor> Default for HandlerTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Visitor> HandlerTable<V> {
    pub fn new() -> Self {
        let mut table = Self {
            handlers: HashMap::new(),
        };
        for (target, handler) in V::handlers() {
            table.register(target, handler);
        }
        table
    }

    /// Adds a handler. It takes precedence over earlier handlers for the same target,
    /// which are kept.
    pub fn register(&mut self, target: Target, handler: Handler<V>) {
        self.handlers.entry(target).or_default().push(handler);
    }

    pub fn resolve(&self, kind: NodeKind) -> Result<Handler<V>, DispatchError> {
        [Target::Kind(kind), Target::Any]
            .iter()
            .find_map(|target| self.handlers.get(target).and_then(|h| h.last()))
            .copied()
            .ok_or(DispatchError::Unhandled(kind))
    }

    pub fn invoke(&self, visitor: &mut V, node: &Node, arg: V::Arg) -> Result<V::Output, V::Error> {
        let handler = self.resolve(node.kind())?;
        handler(visitor, node, arg)
    }
}
