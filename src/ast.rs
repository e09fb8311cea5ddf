//! The syntax tree produced by the parser.
//!
//! Every node carries the [`Span`] of the tokens it was parsed from. The tree is a plain
//! tagged union; the evaluator dispatches on [`NodeKind`].

use crate::token::Span;
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The machine flavour named by a declaration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomatonKind {
    Finite,
    Pushdown,
    Turing,
}

impl AutomatonKind {
    pub fn name(&self) -> &'static str {
        match self {
            AutomatonKind::Finite => "finite automaton",
            AutomatonKind::Pushdown => "pushdown automaton",
            AutomatonKind::Turing => "turing machine",
        }
    }
}

impl fmt::Display for AutomatonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Union,
    Intersection,
    Concatenate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Complement,
    Determinize,
    Reenumerate,
    Star,
    Reverse,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOp::Union => "union",
            BinaryOp::Intersection => "intersection",
            BinaryOp::Concatenate => "concatenate",
        };
        f.write_str(name)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnaryOp::Complement => "complement",
            UnaryOp::Determinize => "determinize",
            UnaryOp::Reenumerate => "reenumerate",
            UnaryOp::Star => "star",
            UnaryOp::Reverse => "reverse",
        };
        f.write_str(name)
    }
}

/// A name together with where it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    /// A statement sequence: the whole module or an automaton body.
    Root { statements: Vec<Node>, span: Span },

    Finite {
        name: Identifier,
        body: Box<Node>,
        span: Span,
    },
    Pushdown {
        name: Identifier,
        stacks: Vec<Identifier>,
        body: Box<Node>,
        span: Span,
    },
    Turing {
        name: Identifier,
        tapes: Vec<Identifier>,
        body: Box<Node>,
        span: Span,
    },
    Grammar {
        name: Identifier,
        start: Option<Identifier>,
        body: Box<Node>,
        span: Span,
    },
    /// `finite name = expression`, and the pushdown/turing equivalents.
    Assignment {
        kind: AutomatonKind,
        name: Identifier,
        value: Box<Node>,
        span: Span,
    },

    List { items: Vec<Node>, span: Span },

    Identifier(Identifier),
    /// A single read/write symbol. Named and quoted characters are already decoded.
    Character { value: String, span: Span },
    Str { value: String, span: Span },
    /// A tape- or stack-qualified symbol or shift: `tape:value`.
    Qualified {
        tape: Identifier,
        value: Box<Node>,
        span: Span,
    },
    Shift { direction: Direction, span: Span },
    NonTerminal { name: String, span: Span },

    Initial { state: Identifier, span: Span },
    Final { states: Vec<Identifier>, span: Span },
    Print { message: String, span: Span },
    Test {
        automaton: Identifier,
        inputs: Vec<String>,
        span: Span,
    },
    /// `<Head> -> alternative | alternative`, each alternative a sequence of
    /// `Str` and `NonTerminal` nodes.
    Production {
        head: String,
        alternatives: Vec<Vec<Node>>,
        span: Span,
    },

    FiniteTransition {
        from: Identifier,
        condition: Box<Node>,
        to: Identifier,
        span: Span,
    },
    PushdownTransition {
        from: Identifier,
        condition: Box<Node>,
        pop: Vec<Node>,
        to: Identifier,
        push: Vec<Node>,
        span: Span,
    },
    TuringTransition {
        from: Identifier,
        read: Vec<Node>,
        to: Identifier,
        write: Vec<Node>,
        shift: Vec<Node>,
        span: Span,
    },

    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
        span: Span,
    },
}

/// The variant tag of a [`Node`], used as a dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Finite,
    Pushdown,
    Turing,
    Grammar,
    Assignment,
    List,
    Identifier,
    Character,
    Str,
    Qualified,
    Shift,
    NonTerminal,
    Initial,
    Final,
    Print,
    Test,
    Production,
    FiniteTransition,
    PushdownTransition,
    TuringTransition,
    Binary,
    Unary,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Root { .. } => NodeKind::Root,
            Node::Finite { .. } => NodeKind::Finite,
            Node::Pushdown { .. } => NodeKind::Pushdown,
            Node::Turing { .. } => NodeKind::Turing,
            Node::Grammar { .. } => NodeKind::Grammar,
            Node::Assignment { .. } => NodeKind::Assignment,
            Node::List { .. } => NodeKind::List,
            Node::Identifier(_) => NodeKind::Identifier,
            Node::Character { .. } => NodeKind::Character,
            Node::Str { .. } => NodeKind::Str,
            Node::Qualified { .. } => NodeKind::Qualified,
            Node::Shift { .. } => NodeKind::Shift,
            Node::NonTerminal { .. } => NodeKind::NonTerminal,
            Node::Initial { .. } => NodeKind::Initial,
            Node::Final { .. } => NodeKind::Final,
            Node::Print { .. } => NodeKind::Print,
            Node::Test { .. } => NodeKind::Test,
            Node::Production { .. } => NodeKind::Production,
            Node::FiniteTransition { .. } => NodeKind::FiniteTransition,
            Node::PushdownTransition { .. } => NodeKind::PushdownTransition,
            Node::TuringTransition { .. } => NodeKind::TuringTransition,
            Node::Binary { .. } => NodeKind::Binary,
            Node::Unary { .. } => NodeKind::Unary,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Identifier(identifier) => identifier.span,
            Node::Root { span, .. }
            | Node::Finite { span, .. }
            | Node::Pushdown { span, .. }
            | Node::Turing { span, .. }
            | Node::Grammar { span, .. }
            | Node::Assignment { span, .. }
            | Node::List { span, .. }
            | Node::Character { span, .. }
            | Node::Str { span, .. }
            | Node::Qualified { span, .. }
            | Node::Shift { span, .. }
            | Node::NonTerminal { span, .. }
            | Node::Initial { span, .. }
            | Node::Final { span, .. }
            | Node::Print { span, .. }
            | Node::Test { span, .. }
            | Node::Production { span, .. }
            | Node::FiniteTransition { span, .. }
            | Node::PushdownTransition { span, .. }
            | Node::TuringTransition { span, .. }
            | Node::Binary { span, .. }
            | Node::Unary { span, .. } => *span,
        }
    }

    /// The items of a `List` node; any other node is a one-element list.
    pub fn into_items(self) -> Vec<Node> {
        match self {
            Node::List { items, .. } => items,
            other => vec![other],
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Node::Identifier(identifier) => Some(identifier),
            _ => None,
        }
    }
}
