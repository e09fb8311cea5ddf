//! This module evaluates a parsed module into automata.
//!
//! The [`Evaluator`] walks the syntax tree through a [`HandlerTable`], threading the current
//! [`Scope`] through every call. Automaton declarations collect their initial state, final
//! states and transitions in reserved bindings of a child scope and are built into engine
//! machines once their body has been evaluated.

use crate::ast::{AutomatonKind, BinaryOp, Identifier, Node, NodeKind, UnaryOp};
use crate::finite::{Finite, FiniteAutomaton};
use crate::grammar::{Grammar, GrammarSymbol, Production};
use crate::machine::{default_names, MachineDefinition, MachineKind, StateMachine, Transition};
use crate::pushdown::{Pushdown, PushdownAutomaton, StackAction};
use crate::scope::{
    BindingError, Scope, FINAL_STATES, INITIAL_STATE, PRODUCTION_LIST, TRANSITION_LIST,
};
use crate::token::Span;
use crate::turing::{Turing, TuringAction, TuringMachine};
use crate::types::{
    Direction, EvaluationError, MachineError, Options, State, Symbol, DEFAULT_INPUT_TAPE,
    DEFAULT_STACK, DEFAULT_TAPE, EPSILON,
};
use crate::visitor::{fallback, handle, DispatchError, Handler, HandlerTable, Target, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// The value of a binding.
#[derive(Debug, Clone)]
pub enum Value {
    /// A declaration's scope. Its result is the declared automaton or grammar.
    Scope(Rc<Scope>),
    State(State),
    States(Vec<State>),
    Transitions(Vec<DeclaredTransition>),
    Productions(Vec<Production>),
}

impl Value {
    pub fn describe(&self) -> &'static str {
        match self {
            Value::Scope(_) => "declaration",
            Value::State(_) => "state",
            Value::States(_) => "state list",
            Value::Transitions(_) => "transition list",
            Value::Productions(_) => "production list",
        }
    }
}

/// Anything a declaration or expression can evaluate to.
#[derive(Debug, Clone, PartialEq)]
pub enum Automaton {
    Finite(FiniteAutomaton),
    Pushdown(PushdownAutomaton),
    Turing(TuringMachine),
    Grammar(Grammar),
}

impl Automaton {
    pub fn kind(&self) -> Option<AutomatonKind> {
        match self {
            Automaton::Finite(_) => Some(AutomatonKind::Finite),
            Automaton::Pushdown(_) => Some(AutomatonKind::Pushdown),
            Automaton::Turing(_) => Some(AutomatonKind::Turing),
            Automaton::Grammar(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Automaton::Finite(_) => Finite::NAME,
            Automaton::Pushdown(_) => Pushdown::NAME,
            Automaton::Turing(_) => Turing::NAME,
            Automaton::Grammar(_) => "grammar",
        }
    }

    /// Runs a machine on `inputs` for at most `limit` layers. Grammars cannot be run.
    pub fn test_within(&self, inputs: &[&str], limit: usize) -> Option<Result<Option<bool>, MachineError>> {
        match self {
            Automaton::Finite(m) => Some(m.test_within(inputs, limit)),
            Automaton::Pushdown(m) => Some(m.test_within(inputs, limit)),
            Automaton::Turing(m) => Some(m.test_within(inputs, limit)),
            Automaton::Grammar(_) => None,
        }
    }
}

/// A value addressed to one tape, by name or by position.
#[derive(Debug, Clone, PartialEq)]
pub struct TapeValue<T> {
    pub tape: Option<Identifier>,
    pub value: T,
}

/// A transition statement as written, before it is checked against its automaton.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredTransition {
    Finite {
        from: State,
        read: Symbol,
        to: State,
        span: Span,
    },
    Pushdown {
        from: State,
        read: Symbol,
        pop: Vec<TapeValue<Symbol>>,
        to: State,
        push: Vec<TapeValue<Symbol>>,
        span: Span,
    },
    Turing {
        from: State,
        read: Vec<TapeValue<Symbol>>,
        to: State,
        write: Vec<TapeValue<Symbol>>,
        shift: Vec<TapeValue<Direction>>,
        span: Span,
    },
}

impl DeclaredTransition {
    pub fn kind(&self) -> AutomatonKind {
        match self {
            DeclaredTransition::Finite { .. } => AutomatonKind::Finite,
            DeclaredTransition::Pushdown { .. } => AutomatonKind::Pushdown,
            DeclaredTransition::Turing { .. } => AutomatonKind::Turing,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            DeclaredTransition::Finite { span, .. }
            | DeclaredTransition::Pushdown { span, .. }
            | DeclaredTransition::Turing { span, .. } => *span,
        }
    }

    fn mismatch(&self, expected: AutomatonKind) -> EvaluationError {
        EvaluationError::KindMismatch {
            expected: format!("{expected} transition"),
            found: format!("{} transition", self.kind()),
            span: self.span(),
        }
    }
}

/// The result of a `test` statement for one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub automaton: String,
    pub input: String,
    /// `None` if no decision was reached within the layer bound.
    pub accepted: Option<bool>,
}

pub struct Evaluator {
    table: Rc<HandlerTable<Evaluator>>,
    options: Options,
    output: Vec<String>,
    tests: Vec<TestOutcome>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("options", &self.options)
            .field("output", &self.output)
            .field("tests", &self.tests)
            .finish_non_exhaustive()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Visitor for Evaluator {
    type Arg = Rc<Scope>;
    type Output = Option<Automaton>;
    type Error = EvaluationError;

    fn handlers() -> Vec<(Target, Handler<Self>)> {
        vec![
            fallback(Self::visit_unsupported),
            handle(NodeKind::Root, Self::visit_root),
            handle(NodeKind::Finite, Self::visit_declaration),
            handle(NodeKind::Pushdown, Self::visit_declaration),
            handle(NodeKind::Turing, Self::visit_declaration),
            handle(NodeKind::Grammar, Self::visit_grammar),
            handle(NodeKind::Assignment, Self::visit_assignment),
            handle(NodeKind::Initial, Self::visit_initial),
            handle(NodeKind::Final, Self::visit_final),
            handle(NodeKind::Print, Self::visit_print),
            handle(NodeKind::Test, Self::visit_test),
            handle(NodeKind::Production, Self::visit_production),
            handle(NodeKind::FiniteTransition, Self::visit_transition),
            handle(NodeKind::PushdownTransition, Self::visit_transition),
            handle(NodeKind::TuringTransition, Self::visit_transition),
            handle(NodeKind::Identifier, Self::visit_identifier),
            handle(NodeKind::Binary, Self::visit_binary),
            handle(NodeKind::Unary, Self::visit_unary),
        ]
    }
}

type Evaluated = Result<Option<Automaton>, EvaluationError>;

fn mismatch(expected: NodeKind, node: &Node) -> EvaluationError {
    DispatchError::Mismatch {
        expected,
        found: node.kind(),
    }
    .into()
}

/// Maps a failed access to a reserved binding. A reserved name that is not declared
/// anywhere means the statement is not inside a declaration body.
fn reserved(error: BindingError, statement: &str, span: Span) -> EvaluationError {
    match error {
        BindingError::NotDeclared(_) => EvaluationError::OutsideAutomaton {
            statement: statement.to_string(),
            span,
        },
        other => other.at(span),
    }
}

/// Orders per-tape values by tape. Unnamed values fill tapes from the left; tapes without
/// a value get `neutral`.
fn arrange<T: Clone>(
    values: &[TapeValue<T>],
    tapes: &[String],
    neutral: T,
    automaton: &str,
    span: Span,
) -> Result<Vec<T>, EvaluationError> {
    let mut arranged = vec![neutral; tapes.len()];
    let mut position = 0;

    for TapeValue { tape, value } in values {
        let index = match tape {
            Some(tape) => tapes.iter().position(|t| *t == tape.name).ok_or_else(|| {
                EvaluationError::UnknownTape {
                    tape: tape.name.clone(),
                    automaton: automaton.to_string(),
                    span: tape.span,
                }
            })?,
            None => {
                position += 1;
                position - 1
            }
        };

        let Some(slot) = arranged.get_mut(index) else {
            return Err(EvaluationError::TooManyTapes {
                automaton: automaton.to_string(),
                expected: tapes.len(),
                found: values.len(),
                span,
            });
        };
        *slot = value.clone();
    }

    Ok(arranged)
}

fn tape_names(declared: &[Identifier], default: &str) -> Vec<String> {
    if declared.is_empty() {
        vec![default.to_string()]
    } else {
        declared.iter().map(|i| i.name.clone()).collect()
    }
}

fn symbol(node: &Node) -> Result<Symbol, EvaluationError> {
    match node {
        Node::Character { value, .. } | Node::Str { value, .. } => Ok(value.clone()),
        Node::Identifier(identifier) => Err(EvaluationError::unsupported(
            "name-reference transition conditions are not supported yet",
            identifier.span,
        )),
        other => Err(mismatch(NodeKind::Character, other)),
    }
}

fn tape_symbol(node: &Node) -> Result<TapeValue<Symbol>, EvaluationError> {
    match node {
        Node::Qualified { tape, value, .. } => Ok(TapeValue {
            tape: Some(tape.clone()),
            value: symbol(value)?,
        }),
        other => Ok(TapeValue {
            tape: None,
            value: symbol(other)?,
        }),
    }
}

fn tape_shift(node: &Node) -> Result<TapeValue<Direction>, EvaluationError> {
    match node {
        Node::Qualified { tape, value, .. } => Ok(TapeValue {
            tape: Some(tape.clone()),
            value: match value.as_ref() {
                Node::Shift { direction, .. } => *direction,
                other => return Err(mismatch(NodeKind::Shift, other)),
            },
        }),
        Node::Shift { direction, .. } => Ok(TapeValue {
            tape: None,
            value: *direction,
        }),
        other => Err(mismatch(NodeKind::Shift, other)),
    }
}

fn tape_symbols(nodes: &[Node]) -> Result<Vec<TapeValue<Symbol>>, EvaluationError> {
    nodes.iter().map(tape_symbol).collect()
}

/// The shape of an automaton declaration once its body has been evaluated.
struct Declared {
    kind: AutomatonKind,
    name: String,
    tapes: Vec<String>,
    initial: State,
    finals: Vec<State>,
    transitions: Vec<DeclaredTransition>,
}

impl Declared {
    fn definition<P>(&self, transitions: Vec<Transition<P>>, bounded: bool) -> MachineDefinition<P> {
        MachineDefinition {
            transitions,
            initial: self.initial.clone(),
            finals: self.finals.iter().cloned().collect(),
            tapes: self.tapes.clone(),
            states: Default::default(),
            alphabet: Default::default(),
            bounded,
        }
    }

    fn build(self) -> Result<Automaton, EvaluationError> {
        let automaton = match self.kind {
            AutomatonKind::Finite => Automaton::Finite(self.finite()?),
            AutomatonKind::Pushdown => Automaton::Pushdown(self.pushdown()?),
            AutomatonKind::Turing => Automaton::Turing(self.turing()?),
        };
        Ok(automaton)
    }

    fn finite(&self) -> Result<FiniteAutomaton, EvaluationError> {
        let transitions = self
            .transitions
            .iter()
            .map(|declared| match declared {
                DeclaredTransition::Finite { from, read, to, .. } => Ok(Transition {
                    from: from.clone(),
                    read: vec![read.clone()],
                    to: to.clone(),
                    payload: (),
                }),
                other => Err(other.mismatch(self.kind)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StateMachine::new(self.definition(transitions, Finite::BOUNDED))?)
    }

    fn pushdown(&self) -> Result<PushdownAutomaton, EvaluationError> {
        let stacks = &self.tapes[1..];
        let mut transitions = Vec::new();

        for declared in &self.transitions {
            let DeclaredTransition::Pushdown {
                from,
                read,
                pop,
                to,
                push,
                span,
            } = declared
            else {
                return Err(declared.mismatch(self.kind));
            };

            let mut pattern = vec![read.clone()];
            pattern.extend(arrange(pop, stacks, EPSILON.to_string(), &self.name, *span)?);
            transitions.push(Transition {
                from: from.clone(),
                read: pattern,
                to: to.clone(),
                payload: StackAction {
                    push: arrange(push, stacks, EPSILON.to_string(), &self.name, *span)?,
                },
            });
        }

        Ok(StateMachine::new(self.definition(transitions, Pushdown::BOUNDED))?)
    }

    fn turing(&self) -> Result<TuringMachine, EvaluationError> {
        let tapes = &self.tapes;
        let mut transitions = Vec::new();

        for declared in &self.transitions {
            let DeclaredTransition::Turing {
                from,
                read,
                to,
                write,
                shift,
                span,
            } = declared
            else {
                return Err(declared.mismatch(self.kind));
            };

            transitions.push(Transition {
                from: from.clone(),
                read: arrange(read, tapes, EPSILON.to_string(), &self.name, *span)?,
                to: to.clone(),
                payload: TuringAction {
                    write: arrange(write, tapes, EPSILON.to_string(), &self.name, *span)?,
                    shift: arrange(shift, tapes, Direction::Stay, &self.name, *span)?,
                },
            });
        }

        Ok(StateMachine::new(self.definition(transitions, Turing::BOUNDED))?)
    }
}

impl Evaluator {
    pub fn new(options: Options) -> Self {
        Self {
            table: Rc::new(HandlerTable::new()),
            options,
            output: Vec::new(),
            tests: Vec::new(),
        }
    }

    /// Adds a handler that takes precedence over the built-in ones for `target`.
    pub fn register(&mut self, target: Target, handler: Handler<Self>) {
        Rc::make_mut(&mut self.table).register(target, handler);
    }

    pub fn visit(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        // Handlers may register new handlers while the table is in use.
        let table = Rc::clone(&self.table);
        table.invoke(self, node, scope)
    }

    /// Evaluates a module in a fresh global scope and returns that scope.
    pub fn evaluate(&mut self, module: &Node) -> Result<Rc<Scope>, EvaluationError> {
        let global = Scope::root();
        self.evaluate_in(module, Rc::clone(&global))?;
        Ok(global)
    }

    /// Evaluates a module in `scope`. Bindings made before an error stay in `scope`.
    pub fn evaluate_in(&mut self, module: &Node, scope: Rc<Scope>) -> Result<(), EvaluationError> {
        self.visit(module, scope).map(|_| ())
    }

    /// Lines produced by `print` statements, in order.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn tests(&self) -> &[TestOutcome] {
        &self.tests
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<TestOutcome>) {
        (self.output, self.tests)
    }

    /// Evaluates an expression node that must produce an automaton.
    fn automaton(&mut self, node: &Node, scope: Rc<Scope>) -> Result<Automaton, EvaluationError> {
        self.visit(node, scope)?.ok_or_else(|| {
            EvaluationError::unsupported(
                format!("{} is not an automaton expression", node.kind()),
                node.span(),
            )
        })
    }

    fn lookup_automaton(identifier: &Identifier, scope: &Scope) -> Result<Automaton, EvaluationError> {
        match scope
            .lookup(&identifier.name)
            .map_err(|e| e.at(identifier.span))?
        {
            Value::Scope(declared) => declared.result().ok_or_else(|| {
                EvaluationError::UsedBeforeDefinition {
                    name: identifier.name.clone(),
                    span: identifier.span,
                }
            }),
            other => Err(EvaluationError::KindMismatch {
                expected: "automaton".to_string(),
                found: other.describe().to_string(),
                span: identifier.span,
            }),
        }
    }

    fn visit_unsupported(&mut self, node: &Node, _: Rc<Scope>) -> Evaluated {
        Err(EvaluationError::unsupported(
            format!("{} nodes cannot be evaluated", node.kind()),
            node.span(),
        ))
    }

    fn visit_root(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Root { statements, .. } = node else {
            return Err(mismatch(NodeKind::Root, node));
        };

        for statement in statements {
            self.visit(statement, Rc::clone(&scope))?;
        }
        Ok(None)
    }

    fn visit_declaration(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let (kind, name, tapes, body) = match node {
            Node::Finite { name, body, .. } => (
                AutomatonKind::Finite,
                name,
                vec![DEFAULT_TAPE.to_string()],
                body,
            ),
            Node::Pushdown {
                name, stacks, body, ..
            } => {
                let mut tapes = vec![DEFAULT_INPUT_TAPE.to_string()];
                tapes.extend(tape_names(stacks, DEFAULT_STACK));
                (AutomatonKind::Pushdown, name, tapes, body)
            }
            Node::Turing {
                name, tapes, body, ..
            } => (AutomatonKind::Turing, name, tape_names(tapes, DEFAULT_TAPE), body),
            other => return Err(mismatch(NodeKind::Finite, other)),
        };
        let span = node.span();

        scope.declare(&name.name).map_err(|e| e.at(name.span))?;

        let inner = Scope::child(&scope);
        inner.declare(INITIAL_STATE).map_err(|e| e.at(span))?;
        inner
            .bind(FINAL_STATES, Value::States(Vec::new()))
            .map_err(|e| e.at(span))?;
        inner
            .bind(TRANSITION_LIST, Value::Transitions(Vec::new()))
            .map_err(|e| e.at(span))?;

        self.visit(body, Rc::clone(&inner))?;

        let Ok(Value::State(initial)) = inner.lookup(INITIAL_STATE) else {
            return Err(EvaluationError::MissingInitialState {
                automaton: name.name.clone(),
                span,
            });
        };
        let finals = match inner.lookup(FINAL_STATES) {
            Ok(Value::States(states)) => states,
            _ => Vec::new(),
        };
        let transitions = match inner.lookup(TRANSITION_LIST) {
            Ok(Value::Transitions(transitions)) => transitions,
            _ => Vec::new(),
        };

        let automaton = Declared {
            kind,
            name: name.name.clone(),
            tapes,
            initial,
            finals,
            transitions,
        }
        .build()?;

        log::debug!("Declared {} '{}'", automaton.kind_name(), name.name);
        inner.set_result(automaton);
        scope
            .define(&name.name, Value::Scope(inner))
            .map_err(|e| e.at(name.span))?;
        Ok(None)
    }

    fn visit_grammar(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Grammar {
            name,
            start,
            body,
            span,
        } = node
        else {
            return Err(mismatch(NodeKind::Grammar, node));
        };

        scope.declare(&name.name).map_err(|e| e.at(name.span))?;

        let inner = Scope::child(&scope);
        inner
            .bind(PRODUCTION_LIST, Value::Productions(Vec::new()))
            .map_err(|e| e.at(*span))?;

        self.visit(body, Rc::clone(&inner))?;

        let productions = match inner.lookup(PRODUCTION_LIST) {
            Ok(Value::Productions(productions)) => productions,
            _ => Vec::new(),
        };
        let start = start
            .as_ref()
            .map(|s| s.name.clone())
            .or_else(|| productions.first().map(|p| p.head.clone()))
            .ok_or_else(|| EvaluationError::MissingStartSymbol {
                grammar: name.name.clone(),
                span: *span,
            })?;

        inner.set_result(Automaton::Grammar(Grammar::new(start, productions)));
        scope
            .define(&name.name, Value::Scope(inner))
            .map_err(|e| e.at(name.span))?;
        Ok(None)
    }

    fn visit_production(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Production {
            head,
            alternatives,
            span,
        } = node
        else {
            return Err(mismatch(NodeKind::Production, node));
        };

        let mut productions = Vec::new();
        for alternative in alternatives {
            let mut body = Vec::new();
            for item in alternative {
                match item {
                    Node::Str { value, .. } if value.is_empty() => {}
                    Node::Str { value, .. } => body.push(GrammarSymbol::Terminal(value.clone())),
                    Node::NonTerminal { name, .. } => {
                        body.push(GrammarSymbol::NonTerminal(name.clone()))
                    }
                    other => return Err(mismatch(NodeKind::NonTerminal, other)),
                }
            }
            productions.push(Production {
                head: head.clone(),
                body,
            });
        }

        scope
            .update(PRODUCTION_LIST, |value| {
                if let Value::Productions(list) = value {
                    list.extend(productions);
                }
            })
            .map_err(|e| reserved(e, "production", *span))?;
        Ok(None)
    }

    fn visit_assignment(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Assignment {
            kind, name, value, ..
        } = node
        else {
            return Err(mismatch(NodeKind::Assignment, node));
        };

        scope.declare(&name.name).map_err(|e| e.at(name.span))?;

        let automaton = self.automaton(value, Rc::clone(&scope))?;
        if automaton.kind() != Some(*kind) {
            return Err(EvaluationError::KindMismatch {
                expected: kind.name().to_string(),
                found: automaton.kind_name().to_string(),
                span: value.span(),
            });
        }

        let holder = Scope::child(&scope);
        holder.set_result(automaton);
        scope
            .define(&name.name, Value::Scope(holder))
            .map_err(|e| e.at(name.span))?;
        Ok(None)
    }

    fn visit_initial(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Initial { state, span } = node else {
            return Err(mismatch(NodeKind::Initial, node));
        };

        scope
            .define(INITIAL_STATE, Value::State(state.name.clone()))
            .map_err(|e| reserved(e, "initial", *span))?;
        Ok(None)
    }

    fn visit_final(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Final { states, span } = node else {
            return Err(mismatch(NodeKind::Final, node));
        };

        scope
            .update(FINAL_STATES, |value| {
                if let Value::States(list) = value {
                    list.extend(states.iter().map(|s| s.name.clone()));
                }
            })
            .map_err(|e| reserved(e, "final", *span))?;
        Ok(None)
    }

    fn visit_print(&mut self, node: &Node, _: Rc<Scope>) -> Evaluated {
        let Node::Print { message, .. } = node else {
            return Err(mismatch(NodeKind::Print, node));
        };

        log::info!("{}", message);
        self.output.push(message.clone());
        Ok(None)
    }

    fn visit_test(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Test {
            automaton: identifier,
            inputs,
            span,
        } = node
        else {
            return Err(mismatch(NodeKind::Test, node));
        };

        let automaton = Self::lookup_automaton(identifier, &scope)?;
        for input in inputs {
            let accepted = automaton
                .test_within(&[input.as_str()], self.options.max_layers)
                .ok_or_else(|| {
                    EvaluationError::unsupported(
                        format!("cannot test a {}", automaton.kind_name()),
                        *span,
                    )
                })??;

            log::debug!("Test {} on {:?}: {:?}", identifier.name, input, accepted);
            self.tests.push(TestOutcome {
                automaton: identifier.name.clone(),
                input: input.clone(),
                accepted,
            });
        }
        Ok(None)
    }

    fn visit_transition(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let declared = match node {
            Node::FiniteTransition {
                from,
                condition,
                to,
                span,
            } => DeclaredTransition::Finite {
                from: from.name.clone(),
                read: symbol(condition)?,
                to: to.name.clone(),
                span: *span,
            },
            Node::PushdownTransition {
                from,
                condition,
                pop,
                to,
                push,
                span,
            } => DeclaredTransition::Pushdown {
                from: from.name.clone(),
                read: symbol(condition)?,
                pop: tape_symbols(pop)?,
                to: to.name.clone(),
                push: tape_symbols(push)?,
                span: *span,
            },
            Node::TuringTransition {
                from,
                read,
                to,
                write,
                shift,
                span,
            } => DeclaredTransition::Turing {
                from: from.name.clone(),
                read: tape_symbols(read)?,
                to: to.name.clone(),
                write: tape_symbols(write)?,
                shift: shift.iter().map(tape_shift).collect::<Result<_, _>>()?,
                span: *span,
            },
            other => return Err(mismatch(NodeKind::FiniteTransition, other)),
        };

        let span = declared.span();
        scope
            .update(TRANSITION_LIST, |value| {
                if let Value::Transitions(list) = value {
                    list.push(declared);
                }
            })
            .map_err(|e| reserved(e, "transition", span))?;
        Ok(None)
    }

    fn visit_identifier(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Identifier(identifier) = node else {
            return Err(mismatch(NodeKind::Identifier, node));
        };

        Self::lookup_automaton(identifier, &scope).map(Some)
    }

    fn visit_binary(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Binary {
            op,
            left,
            right,
            span,
        } = node
        else {
            return Err(mismatch(NodeKind::Binary, node));
        };

        let left = self.automaton(left, Rc::clone(&scope))?;
        let right = self.automaton(right, scope)?;
        if left.kind_name() != right.kind_name() {
            return Err(EvaluationError::KindMismatch {
                expected: left.kind_name().to_string(),
                found: right.kind_name().to_string(),
                span: *span,
            });
        }

        let result = match (op, &left, &right) {
            (BinaryOp::Union, Automaton::Finite(a), Automaton::Finite(b)) => {
                Automaton::Finite(a.union(b)?)
            }
            (BinaryOp::Union, Automaton::Pushdown(a), Automaton::Pushdown(b)) => {
                Automaton::Pushdown(a.union(b)?)
            }
            (BinaryOp::Union, Automaton::Turing(a), Automaton::Turing(b)) => {
                Automaton::Turing(a.union(b)?)
            }
            (BinaryOp::Intersection, Automaton::Finite(a), Automaton::Finite(b)) => {
                Automaton::Finite(a.intersection(b)?)
            }
            (BinaryOp::Concatenate, Automaton::Finite(a), Automaton::Finite(b)) => {
                Automaton::Finite(a.concatenate(b)?)
            }
            _ => {
                return Err(EvaluationError::unsupported(
                    format!("'{op}' is not defined for a {}", left.kind_name()),
                    *span,
                ))
            }
        };
        Ok(Some(result))
    }

    fn visit_unary(&mut self, node: &Node, scope: Rc<Scope>) -> Evaluated {
        let Node::Unary { op, operand, span } = node else {
            return Err(mismatch(NodeKind::Unary, node));
        };

        let Automaton::Finite(machine) = self.automaton(operand, scope)? else {
            return Err(EvaluationError::unsupported(
                format!("'{op}' is only defined for a {}", Finite::NAME),
                *span,
            ));
        };

        let result = match op {
            UnaryOp::Complement => {
                if !machine.is_deterministic() {
                    log::warn!(
                        "complement of a non-deterministic automaton at {} does not invert its language",
                        span.start
                    );
                }
                machine.complement()
            }
            UnaryOp::Determinize => machine.determinize(),
            UnaryOp::Reenumerate => machine.reenumerate(default_names()),
            UnaryOp::Star => machine.star(),
            UnaryOp::Reverse => machine.reverse(),
        };
        Ok(Some(Automaton::Finite(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(source: &str) -> Result<(Rc<Scope>, Evaluator), EvaluationError> {
        let (module, _) = parse(source).unwrap();
        let mut evaluator = Evaluator::default();
        let scope = evaluator.evaluate(&module)?;
        Ok((scope, evaluator))
    }

    fn automaton(scope: &Scope, name: &str) -> Automaton {
        match scope.lookup(name).unwrap() {
            Value::Scope(inner) => inner.result().unwrap(),
            other => panic!("Expected a declaration, got {:?}", other),
        }
    }

    fn finite(scope: &Scope, name: &str) -> FiniteAutomaton {
        match automaton(scope, name) {
            Automaton::Finite(m) => m,
            other => panic!("Expected a finite automaton, got {:?}", other),
        }
    }

    fn outcomes(evaluator: &Evaluator) -> Vec<(&str, Option<bool>)> {
        evaluator
            .tests()
            .iter()
            .map(|t| (t.input.as_str(), t.accepted))
            .collect()
    }

    #[test]
    fn test_single_state_loop() {
        let (scope, _) = run("finite x { initial a  final a  a a -> a }").unwrap();
        let m = finite(&scope, "x");

        assert_eq!(m.states().len(), 1);
        assert!(m.test(""));
        assert!(m.test("aaa"));
        assert!(!m.test("ab"));
    }

    #[test]
    fn test_missing_initial_state() {
        let (module, _) = parse("finite x {\n  final a\n  a b -> a\n}").unwrap();
        let root = Scope::root();
        let error = Evaluator::default()
            .evaluate_in(&module, Rc::clone(&root))
            .unwrap_err();

        assert!(matches!(
            error,
            EvaluationError::MissingInitialState { automaton, .. } if automaton == "x"
        ));
        // The aborted declaration leaves no definition behind.
        assert!(root.binding("x").map_or(true, |b| !b.is_defined()));
        assert!(root.lookup("x").is_err());
    }

    #[test]
    fn test_evaluate_in_keeps_earlier_bindings() {
        let (module, _) = parse("finite a { initial q }\nfinite b { final q }").unwrap();
        let root = Scope::root();
        let result = Evaluator::default().evaluate_in(&module, Rc::clone(&root));

        assert!(result.is_err());
        assert!(root.binding("a").is_some_and(|b| b.is_defined()));
        assert!(root.binding("b").map_or(true, |b| !b.is_defined()));
    }

    #[test]
    fn test_evaluator_debug() {
        let (_, evaluator) = run("print \"hi\"").unwrap();
        let debug = format!("{:?}", evaluator);

        assert!(debug.starts_with("Evaluator"));
        assert!(debug.contains("hi"));
    }

    #[test]
    fn test_initial_state_defined_once() {
        let error = run("finite x {\n  initial a\n  initial b\n}").unwrap_err();

        assert!(matches!(
            error,
            EvaluationError::Redefinition { name, .. } if name == INITIAL_STATE
        ));
    }

    #[test]
    fn test_declaration_names_are_unique() {
        let error = run("finite x { initial a }\nfinite x { initial b }").unwrap_err();

        assert!(matches!(error, EvaluationError::Redefinition { name, .. } if name == "x"));
    }

    #[test]
    fn test_print_and_test_statements() {
        let source = r#"
            finite even {
                initial e
                final e
                e a -> o
                o a -> e
                e b -> e
                o b -> o
            }
            print "even a's"
            test even ["", "a", "aba", "bb"]
        "#;
        let (_, evaluator) = run(source).unwrap();

        assert_eq!(evaluator.output(), ["even a's"]);
        assert_eq!(
            outcomes(&evaluator),
            vec![
                ("", Some(true)),
                ("a", Some(false)),
                ("aba", Some(true)),
                ("bb", Some(true)),
            ]
        );
    }

    #[test]
    fn test_undecided_test_outcome() {
        let source = "finite loop {\n initial s\n final f\n s $eps -> s\n}\ntest loop \"x\"";
        let (module, _) = parse(source).unwrap();
        let mut evaluator = Evaluator::new(Options { max_layers: 5 });
        evaluator.evaluate(&module).unwrap();

        assert_eq!(evaluator.tests()[0].accepted, None);
    }

    #[test]
    fn test_expressions() {
        let source = r#"
            finite a { initial p  final q  p a -> q }
            finite b { initial p  final q  p b -> q }
            finite u = a union b
            finite c = a concatenate b
            finite s = star (a union b)
            finite n = complement determinize a
        "#;
        let (scope, _) = run(source).unwrap();

        let u = finite(&scope, "u");
        assert!(u.test("a") && u.test("b") && !u.test("ab"));
        let c = finite(&scope, "c");
        assert!(c.test("ab") && !c.test("a"));
        let s = finite(&scope, "s");
        assert!(s.test("") && s.test("abba"));
        let n = finite(&scope, "n");
        assert!(!n.test("a") && n.test(""));
    }

    #[test]
    fn test_intersection_and_reverse() {
        let source = r#"
            finite ab { initial p  final r  p a -> q  q b -> r }
            finite any {
                initial s
                final s
                s a -> s
                s b -> s
            }
            finite both = ab intersection any
            finite ba = reverse ab
            finite named = reenumerate ab
        "#;
        let (scope, _) = run(source).unwrap();

        let both = finite(&scope, "both");
        assert!(both.test("ab") && !both.test("a"));
        let ba = finite(&scope, "ba");
        assert!(ba.test("ba") && !ba.test("ab"));
        assert_eq!(finite(&scope, "named").initial(), "q0");
    }

    #[test]
    fn test_assignment_kind_must_match() {
        let error = run("finite a { initial p }\nturing t = a").unwrap_err();

        assert!(matches!(error, EvaluationError::KindMismatch { .. }));
    }

    #[test]
    fn test_unknown_name() {
        let error = run("finite z = y").unwrap_err();

        assert!(matches!(error, EvaluationError::NotDeclared { name, .. } if name == "y"));
    }

    #[test]
    fn test_name_reference_condition() {
        let error = run("finite x {\n initial a\n a abc -> a\n}").unwrap_err();

        assert!(matches!(
            error,
            EvaluationError::Unsupported { feature, .. } if feature.contains("name-reference")
        ));
    }

    #[test]
    fn test_transition_outside_automaton() {
        let error = run("q0 a -> q1").unwrap_err();

        assert!(matches!(
            error,
            EvaluationError::OutsideAutomaton { statement, .. } if statement == "transition"
        ));
        assert!(matches!(
            run("final a").unwrap_err(),
            EvaluationError::OutsideAutomaton { .. }
        ));
    }

    #[test]
    fn test_transition_kind_mismatch() {
        let error = run("finite x {\n initial a\n a b -> c push Z\n}").unwrap_err();

        assert!(matches!(error, EvaluationError::KindMismatch { .. }));
    }

    #[test]
    fn test_turing_step() {
        let (scope, _) = run("turing t {\n initial q0\n q0 0 -> q1 1 >\n}").unwrap();
        let Automaton::Turing(m) = automaton(&scope, "t") else {
            panic!("Expected a turing machine");
        };

        let start = m.initial_configuration(&["0  "]).unwrap();
        let next = m.step(&start);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].state, "q1");
        assert_eq!(next[0].tapes[0].content(), "1  ");
        assert_eq!(next[0].tapes[0].head(), 1);
    }

    #[test]
    fn test_turing_qualified_tapes() {
        let source = "turing t tapes [x, y] {\n initial q\n final f\n q [x:a] -> f [y:b] [x:>]\n}";
        let (scope, _) = run(source).unwrap();
        let Automaton::Turing(m) = automaton(&scope, "t") else {
            panic!("Expected a turing machine");
        };

        let transition = m.transitions().next().unwrap();
        assert_eq!(transition.read, vec!["a", ""]);
        assert_eq!(transition.payload.write, vec!["", "b"]);
        assert_eq!(transition.payload.shift, vec![Direction::Right, Direction::Stay]);
    }

    #[test]
    fn test_turing_tape_errors() {
        let unknown = "turing t tapes [x] {\n initial q\n q [z:a] -> q a >\n}";
        assert!(matches!(
            run(unknown).unwrap_err(),
            EvaluationError::UnknownTape { tape, .. } if tape == "z"
        ));

        let too_many = "turing t {\n initial q\n q [a, b] -> q [a, b] [>, >]\n}";
        assert!(matches!(
            run(too_many).unwrap_err(),
            EvaluationError::TooManyTapes { expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn test_pushdown_balanced() {
        let source = r#"
            pushdown p {
                initial qs
                final qf
                qs $eps -> q0 push Z
                q0 a -> q0 push A
                q0 $eps -> q1 push $eps
                q1 b pop A -> q1
                q1 $eps pop Z -> qf
            }
            test p ["", "ab", "aabb", "aab", "ba"]
        "#;
        let (_, evaluator) = run(source).unwrap();

        assert_eq!(
            outcomes(&evaluator),
            vec![
                ("", Some(true)),
                ("ab", Some(true)),
                ("aabb", Some(true)),
                ("aab", Some(false)),
                ("ba", Some(false)),
            ]
        );
    }

    #[test]
    fn test_grammar() {
        let source = "grammar g {\n <S> -> \"a\" <S> \"b\" | \"\"\n}";
        let (scope, _) = run(source).unwrap();
        let Automaton::Grammar(g) = automaton(&scope, "g") else {
            panic!("Expected a grammar");
        };

        assert_eq!(g.start, "S");
        assert_eq!(g.productions.len(), 2);
        assert!(g.productions[1].body.is_empty());
    }

    #[test]
    fn test_grammar_without_start_symbol() {
        let error = run("grammar g {\n}").unwrap_err();

        assert!(matches!(error, EvaluationError::MissingStartSymbol { .. }));
    }

    #[test]
    fn test_union_of_turing_machines_is_supported() {
        let source = r#"
            turing a { initial p  final q  p a -> q a - }
            turing b { initial p  final q  p b -> q b - }
            turing u = a union b
            test u ["a", "b", "c"]
        "#;
        let (_, evaluator) = run(source).unwrap();

        assert_eq!(
            outcomes(&evaluator),
            vec![("a", Some(true)), ("b", Some(true)), ("c", Some(false))]
        );
    }

    #[test]
    fn test_finite_only_operators() {
        let source = "turing a { initial p }\nturing b = star a";
        assert!(matches!(
            run(source).unwrap_err(),
            EvaluationError::Unsupported { .. }
        ));
    }

    #[test]
    fn test_registered_handler_overrides() {
        fn silent(_: &mut Evaluator, _: &Node, _: Rc<Scope>) -> Evaluated {
            Ok(None)
        }

        let (module, _) = parse("print \"hidden\"").unwrap();
        let mut evaluator = Evaluator::default();
        evaluator.register(Target::Kind(NodeKind::Print), silent);
        evaluator.evaluate(&module).unwrap();

        assert!(evaluator.output().is_empty());
    }
}
