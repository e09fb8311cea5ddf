//! A read-only graph view of a machine for renderers.
//!
//! Nodes are states; parallel transitions between the same pair of states are merged into
//! one edge carrying every label.

use crate::evaluator::Automaton;
use crate::finite::Finite;
use crate::machine::{MachineKind, StateMachine};
use crate::pushdown::{Pushdown, StackAction};
use crate::turing::{Turing, TuringAction};
use crate::types::{State, Symbol, BLANK, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: State,
    pub initial: bool,
    pub accepting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: State,
    pub to: State,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// How a transition of a machine variant is written on an edge.
pub trait EdgeLabel: MachineKind {
    fn label(read: &[Symbol], payload: &Self::Payload) -> String;
}

/// Writes a symbol the way it would be written in a program.
fn display_symbol(symbol: &str) -> String {
    match symbol {
        EPSILON => "$eps".to_string(),
        BLANK => "$blank".to_string(),
        other => other.to_string(),
    }
}

fn display_symbols(symbols: &[Symbol]) -> String {
    let symbols: Vec<_> = symbols.iter().map(|s| display_symbol(s)).collect();
    match symbols.as_slice() {
        [single] => single.clone(),
        many => format!("[{}]", many.join(", ")),
    }
}

impl EdgeLabel for Finite {
    fn label(read: &[Symbol], _: &()) -> String {
        display_symbols(read)
    }
}

impl EdgeLabel for Pushdown {
    fn label(read: &[Symbol], payload: &StackAction) -> String {
        let (input, pop) = read.split_first().map_or((EPSILON, &[][..]), |(i, p)| (i.as_str(), p));
        let mut label = display_symbol(input);
        if pop.iter().any(|s| s != EPSILON) {
            label.push_str(&format!(" pop {}", display_symbols(pop)));
        }
        if payload.push.iter().any(|s| s != EPSILON) {
            label.push_str(&format!(" push {}", display_symbols(&payload.push)));
        }
        label
    }
}

impl EdgeLabel for Turing {
    fn label(read: &[Symbol], payload: &TuringAction) -> String {
        let shifts: Vec<String> = payload.shift.iter().map(|d| d.as_char().to_string()).collect();
        let shifts = match shifts.as_slice() {
            [single] => single.clone(),
            many => format!("[{}]", many.join(", ")),
        };
        format!(
            "{} / {} {}",
            display_symbols(read),
            display_symbols(&payload.write),
            shifts
        )
    }
}

impl Graph {
    pub fn from_machine<K: EdgeLabel>(machine: &StateMachine<K>) -> Self {
        let nodes = machine
            .states()
            .iter()
            .map(|state| GraphNode {
                id: state.clone(),
                initial: state == machine.initial(),
                accepting: machine.finals().contains(state),
            })
            .collect();

        let mut merged: BTreeMap<(State, State), Vec<String>> = BTreeMap::new();
        for transition in machine.transitions() {
            merged
                .entry((transition.from, transition.to))
                .or_default()
                .push(K::label(&transition.read, &transition.payload));
        }

        let edges = merged
            .into_iter()
            .map(|((from, to), labels)| GraphEdge { from, to, labels })
            .collect();

        Graph { nodes, edges }
    }

    /// The graph of a machine; grammars have none.
    pub fn from_automaton(automaton: &Automaton) -> Option<Self> {
        match automaton {
            Automaton::Finite(m) => Some(Self::from_machine(m)),
            Automaton::Pushdown(m) => Some(Self::from_machine(m)),
            Automaton::Turing(m) => Some(Self::from_machine(m)),
            Automaton::Grammar(_) => None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}
