//! This module converts compiler and engine values to and from a type-tagged JSON form, and
//! exports Turing machines in the numbered-state layout used by XML interchange formats.

use crate::evaluator::{Automaton, TestOutcome};
use crate::finite::FiniteAutomaton;
use crate::grammar::Grammar;
use crate::graph::Graph;
use crate::machine::Configuration;
use crate::pushdown::PushdownAutomaton;
use crate::token::Token;
use crate::turing::TuringMachine;
use crate::types::{Direction, State, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, HashMap};

/// Every value that can cross a process boundary, tagged by its `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Tagged {
    FiniteAutomaton(FiniteAutomaton),
    PushdownAutomaton(PushdownAutomaton),
    TuringMachine(TuringMachine),
    Grammar(Grammar),
    Token(Token),
    Configuration(Configuration),
    TestOutcome(TestOutcome),
    Graph(Graph),
}

impl From<Automaton> for Tagged {
    fn from(automaton: Automaton) -> Self {
        match automaton {
            Automaton::Finite(m) => Tagged::FiniteAutomaton(m),
            Automaton::Pushdown(m) => Tagged::PushdownAutomaton(m),
            Automaton::Turing(m) => Tagged::TuringMachine(m),
            Automaton::Grammar(g) => Tagged::Grammar(g),
        }
    }
}

/// Encodes a value as JSON with a `"type"` field naming its variant.
///
/// # Arguments
///
/// * `value` - The value to encode.
///
/// # Returns
///
/// * `Ok(String)` - The JSON text.
/// * `Err(serde_json::Error)` - If the value cannot be represented.
pub fn encode(value: &Tagged) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Decodes JSON produced by [`encode`].
///
/// Machines are rebuilt from their definitions, so derived data such as the alphabet and
/// epsilon closures is recomputed and invalid definitions are rejected.
pub fn decode(encoded: &str) -> Result<Tagged, serde_json::Error> {
    serde_json::from_str(encoded)
}

/// A Turing machine with numbered states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuringExport {
    pub tapes: usize,
    pub states: Vec<ExportedState>,
    pub transitions: Vec<ExportedTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedState {
    pub id: usize,
    pub name: State,
    pub initial: bool,
    #[serde(rename = "final")]
    pub accepting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTransition {
    pub from: usize,
    pub to: usize,
    /// One entry per tape, in tape order.
    pub tapes: Vec<ExportedTape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTape {
    pub read: Symbol,
    pub write: Symbol,
    /// `L`, `R` or `S`.
    pub shift: char,
}

/// Exports a Turing machine with its states numbered from 0.
///
/// The initial state is always 0; the remaining states follow in name order.
pub fn export_turing(machine: &TuringMachine) -> TuringExport {
    let state_mapping = create_state_mapping(machine);
    let id = |state: &State| state_mapping.get(state).copied().unwrap_or_default();

    let mut states: Vec<ExportedState> = machine
        .states()
        .iter()
        .map(|state| ExportedState {
            id: id(state),
            name: state.clone(),
            initial: state == machine.initial(),
            accepting: machine.finals().contains(state),
        })
        .collect();
    states.sort_by_key(|state| state.id);

    let transitions = machine
        .transitions()
        .map(|transition| ExportedTransition {
            from: id(&transition.from),
            to: id(&transition.to),
            tapes: transition
                .read
                .iter()
                .zip(&transition.payload.write)
                .zip(&transition.payload.shift)
                .map(|((read, write), shift)| ExportedTape {
                    read: read.clone(),
                    write: write.clone(),
                    shift: shift_char(*shift),
                })
                .collect(),
        })
        .collect();

    TuringExport {
        tapes: machine.tapes().len(),
        states,
        transitions,
    }
}

/// Creates a mapping from state names to numeric identifiers.
fn create_state_mapping(machine: &TuringMachine) -> HashMap<State, usize> {
    let mut mapping = HashMap::new();

    // Always map initial state to 0
    mapping.insert(machine.initial().clone(), 0);
    let mut counter = 1;

    for state in machine.states() {
        if let Entry::Vacant(e) = mapping.entry(state.clone()) {
            e.insert(counter);
            counter += 1;
        }
    }

    mapping
}

fn shift_char(direction: Direction) -> char {
    match direction {
        Direction::Left => 'L',
        Direction::Right => 'R',
        Direction::Stay => 'S',
    }
}
