//! This module provides functions for analyzing state machines to detect common mistakes
//! before they are run. This includes checks for unreachable states, states that can never
//! lead to acceptance, missing final states and non-deterministic choices.

use crate::evaluator::Automaton;
use crate::machine::{MachineKind, StateMachine};
use crate::types::{State, Symbol, EPSILON};
use std::collections::BTreeSet;
use std::fmt;

/// Represents the issues the analysis can find in a machine.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Finding {
    /// States that cannot be reached from the initial state.
    UnreachableStates(Vec<State>),
    /// States from which no final state can be reached.
    DeadStates(Vec<State>),
    /// States with more than one way to continue on the same read.
    NonDeterministic(Vec<State>),
    /// The machine has no final states and accepts nothing.
    NoFinalStates,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::UnreachableStates(states) => {
                write!(f, "Unreachable states: {}", states.join(", "))
            }
            Finding::DeadStates(states) => {
                write!(f, "States that cannot reach a final state: {}", states.join(", "))
            }
            Finding::NonDeterministic(states) => {
                write!(f, "Non-deterministic states: {}", states.join(", "))
            }
            Finding::NoFinalStates => write!(f, "No final states"),
        }
    }
}

/// Analyzes a machine for structural issues.
///
/// # Arguments
///
/// * `machine` - The machine to be analyzed.
///
/// # Returns
///
/// * Every finding, in a fixed order. An empty vector means nothing suspicious was found.
pub fn analyze<K: MachineKind>(machine: &StateMachine<K>) -> Vec<Finding> {
    let checks: [fn(&StateMachine<K>) -> Option<Finding>; 4] = [
        check_final_states,
        check_unreachable_states,
        check_dead_states,
        check_determinism,
    ];

    let findings: Vec<Finding> = checks.iter().filter_map(|check| check(machine)).collect();
    for finding in &findings {
        log::debug!("{}: {}", K::NAME, finding);
    }
    findings
}

/// Analyzes any machine; grammars have nothing to check.
pub fn analyze_automaton(automaton: &Automaton) -> Vec<Finding> {
    match automaton {
        Automaton::Finite(m) => analyze(m),
        Automaton::Pushdown(m) => analyze(m),
        Automaton::Turing(m) => analyze(m),
        Automaton::Grammar(_) => Vec::new(),
    }
}

/// Returns true if no state has two transitions that can fire on the same read.
///
/// Two read patterns overlap when every tape position holds equal symbols or an epsilon
/// on either side.
pub fn is_deterministic<K: MachineKind>(machine: &StateMachine<K>) -> bool {
    non_deterministic_states(machine).is_empty()
}

fn overlaps(a: &[Symbol], b: &[Symbol]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x == y || x == EPSILON || y == EPSILON)
}

fn non_deterministic_states<K: MachineKind>(machine: &StateMachine<K>) -> Vec<State> {
    machine
        .transition_map()
        .iter()
        .filter(|(_, by_pattern)| {
            let patterns: Vec<_> = by_pattern.keys().collect();
            by_pattern.values().any(|targets| targets.len() > 1)
                || patterns.iter().enumerate().any(|(i, a)| {
                    patterns[i + 1..].iter().any(|b| overlaps(a, b))
                })
        })
        .map(|(state, _)| state.clone())
        .collect()
}

/// Checks that the machine has at least one final state.
fn check_final_states<K: MachineKind>(machine: &StateMachine<K>) -> Option<Finding> {
    machine.finals().is_empty().then_some(Finding::NoFinalStates)
}

/// Checks for states that cannot be reached from the initial state.
fn check_unreachable_states<K: MachineKind>(machine: &StateMachine<K>) -> Option<Finding> {
    let reachable = machine.get_reachable(machine.initial(), None);
    let unreachable: Vec<State> = machine.states().difference(&reachable).cloned().collect();

    (!unreachable.is_empty()).then_some(Finding::UnreachableStates(unreachable))
}

/// Checks for states from which no final state is reachable.
///
/// Skipped when there are no final states at all, which [`check_final_states`] reports.
fn check_dead_states<K: MachineKind>(machine: &StateMachine<K>) -> Option<Finding> {
    if machine.finals().is_empty() {
        return None;
    }

    let dead: Vec<State> = machine
        .states()
        .iter()
        .filter(|state| {
            let reachable: BTreeSet<State> = machine.get_reachable(state, None);
            reachable.is_disjoint(machine.finals())
        })
        .cloned()
        .collect();

    (!dead.is_empty()).then_some(Finding::DeadStates(dead))
}

/// Checks for states with overlapping transitions.
fn check_determinism<K: MachineKind>(machine: &StateMachine<K>) -> Option<Finding> {
    let states = non_deterministic_states(machine);
    (!states.is_empty()).then_some(Finding::NonDeterministic(states))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite::FiniteAutomaton;
    use crate::machine::{MachineDefinition, Transition};

    fn machine(initial: &str, finals: &[&str], rules: &[(&str, &str, &str)]) -> FiniteAutomaton {
        let mut definition = MachineDefinition::new(initial, true);
        definition.finals = finals.iter().map(|s| s.to_string()).collect();
        definition.transitions = rules
            .iter()
            .map(|(from, read, to)| Transition {
                from: from.to_string(),
                read: vec![read.to_string()],
                to: to.to_string(),
                payload: (),
            })
            .collect();
        FiniteAutomaton::new(definition).unwrap()
    }

    #[test]
    fn test_clean_machine() {
        let m = machine("a", &["b"], &[("a", "x", "b"), ("b", "x", "a")]);

        assert!(analyze(&m).is_empty());
        assert!(is_deterministic(&m));
    }

    #[test]
    fn test_no_final_states() {
        let m = machine("a", &[], &[("a", "x", "b")]);

        assert_eq!(analyze(&m), vec![Finding::NoFinalStates]);
    }

    #[test]
    fn test_unreachable_and_dead_states() {
        let m = machine(
            "a",
            &["b"],
            &[("a", "x", "b"), ("a", "y", "trap"), ("orphan", "x", "b")],
        );

        let findings = analyze(&m);
        assert!(findings.contains(&Finding::UnreachableStates(vec!["orphan".into()])));
        assert!(findings.contains(&Finding::DeadStates(vec!["trap".into()])));
    }

    #[test]
    fn test_non_determinism() {
        let split = machine("a", &["b"], &[("a", "x", "b"), ("a", "x", "c")]);
        assert_eq!(
            check_determinism(&split),
            Some(Finding::NonDeterministic(vec!["a".into()]))
        );

        let epsilon = machine("a", &["b"], &[("a", "", "b"), ("a", "x", "b")]);
        assert!(!is_deterministic(&epsilon));
    }

    #[test]
    fn test_analyze_declared_automata() {
        let evaluation = crate::compiler::evaluate(
            "turing t {\n initial q\n q a -> r a >\n}\ngrammar g {\n <S> -> \"a\"\n}",
        )
        .unwrap();

        let findings = analyze_automaton(&evaluation.automaton("t").unwrap());
        assert_eq!(findings, vec![Finding::NoFinalStates]);
        assert!(analyze_automaton(&evaluation.automaton("g").unwrap()).is_empty());
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding::UnreachableStates(vec!["p".into(), "q".into()]);
        assert_eq!(finding.to_string(), "Unreachable states: p, q");
    }
}
