//! Finite automata and the operations only they support: determinization, complement,
//! intersection, concatenation, Kleene star and reversal.

use crate::analyzer;
use crate::machine::{
    encode_composite, fresh_name, MachineDefinition, MachineKind, StateMachine, Transition,
};
use crate::tape::Tape;
use crate::types::{MachineError, State, Symbol, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Marker for finite automata: transitions carry no payload and tapes are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finite;

pub type FiniteAutomaton = StateMachine<Finite>;

impl MachineKind for Finite {
    type Payload = ();

    const NAME: &'static str = "finite automaton";
    const BOUNDED: bool = true;

    fn neutral(_tapes: usize) -> Self::Payload {}

    /// Each tape moves past the symbol its pattern read; epsilon reads do not move.
    fn apply(tapes: &mut [Tape], pattern: &[Symbol], _payload: &Self::Payload) {
        for (tape, symbol) in tapes.iter_mut().zip(pattern) {
            tape.shift(symbol.chars().count() as isize);
        }
    }

    fn is_accepting(is_final: bool, tapes: &[Tape]) -> bool {
        is_final && tapes.iter().all(Tape::is_at_end)
    }
}

impl FiniteAutomaton {
    /// Subset construction.
    ///
    /// Returns the deterministic machine and the set of original states behind each of its
    /// composite states.
    fn subsets(&self) -> (Self, BTreeMap<State, BTreeSet<State>>) {
        let tapes = self.tapes().len();
        let start = self.epsilon_closure(self.initial());
        let initial = encode_composite(&start);

        let mut composites = BTreeMap::from([(initial.clone(), start.clone())]);
        let mut queue = VecDeque::from([start]);
        let mut transitions = Vec::new();

        while let Some(current) = queue.pop_front() {
            let from = encode_composite(&current);

            for symbol in self.alphabet() {
                let read = vec![symbol.clone(); tapes];
                let mut next = BTreeSet::new();

                for state in &current {
                    let Some(by_pattern) = self.transition_map().get(state) else {
                        continue;
                    };
                    for (pattern, targets) in by_pattern {
                        if !Self::matches(pattern, &read, true) {
                            continue;
                        }
                        for target in targets {
                            next.extend(self.epsilon_closure(&target.to));
                        }
                    }
                }

                if next.is_empty() {
                    continue;
                }

                let to = encode_composite(&next);
                transitions.push(Transition {
                    from: from.clone(),
                    read,
                    to: to.clone(),
                    payload: (),
                });
                if !composites.contains_key(&to) {
                    composites.insert(to, next.clone());
                    queue.push_back(next);
                }
            }
        }

        let finals = composites
            .iter()
            .filter(|(_, set)| !set.is_disjoint(self.finals()))
            .map(|(name, _)| name.clone())
            .collect();

        let machine = Self::build(MachineDefinition {
            transitions,
            initial,
            finals,
            tapes: self.tapes().to_vec(),
            states: BTreeSet::new(),
            alphabet: self.alphabet().clone(),
            bounded: self.is_bounded(),
        });

        (machine, composites)
    }

    /// Returns an equivalent deterministic automaton whose states are sorted, comma-joined
    /// sets of this automaton's states.
    pub fn determinize(&self) -> Self {
        self.subsets().0
    }

    /// Swaps final and non-final states.
    ///
    /// Only inverts the language of a deterministic automaton with a transition for every
    /// state and symbol.
    pub fn complement(&self) -> Self {
        let mut definition = self.definition();
        definition.finals = self.states().difference(self.finals()).cloned().collect();
        Self::build(definition)
    }

    /// Accepts the words both automata accept.
    ///
    /// Determinizes the union of both operands; a composite state is final when it holds a
    /// final state of each operand. Requiring every constituent to be final would reject
    /// words whose subset also tracks a non-final branch, so the result would accept less
    /// than `L(a) ∩ L(b)`.
    pub fn intersection(&self, other: &Self) -> Result<Self, MachineError> {
        let (union, mapping) = self.union_with_mapping(other)?;
        let other_finals: BTreeSet<State> = other
            .finals()
            .iter()
            .filter_map(|state| mapping.get(state).cloned())
            .collect();

        let (deterministic, composites) = union.subsets();

        let mut definition = deterministic.definition();
        definition.finals = composites
            .iter()
            .filter(|(_, set)| !set.is_disjoint(self.finals()) && !set.is_disjoint(&other_finals))
            .map(|(name, _)| name.clone())
            .collect();

        Ok(Self::build(definition))
    }

    /// Accepts a word of this automaton followed by a word of `other`.
    pub fn concatenate(&self, other: &Self) -> Result<Self, MachineError> {
        if self.tapes().len() != other.tapes().len() {
            return Err(MachineError::IncompatibleTapes {
                left: self.tapes().len(),
                right: other.tapes().len(),
            });
        }

        let mapping = self.remap_apart(other);
        let second = &mapping[other.initial()];

        let mut transitions: Vec<_> = self.transitions().collect();
        transitions.extend(Self::renamed(other.transitions(), &mapping));
        for state in self.finals() {
            transitions.push(self.epsilon_transition(state, second));
        }

        let mut states = self.states().clone();
        states.extend(mapping.values().cloned());

        Ok(Self::build(MachineDefinition {
            transitions,
            initial: self.initial().clone(),
            finals: other.finals().iter().map(|s| mapping[s].clone()).collect(),
            tapes: self.tapes().to_vec(),
            states,
            alphabet: self.alphabet().union(other.alphabet()).cloned().collect(),
            bounded: self.is_bounded(),
        }))
    }

    /// Accepts any number of words of this automaton, including none.
    pub fn star(&self) -> Self {
        let start = fresh_name(self.initial(), |s| self.states().contains(s));

        let mut transitions: Vec<_> = self.transitions().collect();
        transitions.push(self.epsilon_transition(&start, self.initial()));
        for state in self.finals() {
            transitions.push(self.epsilon_transition(state, &start));
        }

        let mut definition = self.definition();
        definition.transitions = transitions;
        definition.finals.insert(start.clone());
        definition.initial = start;
        Self::build(definition)
    }

    /// Accepts the reversed words of this automaton.
    ///
    /// Every transition is turned around and multi-character symbols are reversed; a fresh
    /// initial state branches into the former final states.
    pub fn reverse(&self) -> Self {
        let start = fresh_name(self.initial(), |s| self.states().contains(s));

        let mut transitions: Vec<_> = self
            .transitions()
            .map(|t| Transition {
                from: t.to,
                read: t.read.iter().map(|s| s.chars().rev().collect()).collect(),
                to: t.from,
                payload: (),
            })
            .collect();
        for state in self.finals() {
            transitions.push(self.epsilon_transition(&start, state));
        }

        Self::build(MachineDefinition {
            transitions,
            initial: start,
            finals: BTreeSet::from([self.initial().clone()]),
            tapes: self.tapes().to_vec(),
            states: self.states().clone(),
            alphabet: self
                .alphabet()
                .iter()
                .map(|s| s.chars().rev().collect())
                .collect(),
            bounded: self.is_bounded(),
        })
    }

    /// Returns true if no state has two ways to continue on the same symbol and no epsilon
    /// transitions exist.
    pub fn is_deterministic(&self) -> bool {
        analyzer::is_deterministic(self)
            && self
                .transition_map()
                .values()
                .flat_map(|by_pattern| by_pattern.keys())
                .all(|pattern| pattern.iter().any(|s| s != EPSILON))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    /// Words over {a, b} with an even number of a's (total DFA).
    fn even_a() -> FiniteAutomaton {
        machine(
            "a0",
            &["a0"],
            &[
                ("a0", "a", "a1"),
                ("a0", "b", "a0"),
                ("a1", "a", "a0"),
                ("a1", "b", "a1"),
            ],
        )
    }

    /// Words over {a, b} ending in "ab" (non-deterministic).
    fn ends_ab() -> FiniteAutomaton {
        machine(
            "s",
            &["f"],
            &[("s", "a", "s"), ("s", "b", "s"), ("s", "a", "m"), ("m", "b", "f")],
        )
    }

    /// Words over {a, b} containing at least one b, written with epsilon moves.
    fn has_b() -> FiniteAutomaton {
        machine(
            "p",
            &["r"],
            &[
                ("p", "", "q"),
                ("q", "a", "q"),
                ("q", "b", "r"),
                ("r", "a", "r"),
                ("r", "b", "r"),
            ],
        )
    }

    const SAMPLES: &[&str] = &[
        "", "a", "b", "aa", "ab", "ba", "bb", "aab", "aba", "abab", "bbab", "babb", "aaaa",
        "abba",
    ];

    #[test]
    fn test_determinize_preserves_language() {
        for m in [even_a(), ends_ab(), has_b()] {
            let d = m.determinize();
            assert!(d.is_deterministic());
            for input in SAMPLES {
                assert_eq!(d.test(input), m.test(input), "input {input:?}");
            }
        }
    }

    #[test]
    fn test_determinize_composite_states() {
        let d = has_b().determinize();

        assert_eq!(d.initial(), "p,q");
        assert!(d.finals().contains("r"));
        assert!(d.states().iter().all(|s| s == "p,q" || s == "q" || s == "r"));
    }

    #[test]
    fn test_complement_inverts_total_dfa() {
        let m = even_a();
        let c = m.complement();

        for input in SAMPLES {
            assert_eq!(c.test(input), !m.test(input), "input {input:?}");
        }
    }

    #[test]
    fn test_intersection() {
        let pairs = [(even_a(), ends_ab()), (ends_ab(), has_b()), (even_a(), even_a())];

        for (a, b) in pairs {
            let i = a.intersection(&b).unwrap();
            for input in SAMPLES {
                assert_eq!(
                    i.test(input),
                    a.test(input) && b.test(input),
                    "input {input:?}"
                );
            }
        }
    }

    #[test]
    fn test_concatenate() {
        let a = machine("x", &["y"], &[("x", "a", "y")]);
        let b = machine("x", &["y"], &[("x", "b", "y")]);
        let c = a.concatenate(&b).unwrap();

        assert!(c.test("ab"));
        assert!(!c.test("a"));
        assert!(!c.test("ba"));
        assert!(!c.test("abb"));
    }

    #[test]
    fn test_star() {
        let ab = machine("x", &["z"], &[("x", "a", "y"), ("y", "b", "z")]);
        let s = ab.star();

        for accepted in ["", "ab", "abab", "ababab"] {
            assert!(s.test(accepted), "should accept {accepted:?}");
        }
        for rejected in ["a", "aba", "ba", "abb"] {
            assert!(!s.test(rejected), "should reject {rejected:?}");
        }
    }

    #[test]
    fn test_reverse() {
        let m = ends_ab();
        let r = m.reverse();

        for input in SAMPLES {
            let reversed: String = input.chars().rev().collect();
            assert_eq!(r.test(input), m.test(&reversed), "input {input:?}");
        }
    }

    #[test]
    fn test_reverse_multi_character_symbols() {
        let m = machine("x", &["y"], &[("x", "abc", "y")]);
        let r = m.reverse();

        assert!(r.test("cba"));
        assert!(!r.test("abc"));
    }

    #[test]
    fn test_operations_do_not_mutate_operands() {
        let m = ends_ab();
        let before = m.clone();

        let _ = m.determinize();
        let _ = m.complement();
        let _ = m.star();
        let _ = m.union(&even_a()).unwrap();
        assert_eq!(m, before);
    }
}
