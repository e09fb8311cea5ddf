//! Multi-tape Turing machines.

use crate::machine::{MachineKind, StateMachine};
use crate::tape::Tape;
use crate::types::{Direction, Symbol, EPSILON};
use serde::{Deserialize, Serialize};

/// Marker for Turing machines: transitions write and move every head; tapes are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turing;

pub type TuringMachine = StateMachine<Turing>;

/// What a Turing transition does to each tape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TuringAction {
    /// The symbol written under each head. Epsilon leaves the cell unchanged.
    pub write: Vec<Symbol>,
    pub shift: Vec<Direction>,
}

impl MachineKind for Turing {
    type Payload = TuringAction;

    const NAME: &'static str = "turing machine";
    const BOUNDED: bool = false;

    fn neutral(tapes: usize) -> Self::Payload {
        TuringAction {
            write: vec![EPSILON.to_string(); tapes],
            shift: vec![Direction::Stay; tapes],
        }
    }

    fn fits(payload: &Self::Payload, tapes: usize) -> bool {
        payload.write.len() == tapes && payload.shift.len() == tapes
    }

    fn apply(tapes: &mut [Tape], _pattern: &[Symbol], payload: &Self::Payload) {
        for ((tape, write), shift) in tapes.iter_mut().zip(&payload.write).zip(&payload.shift) {
            if write != EPSILON {
                tape.write(write);
            }
            tape.shift(shift.offset());
        }
    }

    fn is_accepting(is_final: bool, _tapes: &[Tape]) -> bool {
        is_final
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{MachineDefinition, Transition};
    use crate::types::{MachineError, BLANK};

    fn rule(from: &str, read: &[&str], to: &str, write: &[&str], shift: &[Direction]) -> Transition<TuringAction> {
        Transition {
            from: from.into(),
            read: read.iter().map(|s| s.to_string()).collect(),
            to: to.into(),
            payload: TuringAction {
                write: write.iter().map(|s| s.to_string()).collect(),
                shift: shift.to_vec(),
            },
        }
    }

    #[test]
    fn test_single_tape_step() {
        let mut definition = MachineDefinition::new("q0", Turing::BOUNDED);
        definition.transitions = vec![rule("q0", &["0"], "q1", &["1"], &[Direction::Right])];
        let m = TuringMachine::new(definition).unwrap();

        let start = m.initial_configuration(&["0  "]).unwrap();
        let successors = m.step(&start);

        assert_eq!(successors.len(), 1);
        let next = &successors[0];
        assert_eq!(next.state, "q1");
        assert_eq!(next.tapes[0].content(), "1  ");
        assert_eq!(next.tapes[0].head(), 1);
    }

    #[test]
    fn test_accepts_in_final_state_regardless_of_head() {
        // Replaces every 'a' with 'b' and halts on the first blank.
        let mut definition = MachineDefinition::new("scan", false);
        definition.finals.insert("done".into());
        definition.transitions = vec![
            rule("scan", &["a"], "scan", &["b"], &[Direction::Right]),
            rule("scan", &[BLANK], "done", &[""], &[Direction::Left]),
        ];
        let m = TuringMachine::new(definition).unwrap();

        assert!(m.test("aaa"));
        assert!(m.test(""));
        assert!(!m.test("abc"));

        let last = m.compute(&["aa"]).unwrap().last().unwrap();
        assert_eq!(last[0].state, "done");
        assert_eq!(last[0].tapes[0].content().trim_end(), "bb");
    }

    #[test]
    fn test_multi_tape_copy() {
        // Copies tape 0 onto tape 1.
        let mut definition = MachineDefinition::new("copy", false);
        definition.tapes = vec!["input".into(), "output".into()];
        definition.finals.insert("done".into());
        definition.transitions = vec![
            rule("copy", &["a", ""], "copy", &["", "a"], &[Direction::Right, Direction::Right]),
            rule("copy", &["b", ""], "copy", &["", "b"], &[Direction::Right, Direction::Right]),
            rule("copy", &[BLANK, BLANK], "done", &["", ""], &[Direction::Stay, Direction::Stay]),
        ];
        let m = TuringMachine::new(definition).unwrap();

        let last = m.compute(&["abba"]).unwrap().last().unwrap();
        assert!(last[0].accepted);
        assert_eq!(last[0].tapes[1].content().trim_end(), "abba");
    }

    #[test]
    fn test_payload_must_address_every_tape() {
        let mut definition = MachineDefinition::new("q0", false);
        definition.transitions = vec![rule("q0", &["a"], "q1", &["b", "c"], &[Direction::Right])];

        assert!(matches!(
            TuringMachine::new(definition),
            Err(MachineError::TapeCount { .. })
        ));
    }

    #[test]
    fn test_union_requires_equal_tapes() {
        let single = TuringMachine::new(MachineDefinition::new("q0", false)).unwrap();
        let mut definition = MachineDefinition::new("q0", false);
        definition.tapes = vec!["a".into(), "b".into()];
        let double = TuringMachine::new(definition).unwrap();

        assert!(matches!(
            single.union(&double),
            Err(MachineError::IncompatibleTapes { left: 1, right: 2 })
        ));
    }

    #[test]
    fn test_union_of_turing_machines() {
        let mut a = MachineDefinition::new("q0", false);
        a.finals.insert("yes".into());
        a.transitions = vec![rule("q0", &["a"], "yes", &[""], &[Direction::Stay])];
        let mut b = MachineDefinition::new("q0", false);
        b.finals.insert("yes".into());
        b.transitions = vec![rule("q0", &["b"], "yes", &[""], &[Direction::Stay])];

        let u = TuringMachine::new(a).unwrap().union(&TuringMachine::new(b).unwrap()).unwrap();
        assert!(u.test("a"));
        assert!(u.test("b"));
        assert!(!u.test("c"));
    }

    #[test]
    fn test_identical_actions_collapse() {
        let mut definition = MachineDefinition::new("q", Turing::BOUNDED);
        definition.transitions = vec![
            rule("q", &["a"], "q", &["b"], &[Direction::Stay]),
            rule("q", &["a"], "q", &["b"], &[Direction::Stay]),
            rule("q", &["a"], "q", &["c"], &[Direction::Stay]),
        ];
        let m = TuringMachine::new(definition).unwrap();

        assert_eq!(m.transitions().count(), 2);

        let start = m.initial_configuration(&["a"]).unwrap();
        let mut written: Vec<String> = m.step(&start).iter().map(|c| c.tapes[0].content()).collect();
        written.sort();
        assert_eq!(written, vec!["b", "c"]);
    }

    #[test]
    fn test_actions_differing_in_shift_are_kept() {
        let mut definition = MachineDefinition::new("q", Turing::BOUNDED);
        definition.transitions = vec![
            rule("q", &["a"], "q", &["b"], &[Direction::Right]),
            rule("q", &["a"], "q", &["b"], &[Direction::Stay]),
        ];
        let m = TuringMachine::new(definition).unwrap();

        assert_eq!(m.transitions().count(), 2);
    }
}
