//! Pushdown automata with any number of stacks.
//!
//! Tape 0 is the read-only input. Every further tape is a stack whose front is its top.
//! A transition reads the next input symbol and the top character of each stack; a
//! non-epsilon stack symbol in the pattern pops it, and the payload pushes one string per
//! stack.

use crate::machine::{MachineKind, StateMachine};
use crate::tape::Tape;
use crate::types::{Symbol, EPSILON};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pushdown;

pub type PushdownAutomaton = StateMachine<Pushdown>;

/// What a pushdown transition pushes, one string per stack. The first character of each
/// string ends up on top.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackAction {
    pub push: Vec<Symbol>,
}

impl MachineKind for Pushdown {
    type Payload = StackAction;

    const NAME: &'static str = "pushdown automaton";
    const BOUNDED: bool = true;

    fn neutral(tapes: usize) -> Self::Payload {
        StackAction {
            push: vec![EPSILON.to_string(); tapes.saturating_sub(1)],
        }
    }

    fn fits(payload: &Self::Payload, tapes: usize) -> bool {
        payload.push.len() + 1 == tapes
    }

    fn load(_index: usize, content: &str, _bounded: bool) -> Tape {
        Tape::new(content, true)
    }

    fn read(tapes: &[Tape], width: usize) -> Vec<Symbol> {
        tapes
            .iter()
            .enumerate()
            .map(|(i, tape)| tape.read(if i == 0 { width } else { 1 }))
            .collect()
    }

    fn apply(tapes: &mut [Tape], pattern: &[Symbol], payload: &Self::Payload) {
        let Some((input, stacks)) = tapes.split_first_mut() else {
            return;
        };
        if let Some(symbol) = pattern.first() {
            input.shift(symbol.chars().count() as isize);
        }

        for ((stack, pop), push) in stacks.iter_mut().zip(&pattern[1..]).zip(&payload.push) {
            stack.pop_front(pop.chars().count());
            stack.push_front(push);
        }
    }

    fn is_accepting(is_final: bool, tapes: &[Tape]) -> bool {
        is_final && tapes.first().is_none_or(Tape::is_at_end)
    }
}
