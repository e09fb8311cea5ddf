//! This module defines the generic multi-tape `StateMachine`, which stores the transition
//! relation of a finite automaton, pushdown automaton or Turing machine and simulates it
//! non-deterministically.
//!
//! The per-variant behaviour (what a transition carries, how tapes are read and changed and
//! when a configuration accepts) is supplied by a [`MachineKind`].

use crate::tape::Tape;
use crate::types::{
    MachineError, State, Symbol, BLANK, COMPOSITE_SEPARATOR, DEFAULT_TAPE, EPSILON,
    MAX_EXECUTION_STEPS,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

/// The behaviour that distinguishes one machine variant from another.
pub trait MachineKind: Debug + Clone + PartialEq + Eq + 'static {
    /// What a transition does besides changing state.
    type Payload: Debug + Clone + PartialEq + Eq + Hash + Ord + Serialize + DeserializeOwned;

    const NAME: &'static str;
    /// Whether tapes of this variant are bounded unless stated otherwise.
    const BOUNDED: bool;

    /// The payload of a transition that only changes state.
    fn neutral(tapes: usize) -> Self::Payload;

    /// Returns false if `payload` does not address exactly `tapes` tapes.
    fn fits(_payload: &Self::Payload, _tapes: usize) -> bool {
        true
    }

    /// Creates the tape at `index` holding `content`.
    fn load(_index: usize, content: &str, bounded: bool) -> Tape {
        Tape::new(content, bounded)
    }

    /// Reads one symbol per tape, `width` characters long where the variant allows it.
    fn read(tapes: &[Tape], width: usize) -> Vec<Symbol> {
        tapes.iter().map(|tape| tape.read(width)).collect()
    }

    /// Applies a matched transition to copies of the tapes.
    fn apply(tapes: &mut [Tape], pattern: &[Symbol], payload: &Self::Payload);

    fn is_accepting(is_final: bool, tapes: &[Tape]) -> bool;
}

/// A single transition rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transition<P> {
    pub from: State,
    /// One symbol per tape.
    pub read: Vec<Symbol>,
    pub to: State,
    pub payload: P,
}

/// The end of a stored transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target<P> {
    pub to: State,
    pub payload: P,
}

/// `state -> read pattern -> targets`, without duplicate targets.
pub type TransitionMap<P> = BTreeMap<State, BTreeMap<Vec<Symbol>, Vec<Target<P>>>>;

/// The plain-data shape of a machine. States and the alphabet are derived from the
/// transitions; `states` and `alphabet` only add to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDefinition<P> {
    pub transitions: Vec<Transition<P>>,
    pub initial: State,
    #[serde(default)]
    pub finals: BTreeSet<State>,
    #[serde(default)]
    pub tapes: Vec<String>,
    #[serde(default)]
    pub states: BTreeSet<State>,
    #[serde(default)]
    pub alphabet: BTreeSet<Symbol>,
    pub bounded: bool,
}

impl<P> MachineDefinition<P> {
    pub fn new(initial: impl Into<State>, bounded: bool) -> Self {
        Self {
            transitions: Vec::new(),
            initial: initial.into(),
            finals: BTreeSet::new(),
            tapes: Vec::new(),
            states: BTreeSet::new(),
            alphabet: BTreeSet::new(),
            bounded,
        }
    }
}

/// One point of a computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub state: State,
    pub accepted: bool,
    pub tapes: Vec<Tape>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine<K: MachineKind> {
    transitions: TransitionMap<K::Payload>,
    initial: State,
    finals: BTreeSet<State>,
    tapes: Vec<String>,
    states: BTreeSet<State>,
    alphabet: BTreeSet<Symbol>,
    bounded: bool,
    closures: BTreeMap<State, BTreeSet<State>>,
    width: usize,
    kind: PhantomData<K>,
}

/// Joins a set of simple state names into one composite name.
pub fn encode_composite<'a>(states: impl IntoIterator<Item = &'a State>) -> State {
    let sorted: BTreeSet<&State> = states.into_iter().collect();
    sorted
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(&COMPOSITE_SEPARATOR.to_string())
}

/// Splits a composite state name into its simple names.
pub fn split_composite(state: &str) -> Vec<State> {
    state
        .split(COMPOSITE_SEPARATOR)
        .map(str::to_string)
        .collect()
}

/// Returns `base` if it is free, otherwise `base` with an incremented numeric suffix.
pub fn fresh_name(base: &str, taken: impl Fn(&str) -> bool) -> State {
    if !taken(base) {
        return base.to_string();
    }

    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let mut version = base[stem.len()..].parse::<usize>().map_or(1, |v| v + 1);
    loop {
        let candidate = format!("{stem}{version}");
        if !taken(&candidate) {
            return candidate;
        }
        version += 1;
    }
}

/// The default state names used by `reenumerate`: `q0`, `q1`, ...
pub fn default_names() -> impl Iterator<Item = State> {
    (0..).map(|i| format!("q{i}"))
}

impl<K: MachineKind> StateMachine<K> {
    /// Builds a machine from its definition.
    ///
    /// # Returns
    ///
    /// * `Err(MachineError::TapeCount)` if a transition does not address every tape.
    pub fn new(definition: MachineDefinition<K::Payload>) -> Result<Self, MachineError> {
        let tapes = definition.tapes.len().max(1);

        for transition in &definition.transitions {
            if transition.read.len() != tapes || !K::fits(&transition.payload, tapes) {
                return Err(MachineError::TapeCount {
                    from: transition.from.clone(),
                    to: transition.to.clone(),
                    expected: tapes,
                    found: transition.read.len(),
                });
            }
        }

        Ok(Self::build(definition))
    }

    /// Builds a machine from a definition known to be consistent.
    pub(crate) fn build(definition: MachineDefinition<K::Payload>) -> Self {
        let MachineDefinition {
            transitions: rules,
            initial,
            finals,
            tapes,
            mut states,
            mut alphabet,
            bounded,
        } = definition;

        let tapes = if tapes.is_empty() {
            vec![DEFAULT_TAPE.to_string()]
        } else {
            tapes
        };

        states.insert(initial.clone());
        states.extend(finals.iter().cloned());

        let mut transitions = TransitionMap::new();
        for Transition {
            from,
            read,
            to,
            payload,
        } in rules
        {
            states.insert(from.clone());
            states.insert(to.clone());
            alphabet.extend(read.iter().cloned());

            let targets: &mut Vec<Target<K::Payload>> = transitions
                .entry(from)
                .or_default()
                .entry(read)
                .or_default();
            let target = Target { to, payload };
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        alphabet.remove(EPSILON);
        alphabet.remove(BLANK);

        let width = alphabet
            .iter()
            .map(|symbol| symbol.chars().count())
            .max()
            .unwrap_or(1)
            .max(1);

        let mut machine = Self {
            transitions,
            initial,
            finals,
            tapes,
            states,
            alphabet,
            bounded,
            closures: BTreeMap::new(),
            width,
            kind: PhantomData,
        };

        machine.closures = machine
            .states
            .iter()
            .map(|state| (state.clone(), machine.get_reachable(state, Some(EPSILON))))
            .collect();

        log::debug!(
            "Built {} with {} states and {} symbols",
            K::NAME,
            machine.states.len(),
            machine.alphabet.len()
        );

        machine
    }

    /// Returns the plain-data shape of this machine.
    pub fn definition(&self) -> MachineDefinition<K::Payload> {
        MachineDefinition {
            transitions: self.transitions().collect(),
            initial: self.initial.clone(),
            finals: self.finals.clone(),
            tapes: self.tapes.clone(),
            states: self.states.clone(),
            alphabet: self.alphabet.clone(),
            bounded: self.bounded,
        }
    }

    pub fn initial(&self) -> &State {
        &self.initial
    }

    pub fn finals(&self) -> &BTreeSet<State> {
        &self.finals
    }

    pub fn states(&self) -> &BTreeSet<State> {
        &self.states
    }

    pub fn alphabet(&self) -> &BTreeSet<Symbol> {
        &self.alphabet
    }

    pub fn tapes(&self) -> &[String] {
        &self.tapes
    }

    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    /// The longest symbol length; stepping tries read widths from here down to 1.
    pub fn symbol_width(&self) -> usize {
        self.width
    }

    pub fn transition_map(&self) -> &TransitionMap<K::Payload> {
        &self.transitions
    }

    /// Every stored transition, grouped by source state and read pattern.
    pub fn transitions(&self) -> impl Iterator<Item = Transition<K::Payload>> + '_ {
        self.transitions.iter().flat_map(|(from, by_pattern)| {
            by_pattern.iter().flat_map(move |(read, targets)| {
                targets.iter().map(move |target| Transition {
                    from: from.clone(),
                    read: read.clone(),
                    to: target.to.clone(),
                    payload: target.payload.clone(),
                })
            })
        })
    }

    /// The states reachable from each state through epsilon transitions, itself included.
    pub fn epsilon_closures(&self) -> &BTreeMap<State, BTreeSet<State>> {
        &self.closures
    }

    pub fn epsilon_closure(&self, state: &str) -> BTreeSet<State> {
        self.closures
            .get(state)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([state.to_string()]))
    }

    /// Element-wise pattern matching. Unless `literal` is set, an epsilon pattern symbol
    /// matches any read symbol.
    pub fn matches(pattern: &[Symbol], read: &[Symbol], literal: bool) -> bool {
        pattern.len() == read.len()
            && pattern
                .iter()
                .zip(read)
                .all(|(p, r)| p == r || (!literal && p == EPSILON))
    }

    /// Collects every state reachable from `origin`, including `origin`.
    ///
    /// With a symbol, only transitions whose pattern is that symbol on every tape are
    /// followed; without one, every transition is.
    pub fn get_reachable(&self, origin: &str, symbol: Option<&str>) -> BTreeSet<State> {
        let read = symbol.map(|s| vec![s.to_string(); self.tapes.len()]);

        let mut reachable = BTreeSet::from([origin.to_string()]);
        let mut queue = VecDeque::from([origin.to_string()]);

        while let Some(state) = queue.pop_front() {
            let Some(by_pattern) = self.transitions.get(&state) else {
                continue;
            };
            for (pattern, targets) in by_pattern {
                if read
                    .as_ref()
                    .is_some_and(|read| !Self::matches(pattern, read, true))
                {
                    continue;
                }
                for target in targets {
                    if reachable.insert(target.to.clone()) {
                        queue.push_back(target.to.clone());
                    }
                }
            }
        }

        reachable
    }

    fn configuration(&self, state: State, tapes: Vec<Tape>) -> Configuration {
        let accepted = K::is_accepting(self.finals.contains(&state), &tapes);
        Configuration {
            state,
            accepted,
            tapes,
        }
    }

    /// The configuration a computation on `inputs` (one per tape, missing ones empty)
    /// starts from.
    pub fn initial_configuration(&self, inputs: &[&str]) -> Result<Configuration, MachineError> {
        if inputs.len() > self.tapes.len() {
            return Err(MachineError::TapeIndex {
                index: inputs.len() - 1,
                count: self.tapes.len(),
            });
        }

        let tapes = (0..self.tapes.len())
            .map(|i| K::load(i, inputs.get(i).copied().unwrap_or_default(), self.bounded))
            .collect();

        Ok(self.configuration(self.initial.clone(), tapes))
    }

    /// Computes the successors of a configuration.
    ///
    /// Read widths are tried from the longest symbol length down to 1; the first width with
    /// any matching transition is used. Each matching transition yields one successor with
    /// its own copy of the tapes.
    pub fn step(&self, configuration: &Configuration) -> Vec<Configuration> {
        let Some(by_pattern) = self.transitions.get(&configuration.state) else {
            return Vec::new();
        };

        for width in (1..=self.width).rev() {
            let read = K::read(&configuration.tapes, width);
            let mut successors = Vec::new();

            for (pattern, targets) in by_pattern {
                if !Self::matches(pattern, &read, false) {
                    continue;
                }
                for target in targets {
                    let mut tapes = configuration.tapes.clone();
                    K::apply(&mut tapes, pattern, &target.payload);
                    successors.push(self.configuration(target.to.clone(), tapes));
                }
            }

            if !successors.is_empty() {
                return successors;
            }
        }

        Vec::new()
    }

    /// Starts a lazy computation on `inputs`.
    pub fn compute(&self, inputs: &[&str]) -> Result<Computation<'_, K>, MachineError> {
        let initial = self.initial_configuration(inputs)?;
        Ok(Computation {
            machine: self,
            layer: Some(vec![initial]),
        })
    }

    /// Runs the computation for at most `limit` layers.
    ///
    /// # Returns
    ///
    /// * `Some(true)` as soon as a layer contains an accepting configuration.
    /// * `Some(false)` if the computation dies out without accepting.
    /// * `None` if no decision was reached within `limit` layers.
    pub fn test_within(&self, inputs: &[&str], limit: usize) -> Result<Option<bool>, MachineError> {
        let mut computation = self.compute(inputs)?;

        for _ in 0..limit {
            match computation.next() {
                Some(layer) if layer.iter().any(|c| c.accepted) => return Ok(Some(true)),
                Some(_) => continue,
                None => return Ok(Some(false)),
            }
        }

        Ok(computation.next().is_none().then_some(false))
    }

    /// Tests a single input within [`MAX_EXECUTION_STEPS`] layers. Undecided inputs are
    /// rejected.
    pub fn test(&self, input: &str) -> bool {
        matches!(self.test_within(&[input], MAX_EXECUTION_STEPS), Ok(Some(true)))
    }

    /// Assigns names to `other`'s states that collide with none of this machine's states.
    pub(crate) fn remap_apart(&self, other: &Self) -> BTreeMap<State, State> {
        let mut taken: HashSet<State> = self.states.iter().cloned().collect();
        taken.extend(other.states.iter().cloned());

        let mut mapping = BTreeMap::new();
        for state in &other.states {
            let name = if self.states.contains(state) {
                let name = fresh_name(state, |s| taken.contains(s));
                taken.insert(name.clone());
                name
            } else {
                state.clone()
            };
            mapping.insert(state.clone(), name);
        }

        mapping
    }

    /// Returns a copy of `transitions` with both ends renamed through `mapping`.
    pub(crate) fn renamed(
        transitions: impl Iterator<Item = Transition<K::Payload>>,
        mapping: &BTreeMap<State, State>,
    ) -> Vec<Transition<K::Payload>> {
        let rename = |state: State| mapping.get(&state).cloned().unwrap_or(state);
        transitions
            .map(|t| Transition {
                from: rename(t.from),
                read: t.read,
                to: rename(t.to),
                payload: t.payload,
            })
            .collect()
    }

    pub(crate) fn epsilon_transition(&self, from: &str, to: &str) -> Transition<K::Payload> {
        Transition {
            from: from.to_string(),
            read: vec![EPSILON.to_string(); self.tapes.len()],
            to: to.to_string(),
            payload: K::neutral(self.tapes.len()),
        }
    }

    /// Accepts the union of both languages.
    ///
    /// A fresh initial state branches by epsilon transitions into both operands; the second
    /// operand's states are renamed where they collide with the first's.
    pub fn union(&self, other: &Self) -> Result<Self, MachineError> {
        Ok(self.union_with_mapping(other)?.0)
    }

    /// Like [`StateMachine::union`], also returning how `other`'s states were renamed.
    pub(crate) fn union_with_mapping(
        &self,
        other: &Self,
    ) -> Result<(Self, BTreeMap<State, State>), MachineError> {
        if self.tapes.len() != other.tapes.len() {
            return Err(MachineError::IncompatibleTapes {
                left: self.tapes.len(),
                right: other.tapes.len(),
            });
        }

        let mapping = self.remap_apart(other);
        let renamed_states: BTreeSet<State> = mapping.values().cloned().collect();
        let initial = fresh_name(&self.initial, |s| {
            self.states.contains(s) || renamed_states.contains(s)
        });

        let mut transitions: Vec<_> = self.transitions().collect();
        transitions.extend(Self::renamed(other.transitions(), &mapping));
        transitions.push(self.epsilon_transition(&initial, &self.initial));
        transitions.push(self.epsilon_transition(&initial, &mapping[&other.initial]));

        let mut finals = self.finals.clone();
        finals.extend(other.finals.iter().map(|state| mapping[state].clone()));

        let mut states = self.states.clone();
        states.extend(renamed_states);

        let machine = Self::build(MachineDefinition {
            transitions,
            initial,
            finals,
            tapes: self.tapes.clone(),
            states,
            alphabet: self.alphabet.union(&other.alphabet).cloned().collect(),
            bounded: self.bounded,
        });

        Ok((machine, mapping))
    }

    /// Renames every state reachable from the initial state, in breadth-first order, to
    /// the next name from `names`. Unreachable states are dropped.
    pub fn reenumerate(&self, names: impl IntoIterator<Item = State>) -> Self {
        let mut names = names.into_iter();
        let mut mapping: BTreeMap<State, State> = BTreeMap::new();
        let mut used: HashSet<State> = HashSet::new();
        let mut queue = VecDeque::from([self.initial.clone()]);

        let mut assign = |state: &State, mapping: &mut BTreeMap<State, State>| {
            let name = names
                .next()
                .filter(|name| !used.contains(name))
                .unwrap_or_else(|| fresh_name(&format!("q{}", mapping.len()), |s| used.contains(s)));
            used.insert(name.clone());
            mapping.insert(state.clone(), name);
        };

        assign(&self.initial, &mut mapping);
        while let Some(state) = queue.pop_front() {
            let Some(by_pattern) = self.transitions.get(&state) else {
                continue;
            };
            for target in by_pattern.values().flatten() {
                if !mapping.contains_key(&target.to) {
                    assign(&target.to, &mut mapping);
                    queue.push_back(target.to.clone());
                }
            }
        }

        let transitions = self
            .transitions()
            .filter(|t| mapping.contains_key(&t.from))
            .collect::<Vec<_>>();

        Self::build(MachineDefinition {
            transitions: Self::renamed(transitions.into_iter(), &mapping),
            initial: mapping[&self.initial].clone(),
            finals: self
                .finals
                .iter()
                .filter_map(|state| mapping.get(state).cloned())
                .collect(),
            tapes: self.tapes.clone(),
            states: BTreeSet::new(),
            alphabet: self.alphabet.clone(),
            bounded: self.bounded,
        })
    }
}

impl<K: MachineKind> Serialize for StateMachine<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.definition().serialize(serializer)
    }
}

impl<'de, K: MachineKind> Deserialize<'de> for StateMachine<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let definition = MachineDefinition::<K::Payload>::deserialize(deserializer)?;
        Self::new(definition).map_err(serde::de::Error::custom)
    }
}

/// The lazy sequence of configuration layers of a computation.
///
/// Layer 0 holds the initial configuration. Each further layer holds the deduplicated
/// successors of the non-accepting configurations of the previous one. The sequence ends
/// when a layer is empty, and is infinite for computations that never die out.
pub struct Computation<'m, K: MachineKind> {
    machine: &'m StateMachine<K>,
    layer: Option<Vec<Configuration>>,
}

impl<K: MachineKind> Iterator for Computation<'_, K> {
    type Item = Vec<Configuration>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.layer.take().filter(|layer| !layer.is_empty())?;

        let mut seen = HashSet::new();
        let mut next = Vec::new();
        for configuration in current.iter().filter(|c| !c.accepted) {
            for successor in self.machine.step(configuration) {
                if seen.insert(successor.clone()) {
                    next.push(successor);
                }
            }
        }

        self.layer = Some(next);
        Some(current)
    }
}
