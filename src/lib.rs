//! This crate provides the compiler and simulator for a small language describing finite
//! automata, pushdown automata, Turing machines and grammars.
//! It includes modules for lexing and parsing programs, evaluating them into state
//! machines, running and combining those machines, analyzing them for common mistakes, and
//! managing a collection of bundled programs.

pub mod analyzer;
pub mod ast;
pub mod compiler;
pub mod encoder;
pub mod evaluator;
pub mod finite;
pub mod grammar;
pub mod graph;
pub mod lexer;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod pushdown;
pub mod scope;
pub mod stream;
pub mod tape;
pub mod token;
pub mod turing;
pub mod types;
pub mod visitor;

/// Re-exports the `analyze` function and `Finding` enum from the analyzer module.
pub use analyzer::{analyze, Finding};
/// Re-exports the compiler entry points.
pub use compiler::{compile, evaluate, Compiler, Evaluation};
/// Re-exports the encoding functions from the encoder module.
pub use encoder::{decode, encode, export_turing, Tagged};
/// Re-exports the values a program evaluates to.
pub use evaluator::{Automaton, TestOutcome};
pub use finite::FiniteAutomaton;
pub use grammar::Grammar;
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
pub use machine::{MachineKind, StateMachine};
/// Re-exports `ProgramInfo`, `ProgramManager`, and `PROGRAMS` from the programs module.
pub use programs::{ProgramInfo, ProgramManager, PROGRAMS};
pub use pushdown::PushdownAutomaton;
pub use turing::TuringMachine;
/// Re-exports the shared constants and error types from the types module.
pub use types::{
    CompileError, Direction, EvaluationError, MachineError, Options, SyntaxError,
    MAX_EXECUTION_STEPS, MAX_PROGRAM_SIZE,
};
