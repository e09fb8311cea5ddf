//! This module defines the shared constants, configuration and error types used throughout
//! the compiler, evaluator and state-machine engine.

use crate::token::{SourceLocation, Span, Token, TokenKind};
use crate::visitor::DispatchError;
use pest::error::{Error, ErrorVariant};
use pest::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A state name. Composite states join sorted simple names with [`COMPOSITE_SEPARATOR`].
pub type State = String;
/// A terminal symbol. Symbols may span several characters.
pub type Symbol = String;

/// The empty read symbol. Matches any input unless literal matching is requested.
pub const EPSILON: &str = "";
/// The fill character for tape cells outside the written content.
pub const BLANK_SYMBOL: char = ' ';
/// [`BLANK_SYMBOL`] as a read/write symbol.
pub const BLANK: &str = " ";
/// Separator between the simple names of a composite state.
pub const COMPOSITE_SEPARATOR: char = ',';

/// Tape name used when a machine does not declare its tapes.
pub const DEFAULT_TAPE: &str = "tape";
/// Name of the input tape of a pushdown automaton.
pub const DEFAULT_INPUT_TAPE: &str = "input";
/// Stack name used when a pushdown automaton does not declare its stacks.
pub const DEFAULT_STACK: &str = "stack";

/// The maximum allowed size for a program in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB
/// The default number of computation layers explored before giving up on a test.
pub const MAX_EXECUTION_STEPS: usize = 10000;

/// Evaluation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Upper bound on the computation layers consumed by `test` statements.
    pub max_layers: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_layers: MAX_EXECUTION_STEPS,
        }
    }
}

/// Represents the possible directions a Turing Machine head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    Left,
    /// Move the head one position to the right.
    Right,
    /// Keep the head in the same position.
    Stay,
}

impl Direction {
    /// Parses a shift-direction character.
    ///
    /// Supports '<' or 'L' for Left, '>' or 'R' for Right, and '-' or 'S' for Stay.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '<' | 'L' => Some(Direction::Left),
            '>' | 'R' => Some(Direction::Right),
            '-' | 'S' => Some(Direction::Stay),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Direction::Left => '<',
            Direction::Right => '>',
            Direction::Stay => '-',
        }
    }

    /// The signed head movement of this direction.
    pub fn offset(&self) -> isize {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
            Direction::Stay => 0,
        }
    }
}

/// Errors raised while lexing or parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    /// The next token is not one of the acceptable kinds.
    #[error("Unexpected {token} at {}, expected {}", .token.location, format_kinds(.expected))]
    UnexpectedToken {
        token: Token,
        expected: Vec<TokenKind>,
    },
    /// The input ended while more tokens were required.
    #[error("Unexpected end of input at {location}, expected {}", format_kinds(.expected))]
    UnexpectedEnd {
        location: SourceLocation,
        expected: Vec<TokenKind>,
    },
    /// A rule-specific syntax violation.
    #[error("Invalid syntax at {}: {message}", .span.start)]
    Invalid { message: String, span: Span },
}

impl SyntaxError {
    pub fn invalid(message: impl Into<String>, span: Span) -> Self {
        SyntaxError::Invalid {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SyntaxError::UnexpectedToken { token, .. } => token.span(),
            SyntaxError::UnexpectedEnd { location, .. } => Span::new(*location, *location),
            SyntaxError::Invalid { span, .. } => *span,
        }
    }

    /// Renders the error with the offending source line and a caret marker.
    ///
    /// Falls back to the plain message when the span cannot be located in `source`.
    pub fn render(&self, source: &str) -> String {
        let span = self.span();
        if !span.start.is_valid() {
            return self.to_string();
        }

        let variant = match self {
            SyntaxError::UnexpectedToken { expected, .. }
            | SyntaxError::UnexpectedEnd { expected, .. } => ErrorVariant::ParsingError {
                positives: expected.clone(),
                negatives: vec![],
            },
            SyntaxError::Invalid { message, .. } => ErrorVariant::CustomError {
                message: message.clone(),
            },
        };

        let error = match pest::Span::new(source, span.start.offset, span.end.offset) {
            Some(s) if span.end.offset > span.start.offset => Error::new_from_span(variant, s),
            _ => match Position::new(source, span.start.offset) {
                Some(pos) => Error::new_from_pos(variant, pos),
                None => return self.to_string(),
            },
        };

        error.renamed_rules(|kind| kind.name().to_string()).to_string()
    }
}

/// Errors raised while building or combining state machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// A transition does not address every tape of its machine.
    #[error("Transition {from} -> {to} reads {found} tapes, expected {expected}")]
    TapeCount {
        from: State,
        to: State,
        expected: usize,
        found: usize,
    },
    /// Two machines with different tape counts cannot be combined.
    #[error("Cannot combine machines with {left} and {right} tapes")]
    IncompatibleTapes { left: usize, right: usize },
    /// An input was supplied for a tape the machine does not have.
    #[error("Tape index {index} is out of bounds (machine has {count} tapes)")]
    TapeIndex { index: usize, count: usize },
}

/// Errors raised while evaluating a syntax tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Redefinition of name '{name}' at {span}")]
    Redefinition { name: String, span: Span },
    #[error("Name '{name}' used before definition at {span}")]
    UsedBeforeDefinition { name: String, span: Span },
    #[error("Name '{name}' is not declared at {span}")]
    NotDeclared { name: String, span: Span },
    #[error("Automaton '{automaton}' has no initial state")]
    MissingInitialState { automaton: String, span: Span },
    #[error("Grammar '{grammar}' has no start symbol")]
    MissingStartSymbol { grammar: String, span: Span },
    #[error("{feature} at {span}")]
    Unsupported { feature: String, span: Span },
    #[error("Expected {expected}, found {found} at {span}")]
    KindMismatch {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unknown tape '{tape}' in automaton '{automaton}' at {span}")]
    UnknownTape {
        tape: String,
        automaton: String,
        span: Span,
    },
    #[error("Transition addresses {found} tapes but automaton '{automaton}' has {expected} at {span}")]
    TooManyTapes {
        automaton: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("'{statement}' statement outside of an automaton body at {span}")]
    OutsideAutomaton { statement: String, span: Span },
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl EvaluationError {
    pub fn unsupported(feature: impl Into<String>, span: Span) -> Self {
        EvaluationError::Unsupported {
            feature: feature.into(),
            span,
        }
    }
}

/// Errors surfaced at the compiler boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Program too large: {0} bytes (limit is {})", MAX_PROGRAM_SIZE)]
    TooLarge(usize),
    #[error("File error: {0}")]
    FileError(String),
}

impl CompileError {
    /// Renders syntax errors against `source`; other errors use their message.
    pub fn render(&self, source: &str) -> String {
        match self {
            CompileError::Syntax(e) => e.render(source),
            other => other.to_string(),
        }
    }
}

/// Formats a list of token kinds into a human-readable string for error messages.
fn format_kinds(kinds: &[TokenKind]) -> String {
    if kinds.is_empty() {
        return "nothing".to_string();
    }

    kinds
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_serialization() {
        let left = Direction::Left;
        let right = Direction::Right;

        let left_json = serde_json::to_string(&left).unwrap();
        let right_json = serde_json::to_string(&right).unwrap();

        assert_eq!(left_json, "\"Left\"");
        assert_eq!(right_json, "\"Right\"");

        let left_deserialized: Direction = serde_json::from_str(&left_json).unwrap();
        assert_eq!(left, left_deserialized);
    }

    #[test]
    fn test_direction_chars() {
        assert_eq!(Direction::from_char('<'), Some(Direction::Left));
        assert_eq!(Direction::from_char('R'), Some(Direction::Right));
        assert_eq!(Direction::from_char('-'), Some(Direction::Stay));
        assert_eq!(Direction::from_char('x'), None);
        assert_eq!(Direction::Left.offset(), -1);
        assert_eq!(Direction::Stay.as_char(), '-');
    }

    #[test]
    fn test_error_display() {
        let token = Token {
            kind: TokenKind::RightBrace,
            value: "}".into(),
            location: SourceLocation::start(),
            end: SourceLocation::start().advance("}"),
        };
        let error = SyntaxError::UnexpectedToken {
            token,
            expected: vec![TokenKind::Identifier, TokenKind::String],
        };

        let message = error.to_string();
        assert!(message.contains("'}'"));
        assert!(message.contains("identifier or string"));
    }

    #[test]
    fn test_render_points_at_source() {
        let source = "finite x {\n  initial \n}";
        let location = SourceLocation::start().advance("finite x {\n  initial \n");
        let error = SyntaxError::UnexpectedToken {
            token: Token {
                kind: TokenKind::RightBrace,
                value: "}".into(),
                location,
                end: location.advance("}"),
            },
            expected: vec![TokenKind::Identifier],
        };

        let rendered = error.render(source);
        assert!(rendered.contains("3:1"));
        assert!(rendered.contains("identifier"));
    }

    #[test]
    fn test_render_invalid_location_falls_back() {
        let error = SyntaxError::invalid("broken", Span::INVALID);
        assert_eq!(error.render("abc"), error.to_string());
    }
}
