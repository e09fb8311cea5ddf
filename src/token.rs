//! Source positions and the tokens produced by the lexer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the source text.
///
/// `offset` is a byte offset, `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    /// Sentinel for errors that cannot be located in the source.
    pub const INVALID: SourceLocation = SourceLocation {
        offset: usize::MAX,
        line: 0,
        column: 0,
    };

    /// The location of the first character of a source text.
    pub const fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Returns the location reached after consuming `text` from this location.
    pub fn advance(&self, text: &str) -> Self {
        let mut next = *self;
        for c in text.chars() {
            next.offset += c.len_utf8();
            if c == '\n' {
                next.line += 1;
                next.column = 1;
            } else {
                next.column += 1;
            }
        }
        next
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

/// A half-open range of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl Span {
    pub const INVALID: Span = Span {
        start: SourceLocation::INVALID,
        end: SourceLocation::INVALID,
    };

    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// Every kind of token the lexer can produce.
///
/// Keywords are lexed as their own kinds. Contextual words (`tapes`, `stacks`,
/// `start`, `pop`, `push`) are plain identifiers so they stay usable as names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    Whitespace,
    Newline,
    Comment,
    End,
    Invalid,

    Identifier,
    String,
    UnterminatedString,
    Character,
    QuotedCharacter,
    NamedCharacter,
    NonTerminal,
    UnclosedNonTerminal,

    Finite,
    Pushdown,
    Turing,
    Grammar,
    Initial,
    Final,
    Print,
    Test,
    Union,
    Intersection,
    Concatenate,
    Complement,
    Determinize,
    Reenumerate,
    Star,
    Reverse,

    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Comma,
    Colon,
    Semicolon,
    Arrow,
    Equals,
    Pipe,
    ShiftLeft,
    ShiftRight,
    NoShift,
}

impl TokenKind {
    /// The token type name used in diagnostics and by external tooling.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::Newline => "newline",
            TokenKind::Comment => "comment",
            TokenKind::End => "end of input",
            TokenKind::Invalid => "invalid",
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::UnterminatedString => "unterminated string",
            TokenKind::Character => "character",
            TokenKind::QuotedCharacter => "quoted character",
            TokenKind::NamedCharacter => "named character",
            TokenKind::NonTerminal => "non-terminal",
            TokenKind::UnclosedNonTerminal => "unclosed non-terminal",
            TokenKind::Finite => "finite",
            TokenKind::Pushdown => "pushdown",
            TokenKind::Turing => "turing",
            TokenKind::Grammar => "grammar",
            TokenKind::Initial => "initial",
            TokenKind::Final => "final",
            TokenKind::Print => "print",
            TokenKind::Test => "test",
            TokenKind::Union => "union",
            TokenKind::Intersection => "intersection",
            TokenKind::Concatenate => "concatenate",
            TokenKind::Complement => "complement",
            TokenKind::Determinize => "determinize",
            TokenKind::Reenumerate => "reenumerate",
            TokenKind::Star => "star",
            TokenKind::Reverse => "reverse",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Arrow => "'->'",
            TokenKind::Equals => "'='",
            TokenKind::Pipe => "'|'",
            TokenKind::ShiftLeft => "'<'",
            TokenKind::ShiftRight => "'>'",
            TokenKind::NoShift => "'-'",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single lexed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub location: SourceLocation,
    pub end: SourceLocation,
}

impl Token {
    pub fn span(&self) -> Span {
        Span::new(self.location, self.end)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::End => write!(f, "end of input"),
            _ => write!(f, "{} {:?}", self.kind, self.value),
        }
    }
}
