//! Lexer modes, their token patterns, and the longest-match lexing step.
//!
//! Each [`LexMode`] owns an ordered list of `(TokenKind, pattern)` rules. The token stream
//! keeps a stack of modes; the active rule set is the innermost mode's rules followed by the
//! rules of every enclosing mode whose kind is not already shadowed.

use crate::token::{SourceLocation, Token, TokenKind};
use regex::Regex;
use std::collections::HashSet;

/// A named set of token patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexMode {
    /// The statement-level language.
    Base,
    /// Single characters, used for transition conditions and tape symbols.
    Char,
    /// Grammar productions: non-terminal references and alternatives.
    Grammar,
}

/// A single compiled token pattern.
#[derive(Debug)]
pub struct Rule {
    pub kind: TokenKind,
    pub pattern: &'static str,
    regex: Regex,
}

impl Rule {
    fn new(kind: TokenKind, pattern: &'static str) -> Self {
        Self {
            kind,
            pattern,
            regex: Regex::new(&format!("^(?:{pattern})")).expect("token pattern must compile"),
        }
    }

    /// Length in bytes of the match at the start of `input`, if any.
    fn match_len(&self, input: &str) -> Option<usize> {
        self.regex.find(input).map(|m| m.end()).filter(|len| *len > 0)
    }
}

/// Reserved keywords and the token kinds they lex to.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("finite", TokenKind::Finite),
    ("pushdown", TokenKind::Pushdown),
    ("turing", TokenKind::Turing),
    ("grammar", TokenKind::Grammar),
    ("initial", TokenKind::Initial),
    ("final", TokenKind::Final),
    ("print", TokenKind::Print),
    ("test", TokenKind::Test),
    ("union", TokenKind::Union),
    ("intersection", TokenKind::Intersection),
    ("concatenate", TokenKind::Concatenate),
    ("complement", TokenKind::Complement),
    ("determinize", TokenKind::Determinize),
    ("reenumerate", TokenKind::Reenumerate),
    ("star", TokenKind::Star),
    ("reverse", TokenKind::Reverse),
];

const BASE_PATTERNS: &[(TokenKind, &str)] = &[
    (TokenKind::Whitespace, r"[ \t\r]+"),
    (TokenKind::Newline, r"\n"),
    (TokenKind::Comment, r"//[^\n]*"),
    (TokenKind::Finite, "finite"),
    (TokenKind::Pushdown, "pushdown"),
    (TokenKind::Turing, "turing"),
    (TokenKind::Grammar, "grammar"),
    (TokenKind::Initial, "initial"),
    (TokenKind::Final, "final"),
    (TokenKind::Print, "print"),
    (TokenKind::Test, "test"),
    (TokenKind::Union, "union"),
    (TokenKind::Intersection, "intersection"),
    (TokenKind::Concatenate, "concatenate"),
    (TokenKind::Complement, "complement"),
    (TokenKind::Determinize, "determinize"),
    (TokenKind::Reenumerate, "reenumerate"),
    (TokenKind::Star, "star"),
    (TokenKind::Reverse, "reverse"),
    (TokenKind::Identifier, r"[A-Za-z_][A-Za-z0-9_]*"),
    (TokenKind::String, r#""(?:\\.|[^"\\\n])*""#),
    (TokenKind::UnterminatedString, r#""(?:\\.|[^"\\\n])*"#),
    (TokenKind::LeftBrace, r"\{"),
    (TokenKind::RightBrace, r"\}"),
    (TokenKind::LeftBracket, r"\["),
    (TokenKind::RightBracket, r"\]"),
    (TokenKind::LeftParen, r"\("),
    (TokenKind::RightParen, r"\)"),
    (TokenKind::Comma, ","),
    (TokenKind::Colon, ":"),
    (TokenKind::Semicolon, ";"),
    (TokenKind::Arrow, "->"),
    (TokenKind::Equals, "="),
    (TokenKind::ShiftLeft, "<"),
    (TokenKind::ShiftRight, ">"),
    (TokenKind::NoShift, "-"),
];

const CHAR_PATTERNS: &[(TokenKind, &str)] = &[
    (TokenKind::QuotedCharacter, r"'(?:\\.|[^'\\\n])'"),
    (TokenKind::NamedCharacter, r"\$[A-Za-z_]+"),
    (TokenKind::Character, r"\S"),
];

const GRAMMAR_PATTERNS: &[(TokenKind, &str)] = &[
    (TokenKind::NonTerminal, r"<[^<>\s]+>"),
    (TokenKind::UnclosedNonTerminal, r"<[^<>\s]*"),
    (TokenKind::Pipe, r"\|"),
];

fn compile(patterns: &[(TokenKind, &'static str)]) -> Vec<Rule> {
    patterns
        .iter()
        .map(|(kind, pattern)| Rule::new(*kind, pattern))
        .collect()
}

lazy_static::lazy_static! {
    static ref BASE_RULES: Vec<Rule> = compile(BASE_PATTERNS);
    static ref CHAR_RULES: Vec<Rule> = compile(CHAR_PATTERNS);
    static ref GRAMMAR_RULES: Vec<Rule> = compile(GRAMMAR_PATTERNS);
}

impl LexMode {
    /// The rules owned by this mode, in priority order.
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            LexMode::Base => &BASE_RULES,
            LexMode::Char => &CHAR_RULES,
            LexMode::Grammar => &GRAMMAR_RULES,
        }
    }
}

/// Resolves the active rules of a mode stack (outermost first).
///
/// Inner modes come first; an outer rule is dropped when an inner mode already defines its kind.
pub fn active_rules(modes: &[LexMode]) -> Vec<&'static Rule> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();

    for mode in modes.iter().rev() {
        for rule in mode.rules() {
            if !seen.contains(&rule.kind) {
                rules.push(rule);
            }
        }
        seen.extend(mode.rules().iter().map(|rule| rule.kind));
    }

    rules
}

/// Lexes one token at `location` using the longest matching rule.
///
/// Ties go to the earlier rule. Text no rule matches becomes a one-character
/// [`TokenKind::Invalid`] token. At the end of the source an empty
/// [`TokenKind::End`] token is returned.
pub fn lex(source: &str, location: SourceLocation, rules: &[&Rule]) -> Token {
    let rest = source.get(location.offset..).unwrap_or_default();

    if rest.is_empty() {
        return Token {
            kind: TokenKind::End,
            value: String::new(),
            location,
            end: location,
        };
    }

    let mut best: Option<(TokenKind, usize)> = None;
    for rule in rules {
        if let Some(len) = rule.match_len(rest) {
            if best.is_none_or(|(_, longest)| len > longest) {
                best = Some((rule.kind, len));
            }
        }
    }

    let (kind, len) = best.unwrap_or_else(|| {
        let len = rest.chars().next().map_or(1, char::len_utf8);
        (TokenKind::Invalid, len)
    });

    let value = &rest[..len];
    log::trace!("LEXED: {:?} {:?} at {}", kind, value, location);

    Token {
        kind,
        value: value.to_string(),
        location,
        end: location.advance(value),
    }
}

/// The keyword and token patterns for syntax highlighting, as `(token name, pattern)` pairs.
pub fn highlight_rules() -> Vec<(&'static str, &'static str)> {
    [LexMode::Base, LexMode::Char, LexMode::Grammar]
        .iter()
        .flat_map(|mode| mode.rules())
        .filter(|rule| !matches!(rule.kind, TokenKind::Whitespace | TokenKind::Newline))
        .map(|rule| (rule.kind.name(), rule.pattern))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str, modes: &[LexMode]) -> Vec<(TokenKind, String)> {
        let rules = active_rules(modes);
        let mut location = SourceLocation::start();
        let mut tokens = Vec::new();
        loop {
            let token = lex(source, location, &rules);
            if token.kind == TokenKind::End {
                break;
            }
            location = token.end;
            if token.kind != TokenKind::Whitespace {
                tokens.push((token.kind, token.value));
            }
        }
        tokens
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = lex_all("finite finiteness start", &[LexMode::Base]);

        assert_eq!(
            tokens,
            vec![
                (TokenKind::Finite, "finite".to_string()),
                (TokenKind::Identifier, "finiteness".to_string()),
                (TokenKind::Identifier, "start".to_string()),
            ]
        );
    }

    #[test]
    fn test_arrow_beats_dash() {
        let tokens = lex_all("-> - >", &[LexMode::Base]);
        let kinds: Vec<_> = tokens.into_iter().map(|(kind, _)| kind).collect();

        assert_eq!(
            kinds,
            vec![TokenKind::Arrow, TokenKind::NoShift, TokenKind::ShiftRight]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = lex_all("\"abc", &[LexMode::Base]);
        assert_eq!(tokens[0].0, TokenKind::UnterminatedString);

        let tokens = lex_all("\"abc\"", &[LexMode::Base]);
        assert_eq!(tokens[0].0, TokenKind::String);
    }

    #[test]
    fn test_char_mode_shadows_single_letters() {
        let tokens = lex_all("a ab 'x' $eps \"s\" ->", &[LexMode::Base, LexMode::Char]);
        let kinds: Vec<_> = tokens.into_iter().map(|(kind, _)| kind).collect();

        assert_eq!(
            kinds,
            vec![
                TokenKind::Character,
                TokenKind::Identifier,
                TokenKind::QuotedCharacter,
                TokenKind::NamedCharacter,
                TokenKind::String,
                TokenKind::Arrow,
            ]
        );
    }

    #[test]
    fn test_grammar_mode_non_terminals() {
        let tokens = lex_all("<S> -> \"a\" <S> | <T", &[LexMode::Base, LexMode::Grammar]);
        let kinds: Vec<_> = tokens.into_iter().map(|(kind, _)| kind).collect();

        assert_eq!(
            kinds,
            vec![
                TokenKind::NonTerminal,
                TokenKind::Arrow,
                TokenKind::String,
                TokenKind::NonTerminal,
                TokenKind::Pipe,
                TokenKind::UnclosedNonTerminal,
            ]
        );
    }

    #[test]
    fn test_unmatched_text_is_invalid() {
        let tokens = lex_all("@", &[LexMode::Base]);
        assert_eq!(tokens, vec![(TokenKind::Invalid, "@".to_string())]);
    }

    #[test]
    fn test_end_token_at_end_of_input() {
        let rules = active_rules(&[LexMode::Base]);
        let token = lex("", SourceLocation::start(), &rules);
        assert_eq!(token.kind, TokenKind::End);
        assert_eq!(token.location, token.end);
    }

    #[test]
    fn test_highlight_rules_include_keywords() {
        let rules = highlight_rules();
        for (keyword, kind) in KEYWORDS {
            assert!(rules.contains(&(kind.name(), *keyword)));
        }
    }
}
