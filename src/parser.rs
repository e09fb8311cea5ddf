//! This module provides the parser-combinator framework and the standard grammar of the
//! machine language.
//!
//! Parsers are registered by rule name in a [`ParserRegistry`] and invoke each other through
//! [`ParserRegistry::delegate`], so rules can be mutually recursive without any static
//! ordering. Leaf rules are plain functions ([`Combinator::Call`]); structure is built from
//! the generic combinators.

use crate::ast::{AutomatonKind, BinaryOp, Identifier, Node, UnaryOp};
use crate::lexer::LexMode;
use crate::stream::{Attempt, TokenStream};
use crate::token::{SourceLocation, Span, Token, TokenKind};
use crate::types::{Direction, SyntaxError, BLANK, EPSILON};
use std::collections::HashMap;

/// A leaf parser: consumes tokens and builds one node whose span starts at `start`.
pub type ParseFn =
    fn(&ParserRegistry, &mut TokenStream, SourceLocation) -> Result<Node, SyntaxError>;

/// A dispatch entry of [`Combinator::Choose`].
#[derive(Debug, Clone)]
pub struct Branch {
    pub kind: TokenKind,
    pub parser: &'static str,
    /// Consume the dispatch token before delegating.
    pub consume: bool,
}

impl Branch {
    pub fn new(kind: TokenKind, parser: &'static str) -> Self {
        Self {
            kind,
            parser,
            consume: false,
        }
    }

    pub fn consuming(kind: TokenKind, parser: &'static str) -> Self {
        Self {
            kind,
            parser,
            consume: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Combinator {
    Call(ParseFn),
    /// Dispatches on the kind of the next token, peeked (and parsed) under `mode`.
    Choose {
        mode: Option<LexMode>,
        branches: Vec<Branch>,
        fallback: Option<&'static str>,
    },
    /// Tries each rule in order; the first success wins, otherwise the last error is returned.
    Alternative(Vec<&'static str>),
    /// A separated statement sequence ended by `close`.
    Root {
        statement: &'static str,
        open: Option<TokenKind>,
        close: TokenKind,
    },
    /// A bracketed, separated sequence, or a single bare element.
    List {
        element: &'static str,
        brackets: Option<(TokenKind, TokenKind)>,
        separator: TokenKind,
    },
    /// Left-associative infix operators of equal precedence.
    Binary {
        operand: &'static str,
        operators: Vec<(TokenKind, BinaryOp)>,
    },
    /// Right-associative prefix operators.
    Unary {
        operand: &'static str,
        operators: Vec<(TokenKind, UnaryOp)>,
    },
}

/// A table of named parsers.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    table: HashMap<&'static str, Combinator>,
}

/// Parses a whole module with the standard grammar.
///
/// # Returns
///
/// * `Ok((Node::Root, tokens))` with every token lexed while parsing.
/// * `Err(SyntaxError)` for the first syntax error not recovered by backtracking.
pub fn parse(source: &str) -> Result<(Node, Vec<Token>), SyntaxError> {
    let registry = ParserRegistry::standard();
    let mut stream = TokenStream::new(source);
    let module = registry.delegate("module", &mut stream)?;

    Ok((module, stream.tokens()))
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `combinator` under `name`, replacing any previous rule of that name.
    pub fn register(&mut self, name: &'static str, combinator: Combinator) {
        self.table.insert(name, combinator);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Runs the rule `name` with the span starting at the next significant token.
    pub fn delegate(&self, name: &str, stream: &mut TokenStream) -> Result<Node, SyntaxError> {
        let start = stream.location();
        self.delegate_from(name, stream, start)
    }

    /// Runs the rule `name` with an explicit span start, for rules whose first token was
    /// already consumed by the caller.
    pub fn delegate_from(
        &self,
        name: &str,
        stream: &mut TokenStream,
        start: SourceLocation,
    ) -> Result<Node, SyntaxError> {
        let combinator = self.table.get(name).ok_or_else(|| {
            SyntaxError::invalid(format!("unknown grammar rule '{name}'"), Span::new(start, start))
        })?;

        log::trace!("PARSE: {} at {}", name, start);
        combinator.parse(self, stream, start)
    }

    /// The grammar of the machine language.
    pub fn standard() -> Self {
        use TokenKind as T;

        let mut registry = Self::new();
        let r = &mut registry;

        r.register("module", Combinator::Root {
            statement: "statement",
            open: None,
            close: T::End,
        });
        r.register("body", Combinator::Root {
            statement: "statement",
            open: Some(T::LeftBrace),
            close: T::RightBrace,
        });
        r.register("statement", Combinator::Choose {
            mode: None,
            branches: vec![
                Branch::consuming(T::Finite, "finite"),
                Branch::consuming(T::Pushdown, "pushdown"),
                Branch::consuming(T::Turing, "turing"),
                Branch::consuming(T::Grammar, "grammar"),
                Branch::consuming(T::Initial, "initial"),
                Branch::consuming(T::Final, "final"),
                Branch::consuming(T::Print, "print"),
                Branch::consuming(T::Test, "test"),
            ],
            fallback: Some("transition"),
        });

        r.register("finite", Combinator::Call(parse_finite));
        r.register("pushdown", Combinator::Call(parse_pushdown));
        r.register("turing", Combinator::Call(parse_turing));
        r.register("grammar", Combinator::Call(parse_grammar));
        r.register("grammar_body", Combinator::Root {
            statement: "production",
            open: Some(T::LeftBrace),
            close: T::RightBrace,
        });
        r.register("production", Combinator::Call(parse_production));
        r.register("initial", Combinator::Call(parse_initial));
        r.register("final", Combinator::Call(parse_final));
        r.register("print", Combinator::Call(parse_print));
        r.register("test", Combinator::Call(parse_test));

        r.register("transition", Combinator::Alternative(vec![
            "turing_transition",
            "pushdown_transition",
            "finite_transition",
        ]));
        r.register("finite_transition", Combinator::Call(parse_finite_transition));
        r.register("pushdown_transition", Combinator::Call(parse_pushdown_transition));
        r.register("turing_transition", Combinator::Call(parse_turing_transition));

        r.register("condition", Combinator::Choose {
            mode: Some(LexMode::Char),
            branches: vec![
                Branch::new(T::Character, "character"),
                Branch::new(T::QuotedCharacter, "character"),
                Branch::new(T::NamedCharacter, "character"),
                Branch::new(T::String, "string"),
                Branch::new(T::UnterminatedString, "string"),
                Branch::new(T::Identifier, "identifier"),
            ],
            fallback: None,
        });
        r.register("symbols", Combinator::List {
            element: "tape_symbol",
            brackets: Some((T::LeftBracket, T::RightBracket)),
            separator: T::Comma,
        });
        r.register("tape_symbol", Combinator::Alternative(vec!["qualified_symbol", "condition"]));
        r.register("qualified_symbol", Combinator::Call(parse_qualified_symbol));
        r.register("shifts", Combinator::List {
            element: "tape_shift",
            brackets: Some((T::LeftBracket, T::RightBracket)),
            separator: T::Comma,
        });
        r.register("tape_shift", Combinator::Alternative(vec!["qualified_shift", "shift"]));
        r.register("qualified_shift", Combinator::Call(parse_qualified_shift));
        r.register("shift", Combinator::Call(parse_shift));

        r.register("name_list", Combinator::List {
            element: "identifier",
            brackets: Some((T::LeftBracket, T::RightBracket)),
            separator: T::Comma,
        });
        r.register("string_list", Combinator::List {
            element: "string",
            brackets: Some((T::LeftBracket, T::RightBracket)),
            separator: T::Comma,
        });

        r.register("expression", Combinator::Binary {
            operand: "unary",
            operators: vec![
                (T::Union, BinaryOp::Union),
                (T::Intersection, BinaryOp::Intersection),
                (T::Concatenate, BinaryOp::Concatenate),
            ],
        });
        r.register("unary", Combinator::Unary {
            operand: "primary",
            operators: vec![
                (T::Complement, UnaryOp::Complement),
                (T::Determinize, UnaryOp::Determinize),
                (T::Reenumerate, UnaryOp::Reenumerate),
                (T::Star, UnaryOp::Star),
                (T::Reverse, UnaryOp::Reverse),
            ],
        });
        r.register("primary", Combinator::Choose {
            mode: None,
            branches: vec![
                Branch::consuming(T::LeftParen, "parenthesized"),
                Branch::new(T::Identifier, "identifier"),
            ],
            fallback: None,
        });
        r.register("parenthesized", Combinator::Call(parse_parenthesized));

        r.register("identifier", Combinator::Call(parse_identifier));
        r.register("character", Combinator::Call(parse_character));
        r.register("string", Combinator::Call(parse_string));
        r.register("non_terminal", Combinator::Call(parse_non_terminal));

        registry
    }
}

impl Combinator {
    pub fn parse(
        &self,
        registry: &ParserRegistry,
        stream: &mut TokenStream,
        start: SourceLocation,
    ) -> Result<Node, SyntaxError> {
        match self {
            Combinator::Call(f) => f(registry, stream, start),
            Combinator::Choose {
                mode,
                branches,
                fallback,
            } => parse_choose(registry, stream, *mode, branches, *fallback),
            Combinator::Alternative(rules) => parse_alternative(registry, stream, start, rules),
            Combinator::Root {
                statement,
                open,
                close,
            } => parse_root(registry, stream, start, statement, *open, *close),
            Combinator::List {
                element,
                brackets,
                separator,
            } => parse_list(registry, stream, start, element, *brackets, *separator),
            Combinator::Binary {
                operand,
                operators,
            } => {
                let mut left = registry.delegate_from(operand, stream, start)?;
                while let Some(op) = peek_operator(stream, operators) {
                    stream.next()?;
                    let right = registry.delegate(operand, stream)?;
                    left = Node::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                        span: Span::new(start, stream.last_end()),
                    };
                }
                Ok(left)
            }
            Combinator::Unary {
                operand,
                operators,
            } => match peek_operator(stream, operators) {
                Some(op) => {
                    stream.next()?;
                    let inner = stream.location();
                    let operand = self.parse(registry, stream, inner)?;
                    Ok(Node::Unary {
                        op,
                        operand: Box::new(operand),
                        span: Span::new(start, stream.last_end()),
                    })
                }
                None => registry.delegate_from(operand, stream, start),
            },
        }
    }
}

fn peek_operator<Op: Copy>(stream: &mut TokenStream, operators: &[(TokenKind, Op)]) -> Option<Op> {
    let token = stream.peek().ok()?;
    operators
        .iter()
        .find(|(kind, _)| *kind == token.kind)
        .map(|(_, op)| *op)
}

fn parse_choose(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    mode: Option<LexMode>,
    branches: &[Branch],
    fallback: Option<&'static str>,
) -> Result<Node, SyntaxError> {
    let prefixes = || branches.iter().map(|b| b.kind).collect::<Vec<_>>();

    let peeked = match mode {
        Some(mode) => stream.with_syntax(mode, |s| s.peek()),
        None => stream.peek(),
    };
    let token = match peeked {
        Ok(token) => token,
        Err(SyntaxError::UnexpectedEnd { location, .. }) => {
            return Err(SyntaxError::UnexpectedEnd {
                location,
                expected: prefixes(),
            })
        }
        Err(e) => return Err(e),
    };

    let Some(branch) = branches.iter().find(|b| b.kind == token.kind) else {
        return match fallback {
            Some(rule) => registry.delegate_from(rule, stream, token.location),
            None => Err(SyntaxError::UnexpectedToken {
                token,
                expected: prefixes(),
            }),
        };
    };

    let run = |s: &mut TokenStream| -> Result<Node, SyntaxError> {
        if branch.consume {
            s.next()?;
        }
        registry.delegate_from(branch.parser, s, token.location)
    };

    match mode {
        Some(mode) => stream.with_syntax(mode, run),
        None => run(stream),
    }
}

fn parse_alternative(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
    rules: &[&'static str],
) -> Result<Node, SyntaxError> {
    let mut last = None;

    for rule in rules {
        let attempt = stream.checkpoint(|s, commit| {
            let node = registry.delegate_from(rule, s, start)?;
            commit.commit();
            Ok(node)
        })?;

        match attempt {
            Attempt::Done(node) => return Ok(node),
            Attempt::RolledBack(e) => last = Some(e),
        }
    }

    Err(last.unwrap_or_else(|| {
        SyntaxError::invalid("no alternatives to try", Span::new(start, start))
    }))
}

fn parse_root(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
    statement: &str,
    open: Option<TokenKind>,
    close: TokenKind,
) -> Result<Node, SyntaxError> {
    let start = match open {
        Some(open) => stream.expect(&[open])?.location,
        None => start,
    };

    stream.with_intercept(&[TokenKind::Newline, TokenKind::End], |stream| -> Result<Node, SyntaxError> {
        let mut statements = Vec::new();

        loop {
            while stream.check(TokenKind::Newline) || stream.check(TokenKind::Semicolon) {
                stream.next()?;
            }
            if stream.check(close) {
                stream.next()?;
                break;
            }
            statements.push(registry.delegate(statement, stream)?);
        }

        Ok(Node::Root {
            statements,
            span: Span::new(start, stream.last_end()),
        })
    })
}

fn parse_list(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
    element: &str,
    brackets: Option<(TokenKind, TokenKind)>,
    separator: TokenKind,
) -> Result<Node, SyntaxError> {
    let Some((open, close)) = brackets.filter(|(open, _)| stream.check(*open)) else {
        let item = registry.delegate_from(element, stream, start)?;
        return Ok(Node::List {
            span: item.span(),
            items: vec![item],
        });
    };

    stream.with_ignore(&[TokenKind::Newline], |stream| -> Result<Node, SyntaxError> {
        stream.expect(&[open])?;

        let mut items = Vec::new();
        if !stream.check(close) {
            loop {
                items.push(registry.delegate(element, stream)?);
                if stream.accept(separator)?.is_none() {
                    break;
                }
            }
        }
        stream.expect(&[close])?;

        Ok(Node::List {
            items,
            span: Span::new(start, stream.last_end()),
        })
    })
}

fn span_from(stream: &TokenStream, start: SourceLocation) -> Span {
    Span::new(start, stream.last_end())
}

fn identifier(stream: &mut TokenStream) -> Result<Identifier, SyntaxError> {
    let token = stream.expect(&[TokenKind::Identifier])?;
    Ok(Identifier {
        span: token.span(),
        name: token.value,
    })
}

fn identifiers(node: Node) -> Vec<Identifier> {
    node.into_items()
        .into_iter()
        .filter_map(|item| match item {
            Node::Identifier(identifier) => Some(identifier),
            _ => None,
        })
        .collect()
}

fn strings(node: Node) -> Vec<String> {
    node.into_items()
        .into_iter()
        .filter_map(|item| match item {
            Node::Str { value, .. } => Some(value),
            _ => None,
        })
        .collect()
}

/// Resolves backslash escapes in the body of a quoted literal.
fn unescape(body: &str) -> String {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

/// Strips the one-character delimiters around a quoted token value.
fn unquote(value: &str) -> &str {
    let mut chars = value.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

fn named_character(name: &str) -> Option<&'static str> {
    match name {
        "eps" | "epsilon" => Some(EPSILON),
        "blank" => Some(BLANK),
        "tab" => Some("\t"),
        "newline" => Some("\n"),
        _ => None,
    }
}

fn parse_identifier(
    _: &ParserRegistry,
    stream: &mut TokenStream,
    _: SourceLocation,
) -> Result<Node, SyntaxError> {
    identifier(stream).map(Node::Identifier)
}

fn parse_character(
    _: &ParserRegistry,
    stream: &mut TokenStream,
    _: SourceLocation,
) -> Result<Node, SyntaxError> {
    let token = stream.expect(&[
        TokenKind::Character,
        TokenKind::QuotedCharacter,
        TokenKind::NamedCharacter,
    ])?;
    let span = token.span();

    let value = match token.kind {
        TokenKind::QuotedCharacter => unescape(unquote(&token.value)),
        TokenKind::NamedCharacter => named_character(&token.value[1..])
            .ok_or_else(|| {
                SyntaxError::invalid(
                    format!("unsupported named character '{}'", token.value),
                    span,
                )
            })?
            .to_string(),
        _ => token.value,
    };

    Ok(Node::Character { value, span })
}

fn parse_string(
    _: &ParserRegistry,
    stream: &mut TokenStream,
    _: SourceLocation,
) -> Result<Node, SyntaxError> {
    let token = stream.expect(&[TokenKind::String, TokenKind::UnterminatedString])?;
    if token.kind == TokenKind::UnterminatedString {
        return Err(SyntaxError::invalid("unterminated string", token.span()));
    }

    Ok(Node::Str {
        value: unescape(unquote(&token.value)),
        span: token.span(),
    })
}

fn non_terminal_name(token: Token) -> Result<(String, Span), SyntaxError> {
    match token.kind {
        TokenKind::NonTerminal => Ok((unquote(&token.value).to_string(), token.span())),
        TokenKind::UnclosedNonTerminal => Err(SyntaxError::invalid(
            "unclosed non-terminal reference",
            token.span(),
        )),
        _ => Ok((token.value.clone(), token.span())),
    }
}

fn parse_non_terminal(
    _: &ParserRegistry,
    stream: &mut TokenStream,
    _: SourceLocation,
) -> Result<Node, SyntaxError> {
    let token = stream.expect(&[TokenKind::NonTerminal, TokenKind::UnclosedNonTerminal])?;
    let (name, span) = non_terminal_name(token)?;
    Ok(Node::NonTerminal { name, span })
}

fn parse_shift(
    _: &ParserRegistry,
    stream: &mut TokenStream,
    _: SourceLocation,
) -> Result<Node, SyntaxError> {
    let token = stream.expect(&[
        TokenKind::ShiftLeft,
        TokenKind::ShiftRight,
        TokenKind::NoShift,
    ])?;
    let direction = token
        .value
        .chars()
        .next()
        .and_then(Direction::from_char)
        .ok_or_else(|| SyntaxError::invalid("invalid shift direction", token.span()))?;

    Ok(Node::Shift {
        direction,
        span: token.span(),
    })
}

fn parse_qualified(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
    value: &str,
) -> Result<Node, SyntaxError> {
    let tape = identifier(stream)?;
    stream.expect(&[TokenKind::Colon])?;
    let value = registry.delegate(value, stream)?;

    Ok(Node::Qualified {
        tape,
        value: Box::new(value),
        span: span_from(stream, start),
    })
}

fn parse_qualified_symbol(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    parse_qualified(registry, stream, start, "condition")
}

fn parse_qualified_shift(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    parse_qualified(registry, stream, start, "shift")
}

fn parse_parenthesized(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    _: SourceLocation,
) -> Result<Node, SyntaxError> {
    let expression = registry.delegate("expression", stream)?;
    stream.expect(&[TokenKind::RightParen])?;
    Ok(expression)
}

/// The part shared by all automaton declarations after the name and header.
fn parse_declaration(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
    kind: AutomatonKind,
    name: Identifier,
    tapes: Vec<Identifier>,
) -> Result<Node, SyntaxError> {
    if stream.accept(TokenKind::Equals)?.is_some() {
        let value = registry.delegate("expression", stream)?;
        return Ok(Node::Assignment {
            kind,
            name,
            value: Box::new(value),
            span: span_from(stream, start),
        });
    }

    let body = Box::new(registry.delegate("body", stream)?);
    let span = span_from(stream, start);

    Ok(match kind {
        AutomatonKind::Finite => Node::Finite { name, body, span },
        AutomatonKind::Pushdown => Node::Pushdown {
            name,
            stacks: tapes,
            body,
            span,
        },
        AutomatonKind::Turing => Node::Turing {
            name,
            tapes,
            body,
            span,
        },
    })
}

/// Parses `keyword names` if the next token is the contextual `keyword`.
fn parse_header(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    keyword: &str,
) -> Result<Vec<Identifier>, SyntaxError> {
    if !stream.check_word(keyword) {
        return Ok(Vec::new());
    }
    stream.next()?;
    Ok(identifiers(registry.delegate("name_list", stream)?))
}

fn parse_finite(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let name = identifier(stream)?;
    parse_declaration(registry, stream, start, AutomatonKind::Finite, name, Vec::new())
}

fn parse_pushdown(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let name = identifier(stream)?;
    let stacks = parse_header(registry, stream, "stacks")?;
    parse_declaration(registry, stream, start, AutomatonKind::Pushdown, name, stacks)
}

fn parse_turing(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let name = identifier(stream)?;
    let tapes = parse_header(registry, stream, "tapes")?;
    parse_declaration(registry, stream, start, AutomatonKind::Turing, name, tapes)
}

fn parse_grammar(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let name = identifier(stream)?;

    let start_symbol = if stream.check_word("start") {
        stream.next()?;
        let token = stream.with_syntax(LexMode::Grammar, |s| {
            s.expect(&[
                TokenKind::Identifier,
                TokenKind::NonTerminal,
                TokenKind::UnclosedNonTerminal,
            ])
        })?;
        let (name, span) = non_terminal_name(token)?;
        Some(Identifier { name, span })
    } else {
        None
    };

    let body = stream.with_syntax(LexMode::Grammar, |s| registry.delegate("grammar_body", s))?;

    Ok(Node::Grammar {
        name,
        start: start_symbol,
        body: Box::new(body),
        span: span_from(stream, start),
    })
}

fn parse_production(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let head = stream.expect(&[TokenKind::NonTerminal, TokenKind::UnclosedNonTerminal])?;
    let (head, _) = non_terminal_name(head)?;
    stream.expect(&[TokenKind::Arrow])?;

    let mut alternatives = Vec::new();
    loop {
        let mut sequence = Vec::new();
        while let Ok(token) = stream.peek() {
            let rule = match token.kind {
                TokenKind::String | TokenKind::UnterminatedString => "string",
                TokenKind::NonTerminal | TokenKind::UnclosedNonTerminal => "non_terminal",
                _ => break,
            };
            sequence.push(registry.delegate(rule, stream)?);
        }
        alternatives.push(sequence);

        if stream.accept(TokenKind::Pipe)?.is_none() {
            break;
        }
    }

    Ok(Node::Production {
        head,
        alternatives,
        span: span_from(stream, start),
    })
}

fn parse_initial(
    _: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let state = identifier(stream)?;
    Ok(Node::Initial {
        state,
        span: span_from(stream, start),
    })
}

fn parse_final(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let states = identifiers(registry.delegate("name_list", stream)?);
    Ok(Node::Final {
        states,
        span: span_from(stream, start),
    })
}

fn parse_print(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let message = strings(registry.delegate("string", stream)?).concat();
    Ok(Node::Print {
        message,
        span: span_from(stream, start),
    })
}

fn parse_test(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let automaton = identifier(stream)?;
    let inputs = strings(registry.delegate("string_list", stream)?);
    Ok(Node::Test {
        automaton,
        inputs,
        span: span_from(stream, start),
    })
}

fn parse_finite_transition(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let from = identifier(stream)?;
    let condition = registry.delegate("condition", stream)?;
    stream.expect(&[TokenKind::Arrow])?;
    let to = identifier(stream)?;

    Ok(Node::FiniteTransition {
        from,
        condition: Box::new(condition),
        to,
        span: span_from(stream, start),
    })
}

fn parse_pushdown_transition(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let from = identifier(stream)?;
    let condition = registry.delegate("condition", stream)?;

    let pop = if stream.check_word("pop") {
        stream.next()?;
        Some(registry.delegate("symbols", stream)?.into_items())
    } else {
        None
    };

    stream.expect(&[TokenKind::Arrow])?;
    let to = identifier(stream)?;

    let push = if stream.check_word("push") {
        stream.next()?;
        Some(registry.delegate("symbols", stream)?.into_items())
    } else {
        None
    };

    let span = span_from(stream, start);
    if pop.is_none() && push.is_none() {
        return Err(SyntaxError::invalid(
            "a pushdown transition needs 'pop' or 'push'",
            span,
        ));
    }

    Ok(Node::PushdownTransition {
        from,
        condition: Box::new(condition),
        pop: pop.unwrap_or_default(),
        to,
        push: push.unwrap_or_default(),
        span,
    })
}

fn parse_turing_transition(
    registry: &ParserRegistry,
    stream: &mut TokenStream,
    start: SourceLocation,
) -> Result<Node, SyntaxError> {
    let from = identifier(stream)?;
    let read = registry.delegate("symbols", stream)?.into_items();
    stream.expect(&[TokenKind::Arrow])?;
    let to = identifier(stream)?;
    let write = registry.delegate("symbols", stream)?.into_items();
    let shift = registry.delegate("shifts", stream)?.into_items();

    Ok(Node::TuringTransition {
        from,
        read,
        to,
        write,
        shift,
        span: span_from(stream, start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(source: &str) -> Vec<Node> {
        match parse(source).unwrap().0 {
            Node::Root { statements, .. } => statements,
            other => panic!("Expected Root, got {:?}", other),
        }
    }

    fn body(node: &Node) -> &[Node] {
        match node {
            Node::Finite { body, .. }
            | Node::Pushdown { body, .. }
            | Node::Turing { body, .. }
            | Node::Grammar { body, .. } => match body.as_ref() {
                Node::Root { statements, .. } => statements,
                other => panic!("Expected Root body, got {:?}", other),
            },
            other => panic!("Expected declaration, got {:?}", other),
        }
    }

    fn character(node: &Node) -> &str {
        match node {
            Node::Character { value, .. } | Node::Str { value, .. } => value,
            Node::Qualified { value, .. } => character(value),
            other => panic!("Expected character, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_module() {
        assert!(statements("").is_empty());
        assert!(statements("\n\n  // only a comment\n").is_empty());
    }

    #[test]
    fn test_parse_finite_one_line() {
        let module = statements("finite x { initial a  final a  a a -> a }");
        assert_eq!(module.len(), 1);

        let body = body(&module[0]);
        assert_eq!(body.len(), 3);
        assert!(matches!(&body[0], Node::Initial { state, .. } if state.name == "a"));
        assert!(matches!(&body[1], Node::Final { states, .. } if states.len() == 1));
        match &body[2] {
            Node::FiniteTransition {
                from,
                condition,
                to,
                ..
            } => {
                assert_eq!(from.name, "a");
                assert_eq!(character(condition), "a");
                assert_eq!(to.name, "a");
            }
            other => panic!("Expected FiniteTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_multiline_body_with_separators() {
        let source = r#"
finite even {
  initial a0; final [a0]
  a0 a -> a1   // comment
  a0 b -> a0
  a1 'a' -> a0
  a1 "b" -> a1
}
"#;
        let module = statements(source);
        let body = body(&module[0]);

        assert_eq!(body.len(), 6);
        assert!(body[2..]
            .iter()
            .all(|n| matches!(n, Node::FiniteTransition { .. })));
    }

    #[test]
    fn test_parse_named_and_quoted_characters() {
        let module = statements("finite x {\n a $eps -> b\n b '\\n' -> c\n c $blank -> a\n}");
        let body = body(&module[0]);

        let conditions: Vec<_> = body
            .iter()
            .map(|n| match n {
                Node::FiniteTransition { condition, .. } => character(condition).to_string(),
                other => panic!("Expected FiniteTransition, got {:?}", other),
            })
            .collect();
        assert_eq!(conditions, vec!["", "\n", " "]);
    }

    #[test]
    fn test_parse_unsupported_named_character() {
        let error = parse("finite x { a $bogus -> b }").unwrap_err();
        assert!(error.to_string().contains("unsupported named character"));
    }

    #[test]
    fn test_parse_name_reference_condition() {
        let module = statements("finite x { a digit -> b }");
        match &body(&module[0])[0] {
            Node::FiniteTransition { condition, .. } => {
                assert_eq!(condition.as_identifier().unwrap().name, "digit");
            }
            other => panic!("Expected FiniteTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_turing_transition() {
        let module = statements("turing t { q0 \"0\" -> q1 \"1\" > }");
        match &body(&module[0])[0] {
            Node::TuringTransition {
                read, write, shift, ..
            } => {
                assert_eq!(character(&read[0]), "0");
                assert_eq!(character(&write[0]), "1");
                assert!(matches!(
                    shift[0],
                    Node::Shift {
                        direction: Direction::Right,
                        ..
                    }
                ));
            }
            other => panic!("Expected TuringTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_multi_tape_turing() {
        let source = "turing t tapes [x, y] {\n initial q0\n q0 [x:a, y:b] -> q1 [y:c, x:d] [x:<, y:-]\n}";
        let module = statements(source);

        match &module[0] {
            Node::Turing { tapes, .. } => {
                let names: Vec<_> = tapes.iter().map(|t| t.name.as_str()).collect();
                assert_eq!(names, vec!["x", "y"]);
            }
            other => panic!("Expected Turing, got {:?}", other),
        }

        match &body(&module[0])[1] {
            Node::TuringTransition {
                read, write, shift, ..
            } => {
                assert_eq!(read.len(), 2);
                assert!(matches!(&write[0], Node::Qualified { tape, .. } if tape.name == "y"));
                assert_eq!(shift.len(), 2);
            }
            other => panic!("Expected TuringTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pushdown_transitions() {
        let source = "pushdown p {\n q0 a -> q0 push A\n q0 b pop A -> q1\n q1 $eps pop [Z] -> q2 push []\n}";
        let module = statements(source);
        let body = body(&module[0]);

        assert!(matches!(&body[0], Node::PushdownTransition { pop, push, .. } if pop.is_empty() && push.len() == 1));
        assert!(matches!(&body[1], Node::PushdownTransition { pop, push, .. } if pop.len() == 1 && push.is_empty()));
        assert!(matches!(&body[2], Node::PushdownTransition { .. }));
    }

    #[test]
    fn test_parse_transition_without_arrow() {
        let error = parse("finite x { a b c }").unwrap_err();
        assert!(matches!(error, SyntaxError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_parse_missing_closing_brace() {
        let error = parse("finite x {\n initial a\n").unwrap_err();
        assert!(matches!(error, SyntaxError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_parse_unterminated_string() {
        let error = parse("print \"hello").unwrap_err();
        assert!(error.to_string().contains("unterminated string"));
    }

    #[test]
    fn test_parse_print_and_test() {
        let module = statements("print \"hi\\tthere\"\ntest even [\"\", \"aa\",\n \"ab\"]\ntest even \"a\"");

        assert!(matches!(&module[0], Node::Print { message, .. } if message == "hi\tthere"));
        assert!(matches!(&module[1], Node::Test { inputs, .. } if inputs.len() == 3));
        assert!(matches!(&module[2], Node::Test { inputs, .. } if inputs == &vec!["a".to_string()]));
    }

    #[test]
    fn test_parse_expressions() {
        let module = statements("finite z = complement determinize a union (b intersection c) concatenate d");

        let Node::Assignment { kind, value, .. } = &module[0] else {
            panic!("Expected Assignment, got {:?}", module[0]);
        };
        assert_eq!(*kind, AutomatonKind::Finite);

        // Left fold: ((complement determinize a) union (b intersection c)) concatenate d
        let Node::Binary { op, left, right, .. } = value.as_ref() else {
            panic!("Expected Binary, got {:?}", value);
        };
        assert_eq!(*op, BinaryOp::Concatenate);
        assert_eq!(right.as_identifier().unwrap().name, "d");

        let Node::Binary { op, left, right, .. } = left.as_ref() else {
            panic!("Expected Binary, got {:?}", left);
        };
        assert_eq!(*op, BinaryOp::Union);
        assert!(matches!(right.as_ref(), Node::Binary { op: BinaryOp::Intersection, .. }));
        assert!(matches!(left.as_ref(), Node::Unary { op: UnaryOp::Complement, operand, .. }
            if matches!(operand.as_ref(), Node::Unary { op: UnaryOp::Determinize, .. })));
    }

    #[test]
    fn test_parse_grammar() {
        let source = "grammar g start <S> {\n <S> -> \"a\" <S> \"b\" | \"\"\n <T> -> | <S>\n}";
        let module = statements(source);

        let Node::Grammar { start, .. } = &module[0] else {
            panic!("Expected Grammar, got {:?}", module[0]);
        };
        assert_eq!(start.as_ref().unwrap().name, "S");

        let body = body(&module[0]);
        match &body[0] {
            Node::Production {
                head, alternatives, ..
            } => {
                assert_eq!(head, "S");
                assert_eq!(alternatives.len(), 2);
                assert_eq!(alternatives[0].len(), 3);
            }
            other => panic!("Expected Production, got {:?}", other),
        }
        assert!(matches!(&body[1], Node::Production { alternatives, .. } if alternatives[0].is_empty()));
    }

    #[test]
    fn test_parse_unclosed_non_terminal() {
        let error = parse("grammar g {\n <S -> \"a\"\n}").unwrap_err();
        assert!(error.to_string().contains("unclosed non-terminal"));
    }

    #[test]
    fn test_spans_cover_statement() {
        let module = statements("finite x {\n  a b -> c\n}");
        let transition = &body(&module[0])[0];

        let span = transition.span();
        assert_eq!((span.start.line, span.start.column), (2, 3));
        assert_eq!((span.end.line, span.end.column), (2, 11));
        assert_eq!(module[0].span().start.offset, 0);
    }

    fn parse_pair(
        _: &ParserRegistry,
        stream: &mut TokenStream,
        start: SourceLocation,
    ) -> Result<Node, SyntaxError> {
        identifier(stream)?;
        identifier(stream)?;
        stream.expect(&[TokenKind::Arrow])?;
        Ok(Node::List {
            items: vec![],
            span: span_from(stream, start),
        })
    }

    #[test]
    fn test_alternative_restores_cursor() {
        let mut registry = ParserRegistry::standard();
        registry.register("pair", Combinator::Call(parse_pair));
        registry.register("either", Combinator::Alternative(vec!["pair", "identifier"]));

        let mut stream = TokenStream::new("a b c");
        let node = registry.delegate("either", &mut stream).unwrap();

        assert_eq!(node.as_identifier().unwrap().name, "a");
        assert_eq!(stream.next().unwrap().value, "b");
    }

    #[test]
    fn test_alternative_reports_last_error() {
        let mut registry = ParserRegistry::standard();
        registry.register("pair", Combinator::Call(parse_pair));
        registry.register("either", Combinator::Alternative(vec!["pair", "string"]));

        let mut stream = TokenStream::new("a b c");
        let error = registry.delegate("either", &mut stream).unwrap_err();

        match error {
            SyntaxError::UnexpectedToken { expected, .. } => {
                assert!(expected.contains(&TokenKind::String));
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
        assert_eq!(stream.index(), 0);
    }

    #[test]
    fn test_choose_lists_prefixes() {
        let registry = ParserRegistry::standard();
        let mut stream = TokenStream::new("}");

        let error = registry.delegate("primary", &mut stream).unwrap_err();
        match error {
            SyntaxError::UnexpectedToken { expected, .. } => {
                assert_eq!(expected, vec![TokenKind::LeftParen, TokenKind::Identifier]);
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_rule() {
        let registry = ParserRegistry::new();
        let mut stream = TokenStream::new("a");
        assert!(registry.delegate("module", &mut stream).is_err());
    }
}
