//! The token stream consumed by the parser combinators.
//!
//! Tokens are lexed lazily into a single buffer and read through a cursor. Scoped
//! operations (`syntax`, `intercept`, `ignore`) temporarily change the active lexer modes
//! or the set of insignificant token kinds; `checkpoint` is the backtracking primitive.

use crate::lexer::{self, LexMode, Rule};
use crate::token::{SourceLocation, Token, TokenKind};
use crate::types::SyntaxError;
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

/// Token kinds skipped by `next` unless intercepted.
pub const DEFAULT_IGNORED: [TokenKind; 4] = [
    TokenKind::Whitespace,
    TokenKind::Newline,
    TokenKind::Comment,
    TokenKind::End,
];

/// The scoped part of the stream state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    modes: Vec<LexMode>,
    ignored: BTreeSet<TokenKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            modes: vec![LexMode::Base],
            ignored: DEFAULT_IGNORED.into_iter().collect(),
        }
    }
}

/// A saved stream position, restored on rollback.
#[derive(Debug, Clone)]
pub struct Snapshot {
    index: usize,
    last_end: SourceLocation,
    settings: Settings,
}

/// The outcome of a [`TokenStream::checkpoint`] that did not commit to its error.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Done(T),
    RolledBack(SyntaxError),
}

/// Passed to checkpoint callbacks; committing keeps the cursor even if the callback fails.
#[derive(Debug, Default)]
pub struct Commit {
    committed: bool,
}

impl Commit {
    pub fn commit(&mut self) {
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

#[derive(Debug, Clone)]
struct Buffered {
    token: Token,
    modes: Vec<LexMode>,
}

pub struct TokenStream<'a> {
    source: &'a str,
    buffer: Vec<Buffered>,
    index: usize,
    last_end: SourceLocation,
    settings: Settings,
    rules: Vec<&'static Rule>,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        let settings = Settings::default();
        let rules = lexer::active_rules(&settings.modes);

        Self {
            source,
            buffer: Vec::new(),
            index: 0,
            last_end: SourceLocation::start(),
            settings,
            rules,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// The cursor into the token buffer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Every token lexed so far, in source order.
    pub fn tokens(&self) -> Vec<Token> {
        self.buffer.iter().map(|b| b.token.clone()).collect()
    }

    /// End location of the last significant token consumed.
    pub fn last_end(&self) -> SourceLocation {
        self.last_end
    }

    /// Start location of the next significant token.
    pub fn location(&mut self) -> SourceLocation {
        match self.peek() {
            Ok(token) => token.location,
            Err(e) => e.span().start,
        }
    }

    pub fn is_ignored(&self, kind: TokenKind) -> bool {
        self.settings.ignored.contains(&kind)
    }

    /// Makes sure the buffer holds a token at `index` that was lexed with the active modes.
    ///
    /// Returns the index actually available, which is clamped to the end-of-input token.
    fn fill(&mut self, index: usize) -> usize {
        // Tokens restored by a rollback may have been lexed under other modes.
        if self
            .buffer
            .get(index)
            .is_some_and(|b| b.modes != self.settings.modes)
        {
            self.buffer.truncate(index);
        }

        while self.buffer.len() <= index {
            if let Some(last) = self.buffer.last() {
                if last.token.kind == TokenKind::End {
                    return self.buffer.len() - 1;
                }
            }

            let location = self
                .buffer
                .last()
                .map_or(SourceLocation::start(), |b| b.token.end);
            let token = lexer::lex(self.source, location, &self.rules);
            self.buffer.push(Buffered {
                token,
                modes: self.settings.modes.clone(),
            });
        }

        index
    }

    fn advance(&mut self, expected: &[TokenKind]) -> Result<Token, SyntaxError> {
        loop {
            let i = self.fill(self.index);
            let token = self.buffer[i].token.clone();

            if token.kind == TokenKind::End {
                if self.is_ignored(TokenKind::End) {
                    return Err(SyntaxError::UnexpectedEnd {
                        location: token.location,
                        expected: expected.to_vec(),
                    });
                }
                self.index = i;
                self.last_end = token.end;
                return Ok(token);
            }

            self.index = i + 1;
            if !self.is_ignored(token.kind) {
                self.last_end = token.end;
                return Ok(token);
            }
        }
    }

    /// Consumes and returns the next significant token.
    pub fn next(&mut self) -> Result<Token, SyntaxError> {
        self.advance(&[])
    }

    /// Returns the next significant token without consuming it.
    pub fn peek(&mut self) -> Result<Token, SyntaxError> {
        self.peek_nth(0)
    }

    /// Returns the `n`-th significant token ahead without consuming anything.
    pub fn peek_nth(&mut self, n: usize) -> Result<Token, SyntaxError> {
        self.peek_expecting(n, &[])
    }

    fn peek_expecting(&mut self, n: usize, expected: &[TokenKind]) -> Result<Token, SyntaxError> {
        let (index, last_end) = (self.index, self.last_end);

        let mut result = self.advance(expected);
        for _ in 0..n {
            if result.is_err() {
                break;
            }
            result = self.advance(expected);
        }

        self.index = index;
        self.last_end = last_end;
        result
    }

    /// Returns true if the next significant token has the given kind.
    pub fn check(&mut self, kind: TokenKind) -> bool {
        self.peek().is_ok_and(|token| token.kind == kind)
    }

    /// Returns true if the next significant token is the identifier `word`.
    pub fn check_word(&mut self, word: &str) -> bool {
        self.peek()
            .is_ok_and(|token| token.kind == TokenKind::Identifier && token.value == word)
    }

    /// Consumes the next token if it has the given kind.
    pub fn accept(&mut self, kind: TokenKind) -> Result<Option<Token>, SyntaxError> {
        if self.check(kind) {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Consumes the next token, failing unless its kind is one of `kinds`.
    pub fn expect(&mut self, kinds: &[TokenKind]) -> Result<Token, SyntaxError> {
        let token = self.peek_expecting(0, kinds)?;
        if token.kind == TokenKind::End && !kinds.contains(&TokenKind::End) {
            return Err(SyntaxError::UnexpectedEnd {
                location: token.location,
                expected: kinds.to_vec(),
            });
        }
        if !kinds.contains(&token.kind) {
            return Err(SyntaxError::UnexpectedToken {
                token,
                expected: kinds.to_vec(),
            });
        }
        self.advance(kinds)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            index: self.index,
            last_end: self.last_end,
            settings: self.settings.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.index = snapshot.index;
        self.last_end = snapshot.last_end;
        self.apply(snapshot.settings);
    }

    fn apply(&mut self, settings: Settings) {
        if settings.modes != self.settings.modes {
            self.buffer.truncate(self.index);
            self.rules = lexer::active_rules(&settings.modes);
        }
        self.settings = settings;
    }

    fn scoped(&mut self, update: impl FnOnce(&mut Settings)) -> Scoped<'_, 'a> {
        let saved = self.settings.clone();
        let mut settings = saved.clone();
        update(&mut settings);
        self.apply(settings);
        Scoped {
            stream: self,
            saved,
        }
    }

    fn with<T>(&mut self, update: impl FnOnce(&mut Settings), f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.settings.clone();
        let mut settings = saved.clone();
        update(&mut settings);
        self.apply(settings);
        let result = f(self);
        self.apply(saved);
        result
    }

    /// Lexes with `mode` pushed on top of the active modes until the guard is dropped.
    pub fn syntax(&mut self, mode: LexMode) -> Scoped<'_, 'a> {
        self.scoped(|s| s.modes.push(mode))
    }

    /// Stops ignoring `kinds` until the guard is dropped.
    pub fn intercept(&mut self, kinds: &[TokenKind]) -> Scoped<'_, 'a> {
        self.scoped(|s| s.ignored.retain(|kind| !kinds.contains(kind)))
    }

    /// Starts ignoring `kinds` until the guard is dropped.
    pub fn ignore(&mut self, kinds: &[TokenKind]) -> Scoped<'_, 'a> {
        self.scoped(|s| s.ignored.extend(kinds.iter().copied()))
    }

    pub fn with_syntax<T>(&mut self, mode: LexMode, f: impl FnOnce(&mut Self) -> T) -> T {
        self.with(|s| s.modes.push(mode), f)
    }

    pub fn with_intercept<T>(&mut self, kinds: &[TokenKind], f: impl FnOnce(&mut Self) -> T) -> T {
        self.with(|s| s.ignored.retain(|kind| !kinds.contains(kind)), f)
    }

    pub fn with_ignore<T>(&mut self, kinds: &[TokenKind], f: impl FnOnce(&mut Self) -> T) -> T {
        self.with(|s| s.ignored.extend(kinds.iter().copied()), f)
    }

    /// Runs `f`, rolling the stream back if it fails without committing.
    ///
    /// A rolled-back failure is returned as [`Attempt::RolledBack`]; a failure after
    /// [`Commit::commit`] keeps the cursor and is returned as `Err`.
    pub fn checkpoint<T>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut Commit) -> Result<T, SyntaxError>,
    ) -> Result<Attempt<T>, SyntaxError> {
        let snapshot = self.snapshot();
        let mut commit = Commit::default();

        match f(self, &mut commit) {
            Ok(value) => Ok(Attempt::Done(value)),
            Err(e) if commit.is_committed() => Err(e),
            Err(e) => {
                log::trace!("ROLLBACK: to token {} after {}", snapshot.index, e);
                self.restore(snapshot);
                Ok(Attempt::RolledBack(e))
            }
        }
    }
}

/// A stream view with temporarily changed settings, restored when dropped.
///
/// Progress made through the view stays visible to the underlying stream.
pub struct Scoped<'s, 'a> {
    stream: &'s mut TokenStream<'a>,
    saved: Settings,
}

impl<'a> Deref for Scoped<'_, 'a> {
    type Target = TokenStream<'a>;

    fn deref(&self) -> &Self::Target {
        self.stream
    }
}

impl DerefMut for Scoped<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stream
    }
}

impl Drop for Scoped<'_, '_> {
    fn drop(&mut self) {
        let saved = self.saved.clone();
        self.stream.apply(saved);
    }
}
