//! Lexical front end.
//!
//! This module converts module source text into a [`TokenStream`].
//! It handles:
//!
//! - Case-insensitive keyword recognition
//! - Number formats (decimal, hex `&H`, octal `&O`, floats)
//! - String literals with doubled-quote escaping
//! - Comments (both `'` and `Rem` styles)
//! - Line continuations (` _` at end of line)
//! - Conditional compilation directives
//!
//! ## Example
//!
//! ```
//! use mallard::lexer::{tokenize, TokenKind};
//!
//! let stream = tokenize("Dim x As Long");
//! let kinds: Vec<_> = stream.significant().map(|t| t.kind).collect();
//! assert_eq!(kinds, vec![TokenKind::Dim, TokenKind::Identifier, TokenKind::As, TokenKind::Identifier]);
//! assert_eq!(stream.text(), "Dim x As Long");
//! ```
//!
//! ## Design Notes
//!
//! The lexer is built on the [`logos`](https://docs.rs/logos) crate. We wrap
//! logos in our own [`Lexer`] to attach line/column positions and stream
//! indices, and to turn unrecognized input into [`TokenKind::Unknown`]
//! tokens instead of dropping it. Tokenizing never fails; malformed input is
//! reported later by the preprocessor or the parser.

mod token;

pub use token::{Channel, Token, TokenKind};

use logos::Logos;
use std::sync::atomic::{AtomicU64, Ordering};

/// The lexer for module source text.
///
/// Wraps a `logos` lexer and provides an iterator interface that yields
/// [`Token`]s with their source positions.
pub struct Lexer<'source> {
    /// The underlying logos lexer
    inner: logos::Lexer<'source, TokenKind>,
    /// The original source
    source: &'source str,
    /// Line of the next token
    line: usize,
    /// Column of the next token
    column: usize,
    /// Index of the next token
    index: usize,
}

impl<'source> Lexer<'source> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            source,
            line: 1,
            column: 1,
            index: 0,
        }
    }

    /// Get the original source text.
    pub fn source(&self) -> &'source str {
        self.source
    }

    /// Get the next token, if any.
    ///
    /// Returns `None` when the end of input is reached. Unrecognized input
    /// becomes a [`TokenKind::Unknown`] token.
    pub fn next_token(&mut self) -> Option<Token> {
        let kind = self.inner.next()?.unwrap_or(TokenKind::Unknown);
        let span = self.inner.span();
        let text = self.inner.slice();

        let mut token = Token::new(kind, span, text);
        token.line = self.line;
        token.column = self.column;
        token.index = self.index;

        self.index += 1;
        self.advance_position(text);
        Some(token)
    }

    /// Moves the line/column cursor past `text`.
    fn advance_position(&mut self, text: &str) {
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' if chars.peek() == Some(&'\n') => {}
                '\r' | '\n' => {
                    self.line += 1;
                    self.column = 1;
                }
                _ => self.column += 1,
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Identifies one token stream for the lifetime of the process.
///
/// Trees and rewriters record the id of the stream they were built from, so
/// an edit addressed through a node of one pass can never be applied to the
/// stream of the other pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StreamId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// An ordered, indexable sequence of tokens produced from one text snapshot.
///
/// The stream is lossless: concatenating every token's text (on every
/// channel) yields the original input.
#[derive(Debug, Clone)]
pub struct TokenStream {
    id: StreamId,
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Wraps already-lexed tokens in a new stream with a fresh id.
    ///
    /// Token indices are renumbered to match their positions.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        for (index, token) in tokens.iter_mut().enumerate() {
            token.index = index;
        }
        Self {
            id: StreamId::next(),
            tokens,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Iterates over all tokens, including hidden and inactive ones.
    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Iterates over the tokens the parser will see.
    pub fn significant(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_significant())
    }

    /// Sets the channel of one token.
    ///
    /// Used by the conditional compilation evaluator on the stream it owns.
    pub(crate) fn set_channel(&mut self, index: usize, channel: Channel) {
        if let Some(token) = self.tokens.get_mut(index) {
            token.channel = channel;
        }
    }

    /// Reconstructs the full text the stream was lexed from.
    pub fn text(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// Reconstructs the text of the tokens in `start..=end`.
    pub fn text_between(&self, start: usize, end: usize) -> String {
        self.tokens
            .get(start..=end.min(self.tokens.len().saturating_sub(1)))
            .map(|tokens| tokens.iter().map(|t| t.text.as_str()).collect())
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// Tokenizes source text into a new stream.
///
/// Pure and deterministic; never fails.
pub fn tokenize(source: &str) -> TokenStream {
    TokenStream::new(Lexer::new(source).collect())
}

/// Convenience function returning the raw token vector.
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant_kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).significant().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexer_iterator() {
        let tokens: Vec<_> = Lexer::new("Dim x").collect();
        // Dim, whitespace, x
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, TokenKind::Whitespace);
        assert_eq!(tokens[1].channel, Channel::Hidden);
    }

    #[test]
    fn test_token_spans() {
        let tokens = lex("Call Foo");
        assert_eq!(tokens[0].span, 0..4);
        assert_eq!(tokens[0].text, "Call");
        assert_eq!(tokens[2].span, 5..8);
        assert_eq!(tokens[2].text, "Foo");
    }

    #[test]
    fn test_line_and_column() {
        let tokens = lex("x = 1\r\n  y = 2");
        let y = tokens.iter().find(|t| t.text == "y").unwrap();
        assert_eq!(y.line, 2);
        assert_eq!(y.column, 3);
    }

    #[test]
    fn test_columns_count_characters() {
        let tokens = lex("Dim größe As Long");
        let as_token = tokens.iter().find(|t| t.kind == TokenKind::As).unwrap();
        assert_eq!(as_token.column, 11);
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Unknown));
    }

    #[test]
    fn test_line_continuation_advances_line() {
        let tokens = lex("Foo a, _\n    b");
        let b = tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!(b.line, 2);
        assert_eq!(b.column, 5);
        assert!(
            tokens
                .iter()
                .any(|t| t.kind == TokenKind::LineContinuation && t.channel == Channel::Hidden)
        );
    }

    #[test]
    fn test_unknown_characters_are_kept() {
        let stream = tokenize("x = 1 ~ 2");
        assert!(stream.iter().any(|t| t.kind == TokenKind::Unknown && t.text == "~"));
        assert_eq!(stream.text(), "x = 1 ~ 2");
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let source = "Attribute VB_Name = \"Module1\"\r\nOption Explicit\r\n\r\n'@Folder(\"A\")\r\nPublic Sub Foo(ByVal a As Long) ' note\r\n    Debug.Print a & \"x\" _\r\n        ; 42\r\nEnd Sub\r\n";
        assert_eq!(tokenize(source).text(), source);
    }

    #[test]
    fn test_multiline() {
        assert_eq!(
            significant_kinds("x = 1\ny = 2"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::IntegerLiteral,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::IntegerLiteral,
            ]
        );
    }

    #[test]
    fn test_stream_ids_are_unique() {
        let a = tokenize("x");
        let b = tokenize("x");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_text_between() {
        let stream = tokenize("Dim x As Long");
        assert_eq!(stream.text_between(2, 4), "x As");
        assert_eq!(stream.text_between(4, 100), "As Long");
    }

    #[test]
    fn test_token_indices_match_positions() {
        let stream = tokenize("a b c");
        for (i, token) in stream.iter().enumerate() {
            assert_eq!(token.index, i);
        }
    }
}
