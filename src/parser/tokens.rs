//! Token navigation utilities for the parser.
//!
//! This module provides the low-level token stream operations that form
//! the foundation of the recursive descent parser:
//! - Peeking at tokens without consuming them
//! - Advancing through the token stream
//! - Matching and expecting specific tokens
//! - Error recovery (synchronization)
//! - Source positions of consumed ranges

use crate::ast::{Clause, Span, TokenRange};
use crate::lexer::{Token, TokenKind};
use crate::module::Selection;

use super::error::Location;
use super::{ParseError, Parser};

/// Source positions of a run of consumed tokens.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Extent {
    pub span: Span,
    pub tokens: TokenRange,
    pub selection: Selection,
}

impl Extent {
    pub fn clause(self) -> Clause {
        Clause {
            span: self.span,
            tokens: self.tokens,
            selection: self.selection,
            remark: None,
        }
    }
}

impl<'a> Parser<'a> {
    // ==================== Token Navigation ====================

    /// Returns the current token without consuming it.
    pub(super) fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.current).copied()
    }

    /// Returns the kind of the current token.
    pub(super) fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// Looks ahead n tokens (0 = current token).
    pub(super) fn peek_ahead(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.current + n).copied()
    }

    /// Consumes and returns the current token.
    pub(super) fn advance(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    /// Returns true if we've reached the end of the token stream.
    pub(super) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    /// Checks if the current token matches the expected kind.
    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    /// Checks if the current token is one of the expected kinds.
    pub(super) fn check_any(&self, kinds: &[TokenKind]) -> bool {
        self.peek_kind().is_some_and(|k| kinds.contains(&k))
    }

    /// Checks for an identifier spelled `word`, ignoring case.
    pub(super) fn check_word(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Identifier && t.text.eq_ignore_ascii_case(word))
    }

    /// Checks for `End` followed by `kind`.
    pub(super) fn check_end(&self, kind: TokenKind) -> bool {
        self.check(TokenKind::End) && self.peek_ahead(1).is_some_and(|t| t.kind == kind)
    }

    /// Consumes the current token if it matches, returns true if consumed.
    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects the current token to match, or records an error.
    pub(super) fn expect(&mut self, kind: TokenKind, expected_desc: &str) -> Result<&'a Token, ()> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.current += 1;
                Ok(token)
            }
            _ => {
                self.error_expected(expected_desc);
                Err(())
            }
        }
    }

    /// Expects a name (identifier or bracketed identifier).
    pub(super) fn expect_name(&mut self, expected_desc: &str) -> Result<&'a Token, ()> {
        match self.peek() {
            Some(token) if token.kind.is_name() => {
                self.current += 1;
                Ok(token)
            }
            _ => {
                self.error_expected(expected_desc);
                Err(())
            }
        }
    }

    /// Returns true at a statement boundary: end of line, `:`, a remark, or
    /// end of input.
    pub(super) fn at_statement_end(&self) -> bool {
        match self.peek_kind() {
            None => true,
            Some(kind) => matches!(kind, TokenKind::Newline | TokenKind::Colon) || kind.is_comment(),
        }
    }

    /// Returns true at the end of a physical line (or a remark ending it).
    pub(super) fn at_line_end(&self) -> bool {
        match self.peek_kind() {
            None => true,
            Some(kind) => kind == TokenKind::Newline || kind.is_comment(),
        }
    }

    // ==================== Errors ====================

    /// Records an error.
    pub(super) fn error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Records an "expected X" error at the current token.
    pub(super) fn error_expected(&mut self, expected_desc: &str) {
        let error = match self.peek() {
            Some(token) => ParseError::unexpected(expected_desc, token),
            None => ParseError::UnexpectedEof {
                expected: expected_desc.to_string(),
                at: self.end_location(),
            },
        };
        self.errors.push(error);
    }

    /// Location just past the last token.
    pub(super) fn end_location(&self) -> Location {
        self.tokens.last().map(|t| Location::after(t)).unwrap_or_default()
    }

    /// Attempts to recover from an error by skipping past the end of the
    /// current line.
    pub(super) fn synchronize(&mut self) {
        self.pending_next = 0;
        self.shared_next = None;
        self.skip_line();
    }

    // ==================== Positions ====================

    /// Positions of the tokens consumed since `start` (an index into the
    /// parser's token list).
    pub(super) fn extent_from(&self, start: usize) -> Extent {
        let end = if self.current > start { self.current - 1 } else { start };
        let (Some(first), Some(last)) = (self.tokens.get(start), self.tokens.get(end)) else {
            return Extent::default();
        };
        Extent {
            span: Span::new(first.span.start, last.span.end),
            tokens: TokenRange::new(first.index, last.index),
            selection: Selection::new(first.line, first.column, last.end_line(), last.end_column()),
        }
    }

    /// Positions of the tokens in `start..end`, ignoring trailing line breaks.
    pub(super) fn extent_between(&self, start: usize, end: usize) -> Extent {
        let mut end = end;
        while end > start + 1 && self.tokens.get(end - 1).is_some_and(|t| t.kind == TokenKind::Newline) {
            end -= 1;
        }
        let (Some(first), Some(last)) = (self.tokens.get(start), self.tokens.get(end.max(start + 1) - 1)) else {
            return Extent::default();
        };
        Extent {
            span: Span::new(first.span.start, last.span.end),
            tokens: TokenRange::new(first.index, last.index),
            selection: Selection::new(first.line, first.column, last.end_line(), last.end_column()),
        }
    }

    /// Positions from the token at `start` through the end of `clause`.
    pub(super) fn extent_through(&self, start: usize, clause: &Clause) -> Extent {
        let Some(first) = self.tokens.get(start) else {
            return Extent::default();
        };
        Extent {
            span: Span::new(first.span.start, clause.span.end),
            tokens: TokenRange::new(first.index, clause.tokens.end),
            selection: Selection::new(
                first.line,
                first.column,
                clause.selection.end_line,
                clause.selection.end_column,
            ),
        }
    }

    /// Skips the rest of the current line, line break included.
    pub(super) fn skip_line(&mut self) {
        while let Some(token) = self.advance() {
            if token.kind == TokenKind::Newline {
                return;
            }
        }
    }

    /// Source text of the tokens from `first` to `last` inclusive, with the
    /// whitespace between them.
    pub(super) fn text_between(&self, first: &Token, last: &Token) -> String {
        self.stream.text_between(first.index, last.index)
    }

    /// Source text of the tokens consumed since `start`.
    pub(super) fn text_from(&self, start: usize) -> String {
        match (self.tokens.get(start), self.current.checked_sub(1).and_then(|i| self.tokens.get(i))) {
            (Some(first), Some(last)) if self.current > start => self.text_between(first, last),
            _ => String::new(),
        }
    }
}
