//! Parser error types.
//!
//! Parse errors capture what went wrong and where. The parser collects
//! multiple errors rather than stopping at the first one; a pass reports the
//! first as a [`GrammarError`] classified by whether the construct is simply
//! invalid or only valid in the other pass.

use thiserror::Error;

use crate::ast::Span;
use crate::lexer::Token;
use crate::pass::{ParsePass, SyntaxError};

/// Where an error was detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Text of the offending token; empty at end of input.
    pub token: String,
    pub line: usize,
    pub column: usize,
    pub span: Span,
}

impl Location {
    pub fn of(token: &Token) -> Self {
        Self {
            token: token.text.clone(),
            line: token.line,
            column: token.column,
            span: token.span.clone().into(),
        }
    }

    /// Location just past `token`, for errors at end of input.
    pub fn after(token: &Token) -> Self {
        Self {
            token: String::new(),
            line: token.end_line(),
            column: token.end_column(),
            span: Span::new(token.span.end, token.span.end),
        }
    }
}

/// A parse error with location and description.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Expected a specific token but found something else.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        at: Location,
    },

    /// Reached end of input unexpectedly.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, at: Location },

    /// A block or member that is never closed. Located at its opening keyword.
    #[error("{opener} without {closer}")]
    MissingEnd {
        opener: String,
        closer: String,
        at: Location,
    },

    /// A closing parenthesis without an opening one, or the reverse.
    #[error("unbalanced parentheses")]
    UnbalancedParens { at: Location },

    /// A construct that is only valid in the exported module text.
    #[error("{construct} is only valid in the exported module text")]
    WrongPass { construct: String, at: Location },

    /// General syntax error.
    #[error("{message}")]
    Syntax { message: String, at: Location },
}

impl ParseError {
    /// Returns where this error was detected.
    pub fn location(&self) -> &Location {
        match self {
            ParseError::UnexpectedToken { at, .. }
            | ParseError::UnexpectedEof { at, .. }
            | ParseError::MissingEnd { at, .. }
            | ParseError::UnbalancedParens { at }
            | ParseError::WrongPass { at, .. }
            | ParseError::Syntax { at, .. } => at,
        }
    }

    /// Creates an "unexpected token" error.
    pub fn unexpected(expected: impl Into<String>, token: &Token) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: describe(token),
            at: Location::of(token),
        }
    }

    /// Creates a syntax error with a message.
    pub fn syntax(message: impl Into<String>, token: &Token) -> Self {
        ParseError::Syntax {
            message: message.into(),
            at: Location::of(token),
        }
    }

    /// Attaches a pass tag, producing a reportable syntax error.
    pub fn to_syntax_error(&self, pass: ParsePass) -> SyntaxError {
        let at = self.location();
        SyntaxError {
            pass,
            token: at.token.clone(),
            line: at.line,
            column: at.column,
            message: self.to_string(),
        }
    }
}

/// Describes a token for "expected X, found Y" messages.
fn describe(token: &Token) -> String {
    match token.kind {
        crate::lexer::TokenKind::Newline => "end of line".to_string(),
        _ => format!("'{}'", token.text),
    }
}

/// The classified failure of one parse pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The text violates the module grammar.
    #[error("syntax error: {0}")]
    MainGrammar(SyntaxError),

    /// The text contains a construct only legal in the other pass.
    #[error("construct from the wrong pass: {0}")]
    ParsePass(SyntaxError),
}

impl GrammarError {
    pub fn classify(error: &ParseError, pass: ParsePass) -> Self {
        let syntax = error.to_syntax_error(pass);
        match error {
            ParseError::WrongPass { .. } => GrammarError::ParsePass(syntax),
            _ => GrammarError::MainGrammar(syntax),
        }
    }

    pub fn syntax_error(&self) -> &SyntaxError {
        match self {
            GrammarError::MainGrammar(e) | GrammarError::ParsePass(e) => e,
        }
    }
}
