//! Pass tags and pass-tagged syntax errors.
//!
//! A module is preprocessed and parsed twice: once for the text shown in the
//! code pane, and once for the exported text that carries hidden attributes.
//! Every syntax error records which of the two passes produced it.

use std::fmt;
use thiserror::Error;

use crate::lexer::Token;

/// Which textual view of a module a pass works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsePass {
    /// The module text as the author edits it.
    CodePane,
    /// The exported module text, including hidden attributes.
    Attributes,
}

impl fmt::Display for ParsePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsePass::CodePane => write!(f, "code pane"),
            ParsePass::Attributes => write!(f, "exported"),
        }
    }
}

/// A syntax error located at an offending token of one pass.
///
/// Carries enough context to present a precise diagnostic without parsing
/// the module again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}; offending token '{token}' at line {line}, column {column} in the {pass} version")]
pub struct SyntaxError {
    /// The pass that produced the error.
    pub pass: ParsePass,
    /// Text of the offending token (empty at end of input).
    pub token: String,
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl SyntaxError {
    /// Creates an error located at `token`.
    pub fn at(token: &Token, pass: ParsePass, message: impl Into<String>) -> Self {
        Self {
            pass,
            token: token.text.clone(),
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }
}
