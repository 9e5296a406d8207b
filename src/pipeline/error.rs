//! Classified parse failures.

use thiserror::Error;

use crate::host::HostError;
use crate::parser::GrammarError;
use crate::pass::SyntaxError;
use crate::preprocessor::PreprocessorError;

/// Why a task, or its attributes pass, did not produce a result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("preprocessor syntax error: {0}")]
    Preprocessor(SyntaxError),

    #[error("syntax error: {0}")]
    MainGrammar(SyntaxError),

    #[error("wrong parse pass: {0}")]
    ParsePass(SyntaxError),

    #[error("parse cancelled")]
    Cancelled,

    #[error("unexpected failure: {0}")]
    Unclassified(String),
}

impl ParseFailure {
    /// The syntax error behind a preprocessor or grammar failure.
    pub fn syntax_error(&self) -> Option<&SyntaxError> {
        match self {
            ParseFailure::Preprocessor(e) | ParseFailure::MainGrammar(e) | ParseFailure::ParsePass(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ParseFailure::Cancelled)
    }
}

impl From<PreprocessorError> for ParseFailure {
    fn from(error: PreprocessorError) -> Self {
        ParseFailure::Preprocessor(error.into())
    }
}

impl From<GrammarError> for ParseFailure {
    fn from(error: GrammarError) -> Self {
        match error {
            GrammarError::MainGrammar(e) => ParseFailure::MainGrammar(e),
            GrammarError::ParsePass(e) => ParseFailure::ParsePass(e),
        }
    }
}

/// Wraps an error that has no classification of its own.
pub(super) fn unclassified(error: impl std::fmt::Display) -> ParseFailure {
    ParseFailure::Unclassified(error.to_string())
}
