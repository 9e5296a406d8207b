//! Preprocessor error types.

use thiserror::Error;

use crate::lexer::Token;
use crate::pass::{ParsePass, SyntaxError};

/// What went wrong while evaluating a directive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreprocessorErrorKind {
    /// `#If` block never closed.
    #[error("#If without matching #End If")]
    UnterminatedIf,

    /// `#ElseIf`, `#Else` or `#End If` with no open `#If`.
    #[error("{directive} without matching #If")]
    Unmatched { directive: String },

    /// Second `#Else`, or `#ElseIf` after `#Else`, in one block.
    #[error("{directive} after #Else")]
    AfterElse { directive: String },

    /// Expected a specific token but found something else.
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },

    /// An operator the evaluator does not support.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    /// Operands of incompatible types.
    #[error("type mismatch in `{0}`")]
    TypeMismatch(String),

    /// Malformed numeric literal.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,
}

/// A classified preprocessor syntax error, tagged with its pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} at line {line}, column {column} in the {pass} version")]
pub struct PreprocessorError {
    pub kind: PreprocessorErrorKind,
    /// Text of the offending token.
    pub token: String,
    pub line: usize,
    pub column: usize,
    pub pass: ParsePass,
}

impl PreprocessorError {
    pub fn at(token: &Token, pass: ParsePass, kind: PreprocessorErrorKind) -> Self {
        Self {
            kind,
            token: token.text.clone(),
            line: token.line,
            column: token.column,
            pass,
        }
    }
}

impl From<PreprocessorError> for SyntaxError {
    fn from(err: PreprocessorError) -> Self {
        SyntaxError {
            pass: err.pass,
            token: err.token,
            line: err.line,
            column: err.column,
            message: err.kind.to_string(),
        }
    }
}
