//! # Mallard
//!
//! A multi-pass module parsing pipeline for VBA static analysis and
//! refactoring tools.
//!
//! ## Architecture
//!
//! Every module is parsed twice, once per view of its text:
//!
//! ```text
//! code pane text → Lexer → Preprocessor → Parser → tree → comments/annotations
//! exported text  → Lexer → Preprocessor → Parser → tree → attribute map
//! ```
//!
//! Each phase is implemented as a separate module:
//!
//! - [`lexer`] - Lossless tokenization into a [`TokenStream`](lexer::TokenStream)
//! - [`preprocessor`] - Conditional compilation (`#If`, `#Const`)
//! - [`parser`] - Builds a [`ModuleTree`](ast::ModuleTree) for one pass
//! - [`ast`] - Syntax tree type definitions
//! - [`extract`] - Comments and annotations of the code pane
//! - [`annotations`] - The registry of recognized annotations
//! - [`attributes`] - Hidden attributes of the exported text
//! - [`rewriter`] - Token-level edits that keep untouched text intact
//! - [`host`] - Where module texts come from
//! - [`pipeline`] - Per-module tasks and the parallel coordinator
//!
//! ## Example
//!
//! ```
//! use mallard::lexer::tokenize;
//! use mallard::module::{ComponentKind, QualifiedModuleName};
//! use mallard::parser::parse;
//! use mallard::pass::ParsePass;
//!
//! let module = QualifiedModuleName::new("p", "VBAProject", "Module1", ComponentKind::Standard);
//! let source = "Option Explicit\n\nPublic Sub Hello()\n    MsgBox \"Hello\"\nEnd Sub\n";
//!
//! let parsed = parse(&module, tokenize(source), ParsePass::CodePane).expect("parse error");
//! assert_eq!(parsed.tree.members().count(), 1);
//! assert_eq!(parsed.stream.text(), source);
//! ```

pub mod annotations;
pub mod ast;
pub mod attributes;
pub mod extract;
pub mod host;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod preprocessor;
pub mod rewriter;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::annotations::{Annotation, AnnotationRegistry, AnnotationScope};
    pub use crate::ast::{Member, MemberKind, ModuleTree, Statement, StatementKind};
    pub use crate::attributes::{AttributeMap, Attributes, ScopeKind};
    pub use crate::extract::{Comment, Extraction};
    pub use crate::host::{FileSystemHost, HostTextProvider, InMemoryHost, ProjectConstants};
    pub use crate::lexer::{Token, TokenKind, TokenStream, tokenize};
    pub use crate::module::{ComponentKind, QualifiedModuleName, QualifiedSelection, Selection};
    pub use crate::parser::{GrammarError, parse};
    pub use crate::pass::{ParsePass, SyntaxError};
    pub use crate::pipeline::{
        CancellationToken, Collaborators, ParseCompletion, ParseCoordinator, ParseFailure, ParseListener, TaskResult,
    };
    pub use crate::rewriter::{ModuleRewriterFactory, TokenRewriter};
}
