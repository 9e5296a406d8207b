//! Syntax tree definitions.
//!
//! A [`ModuleTree`] represents the structure of one module after one parse
//! pass. Each node corresponds to a line-level construct in the source: the
//! class header, a declaration, a member, a block clause, a simple statement.
//! Expressions are not broken down; a simple statement only records the
//! tokens it spans.
//!
//! # Structure
//!
//! ```text
//! ModuleTree
//! ├── header: Option<ClassHeader>       (exported text only)
//! └── Vec<ModuleElement>
//!     ├── Statement { kind: Option | Variable | Attribute | ..., remark }
//!     └── Member { kind, name, params, body: Vec<Statement>, ... }
//!         └── Statement { kind: Block { sections, end } | Simple | ... }
//! ```
//!
//! # Design Decisions
//!
//! - **Owned nodes**: nodes own their children and carry no lifetimes, so a
//!   tree can outlive the text it was parsed from.
//! - **Positions on every node**: byte [`Span`], stream [`TokenRange`] and
//!   1-based [`Selection`](crate::module::Selection).
//! - **Stream identity**: the tree records the [`StreamId`] of the token
//!   stream it was built from. Rewriters compare it before accepting a node.

mod remark;
mod stmt;

pub use remark::*;
pub use stmt::*;

use crate::lexer::StreamId;
use crate::module::{QualifiedModuleName, Selection};
use crate::pass::ParsePass;

/// A span representing a range in the source text.
///
/// Spans are byte offsets from the start of the source, matching the lexer's spans.
///
/// # Example
///
/// ```
/// use mallard::ast::Span;
///
/// let span = Span::new(0, 5);
/// assert_eq!(span.start, 0);
/// assert_eq!(span.end, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the start of the span (inclusive).
    pub start: usize,
    /// Byte offset of the end of the span (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span from start to end byte offsets.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Creates a span that covers both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// An inclusive range of token indices in the stream a node was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenRange {
    /// Index of the first token of the node.
    pub start: usize,
    /// Index of the last token of the node.
    pub end: usize,
}

impl TokenRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }
}

/// A node that covers a run of tokens of its stream.
pub trait Node {
    /// Stream indices of the node's first and last tokens.
    fn token_range(&self) -> TokenRange;

    fn selection(&self) -> Selection;
}

macro_rules! impl_node {
    ($($ty:ty),*) => {
        $(impl Node for $ty {
            fn token_range(&self) -> TokenRange {
                self.tokens
            }

            fn selection(&self) -> Selection {
                self.selection
            }
        })*
    };
}

impl_node!(Statement, Member, Clause, ClassHeader);

/// A top-level element of a module.
#[derive(Debug, Clone)]
pub enum ModuleElement {
    /// A declarations-section statement, attribute or remark line.
    Statement(Statement),
    /// A procedure or property.
    Member(Member),
}

/// The syntax tree of one module for one pass.
///
/// Immutable once built. Two trees may exist for the same module, one per
/// [`ParsePass`]; they are never merged.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    module: QualifiedModuleName,
    pass: ParsePass,
    stream_id: StreamId,
    /// Class header of an exported class or form.
    pub header: Option<ClassHeader>,
    /// Module elements in document order.
    pub elements: Vec<ModuleElement>,
}

impl ModuleTree {
    pub fn new(
        module: QualifiedModuleName,
        pass: ParsePass,
        stream_id: StreamId,
        header: Option<ClassHeader>,
        elements: Vec<ModuleElement>,
    ) -> Self {
        Self {
            module,
            pass,
            stream_id,
            header,
            elements,
        }
    }

    pub fn module(&self) -> &QualifiedModuleName {
        &self.module
    }

    pub fn pass(&self) -> ParsePass {
        self.pass
    }

    /// Id of the token stream this tree was built from.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Iterates over the members in document order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.elements.iter().filter_map(|element| match element {
            ModuleElement::Member(member) => Some(member),
            ModuleElement::Statement(_) => None,
        })
    }

    /// Iterates over declarations-section statements.
    pub fn declarations(&self) -> impl Iterator<Item = &Statement> {
        self.elements.iter().filter_map(|element| match element {
            ModuleElement::Statement(statement) => Some(statement),
            ModuleElement::Member(_) => None,
        })
    }

    /// Finds a member by name, ignoring case.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}
