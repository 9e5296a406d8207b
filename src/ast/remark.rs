//! Remark nodes: comments and annotation lists.
//!
//! A remark ends a statement. `'@` comments that follow the annotation
//! grammar are parsed into [`AnnotationNode`]s; anything else is kept as a
//! plain comment.

use crate::module::Selection;

/// How a remark was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemarkKind {
    /// `' text`
    Comment,
    /// `Rem text`
    Rem,
    /// `'@Name args @Other : free text`
    Annotations(Vec<AnnotationNode>),
}

/// A comment or annotation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remark {
    pub kind: RemarkKind,
    /// Body text without the `'` or `Rem` marker.
    pub text: String,
    /// Index of the comment token in its stream.
    pub token: usize,
    pub selection: Selection,
}

impl Remark {
    pub fn annotations(&self) -> &[AnnotationNode] {
        match &self.kind {
            RemarkKind::Annotations(nodes) => nodes,
            _ => &[],
        }
    }
}

/// One `@Name args` item of an annotation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationNode {
    /// Name as written.
    pub name: String,
    /// Arguments in order; string literals are unquoted.
    pub args: Vec<String>,
    pub selection: Selection,
}
