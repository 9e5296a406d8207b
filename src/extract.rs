//! Comment and annotation extraction.
//!
//! One walk of the code-pane tree in document order collects every remark:
//! plain `'` and `Rem` comments become [`Comment`]s, and annotation lists
//! become [`Annotation`]s resolved through the [`AnnotationRegistry`].
//!
//! Scope binding:
//! - module-target annotations bind to the module;
//! - member and general annotations inside a member (its signature and
//!   `End` lines included) bind to that member;
//! - member and general annotations on remark-only lines directly above a
//!   member bind to that member, unless a code line comes between;
//! - anything else binds to the module.

use std::fmt;

use log::trace;
use thiserror::Error;

use crate::annotations::{Annotation, AnnotationRegistry, AnnotationScope, AnnotationTarget};
use crate::ast::{ModuleElement, ModuleTree, Remark, RemarkKind};
use crate::module::{QualifiedModuleName, QualifiedSelection};
use crate::pass::ParsePass;

/// How a comment was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentMarker {
    /// `' text`
    Apostrophe,
    /// `Rem text`
    Rem,
}

impl fmt::Display for CommentMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentMarker::Apostrophe => write!(f, "'"),
            CommentMarker::Rem => write!(f, "Rem"),
        }
    }
}

/// A plain comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Body without the marker.
    pub text: String,
    pub marker: CommentMarker,
    pub selection: QualifiedSelection,
}

/// Comments and annotations of one module, each in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub comments: Vec<Comment>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("comments are extracted from the code pane tree, got a {0} tree")]
    WrongPass(ParsePass),
}

/// Extracts the comments and annotations of a code-pane tree.
pub fn extract(
    module: &QualifiedModuleName,
    tree: &ModuleTree,
    registry: &AnnotationRegistry,
) -> Result<Extraction, ExtractionError> {
    if tree.pass() != ParsePass::CodePane {
        return Err(ExtractionError::WrongPass(tree.pass()));
    }

    let mut extractor = Extractor {
        module,
        registry,
        out: Extraction::default(),
        pending: Vec::new(),
    };

    for element in &tree.elements {
        match element {
            ModuleElement::Statement(statement) => {
                if !statement.is_empty() {
                    extractor.release_pending();
                }
                let pending = statement.is_empty();
                statement.walk_remarks(&mut |remark| extractor.visit(remark, None, pending));
            }
            ModuleElement::Member(member) => {
                let scope = AnnotationScope::Member(member.name.clone());
                for index in std::mem::take(&mut extractor.pending) {
                    extractor.out.annotations[index].scope = scope.clone();
                }
                member.walk_remarks(&mut |remark| extractor.visit(remark, Some(&scope), false));
            }
        }
    }
    extractor.release_pending();

    trace!(
        "{}: {} comments, {} annotations",
        module,
        extractor.out.comments.len(),
        extractor.out.annotations.len()
    );
    Ok(extractor.out)
}

struct Extractor<'a> {
    module: &'a QualifiedModuleName,
    registry: &'a AnnotationRegistry,
    out: Extraction,
    /// Annotations waiting for the member below them.
    pending: Vec<usize>,
}

impl Extractor<'_> {
    /// Records one remark. `member` is the enclosing member; `pending` marks
    /// a remark-only module-level line.
    fn visit(&mut self, remark: &Remark, member: Option<&AnnotationScope>, pending: bool) {
        match &remark.kind {
            RemarkKind::Comment | RemarkKind::Rem => {
                let marker = match remark.kind {
                    RemarkKind::Rem => CommentMarker::Rem,
                    _ => CommentMarker::Apostrophe,
                };
                self.out.comments.push(Comment {
                    text: remark.text.clone(),
                    marker,
                    selection: QualifiedSelection::new(self.module.clone(), remark.selection),
                });
            }
            RemarkKind::Annotations(nodes) => {
                for node in nodes {
                    let Some(shape) = self.registry.lookup(&node.name) else {
                        continue;
                    };
                    let binds_to_member = shape.target != AnnotationTarget::Module;
                    let scope = match member {
                        Some(scope) if binds_to_member => scope.clone(),
                        _ => AnnotationScope::Module,
                    };
                    if pending && binds_to_member {
                        self.pending.push(self.out.annotations.len());
                    }
                    self.out.annotations.push(Annotation {
                        name: shape.name.clone(),
                        args: node.args.clone(),
                        shape: shape.clone(),
                        scope,
                        selection: QualifiedSelection::new(self.module.clone(), node.selection),
                    });
                }
            }
        }
    }

    /// Leaves pending annotations bound to the module.
    fn release_pending(&mut self) {
        self.pending.clear();
    }
}
