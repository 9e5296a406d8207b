//! Token rewriters.
//!
//! A [`TokenRewriter`] is an edit overlay over one frozen [`TokenStream`].
//! Edits are recorded against token indices and only applied when the new
//! text is materialised, so the stream itself never changes.
//!
//! # Edit Primitives
//!
//! | Primitive | Effect |
//! |-----------|--------|
//! | `insert_before(i, text)` | `text` appears before token `i` |
//! | `insert_after(i, text)` | `text` appears after token `i` |
//! | `replace(i, j, text)` | tokens `i..=j` become `text` |
//! | `remove(i, j)` | tokens `i..=j` disappear |
//!
//! Replacements may not overlap. An insertion may sit at either edge of a
//! replacement but not inside it, since the replaced tokens are never
//! emitted. Insertions at the same position keep the order they were made in.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mallard::lexer::tokenize;
//! use mallard::module::{ComponentKind, QualifiedModuleName};
//! use mallard::rewriter::ModuleRewriterFactory;
//!
//! let module = QualifiedModuleName::new("p", "Project", "Module1", ComponentKind::Standard);
//! let stream = Arc::new(tokenize("Dim x As Long"));
//!
//! let mut rewriter = ModuleRewriterFactory::code_pane_rewriter(module, stream);
//! rewriter.replace(2, 2, "count").unwrap();
//! assert_eq!(rewriter.text(), "Dim count As Long");
//! assert_eq!(rewriter.original_text(), "Dim x As Long");
//! ```

use std::sync::Arc;

use log::trace;
use thiserror::Error;

use crate::ast::{ModuleTree, Node};
use crate::lexer::{StreamId, TokenStream};
use crate::module::QualifiedModuleName;
use crate::pass::ParsePass;

/// Errors from recording an edit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("token index {index} is out of range for a stream of {len} tokens")]
    OutOfRange { index: usize, len: usize },

    #[error("edit of tokens {start}..={end} overlaps an earlier replacement or insertion")]
    Overlap { start: usize, end: usize },

    #[error("node belongs to {found}, but the rewriter is bound to {expected}")]
    ForeignStream { expected: StreamId, found: StreamId },
}

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    InsertBefore { index: usize, text: String },
    InsertAfter { index: usize, text: String },
    Replace { start: usize, end: usize, text: String },
}

/// An edit overlay bound to one pass's token stream.
#[derive(Debug, Clone)]
pub struct TokenRewriter {
    module: QualifiedModuleName,
    pass: ParsePass,
    stream: Arc<TokenStream>,
    edits: Vec<Edit>,
}

impl TokenRewriter {
    pub fn new(module: QualifiedModuleName, pass: ParsePass, stream: Arc<TokenStream>) -> Self {
        Self {
            module,
            pass,
            stream,
            edits: Vec::new(),
        }
    }

    pub fn module(&self) -> &QualifiedModuleName {
        &self.module
    }

    pub fn pass(&self) -> ParsePass {
        self.pass
    }

    /// The stream the rewriter is bound to.
    pub fn stream(&self) -> &Arc<TokenStream> {
        &self.stream
    }

    // ==================== Edits by Index ====================

    pub fn insert_before(&mut self, index: usize, text: impl Into<String>) -> Result<(), RewriteError> {
        self.check_index(index)?;
        if self.replaced_range(|start, end| start < index && index <= end) {
            return Err(RewriteError::Overlap { start: index, end: index });
        }
        self.edits.push(Edit::InsertBefore {
            index,
            text: text.into(),
        });
        Ok(())
    }

    pub fn insert_after(&mut self, index: usize, text: impl Into<String>) -> Result<(), RewriteError> {
        self.check_index(index)?;
        if self.replaced_range(|start, end| start <= index && index < end) {
            return Err(RewriteError::Overlap { start: index, end: index });
        }
        self.edits.push(Edit::InsertAfter {
            index,
            text: text.into(),
        });
        Ok(())
    }

    /// Replaces tokens `start..=end` with `text`.
    pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) -> Result<(), RewriteError> {
        self.check_index(start)?;
        self.check_index(end)?;
        if end < start {
            return Err(RewriteError::OutOfRange {
                index: end,
                len: self.stream.len(),
            });
        }
        let overlaps = self.edits.iter().any(|edit| match edit {
            Edit::Replace { start: s, end: e, .. } => start <= *e && *s <= end,
            Edit::InsertBefore { index, .. } => start < *index && *index <= end,
            Edit::InsertAfter { index, .. } => start <= *index && *index < end,
        });
        if overlaps {
            return Err(RewriteError::Overlap { start, end });
        }

        trace!("{} ({} pass): replace tokens {}..={}", self.module, self.pass, start, end);
        self.edits.push(Edit::Replace {
            start,
            end,
            text: text.into(),
        });
        Ok(())
    }

    /// Removes tokens `start..=end`.
    pub fn remove(&mut self, start: usize, end: usize) -> Result<(), RewriteError> {
        self.replace(start, end, "")
    }

    // ==================== Edits by Node ====================

    pub fn insert_before_node(
        &mut self,
        tree: &ModuleTree,
        node: &impl Node,
        text: impl Into<String>,
    ) -> Result<(), RewriteError> {
        self.check_tree(tree)?;
        self.insert_before(node.token_range().start, text)
    }

    pub fn insert_after_node(
        &mut self,
        tree: &ModuleTree,
        node: &impl Node,
        text: impl Into<String>,
    ) -> Result<(), RewriteError> {
        self.check_tree(tree)?;
        self.insert_after(node.token_range().end, text)
    }

    pub fn replace_node(
        &mut self,
        tree: &ModuleTree,
        node: &impl Node,
        text: impl Into<String>,
    ) -> Result<(), RewriteError> {
        self.check_tree(tree)?;
        let range = node.token_range();
        self.replace(range.start, range.end, text)
    }

    pub fn remove_node(&mut self, tree: &ModuleTree, node: &impl Node) -> Result<(), RewriteError> {
        self.replace_node(tree, node, "")
    }

    // ==================== Output ====================

    /// Materialises the rewritten text. The stream is left untouched.
    pub fn text(&self) -> String {
        if self.edits.is_empty() {
            return self.stream.text();
        }

        let mut out = String::new();
        let mut index = 0;
        while let Some(token) = self.stream.get(index) {
            self.push_inserts_before(&mut out, index);

            let replaced = self.edits.iter().find_map(|edit| match edit {
                Edit::Replace { start, end, text } if *start == index => Some((*end, text)),
                _ => None,
            });
            let last = match replaced {
                Some((end, text)) => {
                    out.push_str(text);
                    end
                }
                None => {
                    out.push_str(&token.text);
                    index
                }
            };

            self.push_inserts_after(&mut out, last);
            index = last + 1;
        }
        out
    }

    /// The text of the stream without any edits.
    pub fn original_text(&self) -> String {
        self.stream.text()
    }

    /// Returns true if any edit has been recorded.
    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Discards every recorded edit.
    pub fn rollback(&mut self) {
        self.edits.clear();
    }

    fn push_inserts_before(&self, out: &mut String, index: usize) {
        for edit in &self.edits {
            if let Edit::InsertBefore { index: i, text } = edit
                && *i == index
            {
                out.push_str(text);
            }
        }
    }

    fn push_inserts_after(&self, out: &mut String, index: usize) {
        for edit in &self.edits {
            if let Edit::InsertAfter { index: i, text } = edit
                && *i == index
            {
                out.push_str(text);
            }
        }
    }

    /// Returns true if any recorded replacement satisfies `hides(start, end)`.
    fn replaced_range(&self, hides: impl Fn(usize, usize) -> bool) -> bool {
        self.edits.iter().any(|edit| match edit {
            Edit::Replace { start, end, .. } => hides(*start, *end),
            _ => false,
        })
    }

    fn check_index(&self, index: usize) -> Result<(), RewriteError> {
        if index < self.stream.len() {
            Ok(())
        } else {
            Err(RewriteError::OutOfRange {
                index,
                len: self.stream.len(),
            })
        }
    }

    fn check_tree(&self, tree: &ModuleTree) -> Result<(), RewriteError> {
        if tree.stream_id() == self.stream.id() {
            Ok(())
        } else {
            Err(RewriteError::ForeignStream {
                expected: self.stream.id(),
                found: tree.stream_id(),
            })
        }
    }
}

/// Builds the rewriters of both passes.
pub struct ModuleRewriterFactory;

impl ModuleRewriterFactory {
    pub fn for_pass(module: QualifiedModuleName, pass: ParsePass, stream: Arc<TokenStream>) -> TokenRewriter {
        TokenRewriter::new(module, pass, stream)
    }

    pub fn code_pane_rewriter(module: QualifiedModuleName, stream: Arc<TokenStream>) -> TokenRewriter {
        Self::for_pass(module, ParsePass::CodePane, stream)
    }

    pub fn attributes_rewriter(module: QualifiedModuleName, stream: Arc<TokenStream>) -> TokenRewriter {
        Self::for_pass(module, ParsePass::Attributes, stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::module::ComponentKind;
    use crate::parser::parse;

    fn module() -> QualifiedModuleName {
        QualifiedModuleName::new("p", "Project", "Module1", ComponentKind::Standard)
    }

    fn rewriter(source: &str) -> TokenRewriter {
        ModuleRewriterFactory::code_pane_rewriter(module(), Arc::new(tokenize(source)))
    }

    #[test]
    fn test_no_edits_reproduces_input() {
        let source = "Option Explicit\r\n#If VBA7 Then\r\n  x _\r\n  = 1\r\n#End If\r\n";
        let rewriter = rewriter(source);
        assert!(!rewriter.is_dirty());
        assert_eq!(rewriter.text(), source);
    }

    #[test]
    fn test_insertions_keep_order() {
        // tokens: Dim, ws, x
        let mut rewriter = rewriter("Dim x");
        rewriter.insert_before(2, "a").unwrap();
        rewriter.insert_before(2, "b").unwrap();
        rewriter.insert_after(0, "!").unwrap();
        assert_eq!(rewriter.text(), "Dim! abx");
    }

    #[test]
    fn test_replace_and_remove() {
        // tokens: x, ws, =, ws, 1, ws, +, ws, 2
        let mut rewriter = rewriter("x = 1 + 2");
        rewriter.replace(4, 8, "3").unwrap();
        assert_eq!(rewriter.text(), "x = 3");
        rewriter.rollback();
        rewriter.remove(5, 8).unwrap();
        assert_eq!(rewriter.text(), "x = 1");
    }

    #[test]
    fn test_inserts_around_replacement() {
        let mut rewriter = rewriter("a b c");
        rewriter.replace(2, 2, "B").unwrap();
        rewriter.insert_before(2, "[").unwrap();
        rewriter.insert_after(2, "]").unwrap();
        assert_eq!(rewriter.text(), "a [B] c");
    }

    #[test]
    fn test_overlapping_replacements_rejected() {
        let mut rewriter = rewriter("a b c d");
        rewriter.replace(0, 2, "x").unwrap();
        assert_eq!(
            rewriter.replace(2, 4, "y"),
            Err(RewriteError::Overlap { start: 2, end: 4 })
        );
        rewriter.replace(4, 6, "y").unwrap();
        assert_eq!(rewriter.text(), "x y");
    }

    #[test]
    fn test_insert_inside_replacement_rejected() {
        // tokens: a, ws, b, ws, c
        let mut rewriter = rewriter("a b c");
        rewriter.replace(0, 4, "X").unwrap();
        assert_eq!(
            rewriter.insert_before(2, "["),
            Err(RewriteError::Overlap { start: 2, end: 2 })
        );
        assert_eq!(
            rewriter.insert_after(2, "]"),
            Err(RewriteError::Overlap { start: 2, end: 2 })
        );
        rewriter.insert_before(0, "<").unwrap();
        rewriter.insert_after(4, ">").unwrap();
        assert_eq!(rewriter.text(), "<X>");
    }

    #[test]
    fn test_replacement_over_insert_rejected() {
        let mut inside = rewriter("a b c");
        inside.insert_before(2, "[").unwrap();
        inside.insert_after(0, "!").unwrap();
        assert_eq!(inside.replace(0, 4, "X"), Err(RewriteError::Overlap { start: 0, end: 4 }));
        assert_eq!(inside.text(), "a! [b c");

        // Inserts at the edges of the range stay visible.
        let mut edges = rewriter("a b c");
        edges.insert_before(2, "[").unwrap();
        edges.insert_after(4, "]").unwrap();
        edges.replace(2, 4, "B").unwrap();
        assert_eq!(edges.text(), "a [B]");
    }

    #[test]
    fn test_out_of_range() {
        let mut rewriter = rewriter("a");
        assert_eq!(
            rewriter.insert_after(1, "x"),
            Err(RewriteError::OutOfRange { index: 1, len: 1 })
        );
        assert!(rewriter.replace(0, 3, "x").is_err());
        assert!(!rewriter.is_dirty());
    }

    #[test]
    fn test_node_edits() {
        let stream = tokenize("Sub Foo()\nEnd Sub\n");
        let parsed = parse(&module(), stream, ParsePass::CodePane).unwrap();
        let mut rewriter = ModuleRewriterFactory::code_pane_rewriter(module(), parsed.stream.clone());
        let member = parsed.tree.member("Foo").unwrap();

        rewriter.insert_before_node(&parsed.tree, member, "' added\n").unwrap();
        rewriter.replace_node(&parsed.tree, &member.end, "End Sub ' done").unwrap();
        assert_eq!(rewriter.text(), "' added\nSub Foo()\nEnd Sub ' done\n");
    }

    #[test]
    fn test_foreign_stream_rejected() {
        let source = "Sub Foo()\nEnd Sub\n";
        let code = parse(&module(), tokenize(source), ParsePass::CodePane).unwrap();
        let other = parse(&module(), tokenize(source), ParsePass::Attributes).unwrap();

        let mut rewriter = ModuleRewriterFactory::attributes_rewriter(module(), other.stream.clone());
        let member = code.tree.member("Foo").unwrap();
        let err = rewriter.remove_node(&code.tree, member).unwrap_err();
        assert!(matches!(err, RewriteError::ForeignStream { .. }));
        assert_eq!(rewriter.pass(), ParsePass::Attributes);
        assert!(!rewriter.is_dirty());
    }
}
