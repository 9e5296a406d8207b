//! Module identity and source positions.
//!
//! Every artifact the pipeline produces (comments, annotations, attributes,
//! diagnostics) is qualified by the module it came from. A
//! [`QualifiedModuleName`] is created once per module and never changes for
//! the lifetime of a parse task.

use std::fmt;

/// The kind of component a module represents inside its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    /// A standard (`.bas`) module.
    Standard,
    /// A class (`.cls`) module.
    Class,
    /// A user form (`.frm`) module.
    Form,
    /// A host document module (workbook, worksheet, ...).
    Document,
}

impl ComponentKind {
    /// Guesses the component kind from an exported file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "bas" => Some(ComponentKind::Standard),
            "cls" => Some(ComponentKind::Class),
            "frm" => Some(ComponentKind::Form),
            "doccls" => Some(ComponentKind::Document),
            _ => None,
        }
    }
}

/// Identifies one source module within a project.
///
/// Comparison and hashing use every field, so two modules with the same
/// component name in different projects are distinct.
///
/// ```
/// use mallard::module::{ComponentKind, QualifiedModuleName};
///
/// let module = QualifiedModuleName::new("proj-1", "VBAProject", "Module1", ComponentKind::Standard);
/// assert_eq!(module.to_string(), "VBAProject.Module1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedModuleName {
    project_id: String,
    project_name: String,
    component_name: String,
    kind: ComponentKind,
}

impl QualifiedModuleName {
    /// Creates a new module identity.
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        component_name: impl Into<String>,
        kind: ComponentKind,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            component_name: component_name.into(),
            kind,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }
}

impl fmt::Display for QualifiedModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project_name, self.component_name)
    }
}

/// A 1-based line/column range in a module.
///
/// `end_column` is exclusive, so a selection covering a single character at
/// column 5 has `start_column == 5` and `end_column == 6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Selection {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Selection {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Creates a selection that covers both `self` and `other`.
    pub fn merge(&self, other: &Selection) -> Selection {
        let (start_line, start_column) =
            (self.start_line, self.start_column).min((other.start_line, other.start_column));
        let (end_line, end_column) =
            (self.end_line, self.end_column).max((other.end_line, other.end_column));
        Selection::new(start_line, start_column, end_line, end_column)
    }

    /// Returns true if `line`/`column` lies inside this selection.
    pub fn contains(&self, line: usize, column: usize) -> bool {
        (self.start_line, self.start_column) <= (line, column)
            && (line, column) < (self.end_line, self.end_column)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L{}C{}-L{}C{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// A selection qualified by the module it belongs to.
///
/// Ordering is by module first, then by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedSelection {
    pub module: QualifiedModuleName,
    pub selection: Selection,
}

impl QualifiedSelection {
    pub fn new(module: QualifiedModuleName, selection: Selection) -> Self {
        Self { module, selection }
    }
}

impl fmt::Display for QualifiedSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.module, self.selection)
    }
}
