//! Host collaborators.
//!
//! The pipeline never talks to an IDE directly. It reads module text and
//! project settings through these traits:
//!
//! - [`HostTextProvider`] - module text for both views, through scoped handles
//! - [`ConstantsSource`] - conditional compilation constants of a project
//!
//! Handles release whatever host resource they hold when dropped, so a task
//! gives them back on every exit path.
//!
//! Two hosts are supplied: [`FileSystemHost`] reads exported module files,
//! and [`InMemoryHost`] keeps module texts in memory.

mod files;
mod memory;

pub use files::{FileSystemHost, strip_hidden_attributes};
pub use memory::InMemoryHost;

use thiserror::Error;

use crate::module::QualifiedModuleName;
use crate::preprocessor::{ConstantTable, PredefinedConstants};

/// Failures reported by a host. They are fatal for the task and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("module {0} not found")]
    ModuleNotFound(String),

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("host unavailable: {0}")]
    Unavailable(String),
}

impl HostError {
    pub fn not_found(module: &QualifiedModuleName) -> Self {
        HostError::ModuleNotFound(module.to_string())
    }
}

/// A scoped handle on the code module of one component.
pub trait CodeModuleHandle {
    /// The text shown in the code pane.
    fn text(&self) -> Result<String, HostError>;

    fn line_count(&self) -> usize;
}

/// A scoped handle on a project.
pub trait ProjectHandle {
    fn project_id(&self) -> &str;

    fn name(&self) -> &str;
}

/// Source of module text.
pub trait HostTextProvider: Send + Sync {
    /// Opens the code module of a component.
    fn code_module(&self, module: &QualifiedModuleName) -> Result<Box<dyn CodeModuleHandle + '_>, HostError>;

    /// The project a module belongs to.
    fn parent_project(&self, module: &QualifiedModuleName) -> Result<Box<dyn ProjectHandle + '_>, HostError>;

    /// The exported text of a module, hidden attributes included.
    fn attributes_text(&self, module: &QualifiedModuleName) -> Result<String, HostError>;

    /// The code pane text of a module. The handle is released before returning.
    fn current_text(&self, module: &QualifiedModuleName) -> Result<String, HostError> {
        let handle = self.code_module(module)?;
        if handle.line_count() == 0 {
            return Ok(String::new());
        }
        handle.text()
    }
}

/// Source of the conditional compilation constants declared for a project.
pub trait ConstantsSource: Send + Sync {
    fn declared_constants(&self, project: &dyn ProjectHandle) -> ConstantTable;
}

/// The same constants for every project.
impl ConstantsSource for ConstantTable {
    fn declared_constants(&self, _project: &dyn ProjectHandle) -> ConstantTable {
        self.clone()
    }
}

/// Platform constants plus constants declared for every project.
#[derive(Debug, Clone, Default)]
pub struct ProjectConstants {
    pub predefined: PredefinedConstants,
    pub declared: ConstantTable,
}

impl ProjectConstants {
    pub fn new(predefined: PredefinedConstants, declared: ConstantTable) -> Self {
        Self { predefined, declared }
    }
}

impl ConstantsSource for ProjectConstants {
    fn declared_constants(&self, _project: &dyn ProjectHandle) -> ConstantTable {
        let mut table = self.predefined.table();
        table.extend(&self.declared);
        table
    }
}
