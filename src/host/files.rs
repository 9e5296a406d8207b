//! File-system host.
//!
//! Reads exported module files (`.bas`, `.cls`, `.frm`) from one project
//! directory. The exported file is the attributes view; the code view is
//! the same text with the class header and `Attribute` lines removed, which
//! is what the IDE shows in its code pane.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use super::{CodeModuleHandle, HostError, HostTextProvider, ProjectHandle};
use crate::module::{ComponentKind, QualifiedModuleName};

/// A project whose modules are exported files in one directory.
#[derive(Debug, Clone)]
pub struct FileSystemHost {
    root: PathBuf,
    project_id: String,
    project_name: String,
}

impl FileSystemHost {
    /// Creates a host for the project in `root`. The project is named after
    /// the directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let project_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "VBAProject".to_string());
        Self {
            project_id: root.display().to_string(),
            project_name,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The identity of the module stored in `path`, if it is a module file.
    pub fn module_for(&self, path: &Path) -> Option<QualifiedModuleName> {
        let kind = ComponentKind::from_extension(path.extension()?.to_str()?)?;
        let component = path.file_stem()?.to_str()?;
        Some(QualifiedModuleName::new(
            self.project_id.clone(),
            self.project_name.clone(),
            component,
            kind,
        ))
    }

    /// Lists the modules of the project, sorted by name.
    pub fn modules(&self) -> Result<Vec<QualifiedModuleName>, HostError> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, &e))?;
        let mut modules = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, &e))?;
            let path = entry.path();
            if path.is_file()
                && let Some(module) = self.module_for(&path)
            {
                modules.push(module);
            }
        }
        modules.sort();
        debug!("{}: {} modules in {}", self.project_name, modules.len(), self.root.display());
        Ok(modules)
    }

    /// Finds the file of `module`. Exported files keep whatever case the
    /// export gave them, so `MODULE1.BAS` is found as well as `Module1.bas`.
    fn path_of(&self, module: &QualifiedModuleName) -> Result<PathBuf, HostError> {
        let extension = match module.kind() {
            ComponentKind::Standard => "bas",
            ComponentKind::Class => "cls",
            ComponentKind::Form => "frm",
            ComponentKind::Document => "doccls",
        };
        let exact = self.root.join(module.component_name()).with_extension(extension);
        if exact.is_file() {
            return Ok(exact);
        }

        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, &e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.root, &e))?.path();
            if path.is_file()
                && let Some(found) = self.module_for(&path)
                && found.kind() == module.kind()
                && found.component_name().eq_ignore_ascii_case(module.component_name())
            {
                trace!("{} resolved to {}", module, path.display());
                return Ok(path);
            }
        }
        Err(HostError::not_found(module))
    }

    fn read(&self, module: &QualifiedModuleName) -> Result<String, HostError> {
        let path = self.path_of(module)?;
        // Exported files use the host's ANSI code page; keep what decodes.
        let bytes = fs::read(&path).map_err(|e| io_error(&path, &e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl HostTextProvider for FileSystemHost {
    fn code_module(&self, module: &QualifiedModuleName) -> Result<Box<dyn CodeModuleHandle + '_>, HostError> {
        let text = strip_hidden_attributes(&self.read(module)?);
        trace!("opened code module {}", module);
        Ok(Box::new(FileCodeModule { text }))
    }

    fn parent_project(&self, _module: &QualifiedModuleName) -> Result<Box<dyn ProjectHandle + '_>, HostError> {
        Ok(Box::new(FileProject { host: self }))
    }

    fn attributes_text(&self, module: &QualifiedModuleName) -> Result<String, HostError> {
        self.read(module)
    }
}

struct FileCodeModule {
    text: String,
}

impl CodeModuleHandle for FileCodeModule {
    fn text(&self) -> Result<String, HostError> {
        Ok(self.text.clone())
    }

    fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

struct FileProject<'a> {
    host: &'a FileSystemHost,
}

impl ProjectHandle for FileProject<'_> {
    fn project_id(&self) -> &str {
        &self.host.project_id
    }

    fn name(&self) -> &str {
        &self.host.project_name
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> HostError {
    HostError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

/// Removes what the code pane hides from an exported module: the
/// `VERSION`/`BEGIN ... END` header (with form `Object` lines) and every
/// `Attribute` line.
pub fn strip_hidden_attributes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut lines = text.split_inclusive(['\n']).peekable();

    if lines.peek().is_some_and(|line| starts_with_word(line, "VERSION")) {
        lines.next();
        let mut depth = 0usize;
        while let Some(line) = lines.peek() {
            let trimmed = line.trim();
            if depth == 0 && !(starts_with_word(trimmed, "Begin") || starts_with_word(trimmed, "Object")) {
                break;
            }
            if starts_with_word(trimmed, "Begin") || starts_with_word(trimmed, "BeginProperty") {
                depth += 1;
            } else if trimmed.eq_ignore_ascii_case("End") || starts_with_word(trimmed, "EndProperty") {
                depth = depth.saturating_sub(1);
            }
            lines.next();
        }
    }

    for line in lines {
        if !is_attribute_line(line) {
            out.push_str(line);
        }
    }
    out
}

/// `Attribute name = ...` or `Attribute name.name = ...`
fn is_attribute_line(line: &str) -> bool {
    let line = line.trim_start();
    if !starts_with_word(line, "Attribute") {
        return false;
    }
    let rest = line["Attribute".len()..].trim_start();
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(rest.len());
    name_len > 0 && rest[name_len..].trim_start().starts_with('=')
}

/// Case-insensitive keyword test followed by a non-identifier character.
fn starts_with_word(line: &str, word: &str) -> bool {
    line.len() >= word.len()
        && line.is_char_boundary(word.len())
        && line[..word.len()].eq_ignore_ascii_case(word)
        && !line[word.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}
