//! In-memory host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::trace;

use super::{CodeModuleHandle, HostError, HostTextProvider, ProjectHandle};
use crate::module::QualifiedModuleName;

#[derive(Debug, Clone)]
struct ModuleText {
    code: String,
    /// Exported text; `None` when the host cannot export the module.
    attributes: Option<String>,
}

/// A host holding module texts in memory.
///
/// Counts open handles, so callers can check that every handle was
/// released. The table only ever holds whole entries, so a lock poisoned
/// by a panicking writer is recovered.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    modules: RwLock<HashMap<QualifiedModuleName, ModuleText>>,
    open_handles: Arc<AtomicUsize>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a module. The attributes view defaults to the code
    /// text when `attributes` is `None`.
    pub fn insert(&self, module: QualifiedModuleName, code: impl Into<String>, attributes: Option<String>) {
        let code = code.into();
        let attributes = Some(attributes.unwrap_or_else(|| code.clone()));
        self.write().insert(module, ModuleText { code, attributes });
    }

    /// Adds a module whose exported text is unavailable.
    pub fn insert_code_only(&self, module: QualifiedModuleName, code: impl Into<String>) {
        self.write().insert(
            module,
            ModuleText {
                code: code.into(),
                attributes: None,
            },
        );
    }

    pub fn modules(&self) -> Vec<QualifiedModuleName> {
        let mut modules: Vec<_> = self.read().keys().cloned().collect();
        modules.sort();
        modules
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    fn get(&self, module: &QualifiedModuleName) -> Result<ModuleText, HostError> {
        self.read()
            .get(module)
            .cloned()
            .ok_or_else(|| HostError::not_found(module))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QualifiedModuleName, ModuleText>> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QualifiedModuleName, ModuleText>> {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> HandleGuard {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        HandleGuard {
            open_handles: self.open_handles.clone(),
        }
    }
}

impl HostTextProvider for InMemoryHost {
    fn code_module(&self, module: &QualifiedModuleName) -> Result<Box<dyn CodeModuleHandle + '_>, HostError> {
        let text = self.get(module)?.code;
        trace!("opened code module {}", module);
        Ok(Box::new(MemoryCodeModule {
            text,
            _guard: self.open(),
        }))
    }

    fn parent_project(&self, module: &QualifiedModuleName) -> Result<Box<dyn ProjectHandle + '_>, HostError> {
        Ok(Box::new(MemoryProject {
            id: module.project_id().to_string(),
            name: module.project_name().to_string(),
            _guard: self.open(),
        }))
    }

    fn attributes_text(&self, module: &QualifiedModuleName) -> Result<String, HostError> {
        self.get(module)?
            .attributes
            .ok_or_else(|| HostError::Unavailable(format!("{} cannot be exported", module)))
    }
}

/// Decrements the open handle count when dropped.
#[derive(Debug)]
struct HandleGuard {
    open_handles: Arc<AtomicUsize>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemoryCodeModule {
    text: String,
    _guard: HandleGuard,
}

impl CodeModuleHandle for MemoryCodeModule {
    fn text(&self) -> Result<String, HostError> {
        Ok(self.text.clone())
    }

    fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

struct MemoryProject {
    id: String,
    name: String,
    _guard: HandleGuard,
}

impl ProjectHandle for MemoryProject {
    fn project_id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
