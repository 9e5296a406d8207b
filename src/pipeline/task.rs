//! The per-module parse task.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, trace};
use uuid::Uuid;

use super::error::{ParseFailure, unclassified};
use crate::annotations::{Annotation, AnnotationRegistry};
use crate::ast::ModuleTree;
use crate::attributes::{self, AttributeMap};
use crate::extract::{Comment, extract};
use crate::host::{ConstantsSource, HostTextProvider};
use crate::lexer::tokenize;
use crate::module::QualifiedModuleName;
use crate::parser::parse_shared;
use crate::pass::ParsePass;
use crate::preprocessor::{self, ConstantTable};
use crate::rewriter::{ModuleRewriterFactory, TokenRewriter};

/// A cooperative, cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// States of a parse task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Idle,
    Preprocessing,
    Parsing,
    ExtractingComments,
    AttributesPreprocessing,
    AttributesParsing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Idle => "idle",
            TaskState::Preprocessing => "preprocessing",
            TaskState::Parsing => "parsing",
            TaskState::ExtractingComments => "extracting comments",
            TaskState::AttributesPreprocessing => "preprocessing attributes",
            TaskState::AttributesParsing => "parsing attributes",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Read-only services shared by every task.
#[derive(Clone)]
pub struct Collaborators {
    pub host: Arc<dyn HostTextProvider>,
    pub constants: Arc<dyn ConstantsSource>,
    pub registry: Arc<AnnotationRegistry>,
}

impl Collaborators {
    pub fn new(host: Arc<dyn HostTextProvider>, constants: Arc<dyn ConstantsSource>) -> Self {
        Self {
            host,
            constants,
            registry: Arc::new(AnnotationRegistry::default()),
        }
    }

    pub fn with_registry(mut self, registry: Arc<AnnotationRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

/// Everything a completed task produced.
#[derive(Debug, Clone)]
pub struct ParseCompletion {
    pub task_id: Uuid,
    pub module: QualifiedModuleName,
    pub code_tree: ModuleTree,
    pub code_rewriter: TokenRewriter,
    pub attributes_tree: Option<ModuleTree>,
    /// Present whenever the exported text could be read and tokenized.
    pub attributes_rewriter: Option<TokenRewriter>,
    pub attributes: Option<AttributeMap>,
    /// Why the attributes pass produced no tree, if it did not.
    pub attributes_failure: Option<ParseFailure>,
    pub comments: Vec<Comment>,
    pub annotations: Vec<Annotation>,
}

/// A classified failure of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub module: QualifiedModuleName,
    pub task_id: Uuid,
    pub cause: ParseFailure,
    /// False when only the attributes pass failed.
    pub fatal: bool,
}

/// The outcome of a task.
#[derive(Debug, Clone)]
pub enum TaskResult {
    Completed(ParseCompletion),
    Failed(FailureReport),
    Cancelled,
}

impl TaskResult {
    pub fn completion(&self) -> Option<&ParseCompletion> {
        match self {
            TaskResult::Completed(completion) => Some(completion),
            _ => None,
        }
    }

    pub fn state(&self) -> TaskState {
        match self {
            TaskResult::Completed(_) => TaskState::Completed,
            TaskResult::Failed(_) => TaskState::Failed,
            TaskResult::Cancelled => TaskState::Cancelled,
        }
    }
}

/// Receives task notifications, synchronously on the worker running the task.
///
/// Every task ends with exactly one of `on_completed`, `on_failed` with a
/// fatal report, or `on_cancelled`.
pub trait ParseListener: Send + Sync {
    fn on_state(&self, _task_id: Uuid, _module: &QualifiedModuleName, _state: TaskState) {}

    fn on_completed(&self, _completion: &ParseCompletion) {}

    fn on_failed(&self, _report: &FailureReport) {}

    fn on_cancelled(&self, _task_id: Uuid, _module: &QualifiedModuleName) {}
}

/// Results of the attributes pass; the code view never depends on them.
#[derive(Default)]
struct AttributesPass {
    tree: Option<ModuleTree>,
    rewriter: Option<TokenRewriter>,
    map: Option<AttributeMap>,
    failure: Option<ParseFailure>,
}

/// Parses one module through both passes.
pub struct ParseTask {
    id: Uuid,
    module: QualifiedModuleName,
    collaborators: Collaborators,
    pending_rewriter: Option<TokenRewriter>,
    token: CancellationToken,
    listeners: Vec<Arc<dyn ParseListener>>,
    state: TaskState,
}

impl ParseTask {
    pub fn new(module: QualifiedModuleName, collaborators: Collaborators, token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            module,
            collaborators,
            pending_rewriter: None,
            token,
            listeners: Vec::new(),
            state: TaskState::Idle,
        }
    }

    /// Parses the text of an unsaved rewriter instead of asking the host.
    pub fn with_rewriter(mut self, rewriter: TokenRewriter) -> Self {
        self.pending_rewriter = Some(rewriter);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ParseListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module(&self) -> &QualifiedModuleName {
        &self.module
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Runs the task to a terminal state and notifies the listeners.
    pub fn run(mut self) -> TaskResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute()));

        let result = match outcome {
            Ok(Ok(completion)) => TaskResult::Completed(completion),
            Ok(Err(ParseFailure::Cancelled)) => TaskResult::Cancelled,
            Ok(Err(cause)) => TaskResult::Failed(self.report(cause, true)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "ParseTask {} for {} panicked on thread {:?}: {}",
                    self.id,
                    self.module,
                    std::thread::current().id(),
                    message
                );
                TaskResult::Failed(self.report(ParseFailure::Unclassified(message), true))
            }
        };

        self.transition(result.state());
        match &result {
            TaskResult::Completed(completion) => {
                debug!("ParseTask {} for {} completed", self.id, self.module);
                for listener in &self.listeners {
                    listener.on_completed(completion);
                }
            }
            TaskResult::Failed(report) => {
                error!("ParseTask {} for {} failed: {}", self.id, self.module, report.cause);
                for listener in &self.listeners {
                    listener.on_failed(report);
                }
            }
            TaskResult::Cancelled => {
                debug!("ParseTask {} for {} cancelled", self.id, self.module);
                for listener in &self.listeners {
                    listener.on_cancelled(self.id, &self.module);
                }
            }
        }
        result
    }

    fn execute(&mut self) -> Result<ParseCompletion, ParseFailure> {
        self.check_cancelled()?;
        let host = self.collaborators.host.clone();

        // The source is chosen once: a pending rewriter wins over the host.
        let code = match &self.pending_rewriter {
            Some(rewriter) => rewriter.text(),
            None => host.current_text(&self.module)?,
        };

        self.transition(TaskState::Preprocessing);
        let declared = self.declared_constants()?;
        let stream = preprocessor::evaluate(tokenize(&code), &declared, ParsePass::CodePane)?;
        self.check_cancelled()?;

        self.transition(TaskState::Parsing);
        debug!("ParseTask {} begins code pane pass for {}", self.id, self.module);
        let stream = Arc::new(stream);
        let code_tree = parse_shared(&self.module, &stream, ParsePass::CodePane)?;
        self.check_cancelled()?;
        let code_rewriter = ModuleRewriterFactory::code_pane_rewriter(self.module.clone(), stream);

        self.transition(TaskState::ExtractingComments);
        let extraction = extract(&self.module, &code_tree, &self.collaborators.registry).map_err(unclassified)?;
        self.check_cancelled()?;

        let attributes = self.attributes_pass(&declared);
        if let Some(failure) = &attributes.failure
            && !failure.is_cancelled()
        {
            let report = self.report(failure.clone(), false);
            for listener in &self.listeners {
                listener.on_failed(&report);
            }
        }

        Ok(ParseCompletion {
            task_id: self.id,
            module: self.module.clone(),
            code_tree,
            code_rewriter,
            attributes_tree: attributes.tree,
            attributes_rewriter: attributes.rewriter,
            attributes: attributes.map,
            attributes_failure: attributes.failure,
            comments: extraction.comments,
            annotations: extraction.annotations,
        })
    }

    /// Runs the attributes pass. Its failures never fail the task.
    fn attributes_pass(&mut self, declared: &ConstantTable) -> AttributesPass {
        let mut pass = AttributesPass::default();
        if let Err(failure) = self.try_attributes_pass(declared, &mut pass) {
            debug!(
                "ParseTask {}: attributes pass for {} failed: {}",
                self.id, self.module, failure
            );
            pass.failure = Some(failure);
        }
        pass
    }

    fn try_attributes_pass(&mut self, declared: &ConstantTable, out: &mut AttributesPass) -> Result<(), ParseFailure> {
        self.transition(TaskState::AttributesPreprocessing);
        debug!("ParseTask {} begins attributes pass for {}", self.id, self.module);
        let text = self.collaborators.host.attributes_text(&self.module)?;

        let stream = match preprocessor::evaluate(tokenize(&text), declared, ParsePass::Attributes) {
            Ok(stream) => Arc::new(stream),
            Err(e) => {
                out.rewriter = Some(self.attributes_rewriter(Arc::new(tokenize(&text))));
                return Err(e.into());
            }
        };
        out.rewriter = Some(self.attributes_rewriter(stream.clone()));
        self.check_cancelled()?;

        self.transition(TaskState::AttributesParsing);
        let tree = parse_shared(&self.module, &stream, ParsePass::Attributes)?;
        self.check_cancelled()?;

        out.map = Some(attributes::collect(&tree).map_err(unclassified)?);
        out.tree = Some(tree);
        Ok(())
    }

    fn attributes_rewriter(&self, stream: Arc<crate::lexer::TokenStream>) -> TokenRewriter {
        ModuleRewriterFactory::attributes_rewriter(self.module.clone(), stream)
    }

    /// Reads the project's constants; the project handle is released on return.
    fn declared_constants(&self) -> Result<ConstantTable, ParseFailure> {
        let project = self.collaborators.host.parent_project(&self.module)?;
        Ok(self.collaborators.constants.declared_constants(project.as_ref()))
    }

    fn check_cancelled(&self) -> Result<(), ParseFailure> {
        if self.token.is_cancelled() {
            trace!("ParseTask {}: cancellation observed in state {}", self.id, self.state);
            Err(ParseFailure::Cancelled)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, state: TaskState) {
        trace!("ParseTask {} ({}): {} -> {}", self.id, self.module, self.state, state);
        self.state = state;
        for listener in &self.listeners {
            listener.on_state(self.id, &self.module, state);
        }
    }

    fn report(&self, cause: ParseFailure, fatal: bool) -> FailureReport {
        FailureReport {
            module: self.module.clone(),
            task_id: self.id,
            cause,
            fatal,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
