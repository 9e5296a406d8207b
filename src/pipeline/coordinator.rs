//! Parses many modules in parallel.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use rayon::prelude::*;
use thiserror::Error;

use super::task::{CancellationToken, Collaborators, ParseListener, ParseTask, TaskResult};
use crate::module::QualifiedModuleName;
use crate::rewriter::TokenRewriter;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to build parser thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Runs one [`ParseTask`] per module on a dedicated thread pool.
///
/// Tasks share the collaborators and the current cancellation token; nothing
/// else crosses between them. A cancelled token only stops the parse it was
/// cancelled during: the next call to [`parse_modules`](Self::parse_modules)
/// or [`parse_module`](Self::parse_module) starts with a fresh one.
pub struct ParseCoordinator {
    pool: rayon::ThreadPool,
    collaborators: Collaborators,
    listeners: Vec<Arc<dyn ParseListener>>,
    token: Mutex<CancellationToken>,
}

impl ParseCoordinator {
    /// Creates a coordinator. `threads` defaults to the number of CPUs.
    pub fn new(collaborators: Collaborators, threads: Option<usize>) -> Result<Self, CoordinatorError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("mallard-parser-{}", i));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        debug!("parser pool started with {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            collaborators,
            listeners: Vec::new(),
            token: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn with_listener(mut self, listener: Arc<dyn ParseListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// The token observed by the tasks of the current parse.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Cancels the tasks of the current parse that have not finished yet.
    /// Completed results are unaffected.
    pub fn cancel(&self) {
        info!("cancelling parse");
        self.cancellation_token().cancel();
    }

    /// Parses every module; results are in input order.
    pub fn parse_modules(&self, modules: &[QualifiedModuleName]) -> Vec<TaskResult> {
        info!("parsing {} modules", modules.len());
        let token = self.begin();
        self.pool.install(|| {
            modules
                .par_iter()
                .map(|module| self.task(module.clone(), &token).run())
                .collect()
        })
    }

    /// Parses one module, from a pending rewriter's text when given.
    pub fn parse_module(&self, module: QualifiedModuleName, rewriter: Option<TokenRewriter>) -> TaskResult {
        let mut task = self.task(module, &self.begin());
        if let Some(rewriter) = rewriter {
            task = task.with_rewriter(rewriter);
        }
        self.pool.install(|| task.run())
    }

    /// The token for a new parse: the current one, or a fresh one if the
    /// current one was cancelled.
    fn begin(&self) -> CancellationToken {
        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            debug!("previous parse was cancelled; starting with a fresh token");
            *token = CancellationToken::new();
        }
        token.clone()
    }

    fn task(&self, module: QualifiedModuleName, token: &CancellationToken) -> ParseTask {
        self.listeners.iter().fold(
            ParseTask::new(module, self.collaborators.clone(), token.clone()),
            |task, listener| task.with_listener(listener.clone()),
        )
    }
}
