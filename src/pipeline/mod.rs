//! The per-module parse pipeline.
//!
//! A [`ParseTask`] takes one module through these stages:
//!
//! ```text
//! code text → preprocess → parse (code pane) → extract comments/annotations
//!           → exported text → preprocess → parse (attributes) → attribute map
//! ```
//!
//! Any failure up to and including extraction fails the task. A failure of
//! the attributes pass is reported but the task still completes with the
//! code-pane results. The [`ParseCoordinator`] runs tasks for many modules
//! on a thread pool.

mod coordinator;
mod error;
mod task;

pub use coordinator::{CoordinatorError, ParseCoordinator};
pub use error::ParseFailure;
pub use task::{
    CancellationToken, Collaborators, FailureReport, ParseCompletion, ParseListener, ParseTask, TaskResult,
    TaskState,
};

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use uuid::Uuid;

    use super::*;
    use crate::annotations::AnnotationScope;
    use crate::ast::{MemberKind, StatementKind};
    use crate::attributes::ScopeKind;
    use crate::host::{ConstantsSource, HostError, InMemoryHost, ProjectHandle};
    use crate::lexer::tokenize;
    use crate::module::{ComponentKind, QualifiedModuleName};
    use crate::parser::parse;
    use crate::pass::ParsePass;
    use crate::preprocessor::ConstantTable;
    use crate::rewriter::ModuleRewriterFactory;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        State(TaskState),
        Completed,
        Failed { fatal: bool },
        Cancelled,
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
        cancel_on: Option<(TaskState, CancellationToken)>,
    }

    impl Recorder {
        fn cancelling(state: TaskState, token: CancellationToken) -> Self {
            Self {
                events: Mutex::default(),
                cancel_on: Some((state, token)),
            }
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn terminal_events(&self) -> Vec<Event> {
            self.events()
                .into_iter()
                .filter(|e| !matches!(e, Event::State(_)))
                .collect()
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl ParseListener for Recorder {
        fn on_state(&self, _task_id: Uuid, _module: &QualifiedModuleName, state: TaskState) {
            if let Some((on, token)) = &self.cancel_on
                && *on == state
            {
                token.cancel();
            }
            self.push(Event::State(state));
        }

        fn on_completed(&self, _completion: &ParseCompletion) {
            self.push(Event::Completed);
        }

        fn on_failed(&self, report: &FailureReport) {
            self.push(Event::Failed { fatal: report.fatal });
        }

        fn on_cancelled(&self, _task_id: Uuid, _module: &QualifiedModuleName) {
            self.push(Event::Cancelled);
        }
    }

    struct PanickingConstants;

    impl ConstantsSource for PanickingConstants {
        fn declared_constants(&self, _project: &dyn ProjectHandle) -> ConstantTable {
            panic!("constants unavailable")
        }
    }

    const CODE: &str = "'@ModuleDescription(\"Utilities\")\nOption Explicit\n\n' Adds two numbers\n'@Description(\"Adds\")\nPublic Function Add(ByVal a As Long, ByVal b As Long) As Long\n    Add = a + b\nEnd Function\n";

    const EXPORTED: &str = "Attribute VB_Name = \"Module1\"\nOption Explicit\n\nPublic Function Add(ByVal a As Long, ByVal b As Long) As Long\nAttribute Add.VB_Description = \"Adds\"\n    Add = a + b\nEnd Function\n";

    fn module(name: &str) -> QualifiedModuleName {
        QualifiedModuleName::new("p", "Project", name, ComponentKind::Standard)
    }

    fn setup(host: InMemoryHost) -> (Arc<InMemoryHost>, Collaborators) {
        let host = Arc::new(host);
        let collaborators = Collaborators::new(host.clone(), Arc::new(ConstantTable::new()));
        (host, collaborators)
    }

    fn run_task(collaborators: Collaborators, name: &str, recorder: Arc<Recorder>) -> TaskResult {
        ParseTask::new(module(name), collaborators, CancellationToken::new())
            .with_listener(recorder)
            .run()
    }

    #[test]
    fn test_completed_task() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), CODE, Some(EXPORTED.to_string()));
        let (host, collaborators) = setup(host);
        let recorder = Arc::new(Recorder::default());

        let result = run_task(collaborators, "Module1", recorder.clone());
        let completion = result.completion().expect("completed");

        assert_eq!(completion.code_rewriter.text(), CODE);
        assert_eq!(completion.code_tree.pass(), ParsePass::CodePane);
        assert_eq!(completion.code_tree.members().count(), 1);
        assert_eq!(completion.comments.len(), 1);
        assert_eq!(completion.comments[0].text, " Adds two numbers");
        let annotations: Vec<_> = completion
            .annotations
            .iter()
            .map(|a| (a.name.as_str(), a.scope.clone()))
            .collect();
        assert_eq!(
            annotations,
            vec![
                ("ModuleDescription", AnnotationScope::Module),
                ("Description", AnnotationScope::Member("Add".to_string())),
            ]
        );

        assert!(completion.attributes_failure.is_none());
        let rewriter = completion.attributes_rewriter.as_ref().unwrap();
        assert_eq!(rewriter.text(), EXPORTED);
        assert_eq!(rewriter.pass(), ParsePass::Attributes);
        let attributes = completion.attributes.as_ref().unwrap();
        assert!(
            attributes
                .get("Module1", ScopeKind::Module)
                .unwrap()
                .contains("VB_Name")
        );
        let add = attributes
            .get("Add", ScopeKind::Member(MemberKind::Function))
            .unwrap();
        assert_eq!(add.get("VB_Description").unwrap().values, vec!["\"Adds\"".to_string()]);

        assert_eq!(
            recorder.events(),
            vec![
                Event::State(TaskState::Preprocessing),
                Event::State(TaskState::Parsing),
                Event::State(TaskState::ExtractingComments),
                Event::State(TaskState::AttributesPreprocessing),
                Event::State(TaskState::AttributesParsing),
                Event::State(TaskState::Completed),
                Event::Completed,
            ]
        );
        assert_eq!(host.open_handles(), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), CODE, None);
        let (_, collaborators) = setup(host);
        let recorder = Arc::new(Recorder::default());
        let token = CancellationToken::new();
        token.cancel();

        let result = ParseTask::new(module("Module1"), collaborators, token)
            .with_listener(recorder.clone())
            .run();
        assert!(matches!(result, TaskResult::Cancelled));
        assert_eq!(
            recorder.events(),
            vec![Event::State(TaskState::Cancelled), Event::Cancelled]
        );
    }

    #[test]
    fn test_cancelled_while_parsing() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), CODE, None);
        let (_, collaborators) = setup(host);
        let token = CancellationToken::new();
        let recorder = Arc::new(Recorder::cancelling(TaskState::Parsing, token.clone()));

        let result = ParseTask::new(module("Module1"), collaborators, token)
            .with_listener(recorder.clone())
            .run();
        assert!(matches!(result, TaskResult::Cancelled));
        assert_eq!(recorder.terminal_events(), vec![Event::Cancelled]);
    }

    #[test]
    fn test_cancelled_during_attributes_pass_keeps_code_results() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), CODE, Some(EXPORTED.to_string()));
        let (_, collaborators) = setup(host);
        let token = CancellationToken::new();
        let recorder = Arc::new(Recorder::cancelling(TaskState::AttributesPreprocessing, token.clone()));

        let result = ParseTask::new(module("Module1"), collaborators, token)
            .with_listener(recorder.clone())
            .run();
        let completion = result.completion().expect("partial completion");
        assert_eq!(completion.attributes_failure, Some(ParseFailure::Cancelled));
        assert!(completion.attributes_tree.is_none());
        assert!(completion.attributes.is_none());
        assert_eq!(completion.annotations.len(), 2);
        assert_eq!(recorder.terminal_events(), vec![Event::Completed]);
    }

    #[test]
    fn test_attributes_unavailable_is_not_fatal() {
        let host = InMemoryHost::new();
        host.insert_code_only(module("Module1"), CODE);
        let (_, collaborators) = setup(host);
        let recorder = Arc::new(Recorder::default());

        let result = run_task(collaborators, "Module1", recorder.clone());
        let completion = result.completion().expect("completed");
        assert!(matches!(
            completion.attributes_failure,
            Some(ParseFailure::Host(HostError::Unavailable(_)))
        ));
        assert!(completion.attributes_rewriter.is_none());
        assert_eq!(completion.code_rewriter.text(), CODE);
        assert_eq!(
            recorder.terminal_events(),
            vec![Event::Failed { fatal: false }, Event::Completed]
        );
    }

    #[test]
    fn test_attributes_preprocessor_error_keeps_rewriter() {
        let exported = "Attribute VB_Name = \"Module1\"\n#If True Then\nOption Explicit\n";
        let host = InMemoryHost::new();
        host.insert(module("Module1"), "Option Explicit\n", Some(exported.to_string()));
        let (_, collaborators) = setup(host);
        let recorder = Arc::new(Recorder::default());

        let result = run_task(collaborators, "Module1", recorder.clone());
        let completion = result.completion().expect("completed");
        match &completion.attributes_failure {
            Some(ParseFailure::Preprocessor(e)) => {
                assert_eq!(e.pass, ParsePass::Attributes);
                assert_eq!((e.line, e.column), (2, 1));
            }
            other => panic!("unexpected attributes failure {:?}", other),
        }
        assert_eq!(completion.attributes_rewriter.as_ref().unwrap().text(), exported);
        assert_eq!(
            recorder.terminal_events(),
            vec![Event::Failed { fatal: false }, Event::Completed]
        );
    }

    #[test]
    fn test_unterminated_if_fails_code_pane() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), "#If True Then\nDim x\n", None);
        let (_, collaborators) = setup(host);
        let recorder = Arc::new(Recorder::default());

        let result = run_task(collaborators, "Module1", recorder.clone());
        let TaskResult::Failed(report) = result else {
            panic!("expected failure");
        };
        assert!(report.fatal);
        let ParseFailure::Preprocessor(error) = &report.cause else {
            panic!("expected preprocessor failure, got {:?}", report.cause);
        };
        assert_eq!(error.pass, ParsePass::CodePane);
        assert_eq!(error.token, "#If");
        assert_eq!((error.line, error.column), (1, 1));
        assert_eq!(recorder.terminal_events(), vec![Event::Failed { fatal: true }]);
    }

    #[test]
    fn test_live_branch_reaches_the_parser() {
        let host = InMemoryHost::new();
        let code = "Public Sub Foo()\n#If True Then\nDim x\n#End If\nEnd Sub";
        host.insert(module("Module1"), code, None);
        let (_, collaborators) = setup(host);

        let result = run_task(collaborators, "Module1", Arc::new(Recorder::default()));
        let completion = result.completion().expect("completed");
        let foo = completion.code_tree.members().next().unwrap();
        assert!(
            foo.body
                .iter()
                .any(|s| matches!(s.kind, StatementKind::Variable { .. }))
        );
        assert_eq!(completion.code_rewriter.text(), code);
    }

    #[test]
    fn test_dead_branch_is_not_parsed() {
        let host = InMemoryHost::new();
        let code = "#If False Then\nPrivate x As\n#Else\nPrivate x As Long\n#End If\n";
        host.insert(module("Module1"), code, None);
        let (_, collaborators) = setup(host);

        let result = run_task(collaborators, "Module1", Arc::new(Recorder::default()));
        assert!(result.completion().is_some());
    }

    #[test]
    fn test_syntax_error_is_main_grammar_failure() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), "Sub Foo()\n    x = 1\n", None);
        let (_, collaborators) = setup(host);

        let result = run_task(collaborators, "Module1", Arc::new(Recorder::default()));
        let TaskResult::Failed(report) = result else {
            panic!("expected failure");
        };
        assert!(matches!(report.cause, ParseFailure::MainGrammar(_)));
    }

    #[test]
    fn test_attribute_in_code_pane_is_wrong_pass() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), "Attribute VB_Name = \"Module1\"\n", None);
        let (_, collaborators) = setup(host);

        let result = run_task(collaborators, "Module1", Arc::new(Recorder::default()));
        let TaskResult::Failed(report) = result else {
            panic!("expected failure");
        };
        let ParseFailure::ParsePass(error) = &report.cause else {
            panic!("expected wrong-pass failure, got {:?}", report.cause);
        };
        assert_eq!(error.pass, ParsePass::CodePane);
        assert_eq!(error.line, 1);
    }

    #[test]
    fn test_missing_module_is_host_failure() {
        let (_, collaborators) = setup(InMemoryHost::new());
        let recorder = Arc::new(Recorder::default());

        let result = run_task(collaborators, "Missing", recorder.clone());
        let TaskResult::Failed(report) = result else {
            panic!("expected failure");
        };
        assert!(matches!(report.cause, ParseFailure::Host(HostError::ModuleNotFound(_))));
        assert_eq!(recorder.terminal_events(), vec![Event::Failed { fatal: true }]);
    }

    #[test]
    fn test_panic_is_unclassified_and_releases_handles() {
        let host = Arc::new(InMemoryHost::new());
        host.insert(module("Module1"), CODE, None);
        let collaborators = Collaborators::new(host.clone(), Arc::new(PanickingConstants));
        let recorder = Arc::new(Recorder::default());

        let result = run_task(collaborators, "Module1", recorder.clone());
        let TaskResult::Failed(report) = result else {
            panic!("expected failure");
        };
        assert_eq!(report.cause, ParseFailure::Unclassified("constants unavailable".to_string()));
        assert_eq!(host.open_handles(), 0);
        assert_eq!(recorder.terminal_events(), vec![Event::Failed { fatal: true }]);
    }

    #[test]
    fn test_pending_rewriter_is_parsed_instead_of_host_text() {
        let host = InMemoryHost::new();
        host.insert(module("Module1"), "Option Explicit\n", None);
        let (_, collaborators) = setup(host);

        let original = "Private x As Long\n";
        let stream = parse(&module("Module1"), tokenize(original), ParsePass::CodePane)
            .unwrap()
            .stream;
        let mut rewriter = ModuleRewriterFactory::code_pane_rewriter(module("Module1"), stream);
        rewriter.insert_before(0, "Private y As Long\n").unwrap();
        let edited = rewriter.text();

        let result = ParseTask::new(module("Module1"), collaborators, CancellationToken::new())
            .with_rewriter(rewriter)
            .run();
        let completion = result.completion().expect("completed");
        assert_eq!(completion.code_rewriter.text(), edited);
        assert!(!completion.code_rewriter.is_dirty());
    }

    #[test]
    fn test_coordinator_parses_modules_independently() {
        let host = InMemoryHost::new();
        host.insert(module("A"), CODE, Some(EXPORTED.to_string()));
        host.insert(module("B"), "Sub Broken()\n", None);
        host.insert(module("C"), "Option Explicit\n", None);
        let (host, collaborators) = setup(host);
        let recorder = Arc::new(Recorder::default());

        let coordinator = ParseCoordinator::new(collaborators, Some(2))
            .unwrap()
            .with_listener(recorder.clone());
        let results = coordinator.parse_modules(&host.modules());

        let states: Vec<_> = results.iter().map(TaskResult::state).collect();
        assert_eq!(
            states,
            vec![TaskState::Completed, TaskState::Failed, TaskState::Completed]
        );
        let ids: std::collections::HashSet<_> = results
            .iter()
            .filter_map(|r| r.completion().map(|c| c.task_id))
            .collect();
        assert_eq!(ids.len(), 2);
        let terminal = recorder.terminal_events();
        assert_eq!(terminal.iter().filter(|e| **e == Event::Completed).count(), 2);
        assert_eq!(host.open_handles(), 0);
    }

    #[test]
    fn test_coordinator_cancel_stops_current_parse_only() {
        let host = InMemoryHost::new();
        host.insert(module("A"), CODE, None);
        host.insert(module("B"), "Option Explicit\n", None);
        let (host, collaborators) = setup(host);
        let coordinator = ParseCoordinator::new(collaborators, Some(1)).unwrap();
        let token = coordinator.cancellation_token();
        let coordinator = coordinator.with_listener(Arc::new(Recorder::cancelling(TaskState::Parsing, token)));

        let results = coordinator.parse_modules(&host.modules());
        assert!(results.iter().all(|r| matches!(r, TaskResult::Cancelled)));
        assert!(coordinator.cancellation_token().is_cancelled());

        // The listener only holds the first token, so later parses run to completion.
        let results = coordinator.parse_modules(&host.modules());
        assert!(results.iter().all(|r| r.state() == TaskState::Completed));
        assert!(!coordinator.cancellation_token().is_cancelled());
        assert_eq!(coordinator.parse_module(module("A"), None).state(), TaskState::Completed);
    }

    #[test]
    fn test_coordinator_parses_again_after_cancel() {
        let host = InMemoryHost::new();
        host.insert(module("A"), CODE, None);
        let (host, collaborators) = setup(host);
        let coordinator = ParseCoordinator::new(collaborators, Some(1)).unwrap();
        coordinator.cancel();
        assert!(coordinator.cancellation_token().is_cancelled());

        let results = coordinator.parse_modules(&host.modules());
        assert_eq!(results[0].state(), TaskState::Completed);
        coordinator.cancel();
        assert_eq!(coordinator.parse_module(module("A"), None).state(), TaskState::Completed);
    }
}
