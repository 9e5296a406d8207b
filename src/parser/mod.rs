//! Module parser.
//!
//! The parser transforms a preprocessed [`TokenStream`] into a
//! [`ModuleTree`]. It is a recursive descent parser over the stream's
//! significant tokens: hidden whitespace and inactive (conditionally
//! excluded) tokens are never seen.
//!
//! The same grammar serves both passes. Constructs that only exist in the
//! exported module text (the `VERSION`/`BEGIN` class header and `Attribute`
//! statements) are rejected in the code-pane pass with a distinct
//! [`ParseError::WrongPass`] error.
//!
//! # Example
//!
//! ```
//! use mallard::lexer::tokenize;
//! use mallard::module::{ComponentKind, QualifiedModuleName};
//! use mallard::parser::parse;
//! use mallard::pass::ParsePass;
//!
//! let module = QualifiedModuleName::new("p", "Project", "Module1", ComponentKind::Standard);
//! let source = "Option Explicit\n\nPublic Sub Foo()\n    Debug.Print 42\nEnd Sub\n";
//!
//! let parsed = parse(&module, tokenize(source), ParsePass::CodePane).unwrap();
//! assert_eq!(parsed.tree.members().count(), 1);
//! assert_eq!(parsed.stream.text(), source);
//! ```
//!
//! # Module Structure
//!
//! The parser is split into focused modules:
//! - [`tokens`] - Token navigation utilities (peek, advance, match, expect)
//! - [`statements`] - Statement dispatcher, simple and attribute statements
//! - [`declarations`] - Declarations section and class header
//! - [`control_flow`] - If/For/Do/While/Select/With blocks
//! - [`procedures`] - Sub/Function/Property, Type and Enum definitions
//! - [`remarks`] - Comments and annotation lists
//! - [`error`] - Parse error types
//!
//! # Error Recovery
//!
//! The parser records an error, skips to the next line and carries on, so
//! one pass collects every error it can find. The pass reports the first
//! one; the rest are logged at debug level.

mod control_flow;
mod declarations;
mod error;
mod procedures;
mod remarks;
mod statements;
mod tokens;

pub use error::{GrammarError, Location, ParseError};

use std::sync::Arc;

use log::debug;

use crate::ast::{Clause, ModuleElement, ModuleTree};
use crate::lexer::{Token, TokenKind, TokenStream};
use crate::module::QualifiedModuleName;
use crate::pass::ParsePass;

/// A successfully parsed module: the tree and the stream it was built from.
///
/// The stream is frozen behind an [`Arc`] once parsing is done; edits go
/// through a [`TokenRewriter`](crate::rewriter::TokenRewriter).
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub tree: ModuleTree,
    pub stream: Arc<TokenStream>,
}

/// Parses one preprocessed token stream for one pass.
///
/// Returns the tree together with the consumed stream, or the first error
/// classified as a main-grammar or wrong-pass failure.
pub fn parse(
    module: &QualifiedModuleName,
    stream: TokenStream,
    pass: ParsePass,
) -> Result<ParsedModule, GrammarError> {
    let stream = Arc::new(stream);
    let tree = parse_shared(module, &stream, pass)?;
    Ok(ParsedModule { tree, stream })
}

/// Parses a stream that is already shared, for callers that need the stream
/// whether or not parsing succeeds.
pub fn parse_shared(
    module: &QualifiedModuleName,
    stream: &Arc<TokenStream>,
    pass: ParsePass,
) -> Result<ModuleTree, GrammarError> {
    let result = Parser::new(stream, pass).parse(module);

    match result {
        Ok(tree) => {
            debug!(
                "parsed {} ({} pass): {} elements",
                module,
                pass,
                tree.elements.len()
            );
            Ok(tree)
        }
        Err(errors) => {
            let mut errors = errors.into_iter();
            let first = errors.next().unwrap_or_else(|| ParseError::Syntax {
                message: "parse failed".to_string(),
                at: Location::default(),
            });
            for other in errors {
                debug!("{} ({} pass): further error: {}", module, pass, other);
            }
            Err(GrammarError::classify(&first, pass))
        }
    }
}

/// Parser for module source code.
///
/// The parser consumes the significant tokens of a stream and produces a
/// syntax tree. Errors are collected and returned at the end rather than
/// failing immediately.
pub struct Parser<'a> {
    /// The whole stream, for source text of token ranges.
    stream: &'a TokenStream,
    /// The significant tokens to parse.
    tokens: Vec<&'a Token>,
    /// Current position in `tokens`.
    current: usize,
    /// Collected parse errors.
    errors: Vec<ParseError>,
    pass: ParsePass,
    /// Enclosing `For` loops still to be closed by the last `Next a, b`.
    pending_next: usize,
    /// The `Next` line that closed more than one loop.
    shared_next: Option<Clause>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given stream.
    pub fn new(stream: &'a TokenStream, pass: ParsePass) -> Self {
        Self {
            stream,
            tokens: stream.significant().collect(),
            current: 0,
            errors: Vec::new(),
            pass,
            pending_next: 0,
            shared_next: None,
        }
    }

    /// Parses the token stream into a module tree.
    ///
    /// Returns the tree if successful, or the collected errors if parsing failed.
    pub fn parse(&mut self, module: &QualifiedModuleName) -> Result<ModuleTree, Vec<ParseError>> {
        let header = self.parse_header();
        let elements = self.parse_elements();

        if self.errors.is_empty() {
            Ok(ModuleTree::new(
                module.clone(),
                self.pass,
                self.stream.id(),
                header,
                elements,
            ))
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    /// Parses the module body: declarations section, members, and trailing
    /// remark lines.
    fn parse_elements(&mut self) -> Vec<ModuleElement> {
        let mut elements = Vec::new();
        let mut seen_member = false;

        while !self.is_at_end() {
            if self.skip_separators() {
                continue;
            }

            if self.check_member_start() {
                match self.parse_member() {
                    Ok(member) => {
                        seen_member = true;
                        elements.push(ModuleElement::Member(member));
                    }
                    Err(()) => self.synchronize(),
                }
                continue;
            }

            let first = self.peek();
            match self.parse_module_statement() {
                Ok(statement) => {
                    if seen_member
                        && statement.is_declaration()
                        && let Some(first) = first
                    {
                        self.error(ParseError::syntax(
                            "only comments may appear after End Sub, End Function, or End Property",
                            first,
                        ));
                    }
                    elements.push(ModuleElement::Statement(statement));
                }
                Err(()) => self.synchronize(),
            }
        }

        elements
    }

    /// Skips blank lines and statement separators. Returns true if anything
    /// was skipped.
    fn skip_separators(&mut self) -> bool {
        let start = self.current;
        while self.match_token(TokenKind::Newline) || self.match_token(TokenKind::Colon) {}
        self.current != start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BlockKind, MemberKind, RemarkKind, StatementKind};
    use crate::lexer::tokenize;
    use crate::module::{ComponentKind, Selection};

    fn module() -> QualifiedModuleName {
        QualifiedModuleName::new("p", "Project", "Module1", ComponentKind::Standard)
    }

    fn parse_code(source: &str) -> Result<ModuleTree, GrammarError> {
        parse(&module(), tokenize(source), ParsePass::CodePane).map(|p| p.tree)
    }

    fn parse_exported(source: &str) -> Result<ModuleTree, GrammarError> {
        parse(&module(), tokenize(source), ParsePass::Attributes).map(|p| p.tree)
    }

    #[test]
    fn test_parse_declarations_and_members() {
        let tree = parse_code(
            "Option Explicit\nPrivate mValue As Long\nConst MAX As Integer = 10\n\nPublic Function Value() As Long\n    Value = mValue\nEnd Function\n",
        )
        .unwrap();
        assert_eq!(tree.declarations().count(), 3);
        let member = tree.member("value").unwrap();
        assert_eq!(member.kind, MemberKind::Function);
        assert_eq!(member.return_type.as_deref(), Some("Long"));
        assert_eq!(member.body.len(), 1);
        assert_eq!(tree.pass(), ParsePass::CodePane);
    }

    #[test]
    fn test_parse_property_members() {
        let tree = parse_code(
            "Public Property Get Name() As String\nEnd Property\nPublic Property Let Name(ByVal value As String)\nEnd Property\nFriend Static Sub Tick()\nEnd Sub\n",
        )
        .unwrap();
        let kinds: Vec<_> = tree.members().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MemberKind::PropertyGet, MemberKind::PropertyLet, MemberKind::Sub]
        );
        let tick = tree.member("Tick").unwrap();
        assert!(tick.is_static);
        let name = tree.members().nth(1).unwrap();
        assert_eq!(name.params.len(), 1);
        assert!(name.params[0].by_val);
    }

    #[test]
    fn test_parse_blocks() {
        let tree = parse_code(
            "Sub Foo()\n    If a Then\n        b\n    ElseIf c Then\n        d\n    Else\n        e\n    End If\n    For i = 1 To 10\n        Do While x\n        Loop\n    Next i\n    Select Case y\n        Case 1: z\n        Case Else\n    End Select\n    With obj\n        .Run\n    End With\n    While w\n    Wend\nEnd Sub\n",
        )
        .unwrap();
        let body = &tree.member("Foo").unwrap().body;
        let kinds: Vec<_> = body
            .iter()
            .map(|s| match &s.kind {
                StatementKind::Block { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(BlockKind::If),
                Some(BlockKind::For),
                Some(BlockKind::Select),
                Some(BlockKind::With),
                Some(BlockKind::While)
            ]
        );
        let StatementKind::Block { sections, .. } = &body[0].kind else {
            panic!("expected block");
        };
        assert_eq!(sections.len(), 3);
    }

    #[test]
    fn test_next_closing_two_loops() {
        let tree = parse_code("Sub Foo()\nFor i = 1 To 2\nFor j = 1 To 2\nNext j, i\nx\nEnd Sub\n").unwrap();
        let body = &tree.member("Foo").unwrap().body;
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_single_line_if_is_simple() {
        let tree = parse_code("Sub Foo()\nIf a Then b = 1: c = 2 Else d\nEnd Sub\n").unwrap();
        let body = &tree.member("Foo").unwrap().body;
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0].kind, StatementKind::Simple));
    }

    #[test]
    fn test_remarks_end_statements() {
        let source = "' header\nOption Explicit ' why\nSub Foo() ' sig\n    x = 1 Rem old\nEnd Sub ' end\n";
        let tree = parse_code(source).unwrap();
        let first = tree.declarations().next().unwrap();
        assert!(first.is_empty());
        assert_eq!(first.remark.as_ref().unwrap().text, " header");

        let foo = tree.member("Foo").unwrap();
        assert_eq!(foo.header.remark.as_ref().unwrap().text, " sig");
        assert_eq!(foo.end.remark.as_ref().unwrap().text, " end");
        let rem = foo.body[0].remark.as_ref().unwrap();
        assert_eq!(rem.kind, RemarkKind::Rem);
        assert_eq!(rem.text, "old");
    }

    #[test]
    fn test_annotation_remark() {
        let tree = parse_code("'@ModuleDescription(\"hello\")\nOption Explicit\n").unwrap();
        let remark = tree.declarations().next().unwrap().remark.clone().unwrap();
        let annotations = remark.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].name, "ModuleDescription");
        assert_eq!(annotations[0].args, vec!["hello".to_string()]);
        assert_eq!(annotations[0].selection, Selection::new(1, 2, 1, 29));
    }

    #[test]
    fn test_member_selection() {
        let tree = parse_code("Sub Foo()\nEnd Sub").unwrap();
        let foo = tree.member("Foo").unwrap();
        assert_eq!(foo.selection, Selection::new(1, 1, 2, 8));
        assert_eq!(foo.header.selection, Selection::new(1, 1, 1, 10));
    }

    #[test]
    fn test_attribute_rejected_in_code_pane() {
        let err = parse_code("Attribute VB_Name = \"Module1\"\n").unwrap_err();
        let GrammarError::ParsePass(syntax) = err else {
            panic!("expected a parse-pass error");
        };
        assert_eq!(syntax.token, "Attribute");
        assert_eq!((syntax.line, syntax.column), (1, 1));
        assert_eq!(syntax.pass, ParsePass::CodePane);
    }

    #[test]
    fn test_class_header_rejected_in_code_pane() {
        let err = parse_code("VERSION 1.0 CLASS\nBEGIN\n  MultiUse = -1\nEND\n").unwrap_err();
        assert!(matches!(err, GrammarError::ParsePass(_)));
    }

    #[test]
    fn test_exported_class_parses() {
        let source = "VERSION 1.0 CLASS\r\nBEGIN\r\n  MultiUse = -1  'True\r\nEND\r\nAttribute VB_Name = \"Class1\"\r\nAttribute VB_PredeclaredId = False\r\nOption Explicit\r\nPublic Sub Foo()\r\nAttribute Foo.VB_Description = \"Does foo\"\r\nEnd Sub\r\n";
        let tree = parse_exported(source).unwrap();
        let header = tree.header.as_ref().unwrap();
        assert_eq!(header.version, "1.0");
        assert_eq!(header.properties, vec![("MultiUse".to_string(), "-1".to_string())]);

        let attributes: Vec<_> = tree
            .declarations()
            .filter_map(|s| match &s.kind {
                StatementKind::Attribute(a) => Some(a.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(attributes, vec!["VB_Name", "VB_PredeclaredId"]);

        let foo = tree.member("Foo").unwrap();
        let attribute = foo.attributes().next().unwrap();
        assert_eq!(attribute.target.as_deref(), Some("Foo"));
        assert_eq!(attribute.values, vec!["\"Does foo\"".to_string()]);
    }

    #[test]
    fn test_missing_end_if_reported_at_if() {
        let err = parse_code("Sub Foo()\n    If a Then\n        b\nEnd Sub\n").unwrap_err();
        let GrammarError::MainGrammar(syntax) = err else {
            panic!("expected a main grammar error");
        };
        assert_eq!(syntax.token, "If");
        assert_eq!((syntax.line, syntax.column), (2, 5));
    }

    #[test]
    fn test_mismatched_member_end() {
        let err = parse_code("Sub Foo()\nEnd Function\n").unwrap_err();
        assert!(matches!(err, GrammarError::MainGrammar(_)));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse_code("Sub Foo()\n    x = (1 + 2\nEnd Sub\n").unwrap_err();
        assert!(err.syntax_error().message.contains("parentheses"));
    }

    #[test]
    fn test_declaration_after_member() {
        let err = parse_code("Sub Foo()\nEnd Sub\nDim x As Long\n").unwrap_err();
        let syntax = err.syntax_error();
        assert_eq!(syntax.token, "Dim");
        assert_eq!(syntax.line, 3);
    }

    #[test]
    fn test_executable_statement_outside_member() {
        let err = parse_code("x = 1\n").unwrap_err();
        assert!(matches!(err, GrammarError::MainGrammar(_)));
    }

    #[test]
    fn test_stray_closer() {
        let err = parse_code("Sub Foo()\n    Next\nEnd Sub\n").unwrap_err();
        assert_eq!(err.syntax_error().token, "Next");
    }

    #[test]
    fn test_type_and_enum() {
        let tree = parse_code(
            "Private Type Point\n    X As Long ' across\n    Y As Long\nEnd Type\nPublic Enum Color\n    Red = 1\n    Green\nEnd Enum\n",
        )
        .unwrap();
        let mut declarations = tree.declarations();
        let StatementKind::TypeDef { name, fields, .. } = &declarations.next().unwrap().kind else {
            panic!("expected type");
        };
        assert_eq!(name, "Point");
        assert_eq!(fields.len(), 2);
        assert!(fields[0].remark.is_some());
        let StatementKind::EnumDef { members, .. } = &declarations.next().unwrap().kind else {
            panic!("expected enum");
        };
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_inactive_tokens_are_skipped() {
        let stream = crate::preprocessor::evaluate(
            tokenize("#If False Then\nx = 1\n#End If\nOption Explicit\n"),
            &crate::preprocessor::ConstantTable::new(),
            ParsePass::CodePane,
        )
        .unwrap();
        let parsed = parse(&module(), stream, ParsePass::CodePane).unwrap();
        assert_eq!(parsed.tree.declarations().count(), 1);
    }

    #[test]
    fn test_array_return_types() {
        let tree = parse_code(
            "Private Declare PtrSafe Function Codes Lib \"x\" () As Long()\nPublic Function Names() As String()\nEnd Function\nProperty Get Items() As Variant()\nEnd Property\n",
        )
        .unwrap();
        assert_eq!(tree.member("Names").unwrap().return_type.as_deref(), Some("String()"));
        assert_eq!(tree.member("Items").unwrap().return_type.as_deref(), Some("Variant()"));
        assert_eq!(tree.declarations().count(), 1);
    }

    #[test]
    fn test_def_type_statements() {
        let tree = parse_code("DefLng A-Z\ndefint I-N, X\nOption Explicit\n").unwrap();
        let kinds: Vec<_> = tree.declarations().map(|s| &s.kind).collect();
        let StatementKind::DefType { type_name, ranges } = kinds[0] else {
            panic!("expected DefLng");
        };
        assert_eq!(type_name, "Lng");
        assert_eq!(ranges, &vec!["A-Z".to_string()]);
        let StatementKind::DefType { type_name, ranges } = kinds[1] else {
            panic!("expected DefInt");
        };
        assert_eq!(type_name, "int");
        assert_eq!(ranges, &vec!["I-N".to_string(), "X".to_string()]);
        assert_eq!(kinds.len(), 3);

        assert!(parse_code("DefLng 1\n").is_err());
    }

    #[test]
    fn test_unicode_names() {
        let source = "Dim größe As Long\nSub Größer(ByVal wert As Long)\n    größe = wert\nEnd Sub\n";
        let tree = parse_code(source).unwrap();
        assert!(tree.member("Größer").is_some());
        assert_eq!(tree.declarations().count(), 1);
    }

    #[test]
    fn test_contextual_keywords_as_names() {
        let tree = parse_code(
            "Private Lib As String\nDim Alias As String, PtrSafe As Boolean\nPrivate Declare PtrSafe Sub Bar Lib \"k32\" Alias \"Baz\" ()\nSub Foo(ByVal Lib As Long)\n    Dim Alias As Long\n    Alias = Lib\nEnd Sub\n",
        )
        .unwrap();
        assert_eq!(tree.declarations().count(), 3);
        let foo = tree.member("Foo").unwrap();
        assert_eq!(foo.params[0].name, "Lib");
        assert_eq!(foo.body.len(), 2);
    }

    #[test]
    fn test_empty_module() {
        let tree = parse_code("").unwrap();
        assert!(tree.elements.is_empty());
        assert!(tree.header.is_none());
    }
}
