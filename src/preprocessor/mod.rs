//! Conditional compilation.
//!
//! This module resolves `#Const`, `#If`, `#ElseIf`, `#Else` and `#End If`
//! directives before tokens reach the grammar:
//!
//! - Directive lines are always excluded.
//! - Lines inside branches whose condition is false are excluded.
//! - `#Const` defines a module-local constant, but only in live code.
//!
//! Excluded tokens are not removed. They are moved to the
//! [`Channel::Inactive`] channel, so token indices stay stable and the
//! stream still reproduces the original text exactly. Rewrites of the code
//! pane therefore never lose dead branches.
//!
//! # Example
//!
//! ```
//! use mallard::lexer::tokenize;
//! use mallard::pass::ParsePass;
//! use mallard::preprocessor::{evaluate, ConstantTable};
//!
//! let source = "#If False Then\nx = 1\n#Else\nx = 2\n#End If\n";
//! let stream = evaluate(tokenize(source), &ConstantTable::new(), ParsePass::CodePane).unwrap();
//! let live: String = stream.significant().map(|t| t.text.as_str()).collect();
//! assert_eq!(live, "x=2\n");
//! assert_eq!(stream.text(), source);
//! ```

mod constants;
mod error;
mod expr;

pub use constants::{ConstValue, ConstantTable, PredefinedConstants, VbaVersion};
pub use error::{PreprocessorError, PreprocessorErrorKind};

use std::ops::Range;

use crate::lexer::{Channel, Token, TokenKind, TokenStream};
use crate::pass::ParsePass;

use expr::{ExprEvaluator, constant_name, is_truthy};

/// State of one open `#If` block.
#[derive(Debug)]
struct Frame {
    /// Index of the `#If` token, for unterminated-block errors.
    directive: usize,
    /// Whether code in the current branch is live.
    active: bool,
    /// Whether some branch of this block has already been taken.
    taken: bool,
    /// Whether the enclosing code is live.
    parent_active: bool,
    /// Whether `#Else` has been seen.
    seen_else: bool,
}

/// Evaluates conditional compilation directives over a token stream.
///
/// `declared` holds the predefined and project-level constants; it is only
/// read. `pass` tags every error with the pass being preprocessed.
///
/// Returns the same stream with directive lines and dead branches moved to
/// the inactive channel.
pub fn evaluate(
    mut stream: TokenStream,
    declared: &ConstantTable,
    pass: ParsePass,
) -> Result<TokenStream, PreprocessorError> {
    let inactive = Evaluator::new(&stream, declared, pass).run()?;
    for index in inactive {
        stream.set_channel(index, Channel::Inactive);
    }
    Ok(stream)
}

/// Walks a stream line by line and decides which tokens are excluded.
struct Evaluator<'a> {
    stream: &'a TokenStream,
    /// Module-local copy; `#Const` never leaks out of one evaluation.
    constants: ConstantTable,
    pass: ParsePass,
    stack: Vec<Frame>,
}

impl<'a> Evaluator<'a> {
    fn new(stream: &'a TokenStream, declared: &ConstantTable, pass: ParsePass) -> Self {
        Self {
            stream,
            constants: declared.clone(),
            pass,
            stack: Vec::new(),
        }
    }

    fn is_live(&self) -> bool {
        self.stack.last().is_none_or(|frame| frame.active)
    }

    /// Returns the indices of every token to exclude.
    fn run(mut self) -> Result<Vec<usize>, PreprocessorError> {
        let stream = self.stream;
        let mut inactive = Vec::new();

        for line in logical_lines(stream) {
            let tokens = &stream.tokens()[line.clone()];
            let first = tokens
                .iter()
                .find(|t| t.kind.default_channel() == Channel::Default);

            match first {
                Some(directive) if directive.kind.is_directive() => {
                    self.directive(directive, tokens)?;
                    inactive.extend(line);
                }
                _ if !self.is_live() => inactive.extend(line),
                _ => {}
            }
        }

        if let Some(frame) = self.stack.last() {
            let token = &stream.tokens()[frame.directive];
            return Err(self.error(token, PreprocessorErrorKind::UnterminatedIf));
        }

        Ok(inactive)
    }

    fn error(&self, token: &Token, kind: PreprocessorErrorKind) -> PreprocessorError {
        PreprocessorError::at(token, self.pass, kind)
    }

    /// Builds an evaluator over the tokens following the directive keyword.
    fn operands<'t>(&'t self, directive: &'t Token, line: &'t [Token]) -> ExprEvaluator<'t> {
        let tokens = line
            .iter()
            .skip_while(|t| t.index <= directive.index)
            .filter(|t| t.kind.default_channel() == Channel::Default && t.kind != TokenKind::Newline)
            .collect();
        ExprEvaluator::new(tokens, directive, &self.constants, self.pass)
    }

    /// Evaluates a condition followed by `Then`.
    fn condition(&self, directive: &Token, line: &[Token]) -> Result<bool, PreprocessorError> {
        let mut operands = self.operands(directive, line);
        let value = operands.evaluate()?;
        operands.expect(TokenKind::Then, "Then")?;
        operands.expect_end()?;
        is_truthy(&value).map_err(|kind| self.error(directive, kind))
    }

    fn directive(&mut self, directive: &Token, line: &[Token]) -> Result<(), PreprocessorError> {
        match directive.kind {
            TokenKind::HashConst => {
                if !self.is_live() {
                    return Ok(());
                }
                let (name, value) = {
                    let mut operands = self.operands(directive, line);
                    let name = match operands.peek() {
                        Some(token) if token.kind.is_name() => {
                            operands.advance();
                            constant_name(&token.text).to_string()
                        }
                        Some(token) => {
                            return Err(self.error(
                                token,
                                PreprocessorErrorKind::Unexpected {
                                    expected: "constant name".to_string(),
                                    found: format!("'{}'", token.text),
                                },
                            ));
                        }
                        None => {
                            return Err(self.error(
                                directive,
                                PreprocessorErrorKind::Unexpected {
                                    expected: "constant name".to_string(),
                                    found: "end of line".to_string(),
                                },
                            ));
                        }
                    };
                    operands.expect(TokenKind::Equals, "'='")?;
                    let value = operands.evaluate()?;
                    operands.expect_end()?;
                    (name, value)
                };
                self.constants.define(name, value);
            }

            TokenKind::HashIf => {
                let parent_active = self.is_live();
                let active = parent_active && self.condition(directive, line)?;
                self.stack.push(Frame {
                    directive: directive.index,
                    active,
                    // a dead parent means no branch may ever be taken
                    taken: active || !parent_active,
                    parent_active,
                    seen_else: false,
                });
            }

            TokenKind::HashElseIf => {
                let Some(frame) = self.stack.last() else {
                    return Err(self.unmatched(directive));
                };
                if frame.seen_else {
                    return Err(self.error(
                        directive,
                        PreprocessorErrorKind::AfterElse {
                            directive: "#ElseIf".to_string(),
                        },
                    ));
                }
                let active = !frame.taken && self.condition(directive, line)?;
                if let Some(frame) = self.stack.last_mut() {
                    frame.active = active;
                    frame.taken |= active;
                }
            }

            TokenKind::HashElse => {
                self.expect_bare(directive, line)?;
                let Some(frame) = self.stack.last_mut() else {
                    return Err(self.unmatched(directive));
                };
                if frame.seen_else {
                    return Err(self.error(
                        directive,
                        PreprocessorErrorKind::AfterElse {
                            directive: "#Else".to_string(),
                        },
                    ));
                }
                frame.active = frame.parent_active && !frame.taken;
                frame.taken = true;
                frame.seen_else = true;
            }

            TokenKind::HashEndIf => {
                self.expect_bare(directive, line)?;
                if self.stack.pop().is_none() {
                    return Err(self.unmatched(directive));
                }
            }

            _ => {}
        }
        Ok(())
    }

    /// Requires nothing but an optional comment after the directive keyword.
    fn expect_bare(&self, directive: &Token, line: &[Token]) -> Result<(), PreprocessorError> {
        self.operands(directive, line).expect_end()
    }

    fn unmatched(&self, directive: &Token) -> PreprocessorError {
        self.error(
            directive,
            PreprocessorErrorKind::Unmatched {
                directive: directive.kind.to_string(),
            },
        )
    }
}

/// Splits a stream into logical lines, each ending after its newline token.
///
/// Line continuations are hidden tokens, so a continued line stays one
/// logical line.
fn logical_lines(stream: &TokenStream) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for token in stream.iter() {
        if token.kind == TokenKind::Newline {
            lines.push(start..token.index + 1);
            start = token.index + 1;
        }
    }
    if start < stream.len() {
        lines.push(start..stream.len());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn run(source: &str) -> Result<TokenStream, PreprocessorError> {
        evaluate(tokenize(source), &ConstantTable::new(), ParsePass::CodePane)
    }

    fn live_text(stream: &TokenStream) -> String {
        stream
            .iter()
            .filter(|t| t.channel != Channel::Inactive)
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn test_true_branch_kept_and_directives_discarded() {
        let source = "Public Sub Foo()\n#If True Then\nDim x\n#End If\nEnd Sub";
        let stream = run(source).unwrap();
        assert_eq!(live_text(&stream), "Public Sub Foo()\nDim x\nEnd Sub");
        assert!(!stream.significant().any(|t| t.kind.is_directive()));
        assert_eq!(stream.text(), source);
    }

    #[test]
    fn test_else_branch() {
        let stream = run("#If False Then\na\n#Else\nb\n#End If\n").unwrap();
        assert_eq!(live_text(&stream), "b\n");
    }

    #[test]
    fn test_elseif_takes_first_true_branch() {
        let source = "#If 1 = 2 Then\na\n#ElseIf 2 = 2 Then\nb\n#ElseIf True Then\nc\n#Else\nd\n#End If\n";
        assert_eq!(live_text(&run(source).unwrap()), "b\n");
    }

    #[test]
    fn test_nested_blocks_under_dead_parent() {
        let source = "#If False Then\n#If True Then\na\n#Else\nb\n#End If\n#End If\nc\n";
        assert_eq!(live_text(&run(source).unwrap()), "c\n");
    }

    #[test]
    fn test_const_directive_defines_local_constant() {
        let source = "#Const DEBUGGING = 1\n#If DEBUGGING Then\na\n#Else\nb\n#End If\n";
        assert_eq!(live_text(&run(source).unwrap()), "a\n");
    }

    #[test]
    fn test_const_in_dead_branch_is_ignored() {
        let source = "#If False Then\n#Const X = 1\n#End If\n#If X Then\na\n#End If\n";
        assert_eq!(live_text(&run(source).unwrap()), "");
    }

    #[test]
    fn test_declared_constants_are_not_mutated() {
        let declared: ConstantTable = [("X", ConstValue::FALSE)].into_iter().collect();
        let source = "#Const X = True\n#If X Then\na\n#End If\n";
        let stream = evaluate(tokenize(source), &declared, ParsePass::CodePane).unwrap();
        assert_eq!(live_text(&stream), "a\n");
        assert_eq!(declared.get("X"), Some(&ConstValue::FALSE));
    }

    #[test]
    fn test_predefined_constants_drive_branches() {
        let declared = PredefinedConstants {
            version: VbaVersion::Vba7,
            win64: true,
            mac: false,
        }
        .table();
        let source = "#If VBA7 And Win64 Then\nDeclare PtrSafe Sub A Lib \"x\" ()\n#Else\nDeclare Sub A Lib \"x\" ()\n#End If\n";
        let stream = evaluate(tokenize(source), &declared, ParsePass::CodePane).unwrap();
        assert!(live_text(&stream).contains("PtrSafe"));
    }

    #[test]
    fn test_unterminated_if_reports_if_token() {
        let err = run("#If True Then\nDim x\n").unwrap_err();
        assert_eq!(err.kind, PreprocessorErrorKind::UnterminatedIf);
        assert_eq!(err.token, "#If");
        assert_eq!((err.line, err.column), (1, 1));
        assert_eq!(err.pass, ParsePass::CodePane);
    }

    #[test]
    fn test_unterminated_if_reports_attributes_pass() {
        let err = evaluate(tokenize("x\n  #If True Then\n"), &ConstantTable::new(), ParsePass::Attributes)
            .unwrap_err();
        assert_eq!(err.pass, ParsePass::Attributes);
        assert_eq!((err.line, err.column), (2, 3));
    }

    #[test]
    fn test_end_if_without_if() {
        let err = run("a\n#End If\n").unwrap_err();
        assert!(matches!(err.kind, PreprocessorErrorKind::Unmatched { .. }));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_duplicate_else() {
        let err = run("#If True Then\n#Else\n#Else\n#End If\n").unwrap_err();
        assert!(matches!(err.kind, PreprocessorErrorKind::AfterElse { .. }));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_missing_then() {
        let err = run("#If True\n#End If\n").unwrap_err();
        assert!(matches!(err.kind, PreprocessorErrorKind::Unexpected { .. }));
    }

    #[test]
    fn test_unknown_operator_in_condition() {
        let err = run("#If 1 ~ 2 Then\n#End If\n").unwrap_err();
        assert_eq!(err.kind, PreprocessorErrorKind::UnknownOperator("~".into()));
        assert_eq!((err.line, err.column), (1, 7));
    }

    #[test]
    fn test_directive_with_trailing_comment() {
        let stream = run("#If True Then ' always\na\n#End If ' done\n").unwrap();
        assert_eq!(live_text(&stream), "a\n");
    }

    #[test]
    fn test_code_without_directives_is_untouched() {
        let stream = run("Option Explicit\n").unwrap();
        assert!(stream.iter().all(|t| t.channel != Channel::Inactive));
    }
}
