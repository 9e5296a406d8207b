//! Statement parsing for the parser.
//!
//! This module contains the statement dispatcher for procedure bodies, the
//! end-of-statement rule, and parsing for simple and `Attribute`
//! statements. Blocks, declarations and members are handled in their
//! respective modules.

use crate::ast::{AttributeStatement, Remark, Statement, StatementKind};
use crate::lexer::{Token, TokenKind};

use super::error::Location;
use super::tokens::Extent;
use super::{ParseError, Parser};

/// Builds a statement node.
pub(super) fn statement(kind: StatementKind, extent: Extent, remark: Option<Remark>) -> Statement {
    Statement {
        kind,
        span: extent.span,
        tokens: extent.tokens,
        selection: extent.selection,
        remark,
    }
}

impl<'a> Parser<'a> {
    // ==================== Statement Dispatcher ====================

    /// Parses a single statement inside a procedure body.
    pub(super) fn parse_statement(&mut self) -> Result<Statement, ()> {
        let Some(token) = self.peek() else {
            self.error_expected("statement");
            return Err(());
        };

        match token.kind {
            kind if kind.is_comment() => self.parse_remark_line(),
            TokenKind::Identifier if self.check_attribute() => self.parse_attribute(),

            // Blocks (delegated to control_flow.rs)
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Do | TokenKind::While | TokenKind::With => self.parse_block(),

            // Local declarations (delegated to declarations.rs)
            TokenKind::Dim | TokenKind::Static | TokenKind::Const => {
                let start = self.current;
                self.parse_declaration(None, start)
            }

            TokenKind::Sub
            | TokenKind::Function
            | TokenKind::Property
            | TokenKind::Declare
            | TokenKind::Implements
            | TokenKind::Event
            | TokenKind::Type
            | TokenKind::Enum
            | TokenKind::Option
            | TokenKind::Public
            | TokenKind::Private
            | TokenKind::Friend
            | TokenKind::Global => {
                self.error(ParseError::syntax(
                    format!("'{}' is not valid inside a procedure", token.text),
                    token,
                ));
                Err(())
            }

            _ if self.is_closer() => {
                self.closer_error(token);
                Err(())
            }

            _ => self.parse_simple(),
        }
    }

    /// Parses statements until `terminator` holds, a closing keyword of any
    /// block appears, or input ends.
    pub(super) fn parse_body(&mut self, terminator: impl Fn(&Self) -> bool) -> Result<Vec<Statement>, ()> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.is_at_end() || self.pending_next > 0 || terminator(self) || self.is_closer() {
                break;
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    /// Returns true at a keyword that closes or continues a block or member.
    pub(super) fn is_closer(&self) -> bool {
        if self.check_any(&[
            TokenKind::ElseIf,
            TokenKind::Else,
            TokenKind::Case,
            TokenKind::Loop,
            TokenKind::Next,
            TokenKind::Wend,
        ]) {
            return true;
        }
        self.check(TokenKind::End)
            && self.peek_ahead(1).is_some_and(|t| {
                matches!(
                    t.kind,
                    TokenKind::If
                        | TokenKind::Select
                        | TokenKind::With
                        | TokenKind::Sub
                        | TokenKind::Function
                        | TokenKind::Property
                        | TokenKind::Type
                        | TokenKind::Enum
                )
            })
    }

    /// Records the error for a closing keyword with no matching opener.
    pub(super) fn closer_error(&mut self, token: &Token) {
        let message = match token.kind {
            TokenKind::ElseIf => "ElseIf without If".to_string(),
            TokenKind::Else => "Else without If".to_string(),
            TokenKind::Case => "Case without Select Case".to_string(),
            TokenKind::Loop => "Loop without Do".to_string(),
            TokenKind::Next => "Next without For".to_string(),
            TokenKind::Wend => "Wend without While".to_string(),
            _ => match self.peek_ahead(1) {
                Some(next) => format!("End {} without {}", next.text, next.text),
                None => "unexpected End".to_string(),
            },
        };
        self.error(ParseError::syntax(message, token));
    }

    // ==================== End of Statement ====================

    /// Consumes an optional remark and the statement separator after it.
    ///
    /// A statement ends at a newline, a `:` or end of input.
    pub(super) fn finish_line(&mut self) -> Result<Option<Remark>, ()> {
        let remark = match self.peek() {
            Some(token) if token.kind.is_comment() => {
                self.advance();
                Some(self.remark(token))
            }
            _ => None,
        };

        match self.peek_kind() {
            None => {}
            Some(TokenKind::Newline) | Some(TokenKind::Colon) => {
                self.advance();
            }
            Some(_) => {
                self.error_expected("end of statement");
                return Err(());
            }
        }
        Ok(remark)
    }

    /// Parses a line holding only a remark.
    pub(super) fn parse_remark_line(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(StatementKind::Empty, extent, remark))
    }

    /// Consumes tokens until `stop` holds, checking that parentheses balance
    /// and that every token was recognized by the lexer.
    pub(super) fn consume_balanced(&mut self, stop: impl Fn(&Self) -> bool) -> Result<(), ()> {
        let mut open: Vec<&'a Token> = Vec::new();

        while !self.is_at_end() && !stop(self) {
            let Some(token) = self.advance() else { break };
            match token.kind {
                TokenKind::LeftParen => open.push(token),
                TokenKind::RightParen => {
                    if open.pop().is_none() {
                        self.error(ParseError::UnbalancedParens {
                            at: Location::of(token),
                        });
                        return Err(());
                    }
                }
                TokenKind::Unknown => {
                    self.error(ParseError::syntax("unrecognized character", token));
                    return Err(());
                }
                TokenKind::UnterminatedString => {
                    self.error(ParseError::syntax("unterminated string literal", token));
                    return Err(());
                }
                _ => {}
            }
        }

        if let Some(token) = open.first() {
            self.error(ParseError::UnbalancedParens {
                at: Location::of(token),
            });
            return Err(());
        }
        Ok(())
    }

    // ==================== Simple Statements ====================

    /// Parses any other statement up to the end of statement.
    pub(super) fn parse_simple(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        self.consume_balanced(|p| p.at_statement_end())?;
        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(StatementKind::Simple, extent, remark))
    }

    // ==================== Attribute Statement ====================

    /// Checks for `Attribute name =` or `Attribute name.name`.
    pub(super) fn check_attribute(&self) -> bool {
        self.check_word("Attribute")
            && self.peek_ahead(1).is_some_and(|t| t.kind.is_name())
            && self
                .peek_ahead(2)
                .is_some_and(|t| matches!(t.kind, TokenKind::Equals | TokenKind::Dot))
    }

    /// Parses `Attribute [target.]Name = value {, value}`.
    pub(super) fn parse_attribute(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        let Some(keyword) = self.advance() else {
            return Err(());
        };
        if self.pass == crate::pass::ParsePass::CodePane {
            self.error(ParseError::WrongPass {
                construct: "Attribute statement".to_string(),
                at: Location::of(keyword),
            });
            return Err(());
        }

        let first = self.expect_name("attribute name")?;
        let (target, name) = if self.match_token(TokenKind::Dot) {
            let name = self.expect_name("attribute name")?;
            (Some(first.text.clone()), name.text.clone())
        } else {
            (None, first.text.clone())
        };
        self.expect(TokenKind::Equals, "'='")?;

        let mut values = Vec::new();
        loop {
            let value_start = self.current;
            self.consume_balanced(|p| p.at_statement_end() || p.check(TokenKind::Comma))?;
            if self.current == value_start {
                self.error_expected("attribute value");
                return Err(());
            }
            values.push(self.text_from(value_start));
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(
            StatementKind::Attribute(AttributeStatement {
                target,
                name,
                values,
            }),
            extent,
            remark,
        ))
    }
}
