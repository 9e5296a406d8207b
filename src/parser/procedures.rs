//! Procedure and type definition parsing.
//!
//! This module handles parsing of:
//! - Sub, Function and Property Get/Let/Set definitions
//! - Type (user-defined type) definitions
//! - Enum definitions
//! - Parameter lists

use crate::ast::{Clause, Member, MemberKind, Parameter, Statement, StatementKind, Visibility};
use crate::lexer::TokenKind;

use super::declarations::visibility;
use super::error::Location;
use super::statements::statement;
use super::{ParseError, Parser};

impl<'a> Parser<'a> {
    // ==================== Members ====================

    /// Parses a Sub, Function or Property from its signature to its `End` line.
    pub(super) fn parse_member(&mut self) -> Result<Member, ()> {
        let start = self.current;
        let vis = self.peek().and_then(|t| visibility(t.kind));
        if vis.is_some() {
            self.advance();
        }
        let mut is_static = self.match_token(TokenKind::Static);

        let Some(keyword) = self.advance() else {
            self.error_expected("Sub, Function or Property");
            return Err(());
        };
        let kind = match keyword.kind {
            TokenKind::Sub => MemberKind::Sub,
            TokenKind::Function => MemberKind::Function,
            TokenKind::Property => {
                if self.match_token(TokenKind::Get) {
                    MemberKind::PropertyGet
                } else if self.match_token(TokenKind::Let) {
                    MemberKind::PropertyLet
                } else if self.match_token(TokenKind::Set) {
                    MemberKind::PropertySet
                } else {
                    self.error_expected("Get, Let or Set");
                    return Err(());
                }
            }
            _ => {
                self.error(ParseError::unexpected("Sub, Function or Property", keyword));
                return Err(());
            }
        };

        let name = self.expect_name("procedure name")?.text.clone();
        let params = if self.match_token(TokenKind::LeftParen) {
            let params = self.parse_parameter_list()?;
            self.expect(TokenKind::RightParen, "')'")?;
            params
        } else {
            Vec::new()
        };
        let return_type = if self.match_token(TokenKind::As) {
            Some(self.parse_return_type()?)
        } else {
            None
        };
        is_static |= self.match_token(TokenKind::Static);

        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;

        let body = self.parse_body(|p| p.check_end(member_end_kind(kind)))?;

        if self.pending_next > 0 {
            self.pending_next = 0;
            self.shared_next = None;
            let at = self.end_location();
            self.error(ParseError::Syntax {
                message: "Next without For".to_string(),
                at,
            });
            return Err(());
        }

        let end_start = self.current;
        match self.peek() {
            Some(token) if token.kind == TokenKind::End => {
                self.advance();
                match self.advance() {
                    Some(closer) if closer.kind == member_end_kind(kind) => {}
                    Some(closer) => {
                        let expected = format!("End {}", kind.end_keyword());
                        self.error(ParseError::unexpected(&expected, closer));
                        return Err(());
                    }
                    None => {
                        self.error_expected(kind.end_keyword());
                        return Err(());
                    }
                }
            }
            Some(token) if self.is_closer() => {
                self.closer_error(token);
                return Err(());
            }
            Some(token) => {
                self.error(ParseError::unexpected("statement", token));
                return Err(());
            }
            None => {
                self.error(ParseError::MissingEnd {
                    opener: kind.to_string(),
                    closer: format!("End {}", kind.end_keyword()),
                    at: Location::of(keyword),
                });
                return Err(());
            }
        }

        let mut end = self.extent_from(end_start).clause();
        let extent = self.extent_from(start);
        end.remark = self.finish_line()?;

        Ok(Member {
            kind,
            name,
            visibility: vis,
            is_static,
            params,
            return_type,
            header,
            body,
            end,
            span: extent.span,
            tokens: extent.tokens,
            selection: extent.selection,
        })
    }

    /// Parses a parameter list after the opening parenthesis.
    pub(super) fn parse_parameter_list(&mut self) -> Result<Vec<Parameter>, ()> {
        let mut params = Vec::new();

        if self.check(TokenKind::RightParen) {
            return Ok(params);
        }

        loop {
            let optional = self.match_token(TokenKind::Optional);
            let by_val = if self.match_token(TokenKind::ByVal) {
                true
            } else {
                self.match_token(TokenKind::ByRef);
                false
            };
            let param_array = self.match_token(TokenKind::ParamArray);

            let name = self.expect_name("parameter name")?.text.clone();
            if self.match_token(TokenKind::LeftParen) {
                self.expect(TokenKind::RightParen, "')'")?;
            }
            let type_name = if self.match_token(TokenKind::As) {
                Some(self.parse_type_name()?)
            } else {
                None
            };
            if self.match_token(TokenKind::Equals) {
                self.consume_balanced(|p| {
                    p.at_statement_end() || p.check_any(&[TokenKind::Comma, TokenKind::RightParen])
                })?;
            }

            params.push(Parameter {
                name,
                type_name,
                optional,
                by_val,
                param_array,
            });

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    // ==================== Type and Enum ====================

    /// Parses `[vis] Type name ... End Type`.
    pub(super) fn parse_type(&mut self, vis: Option<Visibility>, start: usize) -> Result<Statement, ()> {
        let keyword = self.expect(TokenKind::Type, "Type")?;
        let name = self.expect_name("type name")?.text.clone();
        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;

        let fields = self.parse_definition_lines(TokenKind::Type, keyword, |p| {
            p.expect_name("field name")?;
            if p.check(TokenKind::LeftParen) {
                p.parse_parenthesized()?;
            }
            p.expect(TokenKind::As, "As")?;
            p.parse_type_name()?;
            Ok(())
        })?;

        let (end, extent) = self.parse_definition_end(start)?;
        let mut node = statement(
            StatementKind::TypeDef {
                visibility: vis,
                name,
                header,
                fields,
                end,
            },
            extent,
            None,
        );
        if let StatementKind::TypeDef { end, .. } = &mut node.kind {
            end.remark = self.finish_line()?;
        }
        Ok(node)
    }

    /// Parses `[vis] Enum name ... End Enum`.
    pub(super) fn parse_enum(&mut self, vis: Option<Visibility>, start: usize) -> Result<Statement, ()> {
        let keyword = self.expect(TokenKind::Enum, "Enum")?;
        let name = self.expect_name("enum name")?.text.clone();
        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;

        let members = self.parse_definition_lines(TokenKind::Enum, keyword, |p| {
            p.expect_name("enum member")?;
            if p.match_token(TokenKind::Equals) {
                let value_start = p.current;
                p.consume_balanced(|p| p.at_statement_end())?;
                if p.current == value_start {
                    p.error_expected("enum value");
                    return Err(());
                }
            }
            Ok(())
        })?;

        let (end, extent) = self.parse_definition_end(start)?;
        let mut node = statement(
            StatementKind::EnumDef {
                visibility: vis,
                name,
                header,
                members,
                end,
            },
            extent,
            None,
        );
        if let StatementKind::EnumDef { end, .. } = &mut node.kind {
            end.remark = self.finish_line()?;
        }
        Ok(node)
    }

    /// Parses field lines up to `End <closer>`. Remark-only lines are kept
    /// as empty statements.
    fn parse_definition_lines(
        &mut self,
        closer: TokenKind,
        opener: &'a crate::lexer::Token,
        mut line: impl FnMut(&mut Self) -> Result<(), ()>,
    ) -> Result<Vec<Statement>, ()> {
        let mut lines = Vec::new();
        loop {
            self.skip_separators();
            let Some(token) = self.peek() else {
                self.error(ParseError::MissingEnd {
                    opener: opener.text.clone(),
                    closer: format!("End {}", opener.text),
                    at: Location::of(opener),
                });
                return Err(());
            };
            if self.check_end(closer) {
                return Ok(lines);
            }
            if token.kind.is_comment() {
                lines.push(self.parse_remark_line()?);
                continue;
            }

            let start = self.current;
            line(self)?;
            let extent = self.extent_from(start);
            let remark = self.finish_line()?;
            lines.push(statement(
                StatementKind::Field {
                    name: token.text.clone(),
                },
                extent,
                remark,
            ));
        }
    }

    /// Consumes `End Type|Enum`. Returns the closing clause, without its
    /// remark, and the extent of the whole definition.
    fn parse_definition_end(&mut self, start: usize) -> Result<(Clause, super::tokens::Extent), ()> {
        let end_start = self.current;
        self.expect(TokenKind::End, "End")?;
        self.advance();
        let end = self.extent_from(end_start).clause();
        Ok((end, self.extent_from(start)))
    }
}

/// The keyword that follows `End` for a member kind.
fn member_end_kind(kind: MemberKind) -> TokenKind {
    match kind {
        MemberKind::Sub => TokenKind::Sub,
        MemberKind::Function => TokenKind::Function,
        MemberKind::PropertyGet | MemberKind::PropertyLet | MemberKind::PropertySet => TokenKind::Property,
    }
}
