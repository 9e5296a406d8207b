//! Declarations section parsing.
//!
//! This module handles:
//! - The `VERSION ... BEGIN ... END` class header of exported classes and forms
//! - Module-level statement dispatch
//! - Option, variable, constant, Declare, Event and Implements statements
//! - Type names in `As` clauses

use crate::ast::{ClassHeader, MemberKind, Statement, StatementKind, VariableDeclaration, Visibility};
use crate::lexer::TokenKind;
use crate::pass::ParsePass;

use super::error::Location;
use super::statements::statement;
use super::{ParseError, Parser};

impl<'a> Parser<'a> {
    // ==================== Class Header ====================

    /// Parses the class header if the module starts with one.
    ///
    /// The header is only legal in the exported text; in the code pane it is
    /// recorded as a wrong-pass error and skipped.
    pub(super) fn parse_header(&mut self) -> Option<ClassHeader> {
        let is_header = self.check_word("VERSION")
            && self
                .peek_ahead(1)
                .is_some_and(|t| matches!(t.kind, TokenKind::FloatLiteral | TokenKind::IntegerLiteral));
        if !is_header {
            return None;
        }

        if self.pass == ParsePass::CodePane
            && let Some(keyword) = self.peek()
        {
            self.error(ParseError::WrongPass {
                construct: "class header".to_string(),
                at: Location::of(keyword),
            });
        }

        match self.parse_class_header() {
            Ok(header) => Some(header),
            Err(()) => {
                self.synchronize();
                None
            }
        }
    }

    fn parse_class_header(&mut self) -> Result<ClassHeader, ()> {
        let start = self.current;
        self.advance(); // VERSION
        let version = self
            .advance()
            .map(|t| t.text.clone())
            .unwrap_or_default();
        self.skip_line(); // CLASS
        let mut end = self.current;

        let mut properties = Vec::new();
        loop {
            self.skip_separators();
            if self.check_word("Object") {
                // form control libraries
                self.skip_line();
                end = self.current;
            } else if self.check_word("Begin") {
                end = self.parse_header_begin(&mut properties)?;
                break;
            } else {
                break;
            }
        }

        let extent = self.extent_between(start, end);
        Ok(ClassHeader {
            version,
            properties,
            span: extent.span,
            tokens: extent.tokens,
            selection: extent.selection,
        })
    }

    /// Parses a `BEGIN ... END` section, nested ones included. Returns the
    /// parser position just past the closing `END`.
    fn parse_header_begin(&mut self, properties: &mut Vec<(String, String)>) -> Result<usize, ()> {
        let Some(begin) = self.advance() else {
            return Err(());
        };
        self.skip_line();

        let mut depth = 1usize;
        let mut end = self.current;
        while depth > 0 {
            self.skip_separators();
            let Some(token) = self.peek() else {
                self.error(ParseError::MissingEnd {
                    opener: "BEGIN".to_string(),
                    closer: "END".to_string(),
                    at: Location::of(begin),
                });
                return Err(());
            };

            if self.check_word("Begin") || self.check_word("BeginProperty") {
                depth += 1;
            } else if self.check(TokenKind::End) || self.check_word("EndProperty") {
                depth -= 1;
                self.advance();
                end = self.current;
            } else if depth == 1
                && token.kind.is_name()
                && self.peek_ahead(1).is_some_and(|t| t.kind == TokenKind::Equals)
            {
                self.advance();
                self.advance();
                let value_start = self.current;
                while !self.at_line_end() {
                    self.advance();
                }
                properties.push((token.text.clone(), self.text_from(value_start).trim().to_string()));
            }
            self.skip_line();
        }
        Ok(end)
    }

    // ==================== Module-Level Dispatch ====================

    /// Returns true if the current line starts a Sub, Function or Property.
    pub(super) fn check_member_start(&self) -> bool {
        let mut n = 0;
        if self.peek_ahead(n).is_some_and(|t| visibility(t.kind).is_some()) {
            n += 1;
        }
        if self.peek_ahead(n).is_some_and(|t| t.kind == TokenKind::Static) {
            n += 1;
        }
        self.peek_ahead(n).is_some_and(|t| {
            matches!(
                t.kind,
                TokenKind::Sub | TokenKind::Function | TokenKind::Property
            )
        })
    }

    /// Parses a declarations-section statement.
    pub(super) fn parse_module_statement(&mut self) -> Result<Statement, ()> {
        let Some(token) = self.peek() else {
            self.error_expected("declaration");
            return Err(());
        };
        let start = self.current;

        match token.kind {
            kind if kind.is_comment() => self.parse_remark_line(),
            TokenKind::Identifier if self.check_attribute() => self.parse_attribute(),
            TokenKind::Option => self.parse_option(),
            kind => {
                let vis = visibility(kind);
                if vis.is_some() {
                    self.advance();
                }
                self.parse_declaration(vis, start)
            }
        }
    }

    /// Parses a declaration after its optional visibility keyword.
    ///
    /// `start` is the position of the first token of the statement.
    pub(super) fn parse_declaration(
        &mut self,
        vis: Option<Visibility>,
        start: usize,
    ) -> Result<Statement, ()> {
        let Some(token) = self.peek() else {
            self.error_expected("declaration");
            return Err(());
        };

        match token.kind {
            TokenKind::Const => self.parse_constant(vis, start),
            TokenKind::Declare => self.parse_declare(vis, start),
            TokenKind::Event => self.parse_event(vis, start),
            TokenKind::Type => self.parse_type(vis, start),
            TokenKind::Enum => self.parse_enum(vis, start),
            TokenKind::Implements if vis.is_none() => self.parse_implements(start),
            TokenKind::Dim | TokenKind::Static => self.parse_variables(vis, start),
            TokenKind::WithEvents => self.parse_variables(vis, start),
            TokenKind::Identifier if vis.is_none() && self.check_def_type() => self.parse_def_type(start),
            kind if kind.is_name() && vis.is_some() => self.parse_variables(vis, start),
            _ if vis.is_some() => {
                self.error_expected("declaration");
                Err(())
            }
            _ if self.is_closer() => {
                self.closer_error(token);
                Err(())
            }
            _ => {
                self.error(ParseError::syntax("invalid outside procedure", token));
                Err(())
            }
        }
    }

    // ==================== Option ====================

    /// Parses `Option Explicit|Base n|Compare mode|Private Module`.
    fn parse_option(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        self.advance(); // Option
        let setting_start = self.current;

        if self.check_word("Explicit") {
            self.advance();
        } else if self.check_word("Base") {
            self.advance();
            self.expect(TokenKind::IntegerLiteral, "0 or 1")?;
        } else if self.check_word("Compare") {
            self.advance();
            self.expect_name("Binary, Text or Database")?;
        } else if self.match_token(TokenKind::Private) && self.check_word("Module") {
            self.advance();
        } else {
            self.error_expected("Explicit, Base, Compare or Private Module");
            return Err(());
        }

        let setting = self.text_from(setting_start);
        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(StatementKind::Option { setting }, extent, remark))
    }

    // ==================== Variables and Constants ====================

    /// Parses `[vis] Dim|Static [WithEvents] name[(...)] [As type] {, ...}`.
    fn parse_variables(&mut self, vis: Option<Visibility>, start: usize) -> Result<Statement, ()> {
        let is_static = self.check(TokenKind::Static);
        if self.check_any(&[TokenKind::Dim, TokenKind::Static]) {
            self.advance();
        }

        let mut declarations = Vec::new();
        loop {
            let with_events = self.match_token(TokenKind::WithEvents);
            let name = self.expect_name("variable name")?.text.clone();
            let is_array = self.check(TokenKind::LeftParen);
            if is_array {
                self.parse_parenthesized()?;
            }
            let type_name = if self.match_token(TokenKind::As) {
                Some(self.parse_type_name()?)
            } else {
                None
            };
            declarations.push(VariableDeclaration {
                name,
                type_name,
                is_array,
                with_events,
            });
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(
            StatementKind::Variable {
                visibility: vis,
                is_static,
                declarations,
            },
            extent,
            remark,
        ))
    }

    /// Parses `[vis] Const name [As type] = value {, ...}`.
    fn parse_constant(&mut self, vis: Option<Visibility>, start: usize) -> Result<Statement, ()> {
        self.expect(TokenKind::Const, "Const")?;

        let mut names = Vec::new();
        loop {
            names.push(self.expect_name("constant name")?.text.clone());
            if self.match_token(TokenKind::As) {
                self.parse_type_name()?;
            }
            self.expect(TokenKind::Equals, "'='")?;
            let value_start = self.current;
            self.consume_balanced(|p| p.at_statement_end() || p.check(TokenKind::Comma))?;
            if self.current == value_start {
                self.error_expected("constant value");
                return Err(());
            }
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(
            StatementKind::Constant {
                visibility: vis,
                names,
            },
            extent,
            remark,
        ))
    }

    // ==================== External Declarations ====================

    /// Parses `[vis] Declare [PtrSafe] Sub|Function name Lib "lib" [Alias "x"] [(...)] [As type]`.
    fn parse_declare(&mut self, vis: Option<Visibility>, start: usize) -> Result<Statement, ()> {
        self.expect(TokenKind::Declare, "Declare")?;
        self.match_token(TokenKind::PtrSafe);
        let kind = if self.match_token(TokenKind::Sub) {
            MemberKind::Sub
        } else {
            self.expect(TokenKind::Function, "Sub or Function")?;
            MemberKind::Function
        };
        let name = self.expect_name("procedure name")?.text.clone();
        self.expect(TokenKind::Lib, "Lib")?;
        let library = self.expect(TokenKind::StringLiteral, "library name")?;
        let library = library.text.trim_matches('"').to_string();
        if self.match_token(TokenKind::Alias) {
            self.expect(TokenKind::StringLiteral, "alias")?;
        }
        if self.match_token(TokenKind::LeftParen) {
            self.parse_parameter_list()?;
            self.expect(TokenKind::RightParen, "')'")?;
        }
        if self.match_token(TokenKind::As) {
            self.parse_return_type()?;
        }

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(
            StatementKind::Declare {
                visibility: vis,
                kind,
                name,
                library,
            },
            extent,
            remark,
        ))
    }

    /// Parses `[vis] Event name [(...)]`.
    fn parse_event(&mut self, vis: Option<Visibility>, start: usize) -> Result<Statement, ()> {
        self.expect(TokenKind::Event, "Event")?;
        let name = self.expect_name("event name")?.text.clone();
        let params = if self.match_token(TokenKind::LeftParen) {
            let params = self.parse_parameter_list()?;
            self.expect(TokenKind::RightParen, "')'")?;
            params
        } else {
            Vec::new()
        };

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(
            StatementKind::Event {
                visibility: vis,
                name,
                params,
            },
            extent,
            remark,
        ))
    }

    /// Parses `Implements Interface`.
    fn parse_implements(&mut self, start: usize) -> Result<Statement, ()> {
        self.expect(TokenKind::Implements, "Implements")?;
        let name_start = self.current;
        self.expect_name("interface name")?;
        while self.match_token(TokenKind::Dot) {
            self.expect_name("interface name")?;
        }
        let interface = self.text_from(name_start);

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(StatementKind::Implements { interface }, extent, remark))
    }

    // ==================== Def-type ====================

    fn check_def_type(&self) -> bool {
        self.peek().is_some_and(|t| {
            t.kind == TokenKind::Identifier && DEF_TYPES.iter().any(|d| t.text.eq_ignore_ascii_case(d))
        })
    }

    /// Parses `DefType letter[-letter] {, letter[-letter]}`.
    fn parse_def_type(&mut self, start: usize) -> Result<Statement, ()> {
        let Some(keyword) = self.advance() else {
            self.error_expected("Def-type statement");
            return Err(());
        };
        let type_name = keyword.text["Def".len()..].to_string();

        let mut ranges = Vec::new();
        loop {
            let range_start = self.current;
            self.expect_letter()?;
            if self.match_token(TokenKind::Minus) {
                self.expect_letter()?;
            }
            ranges.push(self.text_from(range_start));
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let extent = self.extent_from(start);
        let remark = self.finish_line()?;
        Ok(statement(StatementKind::DefType { type_name, ranges }, extent, remark))
    }

    fn expect_letter(&mut self) -> Result<(), ()> {
        let is_letter = self.peek().is_some_and(|t| {
            t.kind == TokenKind::Identifier && t.text.len() == 1 && t.text.chars().all(|c| c.is_ascii_alphabetic())
        });
        if is_letter {
            self.advance();
            Ok(())
        } else {
            self.error_expected("letter");
            Err(())
        }
    }

    // ==================== Helpers ====================

    /// Parses a type name after `As`: `[New] name{.name} [* length]`.
    ///
    /// Returns the name as written, without `New`.
    pub(super) fn parse_type_name(&mut self) -> Result<String, ()> {
        self.match_token(TokenKind::New);
        let start = self.current;
        self.expect_name("type name")?;
        while self.match_token(TokenKind::Dot) {
            self.expect_name("type name")?;
        }
        if self.match_token(TokenKind::Star) {
            match self.peek() {
                Some(t) if t.kind == TokenKind::IntegerLiteral || t.kind.is_name() => {
                    self.advance();
                }
                _ => {
                    self.error_expected("string length");
                    return Err(());
                }
            }
        }
        Ok(self.text_from(start))
    }

    /// Parses the type after `As` on a function or property, allowing the
    /// `()` of an array return type.
    pub(super) fn parse_return_type(&mut self) -> Result<String, ()> {
        let mut type_name = self.parse_type_name()?;
        if self.check(TokenKind::LeftParen) && self.peek_ahead(1).is_some_and(|t| t.kind == TokenKind::RightParen) {
            self.advance();
            self.advance();
            type_name.push_str("()");
        }
        Ok(type_name)
    }

    /// Consumes a parenthesized group, nested groups included.
    pub(super) fn parse_parenthesized(&mut self) -> Result<(), ()> {
        let Some(open) = self.peek() else {
            return Err(());
        };
        self.expect(TokenKind::LeftParen, "'('")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek_kind() {
                None | Some(TokenKind::Newline) => {
                    self.error(ParseError::UnbalancedParens {
                        at: Location::of(open),
                    });
                    return Err(());
                }
                Some(TokenKind::LeftParen) => depth += 1,
                Some(TokenKind::RightParen) => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }
}

/// Keywords of the Def-type statements.
const DEF_TYPES: &[&str] = &[
    "DefBool", "DefByte", "DefInt", "DefLng", "DefLngLng", "DefLngPtr", "DefCur", "DefSng", "DefDbl", "DefDate",
    "DefStr", "DefObj", "DefVar",
];

/// Maps a visibility keyword to its [`Visibility`].
pub(super) fn visibility(kind: TokenKind) -> Option<Visibility> {
    match kind {
        TokenKind::Public => Some(Visibility::Public),
        TokenKind::Private => Some(Visibility::Private),
        TokenKind::Friend => Some(Visibility::Friend),
        TokenKind::Global => Some(Visibility::Global),
        _ => None,
    }
}
