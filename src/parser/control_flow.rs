//! Control flow statement parsing.
//!
//! This module handles parsing of block constructs:
//! - If/Then/ElseIf/Else/End If, and the single-line If
//! - Select Case/Case/Case Else/End Select
//! - For/Next and For Each/Next loops
//! - Do/Loop, While/Wend and With/End With
//!
//! Conditions and expressions are not modelled; each clause is kept as a
//! token range whose parentheses are checked for balance.

use crate::ast::{BlockKind, BlockSection, Clause, Statement, StatementKind};
use crate::lexer::{Token, TokenKind};

use super::error::Location;
use super::statements::statement;
use super::{ParseError, Parser};

impl<'a> Parser<'a> {
    // ==================== If Statement ====================

    /// Parses an If statement.
    pub(super) fn parse_if(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        let Some(keyword) = self.advance() else {
            return Err(());
        };

        self.parse_condition(TokenKind::Then)?;
        self.expect(TokenKind::Then, "Then")?;

        // Single-line If: everything up to the line break belongs to it
        if !self.at_line_end() {
            self.consume_balanced(|p| p.at_line_end())?;
            let extent = self.extent_from(start);
            let remark = self.finish_line()?;
            return Ok(statement(StatementKind::Simple, extent, remark));
        }

        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;
        let body = self.parse_body(|p| p.check_any(&[TokenKind::ElseIf, TokenKind::Else]))?;
        let mut sections = vec![BlockSection { header, body }];

        let mut seen_else = false;
        loop {
            let clause_start = self.current;
            match self.peek() {
                Some(token) if token.kind == TokenKind::ElseIf => {
                    if seen_else {
                        self.error(ParseError::syntax("ElseIf after Else", token));
                        return Err(());
                    }
                    self.advance();
                    self.parse_condition(TokenKind::Then)?;
                    self.expect(TokenKind::Then, "Then")?;
                    let mut header = self.extent_from(clause_start).clause();
                    header.remark = self.finish_line()?;
                    let body = self.parse_body(|p| p.check_any(&[TokenKind::ElseIf, TokenKind::Else]))?;
                    sections.push(BlockSection { header, body });
                }
                Some(token) if token.kind == TokenKind::Else => {
                    if seen_else {
                        self.error(ParseError::syntax("Else already seen in this If block", token));
                        return Err(());
                    }
                    seen_else = true;
                    self.advance();
                    let mut header = self.extent_from(clause_start).clause();
                    // `Else x = 1` keeps the statement in the Else body
                    if self.at_statement_end() {
                        header.remark = self.finish_line()?;
                    }
                    let body = self.parse_body(|p| p.check_any(&[TokenKind::ElseIf, TokenKind::Else]))?;
                    sections.push(BlockSection { header, body });
                }
                _ if self.check_end(TokenKind::If) => {
                    let end = self.parse_end_clause(2)?;
                    return Ok(self.block(BlockKind::If, start, sections, end));
                }
                _ => {
                    self.missing_end(keyword, "End If");
                    return Err(());
                }
            }
        }
    }

    // ==================== For Loops ====================

    /// Parses a For or For Each loop.
    ///
    /// `Next j, i` closes the innermost loop and the ones enclosing it; the
    /// enclosing loops share that line as their closing clause.
    pub(super) fn parse_for(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        let Some(keyword) = self.advance() else {
            return Err(());
        };
        let kind = if self.match_token(TokenKind::Each) {
            BlockKind::ForEach
        } else {
            BlockKind::For
        };

        let header_start = self.current;
        self.consume_balanced(|p| p.at_statement_end())?;
        if self.current == header_start {
            self.error_expected("loop variable");
            return Err(());
        }
        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;
        let body = self.parse_body(|p| p.check(TokenKind::Next))?;
        let sections = vec![BlockSection { header, body }];

        if self.pending_next > 0 {
            self.pending_next -= 1;
            let end = self.shared_next.clone().unwrap_or_default();
            if self.pending_next == 0 {
                self.shared_next = None;
            }
            let extent = self.extent_through(start, &end);
            return Ok(statement(
                StatementKind::Block { kind, sections, end },
                extent,
                None,
            ));
        }

        if !self.check(TokenKind::Next) {
            self.missing_end(keyword, "Next");
            return Err(());
        }

        let end_start = self.current;
        self.advance();
        let vars_start = self.current;
        self.consume_balanced(|p| p.at_statement_end())?;
        let closes = 1 + self.tokens[vars_start..self.current]
            .iter()
            .filter(|t| t.kind == TokenKind::Comma)
            .count();

        let mut end = self.extent_from(end_start).clause();
        let extent = self.extent_from(start);
        if closes > 1 {
            self.pending_next = closes - 1;
            self.shared_next = Some(end.clone());
        }
        end.remark = self.finish_line()?;

        Ok(statement(
            StatementKind::Block { kind, sections, end },
            extent,
            None,
        ))
    }

    // ==================== Select Case ====================

    /// Parses a Select Case block.
    pub(super) fn parse_select(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        let Some(keyword) = self.advance() else {
            return Err(());
        };
        self.expect(TokenKind::Case, "Case")?;
        self.parse_condition(TokenKind::Newline)?;
        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;

        // Only blank and remark lines may precede the first Case
        let mut leading = Vec::new();
        loop {
            self.skip_separators();
            if self.is_at_end() || self.check(TokenKind::Case) || self.is_closer() {
                break;
            }
            let line = self.parse_statement()?;
            if !line.is_empty() {
                let stream = self.stream;
                if let Some(token) = stream.get(line.tokens.start) {
                    self.error(ParseError::syntax("statements before the first Case", token));
                }
                return Err(());
            }
            leading.push(line);
        }
        let mut sections = vec![BlockSection {
            header,
            body: leading,
        }];

        while self.check(TokenKind::Case) {
            let clause_start = self.current;
            self.advance();
            if self.at_statement_end() {
                self.error_expected("Case expression or Else");
                return Err(());
            }
            self.parse_condition(TokenKind::Newline)?;
            let mut header = self.extent_from(clause_start).clause();
            header.remark = self.finish_line()?;
            let body = self.parse_body(|p| p.check(TokenKind::Case))?;
            sections.push(BlockSection { header, body });
        }

        if !self.check_end(TokenKind::Select) {
            self.missing_end(keyword, "End Select");
            return Err(());
        }
        let end = self.parse_end_clause(2)?;
        Ok(self.block(BlockKind::Select, start, sections, end))
    }

    // ==================== Do, While and With ====================

    /// Parses `Do ... Loop`, `While ... Wend` or `With ... End With`.
    pub(super) fn parse_block(&mut self) -> Result<Statement, ()> {
        let start = self.current;
        let Some(keyword) = self.advance() else {
            return Err(());
        };
        let (kind, closer) = match keyword.kind {
            TokenKind::Do => (BlockKind::Do, "Loop"),
            TokenKind::While => (BlockKind::While, "Wend"),
            _ => (BlockKind::With, "End With"),
        };

        // Do may stand alone; While and With need an operand
        if kind != BlockKind::Do && self.at_statement_end() {
            self.error_expected("expression");
            return Err(());
        }
        self.parse_condition(TokenKind::Newline)?;
        let mut header = self.extent_from(start).clause();
        header.remark = self.finish_line()?;
        let body = self.parse_body(|_| false)?;
        let sections = vec![BlockSection { header, body }];

        let end = match kind {
            BlockKind::Do if self.check(TokenKind::Loop) => {
                let end_start = self.current;
                self.advance();
                self.consume_balanced(|p| p.at_statement_end())?;
                let mut end = self.extent_from(end_start).clause();
                end.remark = self.finish_line()?;
                end
            }
            BlockKind::While if self.check(TokenKind::Wend) => self.parse_end_clause(1)?,
            BlockKind::With if self.check_end(TokenKind::With) => self.parse_end_clause(2)?,
            _ => {
                self.missing_end(keyword, closer);
                return Err(());
            }
        };

        let extent = self.extent_through(start, &end);
        Ok(statement(
            StatementKind::Block { kind, sections, end },
            extent,
            None,
        ))
    }

    // ==================== Helpers ====================

    /// Consumes a condition or expression up to `stop` or the end of the
    /// statement.
    fn parse_condition(&mut self, stop: TokenKind) -> Result<(), ()> {
        self.consume_balanced(|p| p.at_statement_end() || p.check(stop))
    }

    /// Consumes a closing line of `len` keywords and its remark.
    fn parse_end_clause(&mut self, len: usize) -> Result<Clause, ()> {
        let end_start = self.current;
        for _ in 0..len {
            self.advance();
        }
        let mut end = self.extent_from(end_start).clause();
        end.remark = self.finish_line()?;
        Ok(end)
    }

    /// Builds a block statement spanning from `start` through its closing clause.
    fn block(&self, kind: BlockKind, start: usize, sections: Vec<BlockSection>, end: Clause) -> Statement {
        let extent = self.extent_through(start, &end);
        statement(StatementKind::Block { kind, sections, end }, extent, None)
    }

    /// Records a block opened by `opener` that never reached `closer`.
    fn missing_end(&mut self, opener: &Token, closer: &str) {
        let opener_text = match opener.kind {
            TokenKind::Select => "Select Case".to_string(),
            _ => opener.text.clone(),
        };
        self.error(ParseError::MissingEnd {
            opener: opener_text,
            closer: closer.to_string(),
            at: Location::of(opener),
        });
    }
}
