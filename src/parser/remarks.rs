//! Remark parsing.
//!
//! Comments are single tokens from the lexer. A `'` comment whose body
//! starts with `@` is re-lexed and read as an annotation list:
//!
//! ```text
//! '@Name                      bare annotation
//! '@Name("a", 2)              parenthesized arguments
//! '@Name a, b                 bare arguments
//! '@One @Two : free text      several annotations, trailing text
//! ```
//!
//! If the body does not follow that grammar the remark stays an ordinary
//! comment; a malformed annotation is never a syntax error.

use crate::ast::{AnnotationNode, Remark, RemarkKind};
use crate::lexer::{Token, TokenKind, lex};
use crate::module::Selection;

use super::Parser;

impl<'a> Parser<'a> {
    /// Builds the remark node for a comment token.
    pub(super) fn remark(&self, token: &Token) -> Remark {
        let selection = Selection::new(
            token.line,
            token.column,
            token.end_line(),
            token.end_column(),
        );

        if token.kind == TokenKind::RemComment {
            let body = &token.text[3.min(token.text.len())..];
            let body = body.strip_prefix([' ', '\t']).unwrap_or(body);
            return Remark {
                kind: RemarkKind::Rem,
                text: body.to_string(),
                token: token.index,
                selection,
            };
        }

        let body = token.text.strip_prefix('\'').unwrap_or(&token.text);
        let kind = parse_annotation_list(body, token.line, token.column + 1)
            .map(RemarkKind::Annotations)
            .unwrap_or(RemarkKind::Comment);
        Remark {
            kind,
            text: body.to_string(),
            token: token.index,
            selection,
        }
    }
}

/// Parses a comment body as an annotation list.
///
/// `line` and `column` locate the first character of `body`. Returns `None`
/// when the body is not an annotation list.
pub(super) fn parse_annotation_list(body: &str, line: usize, column: usize) -> Option<Vec<AnnotationNode>> {
    if !body.starts_with('@') {
        return None;
    }
    let tokens = lex(body);
    let mut cursor = Cursor {
        tokens: &tokens,
        current: 0,
        line,
        column,
    };

    let mut annotations = Vec::new();
    loop {
        annotations.push(cursor.annotation()?);
        cursor.skip_whitespace();
        match cursor.peek_kind() {
            Some(TokenKind::At) => continue,
            Some(TokenKind::Colon) | Some(TokenKind::Comment) | None => break,
            Some(_) => return None,
        }
    }
    Some(annotations)
}

/// Walks the tokens of one comment body, whitespace included.
struct Cursor<'t> {
    tokens: &'t [Token],
    current: usize,
    /// Line of the comment.
    line: usize,
    /// Absolute column of the body's first character.
    column: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.current)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.peek();
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn skip_whitespace(&mut self) {
        while self.peek_kind() == Some(TokenKind::Whitespace) {
            self.current += 1;
        }
    }

    /// Kind of the next non-whitespace token.
    fn peek_significant(&self) -> Option<TokenKind> {
        self.tokens[self.current..]
            .iter()
            .find(|t| t.kind != TokenKind::Whitespace)
            .map(|t| t.kind)
    }

    /// `@Name [args]`
    fn annotation(&mut self) -> Option<AnnotationNode> {
        let at = self.advance().filter(|t| t.kind == TokenKind::At)?;
        let name = self.advance().filter(|t| t.kind == TokenKind::Identifier)?;
        let mut last = name;

        let args = match self.peek_kind() {
            Some(TokenKind::LeftParen) => {
                self.advance();
                let (args, close) = self.parenthesized_args()?;
                last = close;
                args
            }
            Some(TokenKind::Whitespace)
                if !matches!(
                    self.peek_significant(),
                    None | Some(TokenKind::At) | Some(TokenKind::Colon) | Some(TokenKind::Comment)
                ) =>
            {
                self.skip_whitespace();
                let (args, end) = self.bare_args()?;
                last = end;
                args
            }
            _ => Vec::new(),
        };

        Some(AnnotationNode {
            name: name.text.clone(),
            args,
            selection: Selection::new(
                self.line,
                self.column + at.column - 1,
                self.line,
                self.column + last.end_column() - 1,
            ),
        })
    }

    /// Arguments up to the closing parenthesis, which is consumed and returned.
    fn parenthesized_args(&mut self) -> Option<(Vec<String>, &'t Token)> {
        let mut args = Vec::new();
        let mut arg: Vec<&'t Token> = Vec::new();
        let mut depth = 0usize;

        loop {
            let token = self.advance()?;
            match token.kind {
                TokenKind::RightParen if depth == 0 => {
                    if !arg.is_empty() || !args.is_empty() {
                        args.push(argument_value(&arg)?);
                    }
                    return Some((args, token));
                }
                TokenKind::Comma if depth == 0 => {
                    args.push(argument_value(&arg)?);
                    arg.clear();
                }
                TokenKind::Newline | TokenKind::Comment => return None,
                kind => {
                    if kind == TokenKind::LeftParen {
                        depth += 1;
                    } else if kind == TokenKind::RightParen {
                        depth -= 1;
                    }
                    arg.push(token);
                }
            }
        }
    }

    /// Comma-separated arguments up to the next `@`, `:`, comment or end.
    fn bare_args(&mut self) -> Option<(Vec<String>, &'t Token)> {
        let mut args = Vec::new();
        let mut arg: Vec<&'t Token> = Vec::new();
        let mut last = None;

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::At | TokenKind::Colon | TokenKind::Comment => break,
                TokenKind::Comma => {
                    args.push(argument_value(&arg)?);
                    arg.clear();
                }
                TokenKind::Whitespace => {}
                _ => last = Some(token),
            }
            if token.kind != TokenKind::Comma {
                arg.push(token);
            }
            self.advance();
        }
        args.push(argument_value(&arg)?);
        Some((args, last?))
    }
}

/// The value of one argument: a string literal unquoted, anything else as
/// written. Empty arguments are rejected.
fn argument_value(tokens: &[&Token]) -> Option<String> {
    let significant: Vec<&Token> = tokens
        .iter()
        .copied()
        .filter(|t| t.kind != TokenKind::Whitespace)
        .collect();
    match significant.as_slice() {
        [] => None,
        [single] if single.kind == TokenKind::StringLiteral => {
            let inner = &single.text[1..single.text.len() - 1];
            Some(inner.replace("\"\"", "\""))
        }
        _ => {
            let text: String = tokens.iter().map(|t| t.text.as_str()).collect();
            Some(text.trim().to_string())
        }
    }
}
