//! Conditional compilation expression evaluation.
//!
//! Directive conditions are evaluated straight from the directive line's
//! tokens with precedence climbing; no expression tree is built.
//!
//! # Precedence Levels (lowest to highest)
//!
//! 1. IMP
//! 2. EQV
//! 3. XOR
//! 4. OR
//! 5. AND
//! 6. NOT (prefix)
//! 7. Comparison (=, <>, <, >, <=, >=)
//! 8. & (concatenation)
//! 9. +, -
//! 10. MOD
//! 11. \ (integer division)
//! 12. *, /
//! 13. - (negation)
//! 14. ^

use crate::lexer::{Token, TokenKind};
use crate::pass::ParsePass;

use super::constants::{ConstValue, ConstantTable};
use super::error::{PreprocessorError, PreprocessorErrorKind};

const NOT_PRECEDENCE: u8 = 6;
const NEGATE_PRECEDENCE: u8 = 13;

/// Evaluates the expression part of one directive line.
pub(super) struct ExprEvaluator<'a> {
    /// Significant tokens following the directive keyword, without the newline.
    tokens: Vec<&'a Token>,
    /// Current position in `tokens`.
    current: usize,
    constants: &'a ConstantTable,
    /// The directive keyword, used to locate errors at end of line.
    directive: &'a Token,
    pass: ParsePass,
}

/// A numeric operand after coercion.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::Float(v) => v.round() as i64,
        }
    }
}

impl<'a> ExprEvaluator<'a> {
    pub(super) fn new(
        tokens: Vec<&'a Token>,
        directive: &'a Token,
        constants: &'a ConstantTable,
        pass: ParsePass,
    ) -> Self {
        Self {
            tokens,
            current: 0,
            constants,
            directive,
            pass,
        }
    }

    // ==================== Token Navigation ====================

    pub(super) fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.current).copied()
    }

    pub(super) fn advance(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    /// Builds an error located at the current token, or at the directive
    /// keyword when the line is exhausted.
    fn error_here(&self, kind: PreprocessorErrorKind) -> PreprocessorError {
        PreprocessorError::at(self.peek().unwrap_or(self.directive), self.pass, kind)
    }

    /// Describes the current token for "expected X, found Y" messages.
    fn found(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token.text),
            None => "end of line".to_string(),
        }
    }

    /// Builds the error for a token that does not fit where it stands.
    ///
    /// Names and literals are misplaced operands; anything else in operator
    /// position is an operator the evaluator does not know.
    fn unexpected(&self, expected: &str) -> PreprocessorError {
        match self.peek() {
            Some(token)
                if !token.kind.is_name()
                    && !token.kind.is_literal()
                    && !token.kind.is_comment()
                    && token.kind != TokenKind::Then =>
            {
                self.error_here(PreprocessorErrorKind::UnknownOperator(token.text.clone()))
            }
            _ => self.error_here(PreprocessorErrorKind::Unexpected {
                expected: expected.to_string(),
                found: self.found(),
            }),
        }
    }

    /// Consumes a token of `kind` or fails.
    pub(super) fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<&'a Token, PreprocessorError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.current += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Requires the rest of the line to be empty or a comment.
    pub(super) fn expect_end(&self) -> Result<(), PreprocessorError> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind.is_comment() => Ok(()),
            Some(_) => Err(self.unexpected("end of line")),
        }
    }

    // ==================== Evaluation ====================

    /// Evaluates one full expression.
    pub(super) fn evaluate(&mut self) -> Result<ConstValue, PreprocessorError> {
        self.evaluate_precedence(0)
    }

    /// Evaluates an expression whose operators bind tighter than `min_prec`.
    fn evaluate_precedence(&mut self, min_prec: u8) -> Result<ConstValue, PreprocessorError> {
        let mut left = self.evaluate_prefix()?;

        while let Some(token) = self.peek() {
            let Some(prec) = binary_precedence(token.kind) else {
                break;
            };
            if prec <= min_prec {
                break;
            }
            self.advance();
            let right = self.evaluate_precedence(prec)?;
            left = apply_binary(token.kind, &token.text, left, right)
                .map_err(|kind| PreprocessorError::at(token, self.pass, kind))?;
        }

        Ok(left)
    }

    /// Evaluates a literal, a constant name, a grouped expression, or a
    /// unary operation.
    fn evaluate_prefix(&mut self) -> Result<ConstValue, PreprocessorError> {
        let Some(token) = self.peek() else {
            return Err(self.error_here(PreprocessorErrorKind::Unexpected {
                expected: "expression".to_string(),
                found: self.found(),
            }));
        };

        match token.kind {
            TokenKind::IntegerLiteral
            | TokenKind::HexLiteral
            | TokenKind::OctalLiteral
            | TokenKind::FloatLiteral => {
                self.advance();
                parse_number(&token.text)
                    .ok_or_else(|| {
                        PreprocessorError::at(
                            token,
                            self.pass,
                            PreprocessorErrorKind::InvalidNumber(token.text.clone()),
                        )
                    })
            }
            TokenKind::StringLiteral => {
                self.advance();
                let inner = &token.text[1..token.text.len() - 1];
                Ok(ConstValue::String(inner.replace("\"\"", "\"")))
            }
            TokenKind::True => {
                self.advance();
                Ok(ConstValue::TRUE)
            }
            TokenKind::False => {
                self.advance();
                Ok(ConstValue::FALSE)
            }
            kind if kind.is_name() => {
                self.advance();
                Ok(self
                    .constants
                    .get(constant_name(&token.text))
                    .cloned()
                    .unwrap_or(ConstValue::Empty))
            }
            TokenKind::LeftParen => {
                self.advance();
                let value = self.evaluate()?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(value)
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.evaluate_precedence(NEGATE_PRECEDENCE)?;
                match to_number(&operand, "-")
                    .map_err(|kind| PreprocessorError::at(token, self.pass, kind))?
                {
                    Number::Int(v) => Ok(v
                        .checked_neg()
                        .map(ConstValue::Integer)
                        .unwrap_or(ConstValue::Float(-(v as f64)))),
                    Number::Float(v) => Ok(ConstValue::Float(-v)),
                }
            }
            TokenKind::Plus => {
                self.advance();
                self.evaluate_precedence(NEGATE_PRECEDENCE)
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.evaluate_precedence(NOT_PRECEDENCE)?;
                let value = to_number(&operand, "Not")
                    .map_err(|kind| PreprocessorError::at(token, self.pass, kind))?;
                Ok(ConstValue::Integer(!value.as_i64()))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Strips a type hint and brackets from a constant reference.
pub(super) fn constant_name(text: &str) -> &str {
    let text = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    text.trim_end_matches(['$', '%', '&', '!', '#', '@'])
}

/// Binding power of a binary operator, or `None` for anything else.
fn binary_precedence(kind: TokenKind) -> Option<u8> {
    let prec = match kind {
        TokenKind::Imp => 1,
        TokenKind::Eqv => 2,
        TokenKind::Xor => 3,
        TokenKind::Or => 4,
        TokenKind::And => 5,
        TokenKind::Equals
        | TokenKind::NotEquals
        | TokenKind::LessThan
        | TokenKind::GreaterThan
        | TokenKind::LessEquals
        | TokenKind::GreaterEquals => 7,
        TokenKind::Ampersand => 8,
        TokenKind::Plus | TokenKind::Minus => 9,
        TokenKind::Mod => 10,
        TokenKind::Backslash => 11,
        TokenKind::Star | TokenKind::Slash => 12,
        TokenKind::Caret => 14,
        _ => return None,
    };
    Some(prec)
}

/// Parses decimal, `&H` and `&O` integers and floats.
fn parse_number(text: &str) -> Option<ConstValue> {
    let trimmed = text.trim_end_matches('&');
    let lower = trimmed.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("&h") {
        return i64::from_str_radix(hex, 16).ok().map(ConstValue::Integer);
    }
    if let Some(oct) = lower.strip_prefix("&o") {
        return i64::from_str_radix(oct, 8).ok().map(ConstValue::Integer);
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(ConstValue::Integer(v));
    }
    // D exponents are double-precision; Rust only knows E
    lower.replace('d', "e").parse::<f64>().ok().map(ConstValue::Float)
}

/// Coerces a value to a number. Empty is zero; numeric strings convert.
fn to_number(value: &ConstValue, op: &str) -> Result<Number, PreprocessorErrorKind> {
    match value {
        ConstValue::Integer(v) => Ok(Number::Int(*v)),
        ConstValue::Float(v) => Ok(Number::Float(*v)),
        ConstValue::Empty => Ok(Number::Int(0)),
        ConstValue::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                Ok(Number::Int(v))
            } else if let Ok(v) = s.parse::<f64>() {
                Ok(Number::Float(v))
            } else if s.eq_ignore_ascii_case("true") {
                Ok(Number::Int(-1))
            } else if s.eq_ignore_ascii_case("false") {
                Ok(Number::Int(0))
            } else {
                Err(PreprocessorErrorKind::TypeMismatch(op.to_string()))
            }
        }
    }
}

/// Returns true if the value counts as `True` in a condition.
pub(super) fn is_truthy(value: &ConstValue) -> Result<bool, PreprocessorErrorKind> {
    Ok(match to_number(value, "If")? {
        Number::Int(v) => v != 0,
        Number::Float(v) => v != 0.0,
    })
}

fn is_textual(value: &ConstValue) -> bool {
    matches!(value, ConstValue::String(_) | ConstValue::Empty)
}

/// Applies a binary operator to two evaluated operands.
fn apply_binary(
    kind: TokenKind,
    op: &str,
    left: ConstValue,
    right: ConstValue,
) -> Result<ConstValue, PreprocessorErrorKind> {
    let both_strings = is_textual(&left)
        && is_textual(&right)
        && !(left == ConstValue::Empty && right == ConstValue::Empty);

    match kind {
        TokenKind::Ampersand => Ok(ConstValue::String(format!("{}{}", left, right))),

        TokenKind::Plus if both_strings => Ok(ConstValue::String(format!("{}{}", left, right))),

        TokenKind::Equals
        | TokenKind::NotEquals
        | TokenKind::LessThan
        | TokenKind::GreaterThan
        | TokenKind::LessEquals
        | TokenKind::GreaterEquals => {
            let ordering = if both_strings {
                left.to_string().cmp(&right.to_string())
            } else {
                let l = to_number(&left, op)?.as_f64();
                let r = to_number(&right, op)?.as_f64();
                l.partial_cmp(&r)
                    .ok_or_else(|| PreprocessorErrorKind::TypeMismatch(op.to_string()))?
            };
            let result = match kind {
                TokenKind::Equals => ordering.is_eq(),
                TokenKind::NotEquals => ordering.is_ne(),
                TokenKind::LessThan => ordering.is_lt(),
                TokenKind::GreaterThan => ordering.is_gt(),
                TokenKind::LessEquals => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(ConstValue::from_bool(result))
        }

        TokenKind::Plus | TokenKind::Minus | TokenKind::Star => {
            let l = to_number(&left, op)?;
            let r = to_number(&right, op)?;
            match (l, r) {
                (Number::Int(a), Number::Int(b)) => {
                    let checked = match kind {
                        TokenKind::Plus => a.checked_add(b),
                        TokenKind::Minus => a.checked_sub(b),
                        _ => a.checked_mul(b),
                    };
                    Ok(checked.map(ConstValue::Integer).unwrap_or_else(|| {
                        ConstValue::Float(float_arith(kind, a as f64, b as f64))
                    }))
                }
                _ => Ok(ConstValue::Float(float_arith(kind, l.as_f64(), r.as_f64()))),
            }
        }

        TokenKind::Slash => {
            let r = to_number(&right, op)?.as_f64();
            if r == 0.0 {
                return Err(PreprocessorErrorKind::DivisionByZero);
            }
            Ok(ConstValue::Float(to_number(&left, op)?.as_f64() / r))
        }

        TokenKind::Backslash | TokenKind::Mod => {
            let l = to_number(&left, op)?.as_i64();
            let r = to_number(&right, op)?.as_i64();
            if r == 0 {
                return Err(PreprocessorErrorKind::DivisionByZero);
            }
            let result = if kind == TokenKind::Mod {
                l.wrapping_rem(r)
            } else {
                l.wrapping_div(r)
            };
            Ok(ConstValue::Integer(result))
        }

        TokenKind::Caret => {
            let l = to_number(&left, op)?.as_f64();
            let r = to_number(&right, op)?.as_f64();
            Ok(ConstValue::Float(l.powf(r)))
        }

        TokenKind::And | TokenKind::Or | TokenKind::Xor | TokenKind::Eqv | TokenKind::Imp => {
            let l = to_number(&left, op)?.as_i64();
            let r = to_number(&right, op)?.as_i64();
            let result = match kind {
                TokenKind::And => l & r,
                TokenKind::Or => l | r,
                TokenKind::Xor => l ^ r,
                TokenKind::Eqv => !(l ^ r),
                _ => !l | r,
            };
            Ok(ConstValue::Integer(result))
        }

        _ => Err(PreprocessorErrorKind::UnknownOperator(op.to_string())),
    }
}

fn float_arith(kind: TokenKind, a: f64, b: f64) -> f64 {
    match kind {
        TokenKind::Plus => a + b,
        TokenKind::Minus => a - b,
        _ => a * b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn eval_with(source: &str, constants: &ConstantTable) -> Result<ConstValue, PreprocessorError> {
        let tokens = lex(source);
        let directive = Token::new(TokenKind::HashIf, 0..0, "#If");
        let significant: Vec<&Token> = tokens.iter().filter(|t| t.is_significant()).collect();
        let mut evaluator =
            ExprEvaluator::new(significant, &directive, constants, ParsePass::CodePane);
        let value = evaluator.evaluate()?;
        evaluator.expect_end()?;
        Ok(value)
    }

    fn eval(source: &str) -> ConstValue {
        eval_with(source, &ConstantTable::new()).unwrap()
    }

    #[test]
    fn test_integer_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), ConstValue::Integer(7));
        assert_eq!(eval("(1 + 2) * 3"), ConstValue::Integer(9));
        assert_eq!(eval("7 \\ 2"), ConstValue::Integer(3));
        assert_eq!(eval("7 Mod 4"), ConstValue::Integer(3));
    }

    #[test]
    fn test_negation_binds_looser_than_power() {
        assert_eq!(eval("-2 ^ 2"), ConstValue::Float(-4.0));
    }

    #[test]
    fn test_boolean_logic() {
        assert_eq!(eval("True And False"), ConstValue::FALSE);
        assert_eq!(eval("True Or False"), ConstValue::TRUE);
        assert_eq!(eval("Not False"), ConstValue::TRUE);
        assert_eq!(eval("Not 1 = 2"), ConstValue::TRUE);
        assert_eq!(eval("True Xor True"), ConstValue::FALSE);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("3 > 2"), ConstValue::TRUE);
        assert_eq!(eval("2 <= 1"), ConstValue::FALSE);
        assert_eq!(eval("\"a\" < \"b\""), ConstValue::TRUE);
        assert_eq!(eval("1.5 = 1.5"), ConstValue::TRUE);
    }

    #[test]
    fn test_constants_and_undefined_names() {
        let constants: ConstantTable = [("VBA7", ConstValue::TRUE)].into_iter().collect();
        assert_eq!(eval_with("vba7", &constants).unwrap(), ConstValue::TRUE);
        assert_eq!(eval_with("Undefined", &constants).unwrap(), ConstValue::Empty);
        assert_eq!(
            eval_with("Undefined = 0", &constants).unwrap(),
            ConstValue::TRUE
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(eval("\"a\" & 1"), ConstValue::String("a1".into()));
        assert_eq!(eval("\"a\" + \"b\""), ConstValue::String("ab".into()));
    }

    #[test]
    fn test_hex_literal() {
        assert_eq!(eval("&H10 + &O10"), ConstValue::Integer(24));
    }

    #[test]
    fn test_unknown_operator() {
        let err = eval_with("1 ~ 2", &ConstantTable::new()).unwrap_err();
        assert_eq!(err.kind, PreprocessorErrorKind::UnknownOperator("~".into()));
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_like_is_not_supported() {
        let err = eval_with("\"a\" Like \"b\"", &ConstantTable::new()).unwrap_err();
        assert_eq!(err.kind, PreprocessorErrorKind::UnknownOperator("Like".into()));
    }

    #[test]
    fn test_type_mismatch() {
        let err = eval_with("\"abc\" * 2", &ConstantTable::new()).unwrap_err();
        assert_eq!(err.kind, PreprocessorErrorKind::TypeMismatch("*".into()));
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval_with("1 / 0", &ConstantTable::new()).unwrap_err();
        assert_eq!(err.kind, PreprocessorErrorKind::DivisionByZero);
    }

    #[test]
    fn test_missing_operand() {
        let err = eval_with("1 +", &ConstantTable::new()).unwrap_err();
        assert!(matches!(err.kind, PreprocessorErrorKind::Unexpected { .. }));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&ConstValue::Integer(2)).unwrap());
        assert!(!is_truthy(&ConstValue::Empty).unwrap());
        assert!(is_truthy(&ConstValue::String("abc".into())).is_err());
    }
}
