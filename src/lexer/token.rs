//! Token definitions for the module lexer.
//!
//! This module defines all tokens recognized in a module's text, including:
//! - Keywords (IF, THEN, SUB, etc.)
//! - Operators (+, -, AND, OR, etc.)
//! - Literals (numbers, strings)
//! - Conditional compilation directives (#IF, #CONST, ...)
//! - Trivia (whitespace, line continuations, newlines, comments)
//!
//! ## Design Notes
//!
//! We use the `logos` crate for lexical analysis. Logos generates a fast,
//! table-driven lexer from token definitions using procedural macros.
//!
//! Unlike a compiler lexer, nothing is skipped here: whitespace and line
//! continuations are real tokens on the hidden channel, so the concatenated
//! token texts always reproduce the input. Rewriters depend on that.
//!
//! Keywords are case-insensitive, so they are matched with `ignore(ascii_case)`.

use logos::Logos;
use std::fmt;

/// Which consumer a token is visible to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    /// Seen by the parser.
    #[default]
    Default,
    /// Whitespace and line continuations. Kept for text reconstruction only.
    Hidden,
    /// Excluded by the conditional compilation evaluator (directive lines and
    /// dead branches). Kept for text reconstruction only.
    Inactive,
}

/// A token with its location in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// Byte offset range of this token in the source
    pub span: std::ops::Range<usize>,
    /// The original text of the token
    pub text: String,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
    /// Position of this token in its stream
    pub index: usize,
    /// Visibility of this token to the parser
    pub channel: Channel,
}

impl Token {
    /// Create a new token with the given kind, span, and text.
    ///
    /// Position fields default to line 1, column 1, index 0; the lexer fills
    /// them in.
    pub fn new(kind: TokenKind, span: std::ops::Range<usize>, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
            line: 1,
            column: 1,
            index: 0,
            channel: kind.default_channel(),
        }
    }

    /// Returns true if the parser should see this token.
    pub fn is_significant(&self) -> bool {
        self.channel == Channel::Default
    }

    /// Line of the last character of this token.
    pub fn end_line(&self) -> usize {
        self.line + self.text.matches('\n').count()
    }

    /// 1-based column just past the last character of this token.
    pub fn end_column(&self) -> usize {
        match self.text.rfind('\n') {
            Some(pos) => self.text[pos + 1..].chars().count() + 1,
            None => self.column + self.text.chars().count(),
        }
    }
}

/// All token types in the module language.
///
/// Tokens are grouped into categories:
/// - Keywords (declarations, members, blocks, operators)
/// - Operators and punctuation
/// - Literals (numbers, strings)
/// - Directives (conditional compilation)
/// - Trivia (comments, whitespace, newlines)
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ==================== Declaration Keywords ====================

    /// PUBLIC accessibility
    #[token("Public", ignore(ascii_case))]
    Public,

    /// PRIVATE accessibility
    #[token("Private", ignore(ascii_case))]
    Private,

    /// FRIEND accessibility (class members)
    #[token("Friend", ignore(ascii_case))]
    Friend,

    /// GLOBAL accessibility (legacy PUBLIC)
    #[token("Global", ignore(ascii_case))]
    Global,

    /// STATIC keyword - static locals and members
    #[token("Static", ignore(ascii_case))]
    Static,

    /// DIM keyword - variable declaration
    #[token("Dim", ignore(ascii_case))]
    Dim,

    /// CONST keyword - constant declaration
    #[token("Const", ignore(ascii_case))]
    Const,

    /// OPTION keyword - module options
    #[token("Option", ignore(ascii_case))]
    Option,

    /// AS keyword - type specification
    #[token("As", ignore(ascii_case))]
    As,

    /// NEW keyword - auto-instancing declarations
    #[token("New", ignore(ascii_case))]
    New,

    /// WITHEVENTS modifier
    #[token("WithEvents", ignore(ascii_case))]
    WithEvents,

    /// TYPE keyword - user-defined type
    #[token("Type", ignore(ascii_case))]
    Type,

    /// ENUM keyword - enumeration
    #[token("Enum", ignore(ascii_case))]
    Enum,

    /// DECLARE keyword - external procedure
    #[token("Declare", ignore(ascii_case))]
    Declare,

    /// PTRSAFE modifier for DECLARE
    #[token("PtrSafe", ignore(ascii_case))]
    PtrSafe,

    /// LIB keyword in DECLARE
    #[token("Lib", ignore(ascii_case))]
    Lib,

    /// ALIAS keyword in DECLARE
    #[token("Alias", ignore(ascii_case))]
    Alias,

    /// IMPLEMENTS keyword - interface implementation
    #[token("Implements", ignore(ascii_case))]
    Implements,

    /// EVENT keyword - event declaration
    #[token("Event", ignore(ascii_case))]
    Event,

    // ==================== Member Keywords ====================

    /// SUB keyword - procedure
    #[token("Sub", ignore(ascii_case))]
    Sub,

    /// FUNCTION keyword - function
    #[token("Function", ignore(ascii_case))]
    Function,

    /// PROPERTY keyword - property accessor
    #[token("Property", ignore(ascii_case))]
    Property,

    /// GET keyword - property getter
    #[token("Get", ignore(ascii_case))]
    Get,

    /// LET keyword - value assignment / property letter
    #[token("Let", ignore(ascii_case))]
    Let,

    /// SET keyword - reference assignment / property setter
    #[token("Set", ignore(ascii_case))]
    Set,

    /// BYVAL parameter modifier
    #[token("ByVal", ignore(ascii_case))]
    ByVal,

    /// BYREF parameter modifier
    #[token("ByRef", ignore(ascii_case))]
    ByRef,

    /// OPTIONAL parameter modifier
    #[token("Optional", ignore(ascii_case))]
    Optional,

    /// PARAMARRAY parameter modifier
    #[token("ParamArray", ignore(ascii_case))]
    ParamArray,

    /// END keyword - closes blocks and members
    #[token("End", ignore(ascii_case))]
    End,

    /// EXIT keyword - early exit
    #[token("Exit", ignore(ascii_case))]
    Exit,

    // ==================== Block Keywords ====================

    /// IF keyword
    #[token("If", ignore(ascii_case))]
    If,

    /// THEN keyword
    #[token("Then", ignore(ascii_case))]
    Then,

    /// ELSE keyword
    #[token("Else", ignore(ascii_case))]
    Else,

    /// ELSEIF keyword
    #[token("ElseIf", ignore(ascii_case))]
    ElseIf,

    /// FOR keyword
    #[token("For", ignore(ascii_case))]
    For,

    /// EACH keyword (FOR EACH)
    #[token("Each", ignore(ascii_case))]
    Each,

    /// NEXT keyword
    #[token("Next", ignore(ascii_case))]
    Next,

    /// DO keyword
    #[token("Do", ignore(ascii_case))]
    Do,

    /// LOOP keyword
    #[token("Loop", ignore(ascii_case))]
    Loop,

    /// WHILE keyword
    #[token("While", ignore(ascii_case))]
    While,

    /// WEND keyword
    #[token("Wend", ignore(ascii_case))]
    Wend,

    /// SELECT keyword
    #[token("Select", ignore(ascii_case))]
    Select,

    /// CASE keyword
    #[token("Case", ignore(ascii_case))]
    Case,

    /// WITH keyword
    #[token("With", ignore(ascii_case))]
    With,

    // ==================== Operator Keywords ====================

    /// AND operator
    #[token("And", ignore(ascii_case))]
    And,

    /// OR operator
    #[token("Or", ignore(ascii_case))]
    Or,

    /// NOT operator
    #[token("Not", ignore(ascii_case))]
    Not,

    /// XOR operator
    #[token("Xor", ignore(ascii_case))]
    Xor,

    /// EQV operator
    #[token("Eqv", ignore(ascii_case))]
    Eqv,

    /// IMP operator
    #[token("Imp", ignore(ascii_case))]
    Imp,

    /// MOD operator
    #[token("Mod", ignore(ascii_case))]
    Mod,

    /// LIKE operator
    #[token("Like", ignore(ascii_case))]
    Like,

    /// IS operator
    #[token("Is", ignore(ascii_case))]
    Is,

    /// TRUE literal
    #[token("True", ignore(ascii_case))]
    True,

    /// FALSE literal
    #[token("False", ignore(ascii_case))]
    False,

    // ==================== Operators ====================

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    /// \ integer division
    #[token("\\")]
    Backslash,

    #[token("^")]
    Caret,

    /// & string concatenation
    #[token("&")]
    Ampersand,

    #[token("=")]
    Equals,

    #[token("<>")]
    NotEquals,

    #[token("<")]
    LessThan,

    #[token(">")]
    GreaterThan,

    #[token("<=")]
    LessEquals,

    #[token(">=")]
    GreaterEquals,

    /// := named argument
    #[token(":=")]
    ColonEquals,

    // ==================== Punctuation ====================

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    /// : statement separator
    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    /// # file number prefix, date literal delimiter
    #[token("#")]
    Hash,

    /// ! dictionary access
    #[token("!")]
    Exclamation,

    /// @ annotation marker (only meaningful inside a comment)
    #[token("@")]
    At,

    // ==================== Literals ====================

    /// Integer literal (decimal)
    #[regex(r"[0-9]+", priority = 2)]
    IntegerLiteral,

    /// Hexadecimal literal (&HFF, &HFF&)
    #[regex(r"&[Hh][0-9A-Fa-f]+&?")]
    HexLiteral,

    /// Octal literal (&O17)
    #[regex(r"&[Oo][0-7]+&?")]
    OctalLiteral,

    /// Floating point literal (1.5, .5, 1.5E10, 1.5D-3)
    #[regex(r"[0-9]*\.[0-9]+([EeDd][+-]?[0-9]+)?|[0-9]+[EeDd][+-]?[0-9]+")]
    FloatLiteral,

    /// String literal, doubled quotes escape a quote
    #[regex(r#""([^"\r\n]|"")*""#)]
    StringLiteral,

    /// String literal missing its closing quote
    #[regex(r#""([^"\r\n]|"")*"#)]
    UnterminatedString,

    // ==================== Identifiers ====================

    /// Identifier, optionally with a type hint suffix. Letters are any
    /// Unicode letters, as the IDE accepts them in the host code page.
    #[regex(r"\p{L}[\p{L}\p{N}_]*[$%&!#@]?")]
    Identifier,

    /// Bracketed identifier ([Some Name])
    #[regex(r"\[[^\]\r\n]*\]")]
    BracketedIdentifier,

    // ==================== Directives ====================

    /// #IF conditional compilation directive
    #[token("#If", ignore(ascii_case))]
    HashIf,

    /// #ELSEIF conditional compilation directive
    #[token("#ElseIf", ignore(ascii_case))]
    HashElseIf,

    /// #ELSE conditional compilation directive
    #[token("#Else", ignore(ascii_case))]
    HashElse,

    /// #END IF conditional compilation directive
    #[regex(r"#[Ee][Nn][Dd][ \t]*[Ii][Ff]")]
    HashEndIf,

    /// #CONST conditional compilation constant
    #[token("#Const", ignore(ascii_case))]
    HashConst,

    // ==================== Trivia ====================

    /// Comment - starts with '
    #[regex(r"'[^\r\n]*")]
    Comment,

    /// REM comment (legacy whole-line comment keyword)
    #[regex(r"[Rr][Ee][Mm]([ \t][^\r\n]*)?")]
    RemComment,

    /// Newline - significant (ends statements)
    #[regex(r"\r\n|\n|\r")]
    Newline,

    /// Horizontal whitespace
    #[regex(r"[ \t]+")]
    Whitespace,

    /// Line continuation (underscore at end of line)
    #[regex(r"_[ \t]*(\r\n|\n|\r)")]
    LineContinuation,

    /// Any character the lexer does not recognize
    Unknown,
}

impl TokenKind {
    /// The channel a freshly lexed token of this kind belongs to.
    pub fn default_channel(&self) -> Channel {
        match self {
            TokenKind::Whitespace | TokenKind::LineContinuation => Channel::Hidden,
            _ => Channel::Default,
        }
    }

    /// Returns true for conditional compilation directive keywords.
    pub fn is_directive(&self) -> bool {
        matches!(
            self,
            TokenKind::HashIf
                | TokenKind::HashElseIf
                | TokenKind::HashElse
                | TokenKind::HashEndIf
                | TokenKind::HashConst
        )
    }

    /// Returns true for `'` and `REM` comments.
    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::RemComment)
    }

    /// Returns true for tokens that can name a declaration.
    ///
    /// `Alias`, `Lib` and `PtrSafe` are only keywords inside `Declare`, so
    /// they are names everywhere else.
    pub fn is_name(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::BracketedIdentifier
                | TokenKind::Alias
                | TokenKind::Lib
                | TokenKind::PtrSafe
        )
    }

    /// Returns true for literal value tokens.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntegerLiteral
                | TokenKind::HexLiteral
                | TokenKind::OctalLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::If => write!(f, "IF"),
            TokenKind::Then => write!(f, "THEN"),
            TokenKind::Else => write!(f, "ELSE"),
            TokenKind::ElseIf => write!(f, "ELSEIF"),
            TokenKind::End => write!(f, "END"),
            TokenKind::Sub => write!(f, "SUB"),
            TokenKind::Function => write!(f, "FUNCTION"),
            TokenKind::Property => write!(f, "PROPERTY"),
            TokenKind::HashIf => write!(f, "#IF"),
            TokenKind::HashElseIf => write!(f, "#ELSEIF"),
            TokenKind::HashElse => write!(f, "#ELSE"),
            TokenKind::HashEndIf => write!(f, "#END IF"),
            TokenKind::HashConst => write!(f, "#CONST"),
            TokenKind::Newline => write!(f, "end of line"),

            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Equals => write!(f, "="),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),

            // Default: use debug representation
            _ => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logos::Logos;

    /// Helper to collect all significant token kinds from source
    fn lex_all(source: &str) -> Vec<TokenKind> {
        TokenKind::lexer(source)
            .filter_map(|r| r.ok())
            .filter(|k| k.default_channel() == Channel::Default)
            .collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(lex_all("SUB"), vec![TokenKind::Sub]);
        assert_eq!(lex_all("sub"), vec![TokenKind::Sub]);
        assert_eq!(lex_all("Sub"), vec![TokenKind::Sub]);
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(lex_all("Subtotal"), vec![TokenKind::Identifier]);
        assert_eq!(lex_all("Remove"), vec![TokenKind::Identifier]);
    }

    #[test]
    fn test_unicode_identifiers() {
        assert_eq!(
            lex_all("Dim größe As Long"),
            vec![TokenKind::Dim, TokenKind::Identifier, TokenKind::As, TokenKind::Identifier]
        );
        assert_eq!(lex_all("résumé$"), vec![TokenKind::Identifier]);
        assert_eq!(lex_all("Ключ2"), vec![TokenKind::Identifier]);
    }

    #[test]
    fn test_contextual_keywords_are_names() {
        assert!(TokenKind::Alias.is_name());
        assert!(TokenKind::Lib.is_name());
        assert!(TokenKind::PtrSafe.is_name());
        assert!(!TokenKind::Declare.is_name());
    }

    #[test]
    fn test_sub_header() {
        let tokens = lex_all("Public Sub Foo()");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Public,
                TokenKind::Sub,
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn test_directives() {
        assert_eq!(lex_all("#If"), vec![TokenKind::HashIf]);
        assert_eq!(lex_all("#ElseIf"), vec![TokenKind::HashElseIf]);
        assert_eq!(lex_all("#Else"), vec![TokenKind::HashElse]);
        assert_eq!(lex_all("#End If"), vec![TokenKind::HashEndIf]);
        assert_eq!(lex_all("#const"), vec![TokenKind::HashConst]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            lex_all("x = 1 ' note"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::IntegerLiteral,
                TokenKind::Comment,
            ]
        );
        assert_eq!(lex_all("Rem legacy note"), vec![TokenKind::RemComment]);
        assert_eq!(lex_all("rem"), vec![TokenKind::RemComment]);
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(lex_all(r#""a ""quoted"" b""#), vec![TokenKind::StringLiteral]);
        assert_eq!(lex_all(r#""open"#), vec![TokenKind::UnterminatedString]);
    }

    #[test]
    fn test_type_hint_suffixes() {
        assert_eq!(
            lex_all("name$ count% total&"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex_all("42 &HFF 1.5 &O17"),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::HexLiteral,
                TokenKind::FloatLiteral,
                TokenKind::OctalLiteral,
            ]
        );
    }

    #[test]
    fn test_token_end_position() {
        let mut token = Token::new(TokenKind::LineContinuation, 0..3, "_\r\n");
        token.line = 4;
        token.column = 10;
        assert_eq!(token.end_line(), 5);
        assert_eq!(token.end_column(), 1);
    }
}
