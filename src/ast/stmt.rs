//! Statement and member nodes.
//!
//! # Statement Categories
//!
//! - **Declarations**: Option, Dim/Public/Private/Global/Static variables,
//!   Const, Declare, Implements, Def-type, Event, Type, Enum
//! - **Attributes**: `Attribute [target.]Name = value` (exported text only)
//! - **Blocks**: If, For, For Each, Do, While, Select Case, With
//! - **Simple**: everything else, kept as a token range
//! - **Members**: Sub, Function, Property Get/Let/Set

use std::fmt;

use super::{Remark, Span, TokenRange};
use crate::module::Selection;

/// One line-level piece of a multi-line construct: a block header such as
/// `ElseIf x Then`, or a closing line such as `End If`.
#[derive(Debug, Clone, Default)]
pub struct Clause {
    pub span: Span,
    pub tokens: TokenRange,
    pub selection: Selection,
    /// Comment or annotation list ending the line.
    pub remark: Option<Remark>,
}

/// A statement with its source location.
#[derive(Debug, Clone)]
pub struct Statement {
    /// The kind of statement.
    pub kind: StatementKind,
    /// Source location of the whole statement, including nested lines.
    pub span: Span,
    pub tokens: TokenRange,
    pub selection: Selection,
    /// Remark ending a single-line statement. Multi-line statements carry
    /// their remarks on their clauses instead.
    pub remark: Option<Remark>,
}

impl Statement {
    /// Returns true if this is a blank or remark-only line.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, StatementKind::Empty)
    }

    /// Returns true for declarations-section statements.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::Option { .. }
                | StatementKind::Variable { .. }
                | StatementKind::Constant { .. }
                | StatementKind::Declare { .. }
                | StatementKind::Implements { .. }
                | StatementKind::DefType { .. }
                | StatementKind::Event { .. }
                | StatementKind::TypeDef { .. }
                | StatementKind::EnumDef { .. }
        )
    }

    /// Visits every remark of this statement and its nested statements in
    /// document order.
    pub fn walk_remarks<'a>(&'a self, f: &mut impl FnMut(&'a Remark)) {
        if let Some(remark) = &self.remark {
            f(remark);
        }
        match &self.kind {
            StatementKind::Block { sections, end, .. } => {
                for section in sections {
                    if let Some(remark) = &section.header.remark {
                        f(remark);
                    }
                    for statement in &section.body {
                        statement.walk_remarks(f);
                    }
                }
                if let Some(remark) = &end.remark {
                    f(remark);
                }
            }
            StatementKind::TypeDef {
                header, fields: body, end, ..
            }
            | StatementKind::EnumDef {
                header,
                members: body,
                end,
                ..
            } => {
                if let Some(remark) = &header.remark {
                    f(remark);
                }
                for statement in body {
                    statement.walk_remarks(f);
                }
                if let Some(remark) = &end.remark {
                    f(remark);
                }
            }
            _ => {}
        }
    }
}

/// The different kinds of statements.
#[derive(Debug, Clone)]
pub enum StatementKind {
    /// A blank line or a line holding only a remark.
    Empty,

    /// `Option Explicit`, `Option Base 1`, `Option Compare Text`, ...
    Option { setting: String },

    /// `Attribute [target.]Name = value {, value}`
    Attribute(AttributeStatement),

    /// `Dim|Public|Private|Global|Static name [As type] {, ...}`
    Variable {
        visibility: Option<Visibility>,
        is_static: bool,
        declarations: Vec<VariableDeclaration>,
    },

    /// `[vis] Const name [As type] = value {, ...}`
    Constant {
        visibility: Option<Visibility>,
        names: Vec<String>,
    },

    /// `[vis] Declare [PtrSafe] Sub|Function name Lib "lib" [Alias "x"] (...)`
    Declare {
        visibility: Option<Visibility>,
        kind: MemberKind,
        name: String,
        library: String,
    },

    /// `Implements Interface`
    Implements { interface: String },

    /// `DefLng A-Z`, `DefInt I-N, X`: default types by first letter.
    DefType {
        /// The type part of the keyword, such as `Lng`.
        type_name: String,
        /// Letter ranges as written.
        ranges: Vec<String>,
    },

    /// `[vis] Event name (...)`
    Event {
        visibility: Option<Visibility>,
        name: String,
        params: Vec<Parameter>,
    },

    /// `[vis] Type name ... End Type`
    TypeDef {
        visibility: Option<Visibility>,
        name: String,
        header: Clause,
        /// Field and remark lines.
        fields: Vec<Statement>,
        end: Clause,
    },

    /// `[vis] Enum name ... End Enum`
    EnumDef {
        visibility: Option<Visibility>,
        name: String,
        header: Clause,
        /// Member and remark lines.
        members: Vec<Statement>,
        end: Clause,
    },

    /// One field of a user-defined type, or one member of an enum.
    Field { name: String },

    /// A block statement and its nested bodies.
    Block {
        kind: BlockKind,
        /// Header clauses with their bodies; the first is the opening line.
        sections: Vec<BlockSection>,
        end: Clause,
    },

    /// Any other statement, including single-line `If`.
    Simple,
}

/// `Attribute [target.]Name = value {, value}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeStatement {
    /// Member or variable the attribute applies to, when qualified.
    pub target: Option<String>,
    /// Attribute name, such as `VB_Name` or `VB_Description`.
    pub name: String,
    /// Values as written, quotes included.
    pub values: Vec<String>,
}

/// One variable declared by a `Dim`-style statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub name: String,
    pub type_name: Option<String>,
    pub is_array: bool,
    pub with_events: bool,
}

/// The kind of a block statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    For,
    ForEach,
    Do,
    While,
    Select,
    With,
}

/// A header clause and the statements under it.
#[derive(Debug, Clone)]
pub struct BlockSection {
    pub header: Clause,
    pub body: Vec<Statement>,
}

/// Declared accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Friend,
    Global,
}

/// The kind of a procedure or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Sub,
    Function,
    PropertyGet,
    PropertyLet,
    PropertySet,
}

impl MemberKind {
    /// The text following `End` on the member's closing line.
    pub fn end_keyword(&self) -> &'static str {
        match self {
            MemberKind::Sub => "Sub",
            MemberKind::Function => "Function",
            _ => "Property",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Sub => write!(f, "Sub"),
            MemberKind::Function => write!(f, "Function"),
            MemberKind::PropertyGet => write!(f, "Property Get"),
            MemberKind::PropertyLet => write!(f, "Property Let"),
            MemberKind::PropertySet => write!(f, "Property Set"),
        }
    }
}

/// A procedure parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
    pub optional: bool,
    pub by_val: bool,
    pub param_array: bool,
}

/// A procedure or property definition.
#[derive(Debug, Clone)]
pub struct Member {
    pub kind: MemberKind,
    pub name: String,
    pub visibility: Option<Visibility>,
    pub is_static: bool,
    pub params: Vec<Parameter>,
    /// `As` clause of a function or property get.
    pub return_type: Option<String>,
    /// The signature line.
    pub header: Clause,
    pub body: Vec<Statement>,
    /// The `End Sub|Function|Property` line.
    pub end: Clause,
    /// Source location of the whole member.
    pub span: Span,
    pub tokens: TokenRange,
    pub selection: Selection,
}

impl Member {
    /// Visits every remark of the member in document order.
    pub fn walk_remarks<'a>(&'a self, f: &mut impl FnMut(&'a Remark)) {
        if let Some(remark) = &self.header.remark {
            f(remark);
        }
        for statement in &self.body {
            statement.walk_remarks(f);
        }
        if let Some(remark) = &self.end.remark {
            f(remark);
        }
    }

    /// Attribute statements directly inside the member body.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeStatement> {
        self.body.iter().filter_map(|s| match &s.kind {
            StatementKind::Attribute(attribute) => Some(attribute),
            _ => None,
        })
    }
}

/// The `VERSION ... BEGIN ... END` header of an exported class or form.
#[derive(Debug, Clone)]
pub struct ClassHeader {
    /// Version number as written, such as `1.0`.
    pub version: String,
    /// Top-level `Name = value` lines inside `BEGIN ... END`.
    pub properties: Vec<(String, String)>,
    pub span: Span,
    pub tokens: TokenRange,
    pub selection: Selection,
}
