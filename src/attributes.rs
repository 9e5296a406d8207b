//! Hidden module and member attributes.
//!
//! Attributes only exist in the exported module text, so the map is built
//! from the attributes-pass tree:
//!
//! ```text
//! Attribute VB_Name = "Class1"                    module scope
//! Attribute mValue.VB_VarHelpID = -1              variable scope
//! Public Sub Foo()
//! Attribute Foo.VB_Description = "Does foo"       member scope
//! End Sub
//! ```
//!
//! Values are kept as written, string literals with their quotes.

use std::fmt;

use thiserror::Error;

use crate::ast::{MemberKind, ModuleTree, StatementKind};
use crate::pass::ParsePass;

/// One attribute and its values in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.values.join(", "))
    }
}

/// The attributes of one scope.
///
/// Names are unique ignoring case; adding a name again appends its values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    items: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds values to the attribute `name`, creating it if needed.
    pub fn add(&mut self, name: &str, values: impl IntoIterator<Item = String>) {
        match self.items.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.values.extend(values),
            None => self.items.push(Attribute::new(name, values.into_iter().collect())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.items.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over the attributes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What an attribute scope identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Module,
    Member(MemberKind),
    Variable,
}

/// Attributes keyed by `(scope identifier, scope kind)`.
///
/// Identifiers are compared ignoring case. Scopes keep the order in which
/// they first appeared.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    scopes: Vec<(String, ScopeKind, Attributes)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str, kind: ScopeKind) -> Option<&Attributes> {
        self.scopes
            .iter()
            .find(|(name, k, _)| *k == kind && name.eq_ignore_ascii_case(identifier))
            .map(|(_, _, attributes)| attributes)
    }

    /// Returns the attributes of a scope, creating an empty entry if needed.
    pub fn entry(&mut self, identifier: &str, kind: ScopeKind) -> &mut Attributes {
        let position = self
            .scopes
            .iter()
            .position(|(name, k, _)| *k == kind && name.eq_ignore_ascii_case(identifier));
        let index = match position {
            Some(index) => index,
            None => {
                self.scopes
                    .push((identifier.to_string(), kind, Attributes::new()));
                self.scopes.len() - 1
            }
        };
        &mut self.scopes[index].2
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ScopeKind, &Attributes)> {
        self.scopes
            .iter()
            .map(|(name, kind, attributes)| (name.as_str(), *kind, attributes))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttributesError {
    #[error("attributes are only collected from the exported module text, got a {0} tree")]
    WrongPass(ParsePass),
}

/// Builds the attribute map of an attributes-pass tree.
pub fn collect(tree: &ModuleTree) -> Result<AttributeMap, AttributesError> {
    if tree.pass() != ParsePass::Attributes {
        return Err(AttributesError::WrongPass(tree.pass()));
    }

    let module_name = tree.module().component_name();
    let mut map = AttributeMap::new();

    for statement in tree.declarations() {
        if let StatementKind::Attribute(attribute) = &statement.kind {
            let (identifier, kind) = match &attribute.target {
                Some(target) => (target.as_str(), ScopeKind::Variable),
                None => (module_name, ScopeKind::Module),
            };
            map.entry(identifier, kind)
                .add(&attribute.name, attribute.values.iter().cloned());
        }
    }

    for member in tree.members() {
        for attribute in member.attributes() {
            let identifier = attribute.target.as_deref().unwrap_or(&member.name);
            map.entry(identifier, ScopeKind::Member(member.kind))
                .add(&attribute.name, attribute.values.iter().cloned());
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::module::{ComponentKind, QualifiedModuleName};
    use crate::parser::parse;

    fn tree(source: &str, pass: ParsePass) -> ModuleTree {
        let module = QualifiedModuleName::new("p", "Project", "Class1", ComponentKind::Class);
        parse(&module, tokenize(source), pass).unwrap().tree
    }

    #[test]
    fn test_attributes_append_on_repeat() {
        let mut attributes = Attributes::new();
        attributes.add("VB_Ext_KEY", vec!["\"a\"".to_string()]);
        attributes.add("vb_ext_key", vec!["\"b\"".to_string()]);
        attributes.add("VB_Name", vec!["\"X\"".to_string()]);
        assert_eq!(attributes.len(), 2);
        assert_eq!(
            attributes.get("VB_EXT_KEY").unwrap().values,
            vec!["\"a\"".to_string(), "\"b\"".to_string()]
        );
        let names: Vec<_> = attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["VB_Ext_KEY", "VB_Name"]);
    }

    #[test]
    fn test_collect_scopes() {
        let source = "VERSION 1.0 CLASS\nBEGIN\n  MultiUse = -1\nEND\nAttribute VB_Name = \"Class1\"\nAttribute VB_Exposed = False\nPrivate mItems As Collection\nAttribute mItems.VB_VarHelpID = -1\nPublic Property Get Item(ByVal i As Long) As Variant\nAttribute Item.VB_UserMemId = 0\nAttribute Item.VB_Description = \"Gets an item\"\nEnd Property\n";
        let map = collect(&tree(source, ParsePass::Attributes)).unwrap();
        assert_eq!(map.len(), 3);

        let module = map.get("class1", ScopeKind::Module).unwrap();
        assert_eq!(module.get("VB_Name").unwrap().values, vec!["\"Class1\"".to_string()]);
        assert!(module.contains("VB_Exposed"));

        let variable = map.get("mItems", ScopeKind::Variable).unwrap();
        assert_eq!(variable.get("VB_VarHelpID").unwrap().values, vec!["-1".to_string()]);

        let member = map
            .get("Item", ScopeKind::Member(MemberKind::PropertyGet))
            .unwrap();
        assert_eq!(member.len(), 2);
        assert_eq!(member.get("VB_UserMemId").unwrap().values, vec!["0".to_string()]);
        assert!(map.get("Item", ScopeKind::Member(MemberKind::PropertyLet)).is_none());
    }

    #[test]
    fn test_collect_rejects_code_pane_tree() {
        let err = collect(&tree("Option Explicit\n", ParsePass::CodePane)).unwrap_err();
        assert_eq!(err, AttributesError::WrongPass(ParsePass::CodePane));
    }
}
