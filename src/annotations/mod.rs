//! Annotation registry.
//!
//! Annotations are structured comments (`'@Name args`) that tools read as
//! metadata. The registry maps each known name to its [`AnnotationShape`]:
//! where it may be placed and which hidden attribute, if any, it stands for.
//! Names missing from the registry are not annotations and are ignored by
//! the extractor.
//!
//! | Name | Target | Kind |
//! |------|--------|------|
//! | `ModuleDescription` | module | description, `VB_Description` |
//! | `Description` | member | description, `VB_Description` |
//! | `PredeclaredId` | module | fixed `VB_PredeclaredId = True` |
//! | `Exposed` | module | fixed `VB_Exposed = True` |
//! | `DefaultMember` | member | fixed `VB_UserMemId = 0` |
//! | `Enumerator` | member | fixed `VB_UserMemId = -4` |
//! | `Folder` | module | free-form, 1 argument |
//! | `IgnoreModule` | module | free-form |
//! | `Ignore` | general | free-form |
//! | `TestModule` | module | free-form, no arguments |
//! | `TestMethod` | member | free-form, up to 1 argument |
//! | `Interface` | module | free-form |
//! | `NoIndent` | module | free-form |

use std::collections::HashMap;

use crate::attributes::Attribute;
use crate::module::QualifiedSelection;

/// Where an annotation may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationTarget {
    Module,
    Member,
    /// Anywhere; binds to the enclosing member or the module.
    General,
}

/// What an annotation means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Implies `attribute` with fixed values.
    FixedAttributeValue {
        attribute: String,
        values: Vec<String>,
    },
    /// Implies `attribute` with the argument at `parameter_index` (0-based),
    /// quoted.
    DescriptionAttribute {
        attribute: String,
        parameter_index: usize,
    },
    /// Arbitrary arguments, no implied attribute.
    FreeForm {
        min_args: usize,
        max_args: Option<usize>,
    },
}

/// A registered annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationShape {
    /// Canonical spelling of the name.
    pub name: String,
    pub target: AnnotationTarget,
    pub kind: AnnotationKind,
}

impl AnnotationShape {
    pub fn new(name: impl Into<String>, target: AnnotationTarget, kind: AnnotationKind) -> Self {
        Self {
            name: name.into(),
            target,
            kind,
        }
    }

    fn fixed(name: &str, target: AnnotationTarget, attribute: &str, value: &str) -> Self {
        Self::new(
            name,
            target,
            AnnotationKind::FixedAttributeValue {
                attribute: attribute.to_string(),
                values: vec![value.to_string()],
            },
        )
    }

    fn description(name: &str, target: AnnotationTarget) -> Self {
        Self::new(
            name,
            target,
            AnnotationKind::DescriptionAttribute {
                attribute: "VB_Description".to_string(),
                parameter_index: 0,
            },
        )
    }

    fn free_form(name: &str, target: AnnotationTarget, min_args: usize, max_args: Option<usize>) -> Self {
        Self::new(name, target, AnnotationKind::FreeForm { min_args, max_args })
    }

    /// Returns true if `count` arguments are acceptable.
    pub fn accepts_args(&self, count: usize) -> bool {
        match &self.kind {
            AnnotationKind::FixedAttributeValue { .. } => count == 0,
            AnnotationKind::DescriptionAttribute {
                parameter_index, ..
            } => count > *parameter_index,
            AnnotationKind::FreeForm { min_args, max_args } => {
                count >= *min_args && max_args.is_none_or(|max| count <= max)
            }
        }
    }
}

/// Case-insensitive table of known annotations.
#[derive(Debug, Clone)]
pub struct AnnotationRegistry {
    shapes: HashMap<String, AnnotationShape>,
}

impl AnnotationRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            shapes: HashMap::new(),
        }
    }

    /// Adds or replaces a shape.
    pub fn register(&mut self, shape: AnnotationShape) {
        self.shapes.insert(shape.name.to_ascii_lowercase(), shape);
    }

    /// Looks up a name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&AnnotationShape> {
        self.shapes.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Canonical names of all registered annotations.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.values().map(|shape| shape.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl Default for AnnotationRegistry {
    fn default() -> Self {
        use AnnotationTarget::{General, Member, Module};

        let mut registry = Self::empty();
        for shape in [
            AnnotationShape::description("ModuleDescription", Module),
            AnnotationShape::description("Description", Member),
            AnnotationShape::fixed("PredeclaredId", Module, "VB_PredeclaredId", "True"),
            AnnotationShape::fixed("Exposed", Module, "VB_Exposed", "True"),
            AnnotationShape::fixed("DefaultMember", Member, "VB_UserMemId", "0"),
            AnnotationShape::fixed("Enumerator", Member, "VB_UserMemId", "-4"),
            AnnotationShape::free_form("Folder", Module, 1, Some(1)),
            AnnotationShape::free_form("IgnoreModule", Module, 0, None),
            AnnotationShape::free_form("Ignore", General, 0, None),
            AnnotationShape::free_form("TestModule", Module, 0, Some(0)),
            AnnotationShape::free_form("TestMethod", Member, 0, Some(1)),
            AnnotationShape::free_form("Interface", Module, 0, Some(0)),
            AnnotationShape::free_form("NoIndent", Module, 0, Some(0)),
        ] {
            registry.register(shape);
        }
        registry
    }
}

/// The scope an annotation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationScope {
    Module,
    /// A member, by name.
    Member(String),
}

/// An annotation found in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Canonical name from the registry.
    pub name: String,
    /// Arguments, string literals unquoted.
    pub args: Vec<String>,
    pub shape: AnnotationShape,
    pub scope: AnnotationScope,
    pub selection: QualifiedSelection,
}

impl Annotation {
    /// The hidden attribute this annotation stands for, if any.
    ///
    /// Returns `None` for free-form annotations, and for description
    /// annotations missing their argument.
    pub fn implied_attribute(&self) -> Option<Attribute> {
        match &self.shape.kind {
            AnnotationKind::FixedAttributeValue { attribute, values } => {
                Some(Attribute::new(attribute.clone(), values.clone()))
            }
            AnnotationKind::DescriptionAttribute {
                attribute,
                parameter_index,
            } => {
                let text = self.args.get(*parameter_index)?;
                Some(Attribute::new(attribute.clone(), vec![quote(text)]))
            }
            AnnotationKind::FreeForm { .. } => None,
        }
    }

    /// Returns true if the argument count fits the shape.
    pub fn has_valid_args(&self) -> bool {
        self.shape.accepts_args(self.args.len())
    }
}

/// Quotes a value as a string literal, doubling embedded quotes.
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ComponentKind, QualifiedModuleName, Selection};

    fn annotation(registry: &AnnotationRegistry, name: &str, args: &[&str]) -> Annotation {
        let module = QualifiedModuleName::new("p", "Project", "Module1", ComponentKind::Standard);
        let shape = registry.lookup(name).unwrap().clone();
        Annotation {
            name: shape.name.clone(),
            args: args.iter().map(|a| a.to_string()).collect(),
            shape,
            scope: AnnotationScope::Module,
            selection: QualifiedSelection::new(module, Selection::new(1, 1, 1, 2)),
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = AnnotationRegistry::default();
        assert_eq!(registry.len(), 13);
        assert!(registry.contains("Folder"));
        assert!(!registry.contains("Foo"));
    }

    #[test]
    fn test_lookup_ignores_case() {
        let registry = AnnotationRegistry::default();
        let shape = registry.lookup("moduledescription").unwrap();
        assert_eq!(shape.name, "ModuleDescription");
        assert_eq!(shape.target, AnnotationTarget::Module);
    }

    #[test]
    fn test_implied_attributes() {
        let registry = AnnotationRegistry::default();

        let description = annotation(&registry, "Description", &["say \"hi\""]);
        assert_eq!(
            description.implied_attribute(),
            Some(Attribute::new("VB_Description", vec!["\"say \"\"hi\"\"\"".to_string()]))
        );

        let enumerator = annotation(&registry, "Enumerator", &[]);
        assert_eq!(
            enumerator.implied_attribute(),
            Some(Attribute::new("VB_UserMemId", vec!["-4".to_string()]))
        );

        assert_eq!(annotation(&registry, "Folder", &["A.B"]).implied_attribute(), None);
        assert_eq!(annotation(&registry, "ModuleDescription", &[]).implied_attribute(), None);
    }

    #[test]
    fn test_argument_counts() {
        let registry = AnnotationRegistry::default();
        assert!(annotation(&registry, "TestMethod", &["Category"]).has_valid_args());
        assert!(!annotation(&registry, "TestMethod", &["a", "b"]).has_valid_args());
        assert!(!annotation(&registry, "Folder", &[]).has_valid_args());
        assert!(annotation(&registry, "Ignore", &["a", "b", "c"]).has_valid_args());
        assert!(!annotation(&registry, "PredeclaredId", &["x"]).has_valid_args());
    }

    #[test]
    fn test_custom_shape() {
        let mut registry = AnnotationRegistry::empty();
        registry.register(AnnotationShape::new(
            "Obsolete",
            AnnotationTarget::General,
            AnnotationKind::FreeForm {
                min_args: 0,
                max_args: Some(1),
            },
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Obsolete"]);
    }
}
