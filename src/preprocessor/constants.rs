//! Conditional compilation constants.
//!
//! Constants come from three places, later ones shadowing earlier ones:
//! 1. Predefined platform constants (`VBA7`, `Win64`, ...)
//! 2. Project-level declared constants (the project's compilation arguments)
//! 3. `#Const` directives in the module itself
//!
//! Names are case-insensitive.

use std::collections::HashMap;
use std::fmt;

/// A compile-time constant value.
///
/// Booleans are integers, as in the language: `True` is `-1`, `False` is `0`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// Integer constant.
    Integer(i64),
    /// Floating-point constant.
    Float(f64),
    /// String constant.
    String(String),
    /// Value of a name that was never defined.
    Empty,
}

impl ConstValue {
    pub const TRUE: ConstValue = ConstValue::Integer(-1);
    pub const FALSE: ConstValue = ConstValue::Integer(0);

    /// Converts a Rust bool to the language's boolean representation.
    pub fn from_bool(value: bool) -> Self {
        if value {
            ConstValue::TRUE
        } else {
            ConstValue::FALSE
        }
    }

    /// Parses a literal as given on a command line or in a project setting.
    ///
    /// Recognizes `True`/`False`, integers, floats and quoted strings; any
    /// other text is taken as a string.
    ///
    /// ```
    /// use mallard::preprocessor::ConstValue;
    ///
    /// assert_eq!(ConstValue::parse_literal("True"), ConstValue::Integer(-1));
    /// assert_eq!(ConstValue::parse_literal("42"), ConstValue::Integer(42));
    /// assert_eq!(ConstValue::parse_literal("\"x\""), ConstValue::String("x".into()));
    /// ```
    pub fn parse_literal(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case("true") {
            return ConstValue::TRUE;
        }
        if text.eq_ignore_ascii_case("false") {
            return ConstValue::FALSE;
        }
        if let Ok(v) = text.parse::<i64>() {
            return ConstValue::Integer(v);
        }
        if let Ok(v) = text.parse::<f64>() {
            return ConstValue::Float(v);
        }
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return ConstValue::String(text[1..text.len() - 1].replace("\"\"", "\""));
        }
        ConstValue::String(text.to_string())
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Integer(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::String(s) => write!(f, "{}", s),
            ConstValue::Empty => Ok(()),
        }
    }
}

/// A case-insensitive table of conditional compilation constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantTable {
    /// Keyed by upper-cased name; keeps the name as first declared.
    entries: HashMap<String, (String, ConstValue)>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or redefines a constant.
    pub fn define(&mut self, name: impl Into<String>, value: ConstValue) {
        let name = name.into();
        let key = name.to_ascii_uppercase();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(key, (name, value));
            }
        }
    }

    /// Looks up a constant by name.
    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.entries
            .get(&name.to_ascii_uppercase())
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry of `other` into this table, shadowing duplicates.
    pub fn extend(&mut self, other: &ConstantTable) {
        for (name, value) in other.entries.values() {
            self.define(name.clone(), value.clone());
        }
    }

    /// Iterates over `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstValue)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>> FromIterator<(N, ConstValue)> for ConstantTable {
    fn from_iter<I: IntoIterator<Item = (N, ConstValue)>>(iter: I) -> Self {
        let mut table = ConstantTable::new();
        for (name, value) in iter {
            table.define(name, value);
        }
        table
    }
}

/// Major version of the host's Basic runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VbaVersion {
    Vba6,
    #[default]
    Vba7,
}

/// The platform constants every host predefines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredefinedConstants {
    pub version: VbaVersion,
    pub win64: bool,
    pub mac: bool,
}

impl PredefinedConstants {
    /// Builds the constant table for this platform.
    pub fn table(&self) -> ConstantTable {
        let windows = !self.mac;
        [
            ("VBA6", ConstValue::TRUE),
            ("VBA7", ConstValue::from_bool(self.version == VbaVersion::Vba7)),
            ("Win16", ConstValue::FALSE),
            ("Win32", ConstValue::from_bool(windows)),
            ("Win64", ConstValue::from_bool(windows && self.win64)),
            ("Mac", ConstValue::from_bool(self.mac)),
        ]
        .into_iter()
        .collect()
    }
}
