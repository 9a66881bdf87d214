//! Typed feature/context values exchanged between decision stages.
//!
//! Replaces loose per-stage dictionaries with one explicit value type.
//! A field that no stage produced resolves to `FieldValue::Absent`, and
//! every rule operator treats `Absent` as a non-match.

use std::collections::BTreeMap;

/// One typed context value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum FieldValue {
    /// Field was never set by any stage.
    #[default]
    Absent,
    Number(f64),
    Bool(bool),
    Text(String),
    /// A list of text values (e.g. reputation tags).
    List(Vec<String>),
    /// A nested map, addressable via dot paths.
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Numeric view; booleans coerce to 0/1, text parses if it is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(t) => t.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(t: &str) -> Self {
        FieldValue::Text(t.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(t: String) -> Self {
        FieldValue::Text(t)
    }
}

/// Ordered map of named context fields.
///
/// Rule conditions address fields by dot-separated paths
/// (`reputation.risk_numeric`); a path that does not resolve yields
/// `FieldValue::Absent`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMap(BTreeMap<String, FieldValue>);

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Resolves a dot-separated path.
    pub fn get(&self, path: &str) -> FieldValue {
        let mut segments = path.split('.');
        let first = match segments.next() {
            Some(s) => s,
            None => return FieldValue::Absent,
        };
        let mut current = match self.0.get(first) {
            Some(v) => v,
            None => return FieldValue::Absent,
        };
        for segment in segments {
            match current {
                FieldValue::Map(inner) => match inner.get(segment) {
                    Some(v) => current = v,
                    None => return FieldValue::Absent,
                },
                _ => return FieldValue::Absent,
            }
        }
        current.clone()
    }

    /// Merges another map into this one; colliding keys take the other side.
    pub fn merge(&mut self, other: FeatureMap) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FieldValue)> for FeatureMap {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
