//! Logical-database classifiers
//!
//! A classifier is the key-value identity a caller uses to name a logical
//! database ("the orders database of this microservice in this namespace").
//! Entries are kept in a canonical sorted form so that equality, hashing and
//! serialization never depend on insertion order.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar value of one classifier entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassifierValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for ClassifierValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ClassifierValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ClassifierValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ClassifierValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl fmt::Display for ClassifierValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
        }
    }
}

/// Identity of a logical database as an ordered set of key-value pairs.
///
/// Two classifiers are equal iff their entries are equal as sets,
/// case-sensitive and independent of construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classifier {
    entries: BTreeMap<String, ClassifierValue>,
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ClassifierValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ClassifierValue>) {
        self.entries.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ClassifierValue> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in canonical (sorted-by-key) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassifierValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<'a> IntoIterator for &'a Classifier {
    type Item = (&'a String, &'a ClassifierValue);
    type IntoIter = btree_map::Iter<'a, String, ClassifierValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, "}}")
    }
}
