//! Rule and ruleset types.

use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One nested collection to flatten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Field name of the nested collection.
    pub collection: String,

    /// Rules for the documents inside the collection.
    #[serde(default, skip_serializing_if = "Ruleset::is_empty")]
    pub subcollections: Ruleset,
}

impl Rule {
    /// Flatten `collection` with no further nesting.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            subcollections: Ruleset::default(),
        }
    }

    /// Flatten `collection` and, inside it, `subcollections`.
    pub fn nested(collection: impl Into<String>, subcollections: Ruleset) -> Self {
        Self {
            collection: collection.into(),
            subcollections,
        }
    }
}

/// Ordered list of rules. Empty means "flatten nothing beyond plain fields".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ruleset(pub Vec<Rule>);

impl Ruleset {
    pub fn new(rules: Vec<Rule>) -> Self {
        Ruleset(rules)
    }

    /// Parse a ruleset from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.0.iter()
    }

    /// Collection field names declared at this level.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|rule| rule.collection.as_str())
    }

    /// Whether `field` is declared as a nested collection at this level.
    pub fn declares(&self, field: &str) -> bool {
        self.0.iter().any(|rule| rule.collection == field)
    }

    /// Number of nested levels below the document this ruleset applies to.
    pub fn depth(&self) -> u32 {
        self.0
            .iter()
            .map(|rule| 1 + rule.subcollections.depth())
            .max()
            .unwrap_or(0)
    }

    /// Structural checks that need no schema: non-empty names, no duplicates.
    pub fn check(&self) -> Result<()> {
        self.check_at("")
    }

    pub(crate) fn check_at(&self, prefix: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.0 {
            if rule.collection.is_empty() {
                return Err(FlattenError::EmptyCollectionName);
            }
            let path = join(prefix, &rule.collection);
            if !seen.insert(rule.collection.as_str()) {
                return Err(FlattenError::DuplicateRule { path });
            }
            rule.subcollections.check_at(&path)?;
        }
        Ok(())
    }
}

pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

impl From<Vec<Rule>> for Ruleset {
    fn from(rules: Vec<Rule>) -> Self {
        Ruleset(rules)
    }
}

impl<'a> IntoIterator for &'a Ruleset {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
