//! Document schemas for validating rulesets.

use super::ruleset::{join, Ruleset};
use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Shape of a document type: its plain fields and its nested collections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSchema {
    /// Plain field names.
    #[serde(default)]
    pub fields: BTreeSet<String>,

    /// Nested collections, each with the schema of its documents.
    #[serde(default)]
    pub collections: BTreeMap<String, DocumentSchema>,
}

impl DocumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into());
        self
    }

    /// Add a nested collection.
    pub fn collection(mut self, name: impl Into<String>, schema: DocumentSchema) -> Self {
        self.collections.insert(name.into(), schema);
        self
    }

    /// Field names a fully delivered composite for this document carries:
    /// plain fields plus the collections `rules` flattens.
    pub fn expected_fields(&self, rules: &Ruleset) -> BTreeSet<String> {
        let mut expected = self.fields.clone();
        expected.extend(rules.collection_names().map(str::to_string));
        expected
    }
}

impl Ruleset {
    /// Reject rules naming collections the schema does not declare.
    pub fn validate(&self, schema: &DocumentSchema) -> Result<()> {
        self.check()?;
        validate_at(self, schema, "")
    }
}

fn validate_at(rules: &Ruleset, schema: &DocumentSchema, prefix: &str) -> Result<()> {
    for rule in rules {
        let path = join(prefix, &rule.collection);
        let nested = schema
            .collections
            .get(&rule.collection)
            .ok_or_else(|| FlattenError::UnknownCollection { path: path.clone() })?;
        validate_at(&rule.subcollections, nested, &path)?;
    }
    Ok(())
}
