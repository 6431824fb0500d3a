//! Composite values and the merge step.
//!
//! A node holds one [`Composite`]: the plain-field projection of what it
//! observes, with nested-collection fields filled in as its children report.
//! Children never touch the parent's value directly; they hand their own
//! composite to the parent, which splices it in and re-emits.

use crate::error::Result;
use crate::rules::Ruleset;
use crate::types::{DocumentSnapshot, Fields, Snapshot};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Merged value observed at one location.
#[derive(Clone, Debug, PartialEq)]
pub enum Composite {
    /// One document; `None` if it does not exist.
    Document(Option<Fields>),
    /// Documents of a collection, index-aligned to the latest snapshot.
    Collection(Vec<Fields>),
}

/// Where in a parent's composite a child's value belongs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The parent is a document.
    Document,
    /// The parent is a collection; position of the owning document.
    Index(usize),
}

/// Plain fields of a document, minus any field the ruleset flattens.
fn project(doc: &DocumentSnapshot, rules: &Ruleset) -> Option<Fields> {
    doc.data.as_ref().map(|data| {
        data.iter()
            .filter(|(key, _)| !rules.declares(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    })
}

impl Composite {
    /// Base projection of a snapshot: plain fields only.
    pub fn base(snapshot: &Snapshot, rules: &Ruleset) -> Self {
        match snapshot {
            Snapshot::Document(doc) => Composite::Document(project(doc, rules)),
            Snapshot::Collection(coll) => Composite::Collection(
                coll.docs
                    .iter()
                    .map(|doc| project(doc, rules).unwrap_or_default())
                    .collect(),
            ),
        }
    }

    /// Rewrite every document's projection from the snapshot payload.
    pub(crate) fn refresh(&mut self, snapshot: &Snapshot, rules: &Ruleset) {
        match (self, snapshot) {
            (Composite::Collection(out), Snapshot::Collection(coll)) => {
                out.truncate(coll.docs.len());
                for (i, doc) in coll.docs.iter().enumerate() {
                    let fields = project(doc, rules).unwrap_or_default();
                    match out.get_mut(i) {
                        Some(slot) => *slot = fields,
                        None => out.push(fields),
                    }
                }
            }
            (this, snapshot) => *this = Composite::base(snapshot, rules),
        }
    }

    /// Write a child's value into `field` at `slot`. Returns false when the
    /// slot no longer exists.
    pub(crate) fn splice(&mut self, slot: Slot, field: &str, nested: Value) -> bool {
        let target = match (self, slot) {
            (Composite::Document(Some(fields)), Slot::Document) => fields,
            (Composite::Collection(docs), Slot::Index(i)) => match docs.get_mut(i) {
                Some(fields) => fields,
                None => return false,
            },
            _ => return false,
        };
        target.insert(field.to_string(), nested);
        true
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Composite::Collection(_))
    }

    pub fn as_document(&self) -> Option<&Fields> {
        match self {
            Composite::Document(fields) => fields.as_ref(),
            Composite::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Fields]> {
        match self {
            Composite::Collection(docs) => Some(docs),
            Composite::Document(_) => None,
        }
    }

    /// JSON shape: an object (or null) for documents, an array for collections.
    pub fn to_value(&self) -> Value {
        match self {
            Composite::Document(Some(fields)) => Value::Object(fields.clone()),
            Composite::Document(None) => Value::Null,
            Composite::Collection(docs) => {
                Value::Array(docs.iter().cloned().map(Value::Object).collect())
            }
        }
    }

    /// Deserialize into a caller-defined type mirroring the expected shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl From<Composite> for Value {
    fn from(composite: Composite) -> Self {
        composite.to_value()
    }
}
