//! Core types: depths, paths, locations and snapshots.

use crate::error::{FlattenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plain document fields.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Nesting level of a subscription node. The root is at depth 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Depth(pub u32);

impl Depth {
    pub const ROOT: Depth = Depth(1);

    /// Depth of a node's children, or None at `u32::MAX`.
    pub fn child(self) -> Option<Self> {
        self.0.checked_add(1).map(Depth)
    }
}

impl Default for Depth {
    fn default() -> Self {
        Depth::ROOT
    }
}

impl fmt::Debug for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Depth({})", self.0)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn split_segments(path: &str) -> Result<Vec<String>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(FlattenError::InvalidPath(path.to_string()));
    }
    let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FlattenError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') {
        return Err(FlattenError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

/// Validate already-split segments, e.g. from a deserialized path.
fn check_segments(segments: &[String], even: bool) -> Result<()> {
    let invalid = || FlattenError::InvalidPath(segments.join("/"));
    if segments.is_empty() || (segments.len() % 2 == 0) != even {
        return Err(invalid());
    }
    for segment in segments {
        check_segment(segment).map_err(|_| invalid())?;
    }
    Ok(())
}

/// Path to a collection: an odd number of segments, e.g. `users/alice/items`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct CollectionPath(Vec<String>);

impl TryFrom<Vec<String>> for CollectionPath {
    type Error = FlattenError;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        check_segments(&segments, false)?;
        Ok(CollectionPath(segments))
    }
}

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: &str) -> Result<Self> {
        check_segment(name)?;
        Ok(CollectionPath(vec![name.to_string()]))
    }

    /// Parse a slash-separated path.
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 == 0 {
            return Err(FlattenError::InvalidPath(path.to_string()));
        }
        Ok(CollectionPath(segments))
    }

    /// The document with `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        check_segment(id)?;
        let mut segments = self.0.clone();
        segments.push(id.to_string());
        Ok(DocumentPath(segments))
    }

    /// Collection name (last segment).
    pub fn name(&self) -> &str {
        // Never empty: constructors reject empty paths.
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// The document owning this collection, if nested.
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.0.len() < 3 {
            return None;
        }
        Some(DocumentPath(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl fmt::Debug for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionPath({})", self)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Path to a single document: an even number of segments, e.g. `users/alice`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct DocumentPath(Vec<String>);

impl TryFrom<Vec<String>> for DocumentPath {
    type Error = FlattenError;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        check_segments(&segments, true)?;
        Ok(DocumentPath(segments))
    }
}

impl DocumentPath {
    /// Parse a slash-separated path.
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(FlattenError::InvalidPath(path.to_string()));
        }
        Ok(DocumentPath(segments))
    }

    /// The nested collection `name` under this document.
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        check_segment(name)?;
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Ok(CollectionPath(segments))
    }

    /// Document id (last segment).
    pub fn id(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// The collection containing this document.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath(self.0[..self.0.len() - 1].to_vec())
    }
}

impl fmt::Debug for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentPath({})", self)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// A place in the store a node can listen to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Document(DocumentPath),
    Collection(CollectionPath),
}

impl Location {
    pub fn is_collection(&self) -> bool {
        matches!(self, Location::Collection(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document(path) => write!(f, "{}", path),
            Location::Collection(path) => write!(f, "{}", path),
        }
    }
}

impl From<DocumentPath> for Location {
    fn from(path: DocumentPath) -> Self {
        Location::Document(path)
    }
}

impl From<CollectionPath> for Location {
    fn from(path: CollectionPath) -> Self {
        Location::Collection(path)
    }
}

/// State of one document at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    /// Plain fields; `None` if the document does not exist.
    pub data: Option<Fields>,
}

impl DocumentSnapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}

/// Ordered documents of a collection at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub docs: Vec<DocumentSnapshot>,
}

/// Payload delivered by the store on every observed change.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    Document(DocumentSnapshot),
    Collection(CollectionSnapshot),
}
