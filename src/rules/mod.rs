//! Declarative rules describing which nested collections to flatten.
//!
//! A [`Ruleset`] lists the fields of a document that are nested collections
//! to be live-tracked, each carrying its own ruleset for the documents inside
//! that collection. Rulesets are not checked against the store; callers that
//! accept rulesets from untrusted sources can validate them against a
//! [`DocumentSchema`] first.
//!
//! # Example
//!
//! ```ignore
//! let rules = Ruleset::from_json(r#"[
//!     {"collection": "items", "subcollections": [{"collection": "tags"}]}
//! ]"#)?;
//! rules.validate(&schema)?;
//! ```

mod ruleset;
mod schema;

pub use ruleset::{Rule, Ruleset};
pub use schema::DocumentSchema;
