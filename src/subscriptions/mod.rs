//! Live subscription trees over nested collections.
//!
//! A [`Flattener`] turns a [`Ruleset`](crate::rules::Ruleset) and a root
//! location into a tree of nodes, one per location being watched:
//! - the root node listens to the root document or collection
//! - every document it sees gets one child per rule, listening to that
//!   document's nested collection
//! - children report upward, so the caller sees one merged composite
//!
//! Any change at one level tears down and rebuilds every level below it.
//!
//! # Example
//!
//! ```ignore
//! let flattener = Flattener::new(store.clone());
//! let rules = Ruleset::new(vec![Rule::new("items")]);
//!
//! let handle = flattener.subscribe(rules, DocumentPath::parse("users/a")?, |c: &Composite| {
//!     println!("{}", c.to_value());
//! })?;
//!
//! // ... later
//! handle.cancel();
//! ```

mod flattener;
mod node;
mod registry;
mod types;

pub use flattener::Flattener;
pub use registry::SubscriptionHandle;
pub use types::{ChannelSubscription, FlattenConfig, FlattenEvent, NotifyMode, Updater};
