//! # Subcollection Flattener
//!
//! Keeps one merged, continuously-updated value in sync with a hierarchical
//! document store, where documents own nested collections to any depth.
//!
//! ## Core Concepts
//!
//! - **Rules**: Which nested collections to flatten, recursively
//! - **Nodes**: One live listener per watched location, owning its children
//! - **Composite**: Plain fields merged with flattened nested results
//! - **Store**: Any push-based source implementing [`SnapshotStore`]
//!
//! ## Example
//!
//! ```ignore
//! use subflatten::{Composite, DocumentPath, Flattener, MemoryStore, Rule, Ruleset};
//!
//! let store = MemoryStore::new();
//! let user = DocumentPath::parse("users/alice")?;
//! store.set(&user, json!({"name": "Alice"}))?;
//! store.set(&user.collection("items")?.doc("1")?, json!({"val": 10}))?;
//!
//! let rules = Ruleset::new(vec![Rule::new("items")]);
//! let handle = Flattener::new(store.clone()).subscribe(rules, user, |c: &Composite| {
//!     // {"name": "Alice", "items": [{"val": 10}]}
//!     println!("{}", c.to_value());
//! })?;
//!
//! handle.cancel();
//! ```

pub mod composite;
pub mod error;
pub mod rules;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use composite::Composite;
pub use error::{FlattenError, Result};
pub use rules::{DocumentSchema, Rule, Ruleset};
pub use store::{ListenEvent, ListenerRegistration, MemoryStore, SnapshotListener, SnapshotStore};
pub use subscriptions::{
    ChannelSubscription, FlattenConfig, FlattenEvent, Flattener, NotifyMode, SubscriptionHandle,
    Updater,
};
pub use types::*;
