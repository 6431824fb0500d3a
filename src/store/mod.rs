//! The push-notification store the engine observes.
//!
//! The engine needs exactly one capability from a store: attach a listener
//! to a [`Location`] and later detach it. Everything else (transport,
//! queries, change detection) belongs to the store.
//!
//! [`MemoryStore`] is an in-process hierarchical store implementing
//! [`SnapshotStore`], used for embedding and tests.

mod memory;

pub use memory::MemoryStore;

use crate::error::{FlattenError, Result};
use crate::types::{Location, Snapshot};
use std::fmt;
use std::sync::Arc;

/// What a store delivers to a listener: a fresh snapshot, or a failure.
pub type ListenEvent = std::result::Result<Snapshot, FlattenError>;

/// Callback invoked on every change at a location.
pub type SnapshotListener = Arc<dyn Fn(ListenEvent) + Send + Sync>;

/// A store that pushes snapshots to listeners.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Attach `listener` to `location`. The store delivers the current state
    /// once, then again on every change, until the registration is removed.
    fn listen(&self, location: &Location, listener: SnapshotListener)
        -> Result<ListenerRegistration>;
}

impl<S: SnapshotStore> SnapshotStore for Arc<S> {
    fn listen(
        &self,
        location: &Location,
        listener: SnapshotListener,
    ) -> Result<ListenerRegistration> {
        (**self).listen(location, listener)
    }
}

/// Capability to detach one listener. Consumed on removal.
pub struct ListenerRegistration {
    detach: Box<dyn FnOnce() + Send>,
}

impl ListenerRegistration {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Box::new(detach),
        }
    }

    /// Stop delivery to the listener.
    pub fn remove(self) {
        (self.detach)()
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ListenerRegistration")
    }
}
