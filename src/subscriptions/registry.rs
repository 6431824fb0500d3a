//! Per-node lifecycle registry.
//!
//! Each node owns its own listener registration and the handles of the
//! children it spawned from its latest snapshot. Handles are tagged with
//! their depth; children always sit exactly one level below their owner.

use crate::composite::Composite;
use crate::store::ListenerRegistration;
use crate::types::{Depth, Location};
use std::sync::Arc;

use super::node::Node;

/// Capability to stop one node and everything it owns.
///
/// Cancelling consumes the handle. Dropping a handle without cancelling
/// leaves the subtree listening.
pub struct SubscriptionHandle {
    pub(crate) depth: Depth,
    pub(crate) node: Arc<Node>,
}

impl SubscriptionHandle {
    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn location(&self) -> &Location {
        self.node.location()
    }

    /// The node's current composite (None before the first snapshot).
    pub fn composite(&self) -> Option<Composite> {
        self.node.composite()
    }

    /// Number of children spawned from the latest snapshot.
    pub fn child_count(&self) -> usize {
        self.node.with_registry(Registry::child_count)
    }

    /// Handles this node holds at `depth`: its own at its depth, its
    /// children's one level below.
    pub fn handles_at(&self, depth: Depth) -> usize {
        self.node.with_registry(|registry| registry.len_at(depth))
    }

    /// Live store listeners in this subtree, this node included.
    pub fn listener_count(&self) -> usize {
        self.node.with_registry(Registry::listener_count)
    }

    /// Stop this node's listener, then every descendant's.
    pub fn cancel(self) {
        self.node.cancel();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("depth", &self.depth)
            .field("location", self.node.location())
            .finish()
    }
}

/// Children taken out of a registry, not yet cancelled.
#[must_use]
pub(crate) struct Descendants(Vec<SubscriptionHandle>);

impl Descendants {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Cancel every handle. Returns how many were cancelled.
    pub(crate) fn cancel(self) -> usize {
        let count = self.0.len();
        for handle in self.0 {
            handle.cancel();
        }
        count
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    own: Option<(Depth, ListenerRegistration)>,
    children: Vec<SubscriptionHandle>,
}

impl Registry {
    /// Record the owner's registration. Returns the one it replaces, which
    /// the caller removes once no lock is held.
    pub(crate) fn set_own(
        &mut self,
        depth: Depth,
        registration: ListenerRegistration,
    ) -> Option<ListenerRegistration> {
        self.own
            .replace((depth, registration))
            .map(|(_, previous)| previous)
    }

    /// Record children spawned by a node at `owner`.
    pub(crate) fn adopt(&mut self, owner: Depth, handles: Vec<SubscriptionHandle>) {
        debug_assert!(handles.iter().all(|h| Some(h.depth) == owner.child()));
        self.children.extend(handles);
    }

    /// Selective cancel, first half: detach every handle below the owner's
    /// depth. The owner's own listener stays attached. The caller cancels
    /// the returned handles once no lock is held.
    pub(crate) fn take_descendants(&mut self) -> Descendants {
        Descendants(std::mem::take(&mut self.children))
    }

    /// Full cancel: own listener first, then all children.
    pub(crate) fn cancel_all(mut self) {
        if let Some((_, registration)) = self.own.take() {
            registration.remove();
        }
        self.take_descendants().cancel();
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Handles tagged with `depth`.
    pub(crate) fn len_at(&self, depth: Depth) -> usize {
        let own = matches!(self.own, Some((d, _)) if d == depth) as usize;
        own + self.children.iter().filter(|h| h.depth == depth).count()
    }

    pub(crate) fn listener_count(&self) -> usize {
        let own = self.own.is_some() as usize;
        own + self
            .children
            .iter()
            .map(|h| h.node.with_registry(Registry::listener_count))
            .sum::<usize>()
    }
}
