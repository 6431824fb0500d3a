//! The recursive subscription node.
//!
//! A node binds one ruleset to one location and owns one store listener.
//! On every snapshot it:
//!
//! 1. detaches every child spawned from the previous snapshot and cancels
//!    them once its own lock is released,
//! 2. emits the base projection (plain fields only),
//! 3. emits the per-document overwrite pass (in [`NotifyMode::TwoPhase`]),
//! 4. spawns one child per document per rule, one level deeper.
//!
//! Children report their composite to the parent, which splices it in at
//! the document's position (or the rule's field for a document node) and
//! re-emits its whole composite. A leaf change therefore reaches the caller
//! through one emission per ancestor.
//!
//! Each rebuild bumps the node's generation. A splice tagged with an older
//! generation, or arriving after cancel, is discarded.

use crate::composite::{Composite, Slot};
use crate::error::{FlattenError, Result};
use crate::rules::Ruleset;
use crate::store::{ListenEvent, SnapshotListener, SnapshotStore};
use crate::types::{Depth, DocumentPath, Location, Snapshot};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use super::registry::{Registry, SubscriptionHandle};
use super::types::{NotifyMode, Updater};

/// Shared by every node of one subscription tree.
pub(crate) struct Context {
    pub(crate) store: Arc<dyn SnapshotStore>,
    pub(crate) notify: NotifyMode,
}

/// Where a node sends its composite.
enum Sink {
    /// The external caller.
    Caller(Arc<dyn Updater>),
    /// The parent node, into `field` at `slot`.
    Parent {
        parent: Weak<Node>,
        generation: u64,
        slot: Slot,
        field: String,
    },
}

struct NodeState {
    composite: Option<Composite>,
    generation: u64,
    cancelled: bool,
    registry: Registry,
}

pub(crate) struct Node {
    depth: Depth,
    location: Location,
    rules: Ruleset,
    context: Arc<Context>,
    sink: Sink,
    state: Mutex<NodeState>,
}

impl Node {
    /// Create a root node reporting to `updater` and start listening.
    pub(crate) fn subscribe(
        context: Arc<Context>,
        rules: Ruleset,
        location: Location,
        depth: Depth,
        updater: Arc<dyn Updater>,
    ) -> Result<SubscriptionHandle> {
        Self::spawn(context, rules, location, depth, Sink::Caller(updater))
    }

    fn spawn(
        context: Arc<Context>,
        rules: Ruleset,
        location: Location,
        depth: Depth,
        sink: Sink,
    ) -> Result<SubscriptionHandle> {
        let node = Arc::new(Node {
            depth,
            location,
            rules,
            context,
            sink,
            state: Mutex::new(NodeState {
                composite: None,
                generation: 0,
                cancelled: false,
                registry: Registry::default(),
            }),
        });
        debug!(depth = depth.0, location = %node.location, "Subscribing");

        // The store keeps the node alive until the listener is removed.
        let listening = Arc::clone(&node);
        let listener: SnapshotListener = Arc::new(move |event| listening.on_event(event));
        let registration = node.context.store.listen(&node.location, listener)?;
        let previous = node.state.lock().registry.set_own(depth, registration);
        if let Some(previous) = previous {
            previous.remove();
        }

        Ok(SubscriptionHandle { depth, node })
    }

    pub(crate) fn location(&self) -> &Location {
        &self.location
    }

    pub(crate) fn composite(&self) -> Option<Composite> {
        self.state.lock().composite.clone()
    }

    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.state.lock().registry)
    }

    /// Stop listening and cancel every descendant. No emission follows.
    pub(crate) fn cancel(&self) {
        let registry = {
            let mut state = self.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            state.composite = None;
            std::mem::take(&mut state.registry)
        };
        debug!(depth = self.depth.0, location = %self.location, "Cancelling");
        registry.cancel_all();
    }

    fn on_event(self: &Arc<Self>, event: ListenEvent) {
        match event {
            Ok(snapshot) => self.rebuild(snapshot),
            Err(error) => {
                warn!(depth = self.depth.0, location = %self.location, %error, "Store error");
                self.report(error);
            }
        }
    }

    fn rebuild(self: &Arc<Self>, snapshot: Snapshot) {
        let documents = match self.documents(&snapshot) {
            Ok(documents) => documents,
            Err(error) => {
                warn!(depth = self.depth.0, location = %self.location, %error, "Rejected snapshot");
                self.report(error);
                return;
            }
        };

        let mut composite = Composite::base(&snapshot, &self.rules);
        let (generation, stale) = {
            let mut state = self.state.lock();
            if state.cancelled {
                return;
            }
            let stale = state.registry.take_descendants();
            state.generation += 1;
            state.composite = Some(composite.clone());
            debug!(
                depth = self.depth.0,
                location = %self.location,
                generation = state.generation,
                stale = stale.len(),
                documents = documents.len(),
                "Rebuilding"
            );
            (state.generation, stale)
        };
        // The generation is already bumped, so late splices from the stale
        // children are discarded while they detach.
        stale.cancel();

        if self.context.notify == NotifyMode::TwoPhase {
            self.emit(&composite);
        }

        composite.refresh(&snapshot, &self.rules);
        if !self.store_composite(generation, &composite) {
            return;
        }
        self.emit(&composite);

        if documents.is_empty() {
            return;
        }
        let Some(child_depth) = self.depth.child() else {
            self.report(FlattenError::InvalidDepth(self.depth.0));
            return;
        };

        let mut children = Vec::with_capacity(documents.len() * self.rules.len());
        for (slot, path) in documents {
            for rule in &self.rules {
                let location = match path.collection(&rule.collection) {
                    Ok(collection) => Location::Collection(collection),
                    Err(error) => {
                        self.report(error);
                        continue;
                    }
                };
                let sink = Sink::Parent {
                    parent: Arc::downgrade(self),
                    generation,
                    slot,
                    field: rule.collection.clone(),
                };
                match Self::spawn(
                    Arc::clone(&self.context),
                    rule.subcollections.clone(),
                    location,
                    child_depth,
                    sink,
                ) {
                    Ok(handle) => children.push(handle),
                    Err(error) => {
                        warn!(depth = self.depth.0, location = %self.location, %error, "Failed to spawn child");
                        self.report(error);
                    }
                }
            }
        }

        let rejected = {
            let mut state = self.state.lock();
            if state.cancelled || state.generation != generation {
                Some(children)
            } else {
                state.registry.adopt(self.depth, children);
                None
            }
        };
        // A newer snapshot or a cancel arrived while spawning.
        if let Some(children) = rejected {
            for handle in children {
                handle.cancel();
            }
        }
    }

    /// Documents whose nested collections get children, with their slot.
    fn documents(&self, snapshot: &Snapshot) -> Result<Vec<(Slot, DocumentPath)>> {
        match (&self.location, snapshot) {
            (Location::Document(path), Snapshot::Document(doc)) => {
                if doc.exists() && !self.rules.is_empty() {
                    Ok(vec![(Slot::Document, path.clone())])
                } else {
                    Ok(Vec::new())
                }
            }
            (Location::Collection(path), Snapshot::Collection(coll)) => {
                if self.rules.is_empty() {
                    return Ok(Vec::new());
                }
                coll.docs
                    .iter()
                    .enumerate()
                    .map(|(i, doc)| path.doc(&doc.id).map(|p| (Slot::Index(i), p)))
                    .collect()
            }
            _ => Err(FlattenError::SnapshotMismatch {
                location: self.location.to_string(),
            }),
        }
    }

    fn store_composite(&self, generation: u64, composite: &Composite) -> bool {
        let mut state = self.state.lock();
        if state.cancelled || state.generation != generation {
            return false;
        }
        state.composite = Some(composite.clone());
        true
    }

    /// Splice a child's composite in and re-emit.
    fn splice(&self, generation: u64, slot: Slot, field: &str, nested: &Composite) {
        let composite = {
            let mut state = self.state.lock();
            if state.cancelled || state.generation != generation {
                trace!(depth = self.depth.0, location = %self.location, field, "Discarding stale splice");
                return;
            }
            let Some(composite) = state.composite.as_mut() else {
                return;
            };
            if !composite.splice(slot, field, nested.to_value()) {
                return;
            }
            composite.clone()
        };
        trace!(depth = self.depth.0, location = %self.location, field, "Spliced child");
        self.emit(&composite);
    }

    fn emit(&self, composite: &Composite) {
        if self.state.lock().cancelled {
            return;
        }
        match &self.sink {
            Sink::Caller(updater) => {
                trace!(location = %self.location, "Notifying caller");
                updater.update(composite);
            }
            Sink::Parent {
                parent,
                generation,
                slot,
                field,
            } => {
                if let Some(parent) = parent.upgrade() {
                    parent.splice(*generation, *slot, field, composite);
                }
            }
        }
    }

    /// Forward an error to the caller through every ancestor.
    fn report(&self, error: FlattenError) {
        if self.state.lock().cancelled {
            return;
        }
        match &self.sink {
            Sink::Caller(updater) => updater.on_error(&error),
            Sink::Parent { parent, .. } => {
                if let Some(parent) = parent.upgrade() {
                    parent.report(error);
                }
            }
        }
    }
}
