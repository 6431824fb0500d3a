//! In-memory hierarchical document store.

use super::{ListenEvent, ListenerRegistration, SnapshotListener, SnapshotStore};
use crate::error::{FlattenError, Result};
use crate::types::{
    CollectionPath, CollectionSnapshot, DocumentPath, DocumentSnapshot, Fields, Location, Snapshot,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identifier of one attached listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ListenerId(u64);

struct Listener {
    location: Location,
    callback: SnapshotListener,
}

/// Pending notifications. Only the outermost caller drains the queue, so a
/// callback that writes to the store or attaches listeners never re-enters
/// another callback.
#[derive(Default)]
struct Dispatch {
    queue: VecDeque<(ListenerId, ListenEvent)>,
    running: bool,
}

struct Inner {
    /// Documents by collection, ordered by id.
    collections: RwLock<HashMap<CollectionPath, BTreeMap<String, Fields>>>,
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
    dispatch: Mutex<Dispatch>,
}

/// Hierarchical document store held in memory.
///
/// Collections list their documents ordered by id. Writing a document
/// notifies listeners on that document and on its parent collection; nested
/// collections are independent and writing into them does not notify the
/// owning document.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                dispatch: Mutex::new(Dispatch::default()),
            }),
        }
    }

    // --- Writes ---

    /// Replace a document's fields. `data` must be a JSON object.
    pub fn set(&self, path: &DocumentPath, data: Value) -> Result<()> {
        let fields = into_fields(data)?;
        self.inner
            .collections
            .write()
            .entry(path.parent())
            .or_default()
            .insert(path.id().to_string(), fields);
        self.inner.notify_document(path);
        Ok(())
    }

    /// Shallow-merge fields into a document, creating it if missing.
    pub fn merge(&self, path: &DocumentPath, data: Value) -> Result<()> {
        let fields = into_fields(data)?;
        {
            let mut collections = self.inner.collections.write();
            let doc = collections
                .entry(path.parent())
                .or_default()
                .entry(path.id().to_string())
                .or_default();
            doc.extend(fields);
        }
        self.inner.notify_document(path);
        Ok(())
    }

    /// Delete a document. Its nested collections are left in place.
    /// Returns whether the document existed.
    pub fn delete(&self, path: &DocumentPath) -> bool {
        let existed = self
            .inner
            .collections
            .write()
            .get_mut(&path.parent())
            .map(|docs| docs.remove(path.id()).is_some())
            .unwrap_or(false);
        if existed {
            self.inner.notify_document(path);
        }
        existed
    }

    /// Deliver a failure to every listener attached to `location`.
    pub fn fail(&self, location: &Location, message: &str) {
        let error = FlattenError::Listen {
            location: location.to_string(),
            message: message.to_string(),
        };
        let targets: Vec<ListenerId> = self
            .inner
            .listeners
            .read()
            .iter()
            .filter(|(_, listener)| &listener.location == location)
            .map(|(id, _)| *id)
            .collect();
        {
            let mut dispatch = self.inner.dispatch.lock();
            for id in targets {
                dispatch.queue.push_back((id, Err(error.clone())));
            }
        }
        self.inner.drain();
    }

    // --- Reads ---

    /// Current fields of a document.
    pub fn get(&self, path: &DocumentPath) -> Option<Fields> {
        self.inner
            .collections
            .read()
            .get(&path.parent())
            .and_then(|docs| docs.get(path.id()).cloned())
    }

    /// Current documents of a collection, ordered by id.
    pub fn list(&self, path: &CollectionPath) -> Vec<DocumentSnapshot> {
        self.inner.collection_snapshot(path).docs
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Number of listeners attached to `location`.
    pub fn listeners_at(&self, location: &Location) -> usize {
        self.inner
            .listeners
            .read()
            .values()
            .filter(|listener| &listener.location == location)
            .count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemoryStore {
    fn listen(
        &self,
        location: &Location,
        listener: SnapshotListener,
    ) -> Result<ListenerRegistration> {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner.listeners.write().insert(
            id,
            Listener {
                location: location.clone(),
                callback: listener,
            },
        );

        let snapshot = self.inner.snapshot(location);
        self.inner.dispatch.lock().queue.push_back((id, Ok(snapshot)));
        self.inner.drain();

        let store: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(ListenerRegistration::new(move || {
            if let Some(inner) = store.upgrade() {
                // Dropped after the write lock: the callback may own the
                // last reference to its subscriber.
                let removed = inner.listeners.write().remove(&id);
                drop(removed);
            }
        }))
    }
}

impl Inner {
    fn snapshot(&self, location: &Location) -> Snapshot {
        match location {
            Location::Document(path) => Snapshot::Document(self.document_snapshot(path)),
            Location::Collection(path) => Snapshot::Collection(self.collection_snapshot(path)),
        }
    }

    fn document_snapshot(&self, path: &DocumentPath) -> DocumentSnapshot {
        let data = self
            .collections
            .read()
            .get(&path.parent())
            .and_then(|docs| docs.get(path.id()).cloned());
        DocumentSnapshot {
            id: path.id().to_string(),
            data,
        }
    }

    fn collection_snapshot(&self, path: &CollectionPath) -> CollectionSnapshot {
        let collections = self.collections.read();
        let docs = collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| DocumentSnapshot {
                        id: id.clone(),
                        data: Some(fields.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        CollectionSnapshot { docs }
    }

    /// Queue snapshots for listeners affected by a write to `path`, then
    /// deliver.
    fn notify_document(&self, path: &DocumentPath) {
        let doc_location = Location::Document(path.clone());
        let coll_location = Location::Collection(path.parent());

        let targets: Vec<(ListenerId, Location)> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, l)| l.location == doc_location || l.location == coll_location)
            .map(|(id, l)| (*id, l.location.clone()))
            .collect();

        if !targets.is_empty() {
            let mut snapshots: HashMap<Location, Snapshot> = HashMap::new();
            for (_, location) in &targets {
                if !snapshots.contains_key(location) {
                    snapshots.insert(location.clone(), self.snapshot(location));
                }
            }

            let mut dispatch = self.dispatch.lock();
            for (id, location) in targets {
                if let Some(snapshot) = snapshots.get(&location) {
                    dispatch.queue.push_back((id, Ok(snapshot.clone())));
                }
            }
        }
        self.drain();
    }

    /// Deliver queued notifications in FIFO order. Events for listeners
    /// removed while queued are discarded.
    fn drain(&self) {
        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.running {
                return;
            }
            dispatch.running = true;
        }
        let _guard = PanicGuard(self);

        loop {
            let next = {
                let mut dispatch = self.dispatch.lock();
                match dispatch.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        dispatch.running = false;
                        break;
                    }
                }
            };
            let (id, event) = next;
            let callback = self.listeners.read().get(&id).map(|l| Arc::clone(&l.callback));
            if let Some(callback) = callback {
                callback(event);
            }
        }
    }
}

/// Clears the dispatching flag if a callback panics mid-drain.
struct PanicGuard<'a>(&'a Inner);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.dispatch.lock().running = false;
        }
    }
}

fn into_fields(data: Value) -> Result<Fields> {
    match data {
        Value::Object(fields) => Ok(fields),
        other => Err(FlattenError::Serialization(format!(
            "document data must be a JSON object, got {}",
            other
        ))),
    }
}
