//! In-process listener registry shared by store implementations.
//!
//! # Responsibility
//! - Track live listeners per `(scope, collection)`.
//! - Compute per-record changes between consecutive snapshots.
//! - Deliver snapshots and errors without holding the registry lock.
//!
//! # Invariants
//! - A released listener is marked inactive before it leaves the registry,
//!   and delivery re-checks the flag under the listener's own lock.
//! - Listeners may release any subscription, including their own, from
//!   inside a callback.
//! - Each delivery carries the commit sequence it was read at; a delivery
//!   no newer than the last one pushed to the same listener is dropped.

use crate::model::pair::PairKey;
use crate::model::record::{RecordId, StoredRecord};
use crate::store::{
    lock_unpoisoned, ChangeKind, Listener, OrderBy, RecordChange, RecordSet, StoreResult,
    StreamEvent, Subscription,
};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Default)]
struct HubInner {
    next_id: u64,
    targets: BTreeMap<u64, Arc<ListenerTarget>>,
}

/// Registry of live listeners.
#[derive(Default)]
pub struct ListenerHub {
    inner: Arc<Mutex<HubInner>>,
}

struct Sink {
    listener: Listener,
    previous: Option<HashMap<RecordId, StoredRecord>>,
    last_commit: Option<u64>,
}

/// One registered listener and its delivery state.
pub struct ListenerTarget {
    scope: PairKey,
    collection: String,
    order: OrderBy,
    active: AtomicBool,
    sink: Mutex<Sink>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns it with its release handle.
    pub fn register(
        &self,
        scope: &PairKey,
        collection: &str,
        order: OrderBy,
        listener: Listener,
    ) -> (Arc<ListenerTarget>, Subscription) {
        let target = Arc::new(ListenerTarget {
            scope: scope.clone(),
            collection: collection.to_string(),
            order,
            active: AtomicBool::new(true),
            sink: Mutex::new(Sink {
                listener,
                previous: None,
                last_commit: None,
            }),
        });

        let id = {
            let mut inner = lock_unpoisoned(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.targets.insert(id, Arc::clone(&target));
            id
        };
        debug!(
            "event=listener_register module=store status=ok listener_id={} collection={}",
            id, collection
        );

        let hub: Weak<Mutex<HubInner>> = Arc::downgrade(&self.inner);
        let released = Arc::clone(&target);
        let subscription = Subscription::new(move || {
            released.active.store(false, Ordering::SeqCst);
            if let Some(hub) = hub.upgrade() {
                lock_unpoisoned(&hub).targets.remove(&id);
            }
            debug!(
                "event=listener_release module=store status=ok listener_id={}",
                id
            );
        });

        (target, subscription)
    }

    /// Returns active listeners for one collection, in registration order.
    pub fn targets(&self, scope: &PairKey, collection: &str) -> Vec<Arc<ListenerTarget>> {
        lock_unpoisoned(&self.inner)
            .targets
            .values()
            .filter(|target| {
                target.is_active() && &target.scope == scope && target.collection == collection
            })
            .cloned()
            .collect()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.inner).targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListenerTarget {
    pub fn scope(&self) -> &PairKey {
        &self.scope
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn order(&self) -> &OrderBy {
        &self.order
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Pushes one query result read at `commit` to the listener.
    ///
    /// Successful results carry the changes since the last successful
    /// delivery; the first delivery reports every record as added. Results
    /// read before the last delivered commit are stale and skipped.
    pub fn deliver(&self, commit: u64, result: StoreResult<Vec<StoredRecord>>) {
        let mut sink = lock_unpoisoned(&self.sink);
        if !self.is_active() {
            return;
        }
        if sink.last_commit.is_some_and(|last| commit <= last) {
            debug!(
                "event=snapshot_push module=store status=skipped collection={} commit={}",
                self.collection, commit
            );
            return;
        }
        sink.last_commit = Some(commit);

        let event = match result {
            Ok(records) => {
                let changes = diff_records(sink.previous.as_ref(), &records);
                sink.previous = Some(
                    records
                        .iter()
                        .map(|record| (record.id.clone(), record.clone()))
                        .collect(),
                );
                StreamEvent::Snapshot(RecordSet { records, changes })
            }
            Err(err) => StreamEvent::Error(err),
        };
        (sink.listener)(event);
    }
}

fn diff_records(
    previous: Option<&HashMap<RecordId, StoredRecord>>,
    current: &[StoredRecord],
) -> Vec<RecordChange> {
    let mut changes = Vec::new();
    for record in current {
        let kind = match previous.and_then(|map| map.get(&record.id)) {
            None => Some(ChangeKind::Added),
            Some(old) if old != record => Some(ChangeKind::Modified),
            Some(_) => None,
        };
        if let Some(kind) = kind {
            changes.push(RecordChange {
                kind,
                id: record.id.clone(),
            });
        }
    }

    if let Some(previous) = previous {
        let mut removed: Vec<&RecordId> = previous
            .keys()
            .filter(|id| !current.iter().any(|record| &record.id == *id))
            .collect();
        removed.sort();
        changes.extend(removed.into_iter().map(|id| RecordChange {
            kind: ChangeKind::Removed,
            id: id.clone(),
        }));
    }

    changes
}
