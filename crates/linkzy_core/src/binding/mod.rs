//! Live collection binding.
//!
//! # Responsibility
//! - Hold one push subscription over a feature sub-collection in a pair scope.
//! - Keep the latest decoded snapshot and connection status for the view.
//! - Forward create/update/upsert/delete writes to the store.
//!
//! # Invariants
//! - Rows failing schema validation never reach the snapshot.
//! - Once `close` returns, no further push is applied to the snapshot.
//! - A stream error leaves the last good snapshot in place and marks the
//!   binding `Disconnected`; later pushes are ignored until a new binding
//!   opens for the scope. There is no automatic retry.

use crate::model::pair::PairKey;
use crate::model::record::{encode_fields, FeatureRecord, FeatureSchema, Fields, RecordId};
use crate::store::{
    lock_unpoisoned, OrderBy, RealtimeStore, StoreError, StoreResult, StreamEvent, Subscription,
};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

/// Store handle shared by every binding of one application.
pub type SharedStore = Arc<dyn RealtimeStore + Send + Sync>;

/// Connection status of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingStatus {
    /// Subscribed, first snapshot not yet received.
    Connecting,
    Live,
    /// Stream failed; the snapshot is stale until the scope is re-established.
    Disconnected { message: String },
}

struct BindingState<T> {
    records: Vec<FeatureRecord<T>>,
    status: BindingStatus,
    closed: bool,
    revision: u64,
    skipped: usize,
}

impl<T> Default for BindingState<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            status: BindingStatus::Connecting,
            closed: false,
            revision: 0,
            skipped: 0,
        }
    }
}

/// Typed live view of one sub-collection, ordered by server timestamp.
pub struct LiveCollection<T: FeatureSchema> {
    store: SharedStore,
    scope: PairKey,
    state: Arc<Mutex<BindingState<T>>>,
    subscription: Option<Subscription>,
}

impl<T: FeatureSchema> LiveCollection<T> {
    /// Subscribes to `T::COLLECTION` inside `scope`.
    pub fn open(store: SharedStore, scope: PairKey) -> Self {
        let state: Arc<Mutex<BindingState<T>>> = Arc::new(Mutex::new(BindingState::default()));
        let sink = Arc::clone(&state);
        let subscription = store.subscribe(
            &scope,
            T::COLLECTION,
            OrderBy::timestamp(T::DIRECTION),
            Box::new(move |event| apply_event(&sink, event)),
        );
        info!(
            "event=binding_open module=binding status=ok collection={}",
            T::COLLECTION
        );

        Self {
            store,
            scope,
            state,
            subscription: Some(subscription),
        }
    }

    pub fn scope(&self) -> &PairKey {
        &self.scope
    }

    /// Latest validated snapshot in subscription order.
    pub fn records(&self) -> Vec<FeatureRecord<T>> {
        lock_unpoisoned(&self.state).records.clone()
    }

    pub fn record(&self, id: &RecordId) -> Option<FeatureRecord<T>> {
        lock_unpoisoned(&self.state)
            .records
            .iter()
            .find(|record| &record.id == id)
            .cloned()
    }

    pub fn status(&self) -> BindingStatus {
        lock_unpoisoned(&self.state).status.clone()
    }

    /// Counter bumped on every applied push, snapshot or error.
    pub fn revision(&self) -> u64 {
        lock_unpoisoned(&self.state).revision
    }

    /// Rows dropped by boundary validation in the latest snapshot.
    pub fn skipped(&self) -> usize {
        lock_unpoisoned(&self.state).skipped
    }

    pub fn is_closed(&self) -> bool {
        lock_unpoisoned(&self.state).closed
    }

    pub fn create(&self, data: &T) -> StoreResult<RecordId> {
        self.ensure_open()?;
        let fields = encode_fields(data)?;
        self.store.create(&self.scope, T::COLLECTION, fields)
    }

    /// Overwrites the given top-level fields of one record.
    pub fn update_fields(&self, id: &RecordId, fields: Fields) -> StoreResult<()> {
        self.ensure_open()?;
        self.store.update(&self.scope, T::COLLECTION, id, fields)
    }

    /// Writes `data` under a caller-chosen id, merging into any existing record.
    pub fn upsert(&self, id: &RecordId, data: &T) -> StoreResult<()> {
        self.ensure_open()?;
        let fields = encode_fields(data)?;
        self.store.upsert(&self.scope, T::COLLECTION, id, fields)
    }

    pub fn delete(&self, id: &RecordId) -> StoreResult<()> {
        self.ensure_open()?;
        self.store.delete(&self.scope, T::COLLECTION, id)
    }

    /// Stops applying pushes and releases the subscription.
    pub fn close(&mut self) {
        lock_unpoisoned(&self.state).closed = true;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            info!(
                "event=binding_close module=binding status=ok collection={}",
                T::COLLECTION
            );
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Unavailable("binding is closed".to_string()));
        }
        Ok(())
    }
}

impl<T: FeatureSchema> Drop for LiveCollection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_event<T: FeatureSchema>(state: &Mutex<BindingState<T>>, event: StreamEvent) {
    let mut state = lock_unpoisoned(state);
    if state.closed {
        return;
    }

    match event {
        StreamEvent::Snapshot(_) if matches!(state.status, BindingStatus::Disconnected { .. }) => {
            debug!(
                "event=snapshot_apply module=binding status=skipped collection={} reason=disconnected",
                T::COLLECTION
            );
            return;
        }
        StreamEvent::Snapshot(set) => {
            let mut records = Vec::with_capacity(set.records.len());
            let mut skipped = 0;
            for raw in &set.records {
                match FeatureRecord::<T>::decode(raw) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        skipped += 1;
                        warn!(
                            "event=record_decode module=binding status=error collection={} record_id={} error={}",
                            T::COLLECTION,
                            raw.id,
                            err
                        );
                    }
                }
            }
            debug!(
                "event=snapshot_apply module=binding status=ok collection={} records={} changes={}",
                T::COLLECTION,
                records.len(),
                set.changes.len()
            );
            state.records = records;
            state.skipped = skipped;
            state.status = BindingStatus::Live;
        }
        StreamEvent::Error(err) => {
            warn!(
                "event=snapshot_apply module=binding status=error collection={} error={}",
                T::COLLECTION,
                err
            );
            state.status = BindingStatus::Disconnected {
                message: err.to_string(),
            };
        }
    }
    state.revision += 1;
}
