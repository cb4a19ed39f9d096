//! Real-time store boundary.
//!
//! # Responsibility
//! - Define the contract every live backend implements: push subscriptions
//!   plus direct create/update/upsert/delete writes inside a pair scope.
//! - Define the directory contract for profiles and pair links.
//! - Provide the embedded SQLite implementation and a file-system blob store.
//!
//! # Invariants
//! - Record ids and timestamps are assigned by the store.
//! - Writes are last-write-wins on the written field set; no versions.
//! - A dropped `Subscription` never delivers again.

use crate::db::DbError;
use crate::model::identity::UserId;
use crate::model::pair::PairKey;
use crate::model::record::{Fields, RecordId, SchemaError, SortDirection, StoredRecord};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod blob;
pub mod clock;
mod hub;
pub mod sqlite;

pub use blob::{BlobStore, FsBlobStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use hub::{ListenerHub, ListenerTarget};
pub use sqlite::SqliteLiveStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure raised by a store, a subscription stream or a blob upload.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Update targeted a record that does not exist.
    NotFound {
        collection: String,
        id: RecordId,
    },
    InvalidCollection(String),
    InvalidOrderField(String),
    InvalidBlobPath(String),
    /// Persisted data no longer matches the expected shape.
    InvalidData(String),
    Schema(SchemaError),
    Io(std::io::Error),
    /// Backend refused or could not be reached (permission, network).
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "record not found: {collection}/{id}")
            }
            Self::InvalidCollection(name) => write!(f, "invalid collection name `{name}`"),
            Self::InvalidOrderField(name) => write!(f, "invalid order field `{name}`"),
            Self::InvalidBlobPath(path) => write!(f, "invalid blob path `{path}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaError> for StoreError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Field a live snapshot is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderField {
    /// Server-assigned creation timestamp.
    ServerTimestamp,
    /// A top-level field inside the record's field set.
    Field(String),
}

/// Snapshot ordering for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn timestamp(direction: SortDirection) -> Self {
        Self {
            field: OrderField::ServerTimestamp,
            direction,
        }
    }

    pub fn field(name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: OrderField::Field(name.into()),
            direction,
        }
    }
}

/// Kind of change between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One per-record change carried alongside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub kind: ChangeKind,
    pub id: RecordId,
}

/// Full ordered snapshot plus the changes since the previous delivery.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub records: Vec<StoredRecord>,
    pub changes: Vec<RecordChange>,
}

/// Item pushed to a subscription listener.
#[derive(Debug)]
pub enum StreamEvent {
    Snapshot(RecordSet),
    Error(StoreError),
}

/// Push callback owned by the store for the lifetime of a subscription.
///
/// Listeners must not write to the store from inside the callback.
pub type Listener = Box<dyn FnMut(StreamEvent) + Send>;

/// Live subscription handle; dropping it releases the listener.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a backend-specific release action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Releases the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Live collection store scoped by pair key.
pub trait RealtimeStore {
    /// Opens a push stream over `collection` inside `scope`.
    ///
    /// The initial snapshot is delivered before this returns. Failures,
    /// including a failing initial query, arrive as `StreamEvent::Error`.
    fn subscribe(
        &self,
        scope: &PairKey,
        collection: &str,
        order: OrderBy,
        listener: Listener,
    ) -> Subscription;

    /// Creates a record with a store-assigned id and timestamp.
    fn create(&self, scope: &PairKey, collection: &str, fields: Fields) -> StoreResult<RecordId>;

    /// Overwrites the given fields on an existing record.
    fn update(
        &self,
        scope: &PairKey,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> StoreResult<()>;

    /// Creates or merges into a record with a caller-chosen id.
    fn upsert(
        &self,
        scope: &PairKey,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> StoreResult<()>;

    /// Deletes a record; deleting a missing record is a no-op.
    fn delete(&self, scope: &PairKey, collection: &str, id: &RecordId) -> StoreResult<()>;
}

/// Profile row used for partner lookup by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: UserId,
    pub email: Option<String>,
    pub updated_at: i64,
}

/// Pair link row written when two users connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairLink {
    pub pair_key: PairKey,
    pub uid_a: UserId,
    pub uid_b: UserId,
    pub updated_at: i64,
}

/// Directory of user profiles and pair links.
pub trait DirectoryStore {
    /// Writes (merge) the profile for `uid`.
    fn upsert_profile(&self, uid: &UserId, email: Option<&str>) -> StoreResult<()>;
    /// Finds the first profile whose email matches, ignoring ASCII case.
    fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>>;
    /// Writes (merge) the pair link between `me` and `partner`.
    fn upsert_pair_link(&self, me: &UserId, partner: &UserId) -> StoreResult<PairLink>;
    fn get_pair_link(&self, pair_key: &PairKey) -> StoreResult<Option<PairLink>>;
}

/// Locks a mutex, recovering the guard if a listener panicked while holding it.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Validates a sub-collection name: lowercase ascii, digits and `_`.
pub fn validate_collection(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}
