//! Embedded SQLite live store.
//!
//! # Responsibility
//! - Persist pair-scoped records, profiles and pair links.
//! - Push fresh ordered snapshots to every live listener after each commit.
//!
//! # Invariants
//! - Every successful write is committed before listeners are notified.
//! - The connection lock is never held while a listener runs.
//! - The commit sequence only moves under the connection lock, so a snapshot
//!   tagged with it reflects exactly the writes up to that commit.
//! - `update` and `upsert` merge top-level fields; untouched fields survive.

use crate::db::{open_db, open_db_in_memory};
use crate::model::identity::UserId;
use crate::model::pair::{derive_pair_key, PairKey};
use crate::model::record::{Fields, RecordId, SortDirection, StoredRecord};
use crate::store::clock::{Clock, SystemClock};
use crate::store::hub::ListenerHub;
use crate::store::{
    lock_unpoisoned, validate_collection, DirectoryStore, Listener, OrderBy, OrderField, PairLink,
    RealtimeStore, StoreError, StoreResult, Subscription, UserProfile,
};
use log::{debug, error, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const RECORD_SELECT_SQL: &str = "SELECT
    record_id,
    fields,
    created_at,
    updated_at
FROM scoped_records
WHERE scope = ?1
  AND collection = ?2";

/// SQLite-backed implementation of the live store and directory.
pub struct SqliteLiveStore {
    conn: Mutex<Connection>,
    /// Successful writes so far; read and bumped under `conn`.
    commits: AtomicU64,
    hub: ListenerHub,
    clock: Arc<dyn Clock>,
}

impl SqliteLiveStore {
    /// Wraps a migrated connection, stamping records with the wall clock.
    pub fn new(conn: Connection) -> Self {
        Self::with_clock(conn, Arc::new(SystemClock))
    }

    /// Wraps a migrated connection with a caller-provided clock.
    pub fn with_clock(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn: Mutex::new(conn),
            commits: AtomicU64::new(0),
            hub: ListenerHub::new(),
            clock,
        }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens an ephemeral in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Number of live listeners across all scopes.
    pub fn listener_count(&self) -> usize {
        self.hub.len()
    }

    /// One-shot ordered read of a collection.
    pub fn snapshot(
        &self,
        scope: &PairKey,
        collection: &str,
        order: &OrderBy,
    ) -> StoreResult<Vec<StoredRecord>> {
        validate_collection(collection)?;
        let conn = lock_unpoisoned(&self.conn);
        query_records(&conn, scope, collection, order)
    }

    fn write<T>(
        &self,
        op: &'static str,
        scope: &PairKey,
        collection: &str,
        apply: impl FnOnce(&Connection, i64) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        validate_collection(collection)?;

        let result = {
            let conn = lock_unpoisoned(&self.conn);
            let result = apply(&conn, self.clock.now_ms());
            if result.is_ok() {
                self.commits.fetch_add(1, Ordering::SeqCst);
            }
            result
        };

        match &result {
            Ok(_) => debug!(
                "event={} module=store status=ok collection={} duration_ms={}",
                op,
                collection,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={} module=store status=error collection={} duration_ms={} error={}",
                op,
                collection,
                started_at.elapsed().as_millis(),
                err
            ),
        }

        if result.is_ok() {
            self.notify(scope, collection);
        }
        result
    }

    fn notify(&self, scope: &PairKey, collection: &str) {
        for target in self.hub.targets(scope, collection) {
            let (commit, result) = {
                let conn = lock_unpoisoned(&self.conn);
                (
                    self.commits.load(Ordering::SeqCst),
                    query_records(&conn, target.scope(), target.collection(), target.order()),
                )
            };
            if let Err(err) = &result {
                error!(
                    "event=snapshot_push module=store status=error collection={} error={}",
                    collection, err
                );
            }
            target.deliver(commit, result);
        }
    }
}

impl RealtimeStore for SqliteLiveStore {
    fn subscribe(
        &self,
        scope: &PairKey,
        collection: &str,
        order: OrderBy,
        listener: Listener,
    ) -> Subscription {
        let (target, subscription) = self.hub.register(scope, collection, order, listener);
        let (commit, initial) = {
            let conn = lock_unpoisoned(&self.conn);
            let initial = validate_collection(collection)
                .and_then(|()| query_records(&conn, scope, collection, target.order()));
            (self.commits.load(Ordering::SeqCst), initial)
        };
        if let Err(err) = &initial {
            warn!(
                "event=subscribe module=store status=error collection={} error={}",
                collection, err
            );
        }
        target.deliver(commit, initial);
        subscription
    }

    fn create(&self, scope: &PairKey, collection: &str, fields: Fields) -> StoreResult<RecordId> {
        let id = RecordId::generate();
        let fields_json = serde_json::to_string(&fields)
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        self.write("record_create", scope, collection, |conn, now| {
            conn.execute(
                "INSERT INTO scoped_records (
                    scope,
                    collection,
                    record_id,
                    fields,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
                params![scope.as_str(), collection, id.as_str(), fields_json, now],
            )?;
            Ok(id.clone())
        })
    }

    fn update(
        &self,
        scope: &PairKey,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> StoreResult<()> {
        let patch = serde_json::to_string(&fields)
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        self.write("record_update", scope, collection, |conn, now| {
            let changed = conn.execute(
                "UPDATE scoped_records
                 SET
                    fields = json_patch(fields, ?4),
                    updated_at = ?5
                 WHERE scope = ?1
                   AND collection = ?2
                   AND record_id = ?3;",
                params![scope.as_str(), collection, id.as_str(), patch, now],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.clone(),
                });
            }
            Ok(())
        })
    }

    fn upsert(
        &self,
        scope: &PairKey,
        collection: &str,
        id: &RecordId,
        fields: Fields,
    ) -> StoreResult<()> {
        let patch = serde_json::to_string(&fields)
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        self.write("record_upsert", scope, collection, |conn, now| {
            conn.execute(
                "INSERT INTO scoped_records (
                    scope,
                    collection,
                    record_id,
                    fields,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ON CONFLICT (scope, collection, record_id) DO UPDATE SET
                    fields = json_patch(scoped_records.fields, excluded.fields),
                    updated_at = excluded.updated_at;",
                params![scope.as_str(), collection, id.as_str(), patch, now],
            )?;
            Ok(())
        })
    }

    fn delete(&self, scope: &PairKey, collection: &str, id: &RecordId) -> StoreResult<()> {
        self.write("record_delete", scope, collection, |conn, _now| {
            let changed = conn.execute(
                "DELETE FROM scoped_records
                 WHERE scope = ?1
                   AND collection = ?2
                   AND record_id = ?3;",
                params![scope.as_str(), collection, id.as_str()],
            )?;
            if changed == 0 {
                debug!(
                    "event=record_delete module=store status=noop collection={}",
                    collection
                );
            }
            Ok(())
        })
    }
}

impl DirectoryStore for SqliteLiveStore {
    fn upsert_profile(&self, uid: &UserId, email: Option<&str>) -> StoreResult<()> {
        let conn = lock_unpoisoned(&self.conn);
        conn.execute(
            "INSERT INTO user_profiles (uid, email, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (uid) DO UPDATE SET
                email = excluded.email,
                updated_at = excluded.updated_at;",
            params![uid.as_str(), email, self.clock.now_ms()],
        )?;
        debug!("event=profile_upsert module=store status=ok");
        Ok(())
    }

    fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        let conn = lock_unpoisoned(&self.conn);
        let row = conn
            .query_row(
                "SELECT uid, email, updated_at
                 FROM user_profiles
                 WHERE email = ?1 COLLATE NOCASE
                 ORDER BY rowid ASC
                 LIMIT 1;",
                [email],
                |row| {
                    Ok((
                        row.get::<_, String>("uid")?,
                        row.get::<_, Option<String>>("email")?,
                        row.get::<_, i64>("updated_at")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(uid, email, updated_at)| {
            Ok(UserProfile {
                uid: parse_user_id(&uid, "user_profiles.uid")?,
                email,
                updated_at,
            })
        })
        .transpose()
    }

    fn upsert_pair_link(&self, me: &UserId, partner: &UserId) -> StoreResult<PairLink> {
        let pair_key = derive_pair_key(me, partner);
        {
            let conn = lock_unpoisoned(&self.conn);
            conn.execute(
                "INSERT INTO pairs (pair_key, uid_a, uid_b, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (pair_key) DO UPDATE SET
                    uid_a = excluded.uid_a,
                    uid_b = excluded.uid_b,
                    updated_at = excluded.updated_at;",
                params![
                    pair_key.as_str(),
                    me.as_str(),
                    partner.as_str(),
                    self.clock.now_ms()
                ],
            )?;
        }
        debug!("event=pair_link_upsert module=store status=ok");

        self.get_pair_link(&pair_key)?.ok_or_else(|| {
            StoreError::InvalidData("pair link missing after upsert".to_string())
        })
    }

    fn get_pair_link(&self, pair_key: &PairKey) -> StoreResult<Option<PairLink>> {
        let conn = lock_unpoisoned(&self.conn);
        let row = conn
            .query_row(
                "SELECT pair_key, uid_a, uid_b, updated_at
                 FROM pairs
                 WHERE pair_key = ?1;",
                [pair_key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>("pair_key")?,
                        row.get::<_, String>("uid_a")?,
                        row.get::<_, String>("uid_b")?,
                        row.get::<_, i64>("updated_at")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(stored_key, uid_a, uid_b, updated_at)| {
            let uid_a = parse_user_id(&uid_a, "pairs.uid_a")?;
            let uid_b = parse_user_id(&uid_b, "pairs.uid_b")?;
            let derived = derive_pair_key(&uid_a, &uid_b);
            if derived.as_str() != stored_key {
                return Err(StoreError::InvalidData(format!(
                    "pair key `{stored_key}` does not match its members"
                )));
            }
            Ok(PairLink {
                pair_key: derived,
                uid_a,
                uid_b,
                updated_at,
            })
        })
        .transpose()
    }
}

fn query_records(
    conn: &Connection,
    scope: &PairKey,
    collection: &str,
    order: &OrderBy,
) -> StoreResult<Vec<StoredRecord>> {
    let direction = match order.direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    };
    let sort_expr = match &order.field {
        OrderField::ServerTimestamp => "created_at".to_string(),
        OrderField::Field(name) => {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(StoreError::InvalidOrderField(name.clone()));
            }
            format!("json_extract(fields, '$.{name}')")
        }
    };

    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT_SQL}
         ORDER BY {sort_expr} {direction}, seq {direction};"
    ))?;
    let mut rows = stmt.query(params![scope.as_str(), collection])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_record_row(row)?);
    }
    Ok(records)
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<StoredRecord> {
    let id: String = row.get("record_id")?;
    let fields_text: String = row.get("fields")?;
    let fields = match serde_json::from_str::<Value>(&fields_text) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            return Err(StoreError::InvalidData(format!(
                "record `{id}` fields are not an object"
            )))
        }
        Err(err) => {
            return Err(StoreError::InvalidData(format!(
                "record `{id}` fields are not valid json: {err}"
            )))
        }
    };

    Ok(StoredRecord {
        id: RecordId::fixed(id),
        fields,
        timestamp: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_user_id(value: &str, column: &str) -> StoreResult<UserId> {
    UserId::parse(value)
        .map_err(|err| StoreError::InvalidData(format!("invalid user id in {column}: {err}")))
}
