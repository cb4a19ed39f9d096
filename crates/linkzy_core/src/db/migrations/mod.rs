//! Schema history of the Linkzy store.
//!
//! # Responsibility
//! - List the steps that build the local store: account and profile tables,
//!   the pair-link directory, then the scoped feature record table that backs
//!   every live collection.
//! - Bring an opened database up to the newest step inside one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - `PRAGMA user_version` always equals the last applied step.
//! - A database written by a newer build is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "accounts",
        sql: include_str!("0001_accounts.sql"),
    },
    SchemaStep {
        version: 2,
        name: "pairs",
        sql: include_str!("0002_pairs.sql"),
    },
    SchemaStep {
        version: 3,
        name: "scoped_records",
        sql: include_str!("0003_scoped_records.sql"),
    },
];

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Upgrades `conn` to [`latest_version`], returning the steps applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<&'static str>> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > found)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        let applied = tx.execute_batch(step.sql).and_then(|()| {
            tx.pragma_update(None, "user_version", step.version)
        });
        applied.map_err(|source| DbError::Migration {
            version: step.version,
            source,
        })?;
    }
    tx.commit()?;

    let names: Vec<&'static str> = pending.iter().map(|step| step.name).collect();
    info!(
        "event=db_migrate module=db status=ok from={} to={} steps={}",
        found,
        latest,
        names.join(",")
    );
    Ok(names)
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
