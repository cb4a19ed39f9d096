//! Generic feature record shape and boundary decoding.
//!
//! # Responsibility
//! - Define the raw row shape exchanged with the live store.
//! - Decode raw rows into typed per-feature schemas and back.
//!
//! # Invariants
//! - `id` and `timestamp` are assigned by the store, never by callers.
//! - Typed records only exist for rows that passed schema validation.

use crate::model::identity::UserId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field set of one record as stored by the live store.
pub type Fields = Map<String, Value>;

/// Store-assigned record identifier, or a fixed sub-key for singleton records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Issues a fresh random record id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wraps a caller-chosen key such as `editor` or a user id.
    pub fn fixed(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort direction for live snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One raw record as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub fields: Fields,
    /// Server-assigned creation timestamp in epoch milliseconds.
    pub timestamp: i64,
    /// Server-assigned timestamp of the last write in epoch milliseconds.
    pub updated_at: i64,
}

/// Boundary validation failure for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Fields could not be decoded into the expected shape.
    Shape {
        collection: &'static str,
        message: String,
    },
    /// Fields decoded but violate a feature rule.
    Invalid {
        collection: &'static str,
        field: &'static str,
        message: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape {
                collection,
                message,
            } => write!(f, "malformed `{collection}` record: {message}"),
            Self::Invalid {
                collection,
                field,
                message,
            } => write!(f, "invalid `{collection}.{field}`: {message}"),
        }
    }
}

impl Error for SchemaError {}

/// Typed schema for one feature sub-collection.
///
/// Wire names follow the external store's camelCase naming.
pub trait FeatureSchema: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Sub-collection name inside a pair scope.
    const COLLECTION: &'static str;
    /// Snapshot order by server timestamp.
    const DIRECTION: SortDirection;

    /// User that authored the record, when the schema records one.
    fn author(&self) -> Option<&UserId>;

    /// Feature rules beyond shape, checked on both encode and decode.
    fn validate(&self) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// Typed record: store identity and timestamp plus validated feature fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord<T> {
    pub id: RecordId,
    pub timestamp: i64,
    pub data: T,
}

impl<T: FeatureSchema> FeatureRecord<T> {
    /// Decodes and validates one raw store row.
    pub fn decode(raw: &StoredRecord) -> Result<Self, SchemaError> {
        let data: T = serde_json::from_value(Value::Object(raw.fields.clone())).map_err(|err| {
            SchemaError::Shape {
                collection: T::COLLECTION,
                message: err.to_string(),
            }
        })?;
        data.validate()?;
        Ok(Self {
            id: raw.id.clone(),
            timestamp: raw.timestamp,
            data,
        })
    }

    pub fn author(&self) -> Option<&UserId> {
        self.data.author()
    }
}

/// Validates and encodes a typed value into a store field set.
pub fn encode_fields<T: FeatureSchema>(data: &T) -> Result<Fields, SchemaError> {
    data.validate()?;
    match serde_json::to_value(data) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(SchemaError::Shape {
            collection: T::COLLECTION,
            message: "schema must serialize to an object".to_string(),
        }),
        Err(err) => Err(SchemaError::Shape {
            collection: T::COLLECTION,
            message: err.to_string(),
        }),
    }
}
