//! Deferred writes and their queue records.
//!
//! A [`Mutation`] is one insert/update/delete destined for a remote table.
//! It is a tagged union so each kind carries exactly the data it needs:
//! inserts carry the full record, updates carry the target id plus the
//! changed fields, deletes carry only the target id.
//!
//! On disk (and in the loose form UI code produces) a mutation is an
//! `operation` plus an opaque `payload` map in which the reserved
//! [`RECORD_ID_FIELD`] names the target record. [`Mutation::from_payload`] and
//! [`Mutation::into_payload`] convert between the two.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};
use crate::id::MutationId;

/// Field name -> value mapping for a remote record.
pub type Fields = serde_json::Map<String, Value>;

/// Payload key that identifies the target record of an update or delete.
pub const RECORD_ID_FIELD: &str = "id";

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single write against a remote table.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a record from the full field set.
    Insert { fields: Fields },
    /// Change `fields` on the record identified by `id`.
    Update { id: String, fields: Fields },
    /// Remove the record identified by `id`.
    Delete { id: String },
}

impl Mutation {
    pub fn insert(fields: Fields) -> Self {
        Self::Insert { fields }
    }

    pub fn update(id: impl Into<String>, fields: Fields) -> Self {
        Self::Update {
            id: id.into(),
            fields,
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete { id: id.into() }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Mutation::Insert { .. } => Operation::Insert,
            Mutation::Update { .. } => Operation::Update,
            Mutation::Delete { .. } => Operation::Delete,
        }
    }

    /// Target record id, if the write addresses an existing record.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Mutation::Insert { .. } => None,
            Mutation::Update { id, .. } | Mutation::Delete { id } => Some(id),
        }
    }

    /// Build a typed mutation from the loose `operation + payload` form.
    ///
    /// - `insert`: the whole payload becomes the record fields.
    /// - `update`: `payload.id` is the target, the remaining keys are the changes.
    /// - `delete`: `payload.id` is the target, everything else is ignored.
    ///
    /// Ids may be strings or numbers; anything else is rejected.
    pub fn from_payload(operation: Operation, mut payload: Fields) -> DomainResult<Self> {
        match operation {
            Operation::Insert => Ok(Self::Insert { fields: payload }),
            Operation::Update => {
                let id = payload
                    .remove(RECORD_ID_FIELD)
                    .as_ref()
                    .and_then(record_id_from_value)
                    .ok_or(DomainError::missing_record_id(operation))?;
                Ok(Self::Update { id, fields: payload })
            }
            Operation::Delete => {
                let id = payload
                    .get(RECORD_ID_FIELD)
                    .and_then(record_id_from_value)
                    .ok_or(DomainError::missing_record_id(operation))?;
                Ok(Self::Delete { id })
            }
        }
    }

    /// Flatten back into the loose form. Inverse of [`Mutation::from_payload`]
    /// for updates and deletes; inserts are returned untouched.
    pub fn into_payload(self) -> (Operation, Fields) {
        match self {
            Mutation::Insert { fields } => (Operation::Insert, fields),
            Mutation::Update { id, mut fields } => {
                fields.insert(RECORD_ID_FIELD.to_string(), Value::String(id));
                (Operation::Update, fields)
            }
            Mutation::Delete { id } => {
                let mut fields = Fields::new();
                fields.insert(RECORD_ID_FIELD.to_string(), Value::String(id));
                (Operation::Delete, fields)
            }
        }
    }
}

fn record_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A durable record of a deferred write.
///
/// Serializes to the flat persisted shape
/// `{ id, table, operation, payload, queuedAt, retries }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireMutation", try_from = "WireMutation")]
pub struct QueuedMutation {
    pub id: MutationId,
    pub table: String,
    pub mutation: Mutation,
    pub queued_at: DateTime<Utc>,
    /// Failed replay attempts so far.
    pub retries: u32,
}

impl QueuedMutation {
    /// A fresh entry: new id, zero retries.
    pub fn new(table: impl Into<String>, mutation: Mutation, queued_at: DateTime<Utc>) -> Self {
        Self {
            id: MutationId::new(),
            table: table.into(),
            mutation,
            queued_at,
            retries: 0,
        }
    }

    pub fn operation(&self) -> Operation {
        self.mutation.operation()
    }

    /// Whether the entry has used up its retry budget.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retries >= max_retries
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMutation {
    id: MutationId,
    table: String,
    operation: Operation,
    #[serde(default)]
    payload: Fields,
    queued_at: DateTime<Utc>,
    #[serde(default)]
    retries: u32,
}

impl From<QueuedMutation> for WireMutation {
    fn from(value: QueuedMutation) -> Self {
        let (operation, payload) = value.mutation.into_payload();
        Self {
            id: value.id,
            table: value.table,
            operation,
            payload,
            queued_at: value.queued_at,
            retries: value.retries,
        }
    }
}

impl TryFrom<WireMutation> for QueuedMutation {
    type Error = DomainError;

    fn try_from(value: WireMutation) -> Result<Self, Self::Error> {
        if value.table.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "queued mutation {} has an empty table name",
                value.id
            )));
        }

        Ok(Self {
            id: value.id,
            table: value.table,
            mutation: Mutation::from_payload(value.operation, value.payload)?,
            queued_at: value.queued_at,
            retries: value.retries,
        })
    }
}
