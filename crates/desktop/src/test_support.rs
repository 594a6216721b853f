//! Fakes shared by the unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use disasterconnect_core::{Fields, Operation};
use disasterconnect_events::Severity;
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::notify::{CacheInvalidator, Notifier};
use crate::remote::{Record, RemoteError, RemoteStore};
use crate::storage::{InMemoryKeyValueStore, KeyValueStore, StorageError};

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryKeyValueStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write(key, value).await
    }
}

/// One call observed by [`ScriptedRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub operation: Operation,
    pub table: String,
    pub id: Option<String>,
    pub fields: Fields,
}

/// Remote store that records calls and fails on demand.
///
/// Calls against a table in `failing_tables` fail; `set_unreachable(true)`
/// fails everything. With a gate installed every call waits for
/// [`ScriptedRemote::release`] before completing.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    calls: Mutex<Vec<RemoteCall>>,
    failing_tables: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    gate: Option<Arc<Notify>>,
    entered: Notify,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(tables: &[&str]) -> Self {
        let remote = Self::new();
        remote
            .failing_tables
            .lock()
            .unwrap()
            .extend(tables.iter().map(|t| t.to_string()));
        remote
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Let one gated call through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Resolves once a call has started.
    pub async fn wait_for_call(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn handle(
        &self,
        operation: Operation,
        table: &str,
        id: Option<&str>,
        fields: &Fields,
    ) -> Result<Record, RemoteError> {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.calls.lock().unwrap().push(RemoteCall {
            operation,
            table: table.to_string(),
            id: id.map(str::to_string),
            fields: fields.clone(),
        });

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection reset".to_string()));
        }
        if self.failing_tables.lock().unwrap().contains(table) {
            return Err(RemoteError::Api(403, "permission denied".to_string()));
        }

        let mut record = fields.clone();
        if let Some(id) = id {
            record.insert("id".to_string(), json!(id));
        }
        Ok(Value::Object(record))
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn insert(&self, table: &str, fields: &Fields) -> Result<Record, RemoteError> {
        self.handle(Operation::Insert, table, None, fields).await
    }

    async fn update(&self, table: &str, id: &str, fields: &Fields) -> Result<Record, RemoteError> {
        self.handle(Operation::Update, table, Some(id), fields).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        self.handle(Operation::Delete, table, Some(id), &Fields::new())
            .await
            .map(|_| ())
    }
}

/// Notifier + invalidator that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<(Severity, String)>>,
    invalidations: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(Severity, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingSink {
    fn notify(&self, severity: Severity, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

impl CacheInvalidator for RecordingSink {
    fn invalidate_all(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
