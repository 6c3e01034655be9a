//! # store::memory
//!
//! In-process JSON tree with the same overwrite semantics as the Realtime
//! Database.  Selected with `FIREBASE_DB_URL=memory`; tests use its failure
//! switches to simulate a flaky network.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{into_subtree, validate_key, validate_path, Store};

#[derive(Debug, Default)]
struct MemoryInner {
    root:         Map<String, Value>,
    writes:       u64,
    read_failing: bool,
    /// Full paths (`trades/123`) whose writes are rejected
    failing_keys: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value at `path`, if any.
    pub async fn get(&self, path: &str) -> Option<Value> {
        let inner = self.inner.read().await;
        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut node = inner.root.get(first)?;
        for segment in segments {
            node = node.get(segment)?;
        }
        Some(node.clone())
    }

    fn set(root: &mut Map<String, Value>, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('/').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return,
        };

        let mut node = root;
        for segment in parents {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child.as_object_mut() {
                Some(map) => map,
                None => return,
            };
        }

        // writing null deletes the node, as the Realtime Database does
        if value.is_null() {
            node.remove(*last);
        } else {
            node.insert(last.to_string(), value);
        }
    }

    async fn write(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.failing_keys.contains(path) {
            return Err(StoreError::Unavailable(format!("write to {path} rejected")));
        }
        Self::set(&mut inner.root, path, value.clone());
        inner.writes += 1;
        Ok(())
    }
}

// ─── Inspection / failure hooks ───────────────────────────────────────────────

#[cfg(test)]
impl MemoryStore {
    /// Number of successful writes since creation.
    pub async fn write_count(&self) -> u64 {
        self.inner.read().await.writes
    }

    pub async fn set_read_failing(&self, failing: bool) {
        self.inner.write().await.read_failing = failing;
    }

    pub async fn fail_writes_to(&self, path: &str) {
        self.inner.write().await.failing_keys.insert(path.to_string());
    }

    pub async fn clear_write_failures(&self) {
        self.inner.write().await.failing_keys.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read_subtree(&self, path: &str) -> Result<Map<String, Value>, StoreError> {
        validate_path(path)?;
        if self.inner.read().await.read_failing {
            return Err(StoreError::Unavailable(format!("read of {path} rejected")));
        }
        Ok(self.get(path).await.map(into_subtree).unwrap_or_default())
    }

    async fn write_child(&self, path: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        validate_path(path)?;
        validate_key(key)?;
        self.write(&format!("{path}/{key}"), value).await
    }

    async fn write_document(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        validate_path(path)?;
        self.write(path, value).await
    }
}
