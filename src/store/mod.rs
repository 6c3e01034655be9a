//! # store — Store Gateway
//!
//! Capability ห่อ remote key-value tree (Firebase Realtime Database)
//! ทุกการเขียนเป็น whole-value overwrite — ไม่มี merge / transaction ข้าม key
//!
//! ## Layout
//! ```text
//! trades/<ticket>   → TradeRecord
//! mt5Status         → ConnectionStatus
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub mod firebase;
pub mod memory;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

pub const TRADES_PATH: &str = "trades";
pub const STATUS_PATH: &str = "mt5Status";

#[async_trait]
pub trait Store: Send + Sync {
    /// Children of `path`.  A missing path is an empty map, never an error.
    async fn read_subtree(&self, path: &str) -> Result<Map<String, Value>, StoreError>;

    /// Overwrite `path/key` with `value`.
    async fn write_child(&self, path: &str, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Overwrite the document at `path`.
    async fn write_document(&self, path: &str, value: &Value) -> Result<(), StoreError>;
}

/// Normalise whatever the database holds at a node into a child map.
///
/// Realtime Database turns objects with mostly sequential integer keys into
/// arrays, so an array is read back keyed by index with the null holes dropped.
pub(crate) fn into_subtree(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Map::new(),
    }
}

/// Path segments must be non-empty and free of `. $ # [ ] /`.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains(&['.', '$', '#', '[', ']', '/'][..]) {
        return Err(StoreError::invalid_path(key));
    }
    Ok(())
}

pub(crate) fn validate_path(path: &str) -> Result<(), StoreError> {
    path.split('/').try_for_each(validate_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subtree_from_object() {
        let map = into_subtree(json!({ "1": { "mt5Ticket": 1 } }));
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("1"));
    }

    #[test]
    fn test_subtree_from_array_drops_holes() {
        let map = into_subtree(json!([null, { "mt5Ticket": 1 }, null, { "mt5Ticket": 3 }]));
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("1"));
        assert!(map.contains_key("3"));
    }

    #[test]
    fn test_subtree_from_null_or_scalar() {
        assert!(into_subtree(Value::Null).is_empty());
        assert!(into_subtree(json!("oops")).is_empty());
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("123456").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a.b").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_path("users/abc/trades").is_ok());
        assert!(validate_path("trades//x").is_err());
    }
}
