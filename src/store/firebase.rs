//! # store::firebase
//!
//! Firebase Realtime Database ผ่าน REST API
//!
//! ```text
//! GET  {db_url}/{path}.json?auth=<token>        → subtree (null ถ้าไม่มี)
//! PUT  {db_url}/{path}/{key}.json?auth=<token>  → overwrite child
//! PUT  {db_url}/{path}.json?auth=<token>        → overwrite document
//! ```
//! `FIREBASE_AUTH` เป็น database secret หรือ ID token ก็ได้ (ส่งเป็น `?auth=`)

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{into_subtree, validate_key, validate_path, Store};

#[derive(Clone)]
pub struct FirebaseStore {
    client:   reqwest::Client,
    base_url: String,
    auth:     Option<String>,
}

impl std::fmt::Debug for FirebaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseStore")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl FirebaseStore {
    pub fn new(
        base_url: &str,
        auth: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Firebase error body: {"error": "Permission denied"}
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        Err(StoreError::api(status.as_u16(), message))
    }

    async fn put(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let url = self.url(path);
        debug!(path, "PUT store document");

        let response = self
            .with_auth(self.client.put(&url))
            // print=silent → 204 แทนการ echo body กลับมา
            .query(&[("print", "silent")])
            .json(value)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FirebaseStore {
    async fn read_subtree(&self, path: &str) -> Result<Map<String, Value>, StoreError> {
        validate_path(path)?;
        let url = self.url(path);
        debug!(path, "GET store subtree");

        let response = self.with_auth(self.client.get(&url)).send().await?;
        let body = Self::check(response).await?.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        Ok(into_subtree(value))
    }

    async fn write_child(&self, path: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        validate_path(path)?;
        validate_key(key)?;
        self.put(&format!("{path}/{key}"), value).await
    }

    async fn write_document(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        validate_path(path)?;
        self.put(path, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_url_building() {
        let store = FirebaseStore::new(
            "https://demo-default-rtdb.firebaseio.com/",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(store.url("trades/42"), "https://demo-default-rtdb.firebaseio.com/trades/42.json");
    }

    #[test]
    fn test_debug_redacts_auth() {
        let store = FirebaseStore::new(
            "https://demo.firebaseio.com",
            Some("top-secret".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
