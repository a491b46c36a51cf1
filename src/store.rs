//! Link persistence behind a pluggable store trait.
//!
//! The production backend is a remote JSON document store reached over
//! HTTP (`{base}/{namespace}/{key}.json`); the in-memory backend serves
//! local development and the integration tests. Authoritative state
//! lives only in the store itself, nothing is cached locally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::ApiError;

/// One shortened link as stored under its short key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Normalized target URL, immutable after creation.
    pub long_url: String,
    /// Set once, at creation.
    pub post_date: DateTime<Utc>,
    /// Mutated only by the verification state machine, false to true.
    pub is_verified: bool,
}

impl LinkRecord {
    pub fn new(long_url: String) -> Self {
        Self {
            long_url,
            post_date: Utc::now(),
            is_verified: false,
        }
    }
}

/// Remote document store operations the registry is built on.
///
/// Every method surfaces transport problems as [`ApiError::Upstream`];
/// the registry decides per operation whether that means "absent" or a
/// hard failure. Calls are bounded by the configured timeout and never
/// retried here.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<LinkRecord>, ApiError>;

    /// Full dump of the namespace. Needed by the admin listing and the
    /// capacity check, which both pay the O(total entries) read cost.
    async fn get_all(&self) -> Result<HashMap<String, LinkRecord>, ApiError>;

    /// Stores `record` under `key` and returns what the store echoed
    /// back, so the caller can confirm the write landed intact.
    async fn put(&self, key: &str, record: &LinkRecord) -> Result<LinkRecord, ApiError>;

    /// Partial update flipping `is_verified` to true; never a full
    /// overwrite, so a concurrent reader keeps seeing the target URL.
    async fn set_verified(&self, key: &str) -> Result<(), ApiError>;

    async fn delete(&self, key: &str) -> Result<(), ApiError>;
}

/// Firebase-RTDB-style REST backend.
pub struct RemoteStore {
    client: Client,
    base_url: String,
    namespace: String,
}

impl RemoteStore {
    pub fn new(base_url: &str, namespace: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.trim_matches('/').to_string(),
        })
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, self.namespace, key)
    }

    fn root_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.namespace)
    }
}

#[async_trait]
impl LinkStore for RemoteStore {
    async fn get(&self, key: &str) -> Result<Option<LinkRecord>, ApiError> {
        let response = self.client.get(self.entry_url(key)).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "store answered {} reading {}",
                response.status(),
                key
            )));
        }
        // The store answers 200 with a JSON `null` body for misses.
        Ok(response.json::<Option<LinkRecord>>().await?)
    }

    async fn get_all(&self) -> Result<HashMap<String, LinkRecord>, ApiError> {
        let response = self.client.get(self.root_url()).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "store answered {} reading the namespace",
                response.status()
            )));
        }
        let entries = response
            .json::<Option<HashMap<String, LinkRecord>>>()
            .await?;
        Ok(entries.unwrap_or_default())
    }

    async fn put(&self, key: &str, record: &LinkRecord) -> Result<LinkRecord, ApiError> {
        let response = self
            .client
            .put(self.entry_url(key))
            .json(record)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "store answered {} writing {}",
                response.status(),
                key
            )));
        }
        response
            .json::<Option<LinkRecord>>()
            .await?
            .ok_or_else(|| ApiError::Upstream(format!("store echoed nothing writing {}", key)))
    }

    async fn set_verified(&self, key: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .patch(self.entry_url(key))
            .json(&serde_json::json!({ "is_verified": true }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "store answered {} verifying {}",
                response.status(),
                key
            )));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        let response = self.client.delete(self.entry_url(key)).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "store answered {} deleting {}",
                response.status(),
                key
            )));
        }
        Ok(())
    }
}

/// In-process backend for local development and tests.
#[derive(Default)]
pub struct MemoryLinkStore {
    entries: RwLock<HashMap<String, LinkRecord>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn get(&self, key: &str) -> Result<Option<LinkRecord>, ApiError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_all(&self) -> Result<HashMap<String, LinkRecord>, ApiError> {
        Ok(self.entries.read().await.clone())
    }

    async fn put(&self, key: &str, record: &LinkRecord) -> Result<LinkRecord, ApiError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(record.clone())
    }

    async fn set_verified(&self, key: &str) -> Result<(), ApiError> {
        match self.entries.write().await.get_mut(key) {
            Some(record) => {
                record.is_verified = true;
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("no record under {}", key))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
