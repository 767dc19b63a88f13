// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value store implementations and helpers.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HostError;
use crate::traits::KeyValueStore;

/// Separator between a scope prefix and a key.
pub const SCOPE_SEPARATOR: char = ':';

/// Process-local store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), HostError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, HostError> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// A view over another store that prefixes every key with `{prefix}:`.
///
/// Scopes nest: scoping a scoped store yields `{outer}:{inner}:{key}`.
pub struct ScopedKeyValueStore {
    inner: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl ScopedKeyValueStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Result<Self, HostError> {
        let prefix = prefix.into();
        if prefix.trim().is_empty() {
            return Err(HostError::invalid_argument("prefix", "scope prefix must not be empty"));
        }
        Ok(Self { inner, prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}{SCOPE_SEPARATOR}{key}", self.prefix)
    }
}

#[async_trait]
impl KeyValueStore for ScopedKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, HostError> {
        self.inner.read(&self.scoped_key(key)).await
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), HostError> {
        self.inner.write(&self.scoped_key(key), value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, HostError> {
        self.inner.delete(&self.scoped_key(key)).await
    }
}

/// Convenience methods for any shared key-value store.
#[async_trait]
pub trait KeyValueStoreExt {
    /// Returns a store scoped under `prefix`.
    fn scoped(&self, prefix: &str) -> Result<ScopedKeyValueStore, HostError>;

    /// Reads and deserializes a JSON value.
    async fn read_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, HostError>;

    /// Serializes and writes a JSON value.
    async fn write_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), HostError>;
}

#[async_trait]
impl KeyValueStoreExt for Arc<dyn KeyValueStore> {
    fn scoped(&self, prefix: &str) -> Result<ScopedKeyValueStore, HostError> {
        ScopedKeyValueStore::new(Arc::clone(self), prefix)
    }

    async fn read_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, HostError> {
        match self.read(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), HostError> {
        let bytes = serde_json::to_vec(value)?;
        self.write(key, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Checkpoint {
        offset: u64,
    }

    #[tokio::test]
    async fn in_memory_read_write_delete() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.read("a").await.unwrap(), None);
        store.write("a", b"1".to_vec()).await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), Some(b"1".to_vec()));
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn scoped_store_prefixes_keys() {
        let root = Arc::new(InMemoryKeyValueStore::new());
        let shared: Arc<dyn KeyValueStore> = root.clone();
        let scoped = shared.scoped("adapter-1").unwrap();
        scoped.write("state", b"x".to_vec()).await.unwrap();

        assert_eq!(root.read("adapter-1:state").await.unwrap(), Some(b"x".to_vec()));
        assert_eq!(root.read("state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn nested_scopes_compose() {
        let root = Arc::new(InMemoryKeyValueStore::new());
        let shared: Arc<dyn KeyValueStore> = root.clone();
        let outer: Arc<dyn KeyValueStore> = Arc::new(shared.scoped("a").unwrap());
        let inner = outer.scoped("b").unwrap();
        inner.write("k", b"v".to_vec()).await.unwrap();
        assert!(root.read("a:b:k").await.unwrap().is_some());
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let shared: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        assert!(matches!(
            shared.scoped(" "),
            Err(HostError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn json_helpers() {
        let shared: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        shared
            .write_json("cp", &Checkpoint { offset: 42 })
            .await
            .unwrap();
        let read: Option<Checkpoint> = shared.read_json("cp").await.unwrap();
        assert_eq!(read, Some(Checkpoint { offset: 42 }));

        shared.write("bad", b"not json".to_vec()).await.unwrap();
        let err = shared.read_json::<Checkpoint>("bad").await.unwrap_err();
        assert!(matches!(err, HostError::Storage { .. }));
    }
}
