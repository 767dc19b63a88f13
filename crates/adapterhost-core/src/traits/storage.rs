// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value store contract used by feature implementations for persistence.

use async_trait::async_trait;

use crate::error::HostError;

/// A byte-oriented key-value store.
///
/// Implementations must be safe for concurrent use. Keys are opaque strings;
/// scoping is layered on top via [`crate::kvstore::ScopedKeyValueStore`].
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads the value stored under `key`.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, HostError>;

    /// Writes `value` under `key`, replacing any existing value.
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), HostError>;

    /// Deletes `key`. Returns true if a value was removed.
    async fn delete(&self, key: &str) -> Result<bool, HostError>;
}
