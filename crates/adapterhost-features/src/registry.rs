// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature registry keyed by feature URI.
//!
//! The `FeatureRegistry` maps each [`FeatureUri`] to exactly one
//! [`FeatureHandle`]. One object may sit under several URIs (for example a
//! type implementing both tag search and tag info); disposal visits each
//! distinct object once.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use adapterhost_core::{
    ExtensionFeature, FeatureContract, FeatureHandle, FeatureKind, FeatureProvider, FeatureUri,
    HostError,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::catalog::{FeatureDescriptor, describe};

/// A registered feature together with the kind its key denotes.
#[derive(Debug, Clone)]
pub struct FeatureEntry {
    pub uri: FeatureUri,
    pub kind: FeatureKind,
    pub handle: FeatureHandle,
}

/// Concurrent map of feature URIs to feature implementations.
pub struct FeatureRegistry {
    features: DashMap<FeatureUri, FeatureEntry>,
    dispose_owned: bool,
    disposed: AtomicBool,
}

impl FeatureRegistry {
    /// Create an empty registry.
    ///
    /// When `dispose_owned` is true the registry disposes its features on
    /// [`clear`](Self::clear) and [`dispose`](Self::dispose).
    pub fn new(dispose_owned: bool) -> Self {
        Self {
            features: DashMap::new(),
            dispose_owned,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn disposes_owned_features(&self) -> bool {
        self.dispose_owned
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(HostError::disposed("feature registry"));
        }
        Ok(())
    }

    /// Register `handle` under `uri`.
    ///
    /// Fails with [`HostError::InvalidFeature`] when the handle does not
    /// implement the contract `uri` denotes and with
    /// [`HostError::DuplicateFeature`] when `uri` is taken.
    pub fn add(&self, uri: &FeatureUri, handle: FeatureHandle) -> Result<(), HostError> {
        self.ensure_live()?;
        let kind = FeatureKind::from_uri(uri)?;
        if !handle.implements(uri) {
            return Err(HostError::InvalidFeature {
                uri: uri.to_string(),
                message: "implementation does not provide this feature".to_string(),
            });
        }

        match self.features.entry(uri.clone()) {
            Entry::Occupied(_) => Err(HostError::DuplicateFeature {
                uri: uri.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(FeatureEntry {
                    uri: uri.clone(),
                    kind,
                    handle,
                });
                debug!(feature = %uri, "feature registered");
                Ok(())
            }
        }
    }

    /// Register every feature a provider declares.
    ///
    /// Standard or extension features can be skipped with the include flags.
    /// Returns the URIs that were registered, in declaration order.
    pub fn add_from_provider<P: FeatureProvider>(
        &self,
        provider: Arc<P>,
        include_standard: bool,
        include_extension: bool,
    ) -> Result<Vec<FeatureUri>, HostError> {
        self.ensure_live()?;
        let mut added = Vec::new();
        for handle in provider.declare_features() {
            for uri in handle.uris() {
                let wanted = if uri.is_extension() {
                    include_extension
                } else {
                    include_standard
                };
                if !wanted {
                    continue;
                }
                self.add(&uri, handle.clone())?;
                added.push(uri);
            }
        }
        Ok(added)
    }

    /// Unregister `uri` without disposing it. Returns true if it was present.
    pub fn remove(&self, uri: &FeatureUri) -> Result<bool, HostError> {
        self.ensure_live()?;
        let removed = self.features.remove(uri).is_some();
        if removed {
            debug!(feature = %uri, "feature removed");
        }
        Ok(removed)
    }

    /// Unregister everything, disposing features if the registry owns them.
    pub async fn clear(&self) -> Result<(), HostError> {
        self.ensure_live()?;
        let handles = self.drain();
        if self.dispose_owned {
            dispose_distinct(handles).await;
        }
        Ok(())
    }

    /// The handle registered under `uri`. Missing keys are `Ok(None)`.
    pub fn get(&self, uri: &FeatureUri) -> Result<Option<FeatureHandle>, HostError> {
        self.ensure_live()?;
        Ok(self.features.get(uri).map(|e| e.handle.clone()))
    }

    /// The entry registered under `uri`, including its kind.
    pub fn entry(&self, uri: &FeatureUri) -> Result<Option<FeatureEntry>, HostError> {
        self.ensure_live()?;
        Ok(self.features.get(uri).map(|e| e.value().clone()))
    }

    /// Typed lookup of a standard feature, e.g. `get_feature::<dyn TagSearch>()`.
    pub fn get_feature<C: FeatureContract + ?Sized>(&self) -> Result<Option<Arc<C>>, HostError> {
        let uri = C::FEATURE.uri();
        Ok(self
            .get(&uri)?
            .and_then(|handle| C::from_object(handle.object())))
    }

    /// Lookup of an extension feature by URI.
    pub fn get_extension(
        &self,
        uri: &FeatureUri,
    ) -> Result<Option<Arc<dyn ExtensionFeature>>, HostError> {
        Ok(self
            .get(uri)?
            .and_then(|handle| handle.as_extension().cloned()))
    }

    pub fn contains(&self, uri: &FeatureUri) -> bool {
        self.features.contains_key(uri)
    }

    /// Registered URIs in sorted order.
    pub fn keys(&self) -> Vec<FeatureUri> {
        let mut keys: Vec<FeatureUri> = self.features.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// All entries sorted by URI.
    pub fn entries(&self) -> Vec<FeatureEntry> {
        let mut entries: Vec<FeatureEntry> =
            self.features.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.uri.cmp(&b.uri));
        entries
    }

    /// One entry per distinct object, keeping the lowest URI for each.
    pub fn distinct_entries(&self) -> Vec<FeatureEntry> {
        let mut seen = HashSet::new();
        self.entries()
            .into_iter()
            .filter(|e| seen.insert(e.handle.identity()))
            .collect()
    }

    /// Catalog descriptors for every registered URI, sorted by URI.
    pub fn descriptors(&self) -> Vec<FeatureDescriptor> {
        self.entries()
            .iter()
            .map(|e| describe(&e.uri, Some(&e.handle.display_name(&e.uri))))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose the registry. Owned features are disposed once each.
    ///
    /// Calling this more than once is a no-op.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handles = self.drain();
        if self.dispose_owned {
            dispose_distinct(handles).await;
        }
        debug!("feature registry disposed");
    }

    fn drain(&self) -> Vec<FeatureHandle> {
        let keys: Vec<FeatureUri> = self.features.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|k| self.features.remove(&k).map(|(_, e)| e.handle))
            .collect()
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.keys())
            .field("dispose_owned", &self.dispose_owned)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Dispose each distinct object once, preferring the synchronous path.
async fn dispose_distinct(handles: Vec<FeatureHandle>) {
    let mut seen = HashSet::new();
    for handle in handles {
        if !seen.insert(handle.identity()) {
            continue;
        }
        let feature = handle.as_feature();
        let result = match feature.dispose() {
            Some(result) => result,
            None => feature.dispose_async().await,
        };
        if let Err(err) = result {
            warn!(feature = ?handle.uris(), error = %err, "feature disposal failed");
        }
    }
}
