// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter lookup and the resolve-and-authorize pipeline.
//!
//! Callers never reach a feature directly. They ask the [`AdapterAccessor`]
//! to resolve an adapter id and a feature URI, and get back a
//! [`ResolvedAdapterFeature`] saying how far resolution got and whether the
//! authorization policy allowed the call.

use std::sync::Arc;

use adapterhost_config::AdapterSettings;
use adapterhost_config::model::MAX_PAGE_SIZE;
use adapterhost_core::{
    AdapterDescriptor, AdapterDescriptorExtended, AdapterState, AllowAll, AuthorizationPolicy,
    CallerContext, FeatureContract, FeatureHandle, FeatureKind, FeatureUri, HostError,
};
use adapterhost_features::FeatureRegistry;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapter::Adapter;

/// Type-erased view of an [`Adapter`] used by the accessor.
pub trait HostedAdapter: Send + Sync + 'static {
    fn id(&self) -> &str;
    fn descriptor(&self) -> AdapterDescriptor;
    fn extended_descriptor(&self) -> AdapterDescriptorExtended;
    fn state(&self) -> AdapterState;
    fn is_enabled(&self) -> bool;
    fn features(&self) -> &FeatureRegistry;
}

impl<O: AdapterSettings> HostedAdapter for Adapter<O> {
    fn id(&self) -> &str {
        Adapter::id(self)
    }

    fn descriptor(&self) -> AdapterDescriptor {
        Adapter::descriptor(self)
    }

    fn extended_descriptor(&self) -> AdapterDescriptorExtended {
        Adapter::extended_descriptor(self)
    }

    fn state(&self) -> AdapterState {
        Adapter::state(self)
    }

    fn is_enabled(&self) -> bool {
        Adapter::is_enabled(self)
    }

    fn features(&self) -> &FeatureRegistry {
        Adapter::features(self)
    }
}

/// Outcome of resolving a feature on an adapter for a caller.
///
/// `feature` is only set when both lookups succeeded; `is_authorized` is only
/// meaningful then.
pub struct ResolvedAdapterFeature<F> {
    pub adapter_id: String,
    pub uri: FeatureUri,
    pub adapter: Option<Arc<dyn HostedAdapter>>,
    pub feature: Option<F>,
    pub is_authorized: bool,
}

impl<F> ResolvedAdapterFeature<F> {
    pub fn adapter_resolved(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn feature_resolved(&self) -> bool {
        self.feature.is_some()
    }

    /// Convert to a result. Misses become "not found" errors and a denied
    /// call becomes [`HostError::Forbidden`].
    pub fn into_result(self) -> Result<(Arc<dyn HostedAdapter>, F), HostError> {
        let Some(adapter) = self.adapter else {
            return Err(HostError::AdapterNotFound {
                adapter_id: self.adapter_id,
            });
        };
        let Some(feature) = self.feature else {
            return Err(HostError::FeatureNotFound {
                adapter_id: self.adapter_id,
                uri: self.uri.to_string(),
            });
        };
        if !self.is_authorized {
            return Err(HostError::Forbidden {
                adapter_id: self.adapter_id,
                uri: self.uri.to_string(),
            });
        }
        Ok((adapter, feature))
    }

    fn unresolved(adapter_id: &str, uri: &FeatureUri) -> Self {
        Self {
            adapter_id: adapter_id.to_string(),
            uri: uri.clone(),
            adapter: None,
            feature: None,
            is_authorized: false,
        }
    }
}

impl<F> std::fmt::Debug for ResolvedAdapterFeature<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAdapterFeature")
            .field("adapter_id", &self.adapter_id)
            .field("uri", &self.uri)
            .field("adapter_resolved", &self.adapter_resolved())
            .field("feature_resolved", &self.feature_resolved())
            .field("is_authorized", &self.is_authorized)
            .finish()
    }
}

/// Filter and paging for [`AdapterAccessor::find_adapters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindAdaptersRequest {
    /// Case-insensitive substring of the adapter name.
    pub name: Option<String>,
    /// Case-insensitive substring of the adapter description.
    pub description: Option<String>,
    /// Clamped to 1..=500.
    pub page_size: usize,
    /// 1-based.
    pub page: usize,
}

impl Default for FindAdaptersRequest {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            page_size: 10,
            page: 1,
        }
    }
}

/// Registry of hosted adapters plus the authorization policy that guards them.
pub struct AdapterAccessor {
    adapters: DashMap<String, Arc<dyn HostedAdapter>>,
    policy: Arc<dyn AuthorizationPolicy>,
}

impl AdapterAccessor {
    pub fn new(policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self {
            adapters: DashMap::new(),
            policy,
        }
    }

    /// Add an adapter. Fails if another adapter has the same id.
    pub fn add(&self, adapter: Arc<dyn HostedAdapter>) -> Result<(), HostError> {
        match self.adapters.entry(adapter.id().to_string()) {
            Entry::Occupied(_) => Err(HostError::invalid_argument(
                "adapter",
                format!("an adapter with id `{}` is already hosted", adapter.id()),
            )),
            Entry::Vacant(slot) => {
                info!(adapter_id = %adapter.id(), "adapter hosted");
                slot.insert(adapter);
                Ok(())
            }
        }
    }

    pub fn remove(&self, adapter_id: &str) -> Option<Arc<dyn HostedAdapter>> {
        self.adapters.remove(adapter_id).map(|(_, adapter)| adapter)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// An adapter the caller may see: it exists, is enabled and passes the
    /// adapter-level policy check.
    pub async fn get_adapter(
        &self,
        context: &CallerContext,
        adapter_id: &str,
    ) -> Option<Arc<dyn HostedAdapter>> {
        let adapter = self.adapters.get(adapter_id).map(|a| Arc::clone(a.value()))?;
        self.is_visible(&adapter, context).await.then_some(adapter)
    }

    async fn is_visible(&self, adapter: &Arc<dyn HostedAdapter>, context: &CallerContext) -> bool {
        adapter.is_enabled()
            && self
                .policy
                .authorize_adapter(&adapter.descriptor(), context)
                .await
    }

    /// Visible adapters matching `request`, sorted by name then id.
    pub async fn find_adapters(
        &self,
        context: &CallerContext,
        request: &FindAdaptersRequest,
    ) -> Vec<AdapterDescriptor> {
        let name = request.name.as_deref().map(str::to_lowercase);
        let description = request.description.as_deref().map(str::to_lowercase);
        let candidates: Vec<Arc<dyn HostedAdapter>> =
            self.adapters.iter().map(|a| Arc::clone(a.value())).collect();

        let mut matches = Vec::new();
        for adapter in candidates {
            if !self.is_visible(&adapter, context).await {
                continue;
            }
            let descriptor = adapter.descriptor();
            if let Some(name) = &name
                && !descriptor.name.to_lowercase().contains(name)
            {
                continue;
            }
            if let Some(description) = &description
                && !descriptor
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(description))
            {
                continue;
            }
            matches.push(descriptor);
        }
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let page_size = request.page_size.clamp(1, MAX_PAGE_SIZE);
        let page = request.page.max(1);
        matches
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect()
    }

    /// Resolve `uri` on `adapter_id` and run the feature-level policy check.
    pub async fn resolve_feature(
        &self,
        context: &CallerContext,
        adapter_id: &str,
        uri: &FeatureUri,
    ) -> ResolvedAdapterFeature<FeatureHandle> {
        let mut resolved = ResolvedAdapterFeature::unresolved(adapter_id, uri);
        let Some(adapter) = self.get_adapter(context, adapter_id).await else {
            debug!(adapter_id, "adapter not resolved");
            return resolved;
        };

        let entry = adapter.features().entry(uri).ok().flatten();
        resolved.adapter = Some(Arc::clone(&adapter));
        let Some(entry) = entry else {
            debug!(adapter_id, feature = %uri, "feature not resolved");
            return resolved;
        };

        resolved.is_authorized = self.authorize(&adapter, &entry.kind, context).await;
        resolved.feature = Some(entry.handle);
        resolved
    }

    /// Resolve a standard feature contract, e.g. `dyn TagSearch`.
    pub async fn resolve<C: FeatureContract + ?Sized>(
        &self,
        context: &CallerContext,
        adapter_id: &str,
    ) -> ResolvedAdapterFeature<Arc<C>> {
        let uri = C::FEATURE.uri();
        let resolved = self.resolve_feature(context, adapter_id, &uri).await;
        ResolvedAdapterFeature {
            feature: resolved
                .feature
                .as_ref()
                .and_then(|handle| C::from_object(handle.object())),
            adapter_id: resolved.adapter_id,
            uri: resolved.uri,
            adapter: resolved.adapter,
            is_authorized: resolved.is_authorized,
        }
    }

    async fn authorize(
        &self,
        adapter: &Arc<dyn HostedAdapter>,
        kind: &FeatureKind,
        context: &CallerContext,
    ) -> bool {
        let allowed = self
            .policy
            .authorize_feature(&adapter.descriptor(), kind, context)
            .await;
        if !allowed {
            info!(
                adapter_id = %adapter.id(),
                feature = %kind.uri(),
                connection_id = %context.connection_id(),
                "feature access denied"
            );
        }
        allowed
    }
}

impl Default for AdapterAccessor {
    fn default() -> Self {
        Self::new(Arc::new(AllowAll))
    }
}

impl std::fmt::Debug for AdapterAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterAccessor")
            .field("adapters", &self.adapters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapterhost_config::AdapterOptions;
    use adapterhost_core::{HealthCheck, Principal, StandardFeature};

    fn context() -> CallerContext {
        CallerContext::new(Principal::named("op"), "conn").unwrap()
    }

    fn adapter(id: &str, name: &str) -> Arc<dyn HostedAdapter> {
        Adapter::builder(id, AdapterOptions::named(name)).build().unwrap()
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let accessor = AdapterAccessor::default();
        accessor.add(adapter("a1", "One")).unwrap();
        assert!(matches!(
            accessor.add(adapter("a1", "Other")),
            Err(HostError::InvalidArgument { .. })
        ));
        assert_eq!(accessor.len(), 1);
    }

    #[tokio::test]
    async fn typed_resolution_returns_contract() {
        let accessor = AdapterAccessor::default();
        accessor.add(adapter("a1", "One")).unwrap();
        let resolved = accessor.resolve::<dyn HealthCheck>(&context(), "a1").await;
        assert!(resolved.adapter_resolved());
        assert!(resolved.feature_resolved());
        assert!(resolved.is_authorized);
        assert_eq!(resolved.uri, StandardFeature::HealthCheck.uri());
    }

    #[tokio::test]
    async fn paging_is_one_based_and_clamped() {
        let accessor = AdapterAccessor::default();
        for i in 0..5 {
            accessor
                .add(adapter(&format!("a{i}"), &format!("Adapter {i}")))
                .unwrap();
        }
        let ctx = context();

        let page = |page, page_size| FindAdaptersRequest {
            page,
            page_size,
            ..FindAdaptersRequest::default()
        };
        let second = accessor.find_adapters(&ctx, &page(2, 2)).await;
        assert_eq!(
            second.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["a2", "a3"]
        );
        // Page 0 is treated as page 1; page size 0 as 1.
        let first = accessor.find_adapters(&ctx, &page(0, 0)).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "a0");
        assert!(accessor.find_adapters(&ctx, &page(4, 2)).await.is_empty());
    }

    #[tokio::test]
    async fn name_filter_ignores_case() {
        let accessor = AdapterAccessor::default();
        accessor.add(adapter("h", "Plant Historian")).unwrap();
        accessor.add(adapter("o", "OPC Server")).unwrap();
        let request = FindAdaptersRequest {
            name: Some("historian".into()),
            ..FindAdaptersRequest::default()
        };
        let found = accessor.find_adapters(&context(), &request).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "h");
    }
}
