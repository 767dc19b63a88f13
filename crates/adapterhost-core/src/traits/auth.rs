// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization policy for adapter and feature access.

use async_trait::async_trait;

use crate::feature::FeatureKind;
use crate::types::{AdapterDescriptor, CallerContext};

/// Decides whether a caller may see an adapter or use one of its features.
///
/// The feature is identified by its [`FeatureKind`] tag, so one policy object
/// covers standard and extension features alike.
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync + 'static {
    /// Whether the caller may see the adapter at all. Denied adapters are
    /// reported to the caller as not found.
    async fn authorize_adapter(&self, adapter: &AdapterDescriptor, context: &CallerContext) -> bool {
        let _ = (adapter, context);
        true
    }

    /// Whether the caller may use `feature` on `adapter`.
    async fn authorize_feature(
        &self,
        adapter: &AdapterDescriptor,
        feature: &FeatureKind,
        context: &CallerContext,
    ) -> bool;
}

/// Policy that allows every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationPolicy for AllowAll {
    async fn authorize_feature(
        &self,
        _adapter: &AdapterDescriptor,
        _feature: &FeatureKind,
        _context: &CallerContext,
    ) -> bool {
        true
    }
}

/// Policy backed by a synchronous closure over `(adapter, feature, caller)`.
pub struct FnAuthorizationPolicy<F> {
    check: F,
}

impl<F> FnAuthorizationPolicy<F>
where
    F: Fn(&AdapterDescriptor, &FeatureKind, &CallerContext) -> bool + Send + Sync + 'static,
{
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<F> AuthorizationPolicy for FnAuthorizationPolicy<F>
where
    F: Fn(&AdapterDescriptor, &FeatureKind, &CallerContext) -> bool + Send + Sync + 'static,
{
    async fn authorize_feature(
        &self,
        adapter: &AdapterDescriptor,
        feature: &FeatureKind,
        context: &CallerContext,
    ) -> bool {
        (self.check)(adapter, feature, context)
    }
}
