// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base traits shared by every feature implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::feature::{FeatureHandle, FeatureUri};
use crate::types::{CallerContext, HealthCheckResult};

/// The base trait for every feature object an adapter exposes.
///
/// All methods have defaults, so a feature only overrides what it needs.
#[async_trait]
pub trait Feature: Send + Sync + 'static {
    /// Synchronous teardown.
    ///
    /// Return `None` when the feature has no synchronous teardown path; the
    /// registry then falls back to [`Feature::dispose_async`].
    fn dispose(&self) -> Option<Result<(), HostError>> {
        None
    }

    /// Asynchronous teardown, used when [`Feature::dispose`] returns `None`.
    async fn dispose_async(&self) -> Result<(), HostError> {
        Ok(())
    }

    /// Reports the feature's own health.
    ///
    /// Features that do not participate in adapter health aggregation return `None`.
    async fn check_feature_health(&self) -> Option<HealthCheckResult> {
        None
    }
}

/// Describes one operation exposed by an extension feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionOperation {
    pub name: String,
    pub description: Option<String>,
}

/// A non-standard feature identified by one or more `asc:extensions/` URIs.
///
/// Extensions are invoked by operation name with JSON payloads so the host can
/// dispatch them without compile-time knowledge of their contracts.
#[async_trait]
pub trait ExtensionFeature: Feature {
    /// Extension URIs implemented by this object.
    fn extension_uris(&self) -> Vec<FeatureUri>;

    /// Human-readable name used in diagnostics.
    fn display_name(&self) -> String;

    /// Operations this extension supports.
    fn operations(&self) -> Vec<ExtensionOperation> {
        Vec::new()
    }

    /// Invokes an extension operation.
    async fn invoke(
        &self,
        context: &CallerContext,
        operation: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, HostError>;
}

/// An object that declares the features it implements.
///
/// This is the explicit registration step that replaces runtime discovery:
/// the provider lists a handle for each capability once, typically when the
/// adapter is built.
pub trait FeatureProvider: Send + Sync + 'static {
    /// Returns a handle for each feature contract this object implements.
    fn declare_features(self: Arc<Self>) -> Vec<FeatureHandle>;
}
