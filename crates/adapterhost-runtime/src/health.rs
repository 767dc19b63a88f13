// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter health aggregation and health push.
//!
//! [`HealthCheckManager`] is the adapter's `HealthCheck` feature. It asks its
//! [`HealthSource`] for the per-feature results, wraps them in one composite
//! result, caches it, and pushes every change to health subscribers.

use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use adapterhost_config::SubscriptionManagerOptions;
use adapterhost_core::{
    CallerContext, Feature, HealthCheck, HealthCheckResult, HostError, Principal, TaskScheduler,
};
use adapterhost_subscriptions::{BroadcastBehavior, SubscriptionManager, SubscriptionOptions};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Produces the individual health results of an adapter.
#[async_trait]
pub trait HealthSource: Send + Sync + 'static {
    async fn health_results(&self, context: &CallerContext) -> Vec<HealthCheckResult>;
}

/// Caches and pushes adapter health.
pub struct HealthCheckManager {
    adapter_id: String,
    source: OnceLock<Weak<dyn HealthSource>>,
    latest: RwLock<Option<HealthCheckResult>>,
    subscriptions: SubscriptionManager<HealthCheckResult, BroadcastBehavior>,
}

impl HealthCheckManager {
    pub fn new(
        adapter_id: impl Into<String>,
        options: SubscriptionManagerOptions,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<Self, HostError> {
        let adapter_id = adapter_id.into();
        let subscriptions = SubscriptionManager::new(
            format!("{adapter_id}-health"),
            options,
            BroadcastBehavior,
            scheduler,
        )?;
        Ok(Self {
            adapter_id,
            source: OnceLock::new(),
            latest: RwLock::new(None),
            subscriptions,
        })
    }

    /// Attach the source results are computed from. Only the first call has
    /// an effect.
    pub fn bind(&self, source: Weak<dyn HealthSource>) {
        let _ = self.source.set(source);
    }

    /// Forget the cached result. Called when the adapter starts.
    pub fn init(&self) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The last computed result, if any.
    pub fn latest(&self) -> Option<HealthCheckResult> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    /// Recompute health on behalf of the adapter itself.
    pub async fn recalculate(&self) -> Result<HealthCheckResult, HostError> {
        let context = CallerContext::new(
            Principal::named("adapterhost"),
            format!("adapter:{}", self.adapter_id),
        )?;
        self.compute(&context).await
    }

    async fn compute(&self, context: &CallerContext) -> Result<HealthCheckResult, HostError> {
        let source = self
            .source
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| HostError::disposed(format!("adapter {}", self.adapter_id)))?;
        let results = source.health_results(context).await;
        let aggregate = HealthCheckResult::composite("Adapter health", results);
        self.store(aggregate.clone()).await;
        Ok(aggregate)
    }

    /// Cache `result` and push it to subscribers if it differs from the
    /// previous one.
    async fn store(&self, result: HealthCheckResult) {
        let changed = {
            let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
            let changed = latest.as_ref() != Some(&result);
            if changed {
                *latest = Some(result.clone());
            }
            changed
        };
        if !changed {
            return;
        }
        info!(adapter_id = %self.adapter_id, status = %result.status, "adapter health changed");
        if let Err(err) = self.subscriptions.value_received(result, None).await {
            debug!(adapter_id = %self.adapter_id, error = %err, "health update not published");
        }
    }
}

#[async_trait]
impl Feature for HealthCheckManager {
    fn dispose(&self) -> Option<Result<(), HostError>> {
        self.subscriptions.dispose();
        Some(Ok(()))
    }
}

#[async_trait]
impl HealthCheck for HealthCheckManager {
    async fn check_health(&self, context: &CallerContext) -> Result<HealthCheckResult, HostError> {
        self.compute(context).await
    }

    async fn subscribe_health(
        &self,
        context: &CallerContext,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, HealthCheckResult>, HostError> {
        let mut current = match self.latest() {
            Some(latest) => latest,
            None => self.compute(context).await?,
        };
        let subscription = self.subscriptions.create_subscription(
            context,
            SubscriptionOptions::named("health"),
            (),
            Some(cancel),
        )?;
        // A change that raced the subscription is already in the cache.
        if let Some(latest) = self.latest() {
            current = latest;
        }
        subscription.channel().publish(current, true);
        Ok(Box::pin(subscription.into_stream()))
    }
}

impl std::fmt::Debug for HealthCheckManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckManager")
            .field("adapter_id", &self.adapter_id)
            .field("latest", &self.latest())
            .finish()
    }
}
