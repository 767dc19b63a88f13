// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health check feature contract.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::HostError;
use crate::traits::feature::Feature;
use crate::types::{CallerContext, HealthCheckResult};

/// Reports the aggregated health of an adapter and pushes changes to subscribers.
#[async_trait]
pub trait HealthCheck: Feature {
    /// Computes the current health of the adapter.
    async fn check_health(&self, context: &CallerContext) -> Result<HealthCheckResult, HostError>;

    /// Streams health results, starting with the latest known result and
    /// followed by every subsequent change. The stream ends when `cancel` fires.
    async fn subscribe_health(
        &self,
        context: &CallerContext,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, HealthCheckResult>, HostError>;
}
