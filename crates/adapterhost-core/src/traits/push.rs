// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push (subscription) feature contracts for tag values and event messages.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::HostError;
use crate::traits::feature::Feature;
use crate::types::{CallerContext, EventMessage, TagValueQueryResult, TopicSubscriptionUpdate};

/// Options for a snapshot tag value subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSnapshotTagValueSubscriptionRequest {
    /// Tags to subscribe to when the subscription is created.
    pub tags: Vec<String>,
    /// Minimum interval between values pushed for the subscription. Zero
    /// pushes every value as soon as it is received.
    #[serde(default)]
    pub publish_interval: Duration,
}

/// Pushes snapshot tag value changes to subscribers.
#[async_trait]
pub trait SnapshotTagValuePush: Feature {
    /// Creates a subscription. `updates` adds and removes tags while the
    /// subscription runs. The returned stream ends when `cancel` fires or the
    /// host shuts the subscription down.
    async fn subscribe(
        &self,
        context: &CallerContext,
        request: CreateSnapshotTagValueSubscriptionRequest,
        updates: BoxStream<'static, TopicSubscriptionUpdate>,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, TagValueQueryResult>, HostError>;
}

/// Options for an event message subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventMessageSubscriptionRequest {
    /// Only deliver messages whose topic matches (case-insensitive). `None`
    /// delivers every message.
    pub topic: Option<String>,
}

/// Pushes event messages to subscribers.
#[async_trait]
pub trait EventMessagePush: Feature {
    async fn subscribe(
        &self,
        context: &CallerContext,
        request: CreateEventMessageSubscriptionRequest,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, EventMessage>, HostError>;
}
