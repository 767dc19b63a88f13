// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event message push.

use std::sync::Arc;

use adapterhost_config::SubscriptionManagerOptions;
use adapterhost_core::{
    CallerContext, CreateEventMessageSubscriptionRequest, EventMessage, EventMessagePush, Feature,
    HostError, TaskScheduler,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::manager::{SubscriptionBehavior, SubscriptionInfo, SubscriptionManager, SubscriptionOptions};

/// Delivers every message, or only those whose topic equals the
/// subscription's filter (ignoring case).
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter;

impl SubscriptionBehavior<EventMessage> for EventFilter {
    type State = Option<String>;
    type Init = Option<String>;

    fn create_state(
        &self,
        _info: &SubscriptionInfo,
        topic: Option<String>,
    ) -> Result<Arc<Option<String>>, HostError> {
        let topic = topic
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        Ok(Arc::new(topic))
    }

    fn is_match(&self, filter: &Option<String>, message: &EventMessage) -> bool {
        match (filter, &message.topic) {
            (None, _) => true,
            (Some(filter), Some(topic)) => topic.to_lowercase() == *filter,
            (Some(_), None) => false,
        }
    }
}

/// Push feature for event messages.
pub struct EventMessageManager {
    manager: SubscriptionManager<EventMessage, EventFilter>,
}

impl EventMessageManager {
    pub fn new(
        options: SubscriptionManagerOptions,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<Self, HostError> {
        Ok(Self {
            manager: SubscriptionManager::new("event-messages", options, EventFilter, scheduler)?,
        })
    }

    pub fn manager(&self) -> &SubscriptionManager<EventMessage, EventFilter> {
        &self.manager
    }

    pub async fn publish(&self, message: EventMessage) -> Result<(), HostError> {
        self.manager.value_received(message, None).await
    }

    pub fn subscription_count(&self) -> usize {
        self.manager.subscription_count()
    }
}

#[async_trait]
impl Feature for EventMessageManager {
    fn dispose(&self) -> Option<Result<(), HostError>> {
        self.manager.dispose();
        Some(Ok(()))
    }
}

#[async_trait]
impl EventMessagePush for EventMessageManager {
    async fn subscribe(
        &self,
        context: &CallerContext,
        request: CreateEventMessageSubscriptionRequest,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, EventMessage>, HostError> {
        let subscription = self.manager.create_subscription(
            context,
            SubscriptionOptions::default(),
            request.topic,
            Some(cancel),
        )?;
        Ok(Box::pin(subscription.into_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapterhost_core::{EventPriority, Principal, TokioTaskScheduler};
    use futures::StreamExt;

    fn message(topic: Option<&str>, text: &str) -> EventMessage {
        EventMessage {
            topic: topic.map(str::to_string),
            timestamp: chrono::Utc::now(),
            priority: EventPriority::Normal,
            message: text.into(),
        }
    }

    #[tokio::test]
    async fn topic_filter_ignores_case() {
        let events = EventMessageManager::new(
            SubscriptionManagerOptions::default(),
            Arc::new(TokioTaskScheduler::new()),
        )
        .unwrap();
        let ctx = CallerContext::new(Principal::named("op"), "conn").unwrap();

        let mut filtered = events
            .subscribe(
                &ctx,
                CreateEventMessageSubscriptionRequest {
                    topic: Some("Alarms".into()),
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let mut all = events
            .subscribe(&ctx, CreateEventMessageSubscriptionRequest::default(), CancellationToken::new())
            .await
            .unwrap();

        events.publish(message(None, "boot")).await.unwrap();
        events.publish(message(Some("ALARMS"), "high level")).await.unwrap();

        assert_eq!(filtered.next().await.unwrap().message, "high level");
        assert_eq!(all.next().await.unwrap().message, "boot");
        assert_eq!(all.next().await.unwrap().message, "high level");
    }

    #[tokio::test]
    async fn dispose_rejects_new_subscriptions() {
        let events = EventMessageManager::new(
            SubscriptionManagerOptions::default(),
            Arc::new(TokioTaskScheduler::new()),
        )
        .unwrap();
        assert!(matches!(Feature::dispose(&events), Some(Ok(()))));
        let ctx = CallerContext::new(Principal::named("op"), "conn").unwrap();
        let result = events
            .subscribe(&ctx, CreateEventMessageSubscriptionRequest::default(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(HostError::Disposed { .. })));
    }
}
