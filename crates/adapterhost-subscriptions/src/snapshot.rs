// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot tag value push built on topic subscriptions.
//!
//! Topics are tags. Subscribers name tags by id or name; a [`TagResolver`]
//! turns the name into a [`TagIdentifier`] and values are routed by tag id.

use std::sync::Arc;

use adapterhost_config::SubscriptionManagerOptions;
use adapterhost_core::{
    CallerContext, CreateSnapshotTagValueSubscriptionRequest, Feature, HostError,
    SnapshotTagValuePush, TagIdentifier, TagValueQueryResult, TaskScheduler,
    TopicSubscriptionUpdate,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::manager::SubscriptionOptions;
use crate::topic::{TopicBehavior, TopicResolver, TopicSubscriptionManager};

/// Looks up tags on the data source.
#[async_trait]
pub trait TagResolver: Send + Sync + 'static {
    /// Resolve a tag by id or name. `Ok(None)` if the tag does not exist.
    async fn resolve_tag(
        &self,
        context: &CallerContext,
        tag: &str,
    ) -> Result<Option<TagIdentifier>, HostError>;

    /// Called when a subscription starts watching a tag.
    fn on_tag_added(&self, subscription_id: u64, tag: &TagIdentifier) {
        let _ = (subscription_id, tag);
    }

    /// Called when a subscription stops watching a tag.
    fn on_tag_removed(&self, subscription_id: u64, tag: &TagIdentifier) {
        let _ = (subscription_id, tag);
    }
}

/// Adapts a [`TagResolver`] to the topic controller.
pub struct TagTopics<R> {
    tags: Arc<R>,
}

#[async_trait]
impl<R: TagResolver> TopicResolver<TagValueQueryResult> for TagTopics<R> {
    type Topic = TagIdentifier;

    async fn resolve_topic(
        &self,
        context: &CallerContext,
        name: &str,
    ) -> Result<Option<TagIdentifier>, HostError> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        self.tags.resolve_tag(context, name).await
    }

    fn topic_key(&self, topic: &TagIdentifier) -> String {
        topic.id.clone()
    }

    fn value_topic<'a>(&self, value: &'a TagValueQueryResult) -> Option<&'a str> {
        Some(&value.tag_id)
    }

    fn on_topic_added(&self, subscription_id: u64, topic: &TagIdentifier) {
        self.tags.on_tag_added(subscription_id, topic);
    }

    fn on_topic_removed(&self, subscription_id: u64, topic: &TagIdentifier) {
        self.tags.on_tag_removed(subscription_id, topic);
    }
}

/// Push feature for snapshot tag values.
///
/// The latest value of every tag is cached so new subscribers receive the
/// current value of their initial tags straight away.
pub struct SnapshotTagValueManager<R: TagResolver> {
    manager: TopicSubscriptionManager<TagValueQueryResult, TagTopics<R>>,
    latest: DashMap<String, TagValueQueryResult>,
    scheduler: Arc<dyn TaskScheduler>,
}

impl<R: TagResolver> SnapshotTagValueManager<R> {
    pub fn new(
        resolver: Arc<R>,
        options: SubscriptionManagerOptions,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<Self, HostError> {
        let behavior = TopicBehavior::new(
            Arc::new(TagTopics { tags: resolver }),
            Arc::clone(&scheduler),
        );
        Ok(Self {
            manager: TopicSubscriptionManager::new(
                "snapshot-tag-values",
                options,
                behavior,
                Arc::clone(&scheduler),
            )?,
            latest: DashMap::new(),
            scheduler,
        })
    }

    pub fn manager(&self) -> &TopicSubscriptionManager<TagValueQueryResult, TagTopics<R>> {
        &self.manager
    }

    /// Record a new value and push it to subscribers of its tag.
    pub async fn publish(&self, value: TagValueQueryResult) -> Result<(), HostError> {
        self.latest
            .insert(value.tag_id.to_lowercase(), value.clone());
        self.manager.value_received(value, None).await
    }

    /// Latest value seen for a tag id.
    pub fn latest_value(&self, tag_id: &str) -> Option<TagValueQueryResult> {
        self.latest
            .get(&tag_id.to_lowercase())
            .map(|v| v.value().clone())
    }

    pub fn subscription_count(&self) -> usize {
        self.manager.subscription_count()
    }
}

#[async_trait]
impl<R: TagResolver> Feature for SnapshotTagValueManager<R> {
    fn dispose(&self) -> Option<Result<(), HostError>> {
        self.manager.dispose();
        self.latest.clear();
        Some(Ok(()))
    }
}

#[async_trait]
impl<R: TagResolver> SnapshotTagValuePush for SnapshotTagValueManager<R> {
    async fn subscribe(
        &self,
        context: &CallerContext,
        request: CreateSnapshotTagValueSubscriptionRequest,
        updates: BoxStream<'static, TopicSubscriptionUpdate>,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, TagValueQueryResult>, HostError> {
        let options = SubscriptionOptions::default().with_publish_interval(request.publish_interval);
        let subscription =
            self.manager
                .create_subscription(context, options, Vec::new(), Some(cancel))?;
        let state = Arc::clone(subscription.state());

        for tag in &request.tags {
            if !state.subscribe_topic(tag).await {
                debug!(subscription_id = subscription.id(), tag = %tag, "initial tag not subscribed");
            }
        }
        for tag in state.topics() {
            if let Some(value) = self.latest_value(&tag.id) {
                subscription.channel().publish(value, true);
            }
        }

        self.scheduler.spawn(
            &format!("subscription-{}-updates", subscription.id()),
            async move { state.apply_updates(updates).await }.boxed(),
        );
        Ok(Box::pin(subscription.into_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapterhost_core::{Principal, TagValue, TagValueQuality, TokioTaskScheduler};
    use futures::StreamExt;

    struct Tags;

    #[async_trait]
    impl TagResolver for Tags {
        async fn resolve_tag(
            &self,
            _context: &CallerContext,
            tag: &str,
        ) -> Result<Option<TagIdentifier>, HostError> {
            Ok(match tag {
                "t1" | "Tank Level" => Some(TagIdentifier {
                    id: "t1".into(),
                    name: "Tank Level".into(),
                }),
                "t2" => Some(TagIdentifier {
                    id: "t2".into(),
                    name: "Pressure".into(),
                }),
                _ => None,
            })
        }
    }

    fn value(tag_id: &str, v: f64) -> TagValueQueryResult {
        TagValueQueryResult {
            tag_id: tag_id.into(),
            tag_name: tag_id.into(),
            value: TagValue {
                timestamp: chrono::Utc::now(),
                value: serde_json::json!(v),
                quality: TagValueQuality::Good,
            },
        }
    }

    fn feature() -> SnapshotTagValueManager<Tags> {
        SnapshotTagValueManager::new(
            Arc::new(Tags),
            SubscriptionManagerOptions::default(),
            Arc::new(TokioTaskScheduler::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn tags_resolve_by_name_and_route_by_id() {
        let feature = feature();
        let ctx = CallerContext::new(Principal::named("op"), "conn").unwrap();
        let request = CreateSnapshotTagValueSubscriptionRequest {
            tags: vec!["Tank Level".into(), "unknown".into()],
            ..Default::default()
        };
        let mut stream = feature
            .subscribe(&ctx, request, futures::stream::pending().boxed(), CancellationToken::new())
            .await
            .unwrap();

        feature.publish(value("t2", 1.0)).await.unwrap();
        feature.publish(value("t1", 2.0)).await.unwrap();

        let received = stream.next().await.unwrap();
        assert_eq!(received.tag_id, "t1");
    }

    #[tokio::test]
    async fn new_subscribers_get_the_cached_value() {
        let feature = feature();
        feature.publish(value("t1", 5.0)).await.unwrap();

        let ctx = CallerContext::new(Principal::named("op"), "conn").unwrap();
        let request = CreateSnapshotTagValueSubscriptionRequest {
            tags: vec!["t1".into()],
            ..Default::default()
        };
        let mut stream = feature
            .subscribe(&ctx, request, futures::stream::pending().boxed(), CancellationToken::new())
            .await
            .unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.value.value, serde_json::json!(5.0));
    }

    #[tokio::test]
    async fn cancel_token_ends_stream() {
        let feature = feature();
        let ctx = CallerContext::new(Principal::named("op"), "conn").unwrap();
        let cancel = CancellationToken::new();
        let mut stream = feature
            .subscribe(
                &ctx,
                CreateSnapshotTagValueSubscriptionRequest::default(),
                futures::stream::pending().boxed(),
                cancel.clone(),
            )
            .await
            .unwrap();
        cancel.cancel();
        assert!(stream.next().await.is_none());
        assert_eq!(feature.subscription_count(), 0);
    }
}
