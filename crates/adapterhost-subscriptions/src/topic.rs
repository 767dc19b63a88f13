// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic-filtered subscriptions.
//!
//! Each subscription keeps an index of the topics it is interested in. The
//! index is read on the hot path by [`TopicBehavior::is_match`] and written
//! only by the subscription's own mutation loop, which applies subscribe and
//! unsubscribe requests one at a time in the order they were made.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use adapterhost_core::{
    CallerContext, EventMessage, HostError, TagValueQueryResult, TaskScheduler, TopicAction,
    TopicSubscriptionUpdate,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::manager::{SubscriptionBehavior, SubscriptionInfo, SubscriptionManager};

/// Maps topic names to domain objects and values to topic keys.
#[async_trait]
pub trait TopicResolver<T>: Send + Sync + 'static {
    /// Domain object a topic name resolves to.
    type Topic: Clone + Send + Sync + 'static;

    /// Resolve a topic name. `Ok(None)` means the topic does not exist.
    async fn resolve_topic(
        &self,
        context: &CallerContext,
        name: &str,
    ) -> Result<Option<Self::Topic>, HostError>;

    /// Key a resolved topic is indexed under. Compared case-insensitively
    /// with [`value_topic`](Self::value_topic).
    fn topic_key(&self, topic: &Self::Topic) -> String;

    /// Topic key of a value, or `None` if the value carries no topic.
    fn value_topic<'a>(&self, value: &'a T) -> Option<&'a str>;

    fn on_topic_added(&self, subscription_id: u64, topic: &Self::Topic) {
        let _ = (subscription_id, topic);
    }

    fn on_topic_removed(&self, subscription_id: u64, topic: &Self::Topic) {
        let _ = (subscription_id, topic);
    }
}

/// Values that name their own topic.
pub trait Topical {
    fn topic(&self) -> Option<&str>;
}

impl Topical for EventMessage {
    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

impl Topical for TagValueQueryResult {
    fn topic(&self) -> Option<&str> {
        Some(&self.tag_id)
    }
}

/// Resolver where every non-blank name is its own topic.
#[derive(Debug)]
pub struct StringTopics<T> {
    _value: PhantomData<fn(&T)>,
}

impl<T> StringTopics<T> {
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Default for StringTopics<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Topical + 'static> TopicResolver<T> for StringTopics<T> {
    type Topic = String;

    async fn resolve_topic(
        &self,
        _context: &CallerContext,
        name: &str,
    ) -> Result<Option<String>, HostError> {
        let name = name.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    fn topic_key(&self, topic: &String) -> String {
        topic.clone()
    }

    fn value_topic<'a>(&self, value: &'a T) -> Option<&'a str> {
        value.topic()
    }
}

struct TopicMutation {
    name: String,
    action: TopicAction,
    /// None for fire-and-forget requests.
    reply: Option<oneshot::Sender<bool>>,
}

impl TopicMutation {
    fn finish(self, applied: bool) {
        if let Some(reply) = self.reply {
            let _ = reply.send(applied);
        }
    }
}

/// Per-subscription topic index plus the sender half of its mutation loop.
pub struct TopicState<K> {
    subscription_id: u64,
    topics: RwLock<HashMap<String, K>>,
    mutations: mpsc::UnboundedSender<TopicMutation>,
    token: CancellationToken,
}

impl<K: Clone + Send + Sync + 'static> TopicState<K> {
    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    /// Add a topic. Resolves to false if the name does not resolve or the
    /// subscription has ended. Adding a topic twice is a no-op returning true.
    pub async fn subscribe_topic(&self, name: &str) -> bool {
        self.request(name, TopicAction::Subscribe).await
    }

    /// Remove a topic. Resolves to false if the topic was not subscribed.
    pub async fn unsubscribe_topic(&self, name: &str) -> bool {
        self.request(name, TopicAction::Unsubscribe).await
    }

    async fn request(&self, name: &str, action: TopicAction) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let (reply, done) = oneshot::channel();
        let mutation = TopicMutation {
            name: name.to_string(),
            action,
            reply: Some(reply),
        };
        if self.mutations.send(mutation).is_err() {
            return false;
        }
        done.await.unwrap_or(false)
    }

    /// Queue a request without waiting for its outcome.
    fn enqueue(&self, name: String, action: TopicAction) {
        let _ = self.mutations.send(TopicMutation {
            name,
            action,
            reply: None,
        });
    }

    /// Resolved topics, sorted by key.
    pub fn topics(&self) -> Vec<K> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(&String, &K)> = topics.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, topic)| topic.clone()).collect()
    }

    pub fn topic_count(&self) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether a topic key is subscribed, ignoring case.
    pub fn contains(&self, key: &str) -> bool {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key.to_lowercase())
    }

    /// Apply a stream of updates in order until it ends or the subscription
    /// is cancelled.
    pub async fn apply_updates(&self, mut updates: BoxStream<'static, TopicSubscriptionUpdate>) {
        loop {
            let update = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                update = updates.next() => match update {
                    Some(update) => update,
                    None => break,
                },
            };
            for name in &update.topics {
                let applied = self.request(name, update.action).await;
                debug!(
                    subscription_id = self.subscription_id,
                    topic = %name,
                    action = %update.action,
                    applied,
                    "topic update processed"
                );
            }
        }
    }
}

impl<K> std::fmt::Debug for TopicState<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .topics
            .read()
            .map(|t| t.len())
            .unwrap_or_default();
        f.debug_struct("TopicState")
            .field("subscription_id", &self.subscription_id)
            .field("topics", &count)
            .finish()
    }
}

/// [`SubscriptionBehavior`] that routes values by topic.
///
/// Subscriptions are created with an initial list of topic names, which are
/// queued on the mutation loop before any later request.
pub struct TopicBehavior<T, R> {
    resolver: Arc<R>,
    scheduler: Arc<dyn TaskScheduler>,
    _value: PhantomData<fn(&T)>,
}

impl<T, R> TopicBehavior<T, R> {
    pub fn new(resolver: Arc<R>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            resolver,
            scheduler,
            _value: PhantomData,
        }
    }

    pub fn resolver(&self) -> &Arc<R> {
        &self.resolver
    }
}

impl<T, R> SubscriptionBehavior<T> for TopicBehavior<T, R>
where
    T: Send + Sync + 'static,
    R: TopicResolver<T>,
{
    type State = TopicState<R::Topic>;
    type Init = Vec<String>;

    fn create_state(
        &self,
        info: &SubscriptionInfo,
        init: Vec<String>,
    ) -> Result<Arc<Self::State>, HostError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(TopicState {
            subscription_id: info.id,
            topics: RwLock::new(HashMap::new()),
            mutations: tx,
            token: info.token.clone(),
        });
        for name in init {
            state.enqueue(name, TopicAction::Subscribe);
        }

        self.scheduler.spawn(
            &format!("subscription-{}-topics", info.id),
            mutation_loop::<T, R>(
                Arc::clone(&self.resolver),
                Arc::clone(&state),
                info.context.clone(),
                rx,
            )
            .boxed(),
        );
        Ok(state)
    }

    fn validate(&self, value: &T) -> Result<(), HostError> {
        match self.resolver.value_topic(value) {
            Some(topic) if !topic.trim().is_empty() => Ok(()),
            _ => Err(HostError::invalid_argument(
                "value",
                "value does not carry a topic",
            )),
        }
    }

    fn is_match(&self, state: &Self::State, value: &T) -> bool {
        self.resolver
            .value_topic(value)
            .is_some_and(|topic| state.contains(topic))
    }
}

/// Manager whose subscriptions filter values by topic.
pub type TopicSubscriptionManager<T, R> = SubscriptionManager<T, TopicBehavior<T, R>>;

async fn mutation_loop<T, R>(
    resolver: Arc<R>,
    state: Arc<TopicState<R::Topic>>,
    context: CallerContext,
    mut rx: mpsc::UnboundedReceiver<TopicMutation>,
) where
    T: Send + Sync + 'static,
    R: TopicResolver<T>,
{
    let id = state.subscription_id;
    loop {
        let mutation = tokio::select! {
            biased;
            _ = state.token.cancelled() => break,
            mutation = rx.recv() => match mutation {
                Some(mutation) => mutation,
                None => break,
            },
        };

        let resolved = tokio::select! {
            biased;
            _ = state.token.cancelled() => break,
            resolved = resolver.resolve_topic(&context, &mutation.name) => resolved,
        };
        let topic = match resolved {
            Ok(Some(topic)) => topic,
            Ok(None) => {
                debug!(subscription_id = id, topic = %mutation.name, "topic not found");
                mutation.finish(false);
                continue;
            }
            Err(err) => {
                warn!(subscription_id = id, topic = %mutation.name, error = %err, "topic resolution failed");
                mutation.finish(false);
                continue;
            }
        };

        let key = resolver.topic_key(&topic).to_lowercase();
        let applied = match mutation.action {
            TopicAction::Subscribe => {
                let added = {
                    let mut topics = state.topics.write().unwrap_or_else(PoisonError::into_inner);
                    match topics.entry(key) {
                        Entry::Occupied(_) => false,
                        Entry::Vacant(slot) => {
                            slot.insert(topic.clone());
                            true
                        }
                    }
                };
                if added {
                    resolver.on_topic_added(id, &topic);
                }
                true
            }
            TopicAction::Unsubscribe => {
                let removed = state
                    .topics
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
                match removed {
                    Some(removed) => {
                        resolver.on_topic_removed(id, &removed);
                        true
                    }
                    None => false,
                }
            }
        };
        mutation.finish(applied);
    }

    // Requests still queued are dropped, so their callers see false.
    rx.close();
    while rx.try_recv().is_ok() {}

    let remaining: Vec<R::Topic> = state
        .topics
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .drain()
        .map(|(_, topic)| topic)
        .collect();
    for topic in &remaining {
        resolver.on_topic_removed(id, topic);
    }
    debug!(subscription_id = id, "topic mutation loop stopped");
}
