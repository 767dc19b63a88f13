// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of one upstream value stream to many subscriptions.
//!
//! `value_received` decides which subscribers match and queues the value
//! with its recipients. A single dispatch loop drains the queue and publishes
//! to each recipient's channel, so delivery order is FIFO per manager and a
//! full subscriber never holds up the others.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use adapterhost_config::SubscriptionManagerOptions;
use adapterhost_config::model::MAX_NAME_LENGTH;
use adapterhost_config::validation::validate_subscription_options;
use adapterhost_core::{CallerContext, HostError, TaskScheduler};
use dashmap::DashMap;
use futures::{FutureExt, Stream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::{ChannelConfig, SubscriptionChannel, SubscriptionStream};

/// Identity of a subscription, passed to behavior hooks.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    pub id: u64,
    pub context: CallerContext,
    pub name: Option<String>,
    /// Fires when the subscription ends.
    pub token: CancellationToken,
}

/// Per-subscription options.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionOptions {
    /// Display name, at most 200 characters.
    pub name: Option<String>,
    /// Zero delivers every value as it arrives.
    pub publish_interval: Duration,
    /// Output buffer size. Defaults to the manager's channel capacity.
    pub capacity: Option<usize>,
}

impl SubscriptionOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Lifecycle notifications broadcast by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Added { id: u64 },
    Cancelled { id: u64 },
}

/// Value semantics for a [`SubscriptionManager`].
///
/// The behavior builds per-subscription state, decides which subscriptions
/// a value goes to, and observes lifecycle changes. Hooks run synchronously
/// on the calling task and must not block.
pub trait SubscriptionBehavior<T>: Send + Sync + 'static {
    /// State kept for each subscription.
    type State: Send + Sync + 'static;
    /// Data supplied when a subscription is created.
    type Init: Send;

    fn create_state(
        &self,
        info: &SubscriptionInfo,
        init: Self::Init,
    ) -> Result<Arc<Self::State>, HostError>;

    /// Rejects values that cannot be delivered to anyone.
    fn validate(&self, value: &T) -> Result<(), HostError> {
        let _ = value;
        Ok(())
    }

    /// Whether `value` goes to the subscription with `state`. Defaults to all.
    fn is_match(&self, state: &Self::State, value: &T) -> bool {
        let _ = (state, value);
        true
    }

    fn on_subscription_added(&self, info: &SubscriptionInfo, state: &Self::State) {
        let _ = (info, state);
    }

    fn on_subscription_cancelled(&self, info: &SubscriptionInfo, state: &Self::State) {
        let _ = (info, state);
    }

    /// Called by the dispatch loop before a value is delivered.
    fn on_value_published(&self, value: &T, recipients: usize) {
        let _ = (value, recipients);
    }
}

/// Behavior that delivers every value to every subscription.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastBehavior;

impl<T> SubscriptionBehavior<T> for BroadcastBehavior {
    type State = ();
    type Init = ();

    fn create_state(&self, _info: &SubscriptionInfo, _init: ()) -> Result<Arc<()>, HostError> {
        Ok(Arc::new(()))
    }
}

struct ActiveSubscription<T, S> {
    info: SubscriptionInfo,
    channel: Arc<SubscriptionChannel<T>>,
    state: Arc<S>,
}

struct Dispatch<T> {
    value: T,
    recipients: Vec<Arc<SubscriptionChannel<T>>>,
}

struct ManagerInner<T, B: SubscriptionBehavior<T>> {
    name: String,
    options: SubscriptionManagerOptions,
    behavior: Arc<B>,
    scheduler: Arc<dyn TaskScheduler>,
    subscriptions: DashMap<u64, ActiveSubscription<T, B::State>>,
    next_id: AtomicU64,
    reserved: AtomicUsize,
    lifetime: CancellationToken,
    dispatch: mpsc::Sender<Dispatch<T>>,
    events: broadcast::Sender<SubscriptionEvent>,
    disposed: AtomicBool,
}

impl<T, B: SubscriptionBehavior<T>> Drop for ManagerInner<T, B> {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

/// Manages the subscriptions of one feature.
pub struct SubscriptionManager<T, B: SubscriptionBehavior<T>> {
    inner: Arc<ManagerInner<T, B>>,
}

impl<T, B> SubscriptionManager<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: SubscriptionBehavior<T>,
{
    /// Create a manager and spawn its dispatch loop.
    pub fn new(
        name: impl Into<String>,
        options: SubscriptionManagerOptions,
        behavior: B,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<Self, HostError> {
        validate_subscription_options(&options).map_err(|errors| {
            HostError::Options(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let name = name.into();
        let (dispatch, rx) = mpsc::channel(options.dispatch_capacity);
        let (events, _) = broadcast::channel(64);
        let behavior = Arc::new(behavior);
        let lifetime = CancellationToken::new();

        scheduler.spawn(
            &format!("{name}-dispatch"),
            dispatch_loop(name.clone(), Arc::clone(&behavior), rx, lifetime.clone()).boxed(),
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                name,
                options,
                behavior,
                scheduler,
                subscriptions: DashMap::new(),
                next_id: AtomicU64::new(0),
                reserved: AtomicUsize::new(0),
                lifetime,
                dispatch,
                events,
                disposed: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn behavior(&self) -> &B {
        &self.inner.behavior
    }

    pub fn options(&self) -> &SubscriptionManagerOptions {
        &self.inner.options
    }

    /// Token that fires when the manager is disposed.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.inner.lifetime
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.is_disposed() {
            return Err(HostError::disposed(format!(
                "subscription manager `{}`",
                self.inner.name
            )));
        }
        Ok(())
    }

    /// Create a subscription.
    ///
    /// Fails with [`HostError::CapacityExceeded`] when the manager is at its
    /// subscription limit. The subscription ends when the returned handle is
    /// dropped or cancelled, when `caller_token` fires, or when the manager
    /// is disposed.
    pub fn create_subscription(
        &self,
        context: &CallerContext,
        options: SubscriptionOptions,
        init: B::Init,
        caller_token: Option<CancellationToken>,
    ) -> Result<Subscription<T, B::State>, HostError> {
        self.ensure_live()?;
        if let Some(name) = &options.name
            && name.chars().count() > MAX_NAME_LENGTH
        {
            return Err(HostError::invalid_argument(
                "name",
                format!("subscription name must be at most {MAX_NAME_LENGTH} characters"),
            ));
        }

        self.reserve_slot()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let info = SubscriptionInfo {
            id,
            context: context.clone(),
            name: options.name.clone(),
            token: self.inner.lifetime.child_token(),
        };

        let state = match self.inner.behavior.create_state(&info, init) {
            Ok(state) => state,
            Err(err) => {
                info.token.cancel();
                self.inner.reserved.fetch_sub(1, Ordering::AcqRel);
                return Err(err);
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let (channel, stream) = SubscriptionChannel::new(ChannelConfig {
            id,
            context: context.clone(),
            name: options.name,
            publish_interval: options.publish_interval,
            capacity: options
                .capacity
                .unwrap_or(self.inner.options.channel_capacity),
            token: info.token.clone(),
            caller_token,
            cleanup: Some(Box::new(move || release(weak, id))),
        });

        self.inner.subscriptions.insert(
            id,
            ActiveSubscription {
                info: info.clone(),
                channel: Arc::clone(&channel),
                state: Arc::clone(&state),
            },
        );
        // Announced before the channel runs so a subscription that ends at
        // once is still reported as added before it is cancelled.
        self.inner.behavior.on_subscription_added(&info, &state);
        let _ = self.inner.events.send(SubscriptionEvent::Added { id });
        info!(
            manager = %self.inner.name,
            subscription_id = id,
            connection_id = %context.connection_id(),
            "subscription created"
        );
        channel.start(self.inner.scheduler.as_ref());

        Ok(Subscription {
            channel,
            state,
            stream,
        })
    }

    fn reserve_slot(&self) -> Result<(), HostError> {
        let limit = self.inner.options.max_subscriptions;
        if limit == 0 {
            self.inner.reserved.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }
        self.inner
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| HostError::CapacityExceeded {
                resource: format!("subscriptions of `{}`", self.inner.name),
                limit,
            })
    }

    /// Queue `value` for every matching subscription.
    ///
    /// Waits for room in the dispatch queue. Returns
    /// [`HostError::Cancelled`] if `cancel` fires first.
    pub async fn value_received(
        &self,
        value: T,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), HostError> {
        self.ensure_live()?;
        self.inner.behavior.validate(&value)?;

        let recipients: Vec<Arc<SubscriptionChannel<T>>> = self
            .inner
            .subscriptions
            .iter()
            .filter(|s| self.inner.behavior.is_match(&s.state, &value))
            .map(|s| Arc::clone(&s.channel))
            .collect();

        let item = Dispatch { value, recipients };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled => Err(HostError::Cancelled),
            _ = self.inner.lifetime.cancelled() => Err(HostError::disposed(format!(
                "subscription manager `{}`",
                self.inner.name
            ))),
            sent = self.inner.dispatch.send(item) => sent.map_err(|_| {
                HostError::disposed(format!("subscription manager `{}`", self.inner.name))
            }),
        }
    }

    /// Queue a batch of values in order.
    pub async fn values_received(
        &self,
        values: impl IntoIterator<Item = T>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), HostError> {
        for value in values {
            self.value_received(value, cancel).await?;
        }
        Ok(())
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Ids of active subscriptions.
    pub fn subscription_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.inner.subscriptions.iter().map(|s| *s.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// State of an active subscription.
    pub fn subscription_state(&self, id: u64) -> Option<Arc<B::State>> {
        self.inner
            .subscriptions
            .get(&id)
            .map(|s| Arc::clone(&s.state))
    }

    /// Channels of every active subscription, e.g. for pushing an initial value.
    pub fn channels(&self) -> Vec<Arc<SubscriptionChannel<T>>> {
        self.inner
            .subscriptions
            .iter()
            .map(|s| Arc::clone(&s.channel))
            .collect()
    }

    /// Cancel one subscription by id. Returns false if it is not active.
    pub fn cancel_subscription(&self, id: u64) -> bool {
        let channel = self
            .inner
            .subscriptions
            .get(&id)
            .map(|s| Arc::clone(&s.channel));
        match channel {
            Some(channel) => {
                channel.cancel();
                true
            }
            None => false,
        }
    }

    /// Lifecycle events for subscriptions created after this call.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.inner.events.subscribe()
    }

    /// Cancel every subscription and stop the dispatch loop.
    ///
    /// Calling this more than once is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.lifetime.cancel();
        for channel in self.channels() {
            channel.dispose();
        }
        self.inner.subscriptions.clear();
        info!(manager = %self.inner.name, "subscription manager disposed");
    }
}

impl<T, B: SubscriptionBehavior<T>> std::fmt::Debug for SubscriptionManager<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("name", &self.inner.name)
            .field("subscriptions", &self.inner.subscriptions.len())
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .finish()
    }
}

/// Cleanup for a completed subscription: drop it from the index, free its
/// slot, and notify.
fn release<T, B: SubscriptionBehavior<T>>(manager: Weak<ManagerInner<T, B>>, id: u64) {
    let Some(inner) = manager.upgrade() else {
        return;
    };
    inner.reserved.fetch_sub(1, Ordering::AcqRel);
    if let Some((_, removed)) = inner.subscriptions.remove(&id) {
        inner
            .behavior
            .on_subscription_cancelled(&removed.info, &removed.state);
    }
    let _ = inner.events.send(SubscriptionEvent::Cancelled { id });
    info!(manager = %inner.name, subscription_id = id, "subscription cancelled");
}

async fn dispatch_loop<T, B>(
    name: String,
    behavior: Arc<B>,
    mut rx: mpsc::Receiver<Dispatch<T>>,
    lifetime: CancellationToken,
) where
    T: Clone + Send + 'static,
    B: SubscriptionBehavior<T>,
{
    loop {
        let item = tokio::select! {
            biased;
            _ = lifetime.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        behavior.on_value_published(&item.value, item.recipients.len());
        for channel in &item.recipients {
            if !channel.publish(item.value.clone(), false) {
                debug!(
                    manager = %name,
                    subscription_id = channel.id(),
                    "value not delivered to subscriber"
                );
            }
        }
    }
    rx.close();
    debug!(manager = %name, "dispatch loop stopped");
}

/// A live subscription: its state, its channel, and the subscriber stream.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription<T, S> {
    channel: Arc<SubscriptionChannel<T>>,
    state: Arc<S>,
    stream: SubscriptionStream<T>,
}

impl<T: Send + 'static, S> Subscription<T, S> {
    pub fn id(&self) -> u64 {
        self.channel.id()
    }

    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    pub fn channel(&self) -> &Arc<SubscriptionChannel<T>> {
        &self.channel
    }

    pub fn token(&self) -> &CancellationToken {
        self.channel.token()
    }

    pub fn cancel(&self) {
        self.channel.cancel();
    }

    /// Keep only the value stream. The subscription lives until it is dropped.
    pub fn into_stream(self) -> SubscriptionStream<T> {
        self.stream
    }
}

impl<T, S> Unpin for Subscription<T, S> {}

impl<T, S> Stream for Subscription<T, S> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapterhost_core::{Principal, TokioTaskScheduler};
    use futures::StreamExt;
    use tracing_test::traced_test;

    fn context() -> CallerContext {
        CallerContext::new(Principal::named("tester"), "conn-1").unwrap()
    }

    fn manager(max: usize) -> SubscriptionManager<u32, BroadcastBehavior> {
        SubscriptionManager::new(
            "test",
            SubscriptionManagerOptions::default().with_max_subscriptions(max),
            BroadcastBehavior,
            Arc::new(TokioTaskScheduler::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let manager = manager(0);
        let a = manager
            .create_subscription(&context(), SubscriptionOptions::default(), (), None)
            .unwrap();
        let b = manager
            .create_subscription(&context(), SubscriptionOptions::default(), (), None)
            .unwrap();
        assert!(b.id() > a.id());
        assert_eq!(manager.subscription_ids(), vec![a.id(), b.id()]);
    }

    #[tokio::test]
    async fn oversized_name_is_rejected() {
        let manager = manager(0);
        let err = manager
            .create_subscription(
                &context(),
                SubscriptionOptions::named("n".repeat(201)),
                (),
                None,
            )
            .err()
            .unwrap();
        assert!(matches!(err, HostError::InvalidArgument { .. }));
        assert_eq!(manager.subscription_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let manager = manager(0);
        let mut a = manager
            .create_subscription(&context(), SubscriptionOptions::default(), (), None)
            .unwrap();
        let mut b = manager
            .create_subscription(&context(), SubscriptionOptions::default(), (), None)
            .unwrap();

        manager.value_received(7, None).await.unwrap();
        assert_eq!(a.next().await, Some(7));
        assert_eq!(b.next().await, Some(7));
    }

    #[tokio::test]
    async fn dropping_handle_removes_subscription() {
        let manager = manager(1);
        let mut events = manager.subscribe_events();
        let sub = manager
            .create_subscription(&context(), SubscriptionOptions::default(), (), None)
            .unwrap();
        let id = sub.id();
        assert_eq!(events.recv().await.unwrap(), SubscriptionEvent::Added { id });

        drop(sub);
        assert_eq!(events.recv().await.unwrap(), SubscriptionEvent::Cancelled { id });
        assert_eq!(manager.subscription_count(), 0);
        assert!(
            manager
                .create_subscription(&context(), SubscriptionOptions::default(), (), None)
                .is_ok()
        );
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_ends_streams() {
        let manager = manager(0);
        let mut sub = manager
            .create_subscription(&context(), SubscriptionOptions::default(), (), None)
            .unwrap();
        manager.dispose();
        manager.dispose();

        assert_eq!(sub.next().await, None);
        assert_eq!(manager.subscription_count(), 0);
        assert!(matches!(
            manager.value_received(1, None).await,
            Err(HostError::Disposed { .. })
        ));
        assert!(matches!(
            manager.create_subscription(&context(), SubscriptionOptions::default(), (), None),
            Err(HostError::Disposed { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn lifecycle_is_logged() {
        let manager = manager(0);
        let sub = manager
            .create_subscription(&context(), SubscriptionOptions::named("trend"), (), None)
            .unwrap();
        sub.cancel();
        assert!(logs_contain("subscription created"));
        assert!(logs_contain("subscription cancelled"));
    }

    /// Records lifecycle hooks in call order.
    #[derive(Default)]
    struct RecordingBehavior {
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingBehavior {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SubscriptionBehavior<u32> for RecordingBehavior {
        type State = ();
        type Init = ();

        fn create_state(&self, _info: &SubscriptionInfo, _init: ()) -> Result<Arc<()>, HostError> {
            Ok(Arc::new(()))
        }

        fn on_subscription_added(&self, info: &SubscriptionInfo, _state: &()) {
            self.calls.lock().unwrap().push(format!("added {}", info.id));
        }

        fn on_subscription_cancelled(&self, info: &SubscriptionInfo, _state: &()) {
            self.calls.lock().unwrap().push(format!("cancelled {}", info.id));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn added_precedes_cancelled_for_pre_cancelled_caller() {
        let manager = SubscriptionManager::new(
            "ordered",
            SubscriptionManagerOptions::default(),
            RecordingBehavior::default(),
            Arc::new(TokioTaskScheduler::new()),
        )
        .unwrap();
        let mut events = manager.subscribe_events();

        for _ in 0..20 {
            let caller = CancellationToken::new();
            caller.cancel();
            let mut sub = manager
                .create_subscription(&context(), SubscriptionOptions::default(), (), Some(caller))
                .unwrap();
            let id = sub.id();
            assert_eq!(sub.next().await, None);
            assert_eq!(events.recv().await.unwrap(), SubscriptionEvent::Added { id });
            assert_eq!(events.recv().await.unwrap(), SubscriptionEvent::Cancelled { id });
        }

        let calls = manager.behavior().calls();
        assert_eq!(calls.len(), 40);
        for pair in calls.chunks(2) {
            assert!(pair[0].starts_with("added "), "{calls:?}");
            assert_eq!(pair[1], pair[0].replace("added", "cancelled"));
        }
        assert_eq!(manager.subscription_count(), 0);
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let options = SubscriptionManagerOptions {
            dispatch_capacity: 0,
            ..Default::default()
        };
        let result = SubscriptionManager::<u32, _>::new(
            "bad",
            options,
            BroadcastBehavior,
            Arc::new(TokioTaskScheduler::new()),
        );
        assert!(matches!(result, Err(HostError::Options(_))));
    }
}
