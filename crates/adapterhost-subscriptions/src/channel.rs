// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single subscriber's delivery channel.
//!
//! Publishing never blocks: values go straight into a bounded output buffer
//! and are dropped when it is full. With a publish interval, non-immediate
//! values are coalesced into one pending slot that a per-channel loop flushes
//! on every tick. The same loop watches the cancellation sources and runs the
//! cleanup callback when any of them fires.

use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use adapterhost_core::{CallerContext, TaskScheduler};
use futures::{FutureExt, Stream};
use strum::Display;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Lifecycle of a [`SubscriptionChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChannelState {
    Created,
    Running,
    Cancelled,
}

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

type Cleanup = Box<dyn FnOnce() + Send>;

/// Construction parameters for a channel.
pub struct ChannelConfig {
    pub id: u64,
    pub context: CallerContext,
    pub name: Option<String>,
    /// Zero disables coalescing.
    pub publish_interval: Duration,
    /// Output buffer size. Must be at least 1.
    pub capacity: usize,
    /// The subscription's own token, normally a child of the manager lifetime.
    pub token: CancellationToken,
    /// Extra token supplied by the caller.
    pub caller_token: Option<CancellationToken>,
    /// Runs exactly once when the channel completes.
    pub cleanup: Option<Cleanup>,
}

/// Delivery channel for one subscriber.
pub struct SubscriptionChannel<T> {
    id: u64,
    context: CallerContext,
    name: Option<String>,
    publish_interval: Duration,
    token: CancellationToken,
    caller_token: Option<CancellationToken>,
    state: AtomicU8,
    output: RwLock<Option<mpsc::Sender<T>>>,
    pending: Mutex<Option<T>>,
    cleanup: Mutex<Option<Cleanup>>,
}

impl<T: Send + 'static> SubscriptionChannel<T> {
    /// Create a channel and the stream its subscriber reads from.
    ///
    /// The channel stays in [`ChannelState::Created`] until [`start`](Self::start).
    pub fn new(config: ChannelConfig) -> (Arc<Self>, SubscriptionStream<T>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let stream = SubscriptionStream {
            receiver: rx,
            _guard: config.token.clone().drop_guard(),
        };
        let channel = Arc::new(Self {
            id: config.id,
            context: config.context,
            name: config.name,
            publish_interval: config.publish_interval,
            token: config.token,
            caller_token: config.caller_token,
            state: AtomicU8::new(CREATED),
            output: RwLock::new(Some(tx)),
            pending: Mutex::new(None),
            cleanup: Mutex::new(config.cleanup),
        });
        (channel, stream)
    }

    /// Spawn the channel loop.
    pub fn start(self: &Arc<Self>, scheduler: &dyn TaskScheduler) {
        if self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let channel = Arc::clone(self);
        scheduler.spawn(
            &format!("subscription-{}", self.id),
            async move { channel.run().await }.boxed(),
        );
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn context(&self) -> &CallerContext {
        &self.context
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn publish_interval(&self) -> Duration {
        self.publish_interval
    }

    /// The subscription token. Cancelling it ends the subscription.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn state(&self) -> ChannelState {
        match self.state.load(Ordering::Acquire) {
            CREATED => ChannelState::Created,
            RUNNING => ChannelState::Running,
            _ => ChannelState::Cancelled,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Hand a value to the subscriber without waiting.
    ///
    /// With a publish interval and `immediate == false` the value replaces
    /// any value still waiting for the next tick. Returns false when the
    /// output buffer is full or the channel has completed.
    pub fn publish(&self, value: T, immediate: bool) -> bool {
        if self.is_completed() {
            return false;
        }
        if !immediate && !self.publish_interval.is_zero() {
            *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
            return true;
        }
        self.send(value)
    }

    fn send(&self, value: T) -> bool {
        let result = {
            let output = self.output.read().unwrap_or_else(PoisonError::into_inner);
            match output.as_ref() {
                Some(tx) => tx.try_send(value),
                None => return false,
            }
        };
        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(subscription_id = self.id, "subscriber buffer full, value dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                // The subscriber dropped its stream.
                self.token.cancel();
                false
            }
        }
    }

    fn flush(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(value) = pending {
            self.send(value);
        }
    }

    /// Cancel the subscription. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
        self.complete();
    }

    /// Complete the channel and run cleanup, whether or not a cancellation
    /// source has fired.
    pub fn dispose(&self) {
        self.cancel();
    }

    fn complete(&self) {
        self.token.cancel();
        self.state.store(CANCELLED, Ordering::Release);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let cleanup = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        // Dropping the sender ends the subscriber's stream.
        self.output
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = (!self.publish_interval.is_zero()).then(|| {
            let mut interval = tokio::time::interval_at(
                Instant::now() + self.publish_interval,
                self.publish_interval,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = caller_cancelled(self.caller_token.as_ref()) => {
                    debug!(subscription_id = self.id, "caller cancelled subscription");
                    break;
                }
                _ = next_tick(&mut ticker) => self.flush(),
            }
        }

        debug!(subscription_id = self.id, "subscription channel completed");
        self.complete();
    }
}

async fn caller_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl<T> std::fmt::Debug for SubscriptionChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionChannel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("publish_interval", &self.publish_interval)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// The subscriber's end of a channel.
///
/// Ends when the channel completes. Dropping it cancels the subscription.
pub struct SubscriptionStream<T> {
    receiver: mpsc::Receiver<T>,
    _guard: DropGuard,
}

impl<T> Unpin for SubscriptionStream<T> {}

impl<T> Stream for SubscriptionStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
