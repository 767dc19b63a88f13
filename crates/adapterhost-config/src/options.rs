// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Options sources: a fixed snapshot or a live, updatable value.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::debug;

/// Supplies options to an adapter, optionally with change notifications.
pub trait OptionsSource<O>: Send + Sync + 'static {
    /// The latest options value.
    fn current(&self) -> Arc<O>;

    /// A receiver that observes every later update. `None` when the options
    /// never change.
    fn subscribe(&self) -> Option<watch::Receiver<Arc<O>>>;
}

/// Options fixed at construction time.
#[derive(Debug)]
pub struct StaticOptions<O> {
    value: Arc<O>,
}

impl<O> StaticOptions<O> {
    pub fn new(value: O) -> Self {
        Self {
            value: Arc::new(value),
        }
    }
}

impl<O: Send + Sync + 'static> OptionsSource<O> for StaticOptions<O> {
    fn current(&self) -> Arc<O> {
        self.value.clone()
    }

    fn subscribe(&self) -> Option<watch::Receiver<Arc<O>>> {
        None
    }
}

/// Options that can be replaced at runtime.
///
/// Readers get a lock-free snapshot; subscribers are notified through a
/// watch channel and always see the latest value.
pub struct LiveOptions<O> {
    current: ArcSwap<O>,
    sender: watch::Sender<Arc<O>>,
}

impl<O: Send + Sync + 'static> LiveOptions<O> {
    pub fn new(initial: O) -> Self {
        let initial = Arc::new(initial);
        let (sender, _) = watch::channel(initial.clone());
        Self {
            current: ArcSwap::new(initial),
            sender,
        }
    }

    /// Publishes a new value to every subscriber.
    ///
    /// The value is not validated here; consumers decide whether to apply it.
    pub fn update(&self, value: O) {
        let value = Arc::new(value);
        self.current.store(value.clone());
        // send_replace never fails, even with no receivers.
        self.sender.send_replace(value);
        debug!(receivers = self.sender.receiver_count(), "options updated");
    }
}

impl<O: Send + Sync + 'static> OptionsSource<O> for LiveOptions<O> {
    fn current(&self) -> Arc<O> {
        self.current.load_full()
    }

    fn subscribe(&self) -> Option<watch::Receiver<Arc<O>>> {
        Some(self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_options_never_change() {
        let source = StaticOptions::new(5u32);
        assert_eq!(*source.current(), 5);
        assert!(source.subscribe().is_none());
    }

    #[tokio::test]
    async fn live_options_notify_subscribers() {
        let source = LiveOptions::new(1u32);
        let mut rx = source.subscribe().unwrap();
        source.update(2);
        rx.changed().await.unwrap();
        assert_eq!(**rx.borrow_and_update(), 2);
        assert_eq!(*source.current(), 2);
    }

    #[test]
    fn update_without_subscribers_is_kept() {
        let source = LiveOptions::new("a".to_string());
        source.update("b".to_string());
        assert_eq!(source.current().as_str(), "b");
    }
}
