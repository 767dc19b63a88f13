// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background task scheduling for adapters and features.

use futures::future::BoxFuture;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Runs background work on behalf of an adapter.
///
/// Adapters take a scheduler instead of calling `tokio::spawn` directly so
/// hosts can track and drain their tasks on shutdown.
pub trait TaskScheduler: Send + Sync + 'static {
    /// Spawns `task`. `name` is used for diagnostics only.
    fn spawn(&self, name: &str, task: BoxFuture<'static, ()>);
}

/// Scheduler that spawns onto the current tokio runtime and tracks tasks.
#[derive(Debug, Clone, Default)]
pub struct TokioTaskScheduler {
    tracker: TaskTracker,
}

impl TokioTaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting tracking of new tasks and waits for running ones.
    pub async fn close_and_wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn spawn(&self, name: &str, task: BoxFuture<'static, ()>) {
        debug!(task = %name, "spawning background task");
        self.tracker.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn close_and_wait_drains_tasks() {
        let scheduler = TokioTaskScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            scheduler.spawn(
                "increment",
                async move {
                    tokio::task::yield_now().await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }
        scheduler.close_and_wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.active_tasks(), 0);
    }
}
