// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording adapter hooks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use adapterhost_config::{AdapterOptions, AdapterSettings};
use adapterhost_core::{CallerContext, HealthCheckResult, HostError};
use adapterhost_runtime::AdapterHooks;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Hooks that count lifecycle calls and can be told to fail on start.
#[derive(Default)]
pub struct MockHooks {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    health: Mutex<Vec<HealthCheckResult>>,
    renames: Mutex<Vec<(String, String)>>,
    run_token: Mutex<Option<CancellationToken>>,
}

impl MockHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent starts fail.
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Results returned from the health hook.
    pub fn set_health(&self, results: Vec<HealthCheckResult>) {
        *self.health.lock().unwrap_or_else(PoisonError::into_inner) = results;
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// `(previous, current)` name pairs seen by the options hook.
    pub fn renames(&self) -> Vec<(String, String)> {
        self.renames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The token handed to the last successful start.
    pub fn run_token(&self) -> Option<CancellationToken> {
        self.run_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AdapterHooks<AdapterOptions> for MockHooks {
    async fn on_start(
        &self,
        _options: Arc<AdapterOptions>,
        cancel: CancellationToken,
    ) -> Result<(), HostError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(HostError::Internal("mock start failure".to_string()));
        }
        *self.run_token.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel);
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), HostError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_health(&self, _context: &CallerContext) -> Vec<HealthCheckResult> {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_options_changed(&self, previous: &AdapterOptions, current: &AdapterOptions) {
        let (previous, current) = (previous.adapter_options(), current.adapter_options());
        if previous.name != current.name {
            self.renames
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((previous.name.clone(), current.name.clone()));
        }
    }
}
