// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter lifecycle.
//!
//! An [`Adapter`] owns its feature registry, its health check manager and the
//! background loop that applies options updates. Custom behavior plugs in
//! through [`AdapterHooks`]; features come from providers registered on the
//! [`AdapterBuilder`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use adapterhost_config::{
    AdapterOptions, AdapterSettings, ConfigError, OptionsSource, StaticOptions,
    SubscriptionManagerOptions,
};
use adapterhost_core::{
    AdapterDescriptor, AdapterDescriptorExtended, AdapterState, AdapterTypeDescriptor,
    CallerContext, FeatureHandle, FeatureProvider, FeatureUri, HealthCheckResult, HostError,
    KeyValueStore, KeyValueStoreExt, StandardFeature, TaskScheduler, TokioTaskScheduler,
};
use adapterhost_features::{FeatureDescriptor, FeatureRegistry};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::FutureExt;
use strum::Display;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::health::{HealthCheckManager, HealthSource};

/// Custom start, stop and health logic for an adapter.
///
/// Every method has a default, so an adapter that is nothing but a set of
/// features can use [`NoHooks`].
#[async_trait]
pub trait AdapterHooks<O: AdapterSettings>: Send + Sync + 'static {
    /// Connect to the data source. `cancel` fires when the adapter stops.
    async fn on_start(&self, options: Arc<O>, cancel: CancellationToken) -> Result<(), HostError> {
        let _ = (options, cancel);
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), HostError> {
        Ok(())
    }

    /// Health results added to those reported by features.
    async fn check_health(&self, context: &CallerContext) -> Vec<HealthCheckResult> {
        let _ = context;
        Vec::new()
    }

    /// Called after a valid options update has been applied.
    fn on_options_changed(&self, previous: &O, current: &O) {
        let _ = (previous, current);
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<O: AdapterSettings> AdapterHooks<O> for NoHooks {}

/// Lifecycle notifications broadcast by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AdapterEvent {
    Started,
    Stopped,
    OptionsChanged,
    Disposed,
}

type Registration = Box<dyn FnOnce(&FeatureRegistry) -> Result<Vec<FeatureUri>, HostError> + Send>;

/// Builder for [`Adapter`].
pub struct AdapterBuilder<O: AdapterSettings = AdapterOptions> {
    id: String,
    options: Arc<dyn OptionsSource<O>>,
    adapter_type: AdapterTypeDescriptor,
    hooks: Arc<dyn AdapterHooks<O>>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    store: Option<Arc<dyn KeyValueStore>>,
    auto_register_features: bool,
    dispose_features: bool,
    health_options: SubscriptionManagerOptions,
    providers: Vec<Registration>,
    features: Vec<(FeatureUri, FeatureHandle)>,
}

impl<O: AdapterSettings> AdapterBuilder<O> {
    fn new(id: impl Into<String>, options: Arc<dyn OptionsSource<O>>) -> Self {
        Self {
            id: id.into(),
            options,
            adapter_type: AdapterTypeDescriptor {
                type_name: "adapter".to_string(),
                version: semver::Version::new(0, 0, 0),
                vendor: None,
            },
            hooks: Arc::new(NoHooks),
            scheduler: None,
            store: None,
            auto_register_features: true,
            dispose_features: true,
            health_options: SubscriptionManagerOptions::default(),
            providers: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn adapter_type(mut self, adapter_type: AdapterTypeDescriptor) -> Self {
        self.adapter_type = adapter_type;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn AdapterHooks<O>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Store the adapter persists to. The adapter sees it scoped to its id.
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Whether features declared by providers are registered. Defaults to true.
    /// Features added with [`feature`](Self::feature) are always registered.
    pub fn auto_register_features(mut self, enabled: bool) -> Self {
        self.auto_register_features = enabled;
        self
    }

    /// Whether disposing the adapter disposes its features. Defaults to true.
    pub fn dispose_features(mut self, enabled: bool) -> Self {
        self.dispose_features = enabled;
        self
    }

    pub fn health_options(mut self, options: SubscriptionManagerOptions) -> Self {
        self.health_options = options;
        self
    }

    /// Register every feature `provider` declares.
    pub fn provider<P: FeatureProvider>(self, provider: Arc<P>) -> Self {
        self.provider_with(provider, true, true)
    }

    /// Register the standard and/or extension features `provider` declares.
    pub fn provider_with<P: FeatureProvider>(
        mut self,
        provider: Arc<P>,
        include_standard: bool,
        include_extension: bool,
    ) -> Self {
        self.providers.push(Box::new(move |registry: &FeatureRegistry| {
            registry.add_from_provider(provider, include_standard, include_extension)
        }));
        self
    }

    /// Register one feature explicitly.
    pub fn feature(mut self, uri: FeatureUri, handle: FeatureHandle) -> Self {
        self.features.push((uri, handle));
        self
    }

    /// Validate the options, register features and spawn the options watcher.
    pub fn build(self) -> Result<Arc<Adapter<O>>, HostError> {
        if self.id.trim().is_empty() {
            return Err(HostError::invalid_argument("id", "adapter id must not be empty"));
        }
        let options = self.options.current();
        options.validate().map_err(|errors| options_error(&errors))?;

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioTaskScheduler::new()));
        let registry = FeatureRegistry::new(self.dispose_features);
        let health = Arc::new(HealthCheckManager::new(
            self.id.clone(),
            self.health_options,
            Arc::clone(&scheduler),
        )?);

        if self.auto_register_features {
            for register in self.providers {
                register(&registry)?;
            }
        }
        for (uri, handle) in self.features {
            registry.add(&uri, handle)?;
        }
        let health_uri = StandardFeature::HealthCheck.uri();
        if !registry.contains(&health_uri) {
            registry.add(&health_uri, FeatureHandle::health_check(Arc::clone(&health)))?;
        }

        let store = self
            .store
            .map(|store| store.scoped(&self.id))
            .transpose()?
            .map(|scoped| Arc::new(scoped) as Arc<dyn KeyValueStore>);

        let common = options.adapter_options();
        let adapter = Arc::new(Adapter {
            descriptor: ArcSwap::from_pointee(AdapterDescriptor {
                id: self.id.clone(),
                name: common.name.clone(),
                description: common.description.clone(),
            }),
            enabled: AtomicBool::new(common.enabled),
            id: self.id,
            adapter_type: self.adapter_type,
            options: ArcSwap::new(Arc::clone(&options)),
            state: Mutex::new(AdapterState::Created),
            run_token: Mutex::new(None),
            hooks: self.hooks,
            registry,
            health: Arc::clone(&health),
            store,
            lifetime: CancellationToken::new(),
            events: broadcast::channel(16).0,
            disposed: AtomicBool::new(false),
        });

        let source: Weak<dyn HealthSource> = Arc::downgrade(&adapter) as Weak<dyn HealthSource>;
        health.bind(source);

        if let Some(updates) = self.options.subscribe() {
            scheduler.spawn(
                &format!("adapter-{}-options", adapter.id),
                watch_options(Arc::downgrade(&adapter), updates, adapter.lifetime.clone()).boxed(),
            );
        }
        info!(adapter_id = %adapter.id, features = adapter.registry.len(), "adapter built");
        Ok(adapter)
    }
}

fn options_error(errors: &[ConfigError]) -> HostError {
    HostError::Options(
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// A hosted adapter instance.
pub struct Adapter<O: AdapterSettings = AdapterOptions> {
    id: String,
    adapter_type: AdapterTypeDescriptor,
    descriptor: ArcSwap<AdapterDescriptor>,
    options: ArcSwap<O>,
    enabled: AtomicBool,
    state: Mutex<AdapterState>,
    run_token: Mutex<Option<CancellationToken>>,
    hooks: Arc<dyn AdapterHooks<O>>,
    registry: FeatureRegistry,
    health: Arc<HealthCheckManager>,
    store: Option<Arc<dyn KeyValueStore>>,
    lifetime: CancellationToken,
    events: broadcast::Sender<AdapterEvent>,
    disposed: AtomicBool,
}

impl<O: AdapterSettings> Adapter<O> {
    /// Start building an adapter with fixed options.
    pub fn builder(id: impl Into<String>, options: O) -> AdapterBuilder<O> {
        AdapterBuilder::new(id, Arc::new(StaticOptions::new(options)))
    }

    /// Start building an adapter whose options come from `source`.
    pub fn builder_with_source(
        id: impl Into<String>,
        source: Arc<dyn OptionsSource<O>>,
    ) -> AdapterBuilder<O> {
        AdapterBuilder::new(id, source)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptor(&self) -> AdapterDescriptor {
        self.descriptor.load().as_ref().clone()
    }

    /// Descriptor plus the registered feature URIs, standard and extension
    /// features listed separately.
    pub fn extended_descriptor(&self) -> AdapterDescriptorExtended {
        let (extensions, features): (Vec<FeatureUri>, Vec<FeatureUri>) = self
            .registry
            .keys()
            .into_iter()
            .partition(FeatureUri::is_extension);
        AdapterDescriptorExtended {
            descriptor: self.descriptor(),
            adapter_type: self.adapter_type.clone(),
            features: features.iter().map(ToString::to_string).collect(),
            extensions: extensions.iter().map(ToString::to_string).collect(),
        }
    }

    /// Catalog entries for the registered features, sorted by URI.
    pub fn feature_descriptors(&self) -> Vec<FeatureDescriptor> {
        self.registry.descriptors()
    }

    pub fn adapter_type(&self) -> &AdapterTypeDescriptor {
        &self.adapter_type
    }

    /// Options currently in effect.
    pub fn options(&self) -> Arc<O> {
        self.options.load_full()
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AdapterState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_running(&self) -> bool {
        self.state() == AdapterState::Running
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn features(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthCheckManager> {
        &self.health
    }

    /// The adapter's key-value store, scoped to its id.
    pub fn key_value_store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        self.store.as_ref()
    }

    /// Token cancelled when the adapter is disposed.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AdapterEvent> {
        self.events.subscribe()
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.is_disposed() {
            return Err(HostError::disposed(format!("adapter {}", self.id)));
        }
        Ok(())
    }

    /// Start the adapter.
    ///
    /// A no-op when already running. Fails with [`HostError::InvalidState`]
    /// while a start or stop is in progress and with
    /// [`HostError::AdapterDisabled`] when the adapter is disabled. On
    /// failure the adapter goes back to `Stopped`. An adapter disabled while
    /// its start hook runs is stopped again before reaching `Running` and the
    /// start fails with [`HostError::AdapterDisabled`].
    pub async fn start(&self) -> Result<(), HostError> {
        self.ensure_live()?;
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                AdapterState::Running => return Ok(()),
                AdapterState::Starting | AdapterState::Stopping => {
                    return Err(HostError::InvalidState(format!(
                        "adapter {} is {}",
                        self.id, *state
                    )));
                }
                AdapterState::Created | AdapterState::Stopped => {}
            }
            if !self.is_enabled() {
                return Err(HostError::AdapterDisabled {
                    adapter_id: self.id.clone(),
                });
            }
            *state = AdapterState::Starting;
        }

        info!(adapter_id = %self.id, "starting adapter");
        self.health.init();
        let token = self.lifetime.child_token();
        if let Err(err) = self.hooks.on_start(self.options(), token.clone()).await {
            token.cancel();
            self.set_state(AdapterState::Stopped);
            warn!(adapter_id = %self.id, error = %err, "adapter failed to start");
            return Err(err);
        }

        // A disable racing this start either observes Running or is seen here.
        let disabled = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if self.is_enabled() {
                *self.run_token.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(token.clone());
                *state = AdapterState::Running;
                false
            } else {
                *state = AdapterState::Stopping;
                true
            }
        };
        if disabled {
            token.cancel();
            if let Err(err) = self.hooks.on_stop().await {
                warn!(adapter_id = %self.id, error = %err, "adapter stop hook failed");
            }
            self.set_state(AdapterState::Stopped);
            let _ = self.events.send(AdapterEvent::Stopped);
            info!(adapter_id = %self.id, "adapter disabled while starting");
            self.refresh_health().await;
            return Err(HostError::AdapterDisabled {
                adapter_id: self.id.clone(),
            });
        }
        let _ = self.events.send(AdapterEvent::Started);
        info!(adapter_id = %self.id, "adapter started");
        self.refresh_health().await;
        Ok(())
    }

    /// Stop the adapter. Stopping an adapter that is not running is a no-op.
    pub async fn stop(&self) -> Result<(), HostError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                AdapterState::Running => *state = AdapterState::Stopping,
                // A disabled adapter unwinds its own in-flight start.
                AdapterState::Starting if !self.is_enabled() => return Ok(()),
                AdapterState::Starting => {
                    return Err(HostError::InvalidState(format!(
                        "adapter {} is starting",
                        self.id
                    )));
                }
                AdapterState::Created | AdapterState::Stopping | AdapterState::Stopped => {
                    return Ok(());
                }
            }
        }

        info!(adapter_id = %self.id, "stopping adapter");
        let token = self
            .run_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
        let result = self.hooks.on_stop().await;
        self.set_state(AdapterState::Stopped);
        let _ = self.events.send(AdapterEvent::Stopped);
        match &result {
            Ok(()) => info!(adapter_id = %self.id, "adapter stopped"),
            Err(err) => warn!(adapter_id = %self.id, error = %err, "adapter stop hook failed"),
        }
        self.refresh_health().await;
        result
    }

    /// Enable or disable the adapter. Disabling stops it; enabling starts it.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), HostError> {
        self.ensure_live()?;
        if self.enabled.swap(enabled, Ordering::AcqRel) == enabled {
            return Ok(());
        }
        if enabled {
            info!(adapter_id = %self.id, "adapter enabled");
            self.start().await
        } else {
            info!(adapter_id = %self.id, "adapter disabled");
            self.stop().await
        }
    }

    /// Per-feature health results.
    ///
    /// An adapter that is not running reports a single unhealthy result.
    /// Otherwise every distinct feature that reports health contributes one
    /// composite result named after the feature, followed by the results of
    /// the adapter's hooks.
    pub async fn check_health(&self, context: &CallerContext) -> Vec<HealthCheckResult> {
        if !self.is_running() {
            return vec![HealthCheckResult::unhealthy("Adapter not started")];
        }
        let mut results = Vec::new();
        for entry in self.registry.distinct_entries() {
            if let Some(result) = entry.handle.as_feature().check_feature_health().await {
                results.push(HealthCheckResult::composite(
                    entry.handle.display_name(&entry.uri),
                    vec![result],
                ));
            }
        }
        results.extend(self.hooks.check_health(context).await);
        results
    }

    async fn refresh_health(&self) {
        if let Err(err) = self.health.recalculate().await {
            debug!(adapter_id = %self.id, error = %err, "health recalculation skipped");
        }
    }

    /// Apply an options update. Invalid updates are rejected as a whole.
    async fn apply_options(&self, update: Arc<O>) {
        if let Err(errors) = update.validate() {
            warn!(
                adapter_id = %self.id,
                errors = %options_error(&errors),
                "options update rejected"
            );
            return;
        }

        let previous = self.options.swap(Arc::clone(&update));
        let (before, after) = (previous.adapter_options(), update.adapter_options());
        if before.name != after.name || before.description != after.description {
            self.descriptor.store(Arc::new(AdapterDescriptor {
                id: self.id.clone(),
                name: after.name.clone(),
                description: after.description.clone(),
            }));
            info!(adapter_id = %self.id, name = %after.name, "adapter descriptor updated");
        }
        self.hooks.on_options_changed(&previous, &update);
        let _ = self.events.send(AdapterEvent::OptionsChanged);

        if after.enabled != self.is_enabled()
            && let Err(err) = self.set_enabled(after.enabled).await
        {
            warn!(adapter_id = %self.id, error = %err, "failed to apply enabled flag");
        }
    }

    /// Stop the adapter, end its background loops and dispose its features.
    ///
    /// Calling this more than once is a no-op.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(err) = self.stop().await {
            warn!(adapter_id = %self.id, error = %err, "adapter did not stop cleanly");
        }
        self.lifetime.cancel();
        self.registry.dispose().await;
        if !self.registry.disposes_owned_features() {
            // The health manager belongs to the adapter whatever the registry does.
            let _ = adapterhost_core::Feature::dispose(self.health.as_ref());
        }
        let _ = self.events.send(AdapterEvent::Disposed);
        info!(adapter_id = %self.id, "adapter disposed");
    }
}

#[async_trait]
impl<O: AdapterSettings> HealthSource for Adapter<O> {
    async fn health_results(&self, context: &CallerContext) -> Vec<HealthCheckResult> {
        self.check_health(context).await
    }
}

impl<O: AdapterSettings> std::fmt::Debug for Adapter<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("enabled", &self.is_enabled())
            .field("features", &self.registry.len())
            .finish()
    }
}

async fn watch_options<O: AdapterSettings>(
    adapter: Weak<Adapter<O>>,
    mut updates: watch::Receiver<Arc<O>>,
    lifetime: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = lifetime.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        let update = Arc::clone(&updates.borrow_and_update());
        let Some(adapter) = adapter.upgrade() else {
            break;
        };
        adapter.apply_options(update).await;
    }
    debug!("options watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapterhost_config::LiveOptions;
    use adapterhost_core::{HealthStatus, InMemoryKeyValueStore, Principal};
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct CountingHooks {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: AtomicBool,
    }

    #[async_trait]
    impl AdapterHooks<AdapterOptions> for CountingHooks {
        async fn on_start(
            &self,
            _options: Arc<AdapterOptions>,
            _cancel: CancellationToken,
        ) -> Result<(), HostError> {
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(HostError::Internal("connection refused".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_stop(&self) -> Result<(), HostError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Start hook that waits for the test to release it.
    #[derive(Default)]
    struct GatedHooks {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl AdapterHooks<AdapterOptions> for GatedHooks {
        async fn on_start(
            &self,
            _options: Arc<AdapterOptions>,
            _cancel: CancellationToken,
        ) -> Result<(), HostError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }

        async fn on_stop(&self) -> Result<(), HostError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn context() -> CallerContext {
        CallerContext::new(Principal::named("op"), "conn").unwrap()
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let hooks = Arc::new(CountingHooks::default());
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .hooks(hooks.clone())
            .build()
            .unwrap();
        assert_eq!(adapter.state(), AdapterState::Created);

        adapter.start().await.unwrap();
        adapter.start().await.unwrap();
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 1);
        assert!(adapter.is_running());

        adapter.stop().await.unwrap();
        adapter.stop().await.unwrap();
        assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.state(), AdapterState::Stopped);

        // Restartable after stop.
        adapter.start().await.unwrap();
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_start_returns_to_stopped() {
        let hooks = Arc::new(CountingHooks::default());
        hooks.fail_start.store(true, Ordering::SeqCst);
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .hooks(hooks.clone())
            .build()
            .unwrap();
        let err = adapter.start().await.unwrap_err();
        assert!(matches!(err, HostError::Internal(_)));
        assert_eq!(adapter.state(), AdapterState::Stopped);
    }

    #[tokio::test]
    async fn disabled_adapter_cannot_start() {
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian").with_enabled(false))
            .build()
            .unwrap();
        assert!(matches!(
            adapter.start().await,
            Err(HostError::AdapterDisabled { .. })
        ));
    }

    #[tokio::test]
    async fn disabling_during_start_stops_the_adapter() {
        let hooks = Arc::new(GatedHooks::default());
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .hooks(hooks.clone())
            .build()
            .unwrap();
        let mut events = adapter.subscribe_events();

        let starting = tokio::spawn({
            let adapter = Arc::clone(&adapter);
            async move { adapter.start().await }
        });
        hooks.entered.notified().await;
        assert_eq!(adapter.state(), AdapterState::Starting);

        adapter.set_enabled(false).await.unwrap();
        hooks.release.notify_one();
        assert!(matches!(
            starting.await.unwrap(),
            Err(HostError::AdapterDisabled { .. })
        ));
        assert_eq!(adapter.state(), AdapterState::Stopped);
        assert!(!adapter.is_enabled());
        assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);
        assert_eq!(events.recv().await.unwrap(), AdapterEvent::Stopped);

        // Re-enabling starts it normally.
        hooks.release.notify_one();
        adapter.set_enabled(true).await.unwrap();
        assert!(adapter.is_running());
    }

    #[tokio::test]
    async fn invalid_initial_options_fail_build() {
        let result = Adapter::builder("a1", AdapterOptions::named("")).build();
        assert!(matches!(result, Err(HostError::Options(_))));
    }

    #[tokio::test]
    async fn health_manager_is_registered() {
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .build()
            .unwrap();
        let extended = adapter.extended_descriptor();
        assert_eq!(
            extended.features,
            vec![StandardFeature::HealthCheck.uri_str().to_string()]
        );
        assert!(extended.extensions.is_empty());
    }

    #[tokio::test]
    async fn not_started_is_unhealthy() {
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .build()
            .unwrap();
        let results = adapter.check_health(&context()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, HealthStatus::Unhealthy);

        adapter.start().await.unwrap();
        assert!(adapter.check_health(&context()).await.is_empty());
        let latest = adapter.health().latest().unwrap();
        assert_eq!(latest.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn options_update_renames_adapter() {
        let source = Arc::new(LiveOptions::new(AdapterOptions::named("Historian")));
        let adapter = Adapter::<AdapterOptions>::builder_with_source("a1", source.clone())
            .build()
            .unwrap();
        let mut events = adapter.subscribe_events();

        source.update(AdapterOptions::named("Plant Historian").with_description("Line 2"));
        assert_eq!(events.recv().await.unwrap(), AdapterEvent::OptionsChanged);
        let descriptor = adapter.descriptor();
        assert_eq!(descriptor.name, "Plant Historian");
        assert_eq!(descriptor.description.as_deref(), Some("Line 2"));
    }

    #[tokio::test]
    #[traced_test]
    async fn invalid_options_update_is_rejected_whole() {
        let source = Arc::new(LiveOptions::new(AdapterOptions::named("Historian")));
        let adapter = Adapter::<AdapterOptions>::builder_with_source("a1", source.clone())
            .build()
            .unwrap();
        adapter.start().await.unwrap();

        source.update(AdapterOptions::named("").with_enabled(false));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(logs_contain("options update rejected"));
        assert_eq!(adapter.descriptor().name, "Historian");
        assert!(adapter.is_enabled());
        assert!(adapter.is_running());
        assert_eq!(adapter.options().name, "Historian");
    }

    #[tokio::test]
    async fn store_is_scoped_to_adapter_id() {
        let shared: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .key_value_store(Arc::clone(&shared))
            .build()
            .unwrap();
        let store = adapter.key_value_store().unwrap();
        store.write("cursor", b"42".to_vec()).await.unwrap();
        assert_eq!(shared.read("a1:cursor").await.unwrap(), Some(b"42".to_vec()));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let adapter = Adapter::builder("a1", AdapterOptions::named("Historian"))
            .build()
            .unwrap();
        adapter.start().await.unwrap();
        adapter.dispose().await;
        adapter.dispose().await;
        assert!(adapter.is_disposed());
        assert!(adapter.features().is_disposed());
        assert!(adapter.lifetime().is_cancelled());
        assert!(matches!(
            adapter.start().await,
            Err(HostError::Disposed { .. })
        ));
    }
}
