//! List + watch synchronization loop
//!
//! The [`WatchController`] keeps a [`CredentialCache`] in sync with the remote
//! secret store:
//!
//! 1. List every secret matching the effective selector, convert them, and
//!    replace the cache wholesale.
//! 2. Open a watch from the list's resource version and apply events in
//!    arrival order.
//! 3. When the watch ends for any reason other than local shutdown, schedule a
//!    single delayed relist.
//!
//! The effective selector is the operator selector AND-ed with an existence
//! requirement on the credential type label, so untyped secrets are never
//! fetched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::cache::{CredentialCache, CredentialsProvider};
use crate::config::CredentialsConfig;
use crate::converter::{credential_id, ConverterRegistry};
use crate::error::{CredentialsError, Result, SelectorError};
use crate::secret::{RemoteSecret, CREDENTIAL_TYPE_LABEL};
use crate::selector::{LabelSelector, Requirement};
use crate::source::{SecretSource, WatchEvent, WatchStream};
use crate::types::{Credential, CredentialType};
use crate::warnings::{LoggingWarningSink, WarningSink, SOURCE_UNAVAILABLE_WARNING};

// =============================================================================
// Controller State
// =============================================================================

/// Lifecycle state of the watch controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchState {
    /// No list or watch in progress
    #[default]
    Disconnected,
    /// Full list request in flight
    Listing,
    /// Watch stream open and applying events
    Watching,
    /// Watch lost; a relist is pending
    ReconnectScheduled,
}

/// Point-in-time view of the controller for health reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Current lifecycle state
    pub state: WatchState,
    /// Whether a delayed relist is pending
    pub reconnect_pending: bool,
    /// Last list or watch failure, cleared by a successful list
    pub last_error: Option<String>,
    /// Resource version of the last successful list
    pub resource_version: Option<String>,
    /// Number of list cycles started
    pub list_cycles: u64,
    /// Number of cached credentials
    pub cached: usize,
}

/// Handle to a spawned task that can be superseded
struct TaskSlot {
    id: u64,
    handle: AbortHandle,
}

/// Namespace and name of a remote secret
type SecretKey = (String, String);

fn secret_key(secret: &RemoteSecret) -> SecretKey {
    (secret.namespace().to_string(), secret.name().to_string())
}

struct Inner<S> {
    source: S,
    registry: ConverterRegistry,
    selector: std::result::Result<LabelSelector, SelectorError>,
    reconnect_delay: Duration,
    cache: Arc<CredentialCache>,
    /// Credential id each cached secret was stored under
    tracked: Mutex<HashMap<SecretKey, String>>,
    warnings: Arc<dyn WarningSink>,
    state: RwLock<WatchState>,
    last_error: RwLock<Option<String>>,
    resource_version: RwLock<Option<String>>,
    list_cycles: AtomicU64,
    next_task_id: AtomicU64,
    /// Id of the watch session allowed to schedule a reconnect (0 = none)
    current_session: AtomicU64,
    session: Mutex<Option<TaskSlot>>,
    reconnect: Mutex<Option<TaskSlot>>,
    /// Serializes list cycles
    cycle_lock: tokio::sync::Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
}

// =============================================================================
// Watch Controller
// =============================================================================

/// Keeps the credential cache synchronized with a [`SecretSource`]
///
/// Cloning is cheap; clones share the same cache and lifecycle.
pub struct WatchController<S: SecretSource> {
    inner: Arc<Inner<S>>,
}

impl<S: SecretSource> Clone for WatchController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SecretSource> std::fmt::Debug for WatchController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchController")
            .field("state", &self.state())
            .field("registry", &self.inner.registry)
            .field("cached", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

impl<S: SecretSource> WatchController<S> {
    /// Create a controller with a fresh cache and a logging warning sink
    ///
    /// The operator selector is compiled once here. A syntax error is not
    /// returned: it surfaces as an administrative warning on every list cycle
    /// until the configuration is fixed.
    pub fn new(source: S, registry: ConverterRegistry, config: &CredentialsConfig) -> Self {
        let selector = LabelSelector::parse(config.label_selector.as_deref().unwrap_or_default())
            .map(|s| s.with_requirement(Requirement::exists(CREDENTIAL_TYPE_LABEL)));
        if let Err(e) = &selector {
            tracing::error!(error = %e, "invalid credential label selector");
        }

        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                source,
                registry,
                selector,
                reconnect_delay: config.reconnect_delay,
                cache: Arc::new(CredentialCache::new()),
                tracked: Mutex::new(HashMap::new()),
                warnings: Arc::new(LoggingWarningSink::new()),
                state: RwLock::new(WatchState::Disconnected),
                last_error: RwLock::new(None),
                resource_version: RwLock::new(None),
                list_cycles: AtomicU64::new(0),
                next_task_id: AtomicU64::new(1),
                current_session: AtomicU64::new(0),
                session: Mutex::new(None),
                reconnect: Mutex::new(None),
                cycle_lock: tokio::sync::Mutex::new(()),
                shutdown_tx,
            }),
        }
    }

    /// Route administrative warnings to `sink`
    ///
    /// Must be called before the controller is cloned or started.
    #[must_use]
    pub fn with_warning_sink(self, sink: Arc<dyn WarningSink>) -> Self {
        self.map_inner(|inner| inner.warnings = sink)
    }

    /// Populate `cache` instead of a private one
    ///
    /// Must be called before the controller is cloned or started.
    #[must_use]
    pub fn with_cache(self, cache: Arc<CredentialCache>) -> Self {
        self.map_inner(|inner| inner.cache = cache)
    }

    fn map_inner(mut self, f: impl FnOnce(&mut Inner<S>)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => f(inner),
            None => tracing::warn!("controller already shared, builder call ignored"),
        }
        self
    }

    /// The cache this controller writes to
    #[must_use]
    pub fn cache(&self) -> Arc<CredentialCache> {
        Arc::clone(&self.inner.cache)
    }

    /// The effective selector (operator selector plus the type label requirement)
    ///
    /// # Errors
    ///
    /// Returns the compile error if the operator selector is invalid.
    pub fn selector(&self) -> std::result::Result<&LabelSelector, &SelectorError> {
        self.inner.selector.as_ref()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> WatchState {
        *self.inner.state.read()
    }

    /// Whether a delayed relist is pending
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.inner.reconnect.lock().is_some()
    }

    /// Whether [`WatchController::shutdown`] has been called
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Health snapshot
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state(),
            reconnect_pending: self.reconnect_pending(),
            last_error: self.inner.last_error.read().clone(),
            resource_version: self.inner.resource_version.read().clone(),
            list_cycles: self.inner.list_cycles.load(Ordering::Relaxed),
            cached: self.inner.cache.len(),
        }
    }

    /// Run a list cycle and start watching
    ///
    /// Also used to force a relist: any pending reconnect and any open watch
    /// are discarded first. Per-secret conversion failures are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// - [`CredentialsError::Shutdown`] after [`WatchController::shutdown`]
    /// - [`CredentialsError::Syntax`] if the operator selector is invalid
    /// - [`CredentialsError::Connectivity`] if the list request fails
    ///
    /// Selector and list failures also raise the
    /// [`SOURCE_UNAVAILABLE_WARNING`] warning and leave the cache untouched.
    /// They do not schedule a retry.
    pub async fn start(&self) -> Result<()> {
        self.run_cycle().await
    }

    #[tracing::instrument(skip_all, fields(cycle = tracing::field::Empty))]
    async fn run_cycle(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(CredentialsError::Shutdown);
        }

        let _guard = self.inner.cycle_lock.lock().await;
        self.cancel_reconnect();
        self.stop_session();

        let cycle = self.inner.list_cycles.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::Span::current().record("cycle", cycle);
        self.set_state(WatchState::Listing);

        let selector = match &self.inner.selector {
            Ok(selector) => selector.clone(),
            Err(e) => return Err(self.fail_list(CredentialsError::Syntax(e.clone()))),
        };

        tracing::info!(selector = %selector, "listing credential secrets");
        let list = match self.inner.source.list(&selector).await {
            Ok(list) => list,
            Err(e) => return Err(self.fail_list(CredentialsError::Connectivity(e))),
        };

        let total = list.items.len();
        let mut tracked = HashMap::with_capacity(total);
        let credentials: Vec<Credential> = list
            .items
            .iter()
            .filter_map(|secret| {
                let credential = self.convert(secret)?;
                tracked.insert(secret_key(secret), credential.id.clone());
                Some(credential)
            })
            .collect();
        let loaded = credentials.len();
        self.inner.cache.replace_all(credentials);
        *self.inner.tracked.lock() = tracked;
        self.inner.warnings.clear(SOURCE_UNAVAILABLE_WARNING);
        *self.inner.last_error.write() = None;
        *self.inner.resource_version.write() = Some(list.resource_version.clone());
        tracing::info!(
            loaded,
            skipped = total - loaded,
            resource_version = %list.resource_version,
            "credential cache replaced"
        );

        if self.is_shut_down() {
            self.set_state(WatchState::Disconnected);
            return Err(CredentialsError::Shutdown);
        }

        match self
            .inner
            .source
            .watch(&selector, &list.resource_version)
            .await
        {
            Ok(stream) => {
                if self.is_shut_down() {
                    self.set_state(WatchState::Disconnected);
                    return Err(CredentialsError::Shutdown);
                }
                self.set_state(WatchState::Watching);
                self.spawn_session(stream);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to open credential watch");
                *self.inner.last_error.write() = Some(e.to_string());
                self.set_state(WatchState::Disconnected);
                self.schedule_reconnect();
            }
        }

        Ok(())
    }

    fn fail_list(&self, err: CredentialsError) -> CredentialsError {
        let message = format!("Unable to synchronize credentials from the secret store: {err}");
        self.inner
            .warnings
            .raise(SOURCE_UNAVAILABLE_WARNING, &message);
        *self.inner.last_error.write() = Some(err.to_string());
        self.set_state(WatchState::Disconnected);
        err
    }

    fn convert(&self, secret: &RemoteSecret) -> Option<Credential> {
        match self.inner.registry.dispatch(secret) {
            Ok(credential) => Some(credential),
            Err(e) => {
                log_rejected(secret, &e);
                None
            }
        }
    }

    fn set_state(&self, state: WatchState) {
        *self.inner.state.write() = state;
    }

    fn next_task_id(&self) -> u64 {
        self.inner.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    // =========================================================================
    // Watch session
    // =========================================================================

    fn spawn_session(&self, stream: WatchStream) {
        let id = self.next_task_id();
        self.inner.current_session.store(id, Ordering::SeqCst);

        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_session(id, stream, shutdown_rx).await });

        *self.inner.session.lock() = Some(TaskSlot {
            id,
            handle: handle.abort_handle(),
        });
    }

    async fn run_session(
        &self,
        id: u64,
        mut stream: WatchStream,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::debug!(session = id, "credential watch opened");
        if *shutdown_rx.borrow_and_update() {
            return;
        }

        let failure = loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    tracing::info!(session = id, "credential watch closed for shutdown");
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.apply_event(event),
                    Some(Err(e)) => {
                        tracing::warn!(session = id, error = %e, "credential watch failed");
                        break Some(e.to_string());
                    }
                    None => {
                        tracing::info!(session = id, "credential watch closed by the store");
                        break None;
                    }
                },
            }
        };

        drop(stream);
        self.session_closed(id, failure);
    }

    fn session_closed(&self, id: u64, failure: Option<String>) {
        if self.is_shut_down() {
            return;
        }
        if self
            .inner
            .current_session
            .compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(session = id, "superseded watch session ended");
            return;
        }

        {
            let mut session = self.inner.session.lock();
            if session.as_ref().is_some_and(|s| s.id == id) {
                *session = None;
            }
        }

        *self.inner.last_error.write() =
            Some(failure.unwrap_or_else(|| "watch stream closed by the store".to_string()));
        self.set_state(WatchState::Disconnected);
        self.schedule_reconnect();
    }

    fn stop_session(&self) {
        self.inner.current_session.store(0, Ordering::SeqCst);
        if let Some(session) = self.inner.session.lock().take() {
            tracing::debug!(session = session.id, "closing previous credential watch");
            session.handle.abort();
        }
    }

    /// Apply a single watch event to the cache
    ///
    /// A secret that no longer converts has its previous credential removed,
    /// so the cache never serves a value the store has already replaced. When
    /// a secret's id label changes, the entry under the old id is dropped.
    pub fn apply_event(&self, event: WatchEvent) {
        tracing::debug!(event = event.kind(), "credential watch event");
        match event {
            WatchEvent::Added(secret) | WatchEvent::Modified(secret) => {
                match self.convert(&secret) {
                    Some(credential) => {
                        let id = credential.id.clone();
                        let previous = self
                            .inner
                            .tracked
                            .lock()
                            .insert(secret_key(&secret), id.clone());
                        if let Some(old) = previous.filter(|old| *old != id) {
                            if self.inner.cache.remove(&old).is_some() {
                                tracing::info!(credential = %old, new_id = %id, "credential id changed");
                            }
                        }
                        if self.inner.cache.upsert(credential).is_some() {
                            tracing::info!(credential = %id, "credential updated");
                        } else {
                            tracing::info!(credential = %id, "credential added");
                        }
                    }
                    None => {
                        let id = self.untrack(&secret);
                        if self.inner.cache.remove(&id).is_some() {
                            tracing::info!(credential = %id, "removed credential that no longer converts");
                        }
                    }
                }
            }
            WatchEvent::Deleted(secret) => {
                let id = self.untrack(&secret);
                if self.inner.cache.remove(&id).is_some() {
                    tracing::info!(credential = %id, "credential removed");
                }
            }
            WatchEvent::Error(message) => {
                tracing::warn!(error = %message, "secret store reported a watch error");
            }
        }
    }

    /// Forget a secret, returning the id its credential was stored under
    fn untrack(&self, secret: &RemoteSecret) -> String {
        self.inner
            .tracked
            .lock()
            .remove(&secret_key(secret))
            .unwrap_or_else(|| credential_id(secret).to_string())
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    /// Schedule a relist after the configured reconnect delay
    ///
    /// At most one reconnect is pending at a time. Returns `false` if one is
    /// already pending, a list or watch is active, or the controller is shut
    /// down. Use [`WatchController::start`] to force a relist.
    pub fn schedule_reconnect(&self) -> bool {
        if self.is_shut_down() {
            return false;
        }
        if matches!(self.state(), WatchState::Listing | WatchState::Watching) {
            tracing::debug!("credential sync is active, reconnect not scheduled");
            return false;
        }

        let mut slot = self.inner.reconnect.lock();
        if slot.is_some() {
            tracing::debug!("credential reconnect already pending");
            return false;
        }

        let id = self.next_task_id();
        let delay = self.inner.reconnect_delay;
        let deadline = Instant::now() + delay;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if !this.take_reconnect(id) {
                return;
            }
            tracing::info!("reconnecting to the secret store");
            if let Err(e) = this.run_cycle().await {
                tracing::debug!(error = %e, "credential reconnect cycle failed");
            }
        });

        *slot = Some(TaskSlot {
            id,
            handle: handle.abort_handle(),
        });
        drop(slot);

        self.set_state(WatchState::ReconnectScheduled);
        tracing::info!(delay = ?delay, "credential reconnect scheduled");
        true
    }

    fn take_reconnect(&self, id: u64) -> bool {
        let mut slot = self.inner.reconnect.lock();
        if slot.as_ref().is_some_and(|t| t.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn cancel_reconnect(&self) {
        if let Some(pending) = self.inner.reconnect.lock().take() {
            tracing::debug!("cancelled pending credential reconnect");
            pending.handle.abort();
        }
    }

    /// Stop synchronizing
    ///
    /// Cancels any pending reconnect and closes the open watch. Closing a
    /// watch this way never schedules a reconnect. The cache keeps its last
    /// contents.
    pub fn shutdown(&self) {
        if self.inner.shutdown_tx.send_replace(true) {
            return;
        }
        tracing::info!("shutting down credential synchronization");
        self.cancel_reconnect();
        self.inner.current_session.store(0, Ordering::SeqCst);
        self.inner.session.lock().take();
        self.set_state(WatchState::Disconnected);
    }
}

impl<S: SecretSource> CredentialsProvider for WatchController<S> {
    fn credentials(&self, filter: Option<CredentialType>) -> Vec<Arc<Credential>> {
        self.inner.cache.get_all(filter)
    }

    fn credential(&self, id: &str) -> Option<Arc<Credential>> {
        self.inner.cache.get(id)
    }
}

fn log_rejected(secret: &RemoteSecret, err: &CredentialsError) {
    match err {
        CredentialsError::Conversion(_) => {
            tracing::warn!(
                secret = %secret.name(),
                credential_type = secret.credential_type().unwrap_or_default(),
                "failed to convert secret to a credential, skipping"
            );
            tracing::debug!(secret = %secret.name(), error = %err, "conversion failure");
        }
        _ => {
            tracing::warn!(secret = %secret.name(), error = %err, "skipping secret");
        }
    }
}
