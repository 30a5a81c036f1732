//! Offline cache controller.
//!
//! Mediates between clients and the app origin using one versioned cache
//! store:
//!
//! - **Install** caches the shell page set atomically.
//! - **Activate** purges every store but the current one, then takes control.
//! - **Fetch** routes each request: bypass (`/api/`, cross-origin, non-GET),
//!   network-first for navigations, cache-first for everything else.
//!
//! Cache writes on the request path run in the background and never delay
//! the response. [`ShellController::settle`] waits for them. Navigations
//! carrying `Cookie` or `Authorization` are never written, so stored pages
//! are always anonymous.

pub mod lifecycle;
pub mod route;

use std::sync::Arc;

use futures_util::future::try_join_all;
use shellcache_core::{AppConfig, CacheDb, CacheStore, Error, RequestMode, ShellRequest, ShellResponse};
use tokio::sync::{Mutex, watch};
use tokio_util::task::TaskTracker;
use url::Url;

use crate::fetch::{Network, resolve};

pub use lifecycle::{ActivateReport, Event, InstallReport, LifecycleState, Outcome};
pub use route::{BypassReason, Route, classify};

/// Static inputs of a controller, fixed for its whole life.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub origin: Url,
    /// Store owned by this controller's version.
    pub store_name: String,
    pub shell_pages: Vec<String>,
    pub bypass_prefixes: Vec<String>,
}

impl ControllerConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            store_name: config.store_name(),
            shell_pages: config.shell_pages.clone(),
            bypass_prefixes: config.bypass_prefixes.clone(),
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, Error> {
        resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    fn root_request(&self) -> Result<ShellRequest, Error> {
        Ok(ShellRequest::navigate(self.resolve("/")?))
    }
}

/// The offline cache controller for one cache version.
pub struct ShellController {
    config: ControllerConfig,
    db: CacheDb,
    store: CacheStore,
    network: Arc<dyn Network>,
    state: watch::Sender<LifecycleState>,
    lifecycle: Mutex<()>,
    writes: TaskTracker,
}

impl ShellController {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, config: ControllerConfig) -> Self {
        let store = db.store_handle(&config.store_name);
        let (state, _) = watch::channel(LifecycleState::Installing);
        Self {
            config,
            db,
            store,
            network,
            state,
            lifecycle: Mutex::new(()),
            writes: TaskTracker::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Feed one event through the state machine.
    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        tracing::trace!(event = event.name(), state = %self.state(), "dispatch");
        match event {
            Event::Install => self.install().await.map(Outcome::Installed),
            Event::Activate => self.activate().await.map(Outcome::Activated),
            Event::Fetch(request) => self.handle_fetch(request).await.map(Outcome::Response),
        }
    }

    fn expect_state(&self, expected: LifecycleState, event: &'static str) -> Result<(), Error> {
        let current = self.state();
        if current != expected {
            return Err(Error::InvalidTransition { state: current.as_str(), event });
        }
        Ok(())
    }

    /// Cache the whole shell page set, or nothing.
    ///
    /// Every page must come back 2xx. On success the controller moves
    /// straight to `Activating` without waiting for older clients.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;
        self.expect_state(LifecycleState::Installing, "install")?;

        let requests = self
            .config
            .shell_pages
            .iter()
            .map(|page| -> Result<ShellRequest, Error> {
                Ok(ShellRequest::get(self.config.resolve(page)?, RequestMode::SameOrigin))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = requests.into_iter().map(|request| async move {
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url.path())))?;
            if !response.is_cacheable() {
                return Err(Error::InstallFailed(format!(
                    "{}: status {} ({})",
                    request.url.path(),
                    response.status,
                    response.kind
                )));
            }
            Ok::<_, Error>((request, response))
        });
        let pairs = try_join_all(fetches).await?;

        let store = self.db.open_store(&self.config.store_name).await?;
        let cached = store.put_all(&pairs).await?;

        self.state.send_replace(LifecycleState::Activating);
        tracing::info!(store = %store.name(), cached, "shell installed, activating without waiting");

        Ok(InstallReport { store: store.name().to_string(), cached })
    }

    /// Purge every stale store, then start serving.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.lifecycle.lock().await;
        self.expect_state(LifecycleState::Activating, "activate")?;

        let purged = self.db.retain_only(&self.config.store_name).await?;
        for name in &purged {
            tracing::info!(store = %name, "purged stale cache store");
        }

        self.state.send_replace(LifecycleState::Serving);
        tracing::info!(store = %self.config.store_name, "controller active, claiming clients");

        Ok(ActivateReport { store: self.config.store_name.clone(), purged })
    }

    /// Answer one request.
    ///
    /// Until the controller is `Serving`, requests are uncontrolled and go
    /// straight to the network.
    pub async fn handle_fetch(&self, request: ShellRequest) -> Result<ShellResponse, Error> {
        if self.state() != LifecycleState::Serving {
            tracing::trace!(url = %request.url, state = %self.state(), "uncontrolled fetch");
            return self.network.fetch(&request).await;
        }

        match classify(&request, &self.config.origin, &self.config.bypass_prefixes) {
            Route::Bypass(reason) => {
                tracing::trace!(url = %request.url, ?reason, "bypass");
                self.network.fetch(&request).await
            }
            Route::Navigation => self.network_first(request).await,
            Route::Asset => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: ShellRequest) -> Result<ShellResponse, Error> {
        let err = match self.network.fetch(&request).await {
            Ok(response) => {
                if request.has_credentials() {
                    tracing::debug!(url = %request.url, "navigation carries credentials, not caching");
                } else if response.is_cacheable() {
                    self.store_in_background(request, response.clone());
                } else {
                    tracing::debug!(
                        url = %request.url,
                        status = response.status,
                        kind = %response.kind,
                        "navigation response not cacheable"
                    );
                }
                return Ok(response);
            }
            Err(err) => err,
        };

        tracing::warn!(url = %request.url, error = %err, "navigation failed, falling back to cache");

        if let Some(cached) = self.cached(&request).await {
            tracing::debug!(url = %request.url, "serving cached page");
            return Ok(cached);
        }

        if let Some(root) = self.cached(&self.config.root_request()?).await {
            tracing::debug!(url = %request.url, "serving cached root shell");
            return Ok(root);
        }

        Err(Error::Offline(request.url.to_string()))
    }

    /// Store lookup where a read failure counts as a miss.
    async fn cached(&self, request: &ShellRequest) -> Option<ShellResponse> {
        match self.store.get(request).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_first(&self, request: ShellRequest) -> Result<ShellResponse, Error> {
        if let Some(cached) = self.cached(&request).await {
            tracing::debug!(url = %request.url, "asset cache hit");
            return Ok(cached);
        }
        tracing::debug!(url = %request.url, "asset cache miss");

        let response = self.network.fetch(&request).await?;
        if response.is_cacheable() {
            self.store_in_background(request, response.clone());
        }
        Ok(response)
    }

    fn store_in_background(&self, request: ShellRequest, response: ShellResponse) {
        let store = self.store.clone();
        self.writes.spawn(async move {
            if let Err(err) = store.put(&request, &response).await {
                tracing::warn!(url = %request.url, error = %err, "background cache write failed");
            }
        });
    }

    /// Wait for every background cache write started so far.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}
