use thiserror::Error;
use tracing::{debug, info, warn};

use super::fetcher::{FetchError, Fetcher};
use super::request::{Request, RequestMode, Response};
use super::store::{CacheError, CacheStore};

/// Region name; bump the version to start from an empty cache
pub const DEFAULT_CACHE_NAME: &str = "levelup-cache-v1";

/// Page served when a navigation fails and nothing is cached for it
pub const OFFLINE_PATH: &str = "/offline.html";

/// Resources that must be cached before the worker counts as installed
pub const PRECACHE_PATHS: &[&str] = &[OFFLINE_PATH, "/manifest.webmanifest"];

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Failed to pre-cache {url}: {source}")]
    Precache {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to pre-cache {url}: status {status}")]
    PrecacheStatus { url: String, status: u16 },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Worker must be installed before it can activate")]
    NotInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, nothing cached yet
    Parsed,
    /// Pre-cache complete, waiting to activate
    Installed,
    /// Controlling clients; fetches go through the strategies
    Activated,
}

/// How a request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network, then cached copy, then the offline page. Live hits are stored.
    NavigationNetworkFirst,
    /// Cached copy, then network (stored), then 504
    CacheFirst,
    /// Network, then cached copy, then 503. Nothing is stored.
    NetworkFirst,
}

impl Strategy {
    pub fn for_request(request: &Request) -> Self {
        if request.mode == RequestMode::Navigate {
            Strategy::NavigationNetworkFirst
        } else if request.destination.is_static_asset() {
            Strategy::CacheFirst
        } else {
            Strategy::NetworkFirst
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Origin the relative paths below are resolved against
    pub origin: String,
    pub offline_path: String,
    pub precache_paths: Vec<String>,
}

impl ControllerConfig {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            offline_path: OFFLINE_PATH.to_string(),
            precache_paths: PRECACHE_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Absolute URL for a path on the origin; absolute URLs pass through
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.origin, path)
        } else {
            format!("{}/{}", self.origin, path)
        }
    }

    pub fn offline_url(&self) -> String {
        self.resolve(&self.offline_path)
    }
}

/// One generation of the offline worker.
///
/// Lifecycle methods take `&mut self`; once activated the controller can be
/// shared (e.g. in an `Arc`) and `handle_fetch` called concurrently.
pub struct OfflineController<F, S> {
    fetcher: F,
    store: S,
    config: ControllerConfig,
    state: WorkerState,
}

impl<F: Fetcher, S: CacheStore> OfflineController<F, S> {
    pub fn new(fetcher: F, store: S, config: ControllerConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
            state: WorkerState::Parsed,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Pre-cache the must-have resources. All of them must come back 2xx,
    /// otherwise the worker stays uninstalled.
    pub async fn install(&mut self) -> Result<(), OfflineError> {
        info!(region = self.store.name(), "Installing offline worker");

        let mut fetched = Vec::with_capacity(self.config.precache_paths.len());
        for path in &self.config.precache_paths {
            let url = self.config.resolve(path);
            let response = self
                .fetcher
                .fetch(&Request::get(url.clone()))
                .await
                .map_err(|source| OfflineError::Precache {
                    url: url.clone(),
                    source,
                })?;
            if !response.is_ok() {
                return Err(OfflineError::PrecacheStatus {
                    url,
                    status: response.status,
                });
            }
            fetched.push((url, response));
        }

        // Only write once everything arrived, so a failed install caches nothing
        for (url, response) in &fetched {
            self.store.put(url, response).await?;
        }

        // Skip waiting: ready to activate right away
        if self.state == WorkerState::Parsed {
            self.state = WorkerState::Installed;
        }
        info!(region = self.store.name(), resources = fetched.len(), "Offline worker installed");
        Ok(())
    }

    /// Pick up a generation installed by an earlier process: if every
    /// pre-cached resource is already in the region, the worker counts as
    /// installed without fetching anything.
    pub async fn restore(&mut self) -> Result<bool, OfflineError> {
        for path in &self.config.precache_paths {
            if self.store.get(&self.config.resolve(path)).await?.is_none() {
                debug!(region = self.store.name(), path = %path, "Region not pre-cached");
                return Ok(false);
            }
        }
        if self.state == WorkerState::Parsed {
            self.state = WorkerState::Installed;
        }
        Ok(true)
    }

    /// Take control of open clients immediately
    pub async fn activate(&mut self) -> Result<(), OfflineError> {
        match self.state {
            WorkerState::Parsed => Err(OfflineError::NotInstalled),
            WorkerState::Installed => {
                self.state = WorkerState::Activated;
                info!(region = self.store.name(), "Offline worker activated, clients claimed");
                Ok(())
            }
            WorkerState::Activated => Ok(()),
        }
    }

    /// Serve a request. Never fails: network and cache errors degrade to a
    /// cached copy or an empty status response.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        if self.state != WorkerState::Activated {
            debug!(url = %request.url, state = ?self.state, "Worker not active, passing through");
            return match self.fetcher.fetch(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Fetch failed");
                    Response::service_unavailable()
                }
            };
        }

        let strategy = Strategy::for_request(request);
        debug!(url = %request.url, ?strategy, "Intercepted fetch");
        match strategy {
            Strategy::NavigationNetworkFirst => self.navigation_network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn navigation_network_first(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(fresh) => {
                self.store_copy(request, &fresh).await;
                fresh
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Navigation failed, serving from cache");
                if let Some(cached) = self.lookup(request).await {
                    return cached;
                }
                match self.lookup_url(&self.config.offline_url()).await {
                    Some(offline) => offline,
                    None => {
                        warn!("Offline page missing from cache");
                        Response::service_unavailable()
                    }
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Response {
        if let Some(cached) = self.lookup(request).await {
            return cached;
        }
        match self.fetcher.fetch(request).await {
            Ok(fresh) => {
                self.store_copy(request, &fresh).await;
                fresh
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Asset fetch failed");
                Response::gateway_timeout()
            }
        }
    }

    async fn network_first(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Fetch failed, trying cache");
                self.lookup(request)
                    .await
                    .unwrap_or_else(Response::service_unavailable)
            }
        }
    }

    async fn lookup(&self, request: &Request) -> Option<Response> {
        if !request.is_cacheable() {
            return None;
        }
        self.lookup_url(&request.url).await
    }

    async fn lookup_url(&self, url: &str) -> Option<Response> {
        match self.store.get(url).await {
            Ok(entry) => entry.map(|cached| cached.data),
            Err(e) => {
                warn!(url = url, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store_copy(&self, request: &Request, response: &Response) {
        if !request.is_cacheable() {
            return;
        }
        if let Err(e) = self.store.put(&request.url, response).await {
            warn!(url = %request.url, error = %e, "Failed to cache response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::request::Destination;
    use crate::cache::store::MemoryCacheStore;
    use crate::cache::CachedData;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const ORIGIN: &str = "https://app.test";

    /// Serves canned responses; URLs not listed fail as if offline.
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Mutex<HashMap<String, Response>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn serve(&self, url: &str, response: Response) {
            self.responses.lock().unwrap().insert(url.to_string(), response);
        }

        fn go_offline(&self) {
            self.responses.lock().unwrap().clear();
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for Arc<ScriptedFetcher> {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.lock().unwrap().push(request.url.clone());
            self.responses
                .lock()
                .unwrap()
                .get(&request.url)
                .cloned()
                .ok_or_else(|| FetchError::Offline(request.url.clone()))
        }
    }

    /// Store whose every operation fails
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get(&self, _url: &str) -> Result<Option<CachedData<Response>>, CacheError> {
            Err(CacheError::Io(std::io::Error::other("disk gone")))
        }
        async fn put(&self, _url: &str, _response: &Response) -> Result<(), CacheError> {
            Err(CacheError::Io(std::io::Error::other("disk gone")))
        }
        async fn entries(&self) -> Result<Vec<(String, CachedData<Response>)>, CacheError> {
            Ok(Vec::new())
        }
    }

    fn url(path: &str) -> String {
        format!("{}{}", ORIGIN, path)
    }

    fn online_fetcher() -> Arc<ScriptedFetcher> {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.serve(&url("/offline.html"), Response::ok("<h1>You are offline</h1>"));
        fetcher.serve(&url("/manifest.webmanifest"), Response::ok("{\"name\":\"LevelUp\"}"));
        fetcher
    }

    async fn active_controller(
        fetcher: Arc<ScriptedFetcher>,
    ) -> OfflineController<Arc<ScriptedFetcher>, MemoryCacheStore> {
        let mut controller = OfflineController::new(
            fetcher,
            MemoryCacheStore::new(DEFAULT_CACHE_NAME),
            ControllerConfig::new(ORIGIN),
        );
        controller.install().await.unwrap();
        controller.activate().await.unwrap();
        controller
    }

    #[test]
    fn test_strategy_dispatch() {
        assert_eq!(
            Strategy::for_request(&Request::navigate(url("/goals"))),
            Strategy::NavigationNetworkFirst
        );
        for dest in [Destination::Script, Destination::Style, Destination::Image, Destination::Font] {
            assert_eq!(Strategy::for_request(&Request::asset(url("/a"), dest)), Strategy::CacheFirst);
        }
        assert_eq!(
            Strategy::for_request(&Request::asset(url("/manifest.webmanifest"), Destination::Manifest)),
            Strategy::NetworkFirst
        );
        assert_eq!(Strategy::for_request(&Request::get(url("/api/users/1"))), Strategy::NetworkFirst);
    }

    #[test]
    fn test_config_resolve() {
        let config = ControllerConfig::new("https://app.test/");
        assert_eq!(config.resolve("/goals"), "https://app.test/goals");
        assert_eq!(config.resolve("goals"), "https://app.test/goals");
        assert_eq!(config.resolve("https://cdn.test/x.js"), "https://cdn.test/x.js");
        assert_eq!(config.offline_url(), "https://app.test/offline.html");
    }

    #[tokio::test]
    async fn test_install_precaches_and_activate_claims() {
        let fetcher = online_fetcher();
        let mut controller = OfflineController::new(
            fetcher.clone(),
            MemoryCacheStore::new(DEFAULT_CACHE_NAME),
            ControllerConfig::new(ORIGIN),
        );
        assert_eq!(controller.state(), WorkerState::Parsed);
        assert!(matches!(controller.activate().await, Err(OfflineError::NotInstalled)));

        controller.install().await.unwrap();
        assert_eq!(controller.state(), WorkerState::Installed);
        let cached = controller.store().entries().await.unwrap();
        let urls: Vec<_> = cached.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(urls, vec![url("/manifest.webmanifest"), url("/offline.html")]);

        controller.activate().await.unwrap();
        assert_eq!(controller.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_restore_from_populated_region() {
        let store = MemoryCacheStore::new(DEFAULT_CACHE_NAME);
        let fetcher = Arc::new(ScriptedFetcher::default());
        let mut controller = OfflineController::new(fetcher.clone(), store, ControllerConfig::new(ORIGIN));
        assert!(!controller.restore().await.unwrap());
        assert_eq!(controller.state(), WorkerState::Parsed);

        controller.store().put(&url("/offline.html"), &Response::ok("offline")).await.unwrap();
        controller.store().put(&url("/manifest.webmanifest"), &Response::ok("{}")).await.unwrap();
        assert!(controller.restore().await.unwrap());
        assert_eq!(controller.state(), WorkerState::Installed);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_when_precache_fails() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.serve(&url("/offline.html"), Response::ok("offline"));
        let mut controller = OfflineController::new(
            fetcher.clone(),
            MemoryCacheStore::new(DEFAULT_CACHE_NAME),
            ControllerConfig::new(ORIGIN),
        );
        let err = controller.install().await.unwrap_err();
        assert!(matches!(err, OfflineError::Precache { .. }));
        assert_eq!(controller.state(), WorkerState::Parsed);
        assert!(controller.store().entries().await.unwrap().is_empty());

        fetcher.serve(&url("/manifest.webmanifest"), Response::empty(404, "Not Found"));
        let err = controller.install().await.unwrap_err();
        assert!(matches!(err, OfflineError::PrecacheStatus { status: 404, .. }));
        assert_eq!(controller.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_navigation_success_updates_cache_and_returns_live() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/dashboard"), Response::ok("<main>live</main>"));
        let controller = active_controller(fetcher.clone()).await;

        let response = controller.handle_fetch(&Request::navigate(url("/dashboard"))).await;
        assert_eq!(response.text(), "<main>live</main>");
        let cached = controller.store().get(&url("/dashboard")).await.unwrap().unwrap();
        assert_eq!(cached.data.text(), "<main>live</main>");
    }

    #[tokio::test]
    async fn test_navigation_offline_serves_last_cached_copy() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/goals"), Response::ok("goals v1"));
        let controller = active_controller(fetcher.clone()).await;
        controller.handle_fetch(&Request::navigate(url("/goals"))).await;

        fetcher.go_offline();
        let response = controller.handle_fetch(&Request::navigate(url("/goals"))).await;
        assert_eq!(response.text(), "goals v1");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_cache_serves_offline_page() {
        let fetcher = online_fetcher();
        let controller = active_controller(fetcher.clone()).await;
        fetcher.go_offline();

        let response = controller.handle_fetch(&Request::navigate(url("/profile"))).await;
        assert_eq!(response, Response::ok("<h1>You are offline</h1>"));
    }

    #[tokio::test]
    async fn test_cached_asset_never_hits_network() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/assets/app.js"), Response::ok("console.log(1)"));
        let controller = active_controller(fetcher.clone()).await;
        let request = Request::asset(url("/assets/app.js"), Destination::Script);

        // First load fills the cache
        assert_eq!(controller.handle_fetch(&request).await.text(), "console.log(1)");
        fetcher.serve(&url("/assets/app.js"), Response::ok("console.log(2)"));
        let before = fetcher.calls().len();

        assert_eq!(controller.handle_fetch(&request).await.text(), "console.log(1)");
        assert_eq!(fetcher.calls().len(), before);
    }

    #[tokio::test]
    async fn test_uncached_asset_offline_is_gateway_timeout() {
        let fetcher = online_fetcher();
        let controller = active_controller(fetcher.clone()).await;
        fetcher.go_offline();

        let response = controller
            .handle_fetch(&Request::asset(url("/assets/logo.png"), Destination::Image))
            .await;
        assert_eq!(response.status, 504);
        assert_eq!(response.status_text, "Gateway Timeout");
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_other_requests_are_not_written_through() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/api/quotes/today"), Response::ok("{\"text\":\"go\"}"));
        let controller = active_controller(fetcher.clone()).await;

        let response = controller.handle_fetch(&Request::get(url("/api/quotes/today"))).await;
        assert_eq!(response.status, 200);
        assert!(controller.store().get(&url("/api/quotes/today")).await.unwrap().is_none());

        fetcher.go_offline();
        let response = controller.handle_fetch(&Request::get(url("/api/quotes/today"))).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
    }

    #[tokio::test]
    async fn test_other_requests_fall_back_to_existing_entry() {
        let fetcher = online_fetcher();
        let controller = active_controller(fetcher.clone()).await;
        fetcher.go_offline();

        // The manifest was pre-cached during install
        let response = controller
            .handle_fetch(&Request::asset(url("/manifest.webmanifest"), Destination::Manifest))
            .await;
        assert_eq!(response.text(), "{\"name\":\"LevelUp\"}");
    }

    #[tokio::test]
    async fn test_live_error_status_is_still_a_network_success() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/missing"), Response::empty(404, "Not Found"));
        let controller = active_controller(fetcher.clone()).await;

        let response = controller.handle_fetch(&Request::navigate(url("/missing"))).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_broken_store_degrades_without_failing() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/dashboard"), Response::ok("live"));
        let mut controller = OfflineController::new(fetcher.clone(), BrokenStore, ControllerConfig::new(ORIGIN));
        assert!(matches!(controller.install().await, Err(OfflineError::Cache(_))));

        // Install cannot succeed on this store, so activate by hand
        controller.state = WorkerState::Activated;
        assert_eq!(controller.handle_fetch(&Request::navigate(url("/dashboard"))).await.text(), "live");

        fetcher.go_offline();
        let response = controller.handle_fetch(&Request::navigate(url("/dashboard"))).await;
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_not_activated_passes_through() {
        let fetcher = online_fetcher();
        fetcher.serve(&url("/assets/app.css"), Response::ok("body{}"));
        let controller = OfflineController::new(
            fetcher.clone(),
            MemoryCacheStore::new(DEFAULT_CACHE_NAME),
            ControllerConfig::new(ORIGIN),
        );
        let request = Request::asset(url("/assets/app.css"), Destination::Style);
        assert_eq!(controller.handle_fetch(&request).await.text(), "body{}");
        assert!(controller.store().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_the_region() {
        let fetcher = online_fetcher();
        for i in 0..8 {
            fetcher.serve(&url(&format!("/page/{}", i)), Response::ok(format!("page {}", i)));
        }
        let controller = Arc::new(active_controller(fetcher.clone()).await);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let controller = controller.clone();
                tokio::spawn(async move {
                    controller
                        .handle_fetch(&Request::navigate(url(&format!("/page/{}", i))))
                        .await
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().text(), format!("page {}", i));
        }
        // 2 pre-cached + 8 pages
        assert_eq!(controller.store().entries().await.unwrap().len(), 10);
    }
}
