use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use levelup_core::cache::{
    list_regions, prune_regions, CacheStore, ControllerConfig, Destination, DiskCacheStore,
    HttpFetcher, OfflineController, Request,
};
use levelup_core::flags::ClientFlags;
use tracing::info;

use crate::app::App;

type Controller = OfflineController<HttpFetcher, DiskCacheStore>;

async fn controller(app: &App) -> Result<Controller> {
    let fetcher = HttpFetcher::new()?;
    let store = DiskCacheStore::open(app.cache_dir(), &app.config.cache_version).await?;
    Ok(OfflineController::new(
        fetcher,
        store,
        ControllerConfig::new(&app.config.app_origin),
    ))
}

/// Classify a path the way a browser would issue it: extension-less and
/// `.html` paths are page loads, known asset types keep their destination.
fn request_for(config: &ControllerConfig, path: &str) -> Request {
    let url = config.resolve(path);
    match Destination::from_path(path) {
        Destination::Empty if is_page(path) => Request::navigate(url),
        Destination::Empty => Request::get(url),
        destination => Request::asset(url, destination),
    }
}

fn is_page(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let last = path.rsplit('/').next().unwrap_or(path);
    !last.contains('.') || last.ends_with(".html") || last.ends_with(".htm")
}

pub async fn install(app: &App) -> Result<()> {
    let mut controller = controller(app).await?;
    controller.install().await.context("Offline install failed")?;
    controller.activate().await?;

    let mut flags = ClientFlags::load(app.cache_dir());
    flags.mark_installed();
    flags.save(app.cache_dir())?;
    println!(
        "Offline cache '{}' ready for {}.",
        controller.store().name(),
        controller.config().origin
    );
    Ok(())
}

pub async fn fetch(app: &App, path: &str, output: Option<&Path>) -> Result<()> {
    let mut controller = controller(app).await?;
    if controller.restore().await? {
        controller.activate().await?;
    } else {
        info!("Offline cache not installed, fetching without it");
    }

    let request = request_for(controller.config(), path);
    let response = controller.handle_fetch(&request).await;
    eprintln!("{} {}", response.status, response.status_text);

    match output {
        Some(out) => {
            tokio::fs::write(out, &response.body)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            eprintln!("{} bytes written to {}", response.body.len(), out.display());
        }
        None => println!("{}", response.text()),
    }
    Ok(())
}

pub async fn status(app: &App) -> Result<()> {
    let flags = ClientFlags::load(app.cache_dir());
    let current = &app.config.cache_version;
    println!("Origin:    {}", app.config.app_origin);
    println!("Installed: {}", if flags.installed { "yes" } else { "no" });

    let regions = list_regions(app.cache_dir()).await?;
    if regions.is_empty() {
        println!("No cache regions.");
        return Ok(());
    }
    for region in &regions {
        let marker = if region == current { "*" } else { " " };
        println!("{} {}", marker, region);
    }

    let store = DiskCacheStore::open(app.cache_dir(), current).await?;
    for (url, cached) in store.entries().await? {
        println!(
            "    {:>3} {:<60} {}",
            cached.data.status,
            url,
            cached.age_display()
        );
    }
    Ok(())
}

pub async fn prune(app: &App) -> Result<()> {
    let removed = prune_regions(app.cache_dir(), &app.config.cache_version).await?;
    if removed.is_empty() {
        println!("Nothing to prune.");
    }
    for name in removed {
        println!("Removed {}", name);
    }
    Ok(())
}

/// Stop suggesting the offline install, for `days` or the default window
pub fn dismiss(app: &App, days: Option<i64>) -> Result<()> {
    let mut flags = ClientFlags::load(app.cache_dir());
    let now = Utc::now();
    match days {
        Some(days) => {
            flags.snooze(days, now)?;
            println!("Install tip snoozed for {} days.", days);
        }
        None => {
            flags.dismiss(now);
            println!("Install tip dismissed.");
        }
    }
    flags.save(app.cache_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelup_core::cache::{RequestMode, Strategy};

    fn config() -> ControllerConfig {
        ControllerConfig::new("https://app.test/")
    }

    #[test]
    fn test_pages_are_navigations() {
        for path in ["/", "/dashboard", "/offline.html", "/goals?tab=weekly"] {
            let request = request_for(&config(), path);
            assert_eq!(request.mode, RequestMode::Navigate, "{}", path);
            assert_eq!(Strategy::for_request(&request), Strategy::NavigationNetworkFirst);
        }
    }

    #[test]
    fn test_assets_are_cache_first() {
        let request = request_for(&config(), "/assets/index-3f2a.js");
        assert_eq!(request.url, "https://app.test/assets/index-3f2a.js");
        assert_eq!(request.destination, Destination::Script);
        assert_eq!(Strategy::for_request(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_other_resources_are_network_first() {
        let request = request_for(&config(), "/manifest.webmanifest");
        assert_eq!(Strategy::for_request(&request), Strategy::NetworkFirst);
        let request = request_for(&config(), "/data.json");
        assert_eq!(request.mode, RequestMode::Cors);
        assert_eq!(Strategy::for_request(&request), Strategy::NetworkFirst);
    }
}
