use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Static files kept available offline.
pub const ASSET_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/style.css",
    "/script.js",
    "/manifest.json",
    "/icon-192.png",
    "/icon-512.png",
];

const DEFAULT_DOCUMENT: &str = "/index.html";

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: Bytes,
}

/// Where assets come from when they are not cached.
/// `Ok(None)` means the origin answered but has no such file.
#[async_trait]
pub trait AssetOrigin: Send + Sync {
    async fn fetch(&self, path: &str) -> anyhow::Result<Option<Asset>>;
}

pub struct DirOrigin {
    root: PathBuf,
}

impl DirOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = path.trim_start_matches('/');
        let rel = if rel.is_empty() { "index.html" } else { rel };
        let rel = Path::new(rel);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }
}

#[async_trait]
impl AssetOrigin for DirOrigin {
    async fn fetch(&self, path: &str) -> anyhow::Result<Option<Asset>> {
        let Some(file) = self.resolve(path) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_dir() => return Ok(None),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("stat asset {}", file.display())),
        }
        match tokio::fs::read(&file).await {
            Ok(body) => Ok(Some(Asset {
                content_type: content_type_for(&file),
                body: Bytes::from(body),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read asset {}", file.display())),
        }
    }
}

fn content_type_for(file: &Path) -> &'static str {
    match file.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" | "webmanifest" => "application/manifest+json",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, PartialEq)]
pub enum Served {
    /// Answered from the active cache generation.
    Hit(Asset),
    /// Fetched from the origin and cached.
    Network(Asset),
    /// Origin failed; the cached default document stands in.
    Fallback(Asset),
    /// Origin has no such file.
    NotFound,
    /// Origin failed and no default document is cached.
    Unavailable,
    /// Not a GET; left to the rest of the service.
    PassThrough,
}

/// Named cache generations of static assets, one of them active.
pub struct AssetCache {
    origin: Arc<dyn AssetOrigin>,
    generations: RwLock<HashMap<String, HashMap<String, Asset>>>,
    active: RwLock<Option<String>>,
}

impl AssetCache {
    pub fn new(origin: Arc<dyn AssetOrigin>) -> Self {
        Self {
            origin,
            generations: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
        }
    }

    /// Fetches the whole manifest into generation `name`. Nothing is stored
    /// unless every entry is available.
    pub async fn install(&self, name: &str) -> anyhow::Result<usize> {
        let mut entries = HashMap::with_capacity(ASSET_MANIFEST.len());
        for path in ASSET_MANIFEST {
            let asset = self
                .origin
                .fetch(path)
                .await?
                .with_context(|| format!("manifest entry {path} missing from origin"))?;
            entries.insert(path.to_string(), asset);
        }
        let count = entries.len();
        self.generations
            .write()
            .await
            .insert(name.to_string(), entries);
        info!(cache = name, count, "asset cache installed");
        Ok(count)
    }

    /// Makes `name` the active generation and drops every other one.
    /// Returns how many generations were deleted.
    pub async fn activate(&self, name: &str) -> usize {
        let mut generations = self.generations.write().await;
        generations.entry(name.to_string()).or_default();
        let before = generations.len();
        generations.retain(|k, _| k == name);
        let removed = before - generations.len();
        *self.active.write().await = Some(name.to_string());
        info!(cache = name, removed, "asset cache activated");
        removed
    }

    pub async fn generation_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.generations.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn cached(&self, path: &str) -> Option<Asset> {
        let active = self.active.read().await.clone()?;
        self.generations
            .read()
            .await
            .get(&active)
            .and_then(|g| g.get(path))
            .cloned()
    }

    async fn put(&self, path: &str, asset: Asset) {
        let Some(active) = self.active.read().await.clone() else {
            return;
        };
        self.generations
            .write()
            .await
            .entry(active)
            .or_default()
            .insert(path.to_string(), asset);
    }

    pub async fn fetch(&self, method: &Method, path: &str) -> Served {
        if method != Method::GET {
            return Served::PassThrough;
        }
        if let Some(asset) = self.cached(path).await {
            return Served::Hit(asset);
        }
        match self.origin.fetch(path).await {
            Ok(Some(asset)) => {
                self.put(path, asset.clone()).await;
                Served::Network(asset)
            }
            Ok(None) => Served::NotFound,
            Err(e) => {
                warn!(error = %e, path, "asset origin failed");
                match self.cached(DEFAULT_DOCUMENT).await {
                    Some(asset) => Served::Fallback(asset),
                    None => Served::Unavailable,
                }
            }
        }
    }
}

/// Router fallback: everything outside the API is served from the asset cache.
pub async fn serve_asset(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let served = state.assets.fetch(&method, uri.path()).await;
    debug!(path = uri.path(), kind = served_kind(&served), "asset request");
    match served {
        Served::Hit(asset) | Served::Network(asset) | Served::Fallback(asset) => {
            ([(header::CONTENT_TYPE, asset.content_type)], asset.body).into_response()
        }
        Served::NotFound => StatusCode::NOT_FOUND.into_response(),
        Served::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Served::PassThrough => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

fn served_kind(served: &Served) -> &'static str {
    match served {
        Served::Hit(_) => "hit",
        Served::Network(_) => "network",
        Served::Fallback(_) => "fallback",
        Served::NotFound => "not_found",
        Served::Unavailable => "unavailable",
        Served::PassThrough => "pass_through",
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::fake::MemoryOrigin;
    use super::*;

    async fn installed(origin: Arc<MemoryOrigin>) -> AssetCache {
        let cache = AssetCache::new(origin);
        cache.install("calorie-tracker-v1").await.expect("install");
        cache.activate("calorie-tracker-v1").await;
        cache
    }

    #[tokio::test]
    async fn activate_drops_other_generations() {
        let cache = AssetCache::new(Arc::new(MemoryOrigin::with_manifest()));
        cache.install("calorie-tracker-v0").await.expect("install v0");
        cache.install("calorie-tracker-v1").await.expect("install v1");
        assert_eq!(cache.activate("calorie-tracker-v1").await, 1);
        assert_eq!(cache.generation_names().await, ["calorie-tracker-v1"]);
    }

    #[tokio::test]
    async fn install_is_all_or_nothing() {
        let origin = MemoryOrigin::default();
        origin.insert("/index.html", "<html>");
        let cache = AssetCache::new(Arc::new(origin));
        assert!(cache.install("v1").await.is_err());
        assert!(cache.generation_names().await.is_empty());
    }

    #[tokio::test]
    async fn cached_assets_survive_origin_outage() {
        let origin = Arc::new(MemoryOrigin::with_manifest());
        let cache = installed(origin.clone()).await;
        origin.offline.store(true, Ordering::SeqCst);
        let before = origin.fetches.load(Ordering::SeqCst);

        let Served::Hit(asset) = cache.fetch(&Method::GET, "/style.css").await else {
            panic!("expected a cache hit");
        };
        assert_eq!(asset.body, Bytes::from("body of /style.css"));
        assert_eq!(origin.fetches.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn misses_are_fetched_and_cached() {
        let origin = Arc::new(MemoryOrigin::with_manifest());
        let cache = installed(origin.clone()).await;
        origin.insert("/extra.js", "late");

        assert!(matches!(cache.fetch(&Method::GET, "/extra.js").await, Served::Network(_)));
        origin.offline.store(true, Ordering::SeqCst);
        assert!(matches!(cache.fetch(&Method::GET, "/extra.js").await, Served::Hit(_)));
    }

    #[tokio::test]
    async fn offline_miss_falls_back_to_default_document() {
        let origin = Arc::new(MemoryOrigin::with_manifest());
        let cache = installed(origin.clone()).await;
        origin.offline.store(true, Ordering::SeqCst);

        let Served::Fallback(asset) = cache.fetch(&Method::GET, "/days/2024-01-01").await else {
            panic!("expected fallback");
        };
        assert_eq!(asset.body, Bytes::from("body of /index.html"));
    }

    #[tokio::test]
    async fn missing_and_unavailable_and_non_get() {
        let origin = Arc::new(MemoryOrigin::default());
        let cache = AssetCache::new(origin.clone());
        cache.activate("v1").await;

        assert_eq!(cache.fetch(&Method::GET, "/nope.css").await, Served::NotFound);
        origin.offline.store(true, Ordering::SeqCst);
        assert_eq!(cache.fetch(&Method::GET, "/nope.css").await, Served::Unavailable);
        assert_eq!(cache.fetch(&Method::POST, "/index.html").await, Served::PassThrough);
    }

    #[tokio::test]
    async fn dir_origin_maps_root_and_rejects_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("index.html"), "<html></html>").expect("write");
        let origin = DirOrigin::new(dir.path());

        let root = origin.fetch("/").await.expect("fetch").expect("index");
        assert_eq!(root.content_type, "text/html; charset=utf-8");
        assert_eq!(root.body, Bytes::from("<html></html>"));
        assert!(origin.fetch("/../secret").await.expect("fetch").is_none());
        assert!(origin.fetch("/missing.png").await.expect("fetch").is_none());
    }

    #[tokio::test]
    async fn directory_paths_are_not_found_rather_than_outages() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("index.html"), "<html></html>").expect("write");
        std::fs::create_dir(dir.path().join("icons")).expect("mkdir");
        let origin = Arc::new(DirOrigin::new(dir.path()));
        assert!(origin.fetch("/icons").await.expect("fetch").is_none());

        let cache = AssetCache::new(origin);
        cache.activate("v1").await;
        cache.fetch(&Method::GET, "/index.html").await;
        assert_eq!(cache.fetch(&Method::GET, "/icons").await, Served::NotFound);
    }
}
