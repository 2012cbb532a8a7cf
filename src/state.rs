use crate::assets::{AssetCache, DirOrigin};
use crate::config::AppConfig;
use crate::lookup::client::{BarcodeLookup, OpenFoodFactsClient};
use crate::storage::{FileStorage, KvStorage};
use crate::tracker::services::Tracker;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tracker: Arc<Mutex<Tracker>>,
    pub lookup: Arc<dyn BarcodeLookup>,
    pub assets: Arc<AssetCache>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let storage = Arc::new(FileStorage::new(&config.data_dir).await?) as Arc<dyn KvStorage>;
        let tracker = Tracker::open(storage, config.storage_key.clone()).await;

        let lookup = Arc::new(OpenFoodFactsClient::new(&config.lookup)?) as Arc<dyn BarcodeLookup>;

        let assets = Arc::new(AssetCache::new(Arc::new(DirOrigin::new(&config.assets_dir))));
        if let Err(e) = assets.install(&config.cache_name).await {
            tracing::warn!(error = %e, cache = %config.cache_name, "asset precache incomplete; serving from disk");
        }
        assets.activate(&config.cache_name).await;
        tracing::debug!(generations = ?assets.generation_names().await, "asset cache ready");

        Ok(Self {
            config,
            tracker: Arc::new(Mutex::new(tracker)),
            lookup,
            assets,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::assets::fake::MemoryOrigin;
        use crate::lookup::client::fake::FakeLookup;
        use crate::storage::MemoryStorage;

        let config = Arc::new(AppConfig {
            data_dir: "./data".into(),
            storage_key: "fs_tracker_v1".into(),
            assets_dir: "./public".into(),
            cache_name: "calorie-tracker-v1".into(),
            lookup: crate::config::LookupConfig {
                base_url: "https://fake.local".into(),
                timeout_secs: 1,
            },
        });

        let storage = Arc::new(MemoryStorage::new()) as Arc<dyn KvStorage>;
        let tracker = Tracker::new(Default::default(), storage, config.storage_key.clone());

        Self {
            config,
            tracker: Arc::new(Mutex::new(tracker)),
            lookup: Arc::new(FakeLookup::default()),
            assets: Arc::new(AssetCache::new(Arc::new(MemoryOrigin::with_manifest()))),
        }
    }
}
