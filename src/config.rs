use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub assets_dir: PathBuf,
    pub cache_name: String,
    pub lookup: LookupConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let lookup = LookupConfig {
            base_url: std::env::var("LOOKUP_BASE_URL")
                .unwrap_or_else(|_| "https://world.openfoodfacts.org".into()),
            timeout_secs: std::env::var("LOOKUP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        };
        let storage_key =
            std::env::var("STORAGE_KEY").unwrap_or_else(|_| "fs_tracker_v1".into());
        anyhow::ensure!(!storage_key.trim().is_empty(), "STORAGE_KEY must not be empty");

        Ok(Self {
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
            storage_key,
            assets_dir: std::env::var("ASSETS_DIR")
                .unwrap_or_else(|_| "./public".into())
                .into(),
            cache_name: std::env::var("CACHE_NAME")
                .unwrap_or_else(|_| "calorie-tracker-v1".into()),
            lookup,
        })
    }
}
