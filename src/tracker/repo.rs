use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::KvStorage;
use crate::tracker::repo_types::Store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persisted document is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage backend failed: {0:#}")]
    Storage(anyhow::Error),
}

/// Reads the document, distinguishing "nothing saved yet" from a broken one.
pub async fn try_load(storage: &dyn KvStorage, key: &str) -> Result<Option<Store>, StoreError> {
    let raw = storage.get_item(key).await.map_err(StoreError::Storage)?;
    match raw {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(StoreError::Malformed),
    }
}

/// Never fails: unreadable or corrupt data yields an empty store.
pub async fn load(storage: &dyn KvStorage, key: &str) -> Store {
    match try_load(storage, key).await {
        Ok(Some(store)) => {
            debug!(key, days = store.days.len(), meals = store.meals.len(), "store loaded");
            store
        }
        Ok(None) => {
            debug!(key, "no saved store, starting empty");
            Store::default()
        }
        Err(e) => {
            warn!(error = %e, key, "discarding unreadable store");
            Store::default()
        }
    }
}

/// Overwrites the saved document with the whole store.
pub async fn save(storage: &dyn KvStorage, key: &str, store: &Store) -> Result<(), StoreError> {
    let raw = serde_json::to_string(store).map_err(StoreError::Encode)?;
    storage
        .set_item(key, &raw)
        .await
        .map_err(StoreError::Storage)?;
    debug!(key, bytes = raw.len(), "store saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::tracker::repo_types::{DayLedger, FoodEntry, FoodItem, MealTemplate};

    const KEY: &str = "fs_tracker_v1";

    fn sample() -> Store {
        let mut store = Store::default();
        store.days.insert(
            "2024-01-01".into(),
            DayLedger {
                foods: vec![FoodEntry::from_item(
                    "f1".into(),
                    FoodItem { name: "Apple".into(), calories: 95.0, protein: 0.5, carbs: 25.0, fat: 0.3 },
                )],
                steps: 4200,
            },
        );
        store.meals.push(MealTemplate {
            id: "m1".into(),
            name: "Snack".into(),
            items: vec![FoodItem { name: "Nuts".into(), calories: 180.0, ..Default::default() }],
        });
        store
    }

    #[tokio::test]
    async fn save_then_load_returns_same_document() {
        let storage = MemoryStorage::new();
        let store = sample();
        save(&storage, KEY, &store).await.expect("save");
        assert_eq!(load(&storage, KEY).await, store);
    }

    #[tokio::test]
    async fn missing_document_loads_empty() {
        let storage = MemoryStorage::new();
        assert!(try_load(&storage, KEY).await.expect("no error").is_none());
        assert_eq!(load(&storage, KEY).await, Store::default());
    }

    #[tokio::test]
    async fn malformed_document_is_reported_by_try_load_but_not_load() {
        let storage = MemoryStorage::new();
        storage.set_item(KEY, "{not json").await.expect("set");
        assert!(matches!(
            try_load(&storage, KEY).await,
            Err(StoreError::Malformed(_))
        ));
        assert_eq!(load(&storage, KEY).await, Store::default());

        storage.set_item(KEY, "null").await.expect("set");
        assert_eq!(load(&storage, KEY).await, Store::default());
    }

    #[tokio::test]
    async fn legacy_string_nutrients_still_load() {
        let storage = MemoryStorage::new();
        storage
            .set_item(
                KEY,
                r#"{"days":{"2024-03-05":{"foods":[{"id":"lq3x9ab","name":"Soup","calories":"120","protein":"x"}],"steps":"900"}},"meals":[]}"#,
            )
            .await
            .expect("set");
        let store = load(&storage, KEY).await;
        let day = &store.days["2024-03-05"];
        assert_eq!(day.steps, 900);
        assert_eq!(day.foods[0].calories, 120.0);
        assert_eq!(day.foods[0].protein, 0.0);
    }

    #[tokio::test]
    async fn records_missing_ids_or_names_do_not_wipe_the_document() {
        let storage = MemoryStorage::new();
        storage
            .set_item(
                KEY,
                r#"{"days":{"2024-01-01":{"foods":[{"id":"a","name":"Egg","calories":70},{"name":"Toast","calories":80}],"steps":5000}},"meals":[{"id":"m1","items":[]}]}"#,
            )
            .await
            .expect("set");
        let store = try_load(&storage, KEY).await.expect("loads").expect("present");

        assert_eq!(store.days.len(), 1);
        let day = &store.days["2024-01-01"];
        assert_eq!(day.steps, 5000);
        assert_eq!(day.foods.len(), 2);
        assert_eq!(day.foods[0].id, "a");
        assert_eq!(day.foods[1].name, "Toast");
        assert!(!day.foods[1].id.is_empty());

        assert_eq!(store.meals.len(), 1);
        assert_eq!(store.meals[0].id, "m1");
        assert_eq!(store.meals[0].name, "");
    }
}
