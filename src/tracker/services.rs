use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::storage::KvStorage;
use crate::tracker::repo::{self, StoreError};
use crate::tracker::repo_types::{
    coerce_steps, fresh_id as new_id, DayLedger, FoodEntry, FoodItem, MealTemplate, Store, Totals,
};

// --- store operations (in-memory only) ---

pub fn ensure_day<'a>(store: &'a mut Store, date_key: &str) -> &'a mut DayLedger {
    store.days.entry(date_key.to_string()).or_default()
}

pub fn add_food(store: &mut Store, date_key: &str, item: FoodItem) -> FoodEntry {
    let entry = FoodEntry::from_item(new_id(), item);
    ensure_day(store, date_key).foods.push(entry.clone());
    entry
}

/// Returns whether an entry was removed. The day is created either way.
pub fn remove_food(store: &mut Store, date_key: &str, food_id: &str) -> bool {
    let day = ensure_day(store, date_key);
    match day.foods.iter().position(|f| f.id == food_id) {
        Some(idx) => {
            day.foods.remove(idx);
            true
        }
        None => false,
    }
}

pub fn set_steps(store: &mut Store, date_key: &str, value: &Value) -> u64 {
    let steps = coerce_steps(value);
    ensure_day(store, date_key).steps = steps;
    steps
}

pub fn totals(ledger: Option<&DayLedger>) -> Totals {
    ledger.map(DayLedger::totals).unwrap_or_default()
}

/// `None` when `name` is blank; the store is left untouched in that case.
pub fn save_meal(store: &mut Store, name: &str, items: Vec<FoodItem>) -> Option<MealTemplate> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let meal = MealTemplate {
        id: new_id(),
        name: name.to_string(),
        items,
    };
    store.meals.insert(0, meal.clone());
    Some(meal)
}

/// Copies every item of the meal into the day under fresh ids.
/// Returns the number of entries added, or `None` for an unknown meal.
pub fn apply_meal(store: &mut Store, date_key: &str, meal_id: &str) -> Option<usize> {
    let items = store
        .meals
        .iter()
        .find(|m| m.id == meal_id)
        .map(|m| m.items.clone())?;
    let day = ensure_day(store, date_key);
    let added = items.len();
    day.foods.extend(
        items
            .into_iter()
            .map(|item| FoodEntry::from_item(new_id(), item)),
    );
    Some(added)
}

pub fn remove_meal(store: &mut Store, meal_id: &str) -> bool {
    let before = store.meals.len();
    store.meals.retain(|m| m.id != meal_id);
    store.meals.len() != before
}

// --- persisted tracker ---

/// Owns the store and writes the whole document after every mutation.
/// Subscribers get a new revision number for each committed change.
pub struct Tracker {
    store: Store,
    storage: Arc<dyn KvStorage>,
    key: String,
    revision: watch::Sender<u64>,
}

impl Tracker {
    pub fn new(store: Store, storage: Arc<dyn KvStorage>, key: impl Into<String>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            storage,
            key: key.into(),
            revision,
        }
    }

    /// Loads the saved document (or an empty one) from `storage`.
    pub async fn open(storage: Arc<dyn KvStorage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let store = repo::load(storage.as_ref(), &key).await;
        Self::new(store, storage, key)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn day(&self, date_key: &str) -> Option<&DayLedger> {
        self.store.days.get(date_key)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Persists, then publishes a revision. Subscribers are notified even
    /// when the write fails, since the in-memory store has already changed.
    async fn commit(&mut self) -> Result<(), StoreError> {
        let saved = repo::save(self.storage.as_ref(), &self.key, &self.store).await;
        self.revision.send_modify(|r| *r += 1);
        saved
    }

    pub async fn add_food(&mut self, date_key: &str, item: FoodItem) -> Result<FoodEntry, StoreError> {
        let entry = add_food(&mut self.store, date_key, item);
        debug!(date_key, food_id = %entry.id, name = %entry.name, "food added");
        self.commit().await?;
        Ok(entry)
    }

    pub async fn remove_food(&mut self, date_key: &str, food_id: &str) -> Result<bool, StoreError> {
        let removed = remove_food(&mut self.store, date_key, food_id);
        debug!(date_key, food_id, removed, "food removal");
        self.commit().await?;
        Ok(removed)
    }

    pub async fn set_steps(&mut self, date_key: &str, value: &Value) -> Result<u64, StoreError> {
        let steps = set_steps(&mut self.store, date_key, value);
        debug!(date_key, steps, "steps set");
        self.commit().await?;
        Ok(steps)
    }

    pub async fn save_meal(
        &mut self,
        name: &str,
        items: Vec<FoodItem>,
    ) -> Result<Option<MealTemplate>, StoreError> {
        let Some(meal) = save_meal(&mut self.store, name, items) else {
            debug!("blank meal name, nothing saved");
            return Ok(None);
        };
        info!(meal_id = %meal.id, name = %meal.name, items = meal.items.len(), "meal saved");
        self.commit().await?;
        Ok(Some(meal))
    }

    pub async fn apply_meal(&mut self, date_key: &str, meal_id: &str) -> Result<Option<usize>, StoreError> {
        let Some(added) = apply_meal(&mut self.store, date_key, meal_id) else {
            debug!(date_key, meal_id, "meal not found");
            return Ok(None);
        };
        debug!(date_key, meal_id, added, "meal applied");
        self.commit().await?;
        Ok(Some(added))
    }

    pub async fn remove_meal(&mut self, meal_id: &str) -> Result<bool, StoreError> {
        if !remove_meal(&mut self.store, meal_id) {
            return Ok(false);
        }
        info!(meal_id, "meal removed");
        self.commit().await?;
        Ok(true)
    }
}
