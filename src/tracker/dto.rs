use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{macros::format_description, Date, OffsetDateTime};

use crate::error::AppError;
use crate::tracker::repo_types::{DayLedger, FoodEntry, FoodItem, MealTemplate, Totals};
use crate::tracker::services::totals;

/// Everything the client needs to redraw one day.
#[derive(Debug, Serialize)]
pub struct DayView {
    pub date: String,
    pub foods: Vec<FoodEntry>,
    pub steps: u64,
    pub totals: Totals,
}

impl DayView {
    pub fn new(date: &str, ledger: Option<&DayLedger>) -> Self {
        Self {
            date: date.to_string(),
            foods: ledger.map(|d| d.foods.clone()).unwrap_or_default(),
            steps: ledger.map(|d| d.steps).unwrap_or(0),
            totals: totals(ledger),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetStepsRequest {
    #[serde(default)]
    pub steps: Value,
}

#[derive(Debug, Deserialize)]
pub struct SaveMealRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<FoodItem>,
}

#[derive(Debug, Serialize)]
pub struct MealListItem {
    pub id: String,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<FoodItem>,
}

impl From<&MealTemplate> for MealListItem {
    fn from(m: &MealTemplate) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            item_count: m.items.len(),
            items: m.items.clone(),
        }
    }
}

/// Accepts `YYYY-MM-DD` or `today` (UTC).
pub fn resolve_date_key(raw: &str) -> Result<String, AppError> {
    let format = format_description!("[year]-[month]-[day]");
    if raw == "today" {
        return OffsetDateTime::now_utc()
            .date()
            .format(format)
            .map_err(|e| AppError::Internal(e.to_string()));
    }
    Date::parse(raw, format).map_err(|_| AppError::InvalidDate(raw.to_string()))?;
    Ok(raw.to_string())
}
