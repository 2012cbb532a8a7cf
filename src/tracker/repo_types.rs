use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub days: BTreeMap<String, DayLedger>,
    /// Most recently saved first.
    #[serde(default)]
    pub meals: Vec<MealTemplate>,
}

/// Foods and steps logged for one date-key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayLedger {
    #[serde(default)]
    pub foods: Vec<FoodEntry>,
    #[serde(default, deserialize_with = "lenient_steps")]
    pub steps: u64,
}

/// A logged food. `id` is only ever used to find the entry for removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    #[serde(default = "fresh_id", deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat: f64,
}

/// Nutrient values without an identity: manual input, lookup results and
/// meal template items all share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat: f64,
}

/// Saved meal. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealTemplate {
    #[serde(default = "fresh_id", deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<FoodItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl FoodEntry {
    pub fn from_item(id: String, item: FoodItem) -> Self {
        Self {
            id,
            name: item.name,
            calories: item.calories,
            protein: item.protein,
            carbs: item.carbs,
            fat: item.fat,
        }
    }
}

impl DayLedger {
    pub fn totals(&self) -> Totals {
        // Saturate so a huge ledger never serializes `inf` as null.
        let add = |a: f64, b: f64| (a + b).clamp(f64::MIN, f64::MAX);
        self.foods.iter().fold(Totals::default(), |mut t, f| {
            t.calories = add(t.calories, f.calories);
            t.protein = add(t.protein, f.protein);
            t.carbs = add(t.carbs, f.carbs);
            t.fat = add(t.fat, f.fat);
            t
        })
    }
}

/// Identifier for a new food entry or meal template.
pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Numbers pass through, numeric strings are parsed, everything else is 0.
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Step counts are whole and never negative.
pub fn coerce_steps(value: &Value) -> u64 {
    let n = coerce_number(value);
    if n <= 0.0 {
        0
    } else {
        n.trunc() as u64
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

/// Missing, null or blank ids are replaced so one damaged record
/// never invalidates the whole document.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => s,
        Value::Number(n) => n.to_string(),
        _ => fresh_id(),
    };
    Ok(id)
}

fn lenient_steps<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_steps(&value))
}
