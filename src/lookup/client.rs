use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::LookupConfig;
use crate::tracker::repo_types::{coerce_number, FoodItem};

const FALLBACK_NAME: &str = "Scanned product";

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(FoodItem),
    NotFound,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("lookup returned HTTP {0}")]
    Status(u16),
    #[error("lookup payload malformed: {0}")]
    Malformed(String),
}

/// Resolves a barcode to staged food values. Implementations never touch the store.
#[async_trait]
pub trait BarcodeLookup: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<LookupOutcome, LookupError>;
}

pub struct OpenFoodFactsClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(config: &LookupConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("calorie-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build lookup http client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BarcodeLookup for OpenFoodFactsClient {
    async fn lookup(&self, code: &str) -> Result<LookupOutcome, LookupError> {
        let url = format!("{}/api/v0/product/{}.json", self.base_url, code);
        debug!(%url, "barcode lookup");
        let res = self.http.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(LookupError::Status(res.status().as_u16()));
        }
        let body = res.bytes().await?;
        let payload: Value =
            serde_json::from_slice(&body).map_err(|e| LookupError::Malformed(e.to_string()))?;
        map_payload(payload)
    }
}

#[derive(Debug, Deserialize)]
struct ProductPayload {
    #[serde(default)]
    status: Value,
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(default)]
    product_name: Value,
    #[serde(default)]
    generic_name: Value,
    #[serde(default)]
    nutriments: Option<Map<String, Value>>,
}

/// Maps an Open Food Facts product payload into a food item.
/// Per-100g values win; a missing or zero value falls back to per-serving.
pub fn map_payload(payload: Value) -> Result<LookupOutcome, LookupError> {
    let payload: ProductPayload =
        serde_json::from_value(payload).map_err(|e| LookupError::Malformed(e.to_string()))?;
    if payload.status.as_i64() != Some(1) {
        return Ok(LookupOutcome::NotFound);
    }
    let product = payload
        .product
        .ok_or_else(|| LookupError::Malformed("status 1 without product".into()))?;

    let name = [&product.product_name, &product.generic_name]
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(FALLBACK_NAME)
        .to_string();

    let nutriments = product.nutriments.unwrap_or_default();
    let nutrient = |key: &str| {
        [format!("{key}_100g"), format!("{key}_serving")]
            .iter()
            .map(|k| nutriments.get(k).map(coerce_number).unwrap_or(0.0))
            .find(|v| *v != 0.0)
            .unwrap_or(0.0)
    };

    Ok(LookupOutcome::Found(FoodItem {
        name,
        calories: nutrient("energy-kcal"),
        protein: nutrient("proteins"),
        carbs: nutrient("carbohydrates"),
        fat: nutrient("fat"),
    }))
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;

    use super::*;

    /// Serves canned products; `offline` makes every lookup fail.
    #[derive(Default)]
    pub struct FakeLookup {
        pub products: HashMap<String, FoodItem>,
        pub offline: bool,
    }

    #[async_trait]
    impl BarcodeLookup for FakeLookup {
        async fn lookup(&self, code: &str) -> Result<LookupOutcome, LookupError> {
            if self.offline {
                return Err(LookupError::Status(503));
            }
            Ok(self
                .products
                .get(code)
                .cloned()
                .map(LookupOutcome::Found)
                .unwrap_or(LookupOutcome::NotFound))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_per_100g_values() {
        let outcome = map_payload(json!({
            "status": 1,
            "product": {
                "product_name": "Oat Drink",
                "nutriments": {
                    "energy-kcal_100g": 46,
                    "proteins_100g": 1.0,
                    "carbohydrates_100g": 6.6,
                    "fat_100g": 1.5,
                    "fat_serving": 3.75
                }
            }
        }))
        .expect("mapped");
        assert_eq!(
            outcome,
            LookupOutcome::Found(FoodItem {
                name: "Oat Drink".into(),
                calories: 46.0,
                protein: 1.0,
                carbs: 6.6,
                fat: 1.5,
            })
        );
    }

    #[test]
    fn falls_back_to_serving_values_and_generic_name() {
        let outcome = map_payload(json!({
            "status": 1,
            "product": {
                "product_name": "",
                "generic_name": "Granola bar",
                "nutriments": {
                    "energy-kcal_100g": 0,
                    "energy-kcal_serving": "190",
                    "proteins_serving": 3
                }
            }
        }))
        .expect("mapped");
        let LookupOutcome::Found(item) = outcome else {
            panic!("expected a product");
        };
        assert_eq!(item.name, "Granola bar");
        assert_eq!(item.calories, 190.0);
        assert_eq!(item.protein, 3.0);
        assert_eq!(item.carbs, 0.0);
        assert_eq!(item.fat, 0.0);
    }

    #[test]
    fn nameless_product_without_nutriments_gets_defaults() {
        let outcome = map_payload(json!({ "status": 1, "product": {} })).expect("mapped");
        assert_eq!(
            outcome,
            LookupOutcome::Found(FoodItem {
                name: FALLBACK_NAME.into(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn status_other_than_one_is_not_found() {
        for payload in [
            json!({ "status": 0, "status_verbose": "product not found" }),
            json!({ "status": "1", "product": {} }),
            json!({}),
        ] {
            assert_eq!(map_payload(payload).expect("mapped"), LookupOutcome::NotFound);
        }
    }

    #[test]
    fn found_status_without_product_is_malformed() {
        assert!(matches!(
            map_payload(json!({ "status": 1 })),
            Err(LookupError::Malformed(_))
        ));
        assert!(matches!(
            map_payload(json!([1, 2, 3])),
            Err(LookupError::Malformed(_))
        ));
    }
}
