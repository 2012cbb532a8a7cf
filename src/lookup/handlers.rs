use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{error::AppError, state::AppState, tracker::repo_types::FoodItem};

use super::client::LookupOutcome;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Found,
    NotFound,
    Failed,
}

/// Staged values for the add-food form plus a message for the user.
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub status: LookupStatus,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food: Option<FoodItem>,
}

pub(crate) fn is_valid_barcode(code: &str) -> bool {
    lazy_static! {
        static ref BARCODE_RE: Regex = Regex::new(r"^[0-9A-Za-z-]{1,64}$").unwrap();
    }
    BARCODE_RE.is_match(code)
}

pub fn lookup_routes() -> Router<AppState> {
    Router::new().route("/lookup/:code", get(lookup_barcode))
}

#[instrument(skip(state))]
pub async fn lookup_barcode(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LookupResponse>, AppError> {
    let code = code.trim();
    if !is_valid_barcode(code) {
        warn!(code, "invalid barcode");
        return Err(AppError::InvalidBarcode(code.to_string()));
    }

    let response = match state.lookup.lookup(code).await {
        Ok(LookupOutcome::Found(food)) => {
            info!(code, name = %food.name, "product found");
            LookupResponse {
                status: LookupStatus::Found,
                message: "Found product, edit if needed and press Add",
                food: Some(food),
            }
        }
        Ok(LookupOutcome::NotFound) => {
            info!(code, "product not found");
            LookupResponse {
                status: LookupStatus::NotFound,
                message: "Not found, enter details manually",
                food: None,
            }
        }
        Err(e) => {
            warn!(error = %e, code, "barcode lookup failed");
            LookupResponse {
                status: LookupStatus::Failed,
                message: "Lookup failed (offline?), enter manually",
                food: None,
            }
        }
    };
    Ok(Json(response))
}
