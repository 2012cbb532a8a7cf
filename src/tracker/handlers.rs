use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{error::AppError, state::AppState};

use super::dto::{resolve_date_key, DayView, MealListItem, SaveMealRequest, SetStepsRequest};
use super::repo_types::{FoodEntry, FoodItem};

// --- public routers ---

pub fn day_routes() -> Router<AppState> {
    Router::new()
        .route("/days/:date", get(get_day))
        .route("/days/:date/foods", post(add_food))
        .route("/days/:date/foods/:id", delete(remove_food))
        .route("/days/:date/steps", put(set_steps))
        .route("/days/:date/meals/:id", post(apply_meal))
}

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(save_meal))
        .route("/meals/:id", delete(remove_meal))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn get_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayView>, AppError> {
    let date = resolve_date_key(&date)?;
    let tracker = state.tracker.lock().await;
    Ok(Json(DayView::new(&date, tracker.day(&date))))
}

#[instrument(skip(state, item))]
pub async fn add_food(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(mut item): Json<FoodItem>,
) -> Result<(StatusCode, Json<FoodEntry>), AppError> {
    let date = resolve_date_key(&date)?;
    item.name = item.name.trim().to_string();
    if item.name.is_empty() {
        return Err(AppError::MissingFoodName);
    }
    let entry = state.tracker.lock().await.add_food(&date, item).await?;
    info!(%date, food_id = %entry.id, "food logged");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state))]
pub async fn remove_food(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> Result<Json<DayView>, AppError> {
    let date = resolve_date_key(&date)?;
    let mut tracker = state.tracker.lock().await;
    tracker.remove_food(&date, &id).await?;
    Ok(Json(DayView::new(&date, tracker.day(&date))))
}

#[instrument(skip(state, body))]
pub async fn set_steps(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(body): Json<SetStepsRequest>,
) -> Result<Json<DayView>, AppError> {
    let date = resolve_date_key(&date)?;
    let mut tracker = state.tracker.lock().await;
    tracker.set_steps(&date, &body.steps).await?;
    Ok(Json(DayView::new(&date, tracker.day(&date))))
}

#[instrument(skip(state))]
pub async fn list_meals(State(state): State<AppState>) -> Json<Vec<MealListItem>> {
    let tracker = state.tracker.lock().await;
    Json(tracker.store().meals.iter().map(MealListItem::from).collect())
}

#[instrument(skip(state, body))]
pub async fn save_meal(
    State(state): State<AppState>,
    Json(body): Json<SaveMealRequest>,
) -> Result<(StatusCode, Json<MealListItem>), AppError> {
    let meal = state
        .tracker
        .lock()
        .await
        .save_meal(&body.name, body.items)
        .await?
        .ok_or(AppError::MissingMealName)?;
    Ok((StatusCode::CREATED, Json(MealListItem::from(&meal))))
}

#[instrument(skip(state))]
pub async fn remove_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.tracker.lock().await.remove_meal(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Meal"))
    }
}

#[instrument(skip(state))]
pub async fn apply_meal(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> Result<Json<DayView>, AppError> {
    let date = resolve_date_key(&date)?;
    let mut tracker = state.tracker.lock().await;
    tracker
        .apply_meal(&date, &id)
        .await?
        .ok_or(AppError::NotFound("Meal"))?;
    Ok(Json(DayView::new(&date, tracker.day(&date))))
}
