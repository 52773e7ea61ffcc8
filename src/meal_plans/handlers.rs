use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        GeneratePlanRequest, GeneratedPlanResponse, MealPlanList, MealPlanRequest,
        MealPlanResponse, RangeQuery,
    },
    repo,
    services::{fill_slots, generation_range, new_plan, plan_patch, CANDIDATE_RECIPES, DEFAULT_SERVINGS},
};
use crate::{
    auth::AuthUser,
    dates::range_or_current_week,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    recipes::repo as recipes,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meal-plans", get(list_plans).post(create_plan))
        .route("/meal-plans/generate", post(generate_plan))
        .route("/meal-plans/:id", put(update_plan).delete(delete_plan))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_plans(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(range): Query<RangeQuery>,
) -> AppResult<Json<MealPlanList>> {
    let (start, end) = range_or_current_week(range.start_date.as_deref(), range.end_date.as_deref())?;
    let meal_plans = repo::list_range(&state.db, auth.id, start, end).await?;
    Ok(Json(MealPlanList { meal_plans }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn create_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<MealPlanRequest>,
) -> AppResult<(StatusCode, Json<MealPlanResponse>)> {
    let plan = new_plan(payload)?;
    if !recipes::exists(&state.db, plan.recipe_id).await? {
        return Err(AppError::not_found("Recipe not found"));
    }

    let meal_plan = repo::insert(
        &state.db,
        auth.id,
        plan.recipe_id,
        plan.meal_date,
        plan.meal_type,
        plan.servings,
    )
    .await?;
    info!(plan_id = %meal_plan.id, "meal plan created");
    Ok((
        StatusCode::CREATED,
        Json(MealPlanResponse {
            meal_plan,
            message: "Meal plan saved",
        }),
    ))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn update_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealPlanRequest>,
) -> AppResult<Json<MealPlanResponse>> {
    let patch = plan_patch(payload)?;
    if let Some(recipe_id) = patch.recipe_id {
        if !recipes::exists(&state.db, recipe_id).await? {
            return Err(AppError::not_found("Recipe not found"));
        }
    }

    let meal_plan = repo::update(&state.db, auth.id, id, patch)
        .await?
        .ok_or_else(|| AppError::not_found("Meal plan not found"))?;
    Ok(Json(MealPlanResponse {
        meal_plan,
        message: "Meal plan updated",
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn delete_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    if !repo::delete(&state.db, auth.id, id).await? {
        return Err(AppError::not_found("Meal plan not found"));
    }
    Ok(Json(serde_json::json!({ "message": "Meal plan deleted successfully" })))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn generate_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<GeneratePlanRequest>,
) -> AppResult<Json<GeneratedPlanResponse>> {
    let (start, end) = generation_range(payload.start_date.as_deref(), payload.end_date.as_deref())?;
    let candidates = repo::sample_recipe_ids(&state.db, CANDIDATE_RECIPES).await?;
    let slots = fill_slots(start, end, &candidates, &mut rand::thread_rng());

    let meal_plans = repo::insert_many(&state.db, auth.id, &slots, DEFAULT_SERVINGS).await?;
    info!(count = meal_plans.len(), %start, %end, "meal plan generated");
    Ok(Json(GeneratedPlanResponse {
        message: "Meal plan generated successfully",
        count: meal_plans.len(),
        meal_plans,
    }))
}
