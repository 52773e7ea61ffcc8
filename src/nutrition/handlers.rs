use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{AnalyzeRequest, AnalyzeResponse, DailyResponse, DayQuery, RangeQuery, SummaryResponse},
    repo,
    services::{analyze_remote, estimate, goals_or_defaults, ingredient_query, NUTRITION_API_URL},
};
use crate::{
    auth::{repo_types::UserPreferences, AuthUser},
    dates::{parse_date, range_or_current_week},
    error::{AppError, AppResult},
    extract::{Json, Query},
    recipes::repo_types::NutritionInfo,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/nutrition/summary", get(summary))
        .route("/nutrition/daily", get(daily))
        .route("/nutrition/analyze", post(analyze))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(range): Query<RangeQuery>,
) -> AppResult<Json<SummaryResponse>> {
    let (start, end) = range_or_current_week(range.start_date.as_deref(), range.end_date.as_deref())?;
    let totals = repo::range_totals(&state.db, auth.id, start, end).await?;
    let stored = UserPreferences::find(&state.db, auth.id).await?;

    Ok(Json(SummaryResponse {
        summary: totals,
        goals: goals_or_defaults(stored.map(|p| p.nutritional_goals.0)),
        start_date: start.to_string(),
        end_date: end.to_string(),
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn daily(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<DayQuery>,
) -> AppResult<Json<DailyResponse>> {
    let raw = q
        .date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Date is required"))?;
    let day = parse_date("date", &raw)?;

    let meals = repo::daily_meals(&state.db, auth.id, day).await?;
    let mut daily_total = NutritionInfo::default();
    for meal in &meals {
        daily_total.add(meal.nutrition());
    }

    Ok(Json(DailyResponse {
        date: day.to_string(),
        meals,
        daily_total,
    }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn analyze(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AnalyzeRequest>,
) -> AppResult<Json<AnalyzeResponse>> {
    let ingredients = payload
        .ingredients
        .ok_or_else(|| AppError::bad_request("Ingredients array is required"))?;

    let Some(api) = state.config.nutrition_api.as_ref() else {
        return Ok(Json(AnalyzeResponse {
            nutrition: estimate(ingredients.len()),
            note: Some("Estimated values (Nutrition API not configured)"),
        }));
    };

    let query = ingredient_query(&ingredients);
    match analyze_remote(&state.http, NUTRITION_API_URL, api, &query).await {
        Ok(nutrition) => Ok(Json(AnalyzeResponse {
            nutrition,
            note: None,
        })),
        Err(e) => {
            warn!(error = %e, "nutrition api failed; returning estimates");
            Ok(Json(AnalyzeResponse {
                nutrition: estimate(ingredients.len()),
                note: Some("Estimated values (API unavailable)"),
            }))
        }
    }
}
