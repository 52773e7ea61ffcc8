use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        FavoriteResponse, GenerateRecipeRequest, GenerateRecipeResponse, RateRequest, RateResponse,
        RecipeList, RecipeQuery, RecipeResponse,
    },
    repo,
    services::{constraints_for, filter_from_query, generate_and_store, validate_rating},
};
use crate::{
    auth::{repo_types::UserPreferences, AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/favorites", get(list_favorites))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/generate", post(generate))
        .route("/recipes/:id/rate", post(rate))
        .route("/recipes/:id/favorite", post(toggle_favorite))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> AppResult<Json<RecipeList>> {
    let filter = filter_from_query(query)?;
    let recipes = repo::list(&state.db, &filter).await?;
    Ok(Json(RecipeList { recipes }))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecipeResponse>> {
    let recipe = repo::find_detail(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;
    Ok(Json(RecipeResponse { recipe }))
}

#[instrument(skip(state, caller, payload))]
pub async fn generate(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(payload): Json<GenerateRecipeRequest>,
) -> AppResult<(StatusCode, Json<GenerateRecipeResponse>)> {
    let stored = match &caller {
        Some(user) => UserPreferences::find(&state.db, user.id).await?,
        None => None,
    };
    let constraints = constraints_for(payload, stored.as_ref())?;
    let body = generate_and_store(&state, constraints, caller.map(|u| u.id)).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn rate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> AppResult<Json<RateResponse>> {
    let rating = validate_rating(payload.rating)?;
    if !repo::exists(&state.db, id).await? {
        return Err(AppError::not_found("Recipe not found"));
    }

    let (avg_rating, rating_count) = repo::upsert_rating(&state.db, id, auth.id, rating).await?;
    info!(recipe_id = %id, rating, "recipe rated");
    Ok(Json(RateResponse {
        message: "Rating saved successfully",
        avg_rating,
        rating_count,
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FavoriteResponse>> {
    if !repo::exists(&state.db, id).await? {
        return Err(AppError::not_found("Recipe not found"));
    }
    let favorited = repo::toggle_favorite(&state.db, auth.id, id).await?;
    Ok(Json(FavoriteResponse {
        message: "Favorite status updated",
        favorited,
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_favorites(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<RecipeList>> {
    let recipes = repo::list_favorites(&state.db, auth.id).await?;
    Ok(Json(RecipeList { recipes }))
}
