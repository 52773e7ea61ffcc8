use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        CheckItemRequest, GeneratedList, InventoryList, InventoryRequest, InventoryResponse,
        ItemResponse, RangeQuery, SaveListRequest, SaveListResponse, SavedList, SavedListResponse,
        SavedOrEmpty,
    },
    repo,
    services::{net_against_inventory, validate_items},
};
use crate::{
    auth::AuthUser,
    dates::range_or_current_week,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    state::AppState,
};

pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/shopping-list", get(latest_list).post(save_list))
        .route("/shopping-list/generate", get(generate_list))
        .route("/shopping-list/items/:id", put(check_item))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new().route("/inventory", get(list_inventory).put(set_inventory))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn generate_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(range): Query<RangeQuery>,
) -> AppResult<Json<GeneratedList>> {
    let (start, end) = range_or_current_week(range.start_date.as_deref(), range.end_date.as_deref())?;
    let required = repo::required_ingredients(&state.db, auth.id, start, end).await?;
    let inventory = repo::inventory(&state.db, auth.id).await?;

    let shopping_list = net_against_inventory(required, &inventory);
    info!(items = shopping_list.len(), %start, %end, "shopping list generated");
    Ok(Json(GeneratedList { shopping_list }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn latest_list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<SavedListResponse>> {
    let shopping_list = match repo::latest_list(&state.db, auth.id).await? {
        Some((list, items)) => SavedOrEmpty::Saved(SavedList { list, items }),
        None => SavedOrEmpty::Empty(Vec::new()),
    };
    Ok(Json(SavedListResponse { shopping_list }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn save_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SaveListRequest>,
) -> AppResult<(StatusCode, Json<SaveListResponse>)> {
    let items = validate_items(payload.items)?;
    let id = repo::save_list(&state.db, auth.id, &items).await?;
    info!(list_id = %id, items = items.len(), "shopping list saved");
    Ok((
        StatusCode::CREATED,
        Json(SaveListResponse {
            message: "Shopping list saved successfully",
            id,
        }),
    ))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn check_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CheckItemRequest>,
) -> AppResult<Json<ItemResponse>> {
    let item = repo::set_item_checked(&state.db, auth.id, id, payload.checked)
        .await?
        .ok_or_else(|| AppError::not_found("Shopping list item not found"))?;
    Ok(Json(ItemResponse { item }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_inventory(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<InventoryList>> {
    let inventory = repo::inventory(&state.db, auth.id).await?;
    Ok(Json(InventoryList { inventory }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn set_inventory(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<InventoryRequest>,
) -> AppResult<Json<InventoryResponse>> {
    let name = payload.ingredient_name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("ingredient_name is required"));
    }
    let quantity = payload
        .quantity
        .ok_or_else(|| AppError::bad_request("quantity is required"))?;
    if quantity < 0.0 {
        return Err(AppError::bad_request("quantity must not be negative"));
    }

    if quantity == 0.0 {
        repo::remove_inventory(&state.db, auth.id, name).await?;
        return Ok(Json(InventoryResponse {
            message: "Inventory item removed",
            item: None,
        }));
    }

    let unit = payload.unit.as_deref().unwrap_or("").trim();
    let item = repo::upsert_inventory(&state.db, auth.id, name, quantity, unit).await?;
    Ok(Json(InventoryResponse {
        message: "Inventory updated",
        item: Some(item),
    }))
}
