use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    repo_types::{InventoryItem, ShoppingList, ShoppingListItem},
    services::ShoppingNeed,
};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedList {
    #[serde(rename = "shoppingList")]
    pub shopping_list: Vec<ShoppingNeed>,
}

#[derive(Debug, Serialize)]
pub struct SavedList {
    #[serde(flatten)]
    pub list: ShoppingList,
    pub items: Vec<ShoppingListItem>,
}

/// The latest saved list, or an empty array when none was saved yet.
#[derive(Debug, Serialize)]
pub struct SavedListResponse {
    #[serde(rename = "shoppingList")]
    pub shopping_list: SavedOrEmpty,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SavedOrEmpty {
    Saved(SavedList),
    Empty(Vec<ShoppingListItem>),
}

#[derive(Debug, Deserialize)]
pub struct SaveItem {
    #[serde(default)]
    pub ingredient_name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveListRequest {
    pub items: Option<Vec<SaveItem>>,
}

#[derive(Debug, Serialize)]
pub struct SaveListResponse {
    pub message: &'static str,
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CheckItemRequest {
    pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item: ShoppingListItem,
}

#[derive(Debug, Serialize)]
pub struct InventoryList {
    pub inventory: Vec<InventoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryRequest {
    #[serde(default)]
    pub ingredient_name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<InventoryItem>,
}
