use std::collections::HashMap;

use serde::Serialize;

use super::{
    dto::SaveItem,
    repo_types::{InventoryItem, RequiredIngredient},
};
use crate::error::{AppError, AppResult};

/// An ingredient still to buy after inventory is taken into account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingNeed {
    pub ingredient_name: String,
    pub unit: String,
    pub total_quantity: f64,
    pub in_inventory: f64,
}

/// `needed = max(0, required - on_hand)`; only strictly positive needs are kept.
/// Inventory is matched on ingredient name, ignoring case.
pub fn net_against_inventory(
    required: Vec<RequiredIngredient>,
    inventory: &[InventoryItem],
) -> Vec<ShoppingNeed> {
    let on_hand: HashMap<String, f64> = inventory
        .iter()
        .map(|i| (i.ingredient_name.to_lowercase(), i.quantity))
        .collect();

    required
        .into_iter()
        .filter_map(|r| {
            let in_inventory = on_hand
                .get(&r.ingredient_name.to_lowercase())
                .copied()
                .unwrap_or(0.0);
            let needed = (r.total_quantity - in_inventory).max(0.0);
            (needed > 0.0).then(|| ShoppingNeed {
                ingredient_name: r.ingredient_name,
                unit: r.unit,
                total_quantity: needed,
                in_inventory,
            })
        })
        .collect()
}

pub(crate) fn validate_items(items: Option<Vec<SaveItem>>) -> AppResult<Vec<(String, f64, String)>> {
    let items = items.ok_or_else(|| AppError::bad_request("Items array is required"))?;
    items
        .into_iter()
        .map(|item| {
            let name = item.ingredient_name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::bad_request("Every item needs an ingredient_name"));
            }
            let quantity = item.quantity.unwrap_or(1.0);
            if quantity < 0.0 {
                return Err(AppError::bad_request("quantity must not be negative"));
            }
            let unit = item.unit.unwrap_or_default().trim().to_string();
            Ok((name, quantity, unit))
        })
        .collect()
}
