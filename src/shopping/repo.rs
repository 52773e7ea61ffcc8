use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::repo_types::{InventoryItem, RequiredIngredient, ShoppingList, ShoppingListItem};

const INVENTORY_COLUMNS: &str = "id, user_id, ingredient_name, quantity, unit, updated_at";
const ITEM_COLUMNS: &str = "id, shopping_list_id, ingredient_name, quantity, unit, checked";

pub async fn required_ingredients(
    db: &PgPool,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> anyhow::Result<Vec<RequiredIngredient>> {
    let rows = sqlx::query_as::<_, RequiredIngredient>(
        r#"
        SELECT ri.ingredient_name, ri.unit,
               SUM(ri.quantity * mp.servings)::float8 AS total_quantity
        FROM meal_plans mp
        JOIN recipe_ingredients ri ON ri.recipe_id = mp.recipe_id
        WHERE mp.user_id = $1 AND mp.meal_date BETWEEN $2 AND $3
        GROUP BY ri.ingredient_name, ri.unit
        ORDER BY ri.ingredient_name
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn inventory(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<InventoryItem>> {
    let rows = sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM user_inventory WHERE user_id = $1 ORDER BY ingredient_name"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Sets the on-hand amount, matching names case-insensitively.
pub async fn upsert_inventory(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
    quantity: f64,
    unit: &str,
) -> anyhow::Result<InventoryItem> {
    let item = sqlx::query_as::<_, InventoryItem>(&format!(
        r#"
        INSERT INTO user_inventory (user_id, ingredient_name, quantity, unit)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, lower(ingredient_name)) DO UPDATE SET
            quantity = EXCLUDED.quantity,
            unit = EXCLUDED.unit,
            updated_at = NOW()
        RETURNING {INVENTORY_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(name)
    .bind(quantity)
    .bind(unit)
    .fetch_one(db)
    .await?;
    Ok(item)
}

pub async fn remove_inventory(db: &PgPool, user_id: Uuid, name: &str) -> anyhow::Result<bool> {
    let removed = sqlx::query(
        "DELETE FROM user_inventory WHERE user_id = $1 AND lower(ingredient_name) = lower($2)",
    )
    .bind(user_id)
    .bind(name)
    .execute(db)
    .await?
    .rows_affected();
    Ok(removed > 0)
}

pub async fn latest_list(
    db: &PgPool,
    user_id: Uuid,
) -> anyhow::Result<Option<(ShoppingList, Vec<ShoppingListItem>)>> {
    let Some(list) = sqlx::query_as::<_, ShoppingList>(
        r#"
        SELECT id, user_id, created_at
        FROM shopping_lists
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, ShoppingListItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM shopping_list_items WHERE shopping_list_id = $1 ORDER BY ingredient_name"
    ))
    .bind(list.id)
    .fetch_all(db)
    .await?;
    Ok(Some((list, items)))
}

/// Saves a list snapshot and its items in one transaction.
pub async fn save_list(
    db: &PgPool,
    user_id: Uuid,
    items: &[(String, f64, String)],
) -> anyhow::Result<Uuid> {
    let mut tx = db.begin().await?;
    let (list_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO shopping_lists (user_id) VALUES ($1) RETURNING id")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    for (name, quantity, unit) in items {
        sqlx::query(
            r#"
            INSERT INTO shopping_list_items (shopping_list_id, ingredient_name, quantity, unit, checked)
            VALUES ($1, $2, $3, $4, FALSE)
            "#,
        )
        .bind(list_id)
        .bind(name)
        .bind(quantity)
        .bind(unit)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(list_id)
}

/// Only items on one of the caller's own lists can be updated.
pub async fn set_item_checked(
    db: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    checked: bool,
) -> anyhow::Result<Option<ShoppingListItem>> {
    let item = sqlx::query_as::<_, ShoppingListItem>(&format!(
        r#"
        UPDATE shopping_list_items SET checked = $1
        WHERE id = $2
          AND shopping_list_id IN (SELECT id FROM shopping_lists WHERE user_id = $3)
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(checked)
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(item)
}
