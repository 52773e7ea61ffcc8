use sqlx::PgPool;

pub const SUGGESTION_LIMIT: i64 = 10;

/// Distinct ingredient names already used by stored recipes.
pub async fn suggestions(db: &PgPool, fragment: &str) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT ingredient_name
        FROM recipe_ingredients
        WHERE ingredient_name ILIKE $1
        ORDER BY ingredient_name
        LIMIT $2
        "#,
    )
    .bind(format!("%{}%", fragment))
    .bind(SUGGESTION_LIMIT)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}
