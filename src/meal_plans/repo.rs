use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::repo_types::{MealPlan, MealPlanEntry, MealType};

const PLAN_COLUMNS: &str = "id, user_id, recipe_id, meal_date, meal_type, servings, created_at";

/// Orders meal types by time of day rather than alphabetically.
const MEAL_ORDER: &str = "CASE mp.meal_type WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 \
                          WHEN 'dinner' THEN 2 ELSE 3 END";

pub async fn list_range(
    db: &PgPool,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> anyhow::Result<Vec<MealPlanEntry>> {
    let rows = sqlx::query_as::<_, MealPlanEntry>(&format!(
        r#"
        SELECT mp.id, mp.user_id, mp.recipe_id, mp.meal_date, mp.meal_type, mp.servings,
               mp.created_at, r.title, r.prep_time, r.cook_time
        FROM meal_plans mp
        JOIN recipes r ON r.id = mp.recipe_id
        WHERE mp.user_id = $1 AND mp.meal_date BETWEEN $2 AND $3
        ORDER BY mp.meal_date, {MEAL_ORDER}
        "#
    ))
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    recipe_id: Uuid,
    meal_date: Date,
    meal_type: MealType,
    servings: i32,
) -> anyhow::Result<MealPlan> {
    let plan = sqlx::query_as::<_, MealPlan>(&format!(
        r#"
        INSERT INTO meal_plans (user_id, recipe_id, meal_date, meal_type, servings)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PLAN_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(recipe_id)
    .bind(meal_date)
    .bind(meal_type.as_str())
    .bind(servings)
    .fetch_one(db)
    .await?;
    Ok(plan)
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct MealPlanPatch {
    pub recipe_id: Option<Uuid>,
    pub meal_date: Option<Date>,
    pub meal_type: Option<MealType>,
    pub servings: Option<i32>,
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    patch: MealPlanPatch,
) -> anyhow::Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(&format!(
        r#"
        UPDATE meal_plans SET
            recipe_id = COALESCE($3, recipe_id),
            meal_date = COALESCE($4, meal_date),
            meal_type = COALESCE($5, meal_type),
            servings = COALESCE($6, servings)
        WHERE id = $1 AND user_id = $2
        RETURNING {PLAN_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .bind(patch.recipe_id)
    .bind(patch.meal_date)
    .bind(patch.meal_type.map(MealType::as_str))
    .bind(patch.servings)
    .fetch_optional(db)
    .await?;
    Ok(plan)
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let deleted = sqlx::query("DELETE FROM meal_plans WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Candidate recipes for automatic planning.
pub async fn sample_recipe_ids(db: &PgPool, limit: i64) -> anyhow::Result<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes ORDER BY created_at DESC LIMIT $1")
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Inserts a whole generated plan atomically.
pub async fn insert_many(
    db: &PgPool,
    user_id: Uuid,
    slots: &[(Uuid, Date, MealType)],
    servings: i32,
) -> anyhow::Result<Vec<MealPlan>> {
    let mut tx = db.begin().await?;
    let mut plans = Vec::with_capacity(slots.len());
    for (recipe_id, meal_date, meal_type) in slots {
        let plan = sqlx::query_as::<_, MealPlan>(&format!(
            r#"
            INSERT INTO meal_plans (user_id, recipe_id, meal_date, meal_type, servings)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(recipe_id)
        .bind(meal_date)
        .bind(meal_type.as_str())
        .bind(servings)
        .fetch_one(&mut *tx)
        .await?;
        plans.push(plan);
    }
    tx.commit().await?;
    Ok(plans)
}
