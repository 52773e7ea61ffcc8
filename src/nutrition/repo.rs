use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::Date;
use uuid::Uuid;

use crate::recipes::repo_types::NutritionInfo;

/// One planned meal with its macros already multiplied by servings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyMeal {
    pub meal_type: String,
    pub title: String,
    pub servings: i32,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl DailyMeal {
    pub fn nutrition(&self) -> NutritionInfo {
        NutritionInfo {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
        }
    }
}

#[derive(Debug, FromRow)]
struct Totals {
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

pub async fn range_totals(
    db: &PgPool,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> anyhow::Result<NutritionInfo> {
    // Missing keys in nutrition_info count as zero.
    let totals = sqlx::query_as::<_, Totals>(
        r#"
        SELECT
            COALESCE(SUM(COALESCE((r.nutrition_info->>'calories')::float8, 0) * mp.servings), 0)::float8 AS calories,
            COALESCE(SUM(COALESCE((r.nutrition_info->>'protein')::float8, 0) * mp.servings), 0)::float8 AS protein,
            COALESCE(SUM(COALESCE((r.nutrition_info->>'carbs')::float8, 0) * mp.servings), 0)::float8 AS carbs,
            COALESCE(SUM(COALESCE((r.nutrition_info->>'fat')::float8, 0) * mp.servings), 0)::float8 AS fat
        FROM meal_plans mp
        JOIN recipes r ON r.id = mp.recipe_id
        WHERE mp.user_id = $1 AND mp.meal_date BETWEEN $2 AND $3
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_one(db)
    .await?;

    Ok(NutritionInfo {
        calories: totals.calories,
        protein: totals.protein,
        carbs: totals.carbs,
        fat: totals.fat,
    })
}

pub async fn daily_meals(db: &PgPool, user_id: Uuid, day: Date) -> anyhow::Result<Vec<DailyMeal>> {
    let meals = sqlx::query_as::<_, DailyMeal>(
        r#"
        SELECT mp.meal_type, r.title, mp.servings,
               COALESCE((r.nutrition_info->>'calories')::float8, 0) * mp.servings AS calories,
               COALESCE((r.nutrition_info->>'protein')::float8, 0) * mp.servings AS protein,
               COALESCE((r.nutrition_info->>'carbs')::float8, 0) * mp.servings AS carbs,
               COALESCE((r.nutrition_info->>'fat')::float8, 0) * mp.servings AS fat
        FROM meal_plans mp
        JOIN recipes r ON r.id = mp.recipe_id
        WHERE mp.user_id = $1 AND mp.meal_date = $2
        ORDER BY CASE mp.meal_type
            WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 WHEN 'dinner' THEN 2 ELSE 3 END
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(meals)
}
