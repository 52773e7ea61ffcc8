use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    Difficulty, NutritionInfo, Recipe, RecipeDetail, RecipeIngredient, RecipeInstruction,
    RecipeSummary,
};

const SUMMARY_SELECT: &str = r#"
    SELECT r.id, r.title, r.description, r.cuisine, r.difficulty, r.prep_time, r.cook_time,
           r.servings, r.dietary_tags, r.nutrition_info, r.created_by, r.created_at,
           COALESCE(ratings.avg_rating, 0)::float8 AS avg_rating,
           COALESCE(ratings.rating_count, 0) AS rating_count
    FROM recipes r
    LEFT JOIN (
        SELECT recipe_id, AVG(rating) AS avg_rating, COUNT(*) AS rating_count
        FROM recipe_ratings
        GROUP BY recipe_id
    ) ratings ON ratings.recipe_id = r.id
"#;

/// Conjunctive listing filters. `None` means "don't filter".
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub dietary_preference: Option<String>,
    pub max_time: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub limit: i64,
    pub offset: i64,
}

pub(crate) fn list_query(filter: &RecipeFilter) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(SUMMARY_SELECT);
    qb.push(" WHERE 1=1");

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (r.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(cuisine) = &filter.cuisine {
        qb.push(" AND r.cuisine = ").push_bind(cuisine);
    }
    if let Some(pref) = &filter.dietary_preference {
        qb.push(" AND r.dietary_tags @> ")
            .push_bind(Json(vec![pref.clone()]));
    }
    if let Some(max_time) = filter.max_time {
        qb.push(" AND r.prep_time::bigint + r.cook_time <= ").push_bind(max_time);
    }
    if let Some(difficulty) = filter.difficulty {
        qb.push(" AND r.difficulty = ").push_bind(difficulty.as_str());
    }

    qb.push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
    qb
}

pub async fn list(db: &PgPool, filter: &RecipeFilter) -> anyhow::Result<Vec<RecipeSummary>> {
    let rows = list_query(filter)
        .build_query_as::<RecipeSummary>()
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<RecipeSummary>> {
    let row = sqlx::query_as::<_, RecipeSummary>(&format!("{SUMMARY_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(found.is_some())
}

pub async fn find_detail(db: &PgPool, id: Uuid) -> anyhow::Result<Option<RecipeDetail>> {
    let Some(summary) = find(db, id).await? else {
        return Ok(None);
    };

    let ingredients = sqlx::query_as::<_, RecipeIngredient>(
        r#"
        SELECT id, recipe_id, ingredient_name, quantity, unit
        FROM recipe_ingredients
        WHERE recipe_id = $1
        ORDER BY ingredient_name
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    let instructions = sqlx::query_as::<_, RecipeInstruction>(
        r#"
        SELECT id, recipe_id, step_number, instruction
        FROM recipe_instructions
        WHERE recipe_id = $1
        ORDER BY step_number
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(Some(RecipeDetail {
        summary,
        ingredients,
        instructions,
    }))
}

/// Everything needed to write a freshly generated recipe.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub cuisine: String,
    pub difficulty: Difficulty,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub dietary_tags: Vec<String>,
    pub nutrition: NutritionInfo,
    pub created_by: Option<Uuid>,
    /// `(name, quantity, unit)`
    pub ingredients: Vec<(String, f64, String)>,
    /// `(step_number, instruction)`
    pub instructions: Vec<(i32, String)>,
}

impl NewRecipe {
    /// Assigns ids up front so the same value can be returned whether or not
    /// it reaches the database.
    pub fn materialize(self) -> RecipeDetail {
        let id = Uuid::new_v4();
        let ingredients = self
            .ingredients
            .into_iter()
            .map(|(ingredient_name, quantity, unit)| RecipeIngredient {
                id: Uuid::new_v4(),
                recipe_id: id,
                ingredient_name,
                quantity,
                unit,
            })
            .collect();
        let instructions = self
            .instructions
            .into_iter()
            .map(|(step_number, instruction)| RecipeInstruction {
                id: Uuid::new_v4(),
                recipe_id: id,
                step_number,
                instruction,
            })
            .collect();

        RecipeDetail {
            summary: RecipeSummary {
                recipe: Recipe {
                    id,
                    title: self.title,
                    description: Some(self.description),
                    cuisine: Some(self.cuisine),
                    difficulty: self.difficulty.as_str().to_string(),
                    prep_time: self.prep_time,
                    cook_time: self.cook_time,
                    servings: self.servings,
                    dietary_tags: Json(self.dietary_tags),
                    nutrition_info: Json(self.nutrition),
                    created_by: self.created_by,
                    created_at: OffsetDateTime::now_utc(),
                },
                avg_rating: 0.0,
                rating_count: 0,
            },
            ingredients,
            instructions,
        }
    }
}

/// Writes the recipe and all of its rows in one transaction.
pub async fn insert_detail(db: &PgPool, detail: &RecipeDetail) -> anyhow::Result<()> {
    let r = &detail.summary.recipe;
    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO recipes (id, title, description, cuisine, difficulty, prep_time, cook_time,
                             servings, dietary_tags, nutrition_info, created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(r.id)
    .bind(&r.title)
    .bind(&r.description)
    .bind(&r.cuisine)
    .bind(&r.difficulty)
    .bind(r.prep_time)
    .bind(r.cook_time)
    .bind(r.servings)
    .bind(&r.dietary_tags)
    .bind(&r.nutrition_info)
    .bind(r.created_by)
    .bind(r.created_at)
    .execute(&mut *tx)
    .await?;

    for ing in &detail.ingredients {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (id, recipe_id, ingredient_name, quantity, unit)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(ing.id)
        .bind(ing.recipe_id)
        .bind(&ing.ingredient_name)
        .bind(ing.quantity)
        .bind(&ing.unit)
        .execute(&mut *tx)
        .await?;
    }

    for step in &detail.instructions {
        sqlx::query(
            r#"
            INSERT INTO recipe_instructions (id, recipe_id, step_number, instruction)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(step.id)
        .bind(step.recipe_id)
        .bind(step.step_number)
        .bind(&step.instruction)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Inserts or replaces the caller's rating and returns `(average, count)`.
pub async fn upsert_rating(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    rating: i16,
) -> anyhow::Result<(f64, i64)> {
    sqlx::query(
        r#"
        INSERT INTO recipe_ratings (recipe_id, user_id, rating)
        VALUES ($1, $2, $3)
        ON CONFLICT (recipe_id, user_id) DO UPDATE SET rating = EXCLUDED.rating
        "#,
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(rating)
    .execute(db)
    .await?;

    let stats: (f64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(AVG(rating), 0)::float8, COUNT(*)
        FROM recipe_ratings
        WHERE recipe_id = $1
        "#,
    )
    .bind(recipe_id)
    .fetch_one(db)
    .await?;
    Ok(stats)
}

/// Flips the favorite flag and returns the new state.
pub async fn toggle_favorite(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool> {
    let removed = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO user_favorites (user_id, recipe_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(db)
    .await?;
    Ok(true)
}

pub async fn list_favorites(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<RecipeSummary>> {
    let rows = sqlx::query_as::<_, RecipeSummary>(&format!(
        r#"{SUMMARY_SELECT}
        JOIN user_favorites f ON f.recipe_id = r.id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC"#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RecipeFilter {
        RecipeFilter {
            limit: 20,
            ..Default::default()
        }
    }

    #[test]
    fn unfiltered_listing_only_pages() {
        let f = filter();
        let qb = list_query(&f);
        let sql = qb.sql();
        assert!(sql.contains("WHERE 1=1 ORDER BY r.created_at DESC LIMIT $1 OFFSET $2"));
        assert!(!sql.contains("ILIKE"));
    }

    #[test]
    fn filters_are_conjunctive_and_bound() {
        let f = RecipeFilter {
            search: Some("soup".into()),
            cuisine: Some("Thai".into()),
            dietary_preference: Some("vegan".into()),
            max_time: Some(30),
            difficulty: Some(Difficulty::Easy),
            ..filter()
        };
        let qb = list_query(&f);
        let sql = qb.sql();
        assert!(sql.contains("AND (r.title ILIKE $1 OR r.description ILIKE $2)"));
        assert!(sql.contains("AND r.cuisine = $3"));
        assert!(sql.contains("AND r.dietary_tags @> $4"));
        assert!(sql.contains("AND r.prep_time::bigint + r.cook_time <= $5"));
        assert!(sql.contains("AND r.difficulty = $6"));
        assert!(sql.contains("LIMIT $7 OFFSET $8"));
        assert!(!sql.contains("soup"));
    }

    #[test]
    fn materialized_rows_share_the_recipe_id() {
        let detail = NewRecipe {
            title: "Pancakes".into(),
            description: "Fluffy".into(),
            cuisine: "American".into(),
            difficulty: Difficulty::Easy,
            prep_time: 10,
            cook_time: 15,
            servings: 4,
            dietary_tags: vec!["vegetarian".into()],
            nutrition: NutritionInfo::default(),
            created_by: None,
            ingredients: vec![("flour".into(), 1.5, "cup".into())],
            instructions: vec![(1, "Mix".into()), (2, "Fry".into())],
        }
        .materialize();

        let id = detail.summary.recipe.id;
        assert!(detail.ingredients.iter().all(|i| i.recipe_id == id));
        assert!(detail.instructions.iter().all(|s| s.recipe_id == id));
        assert_eq!(detail.summary.recipe.difficulty, "easy");
        assert_eq!(detail.summary.rating_count, 0);
    }

    fn timed(title: &str, prep_time: i32, cook_time: i32) -> RecipeDetail {
        NewRecipe {
            title: title.into(),
            description: "Test".into(),
            cuisine: "Test".into(),
            difficulty: Difficulty::Easy,
            prep_time,
            cook_time,
            servings: 2,
            dietary_tags: Vec::new(),
            nutrition: NutritionInfo::default(),
            created_by: None,
            ingredients: vec![("salt".into(), 1.0, "pinch".into())],
            instructions: vec![(1, "Serve".into())],
        }
        .materialize()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn max_time_keeps_only_recipes_within_the_bound(pool: PgPool) {
        for detail in [
            timed("Quick Toast", 5, 20),
            timed("Exact Stew", 10, 20),
            timed("Slow Roast", 15, 30),
            timed("Forever Broth", i32::MAX, i32::MAX),
        ] {
            insert_detail(&pool, &detail).await.unwrap();
        }

        let f = RecipeFilter {
            max_time: Some(30),
            ..filter()
        };
        let found = list(&pool, &f).await.unwrap();
        let titles: Vec<&str> = found.iter().map(|r| r.recipe.title.as_str()).collect();

        assert!(titles.contains(&"Quick Toast"));
        assert!(titles.contains(&"Exact Stew"));
        assert!(!titles.contains(&"Slow Roast"));
        assert!(!titles.contains(&"Forever Broth"));
        assert!(found
            .iter()
            .all(|r| r.recipe.prep_time as i64 + r.recipe.cook_time as i64 <= 30));
    }
}
