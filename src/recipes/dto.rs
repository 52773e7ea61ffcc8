use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::repo_types::{RecipeDetail, RecipeSummary};

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub dietary_preference: Option<String>,
    pub max_time: Option<i32>,
    pub difficulty: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecipeList {
    pub recipes: Vec<RecipeSummary>,
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub recipe: RecipeDetail,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRecipeRequest {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub dietary_preferences: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub allergies: Vec<String>,
    pub cuisine: Option<String>,
    pub meal_type: Option<String>,
    pub servings: Option<i32>,
    pub cooking_time: Option<i32>,
}

/// Clients send either `"vegan, keto"` or `["vegan", "keto"]`.
fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect(),
        _ => Vec::new(),
    }
    .into_iter()
    .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
    .collect())
}

#[derive(Debug, Serialize)]
pub struct GenerateRecipeResponse {
    pub recipe: RecipeDetail,
    pub message: &'static str,
    pub saved_to_db: bool,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub message: &'static str,
    pub avg_rating: f64,
    pub rating_count: i64,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub message: &'static str,
    pub favorited: bool,
}
