use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{MealPlan, MealPlanEntry};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Body of both create and update; create requires the first three fields.
#[derive(Debug, Default, Deserialize)]
pub struct MealPlanRequest {
    pub recipe_id: Option<Uuid>,
    pub meal_date: Option<String>,
    pub meal_type: Option<String>,
    pub servings: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePlanRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MealPlanList {
    #[serde(rename = "mealPlans")]
    pub meal_plans: Vec<MealPlanEntry>,
}

#[derive(Debug, Serialize)]
pub struct MealPlanResponse {
    #[serde(rename = "mealPlan")]
    pub meal_plan: MealPlan,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GeneratedPlanResponse {
    pub message: &'static str,
    #[serde(rename = "mealPlans")]
    pub meal_plans: Vec<MealPlan>,
    pub count: usize,
}
