use serde::{Deserialize, Serialize};

use super::{repo::DailyMeal, services::AnalyzedNutrition};
use crate::recipes::repo_types::NutritionInfo;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: NutritionInfo,
    pub goals: NutritionInfo,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct DailyResponse {
    pub date: String,
    pub meals: Vec<DailyMeal>,
    #[serde(rename = "dailyTotal")]
    pub daily_total: NutritionInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeIngredient {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub ingredients: Option<Vec<AnalyzeIngredient>>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub nutrition: AnalyzedNutrition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}
