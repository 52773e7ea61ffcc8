use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::dto::AnalyzeIngredient;
use crate::{auth::repo_types::NutritionGoals, config::NutritionApiConfig, recipes::repo_types::NutritionInfo};

pub const NUTRITION_API_URL: &str = "https://api.edamam.com/api/nutrition-data";

const DEFAULT_GOALS: NutritionInfo = NutritionInfo {
    calories: 2000.0,
    protein: 50.0,
    carbs: 300.0,
    fat: 65.0,
};

/// Per-ingredient guess used when no nutrition API answers.
const ESTIMATE_PER_INGREDIENT: NutritionInfo = NutritionInfo {
    calories: 50.0,
    protein: 5.0,
    carbs: 10.0,
    fat: 2.0,
};

pub(crate) fn goals_or_defaults(goals: Option<NutritionGoals>) -> NutritionInfo {
    let goals = goals.unwrap_or_default();
    let pick = |v: Option<f64>, d: f64| v.filter(|v| *v > 0.0).unwrap_or(d);
    NutritionInfo {
        calories: pick(goals.calories, DEFAULT_GOALS.calories),
        protein: pick(goals.protein, DEFAULT_GOALS.protein),
        carbs: pick(goals.carbs, DEFAULT_GOALS.carbs),
        fat: pick(goals.fat, DEFAULT_GOALS.fat),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedNutrition {
    #[serde(flatten)]
    pub macros: NutritionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sugar: Option<f64>,
}

pub(crate) fn estimate(count: usize) -> AnalyzedNutrition {
    AnalyzedNutrition {
        macros: ESTIMATE_PER_INGREDIENT.scaled(count as f64),
        fiber: None,
        sugar: None,
    }
}

/// `"1 cup rice, 2 egg"`, the free-text form the API expects.
pub(crate) fn ingredient_query(items: &[AnalyzeIngredient]) -> String {
    items
        .iter()
        .map(|i| {
            let quantity = i.quantity.map_or_else(|| "1".to_string(), |q| q.to_string());
            let unit = i.unit.as_deref().unwrap_or("").trim();
            if unit.is_empty() {
                format!("{} {}", quantity, i.name.trim())
            } else {
                format!("{} {} {}", quantity, unit, i.name.trim())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Deserialize)]
struct Nutrient {
    #[serde(default)]
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct NutritionApiResponse {
    #[serde(default)]
    calories: f64,
    #[serde(default, rename = "totalNutrients")]
    total_nutrients: HashMap<String, Nutrient>,
}

impl NutritionApiResponse {
    fn nutrient(&self, code: &str) -> Option<f64> {
        self.total_nutrients.get(code).map(|n| n.quantity)
    }
}

#[instrument(skip(http, api, query))]
pub(crate) async fn analyze_remote(
    http: &reqwest::Client,
    url: &str,
    api: &NutritionApiConfig,
    query: &str,
) -> anyhow::Result<AnalyzedNutrition> {
    let body: NutritionApiResponse = http
        .get(url)
        .query(&[
            ("app_id", api.app_id.as_str()),
            ("app_key", api.app_key.as_str()),
            ("ingr", query),
        ])
        .send()
        .await
        .context("nutrition api request")?
        .error_for_status()
        .context("nutrition api status")?
        .json()
        .await
        .context("nutrition api payload")?;
    debug!(calories = body.calories, "nutrition api answered");

    Ok(AnalyzedNutrition {
        macros: NutritionInfo {
            calories: body.calories,
            protein: body.nutrient("PROCNT").unwrap_or(0.0),
            carbs: body.nutrient("CHOCDF").unwrap_or(0.0),
            fat: body.nutrient("FAT").unwrap_or(0.0),
        },
        fiber: body.nutrient("FIBTG"),
        sugar: body.nutrient("SUGAR"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(name: &str, quantity: Option<f64>, unit: Option<&str>) -> AnalyzeIngredient {
        AnalyzeIngredient {
            name: name.into(),
            quantity,
            unit: unit.map(str::to_string),
        }
    }

    #[test]
    fn missing_goals_fall_back_per_field() {
        let goals = goals_or_defaults(Some(NutritionGoals {
            calories: Some(1800.0),
            protein: None,
            carbs: Some(0.0),
            fat: None,
        }));
        assert_eq!(goals.calories, 1800.0);
        assert_eq!(goals.protein, 50.0);
        assert_eq!(goals.carbs, 300.0);
        assert_eq!(goals_or_defaults(None), DEFAULT_GOALS);
    }

    #[test]
    fn estimates_scale_with_ingredient_count() {
        let e = estimate(3);
        assert_eq!(e.macros.calories, 150.0);
        assert_eq!(e.macros.fat, 6.0);
        assert!(e.fiber.is_none());
    }

    #[test]
    fn query_lists_quantity_unit_and_name() {
        let q = ingredient_query(&[item("rice", Some(1.5), Some("cup")), item("egg", None, None)]);
        assert_eq!(q, "1.5 cup rice, 1 egg");
    }

    #[tokio::test]
    async fn remote_totals_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("app_id", "id"))
            .and(query_param("ingr", "2 egg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "calories": 143,
                "totalNutrients": {
                    "PROCNT": {"label": "Protein", "quantity": 12.6, "unit": "g"},
                    "FAT": {"label": "Fat", "quantity": 9.5, "unit": "g"},
                    "SUGAR": {"label": "Sugars", "quantity": 0.4, "unit": "g"}
                }
            })))
            .mount(&server)
            .await;

        let api = NutritionApiConfig {
            app_id: "id".into(),
            app_key: "key".into(),
        };
        let got = analyze_remote(&reqwest::Client::new(), &server.uri(), &api, "2 egg")
            .await
            .unwrap();
        assert_eq!(got.macros.calories, 143.0);
        assert_eq!(got.macros.protein, 12.6);
        assert_eq!(got.macros.carbs, 0.0);
        assert_eq!(got.sugar, Some(0.4));
        assert_eq!(got.fiber, None);
    }

    #[tokio::test]
    async fn remote_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let api = NutritionApiConfig {
            app_id: "id".into(),
            app_key: "bad".into(),
        };
        assert!(analyze_remote(&reqwest::Client::new(), &server.uri(), &api, "1 egg")
            .await
            .is_err());
    }
}
