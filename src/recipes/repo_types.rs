use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Per-serving macros stored in `recipes.nutrition_info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionInfo {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub fat: f64,
}

impl NutritionInfo {
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }

    pub fn add(&mut self, other: NutritionInfo) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fat += other.fat;
    }
}

/// Accepts `12`, `12.5`, `"12"` and `"12g"`; anything else is zero.
fn lenient_amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse().unwrap_or(0.0)
        }
        _ => 0.0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Model output is free text; unknown levels are stored as medium.
    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Difficulty::Medium)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cuisine: Option<String>,
    pub difficulty: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub dietary_tags: Json<Vec<String>>,
    pub nutrition_info: Json<NutritionInfo>,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A recipe row together with its aggregated ratings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub recipe: Recipe,
    pub avg_rating: f64,
    pub rating_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeInstruction {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub step_number: i32,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<RecipeInstruction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nutrition_reads_numbers_and_unit_strings() {
        let n: NutritionInfo =
            serde_json::from_str(r#"{"calories": "450 kcal", "protein": 22.5, "carbs": "60g"}"#)
                .unwrap();
        assert_eq!(n.calories, 450.0);
        assert_eq!(n.protein, 22.5);
        assert_eq!(n.carbs, 60.0);
        assert_eq!(n.fat, 0.0);
    }

    #[test]
    fn nutrition_scales_and_sums() {
        let base = NutritionInfo {
            calories: 100.0,
            protein: 10.0,
            carbs: 20.0,
            fat: 5.0,
        };
        let mut total = NutritionInfo::default();
        total.add(base.scaled(2.0));
        total.add(base);
        assert_eq!(total.calories, 300.0);
        assert_eq!(total.fat, 15.0);
    }

    #[test]
    fn difficulty_parsing() {
        assert_eq!(Difficulty::parse(" Hard "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("expert"), None);
        assert_eq!(Difficulty::parse_lenient("expert"), Difficulty::Medium);
    }

    #[test]
    fn summary_serializes_flat() {
        let summary = RecipeSummary {
            recipe: Recipe {
                id: Uuid::nil(),
                title: "Soup".into(),
                description: None,
                cuisine: Some("French".into()),
                difficulty: "easy".into(),
                prep_time: 5,
                cook_time: 20,
                servings: 2,
                dietary_tags: Json(vec!["vegan".into()]),
                nutrition_info: Json(NutritionInfo::default()),
                created_by: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            avg_rating: 4.5,
            rating_count: 2,
        };
        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(v["title"], "Soup");
        assert_eq!(v["dietary_tags"][0], "vegan");
        assert_eq!(v["avg_rating"], 4.5);
        assert_eq!(v["created_at"], "1970-01-01T00:00:00Z");
    }
}
