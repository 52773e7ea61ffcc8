use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{delimited_span, AiClient, AiError, ChatMessage, ChatRequest, ModelTier};
use crate::recipes::repo_types::NutritionInfo;

const SYSTEM_PROMPT: &str = "You are a professional chef and nutritionist. \
Generate detailed, accurate recipes. Always return valid JSON only.";

/// Constraints for one generated recipe, already resolved against defaults.
#[derive(Debug, Clone)]
pub struct RecipeConstraints {
    pub ingredients: Vec<String>,
    pub dietary_preferences: Option<String>,
    pub allergies: Option<String>,
    pub cuisine: Option<String>,
    pub meal_type: Option<String>,
    pub servings: i32,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedIngredient {
    #[serde(alias = "ingredient_name")]
    pub name: String,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub unit: Option<String>,
}

impl GeneratedIngredient {
    pub fn quantity_value(&self) -> f64 {
        match &self.quantity {
            Value::Number(n) => n.as_f64().filter(|v| *v > 0.0).unwrap_or(1.0),
            Value::String(s) => parse_quantity(s),
            _ => 1.0,
        }
    }

    pub fn unit_or_default(&self) -> String {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or("piece")
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeneratedStep {
    Detailed {
        #[serde(default)]
        step: Option<i32>,
        #[serde(alias = "text")]
        instruction: String,
    },
    Plain(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedRecipe {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<GeneratedIngredient>,
    #[serde(default)]
    pub instructions: Vec<GeneratedStep>,
    #[serde(default)]
    pub nutrition: NutritionInfo,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub prep_time: i32,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub cook_time: i32,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
}

impl GeneratedRecipe {
    /// Instructions as `(step_number, text)`, numbering by position when the
    /// model left numbers out.
    pub fn numbered_steps(&self) -> Vec<(i32, String)> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, s)| match s {
                GeneratedStep::Detailed { step, instruction } => {
                    (step.unwrap_or(i as i32 + 1), instruction.clone())
                }
                GeneratedStep::Plain(text) => (i as i32 + 1, text.clone()),
            })
            .collect()
    }
}

/// Upper bound for a single prep or cook time: one week.
pub const MAX_MINUTES: i32 = 7 * 24 * 60;

fn lenient_minutes<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let minutes: i64 = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().map(|v| v.round() as i64).unwrap_or(0),
        Value::String(s) => s
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .take(12)
            .collect::<String>()
            .parse()
            .unwrap_or(0),
        _ => 0,
    };
    Ok(minutes.clamp(0, MAX_MINUTES as i64) as i32)
}

pub fn build_prompt(c: &RecipeConstraints) -> String {
    format!(
        r#"Generate a detailed recipe with the following requirements:
- Ingredients available: {ingredients}
- Dietary preferences: {dietary}
- Cuisine type: {cuisine}
- Meal type: {meal_type}
- Servings: {servings}
- Maximum cooking time: {time} minutes
- Allergies to avoid: {allergies}

IMPORTANT: You must return ONLY valid JSON. Do not include any text before or after the JSON object.

Format as JSON with this structure:
{{
  "title": "...",
  "description": "...",
  "ingredients": [{{"name": "...", "quantity": "...", "unit": "..."}}],
  "instructions": [{{"step": 1, "instruction": "..."}}],
  "nutrition": {{"calories": 0, "protein": 0, "carbs": 0, "fat": 0}},
  "difficulty": "easy | medium | hard",
  "prep_time": 0,
  "cook_time": 0,
  "dietary_tags": ["..."]
}}"#,
        ingredients = c.ingredients.join(", "),
        dietary = c.dietary_preferences.as_deref().unwrap_or("none"),
        cuisine = c.cuisine.as_deref().unwrap_or("any"),
        meal_type = c.meal_type.as_deref().unwrap_or("dinner"),
        servings = c.servings,
        time = c.cooking_time,
        allergies = c.allergies.as_deref().unwrap_or("none"),
    )
}

fn chat(tier: ModelTier, prompt: &str) -> ChatRequest {
    let mut request = ChatRequest::new(
        tier,
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
    );
    request.temperature = Some(0.7);
    request.json_mode = true;
    request
}

/// Asks the primary model for a recipe, retrying once on the fallback model
/// when the primary one is unavailable. Any other failure, including an
/// unparseable answer, is final.
#[instrument(skip(ai, constraints), fields(ingredients = constraints.ingredients.len()))]
pub async fn generate_recipe(
    ai: &dyn AiClient,
    constraints: &RecipeConstraints,
) -> Result<GeneratedRecipe, AiError> {
    let prompt = build_prompt(constraints);

    let text = match ai.complete(chat(ModelTier::Primary, &prompt)).await {
        Ok(text) => text,
        Err(AiError::ModelUnavailable(model)) => {
            warn!(%model, fallback = %ai.model_name(ModelTier::Fallback), "primary model unavailable, falling back");
            ai.complete(chat(ModelTier::Fallback, &prompt)).await?
        }
        Err(e) => return Err(e),
    };

    let recipe = parse_generated(&text)?;
    info!(title = %recipe.title, "recipe generated");
    Ok(recipe)
}

pub fn parse_generated(text: &str) -> Result<GeneratedRecipe, AiError> {
    let json = delimited_span(text, '{', '}').unwrap_or(text);
    let recipe: GeneratedRecipe =
        serde_json::from_str(json).map_err(|e| AiError::Parse(e.to_string()))?;
    if recipe.title.trim().is_empty() {
        return Err(AiError::Parse("recipe has no title".into()));
    }
    Ok(recipe)
}

/// Reads a free-text quantity such as `"2"`, `"1 1/2"`, `"½ cup"` or
/// `"2-3"` (lower bound). Anything unreadable counts as one unit.
pub fn parse_quantity(raw: &str) -> f64 {
    let mut text = raw.trim().to_lowercase();
    for (glyph, ascii) in [
        ("½", " 1/2"),
        ("¼", " 1/4"),
        ("¾", " 3/4"),
        ("⅓", " 1/3"),
        ("⅔", " 2/3"),
    ] {
        text = text.replace(glyph, ascii);
    }

    let lower_bound = text
        .split(|c| c == '-' || c == '–')
        .next()
        .and_then(|s| s.split(" to ").next())
        .unwrap_or("");

    let mut total = 0.0;
    let mut parts = 0;
    for token in lower_bound.split_whitespace() {
        let numeric: String = token
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '/')
            .collect();
        if parts == 1 && !numeric.contains('/') {
            break;
        }
        let Some(value) = parse_number(&numeric) else {
            break;
        };
        total += value;
        parts += 1;
        if parts == 2 || numeric.len() < token.len() {
            break;
        }
    }

    if total > 0.0 && total.is_finite() {
        total
    } else {
        1.0
    }
}

fn parse_number(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedAi {
        calls: Mutex<Vec<ModelTier>>,
        primary: fn() -> Result<String, AiError>,
        fallback: fn() -> Result<String, AiError>,
    }

    #[async_trait]
    impl AiClient for ScriptedAi {
        async fn complete(&self, request: ChatRequest) -> Result<String, AiError> {
            self.calls.lock().unwrap().push(request.tier);
            match request.tier {
                ModelTier::Fallback => (self.fallback)(),
                _ => (self.primary)(),
            }
        }

        fn model_name(&self, tier: ModelTier) -> String {
            format!("{:?}", tier)
        }
    }

    const VALID: &str = r#"{"title": "Tomato Soup", "description": "Warm", "ingredients": [{"name": "tomato", "quantity": "4", "unit": "pieces"}], "instructions": [{"step": 1, "instruction": "Chop"}, "Simmer"], "nutrition": {"calories": 120, "protein": 3, "carbs": 20, "fat": 2}, "difficulty": "easy", "prep_time": "10 minutes", "cook_time": 25, "dietary_tags": ["vegan"]}"#;

    fn constraints() -> RecipeConstraints {
        RecipeConstraints {
            ingredients: vec!["tomato".into(), "basil".into()],
            dietary_preferences: None,
            allergies: Some("peanuts".into()),
            cuisine: Some("Italian".into()),
            meal_type: None,
            servings: 2,
            cooking_time: 30,
        }
    }

    #[test]
    fn prompt_mentions_every_constraint() {
        let prompt = build_prompt(&constraints());
        assert!(prompt.contains("Ingredients available: tomato, basil"));
        assert!(prompt.contains("Cuisine type: Italian"));
        assert!(prompt.contains("Meal type: dinner"));
        assert!(prompt.contains("Servings: 2"));
        assert!(prompt.contains("Maximum cooking time: 30 minutes"));
        assert!(prompt.contains("Allergies to avoid: peanuts"));
    }

    #[test]
    fn parses_recipe_wrapped_in_prose() {
        let recipe = parse_generated(&format!("Here it is:\n{}\nEnjoy!", VALID)).unwrap();
        assert_eq!(recipe.title, "Tomato Soup");
        assert_eq!(recipe.prep_time, 10);
        assert_eq!(recipe.cook_time, 25);
        assert_eq!(recipe.nutrition.calories, 120.0);
        assert_eq!(
            recipe.numbered_steps(),
            vec![(1, "Chop".to_string()), (2, "Simmer".to_string())]
        );
        assert_eq!(recipe.ingredients[0].quantity_value(), 4.0);
    }

    #[test]
    fn unparseable_text_is_a_parse_error() {
        assert!(matches!(
            parse_generated("I cannot help with that"),
            Err(AiError::Parse(_))
        ));
        assert!(matches!(
            parse_generated("{\"description\": \"no title\"}"),
            Err(AiError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn falls_back_once_when_primary_model_is_unavailable() {
        let ai = ScriptedAi {
            calls: Mutex::new(Vec::new()),
            primary: || Err(AiError::ModelUnavailable("gpt-4".into())),
            fallback: || Ok(VALID.to_string()),
        };
        let recipe = generate_recipe(&ai, &constraints()).await.unwrap();
        assert_eq!(recipe.title, "Tomato Soup");
        assert_eq!(
            *ai.calls.lock().unwrap(),
            vec![ModelTier::Primary, ModelTier::Fallback]
        );
    }

    #[tokio::test]
    async fn other_failures_do_not_fall_back() {
        let ai = ScriptedAi {
            calls: Mutex::new(Vec::new()),
            primary: || Err(AiError::RateLimited),
            fallback: || Ok(VALID.to_string()),
        };
        let err = generate_recipe(&ai, &constraints()).await.unwrap_err();
        assert!(matches!(err, AiError::RateLimited));
        assert_eq!(*ai.calls.lock().unwrap(), vec![ModelTier::Primary]);
    }

    #[tokio::test]
    async fn parse_failure_is_final() {
        let ai = ScriptedAi {
            calls: Mutex::new(Vec::new()),
            primary: || Ok("{ not json".to_string()),
            fallback: || Ok(VALID.to_string()),
        };
        let err = generate_recipe(&ai, &constraints()).await.unwrap_err();
        assert!(matches!(err, AiError::Parse(_)));
        assert_eq!(ai.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn absurd_times_are_capped() {
        let recipe = parse_generated(
            r#"{"title": "Slow Stew", "prep_time": 2000000000, "cook_time": "99999999999999999999 minutes"}"#,
        )
        .unwrap();
        assert_eq!(recipe.prep_time, MAX_MINUTES);
        assert_eq!(recipe.cook_time, MAX_MINUTES);

        let negative = parse_generated(r#"{"title": "Odd", "prep_time": -5}"#).unwrap();
        assert_eq!(negative.prep_time, 0);
    }

    #[test]
    fn quantities_are_read_leniently() {
        assert_eq!(parse_quantity("2"), 2.0);
        assert_eq!(parse_quantity("1/2"), 0.5);
        assert_eq!(parse_quantity("1 1/2 cups"), 1.5);
        assert_eq!(parse_quantity("½ cup"), 0.5);
        assert_eq!(parse_quantity("1½"), 1.5);
        assert_eq!(parse_quantity("2-3"), 2.0);
        assert_eq!(parse_quantity("200g"), 200.0);
        assert_eq!(parse_quantity("a pinch"), 1.0);
        assert_eq!(parse_quantity("0"), 1.0);
        assert_eq!(parse_quantity("1/0"), 1.0);
        assert_eq!(parse_quantity("2 3"), 2.0);
    }
}
