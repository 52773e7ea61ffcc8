use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{GenerateRecipeRequest, GenerateRecipeResponse, RecipeQuery},
    repo::{self, NewRecipe, RecipeFilter},
    repo_types::Difficulty,
};
use crate::{
    ai::generation::{generate_recipe, GeneratedRecipe, RecipeConstraints},
    auth::repo_types::UserPreferences,
    error::{AppError, AppResult},
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;
const DEFAULT_SERVINGS: i32 = 4;
const DEFAULT_COOKING_TIME: i32 = 60;
const DEFAULT_CUISINE: &str = "International";

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn filter_from_query(q: RecipeQuery) -> AppResult<RecipeFilter> {
    let difficulty = match non_blank(q.difficulty) {
        Some(raw) => Some(Difficulty::parse(&raw).ok_or_else(|| {
            AppError::bad_request("Invalid difficulty. Must be easy, medium, or hard")
        })?),
        None => None,
    };
    if q.max_time.map_or(false, |t| t < 0) {
        return Err(AppError::bad_request("max_time must not be negative"));
    }
    let offset = q.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }

    Ok(RecipeFilter {
        search: non_blank(q.search),
        cuisine: non_blank(q.cuisine),
        dietary_preference: non_blank(q.dietary_preference),
        max_time: q.max_time,
        difficulty,
        limit: q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset,
    })
}

pub(crate) fn validate_rating(rating: Option<f64>) -> AppResult<i16> {
    match rating {
        Some(r) if r.fract() == 0.0 && (1.0..=5.0).contains(&r) => Ok(r as i16),
        _ => Err(AppError::bad_request("Rating must be between 1 and 5")),
    }
}

fn joined(values: &[String]) -> Option<String> {
    (!values.is_empty()).then(|| values.join(", "))
}

/// Resolves request fields against defaults, falling back to the caller's
/// stored preferences for anything the request leaves out.
pub(crate) fn constraints_for(
    req: GenerateRecipeRequest,
    stored: Option<&UserPreferences>,
) -> AppResult<RecipeConstraints> {
    let ingredients: Vec<String> = req
        .ingredients
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    if ingredients.is_empty() {
        return Err(AppError::bad_request("At least one ingredient is required"));
    }

    let servings = req.servings.unwrap_or(DEFAULT_SERVINGS);
    let cooking_time = req.cooking_time.unwrap_or(DEFAULT_COOKING_TIME);
    if servings < 1 || cooking_time < 1 {
        return Err(AppError::bad_request(
            "servings and cooking_time must be positive",
        ));
    }

    let dietary_preferences = joined(&req.dietary_preferences)
        .or_else(|| stored.and_then(|p| joined(&p.dietary_preferences.0)));
    let allergies = joined(&req.allergies).or_else(|| stored.and_then(|p| joined(&p.allergies.0)));

    Ok(RecipeConstraints {
        ingredients,
        dietary_preferences,
        allergies,
        cuisine: non_blank(req.cuisine),
        meal_type: non_blank(req.meal_type),
        servings,
        cooking_time,
    })
}

pub(crate) fn new_recipe(
    generated: GeneratedRecipe,
    constraints: &RecipeConstraints,
    created_by: Option<Uuid>,
) -> NewRecipe {
    let ingredients = generated
        .ingredients
        .iter()
        .filter(|i| !i.name.trim().is_empty())
        .map(|i| (i.name.trim().to_string(), i.quantity_value(), i.unit_or_default()))
        .collect();
    let instructions = generated.numbered_steps();

    NewRecipe {
        title: generated.title.trim().to_string(),
        description: generated.description,
        cuisine: constraints
            .cuisine
            .clone()
            .unwrap_or_else(|| DEFAULT_CUISINE.to_string()),
        difficulty: Difficulty::parse_lenient(&generated.difficulty),
        prep_time: generated.prep_time,
        cook_time: generated.cook_time,
        servings: constraints.servings,
        dietary_tags: generated.dietary_tags,
        nutrition: generated.nutrition,
        created_by,
        ingredients,
        instructions,
    }
}

/// Generates a recipe and tries to keep it. A failed write is logged and the
/// recipe is still returned, flagged as unsaved.
#[instrument(skip(state, constraints))]
pub async fn generate_and_store(
    state: &AppState,
    constraints: RecipeConstraints,
    created_by: Option<Uuid>,
) -> AppResult<GenerateRecipeResponse> {
    let generated = generate_recipe(state.ai.as_ref(), &constraints).await?;
    let detail = new_recipe(generated, &constraints, created_by).materialize();

    let saved_to_db = match repo::insert_detail(&state.db, &detail).await {
        Ok(()) => {
            info!(recipe_id = %detail.summary.recipe.id, "recipe saved");
            true
        }
        Err(e) => {
            warn!(error = %e, "could not save generated recipe; returning it unsaved");
            false
        }
    };

    state.tips.publish(format!(
        "New recipe ready: {}",
        detail.summary.recipe.title
    ));

    Ok(GenerateRecipeResponse {
        recipe: detail,
        message: "Recipe generated successfully",
        saved_to_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::generation::parse_generated;
    use sqlx::types::Json;
    use time::OffsetDateTime;

    fn request(ingredients: &[&str]) -> GenerateRecipeRequest {
        GenerateRecipeRequest {
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn stored() -> UserPreferences {
        UserPreferences {
            user_id: Uuid::nil(),
            dietary_preferences: Json(vec!["vegan".into()]),
            allergies: Json(vec!["peanuts".into(), "soy".into()]),
            dietary_restrictions: Json(vec![]),
            nutritional_goals: Json(Default::default()),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn query_defaults_and_clamps() {
        let f = filter_from_query(RecipeQuery::default()).unwrap();
        assert_eq!((f.limit, f.offset), (20, 0));

        let f = filter_from_query(RecipeQuery {
            limit: Some(1000),
            search: Some("   ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(f.limit, 100);
        assert!(f.search.is_none());
    }

    #[test]
    fn query_rejects_bad_values() {
        let bad_difficulty = RecipeQuery {
            difficulty: Some("extreme".into()),
            ..Default::default()
        };
        assert!(matches!(
            filter_from_query(bad_difficulty),
            Err(AppError::BadRequest(_))
        ));
        let bad_offset = RecipeQuery {
            offset: Some(-1),
            ..Default::default()
        };
        assert!(filter_from_query(bad_offset).is_err());
    }

    #[test]
    fn ratings_must_be_whole_one_to_five() {
        assert_eq!(validate_rating(Some(3.0)).unwrap(), 3);
        assert!(validate_rating(Some(6.0)).is_err());
        assert!(validate_rating(Some(0.0)).is_err());
        assert!(validate_rating(Some(2.5)).is_err());
        assert!(validate_rating(None).is_err());
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert!(constraints_for(request(&[]), None).is_err());
        assert!(constraints_for(request(&["  "]), None).is_err());
    }

    #[test]
    fn stored_preferences_fill_gaps_only() {
        let prefs = stored();
        let c = constraints_for(request(&["rice"]), Some(&prefs)).unwrap();
        assert_eq!(c.dietary_preferences.as_deref(), Some("vegan"));
        assert_eq!(c.allergies.as_deref(), Some("peanuts, soy"));
        assert_eq!((c.servings, c.cooking_time), (4, 60));

        let mut req = request(&["rice"]);
        req.allergies = vec!["shellfish".into()];
        let c = constraints_for(req, Some(&prefs)).unwrap();
        assert_eq!(c.allergies.as_deref(), Some("shellfish"));
    }

    #[test]
    fn generated_recipe_maps_to_rows() {
        let generated = parse_generated(
            r#"{"title": " Fried Rice ", "difficulty": "Tricky",
                "ingredients": [{"name": "rice", "quantity": "1 1/2", "unit": "cups"},
                                {"name": "egg", "quantity": 2}, {"name": " "}],
                "instructions": ["Cook rice", "Fry"]}"#,
        )
        .unwrap();
        let c = constraints_for(request(&["rice"]), None).unwrap();
        let recipe = new_recipe(generated, &c, None);

        assert_eq!(recipe.title, "Fried Rice");
        assert_eq!(recipe.cuisine, "International");
        assert_eq!(recipe.difficulty, Difficulty::Medium);
        assert_eq!(
            recipe.ingredients,
            vec![
                ("rice".to_string(), 1.5, "cups".to_string()),
                ("egg".to_string(), 2.0, "piece".to_string())
            ]
        );
        assert_eq!(recipe.instructions[1], (2, "Fry".to_string()));
    }
}
