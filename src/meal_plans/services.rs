use rand::{seq::SliceRandom, Rng};
use time::{Date, Duration};
use uuid::Uuid;

use super::{dto::MealPlanRequest, repo::MealPlanPatch, repo_types::MealType};
use crate::{
    dates::{optional_date, parse_date},
    error::{AppError, AppResult},
};

pub const DEFAULT_SERVINGS: i32 = 4;
/// Longest range the automatic planner fills in one call.
pub const MAX_PLAN_DAYS: i64 = 31;
pub const CANDIDATE_RECIPES: i64 = 10;

fn meal_type(raw: &str) -> AppResult<MealType> {
    MealType::parse(raw).ok_or_else(|| {
        AppError::bad_request("meal_type must be one of breakfast, lunch, dinner, snack")
    })
}

fn servings(raw: Option<i32>) -> AppResult<Option<i32>> {
    match raw {
        Some(s) if s < 1 => Err(AppError::bad_request("servings must be at least 1")),
        other => Ok(other),
    }
}

/// A fully specified new plan.
#[derive(Debug, PartialEq)]
pub struct NewPlan {
    pub recipe_id: Uuid,
    pub meal_date: Date,
    pub meal_type: MealType,
    pub servings: i32,
}

pub(crate) fn new_plan(req: MealPlanRequest) -> AppResult<NewPlan> {
    let (Some(recipe_id), Some(date), Some(kind)) = (req.recipe_id, req.meal_date, req.meal_type)
    else {
        return Err(AppError::bad_request(
            "Recipe ID, meal date, and meal type are required",
        ));
    };
    Ok(NewPlan {
        recipe_id,
        meal_date: parse_date("meal_date", &date)?,
        meal_type: meal_type(&kind)?,
        servings: servings(req.servings)?.unwrap_or(DEFAULT_SERVINGS),
    })
}

pub(crate) fn plan_patch(req: MealPlanRequest) -> AppResult<MealPlanPatch> {
    Ok(MealPlanPatch {
        recipe_id: req.recipe_id,
        meal_date: optional_date("meal_date", req.meal_date.as_deref())?,
        meal_type: req.meal_type.as_deref().map(meal_type).transpose()?,
        servings: servings(req.servings)?,
    })
}

pub(crate) fn generation_range(start: Option<&str>, end: Option<&str>) -> AppResult<(Date, Date)> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AppError::bad_request("start_date and end_date are required"));
    };
    let start = parse_date("start_date", start)?;
    let end = parse_date("end_date", end)?;
    if end < start {
        return Err(AppError::bad_request("end_date must not be before start_date"));
    }
    if (end - start).whole_days() >= MAX_PLAN_DAYS {
        return Err(AppError::bad_request(format!(
            "A generated plan can cover at most {} days",
            MAX_PLAN_DAYS
        )));
    }
    Ok((start, end))
}

/// One random recipe for each daily slot of every day in `start..=end`.
pub(crate) fn fill_slots<R: Rng + ?Sized>(
    start: Date,
    end: Date,
    recipes: &[Uuid],
    rng: &mut R,
) -> Vec<(Uuid, Date, MealType)> {
    let mut slots = Vec::new();
    if recipes.is_empty() {
        return slots;
    }
    let mut day = start;
    while day <= end {
        for kind in MealType::DAILY {
            if let Some(recipe) = recipes.choose(rng) {
                slots.push((*recipe, day, kind));
            }
        }
        day += Duration::days(1);
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use time::macros::date;

    #[test]
    fn create_requires_core_fields() {
        let err = new_plan(MealPlanRequest {
            recipe_id: Some(Uuid::nil()),
            meal_date: Some("2024-05-01".into()),
            ..Default::default()
        });
        assert!(matches!(err, Err(AppError::BadRequest(_))));

        let plan = new_plan(MealPlanRequest {
            recipe_id: Some(Uuid::nil()),
            meal_date: Some("2024-05-01".into()),
            meal_type: Some("Dinner".into()),
            servings: None,
        })
        .unwrap();
        assert_eq!(plan.meal_type, MealType::Dinner);
        assert_eq!(plan.servings, 4);
    }

    #[test]
    fn invalid_meal_type_and_servings_are_rejected() {
        let bad_type = MealPlanRequest {
            meal_type: Some("brunch".into()),
            ..Default::default()
        };
        assert!(plan_patch(bad_type).is_err());
        let bad_servings = MealPlanRequest {
            servings: Some(0),
            ..Default::default()
        };
        assert!(plan_patch(bad_servings).is_err());
    }

    #[test]
    fn generation_range_is_bounded() {
        assert!(generation_range(Some("2024-01-10"), Some("2024-01-01")).is_err());
        assert!(generation_range(Some("2024-01-01"), Some("2024-03-01")).is_err());
        assert!(generation_range(None, Some("2024-01-01")).is_err());
        assert!(generation_range(Some("2024-01-01"), Some("2024-01-31")).is_ok());
    }

    #[test]
    fn slots_cover_three_meals_per_day() {
        let recipes = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut rng = StdRng::seed_from_u64(7);
        let slots = fill_slots(date!(2024 - 01 - 01), date!(2024 - 01 - 03), &recipes, &mut rng);
        assert_eq!(slots.len(), 9);
        assert_eq!(slots[0].1, date!(2024 - 01 - 01));
        assert_eq!(slots[0].2, MealType::Breakfast);
        assert_eq!(slots[8].1, date!(2024 - 01 - 03));
        assert!(slots.iter().all(|(r, _, _)| recipes.contains(r)));
    }

    #[test]
    fn no_recipes_means_no_slots() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(fill_slots(date!(2024 - 01 - 01), date!(2024 - 01 - 07), &[], &mut rng).is_empty());
    }
}
