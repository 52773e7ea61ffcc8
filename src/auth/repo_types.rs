use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                           // unique user ID
    pub email: String,                      // user email
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,      // Argon2 hash, absent for federated accounts
    pub name: String,                       // display name
    pub oauth_provider: Option<String>,     // "google" / "github" for federated accounts
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,         // creation timestamp
}

/// Daily targets. Missing fields fall back to the service defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionGoals {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub dietary_preferences: Json<Vec<String>>,
    pub allergies: Json<Vec<String>>,
    pub dietary_restrictions: Json<Vec<String>>,
    pub nutritional_goals: Json<NutritionGoals>,
    pub updated_at: OffsetDateTime,
}
