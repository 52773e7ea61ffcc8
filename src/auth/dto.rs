use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NutritionGoals, User, UserPreferences};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub dietary_preferences: Vec<String>,
    pub allergies: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub nutritional_goals: NutritionGoals,
}

impl UserProfile {
    pub fn new(user: User, prefs: Option<UserPreferences>) -> Self {
        let (dietary_preferences, allergies, dietary_restrictions, nutritional_goals) = match prefs
        {
            Some(p) => (
                p.dietary_preferences.0,
                p.allergies.0,
                p.dietary_restrictions.0,
                p.nutritional_goals.0,
            ),
            None => Default::default(),
        };
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
            dietary_preferences,
            allergies,
            dietary_restrictions,
            nutritional_goals,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub dietary_preferences: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub dietary_restrictions: Option<Vec<String>>,
    pub nutritional_goals: Option<NutritionGoals>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
