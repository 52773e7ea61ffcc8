use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::auth::repo_types::{NutritionGoals, User, UserPreferences};

const USER_COLUMNS: &str = "id, email, password_hash, name, oauth_provider, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Returns the account owning `email`, creating a password-less one for
    /// `provider` if none exists yet.
    pub async fn find_or_create_federated(
        db: &PgPool,
        email: &str,
        name: &str,
        provider: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, oauth_provider)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(name)
        .bind(provider)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

/// Partial preferences update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct PreferencesPatch {
    pub dietary_preferences: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub dietary_restrictions: Option<Vec<String>>,
    pub nutritional_goals: Option<NutritionGoals>,
}

impl UserPreferences {
    pub async fn find(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<UserPreferences>> {
        let prefs = sqlx::query_as::<_, UserPreferences>(
            r#"
            SELECT user_id, dietary_preferences, allergies, dietary_restrictions,
                   nutritional_goals, updated_at
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(prefs)
    }

    pub async fn upsert(
        db: &PgPool,
        user_id: Uuid,
        patch: PreferencesPatch,
    ) -> anyhow::Result<UserPreferences> {
        let prefs = sqlx::query_as::<_, UserPreferences>(
            r#"
            INSERT INTO user_preferences
                (user_id, dietary_preferences, allergies, dietary_restrictions, nutritional_goals)
            VALUES ($1,
                    COALESCE($2, '[]'::jsonb),
                    COALESCE($3, '[]'::jsonb),
                    COALESCE($4, '[]'::jsonb),
                    COALESCE($5, '{}'::jsonb))
            ON CONFLICT (user_id) DO UPDATE SET
                dietary_preferences = COALESCE($2, user_preferences.dietary_preferences),
                allergies = COALESCE($3, user_preferences.allergies),
                dietary_restrictions = COALESCE($4, user_preferences.dietary_restrictions),
                nutritional_goals = COALESCE($5, user_preferences.nutritional_goals),
                updated_at = NOW()
            RETURNING user_id, dietary_preferences, allergies, dietary_restrictions,
                      nutritional_goals, updated_at
            "#,
        )
        .bind(user_id)
        .bind(patch.dietary_preferences.map(Json))
        .bind(patch.allergies.map(Json))
        .bind(patch.dietary_restrictions.map(Json))
        .bind(patch.nutritional_goals.map(Json))
        .fetch_one(db)
        .await?;
        Ok(prefs)
    }
}
