use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub fallback_model: String,
    pub vision_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Frontend base url the callbacks redirect to.
    pub client_url: String,
    /// Public base url of this API, used to build provider redirect uris.
    pub public_url: String,
    pub google: Option<OAuthClient>,
    pub github: Option<OAuthClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NutritionApiConfig {
    pub app_id: String,
    pub app_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub environment: Environment,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
    pub oauth: OAuthConfig,
    pub nutrition_api: Option<NutritionApiConfig>,
}

const PLACEHOLDER_AI_KEY: &str = "your-actual-openai-api-key";

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn oauth_client(id_var: &str, secret_var: &str) -> Option<OAuthClient> {
    Some(OAuthClient {
        client_id: non_empty(id_var)?,
        client_secret: non_empty(secret_var)?,
    })
}

/// Keys that are blank, too short or still the sample placeholder are
/// treated as absent.
pub(crate) fn usable_ai_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| k.len() >= 10 && k != PLACEHOLDER_AI_KEY)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => format!(
                "postgres://{}:{}@{}:{}/{}",
                var_or("DB_USER", "postgres"),
                var_or("DB_PASSWORD", "postgres"),
                var_or("DB_HOST", "localhost"),
                var_or("DB_PORT", "5432"),
                var_or("DB_NAME", "recipe_generator"),
            ),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: var_or("JWT_ISSUER", "recipegen"),
            audience: var_or("JWT_AUDIENCE", "recipegen-users"),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60 * 24 * 7),
            refresh_ttl_minutes: parsed_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 30),
        };
        let ai = AiConfig {
            api_key: usable_ai_key(std::env::var("OPENAI_API_KEY").ok()),
            base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: var_or("OPENAI_MODEL", "gpt-4"),
            fallback_model: var_or("OPENAI_FALLBACK_MODEL", "gpt-3.5-turbo"),
            vision_model: var_or("OPENAI_VISION_MODEL", "gpt-4-vision-preview"),
            timeout_secs: parsed_or("OPENAI_TIMEOUT_SECS", 60),
        };
        let oauth = OAuthConfig {
            client_url: var_or("CLIENT_URL", "http://localhost:3000"),
            public_url: var_or("PUBLIC_URL", "http://localhost:8080"),
            google: oauth_client("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github: oauth_client("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        };
        let nutrition_api = match (non_empty("NUTRITION_API_ID"), non_empty("NUTRITION_API_KEY")) {
            (Some(app_id), Some(app_key)) => Some(NutritionApiConfig { app_id, app_key }),
            _ => None,
        };
        Ok(Self {
            database_url,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10),
            environment: Environment::parse(&var_or("APP_ENV", "development")),
            jwt,
            ai,
            oauth,
            nutrition_api,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_short_keys_are_unusable() {
        assert_eq!(usable_ai_key(None), None);
        assert_eq!(usable_ai_key(Some("short".into())), None);
        assert_eq!(usable_ai_key(Some(PLACEHOLDER_AI_KEY.into())), None);
        assert_eq!(
            usable_ai_key(Some("  sk-0123456789abcdef \n".into())),
            Some("sk-0123456789abcdef".to_string())
        );
    }

    #[test]
    fn environment_defaults_to_development() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert!(Environment::parse("").is_development());
    }
}
