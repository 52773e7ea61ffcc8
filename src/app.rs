use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, ingredients, meal_plans, nutrition, recipes, shopping, tips};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(recipes::router())
                .merge(meal_plans::router())
                .merge(nutrition::router())
                .merge(shopping::router())
                .merge(ingredients::router())
                .merge(tips::router())
                .route("/health", get(health)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Recipe Generator API is running",
    }))
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    const RECIPE_JSON: &str = r#"{"title": "Garlic Pasta", "description": "Quick", "ingredients": [{"name": "pasta", "quantity": "200", "unit": "g"}, {"name": "garlic", "quantity": "2", "unit": "cloves"}], "instructions": ["Boil pasta", "Fry garlic", "Toss"], "nutrition": {"calories": 450, "protein": 14, "carbs": 80, "fat": 9}, "difficulty": "easy", "prep_time": 5, "cook_time": 12, "dietary_tags": ["vegetarian"]}"#;

    async fn call(
        ai_reply: &'static str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        call_with(AppState::fake(ai_reply), method, uri, body).await
    }

    async fn call_with(
        state: AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = build_app(state);
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = call("", Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Recipe Generator API is running");
    }

    #[tokio::test]
    async fn rating_requires_a_token() {
        let uri = format!("/api/recipes/{}/rate", uuid::Uuid::new_v4());
        let (status, body) = call("", Method::POST, &uri, Some(json!({"rating": 4}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn garbled_tokens_are_forbidden() {
        let app = build_app(AppState::fake(""));
        let req = Request::builder()
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn register_rejects_bad_email() {
        let (status, body) = call(
            "",
            Method::POST,
            "/api/auth/register",
            Some(json!({"email": "nope", "password": "secret123", "name": "Sam"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a valid email");
    }

    #[tokio::test]
    async fn generation_needs_ingredients() {
        let (status, body) = call(
            RECIPE_JSON,
            Method::POST,
            "/api/recipes/generate",
            Some(json!({"ingredients": ["  "]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "At least one ingredient is required");
    }

    #[tokio::test]
    async fn unparseable_model_output_is_a_parse_error() {
        let (status, body) = call(
            "Sorry, I cannot help with that.",
            Method::POST,
            "/api/recipes/generate",
            Some(json!({"ingredients": ["egg"]})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "PARSE_ERROR");
        assert_eq!(body["error"], "Failed to parse AI response");
    }

    #[tokio::test]
    async fn generated_recipe_is_returned_even_when_unsaved() {
        let (status, body) = call(
            RECIPE_JSON,
            Method::POST,
            "/api/recipes/generate",
            Some(json!({"ingredients": ["pasta", "garlic"], "allergies": "none"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["saved_to_db"], false);
        assert_eq!(body["recipe"]["title"], "Garlic Pasta");
        assert_eq!(body["recipe"]["ingredients"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["recipe"]["instructions"][2]["step_number"], 3);
    }

    #[tokio::test]
    async fn short_suggestion_queries_skip_the_database() {
        let (status, body) = call("", Method::GET, "/api/ingredients/suggestions?q=a", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"], json!([]));
    }

    #[tokio::test]
    async fn unknown_identity_provider_is_not_found() {
        let (status, _) = call("", Method::GET, "/api/auth/myspace", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn nutrition_routes_require_a_token() {
        let (status, _) = call("", Method::GET, "/api/nutrition/daily", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mistyped_json_fields_are_bad_requests() {
        let (status, body) = call(
            RECIPE_JSON,
            Method::POST,
            "/api/recipes/generate",
            Some(json!({"ingredients": "egg"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_recipe_id_is_a_bad_request() {
        let (status, body) = call("", Method::GET, "/api/recipes/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn non_numeric_paging_is_a_bad_request() {
        let (status, body) = call("", Method::GET, "/api/recipes?limit=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn password_length_counts_characters() {
        let (status, body) = call(
            "",
            Method::POST,
            "/api/auth/register",
            Some(json!({"email": "sam@example.com", "password": "ééé", "name": "Sam"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password must be at least 6 characters");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_registration_is_a_conflict(pool: sqlx::PgPool) {
        let payload = json!({"email": "dup@example.com", "password": "secret123", "name": "Sam"});

        let (first, _) = call_with(
            AppState::fake_with_pool(pool.clone(), ""),
            Method::POST,
            "/api/auth/register",
            Some(payload.clone()),
        )
        .await;
        assert_eq!(first, StatusCode::CREATED);

        let (second, body) = call_with(
            AppState::fake_with_pool(pool.clone(), ""),
            Method::POST,
            "/api/auth/register",
            Some(payload),
        )
        .await;
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User already exists with this email");

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind("dup@example.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
    }
}
