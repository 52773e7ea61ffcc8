use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post, put},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MeResponse, MessageResponse, OAuthCallback,
            PreferencesRequest, RefreshRequest, RegisterRequest, UserProfile,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo::PreferencesPatch,
        repo_types::{User, UserPreferences},
        services::{federated_login, is_valid_email, issue_tokens, normalize_email, normalize_set},
    },
    error::{is_unique_violation, AppError, AppResult},
    extract::{Json, Path, Query},
    state::AppState,
};

const DUPLICATE_USER: &str = "User already exists with this email";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/auth/preferences", put(update_preferences))
        .route("/auth/:provider", get(oauth_start))
        .route("/auth/:provider/callback", get(oauth_callback))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email);
    let name = payload.name.trim();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::bad_request("Please provide a valid email"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict(DUPLICATE_USER.into()));
    }

    let hash = hash_password(&payload.password)?;
    // A concurrent registration can still win the race on the unique index.
    let user = User::create(&state.db, &email, &hash, name)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(DUPLICATE_USER.into())
            } else {
                AppError::Internal(e)
            }
        })?;

    let body = issue_tokens(&JwtKeys::from_ref(&state), &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(invalid());
        }
    };

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, provider = ?user.oauth_provider, "password login on federated account");
        return Err(invalid());
    };

    if !verify_password(&payload.password, hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let body = issue_tokens(&JwtKeys::from_ref(&state), &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid refresh token".into())
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let body = issue_tokens(&keys, &user)?;
    info!(user_id = %user.id, "tokens refreshed");
    Ok(Json(body))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let prefs = UserPreferences::find(&state.db, auth.id).await?;
    Ok(Json(MeResponse {
        user: UserProfile::new(user, prefs),
    }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PreferencesRequest>,
) -> AppResult<Json<MessageResponse>> {
    let patch = PreferencesPatch {
        dietary_preferences: payload.dietary_preferences.map(normalize_set),
        allergies: payload.allergies.map(normalize_set),
        dietary_restrictions: payload.dietary_restrictions.map(normalize_set),
        nutritional_goals: payload.nutritional_goals,
    };
    UserPreferences::upsert(&state.db, auth.id, patch).await?;
    info!("preferences updated");
    Ok(Json(MessageResponse {
        message: "Preferences updated successfully",
    }))
}

#[instrument(skip(state))]
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Redirect> {
    let idp = state
        .identity
        .get(&provider)
        .ok_or_else(|| AppError::not_found(format!("Unknown provider: {}", provider)))?;
    let oauth_state = JwtKeys::from_ref(&state).sign_state(idp.name())?;
    let url = idp.authorize_url(&oauth_state)?;
    Ok(Redirect::to(&url))
}

#[instrument(skip(state, params))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallback>,
) -> AppResult<Redirect> {
    let idp = state
        .identity
        .get(&provider)
        .ok_or_else(|| AppError::not_found(format!("Unknown provider: {}", provider)))?;
    let client_url = state.config.oauth.client_url.trim_end_matches('/');
    let keys = JwtKeys::from_ref(&state);

    let outcome = async {
        if let Some(err) = params.error.as_deref() {
            anyhow::bail!("provider returned error: {}", err);
        }
        let code = params.code.as_deref().ok_or_else(|| anyhow::anyhow!("missing code"))?;
        let oauth_state = params.state.as_deref().ok_or_else(|| anyhow::anyhow!("missing state"))?;
        keys.verify_state(oauth_state, idp.name())?;

        let identity = idp.authenticate(code).await?;
        let user = federated_login(&state.db, &identity, idp.name()).await?;
        keys.sign_access(user.id, &user.email)
    }
    .await;

    match outcome {
        Ok(token) => Ok(Redirect::to(&format!("{}/auth/callback?token={}", client_url, token))),
        Err(e) => {
            warn!(error = %e, provider = %provider, "federated login failed");
            Ok(Redirect::to(&format!("{}/auth/error", client_url)))
        }
    }
}
