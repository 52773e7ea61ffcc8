use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};

use super::{
    dto::{RecognizeResponse, SuggestionQuery, SuggestionResponse},
    repo,
};
use crate::{
    ai::recognition::{normalize_image, recognize_ingredients},
    error::{AppError, AppResult},
    extract::{Json, Query},
    state::AppState,
};

/// Largest accepted image.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Room for multipart boundaries and part headers on top of the image.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;
const MIN_QUERY_CHARS: usize = 2;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/ingredients/suggestions", get(suggestions))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients/recognize", post(recognize))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + FORM_OVERHEAD_BYTES))
}

// --- handlers ---

/// Pulls the `image` part out of the form, rejecting anything that does not
/// declare an image content type.
async fn image_field(mp: &mut Multipart) -> AppResult<Bytes> {
    loop {
        let field = mp
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        let Some(field) = field else {
            return Err(AppError::bad_request("No image file provided"));
        };
        if field.name() != Some("image") {
            continue;
        }

        let is_image = field
            .content_type()
            .map_or(false, |ct| ct.starts_with("image/"));
        if !is_image {
            return Err(AppError::bad_request("Only image files are allowed"));
        }
        return field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()));
    }
}

fn check_upload_size(len: usize) -> AppResult<()> {
    match len {
        0 => Err(AppError::bad_request("No image file provided")),
        n if n > MAX_UPLOAD_BYTES => Err(AppError::bad_request("Image must be 10 MB or smaller")),
        _ => Ok(()),
    }
}

/// POST /ingredients/recognize (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn recognize(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> AppResult<Json<RecognizeResponse>> {
    let upload = image_field(&mut mp).await?;
    check_upload_size(upload.len())?;

    // Decoding and resizing are CPU bound.
    let jpeg = tokio::task::spawn_blocking(move || normalize_image(&upload))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| {
            warn!(error = %e, "undecodable upload");
            AppError::bad_request("Uploaded file is not a readable image")
        })?;

    let ingredients = recognize_ingredients(state.ai.as_ref(), &jpeg).await?;
    info!(count = ingredients.len(), "ingredients recognized");
    Ok(Json(RecognizeResponse {
        message: format!("Recognized {} ingredients", ingredients.len()),
        ingredients,
    }))
}

#[instrument(skip(state))]
pub async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> AppResult<Json<SuggestionResponse>> {
    let fragment = query.q.as_deref().unwrap_or("").trim();
    if fragment.chars().count() < MIN_QUERY_CHARS {
        return Ok(Json(SuggestionResponse {
            suggestions: Vec::new(),
        }));
    }
    let suggestions = repo::suggestions(&state.db, fragment).await?;
    Ok(Json(SuggestionResponse { suggestions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_is_checked_on_the_field_itself() {
        assert!(check_upload_size(0).is_err());
        assert!(check_upload_size(MAX_UPLOAD_BYTES - 512).is_ok());
        assert!(check_upload_size(MAX_UPLOAD_BYTES).is_ok());
        assert!(matches!(
            check_upload_size(MAX_UPLOAD_BYTES + 1),
            Err(AppError::BadRequest(_))
        ));
    }
}
