use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::UserResponse,
    services::{self, AvatarUpload},
};
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(read_users_me))
        .route("/users/me/", get(read_users_me))
        .route(
            "/users/avatar",
            patch(update_avatar_user).layer(DefaultBodyLimit::max(5 * 1024 * 1024)), // 5MB
        )
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn read_users_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(services::to_response(&state, identity).await?))
}

/// PATCH /users/avatar (multipart, field `file`)
#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn update_avatar_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut mp = mp.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            upload = Some(AvatarUpload { body, content_type });
            break;
        }
    }
    let upload = upload.ok_or_else(|| ApiError::Validation("file is required".into()))?;

    let identity = services::update_avatar(&state, &identity, upload).await?;
    Ok(Json(services::to_response(&state, identity).await?))
}
