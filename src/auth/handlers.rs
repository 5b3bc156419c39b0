use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, MessageResponse, SignupRequest, SignupResponse, TokenResponse},
        extractors::{AuthUser, BearerToken},
        services,
    },
    error::ApiError,
    extract::{Form, Json as JsonBody, Path},
    state::AppState,
    users::{self, repo::Identity},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh_token", get(refresh_token))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let user = services::signup(&state, payload).await?;
    let user = users::services::to_response(&state, Identity::from(&user)).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user,
            detail: "User successfully created".into(),
        }),
    ))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(services::login(&state, form).await?))
}

#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(services::rotate_refresh(&state, &token).await?))
}

#[instrument(skip_all)]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    Ok(Json(services::confirm_email(&state, &token).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<StatusCode, ApiError> {
    services::logout(&state, identity.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
