use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenKind,
        dto::{LoginForm, MessageResponse, SignupRequest, TokenResponse},
        jwt::AuthError,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::repo::{NewUser, User},
};

const MAX_USERNAME: usize = 50;
const MIN_PASSWORD: usize = 6;
const MAX_PASSWORD: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn mint_pair(state: &AppState, user_id: Uuid) -> Result<TokenResponse, ApiError> {
    let access_token = state.keys.sign_access(user_id)?;
    let refresh_token = state.keys.sign_refresh(user_id)?;
    Ok(TokenResponse::bearer(access_token, refresh_token))
}

/// Mints an access/refresh pair and makes the refresh token the only one
/// accepted for this user from now on.
pub async fn issue_tokens(state: &AppState, user_id: Uuid) -> Result<TokenResponse, ApiError> {
    let pair = mint_pair(state, user_id)?;
    state.users.update_token(user_id, Some(&pair.refresh_token)).await?;
    Ok(pair)
}

pub async fn signup(state: &AppState, req: SignupRequest) -> Result<User, ApiError> {
    let email = normalize_email(&req.email);
    let username = req.username.trim();

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if username.is_empty() || username.chars().count() > MAX_USERNAME {
        return Err(ApiError::Validation(format!(
            "Username must be 1 to {MAX_USERNAME} characters"
        )));
    }
    if req.password.len() < MIN_PASSWORD || req.password.len() > MAX_PASSWORD {
        return Err(ApiError::Validation(format!(
            "Password must be {MIN_PASSWORD} to {MAX_PASSWORD} characters"
        )));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::Conflict("Account already exists".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            username,
            email: &email,
            password_hash: &hash,
        })
        .await?
        .ok_or_else(|| ApiError::Conflict("Account already exists".into()))?;

    let token = state.keys.sign_email(user.id)?;
    let link = format!(
        "{}/api/auth/confirmed_email/{}",
        state.config.public_base_url, token
    );
    let mailer = state.mailer.clone();
    let (to, name) = (user.email.clone(), user.username.clone());
    tokio::spawn(async move {
        if let Err(e) = mailer.send_confirmation(&to, &name, &link).await {
            warn!(error = %e, %to, "confirmation email failed");
        }
    });

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(state: &AppState, form: LoginForm) -> Result<TokenResponse, ApiError> {
    let email = normalize_email(&form.username);

    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(%email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid email".into()));
        }
    };
    if !user.confirmed {
        warn!(user_id = %user.id, "login before email confirmation");
        return Err(ApiError::Unauthorized("Email not confirmed".into()));
    }
    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid password".into()));
    }

    let tokens = issue_tokens(state, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(tokens)
}

/// Exchanges the current refresh token for a new pair. Presenting any other
/// refresh token of the user (e.g. one already rotated out, or one a
/// concurrent request just rotated) revokes the session entirely.
pub async fn rotate_refresh(state: &AppState, token: &str) -> Result<TokenResponse, ApiError> {
    let claims = state.keys.verify_refresh(token)?;
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::Invalid)?;

    if user.refresh_token.as_deref() != Some(token) {
        return Err(revoke_session(state, user.id).await);
    }

    let pair = mint_pair(state, user.id)?;
    if !state
        .users
        .swap_token(user.id, token, &pair.refresh_token)
        .await?
    {
        return Err(revoke_session(state, user.id).await);
    }
    Ok(pair)
}

async fn revoke_session(state: &AppState, user_id: Uuid) -> ApiError {
    warn!(%user_id, "refresh token reuse; revoking session");
    if let Err(e) = state.users.update_token(user_id, None).await {
        return e.into();
    }
    state.identity_cache.evict_user(user_id).await;
    AuthError::Revoked.into()
}

pub async fn logout(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    state.users.update_token(user_id, None).await?;
    state.identity_cache.evict_user(user_id).await;
    info!(%user_id, "user logged out");
    Ok(())
}

pub async fn confirm_email(state: &AppState, token: &str) -> Result<MessageResponse, ApiError> {
    let claims = state
        .keys
        .verify_kind(token, TokenKind::Email)
        .map_err(|_| ApiError::Validation("Invalid token for email verification".into()))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Verification error".into()))?;

    if user.confirmed {
        return Ok(MessageResponse {
            message: "Your email is already confirmed".into(),
        });
    }
    state.users.confirm_email(user.id).await?;
    state.identity_cache.evict_user(user.id).await;
    info!(user_id = %user.id, "email confirmed");
    Ok(MessageResponse {
        message: "Email confirmed".into(),
    })
}
