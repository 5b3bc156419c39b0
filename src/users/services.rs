use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::{dto::UserResponse, repo::Identity};
use crate::{error::ApiError, state::AppState};

const AVATAR_URL_TTL_SECS: u64 = 30 * 60;

pub struct AvatarUpload {
    pub body: Bytes,
    pub content_type: String,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn avatar_key(user_id: Uuid, ext: &str) -> String {
    format!("avatars/{user_id}.{ext}")
}

/// Stores a new avatar, overwriting the previous one, and returns the
/// refreshed identity.
pub async fn update_avatar(
    st: &AppState,
    identity: &Identity,
    upload: AvatarUpload,
) -> Result<Identity, ApiError> {
    let ext = ext_from_mime(&upload.content_type)
        .ok_or_else(|| ApiError::Validation("Unsupported image type".into()))?;
    if upload.body.is_empty() {
        return Err(ApiError::Validation("Empty file".into()));
    }

    let key = avatar_key(identity.id, ext);
    st.storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .context("upload avatar")?;

    let user = st
        .users
        .update_avatar(identity.id, &key)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".into()))?;

    if let Some(old) = identity.avatar_key.as_deref().filter(|old| *old != key) {
        if let Err(e) = st.storage.delete_object(old).await {
            warn!(error = %e, key = %old, "stale avatar not deleted");
        }
    }
    st.identity_cache.evict_user(identity.id).await;

    info!(user_id = %identity.id, %key, "avatar updated");
    Ok(Identity::from(&user))
}

pub async fn to_response(st: &AppState, identity: Identity) -> Result<UserResponse, ApiError> {
    let avatar = match identity.avatar_key.as_deref() {
        Some(key) => Some(
            st.storage
                .presign_get(key, AVATAR_URL_TTL_SECS)
                .await
                .with_context(|| format!("presign avatar {key}"))?,
        ),
        None => None,
    };
    Ok(UserResponse {
        id: identity.id,
        username: identity.username,
        email: identity.email,
        confirmed: identity.confirmed,
        created_at: identity.created_at,
        avatar,
    })
}
