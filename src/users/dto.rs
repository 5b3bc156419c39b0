use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub avatar: Option<String>, // short-lived URL, absent until one is uploaded
}
