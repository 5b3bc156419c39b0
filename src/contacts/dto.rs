use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo::{Contact, ContactInput};
use crate::error::ApiError;

const MAX_FIELD: usize = 50;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
}

impl TryFrom<ContactRequest> for ContactInput {
    type Error = ApiError;

    fn try_from(r: ContactRequest) -> Result<Self, Self::Error> {
        for (name, value) in [
            ("first_name", &r.first_name),
            ("last_name", &r.last_name),
            ("email", &r.email),
            ("phone", &r.phone),
        ] {
            if value.chars().count() > MAX_FIELD {
                return Err(ApiError::Validation(format!(
                    "{name} must be at most {MAX_FIELD} characters"
                )));
            }
        }
        Ok(ContactInput {
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
            birthday: r.birthday,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone: c.phone,
            birthday: c.birthday,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl Pagination {
    pub fn validated(self) -> Result<(i64, i64), ApiError> {
        if self.skip < 0 || self.limit < 0 {
            return Err(ApiError::Validation("skip and limit must not be negative".into()));
        }
        Ok((self.skip, self.limit.min(MAX_LIMIT)))
    }
}
