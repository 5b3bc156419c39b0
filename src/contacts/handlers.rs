use axum::{
    extract::State,
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    birthdays,
    dto::{ContactRequest, ContactResponse, Pagination},
    repo::{Contact, ContactInput, SearchField},
};
use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    extract::{Json as JsonBody, Path, Query},
    ratelimit,
    state::AppState,
};

pub fn contact_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/contacts", get(read_contacts).post(create_contact))
        .route("/contacts/", get(read_contacts).post(create_contact))
        .route("/contacts/by_id/:contact_id", get(read_contact))
        .route("/contacts/by_fname/:first_name", get(read_contacts_with_fname))
        .route("/contacts/by_lname/:last_name", get(read_contacts_with_lname))
        .route("/contacts/by_email/:email", get(read_contacts_with_email))
        .route("/contacts/birthday", get(read_contacts_by_birthday))
        .route("/contacts/birthday/", get(read_contacts_by_birthday))
        .route(
            "/contacts/:contact_id",
            axum::routing::put(update_contact).delete(remove_contact),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            ratelimit::limit_requests,
        ))
}

fn non_empty(contacts: Vec<Contact>) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    if contacts.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn read_contacts(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let (skip, limit) = p.validated()?;
    let contacts = state.contacts.list(identity.id, skip, limit).await?;
    non_empty(contacts)
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn read_contact(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ContactResponse>, ApiError> {
    state
        .contacts
        .get(identity.id, contact_id)
        .await?
        .map(|c| Json(c.into()))
        .ok_or(ApiError::NotFound)
}

async fn search(
    state: &AppState,
    user_id: Uuid,
    field: SearchField,
    needle: &str,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = state.contacts.search(user_id, field, needle).await?;
    debug!(?field, hits = contacts.len(), "contact search");
    non_empty(contacts)
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn read_contacts_with_fname(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(first_name): Path<String>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    search(&state, identity.id, SearchField::FirstName, &first_name).await
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn read_contacts_with_lname(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(last_name): Path<String>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    search(&state, identity.id, SearchField::LastName, &last_name).await
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn read_contacts_with_email(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(email): Path<String>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    search(&state, identity.id, SearchField::Email, &email).await
}

/// Contacts with a birthday in the coming week. An empty list is a normal
/// answer here, not a 404.
#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn read_contacts_by_birthday(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let contacts =
        birthdays::upcoming_birthdays(state.contacts.as_ref(), identity.id, today).await?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, identity, body), fields(user_id = %identity.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(body): JsonBody<ContactRequest>,
) -> Result<(StatusCode, HeaderMap, Json<ContactResponse>), ApiError> {
    let input = ContactInput::try_from(body)?;
    let contact = state.contacts.create(identity.id, input).await?;
    info!(contact_id = %contact.id, "contact created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/contacts/by_id/{}", contact.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(contact.into())))
}

#[instrument(skip(state, identity, body), fields(user_id = %identity.id))]
pub async fn update_contact(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(contact_id): Path<Uuid>,
    JsonBody(body): JsonBody<ContactRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    let input = ContactInput::try_from(body)?;
    let contact = state
        .contacts
        .update(identity.id, contact_id, input)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(%contact_id, "contact updated");
    Ok(Json(contact.into()))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn remove_contact(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = state
        .contacts
        .remove(identity.id, contact_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(%contact_id, "contact deleted");
    Ok(Json(contact.into()))
}
