use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
    Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::watchlist::{referenced_startup, OwnedByStartupQuery};
use crate::auth::AuthUser;
use crate::entities::{note, startup};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

const ALREADY_NOTED: &str = "you already have a note for this startup";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    pub id: i32,
    /// Owner's user id
    pub user: i32,
    /// Startup id the note is about
    pub startup: i32,
    pub startup_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NoteResponse {
    fn new(note: note::Model, startup_name: String) -> Self {
        Self {
            id: note.id,
            user: note.user_id,
            startup: note.startup_id,
            startup_name,
            content: note.content,
            created_at: note.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NotePayload {
    startup: i32,
    content: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotePatch {
    #[serde(default)]
    startup: Option<i32>,
    #[serde(default)]
    content: Option<String>,
}

fn note_content(content: String) -> Result<String, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::InvalidRequest("content may not be blank".to_string()));
    }
    Ok(content)
}

/// Only the caller's own notes are visible.
fn owned_by(user: &AuthUser) -> Select<note::Entity> {
    note::Entity::find().filter(note::Column::UserId.eq(user.id()))
}

async fn find_owned(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> Result<(note::Model, startup::Model), AppError> {
    owned_by(user)
        .filter(note::Column::Id.eq(id))
        .find_also_related(startup::Entity)
        .one(&state.db)
        .await?
        .and_then(|(note, startup)| startup.map(|startup| (note, startup)))
        .ok_or_else(|| AppError::NotFound(format!("note {}", id)))
}

/// List the caller's notes, newest first
#[utoipa::path(
    get,
    path = "/notes/",
    params(OwnedByStartupQuery, PageQuery),
    responses(
        (status = 200, description = "One page of notes", body = Page<NoteResponse>),
        (status = 401, description = "Missing or invalid API token")
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, uri, user), fields(user_id = user.id()))]
pub async fn list_notes(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    AppQuery(filter): AppQuery<OwnedByStartupQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> Result<Json<Page<NoteResponse>>, AppError> {
    let mut select = owned_by(&user);
    if let Some(startup_id) = filter.startup {
        select = select.filter(note::Column::StartupId.eq(startup_id));
    }

    let paginator = select
        .order_by_desc(note::Column::CreatedAt)
        .order_by_desc(note::Column::Id)
        .find_also_related(startup::Entity)
        .paginate(&state.db, state.page_size);
    let count = paginator.num_items().await?;
    let number = page.checked_number(state.page_size, count)?;
    let rows = paginator.fetch_page(number - 1).await?;

    let results = rows
        .into_iter()
        .map(|(note, startup)| NoteResponse::new(note, startup.map(|s| s.name).unwrap_or_default()))
        .collect();
    Ok(Json(Page::build(&uri, number, state.page_size, count, results)?))
}

/// Fetch one of the caller's notes
#[utoipa::path(
    get,
    path = "/notes/{id}/",
    params(("id" = i32, Path, description = "Note id")),
    responses(
        (status = 200, description = "The note", body = NoteResponse),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such note for this user")
    ),
    security(("bearer" = []))
)]
pub async fn get_note(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<NoteResponse>, AppError> {
    let (note, startup) = find_owned(&state, &user, id).await?;
    Ok(Json(NoteResponse::new(note, startup.name)))
}

/// Write a note about a startup
#[utoipa::path(
    post,
    path = "/notes/",
    request_body = NotePayload,
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 400, description = "Blank content or unknown startup"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 409, description = "A note for this startup already exists")
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(
    skip(state, user, payload),
    fields(user_id = user.id(), startup_id = payload.startup)
)]
pub async fn create_note(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<NotePayload>,
) -> Result<impl IntoResponse, AppError> {
    let content = note_content(payload.content)?;
    let startup = referenced_startup(&state.db, payload.startup).await?;

    let am = note::ActiveModel {
        user_id: Set(user.id()),
        startup_id: Set(startup.id),
        content: Set(content),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let note = am.insert(&state.db).await.map_err(|e| AppError::from_write(e, ALREADY_NOTED))?;

    tracing::info!(note_id = note.id, "Created note");
    Ok((StatusCode::CREATED, Json(NoteResponse::new(note, startup.name))))
}

async fn apply_changes(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    startup_id: Option<i32>,
    content: Option<String>,
) -> Result<NoteResponse, AppError> {
    let (note, current) = find_owned(state, user, id).await?;
    if startup_id.is_none() && content.is_none() {
        return Ok(NoteResponse::new(note, current.name));
    }
    let mut startup_name = current.name;

    let mut am: note::ActiveModel = note.into();
    if let Some(content) = content {
        am.content = Set(note_content(content)?);
    }
    if let Some(startup_id) = startup_id {
        let startup = referenced_startup(&state.db, startup_id).await?;
        am.startup_id = Set(startup.id);
        startup_name = startup.name;
    }

    let note = am.update(&state.db).await.map_err(|e| AppError::from_write(e, ALREADY_NOTED))?;
    Ok(NoteResponse::new(note, startup_name))
}

/// Replace one of the caller's notes
#[utoipa::path(
    put,
    path = "/notes/{id}/",
    params(("id" = i32, Path, description = "Note id")),
    request_body = NotePayload,
    responses(
        (status = 200, description = "Note replaced", body = NoteResponse),
        (status = 400, description = "Blank content or unknown startup"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such note for this user"),
        (status = 409, description = "A note for this startup already exists")
    ),
    security(("bearer" = []))
)]
pub async fn replace_note(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<NotePayload>,
) -> Result<Json<NoteResponse>, AppError> {
    let updated =
        apply_changes(&state, &user, id, Some(payload.startup), Some(payload.content)).await?;
    Ok(Json(updated))
}

/// Partially update one of the caller's notes
#[utoipa::path(
    patch,
    path = "/notes/{id}/",
    params(("id" = i32, Path, description = "Note id")),
    request_body = NotePatch,
    responses(
        (status = 200, description = "Note updated", body = NoteResponse),
        (status = 400, description = "Blank content or unknown startup"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such note for this user"),
        (status = 409, description = "A note for this startup already exists")
    ),
    security(("bearer" = []))
)]
pub async fn update_note(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(patch): AppJson<NotePatch>,
) -> Result<Json<NoteResponse>, AppError> {
    let updated = apply_changes(&state, &user, id, patch.startup, patch.content).await?;
    Ok(Json(updated))
}

/// Delete one of the caller's notes
#[utoipa::path(
    delete,
    path = "/notes/{id}/",
    params(("id" = i32, Path, description = "Note id")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such note for this user")
    ),
    security(("bearer" = []))
)]
pub async fn delete_note(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    let result = note::Entity::delete_many()
        .filter(note::Column::Id.eq(id))
        .filter(note::Column::UserId.eq(user.id()))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("note {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
