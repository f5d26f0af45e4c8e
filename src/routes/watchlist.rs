use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::entities::{startup, watchlist_item};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

const ALREADY_WATCHING: &str = "startup is already on your watchlist";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OwnedByStartupQuery {
    /// Only entries for this startup id
    #[serde(default)]
    #[param(required = false)]
    pub startup: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WatchlistItemResponse {
    pub id: i32,
    /// Owner's user id
    pub user: i32,
    /// Watched startup id
    pub startup: i32,
    pub startup_name: String,
    pub created_at: DateTime<Utc>,
}

impl WatchlistItemResponse {
    fn new(item: watchlist_item::Model, startup_name: String) -> Self {
        Self {
            id: item.id,
            user: item.user_id,
            startup: item.startup_id,
            startup_name,
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WatchlistPayload {
    /// Startup id to watch
    startup: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WatchlistPatch {
    #[serde(default)]
    startup: Option<i32>,
}

/// Startup referenced by a write; a missing startup is a bad request, not a 404.
pub(crate) async fn referenced_startup<C>(db: &C, id: i32) -> Result<startup::Model, AppError>
where
    C: ConnectionTrait,
{
    startup::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::InvalidRequest(format!("startup {} does not exist", id)))
}

/// Every watchlist query starts here: only the caller's own entries are visible.
fn owned_by(user: &AuthUser) -> Select<watchlist_item::Entity> {
    watchlist_item::Entity::find().filter(watchlist_item::Column::UserId.eq(user.id()))
}

async fn find_owned(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> Result<(watchlist_item::Model, startup::Model), AppError> {
    owned_by(user)
        .filter(watchlist_item::Column::Id.eq(id))
        .find_also_related(startup::Entity)
        .one(&state.db)
        .await?
        .and_then(|(item, startup)| startup.map(|startup| (item, startup)))
        .ok_or_else(|| AppError::NotFound(format!("watchlist item {}", id)))
}

/// List the caller's watchlist, most recently added first
#[utoipa::path(
    get,
    path = "/watchlist/",
    params(OwnedByStartupQuery, PageQuery),
    responses(
        (
            status = 200,
            description = "One page of watchlist entries",
            body = Page<WatchlistItemResponse>
        ),
        (status = 401, description = "Missing or invalid API token")
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, uri, user), fields(user_id = user.id()))]
pub async fn list_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    AppQuery(filter): AppQuery<OwnedByStartupQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> Result<Json<Page<WatchlistItemResponse>>, AppError> {
    let mut select = owned_by(&user);
    if let Some(startup_id) = filter.startup {
        select = select.filter(watchlist_item::Column::StartupId.eq(startup_id));
    }

    let paginator = select
        .order_by_desc(watchlist_item::Column::CreatedAt)
        .order_by_desc(watchlist_item::Column::Id)
        .find_also_related(startup::Entity)
        .paginate(&state.db, state.page_size);
    let count = paginator.num_items().await?;
    let number = page.checked_number(state.page_size, count)?;
    let rows = paginator.fetch_page(number - 1).await?;

    let results = rows
        .into_iter()
        .map(|(item, startup)| {
            let name = startup.map(|s| s.name).unwrap_or_default();
            WatchlistItemResponse::new(item, name)
        })
        .collect();
    Ok(Json(Page::build(&uri, number, state.page_size, count, results)?))
}

/// Fetch one of the caller's watchlist entries
#[utoipa::path(
    get,
    path = "/watchlist/{id}/",
    params(("id" = i32, Path, description = "Watchlist entry id")),
    responses(
        (status = 200, description = "The entry", body = WatchlistItemResponse),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such entry for this user")
    ),
    security(("bearer" = []))
)]
pub async fn get_watchlist_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<WatchlistItemResponse>, AppError> {
    let (item, startup) = find_owned(&state, &user, id).await?;
    Ok(Json(WatchlistItemResponse::new(item, startup.name)))
}

/// Add a startup to the caller's watchlist
#[utoipa::path(
    post,
    path = "/watchlist/",
    request_body = WatchlistPayload,
    responses(
        (status = 201, description = "Entry created", body = WatchlistItemResponse),
        (status = 400, description = "Startup does not exist"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 409, description = "Startup already on the watchlist")
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = user.id()))]
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<WatchlistPayload>,
) -> Result<impl IntoResponse, AppError> {
    let startup = referenced_startup(&state.db, payload.startup).await?;

    let am = watchlist_item::ActiveModel {
        user_id: Set(user.id()),
        startup_id: Set(startup.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let item = am
        .insert(&state.db)
        .await
        .map_err(|e| AppError::from_write(e, ALREADY_WATCHING))?;

    tracing::info!(startup_id = startup.id, "Added startup to watchlist");
    Ok((StatusCode::CREATED, Json(WatchlistItemResponse::new(item, startup.name))))
}

async fn change_startup(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    startup_id: Option<i32>,
) -> Result<WatchlistItemResponse, AppError> {
    let (item, current) = find_owned(state, user, id).await?;
    let Some(startup_id) = startup_id else {
        return Ok(WatchlistItemResponse::new(item, current.name));
    };

    let startup = referenced_startup(&state.db, startup_id).await?;
    let mut am: watchlist_item::ActiveModel = item.into();
    am.startup_id = Set(startup.id);
    let item = am
        .update(&state.db)
        .await
        .map_err(|e| AppError::from_write(e, ALREADY_WATCHING))?;
    Ok(WatchlistItemResponse::new(item, startup.name))
}

/// Point one of the caller's watchlist entries at another startup
#[utoipa::path(
    put,
    path = "/watchlist/{id}/",
    params(("id" = i32, Path, description = "Watchlist entry id")),
    request_body = WatchlistPayload,
    responses(
        (status = 200, description = "Entry updated", body = WatchlistItemResponse),
        (status = 400, description = "Startup does not exist"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such entry for this user"),
        (status = 409, description = "Startup already on the watchlist")
    ),
    security(("bearer" = []))
)]
pub async fn replace_watchlist_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<WatchlistPayload>,
) -> Result<Json<WatchlistItemResponse>, AppError> {
    Ok(Json(change_startup(&state, &user, id, Some(payload.startup)).await?))
}

/// Partially update one of the caller's watchlist entries
#[utoipa::path(
    patch,
    path = "/watchlist/{id}/",
    params(("id" = i32, Path, description = "Watchlist entry id")),
    request_body = WatchlistPatch,
    responses(
        (status = 200, description = "Entry updated", body = WatchlistItemResponse),
        (status = 400, description = "Startup does not exist"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such entry for this user"),
        (status = 409, description = "Startup already on the watchlist")
    ),
    security(("bearer" = []))
)]
pub async fn update_watchlist_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(patch): AppJson<WatchlistPatch>,
) -> Result<Json<WatchlistItemResponse>, AppError> {
    Ok(Json(change_startup(&state, &user, id, patch.startup).await?))
}

/// Remove an entry from the caller's watchlist
#[utoipa::path(
    delete,
    path = "/watchlist/{id}/",
    params(("id" = i32, Path, description = "Watchlist entry id")),
    responses(
        (status = 204, description = "Entry removed"),
        (status = 401, description = "Missing or invalid API token"),
        (status = 404, description = "No such entry for this user")
    ),
    security(("bearer" = []))
)]
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    let result = watchlist_item::Entity::delete_many()
        .filter(watchlist_item::Column::Id.eq(id))
        .filter(watchlist_item::Column::UserId.eq(user.id()))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("watchlist item {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
