use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};

use crate::entities::{startup, Stage};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

const NAME_MAX_LEN: usize = 200;
const LOCATION_MAX_LEN: usize = 200;
const INDUSTRY_MAX_LEN: usize = 100;
const WEBSITE_MAX_LEN: usize = 200;

const NAME_TAKEN: &str = "startup with this name already exists";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StartupQuery {
    /// Exact industry match
    #[serde(default)]
    #[param(required = false)]
    industry: Option<String>,
    /// Exact location match
    #[serde(default)]
    #[param(required = false)]
    location: Option<String>,
    /// Exact stage match
    #[serde(default)]
    #[param(required = false)]
    stage: Option<Stage>,
    /// Case-insensitive substring searched in name, description and tags
    #[serde(default)]
    #[param(required = false)]
    q: Option<String>,
    /// Whitespace-separated terms; each must match name, description or tags
    #[serde(default)]
    #[param(required = false)]
    search: Option<String>,
    /// Comma-separated fields from name, created_at, updated_at; prefix with `-` for
    /// descending (default: -created_at)
    #[serde(default)]
    #[param(required = false)]
    ordering: Option<String>,
}

/// A startup as returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartupResponse {
    pub id: i32,
    pub name: String,
    pub website: Option<String>,
    pub location: String,
    pub industry: String,
    pub stage: Stage,
    pub description: String,
    /// Raw comma-separated tag string
    pub tags: String,
    /// Tags split on commas and trimmed
    pub tag_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<startup::Model> for StartupResponse {
    fn from(model: startup::Model) -> Self {
        let tag_list = model.tag_list();
        Self {
            id: model.id,
            name: model.name,
            website: model.website,
            location: model.location,
            industry: model.industry,
            stage: model.stage,
            description: model.description,
            tags: model.tags,
            tag_list,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Full representation used by create (POST) and replace (PUT).
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartupPayload {
    name: String,
    #[serde(default)]
    website: Option<String>,
    location: String,
    industry: String,
    /// Funding stage (default: idea)
    #[serde(default)]
    stage: Stage,
    description: String,
    /// Comma-separated tags (default: empty)
    #[serde(default)]
    tags: String,
}

/// Partial update (PATCH); absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartupPatch {
    #[serde(default)]
    name: Option<String>,
    /// Send `null` to clear the website
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    website: Option<Option<String>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    stage: Option<Stage>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<String>,
}

// Distinguishes an explicit `null` (Some(None)) from an absent field (None)
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required_text(field: &str, value: String, max_len: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(format!("{} may not be blank", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::InvalidRequest(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

/// Blank websites are stored as absent; anything else must be an absolute http(s) URL.
fn normalize_website(value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.chars().count() > WEBSITE_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "website must be at most {} characters",
            WEBSITE_MAX_LEN
        )));
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Ok(Some(raw.to_string()))
        }
        _ => Err(AppError::InvalidRequest(format!("website is not a valid URL: {}", raw))),
    }
}

fn description_text(value: String) -> Result<String, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidRequest("description may not be blank".to_string()));
    }
    Ok(value)
}

/// Case-insensitive `LIKE %term%` on `column`, with wildcards in `term` escaped.
fn icontains(column: startup::Column, term: &str) -> SimpleExpr {
    let escaped = term
        .to_lowercase()
        .replace('!', "!!")
        .replace('%', "!%")
        .replace('_', "!_");
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(format!("%{}%", escaped)).escape('!'))
}

fn matches_any_text_field(term: &str) -> Condition {
    Condition::any()
        .add(icontains(startup::Column::Name, term))
        .add(icontains(startup::Column::Description, term))
        .add(icontains(startup::Column::Tags, term))
}

fn apply_ordering(
    mut select: Select<startup::Entity>,
    ordering: Option<&str>,
) -> Select<startup::Entity> {
    let mut applied = false;
    for field in ordering.unwrap_or("").split(',').map(str::trim) {
        let (descending, name) = match field.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, field),
        };
        let column = match name {
            "name" => startup::Column::Name,
            "created_at" => startup::Column::CreatedAt,
            "updated_at" => startup::Column::UpdatedAt,
            // Unknown ordering fields are ignored
            _ => continue,
        };
        select = if descending {
            select.order_by_desc(column)
        } else {
            select.order_by_asc(column)
        };
        applied = true;
    }
    if !applied {
        select = select.order_by_desc(startup::Column::CreatedAt);
    }
    select.order_by_desc(startup::Column::Id)
}

fn filtered_startups(query: &StartupQuery) -> Select<startup::Entity> {
    let mut select = startup::Entity::find();

    if let Some(industry) = query.industry.as_deref().filter(|v| !v.is_empty()) {
        select = select.filter(startup::Column::Industry.eq(industry));
    }
    if let Some(location) = query.location.as_deref().filter(|v| !v.is_empty()) {
        select = select.filter(startup::Column::Location.eq(location));
    }
    if let Some(stage) = query.stage {
        select = select.filter(startup::Column::Stage.eq(stage));
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        select = select.filter(matches_any_text_field(q));
    }
    if let Some(search) = query.search.as_deref() {
        for term in search.split_whitespace() {
            select = select.filter(matches_any_text_field(term));
        }
    }

    apply_ordering(select, query.ordering.as_deref())
}

async fn find_startup(state: &AppState, id: i32) -> Result<startup::Model, AppError> {
    startup::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("startup {}", id)))
}

/// List startups with filtering, search, ordering and pagination
#[utoipa::path(
    get,
    path = "/startups/",
    params(StartupQuery, PageQuery),
    responses(
        (status = 200, description = "One page of startups", body = Page<StartupResponse>),
        (status = 400, description = "Malformed filter parameters"),
        (status = 404, description = "Page out of range")
    )
)]
#[tracing::instrument(skip(state, uri))]
pub async fn list_startups(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    AppQuery(query): AppQuery<StartupQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> Result<Json<Page<StartupResponse>>, AppError> {
    let paginator = filtered_startups(&query).paginate(&state.db, state.page_size);
    let count = paginator.num_items().await?;
    let number = page.checked_number(state.page_size, count)?;
    let models = paginator.fetch_page(number - 1).await?;

    let results = models.into_iter().map(StartupResponse::from).collect();
    Ok(Json(Page::build(&uri, number, state.page_size, count, results)?))
}

/// Fetch a single startup
#[utoipa::path(
    get,
    path = "/startups/{id}/",
    params(("id" = i32, Path, description = "Startup id")),
    responses(
        (status = 200, description = "The startup", body = StartupResponse),
        (status = 404, description = "No such startup")
    )
)]
pub async fn get_startup(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<StartupResponse>, AppError> {
    let model = find_startup(&state, id).await?;
    Ok(Json(model.into()))
}

/// Create a startup
#[utoipa::path(
    post,
    path = "/startups/",
    request_body = StartupPayload,
    responses(
        (status = 201, description = "Startup created", body = StartupResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Name already taken")
    )
)]
#[tracing::instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn create_startup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<StartupPayload>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let am = startup::ActiveModel {
        name: Set(required_text("name", payload.name, NAME_MAX_LEN)?),
        website: Set(normalize_website(payload.website)?),
        location: Set(required_text("location", payload.location, LOCATION_MAX_LEN)?),
        industry: Set(required_text("industry", payload.industry, INDUSTRY_MAX_LEN)?),
        stage: Set(payload.stage),
        description: Set(description_text(payload.description)?),
        tags: Set(payload.tags),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = am.insert(&state.db).await.map_err(|e| AppError::from_write(e, NAME_TAKEN))?;
    tracing::info!(id = model.id, "Created startup");
    Ok((StatusCode::CREATED, Json(StartupResponse::from(model))))
}

/// Replace a startup
#[utoipa::path(
    put,
    path = "/startups/{id}/",
    params(("id" = i32, Path, description = "Startup id")),
    request_body = StartupPayload,
    responses(
        (status = 200, description = "Startup replaced", body = StartupResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No such startup"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn replace_startup(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<StartupPayload>,
) -> Result<Json<StartupResponse>, AppError> {
    let existing = find_startup(&state, id).await?;

    let mut am: startup::ActiveModel = existing.into();
    am.name = Set(required_text("name", payload.name, NAME_MAX_LEN)?);
    am.website = Set(normalize_website(payload.website)?);
    am.location = Set(required_text("location", payload.location, LOCATION_MAX_LEN)?);
    am.industry = Set(required_text("industry", payload.industry, INDUSTRY_MAX_LEN)?);
    am.stage = Set(payload.stage);
    am.description = Set(description_text(payload.description)?);
    am.tags = Set(payload.tags);
    am.updated_at = Set(Utc::now());

    let model = am.update(&state.db).await.map_err(|e| AppError::from_write(e, NAME_TAKEN))?;
    Ok(Json(model.into()))
}

/// Partially update a startup
#[utoipa::path(
    patch,
    path = "/startups/{id}/",
    params(("id" = i32, Path, description = "Startup id")),
    request_body = StartupPatch,
    responses(
        (status = 200, description = "Startup updated", body = StartupResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No such startup"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn update_startup(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(patch): AppJson<StartupPatch>,
) -> Result<Json<StartupResponse>, AppError> {
    let existing = find_startup(&state, id).await?;

    let mut am: startup::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        am.name = Set(required_text("name", name, NAME_MAX_LEN)?);
    }
    if let Some(website) = patch.website {
        am.website = Set(normalize_website(website)?);
    }
    if let Some(location) = patch.location {
        am.location = Set(required_text("location", location, LOCATION_MAX_LEN)?);
    }
    if let Some(industry) = patch.industry {
        am.industry = Set(required_text("industry", industry, INDUSTRY_MAX_LEN)?);
    }
    if let Some(stage) = patch.stage {
        am.stage = Set(stage);
    }
    if let Some(description) = patch.description {
        am.description = Set(description_text(description)?);
    }
    if let Some(tags) = patch.tags {
        am.tags = Set(tags);
    }
    am.updated_at = Set(Utc::now());

    let model = am.update(&state.db).await.map_err(|e| AppError::from_write(e, NAME_TAKEN))?;
    Ok(Json(model.into()))
}

/// Delete a startup along with every watchlist entry and note referencing it
#[utoipa::path(
    delete,
    path = "/startups/{id}/",
    params(("id" = i32, Path, description = "Startup id")),
    responses(
        (status = 204, description = "Startup deleted"),
        (status = 404, description = "No such startup")
    )
)]
pub async fn delete_startup(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    let result = startup::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("startup {}", id)));
    }
    tracing::info!(id, "Deleted startup");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn website_normalization() {
        assert_eq!(normalize_website(None).unwrap(), None);
        assert_eq!(normalize_website(Some("  ".to_string())).unwrap(), None);
        assert_eq!(
            normalize_website(Some("https://acme.io".to_string())).unwrap().as_deref(),
            Some("https://acme.io")
        );
        assert!(normalize_website(Some("acme.io".to_string())).is_err());
        assert!(normalize_website(Some("ftp://acme.io".to_string())).is_err());
    }

    #[test]
    fn required_text_trims_and_checks_length() {
        assert_eq!(required_text("name", "  Acme ".to_string(), 10).unwrap(), "Acme");
        assert!(required_text("name", "   ".to_string(), 10).is_err());
        assert!(required_text("name", "x".repeat(11), 10).is_err());
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let absent: StartupPatch = serde_json::from_str("{}").unwrap();
        assert!(absent.website.is_none());
        let cleared: StartupPatch = serde_json::from_str(r#"{"website": null}"#).unwrap();
        assert_eq!(cleared.website, Some(None));
        let set: StartupPatch = serde_json::from_str(r#"{"website": "https://a.io"}"#).unwrap();
        assert_eq!(set.website, Some(Some("https://a.io".to_string())));
    }
}
