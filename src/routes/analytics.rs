use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::analytics::{self, AnalyticsDashboard};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;

/// Analytics over the caller's watchlist and notes, plus global top lists
#[utoipa::path(
    get,
    path = "/analytics/dashboard/",
    responses(
        (status = 200, description = "Dashboard computed", body = AnalyticsDashboard),
        (status = 401, description = "Missing or invalid API token")
    ),
    security(("bearer" = [])),
    description = "Counts the caller's watchlist entries and noted startups, breaks the \
                   watchlist down by industry, location and stage, and lists the ten most \
                   common industries and locations across all startups. Every breakdown is \
                   sorted by count, largest first."
)]
#[tracing::instrument(skip(state, user), fields(user_id = user.id()))]
pub async fn analytics_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AnalyticsDashboard>, AppError> {
    let dashboard = analytics::dashboard(&state.db, user.id()).await?;
    Ok(Json(dashboard))
}

/// Download the caller's watchlist as CSV
#[utoipa::path(
    get,
    path = "/analytics/export/watchlist/",
    responses(
        (
            status = 200,
            description = "CSV attachment, header row first",
            content_type = "text/csv",
            body = String
        ),
        (status = 401, description = "Missing or invalid API token")
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, user), fields(user_id = user.id()))]
pub async fn export_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let rows = analytics::watchlist_rows(&state.db, user.id()).await?;
    let body = analytics::render_watchlist_csv(&rows)?;
    tracing::info!(rows = rows.len(), "Exported watchlist");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        analytics::export_filename(user.username(), user.id())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
