use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod extract;
pub mod logging;
pub mod pagination;
pub mod routes;

use crate::config::AppConfig;

/// Shared handler state: the connection pool plus list page size.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub page_size: u64,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            page_size: config.page_size,
        }
    }
}

/// Health check endpoint, pings the database
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String),
        (status = 500, description = "Database unreachable", body = String)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "Service is healthy"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database unreachable")
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Startup Scout API",
        version = "0.1.0",
        description = "Track startups, keep a personal watchlist and notes, \
                       and analyse or export the watchlist."
    ),
    paths(
        health_check,
        routes::startups::list_startups,
        routes::startups::get_startup,
        routes::startups::create_startup,
        routes::startups::replace_startup,
        routes::startups::update_startup,
        routes::startups::delete_startup,
        routes::watchlist::list_watchlist,
        routes::watchlist::get_watchlist_item,
        routes::watchlist::add_to_watchlist,
        routes::watchlist::replace_watchlist_item,
        routes::watchlist::update_watchlist_item,
        routes::watchlist::remove_from_watchlist,
        routes::notes::list_notes,
        routes::notes::get_note,
        routes::notes::create_note,
        routes::notes::replace_note,
        routes::notes::update_note,
        routes::notes::delete_note,
        routes::analytics::analytics_dashboard,
        routes::analytics::export_watchlist
    ),
    components(schemas(
        entities::Stage,
        routes::StartupResponse,
        routes::StartupPayload,
        routes::StartupPatch,
        routes::WatchlistItemResponse,
        routes::WatchlistPayload,
        routes::WatchlistPatch,
        routes::NoteResponse,
        routes::NotePayload,
        routes::NotePatch,
        analytics::AnalyticsDashboard,
        analytics::UserStats,
        analytics::UserAnalytics,
        analytics::GlobalAnalytics,
        analytics::IndustryCount,
        analytics::LocationCount,
        analytics::StageCount
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Create the application with all routes and middleware
pub fn create_app(db: DatabaseConnection, config: &AppConfig) -> Router {
    let state = AppState::new(db, config);

    // --- Define API routes separately ---
    let api_routes: Router = Router::new()
        .route("/health", get(health_check))
        .route(
            "/startups/",
            get(routes::list_startups).post(routes::create_startup),
        )
        .route(
            "/startups/{id}/",
            get(routes::get_startup)
                .put(routes::replace_startup)
                .patch(routes::update_startup)
                .delete(routes::delete_startup),
        )
        .route(
            "/watchlist/",
            get(routes::list_watchlist).post(routes::add_to_watchlist),
        )
        .route(
            "/watchlist/{id}/",
            get(routes::get_watchlist_item)
                .put(routes::replace_watchlist_item)
                .patch(routes::update_watchlist_item)
                .delete(routes::remove_from_watchlist),
        )
        .route("/notes/", get(routes::list_notes).post(routes::create_note))
        .route(
            "/notes/{id}/",
            get(routes::get_note)
                .put(routes::replace_note)
                .patch(routes::update_note)
                .delete(routes::delete_note),
        )
        .route("/analytics/dashboard/", get(routes::analytics_dashboard))
        .route("/analytics/export/watchlist/", get(routes::export_watchlist))
        .with_state(state);

    // --- Rate limiting is only applied when configured ---
    let api_routes = match config.rate_limit {
        Some(limit) => {
            let governor_conf = GovernorConfigBuilder::default()
                .key_extractor(SmartIpKeyExtractor)
                .period(Duration::from_secs(limit.period_secs.get()) / limit.burst.get())
                .burst_size(limit.burst.get())
                .finish();
            match governor_conf {
                Some(conf) => api_routes.layer(GovernorLayer { config: Arc::new(conf) }),
                None => {
                    tracing::warn!("Invalid rate limit settings, continuing without rate limiting");
                    api_routes
                }
            }
        }
        None => api_routes,
    };

    let docs_router = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    // --- Build the final application router ---
    Router::new()
        .merge(api_routes) // Add (possibly rate-limited) API routes
        .merge(docs_router) // Add documentation routes (not rate-limited)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
