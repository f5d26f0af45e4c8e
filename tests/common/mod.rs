#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt; // For Response body handling
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::Value;
use startup_scout::config::AppConfig;
use startup_scout::entities::{note, startup, user, watchlist_item, Stage};
use std::sync::Once;
use tower::ServiceExt; // For oneshot

// For initializing tracing once
static INIT: Once = Once::new();

/// Page size used by every test app, small enough to exercise pagination.
pub const PAGE_SIZE: u64 = 5;

pub struct TestApp {
    pub app: Router,
    pub db: DatabaseConnection,
}

/// Fresh in-memory database, migrated, behind the full router (no rate limiting).
pub async fn spawn_app() -> TestApp {
    INIT.call_once(|| {
        // Initialize tracing for tests - only once
        let _ = tracing_subscriber::fmt::try_init();
    });

    // One connection: every connection to sqlite::memory: is its own database
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    startup_scout::db::migrate(&db).await.unwrap();

    let config = AppConfig {
        page_size: PAGE_SIZE,
        ..AppConfig::default()
    };
    let app = startup_scout::create_app(db.clone(), &config);
    TestApp { app, db }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and decodes the body as JSON (`Value::Null` when empty).
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(build_request(method, uri, token, body)).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, token, Some(body)).await
    }

    pub async fn create_user(&self, username: &str) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            api_token: Set(token_for(username)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    pub async fn create_startup(
        &self,
        name: &str,
        industry: &str,
        location: &str,
        stage: Stage,
        tags: &str,
    ) -> startup::Model {
        let now = Utc::now();
        startup::ActiveModel {
            name: Set(name.to_string()),
            website: Set(None),
            location: Set(location.to_string()),
            industry: Set(industry.to_string()),
            stage: Set(stage),
            description: Set(format!("{} does things", name)),
            tags: Set(tags.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    pub async fn watch(
        &self,
        user_id: i32,
        startup_id: i32,
        created_at: DateTime<Utc>,
    ) -> watchlist_item::Model {
        watchlist_item::ActiveModel {
            user_id: Set(user_id),
            startup_id: Set(startup_id),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    pub async fn note(&self, user_id: i32, startup_id: i32, content: &str) -> note::Model {
        note::ActiveModel {
            user_id: Set(user_id),
            startup_id: Set(startup_id),
            content: Set(content.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }
}

pub fn token_for(username: &str) -> String {
    format!("token-{}", username)
}

pub fn build_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
