mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{spawn_app, token_for};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use startup_scout::entities::{watchlist_item, Stage, WatchlistItem};

#[tokio::test]
async fn test_watchlist_requires_authentication() {
    let app = spawn_app().await;
    let (status, _) = app.get("/watchlist/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post("/watchlist/", None, json!({"startup": 1})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_and_list_watchlist() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let token = token_for("alice");
    let startup = app.create_startup("Acme", "Fintech", "Berlin", Stage::Seed, "").await;

    let (status, created) = app
        .post("/watchlist/", Some(&token), json!({"startup": startup.id}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user"], alice.id);
    assert_eq!(created["startup"], startup.id);
    assert_eq!(created["startup_name"], "Acme");
    assert!(created["created_at"].is_string());

    let (status, page) = app.get("/watchlist/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["next"], json!(null));
    assert_eq!(page["results"][0]["id"], created["id"]);
}

#[tokio::test]
async fn test_duplicate_watchlist_entry_conflicts() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let token = token_for("alice");
    let startup = app.create_startup("Acme", "Fintech", "Berlin", Stage::Seed, "").await;

    let (status, first) = app
        .post("/watchlist/", Some(&token), json!({"startup": startup.id}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/watchlist/", Some(&token), json!({"startup": startup.id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already"));

    // The original row is untouched
    let rows = WatchlistItem::find()
        .filter(watchlist_item::Column::UserId.eq(alice.id))
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(json!(rows[0].id), first["id"]);
}

#[tokio::test]
async fn test_same_startup_for_different_users() {
    let app = spawn_app().await;
    app.create_user("alice").await;
    app.create_user("bob").await;
    let startup = app.create_startup("Acme", "Fintech", "Berlin", Stage::Seed, "").await;

    let (status, _) = app
        .post("/watchlist/", Some(&token_for("alice")), json!({"startup": startup.id}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .post("/watchlist/", Some(&token_for("bob")), json!({"startup": startup.id}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_startup_is_rejected() {
    let app = spawn_app().await;
    app.create_user("alice").await;
    let (status, body) = app
        .post("/watchlist/", Some(&token_for("alice")), json!({"startup": 999}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = spawn_app().await;
    app.create_user("alice").await;
    let token = token_for("alice");

    let (status, body) = app.post("/watchlist/", Some(&token), json!({"startup": "acme"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.post("/watchlist/", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/watchlist/?startup=acme", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_other_users_items_are_invisible() {
    let app = spawn_app().await;
    app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let startup = app.create_startup("Acme", "Fintech", "Berlin", Stage::Seed, "").await;
    let item = app.watch(bob.id, startup.id, Utc::now()).await;
    let alice = token_for("alice");
    let uri = format!("/watchlist/{}/", item.id);

    let (_, page) = app.get("/watchlist/", Some(&alice)).await;
    assert_eq!(page["count"], 0);

    let (status, _) = app.get(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.json(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bob still has it
    let (status, body) = app.get(&uri, Some(&token_for("bob"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["startup_name"], "Acme");
}

#[tokio::test]
async fn test_filter_by_startup_and_ordering() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let token = token_for("alice");
    let now = Utc::now();
    let a = app.create_startup("A", "AI", "Berlin", Stage::Seed, "").await;
    let b = app.create_startup("B", "AI", "Berlin", Stage::Seed, "").await;
    app.watch(alice.id, a.id, now - Duration::hours(2)).await;
    app.watch(alice.id, b.id, now).await;

    let (_, page) = app.get("/watchlist/", Some(&token)).await;
    assert_eq!(page["results"][0]["startup_name"], "B");
    assert_eq!(page["results"][1]["startup_name"], "A");

    let (_, filtered) = app.get(&format!("/watchlist/?startup={}", a.id), Some(&token)).await;
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["results"][0]["startup"], a.id);
}

#[tokio::test]
async fn test_update_and_delete_item() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let token = token_for("alice");
    let a = app.create_startup("A", "AI", "Berlin", Stage::Seed, "").await;
    let b = app.create_startup("B", "AI", "Berlin", Stage::Seed, "").await;
    let c = app.create_startup("C", "AI", "Berlin", Stage::Seed, "").await;
    let item = app.watch(alice.id, a.id, Utc::now()).await;
    app.watch(alice.id, c.id, Utc::now()).await;
    let uri = format!("/watchlist/{}/", item.id);

    let (status, body) = app
        .json(Method::PATCH, &uri, Some(&token), Some(json!({"startup": b.id})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["startup_name"], "B");

    // Moving onto a startup already on the watchlist violates uniqueness
    let (status, _) = app
        .json(Method::PUT, &uri, Some(&token), Some(json!({"startup": c.id})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.json(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_startup_cascades() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let startup = app.create_startup("Gone", "AI", "Berlin", Stage::Seed, "").await;
    app.watch(alice.id, startup.id, Utc::now()).await;
    app.note(alice.id, startup.id, "soon gone").await;

    let (status, _) = app
        .json(Method::DELETE, &format!("/startups/{}/", startup.id), None, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let remaining = WatchlistItem::find().count(&app.db).await.unwrap();
    assert_eq!(remaining, 0);
    let (_, notes) = app.get("/notes/", Some(&token_for("alice"))).await;
    assert_eq!(notes["count"], 0);
}

#[tokio::test]
async fn test_watchlist_pagination() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let token = token_for("alice");
    let now = Utc::now();
    for i in 0..(common::PAGE_SIZE + 2) {
        let startup = app.create_startup(&format!("S{}", i), "AI", "Berlin", Stage::Seed, "").await;
        app.watch(alice.id, startup.id, now - Duration::minutes(i as i64)).await;
    }

    let (_, first) = app.get("/watchlist/", Some(&token)).await;
    assert_eq!(first["count"], common::PAGE_SIZE + 2);
    assert_eq!(first["results"].as_array().unwrap().len() as u64, common::PAGE_SIZE);
    assert_eq!(first["next"], "/watchlist/?page=2");
    assert_eq!(first["previous"], json!(null));

    let (_, second) = app.get("/watchlist/?page=2", Some(&token)).await;
    assert_eq!(second["results"].as_array().unwrap().len(), 2);
    assert_eq!(second["next"], json!(null));
    assert_eq!(second["previous"], "/watchlist/");

    let (status, _) = app.get("/watchlist/?page=9", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/watchlist/?page=18446744073709551615", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
