//! Router-level tests over the in-memory catalog and KV store.

mod support;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use manga_core::Role;
use manga_test_utils::fixtures::seed_catalog;
use serde_json::json;
use support::test_app;
use tower::ServiceExt;

type TestResult = Result<(), String>;

// ============================================================================
// HEALTH AND FALLBACK
// ============================================================================

#[tokio::test]
async fn test_health_endpoints_are_public() -> TestResult {
    let app = test_app()?;

    let ping = app.get("/health/ping").await?;
    assert_eq!(ping.status, StatusCode::OK);

    let ready = app.get("/health/ready").await?;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_cors_preflight_passes_through_tracing() -> TestResult {
    let app = test_app()?;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/manga")
        .header(header::ORIGIN, "https://reader.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .map_err(|e| e.to_string())?;

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| format!("Request failed: {:?}", e))?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_structured_404() -> TestResult {
    let app = test_app()?;
    let response = app.get("/api/v1/nothing-here").await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), Some("NOT_FOUND"));
    Ok(())
}

// ============================================================================
// CACHED READS
// ============================================================================

#[tokio::test]
async fn test_manga_read_is_cached() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    let uri = format!("/api/v1/manga/{}", seeded.manga.id);

    let first = app.get(&uri).await?;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.cache.as_deref(), Some("MISS"));
    assert_eq!(first.body["title"], "Blue Harbor");

    let second = app.get(&uri).await?;
    assert_eq!(second.cache.as_deref(), Some("HIT"));
    assert_eq!(second.body, first.body);
    Ok(())
}

#[tokio::test]
async fn test_missing_manga() -> TestResult {
    let app = test_app()?;
    let response = app.get("/api/v1/manga/404").await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), Some("MANGA_NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn test_reads_survive_cache_outage() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    app.kv.set_unavailable(true);

    let manga = app.get(&format!("/api/v1/manga/{}", seeded.manga.id)).await?;
    assert_eq!(manga.status, StatusCode::OK);
    assert_eq!(manga.cache.as_deref(), Some("MISS"));

    let pages = app
        .get(&format!("/api/v1/chapters/{}/pages", seeded.chapters[0].id))
        .await?;
    assert_eq!(pages.status, StatusCode::OK);
    assert_eq!(pages.body.as_array().map(Vec::len), Some(3));

    let popular = app.get("/api/v1/manga/popular").await?;
    assert_eq!(popular.status, StatusCode::OK);
    assert_eq!(popular.body, json!([]));

    let ready = app.get("/health/ready").await?;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["status"], "degraded");
    Ok(())
}

#[tokio::test]
async fn test_filtered_list_bypasses_cache() -> TestResult {
    let app = test_app()?;
    seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;

    let filtered = app.get("/api/v1/manga?title=blue&genres=action").await?;
    assert_eq!(filtered.status, StatusCode::OK);
    assert_eq!(filtered.cache.as_deref(), Some("MISS"));
    assert_eq!(filtered.body.as_array().map(Vec::len), Some(1));

    let again = app.get("/api/v1/manga?title=blue&genres=action").await?;
    assert_eq!(again.cache.as_deref(), Some("MISS"));

    let none = app.get("/api/v1/manga?genres=romance").await?;
    assert_eq!(none.body, json!([]));
    Ok(())
}

// ============================================================================
// ADMIN MUTATIONS
// ============================================================================

#[tokio::test]
async fn test_admin_gate_on_manga_create() -> TestResult {
    let app = test_app()?;
    let body = json!({ "title": "Night Market", "genres": ["slice-of-life"] });

    let anonymous = app
        .send(Method::POST, "/api/v1/manga", None, Some(body.clone()))
        .await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let (_, reader) = app.user_with_role("reader", Role::User).await?;
    let denied = app
        .send(Method::POST, "/api/v1/manga", Some(&reader), Some(body.clone()))
        .await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.error_code(), Some("FORBIDDEN"));

    let admin = app.admin_token().await?;
    let created = app
        .send(Method::POST, "/api/v1/manga", Some(&admin), Some(body))
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["title"], "Night Market");
    Ok(())
}

#[tokio::test]
async fn test_blank_title_is_validation_error() -> TestResult {
    let app = test_app()?;
    let admin = app.admin_token().await?;
    let response = app
        .send(
            Method::POST,
            "/api/v1/manga",
            Some(&admin),
            Some(json!({ "title": "   " })),
        )
        .await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
    Ok(())
}

#[tokio::test]
async fn test_update_invalidates_cached_manga_and_list() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    let admin = app.admin_token().await?;
    let uri = format!("/api/v1/manga/{}", seeded.manga.id);

    app.get(&uri).await?;
    app.get("/api/v1/manga").await?;
    assert_eq!(app.get("/api/v1/manga").await?.cache.as_deref(), Some("HIT"));

    let updated = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "title": "Red Harbor" })),
        )
        .await?;
    assert_eq!(updated.status, StatusCode::OK);

    let item = app.get(&uri).await?;
    assert_eq!(item.cache.as_deref(), Some("MISS"));
    assert_eq!(item.body["title"], "Red Harbor");

    let list = app.get("/api/v1/manga").await?;
    assert_eq!(list.cache.as_deref(), Some("MISS"));
    assert_eq!(list.body[0]["title"], "Red Harbor");
    Ok(())
}

#[tokio::test]
async fn test_chapter_lifecycle_refreshes_listing() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    let admin = app.admin_token().await?;
    let listing = format!("/api/v1/manga/{}/chapters", seeded.manga.id);

    assert_eq!(app.get(&listing).await?.body.as_array().map(Vec::len), Some(2));

    let created = app
        .send(
            Method::POST,
            "/api/v1/chapters",
            Some(&admin),
            Some(json!({ "manga_id": seeded.manga.id, "number": 3.0, "title": "Tide" })),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    let chapter_id = created.body["id"].as_i64().ok_or("missing chapter id")?;

    let after_create = app.get(&listing).await?;
    assert_eq!(after_create.cache.as_deref(), Some("MISS"));
    assert_eq!(after_create.body.as_array().map(Vec::len), Some(3));

    let deleted = app
        .send(
            Method::DELETE,
            &format!("/api/v1/chapters/{}", chapter_id),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&listing).await?.body.as_array().map(Vec::len), Some(2));

    let orphan = app
        .send(
            Method::POST,
            "/api/v1/chapters",
            Some(&admin),
            Some(json!({ "manga_id": 999, "number": 1.0, "title": "Lost" })),
        )
        .await?;
    assert_eq!(orphan.status, StatusCode::NOT_FOUND);
    assert_eq!(orphan.error_code(), Some("MANGA_NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn test_genre_endpoints() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    let admin = app.admin_token().await?;
    let genres = format!("/api/v1/manga/{}/genres", seeded.manga.id);

    let added = app
        .send(Method::POST, &genres, Some(&admin), Some(json!({ "genre": "drama" })))
        .await?;
    assert_eq!(added.status, StatusCode::NO_CONTENT);
    let listed = app.get(&genres).await?;
    assert!(listed
        .body
        .as_array()
        .is_some_and(|g| g.contains(&json!("drama"))));

    let removed = app
        .send(Method::DELETE, &format!("{}/drama", genres), Some(&admin), None)
        .await?;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let listed = app.get(&genres).await?;
    assert!(listed
        .body
        .as_array()
        .is_some_and(|g| !g.contains(&json!("drama"))));
    Ok(())
}

// ============================================================================
// LEADERBOARDS
// ============================================================================

#[tokio::test]
async fn test_views_feed_popular_and_reset_clears_them() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    let uri = format!("/api/v1/manga/{}", seeded.manga.id);
    for _ in 0..3 {
        app.get(&uri).await?;
    }

    let popular = app.get("/api/v1/manga/popular?period=daily&limit=5").await?;
    assert_eq!(popular.status, StatusCode::OK);
    assert_eq!(popular.cache.as_deref(), Some("MISS"));
    assert_eq!(popular.body[0]["manga_id"], json!(seeded.manga.id));
    assert_eq!(popular.body[0]["views"], json!(3));

    let cached = app.get("/api/v1/manga/popular?period=daily&limit=5").await?;
    assert_eq!(cached.cache.as_deref(), Some("HIT"));

    let views = app
        .get(&format!("/api/v1/analytics/manga/{}/views", seeded.manga.id))
        .await?;
    assert_eq!(views.body["views"], json!(3));

    let admin = app.admin_token().await?;
    let reset = app
        .send(Method::POST, "/api/v1/analytics/reset/daily", Some(&admin), None)
        .await?;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["period"], "daily");

    let after = app.get("/api/v1/manga/popular?period=daily&limit=5").await?;
    assert_eq!(after.cache.as_deref(), Some("MISS"));
    assert_eq!(after.body, json!([]));

    let weekly = app.get("/api/v1/analytics/manga/top?period=weekly").await?;
    assert_eq!(weekly.body[0]["views"], json!(3));
    Ok(())
}

#[tokio::test]
async fn test_chapter_views_rank_chapters() -> TestResult {
    let app = test_app()?;
    let seeded = seed_catalog(&app.catalog).await.map_err(|e| e.to_string())?;
    let second = &seeded.chapters[1];
    let first_read = app.get(&format!("/api/v1/chapters/{}", second.id)).await?;
    assert_eq!(first_read.body["id"], json!(second.id));
    assert_eq!(first_read.body["views"], json!(1));
    let second_read = app.get(&format!("/api/v1/chapters/{}", second.id)).await?;
    assert_eq!(second_read.body["views"], json!(2));
    app.get(&format!("/api/v1/chapters/{}", seeded.chapters[0].id))
        .await?;

    let top = app.get("/api/v1/analytics/chapters/top").await?;
    assert_eq!(top.status, StatusCode::OK);
    assert_eq!(top.body[0]["chapter_id"], json!(second.id));
    assert_eq!(top.body[0]["views"], json!(2));
    Ok(())
}

#[tokio::test]
async fn test_unknown_period_is_bad_request() -> TestResult {
    let app = test_app()?;
    let response = app.get("/api/v1/manga/popular?period=yearly").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), Some("INVALID_INPUT"));
    Ok(())
}

#[tokio::test]
async fn test_reset_requires_admin() -> TestResult {
    let app = test_app()?;
    let (_, reader) = app.user_with_role("reader", Role::User).await?;
    let response = app
        .send(Method::POST, "/api/v1/analytics/reset/daily", Some(&reader), None)
        .await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let stats = app.send(Method::GET, "/api/v1/analytics/stats", None, None).await?;
    assert_eq!(stats.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

// ============================================================================
// ACCOUNTS
// ============================================================================

#[tokio::test]
async fn test_register_login_refresh_me() -> TestResult {
    let app = test_app()?;
    let registration = json!({
        "username": "walker",
        "email": "walker@example.com",
        "password": "correct-horse",
    });

    let registered = app
        .send(Method::POST, "/api/v1/users/register", None, Some(registration.clone()))
        .await?;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["user"]["role"], "user");
    assert!(registered.body["user"].get("password_hash").is_none());

    let duplicate = app
        .send(Method::POST, "/api/v1/users/register", None, Some(registration))
        .await?;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let wrong = app
        .send(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "username": "walker", "password": "nope-nope" })),
        )
        .await?;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.error_code(), Some("INVALID_CREDENTIALS"));

    let login = app
        .send(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "username": "walker@example.com", "password": "correct-horse" })),
        )
        .await?;
    assert_eq!(login.status, StatusCode::OK);
    let access = login.body["access_token"].as_str().ok_or("no access token")?;
    let refresh = login.body["refresh_token"].as_str().ok_or("no refresh token")?;

    let me = app.send(Method::GET, "/api/v1/users/me", Some(access), None).await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "walker");

    let refreshed = app
        .send(
            Method::POST,
            "/api/v1/users/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert!(refreshed.body["access_token"].is_string());

    // The refresh token cannot be used as a bearer token.
    let misuse = app.send(Method::GET, "/api/v1/users/me", Some(refresh), None).await?;
    assert_eq!(misuse.status, StatusCode::UNAUTHORIZED);
    assert_eq!(misuse.error_code(), Some("JWT_INVALID"));
    Ok(())
}

#[tokio::test]
async fn test_profile_update_and_password_change() -> TestResult {
    let app = test_app()?;
    let (_, token) = app.user_with_role("mover", Role::User).await?;

    let updated = app
        .send(
            Method::PUT,
            "/api/v1/users/me",
            Some(&token),
            Some(json!({ "username": "mover", "email": "mover@new.example.com" })),
        )
        .await?;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["email"], "mover@new.example.com");

    let changed = app
        .send(
            Method::PUT,
            "/api/v1/users/me/password",
            Some(&token),
            Some(json!({ "old_password": "correct-horse", "new_password": "another-horse" })),
        )
        .await?;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    let login = app
        .send(
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({ "username": "mover", "password": "another-horse" })),
        )
        .await?;
    assert_eq!(login.status, StatusCode::OK);

    let logout = app
        .send(Method::POST, "/api/v1/users/logout", Some(&token), None)
        .await?;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    Ok(())
}
