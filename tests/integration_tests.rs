use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookit::config::AppConfig;
use bookit::db;
use bookit::services::accounts;
use bookit::state::AppState;

// ── Helpers ──

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-password";

fn test_config() -> AppConfig {
    AppConfig {
        port: 8000,
        database_url: ":memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        access_token_minutes: 30,
        refresh_token_days: 7,
        argon2_memory_kib: 64,
        argon2_iterations: 1,
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        admin_name: "Admin User".to_string(),
    }
}

fn test_app() -> Router {
    let config = test_config();
    let mut conn = db::init_db(":memory:").unwrap();
    accounts::ensure_admin(&mut conn, &config).unwrap();
    bookit::app(Arc::new(AppState::new(conn, config)))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

struct Session {
    id: String,
    token: String,
}

async fn login(app: &Router, email: &str, password: &str) -> Session {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    Session {
        id: body["user"]["id"].as_str().unwrap().to_string(),
        token: body["tokens"]["access_token"].as_str().unwrap().to_string(),
    }
}

async fn sign_up(app: &Router, name: &str, email: &str) -> Session {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    login(app, email, "password123").await
}

async fn admin(app: &Router) -> Session {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

async fn create_service(app: &Router, admin: &Session, title: &str, price: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/services",
        Some(&admin.token),
        Some(json!({
            "title": title,
            "description": "A relaxing session",
            "price": price,
            "duration_minutes": 60,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

/// Whole hours from now, so intervals line up exactly.
fn hours_ahead(h: i64) -> DateTime<Utc> {
    Utc::now().duration_trunc(Duration::hours(1)).unwrap() + Duration::days(2) + Duration::hours(h)
}

async fn book(
    app: &Router,
    session: &Session,
    service_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/bookings",
        Some(&session.token),
        Some(json!({
            "service_id": service_id,
            "start_time": start.to_rfc3339(),
            "end_time": end.to_rfc3339(),
        })),
    )
    .await
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// ── Auth & Users ──

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = test_app();
    let alice = sign_up(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(&app, "GET", "/users/me", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "user");
    assert!(body.get("password_hash").is_none());

    let (status, body) = send(
        &app,
        "PATCH",
        "/users/me",
        Some(&alice.token),
        Some(json!({ "name": "Alice Smith" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice Smith");
    assert_eq!(body["email"], "alice@example.com");

    let (status, body) = send(&app, "GET", &format!("/users/{}", alice.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice Smith");

    let (status, _) = send(&app, "GET", "/users/email/alice@example.com", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/users/email/nobody@example.com", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = test_app();
    sign_up(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Other", "email": "alice@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_bad_credentials_are_unauthenticated() {
    let app = test_app();
    sign_up(&app, "Alice", "alice@example.com").await;

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "alice@example.com", "password": "wrong-password" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn test_protected_routes_require_access_token() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/users/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    sign_up(&app, "Alice", "alice@example.com").await;
    let (_, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "password123" })),
    )
    .await;
    let refresh = body["tokens"]["refresh_token"].as_str().unwrap();
    let (status, _) = send(&app, "GET", "/users/me", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let app = test_app();
    sign_up(&app, "Alice", "alice@example.com").await;
    let (_, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "password123" })),
    )
    .await;
    let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refresh_token"], refresh.as_str());
    assert_eq!(body["token_type"], "bearer");

    let access = body["access_token"].as_str().unwrap();
    let (status, _) = send(&app, "GET", "/users/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/auth/logout", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
}

// ── Services ──

#[tokio::test]
async fn test_catalog_writes_are_admin_only() {
    let app = test_app();
    let alice = sign_up(&app, "Alice", "alice@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/services",
        Some(&alice.token),
        Some(json!({
            "title": "Massage",
            "description": "Deep tissue",
            "price": "50.00",
            "duration_minutes": 60,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = admin(&app).await;
    let id = create_service(&app, &admin, "Massage", "50.00").await;

    let (status, body) = send(&app, "GET", &format!("/services/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], "50.00");
    assert_eq!(body["is_active"], true);

    let (status, _) = send(&app, "DELETE", &format!("/services/{id}"), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &format!("/services/{id}"), Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/services/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_service_search_filters() {
    let app = test_app();
    let admin = admin(&app).await;
    create_service(&app, &admin, "Deep Tissue Massage", "80.00").await;
    create_service(&app, &admin, "Haircut", "25.00").await;
    let retired = create_service(&app, &admin, "Hot Stone Massage", "95.00").await;
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/services/{retired}"),
        Some(&admin.token),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/services?q=massage", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/services?price_max=50", None, None).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Haircut"]);

    let (_, body) = send(&app, "GET", "/services?active=false", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Hot Stone Massage");

    let (_, body) = send(&app, "GET", "/services?limit=1", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_huge_price_filter_is_rejected_and_service_stays_up() {
    let app = test_app();
    let admin = admin(&app).await;
    create_service(&app, &admin, "Haircut", "25.00").await;

    let uri = "/services?price_min=79228162514264337593543950335";
    let (status, _) = send(&app, "GET", uri, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/services",
        Some(&admin.token),
        Some(json!({
            "title": "Gold plated",
            "description": "Too expensive",
            "price": "79228162514264337593543950335",
            "duration_minutes": 60,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/services", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

// ── Bookings ──

#[tokio::test]
async fn test_overlapping_booking_conflicts() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;
    let alice = sign_up(&app, "Alice", "alice@example.com").await;
    let bob = sign_up(&app, "Bob", "bob@example.com").await;

    let (status, body) = book(&app, &alice, &service, hours_ahead(10), hours_ahead(11)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["user_id"], alice.id.as_str());

    let (status, body) = book(&app, &bob, &service, hours_ahead(10), hours_ahead(12)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "booking conflicts with existing booking");

    let (status, _) = book(&app, &bob, &service, hours_ahead(11), hours_ahead(12)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_input_rules() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;
    let alice = sign_up(&app, "Alice", "alice@example.com").await;

    let past = Utc::now() - Duration::days(1);
    let (status, body) = book(&app, &alice, &service, past, past + Duration::hours(1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cannot book in the past");

    let (status, _) = book(&app, &alice, &service, hours_ahead(3), hours_ahead(2)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4().to_string();
    let (status, _) = book(&app, &alice, &missing, hours_ahead(2), hours_ahead(3)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/bookings?from=yesterday", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bookings_are_private_to_owner() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;
    let alice = sign_up(&app, "Alice", "alice@example.com").await;
    let bob = sign_up(&app, "Bob", "bob@example.com").await;

    let (_, booking) = book(&app, &alice, &service, hours_ahead(1), hours_ahead(2)).await;
    let uri = format!("/bookings/{}", booking["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = send(&app, "GET", "/bookings", Some(&bob.token), None).await;
    assert!(mine.as_array().unwrap().is_empty());
    let (_, all) = send(&app, "GET", "/bookings", Some(&admin.token), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_then_reschedule_rejected() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;
    let alice = sign_up(&app, "Alice", "alice@example.com").await;

    let (_, booking) = book(&app, &alice, &service, hours_ahead(1), hours_ahead(2)).await;
    let uri = format!("/bookings/{}", booking["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice.token),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice.token),
        Some(json!({ "start_time": hours_ahead(4).to_rfc3339(), "end_time": hours_ahead(5).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cannot reschedule completed or cancelled booking");

    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice.token),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the cancelled slot is free again
    let (status, _) = book(&app, &alice, &service, hours_ahead(1), hours_ahead(2)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_only_admin_confirms() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;
    let alice = sign_up(&app, "Alice", "alice@example.com").await;

    let (_, booking) = book(&app, &alice, &service, hours_ahead(1), hours_ahead(2)).await;
    let uri = format!("/bookings/{}", booking["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice.token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&admin.token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, _) = send(&app, "DELETE", &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Reviews ──

#[tokio::test]
async fn test_review_flow_and_stats() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;
    let alice = sign_up(&app, "Alice", "alice@example.com").await;
    let bob = sign_up(&app, "Bob", "bob@example.com").await;

    let (_, booking) = book(&app, &alice, &service, hours_ahead(1), hours_ahead(2)).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let review = json!({ "booking_id": booking_id, "rating": 4, "comment": "Lovely" });

    let (status, _) = send(&app, "POST", "/reviews", Some(&alice.token), Some(review.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/bookings/{booking_id}"),
        Some(&admin.token),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/reviews", Some(&bob.token), Some(review.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) =
        send(&app, "POST", "/reviews", Some(&alice.token), Some(review.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["rating"], 4);

    let (status, _) = send(&app, "POST", "/reviews", Some(&alice.token), Some(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/reviews/services/{service}/stats"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total_reviews": 1, "average_rating": 4.0 }));

    let (_, listed) = send(
        &app,
        "GET",
        &format!("/reviews/services/{service}/reviews"),
        None,
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let review_uri = format!("/reviews/{}", created["id"].as_str().unwrap());
    let (status, _) = send(
        &app,
        "PATCH",
        &review_uri,
        Some(&bob.token),
        Some(json!({ "rating": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(
        &app,
        "PATCH",
        &review_uri,
        Some(&alice.token),
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 5);
    assert_eq!(body["comment"], "Lovely");

    let (status, _) = send(&app, "DELETE", &review_uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &review_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_for_unreviewed_service() {
    let app = test_app();
    let admin = admin(&app).await;
    let service = create_service(&app, &admin, "Massage", "50.00").await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/reviews/services/{service}/stats"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total_reviews": 0, "average_rating": 0.0 }));
}
