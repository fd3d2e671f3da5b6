//! Integration tests for the rate-limited club endpoints.

mod common;

use api_lib::config::{Config, RateLimitSettings};
use axum::http::{header, StatusCode};
use common::{body_json, json_request, ScriptedGenerator, TestApp};
use serde_json::json;
use std::time::Duration;

fn club(access_code: &str) -> serde_json::Value {
    json!({
        "name": "Tuesday Readers",
        "description": "We meet at the library",
        "accessCode": access_code,
        "adminPassword": "s3cret"
    })
}

#[tokio::test]
async fn club_creation_is_limited_per_caller() {
    let app = TestApp::new();

    for i in 0..3 {
        let response = app
            .send(json_request("/club", club(&format!("code-{i}")), false, Some("198.51.100.4")))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_json(response).await["clubId"].is_string());
    }

    let limited = app
        .send(json_request("/club", club("code-3"), false, Some("198.51.100.4")))
        .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(body_json(limited).await["error"].is_string());

    let other_caller = app
        .send(json_request("/club", club("code-4"), false, Some("198.51.100.5")))
        .await;
    assert_eq!(other_caller.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn club_creation_validates_fields() {
    let config = Config {
        club_create_rate_limit: RateLimitSettings {
            ceiling: 100,
            window: Duration::from_secs(3600),
        },
        ..Config::default()
    };
    let app = TestApp::with(config, ScriptedGenerator::new("", &[]));

    let missing = app.post_json("/club", json!({ "name": "Only a name" }), false).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let short_code = app.post_json("/club", club("x"), false).await;
    assert_eq!(short_code.status(), StatusCode::BAD_REQUEST);

    let mut weak = club("weak");
    weak["adminPassword"] = json!("abc");
    let short_password = app.post_json("/club", weak, false).await;
    assert_eq!(short_password.status(), StatusCode::BAD_REQUEST);

    let created = app.post_json("/club", club("dup"), false).await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = app.post_json("/club", club("dup"), false).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn verifying_an_access_code_sets_the_club_cookie() {
    let app = TestApp::new();
    let created = body_json(app.post_json("/club", club("tue"), false).await).await;

    let response = app
        .post_json("/club/verify", json!({ "accessCode": "tue" }), false)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with(&format!("club_id={}", created["clubId"].as_str().unwrap())));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=2592000"));

    let body = body_json(response).await;
    assert_eq!(body["clubId"], created["clubId"]);
    assert_eq!(body["clubName"], "Tuesday Readers");
}

#[tokio::test]
async fn verification_rejects_blank_and_unknown_codes() {
    let app = TestApp::new();

    let blank = app
        .post_json("/club/verify", json!({ "accessCode": "  " }), false)
        .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .post_json("/club/verify", json!({ "accessCode": "nope" }), false)
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verification_is_limited_to_five_attempts() {
    let app = TestApp::new();

    for _ in 0..5 {
        let response = app
            .send(json_request(
                "/club/verify",
                json!({ "accessCode": "guess" }),
                false,
                Some("203.0.113.9"),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let limited = app
        .send(json_request(
            "/club/verify",
            json!({ "accessCode": "guess" }),
            false,
            Some("203.0.113.9"),
        ))
        .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
}
