// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Protected routes accept session cookies and bearer tokens
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use lingo_match::middleware::auth::SESSION_COOKIE;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, request};

/// Create a token with a chosen expiry offset.
fn jwt_with_expiry(email: &str, offset_secs: i64, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: email.to_string(),
        exp: (now + offset_secs) as usize,
        iat: now as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/possibleMatchs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(request("GET", "/possibleMatchs", "invalid.token.here"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_key_rejected() {
    let app = create_test_app();
    let token = jwt_with_expiry("alice@uni.edu", 3600, b"some_other_key_that_is_long_enough");

    let response = app
        .router
        .oneshot(request("GET", "/users/registered", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = create_test_app();
    let token = jwt_with_expiry(
        "alice@uni.edu",
        -3600,
        &app.state.config.jwt_signing_key,
    );

    let response = app
        .router
        .oneshot(request("GET", "/users/registered", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_accepted() {
    let app = create_test_app();
    let token = app.token("alice@uni.edu");

    let response = app
        .router
        .oneshot(request("GET", "/users/registered", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "false");
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let app = create_test_app();
    app.seed_user("alice@uni.edu", &["English"], &["Spanish"]).await;
    let token = app.token("Alice@Uni.edu");

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/users/registered")
                .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], "true");
    assert_eq!(body["email"], "alice@uni.edu");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/possibleMatchs")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_cors_rejects_unknown_origin() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/possibleMatchs")
                .header(header::ORIGIN, "https://evil.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
