// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, activation, profile and account removal over HTTP.

use axum::http::StatusCode;
use lingo_match::error::AppError;
use lingo_match::middleware::AuthUser;
use lingo_match::services::registration::{ProfileUpdate, RegisterRequest};
use lingo_match::services::Notification;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{actor, body_json, create_test_app, json_request, request};

fn register_body(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: Some(email.to_string()),
        first_name: Some("Alice".to_string()),
        languages_to_teach: vec!["English".to_string()],
        languages_to_learn: vec!["Spanish".to_string()],
        ..Default::default()
    }
}

/// The activation key most recently sent to `email`.
async fn sent_key(app: &common::TestApp, email: &str, count: usize) -> String {
    app.notifier
        .wait_for(count)
        .await
        .into_iter()
        .rev()
        .find_map(|n| match n {
            Notification::ActivationKey { email: to, key } if to == email => Some(key),
            _ => None,
        })
        .expect("activation key should be sent")
}

#[tokio::test]
async fn test_register_and_activate() {
    let app = create_test_app();
    let alice = actor("alice@uni.edu");

    let user = app
        .state
        .accounts
        .register(&alice, register_body("Alice@Uni.edu"))
        .await
        .unwrap();
    assert_eq!(user.email, "alice@uni.edu");
    assert!(!user.is_activated);

    let key = sent_key(&app, "alice@uni.edu", 1).await;
    let activated = app.state.accounts.activate(&alice, &key).await.unwrap();
    assert!(activated.is_activated);
    assert!(activated.activation_key.is_none());

    // Activating again is harmless
    assert!(app
        .state
        .accounts
        .activate(&alice, "anything")
        .await
        .unwrap()
        .is_activated);
}

#[tokio::test]
async fn test_wrong_activation_key_rejected() {
    let app = create_test_app();
    let alice = actor("alice@uni.edu");
    app.state
        .accounts
        .register(&alice, register_body("alice@uni.edu"))
        .await
        .unwrap();

    let result = app.state.accounts.activate(&alice, "deadbeef").await;
    assert!(matches!(
        result,
        Err(AppError::Validation {
            code: "INVALID_ACTIVATION_KEY",
            ..
        })
    ));
}

#[tokio::test]
async fn test_expired_activation_key_rejected() {
    let app = create_test_app();
    let alice = actor("alice@uni.edu");
    let mut user = app
        .state
        .accounts
        .register(&alice, register_body("alice@uni.edu"))
        .await
        .unwrap();
    let key = user.activation_key.clone().unwrap();

    user.activation_stamp = Some(chrono::Utc::now() - chrono::Duration::hours(72));
    app.state.stores.users.update_user(&user).await.unwrap();

    let result = app.state.accounts.activate(&alice, &key).await;
    assert!(matches!(
        result,
        Err(AppError::Validation {
            code: "ACTIVATION_EXPIRED",
            ..
        })
    ));

    // A fresh key works
    app.state.accounts.resend_activation(&alice).await.unwrap();
    let fresh = sent_key(&app, "alice@uni.edu", 2).await;
    assert_ne!(fresh, key);
    assert!(app
        .state
        .accounts
        .activate(&alice, &fresh)
        .await
        .unwrap()
        .is_activated);

    let resend = app.state.accounts.resend_activation(&alice).await;
    assert!(matches!(resend, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_register_validation_codes() {
    let app = create_test_app();
    let alice = actor("alice@uni.edu");

    let missing = app
        .state
        .accounts
        .register(&alice, RegisterRequest::default())
        .await;
    assert!(matches!(
        missing,
        Err(AppError::Validation {
            code: "REQUIRED_FIELD_MISSING",
            ..
        })
    ));

    let foreign = app
        .state
        .accounts
        .register(&actor("alice@gmail.com"), register_body("alice@gmail.com"))
        .await;
    assert!(matches!(
        foreign,
        Err(AppError::Validation {
            code: "EMAIL_DOMAIN_NOT_ALLOWED",
            ..
        })
    ));

    let mut long_name = register_body("alice@uni.edu");
    long_name.first_name = Some("x".repeat(101));
    let invalid = app.state.accounts.register(&alice, long_name).await;
    assert!(matches!(
        invalid,
        Err(AppError::Validation {
            code: "INVALID_FIELD",
            ..
        })
    ));

    // Registering someone else needs admin rights
    let other = app
        .state
        .accounts
        .register(&alice, register_body("bob@uni.edu"))
        .await;
    assert!(matches!(other, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_update_me_keeps_unset_fields() {
    let app = create_test_app();
    let alice = actor("alice@uni.edu");
    app.state
        .accounts
        .register(&alice, register_body("alice@uni.edu"))
        .await
        .unwrap();

    let updated = app
        .state
        .accounts
        .update_me(
            &alice,
            ProfileUpdate {
                cities: Some(vec!["Lisbon".to_string()]),
                exclude_from_matching: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.cities, vec!["Lisbon".to_string()]);
    assert!(updated.exclude_from_matching);
    assert_eq!(updated.first_name, "Alice");
    assert_eq!(updated.languages_to_teach, vec!["English".to_string()]);
}

#[tokio::test]
async fn test_update_me_rejects_foreign_avatar() {
    let app = create_test_app();
    let alice = app.seed_user("alice@uni.edu", &["English"], &["Spanish"]).await;
    let bob = app.seed_user("bob@uni.edu", &["Spanish"], &["English"]).await;

    let foreign = app
        .state
        .accounts
        .update_me(
            &actor("alice@uni.edu"),
            ProfileUpdate {
                avatar: Some(format!("{}.png", bob.id)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        foreign,
        Err(AppError::Validation {
            code: "INVALID_FIELD",
            ..
        })
    ));
    assert!(app.reload(&alice).await.avatar.is_none());

    let own = format!("{}.png", alice.id);
    let updated = app
        .state
        .accounts
        .update_me(
            &actor("alice@uni.edu"),
            ProfileUpdate {
                avatar: Some(own.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.avatar, Some(own));
}

#[tokio::test]
async fn test_profile_writes_keep_match_links() {
    let app = create_test_app();
    let alice = app.seed_user("alice@uni.edu", &["English"], &["Spanish"]).await;
    app.seed_user("bob@uni.edu", &["Spanish"], &["English"]).await;

    // A profile snapshot taken before the match exists
    let mut stale = app.reload(&alice).await;

    let m = app
        .state
        .matches
        .send_request(&actor("alice@uni.edu"), "bob@uni.edu")
        .await
        .unwrap();

    stale.description_text = "Hola".to_string();
    app.state.stores.users.update_user(&stale).await.unwrap();

    let updated = app
        .state
        .accounts
        .update_me(
            &actor("alice@uni.edu"),
            ProfileUpdate {
                first_name: Some("Ally".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Ally");

    let stored = app.reload(&alice).await;
    assert_eq!(stored.description_text, "Hola");
    assert_eq!(stored.matches, vec![m.id]);
}

#[tokio::test]
async fn test_list_users_admin_only() {
    let app = create_test_app();
    let admin = AuthUser::new("root@uni.edu", true);

    let empty = app.state.accounts.list_users(&admin).await;
    assert!(matches!(empty, Err(AppError::NotFound(_))));

    app.seed_user("alice@uni.edu", &["English"], &["Spanish"]).await;
    assert_eq!(app.state.accounts.list_users(&admin).await.unwrap().len(), 1);

    let denied = app.state.accounts.list_users(&actor("alice@uni.edu")).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_register_over_http() {
    let app = create_test_app();
    let token = app.token("alice@uni.edu");
    let body = json!({
        "email": "alice@uni.edu",
        "firstName": "Alice",
        "languagesToTeach": ["English"],
        "languagesToLearn": ["Spanish"],
    });

    let response = app
        .router
        .clone()
        .oneshot(json_request("POST", "/users", &token, body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["data"]["email"], "alice@uni.edu");
    assert!(created["data"].get("activationKey").is_none());

    let response = app
        .router
        .clone()
        .oneshot(json_request("POST", "/users", &token, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ENTITY_ALREADY_EXISTS");

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/users/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["data"]["firstName"], "Alice");
    assert!(me["data"]["matches"].as_array().unwrap().is_empty());
    assert_eq!(me["data"]["isAdmin"], false);
}

#[tokio::test]
async fn test_activate_over_http() {
    let app = create_test_app();
    let token = app.token("alice@uni.edu");
    app.state
        .accounts
        .register(&actor("alice@uni.edu"), register_body("alice@uni.edu"))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/users/activate",
            &token,
            json!({ "key": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "INVALID_ACTIVATION_KEY");

    let key = sent_key(&app, "alice@uni.edu", 1).await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/users/activate",
            &token,
            json!({ "key": key }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["isActivated"], true);
}

#[tokio::test]
async fn test_delete_account_over_http() {
    let app = create_test_app();
    app.seed_user("alice@uni.edu", &["English"], &["Spanish"]).await;
    app.seed_user("bob@uni.edu", &["Spanish"], &["English"]).await;

    // Not yours to delete
    let response = app
        .router
        .clone()
        .oneshot(request("DELETE", "/users/alice@uni.edu", &app.token("bob@uni.edu")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(request("DELETE", "/users/alice@uni.edu", &app.token("alice@uni.edu")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], 0);

    // Gone now; an admin retry reports not found
    let response = app
        .router
        .clone()
        .oneshot(request(
            "DELETE",
            "/users/alice@uni.edu",
            &app.admin_token("root@uni.edu"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
