// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use lingo_match::config::Config;
use lingo_match::db::{FirestoreDb, MemoryDb, RoomStore, StoreError, Stores, UserStore};
use lingo_match::middleware::auth::create_jwt;
use lingo_match::middleware::AuthUser;
use lingo_match::models::{Room, User};
use lingo_match::routes::create_router;
use lingo_match::services::{LocalFileStorage, Notification, Notifier};
use lingo_match::AppState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Notifier that keeps every notification for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background dispatches to land.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// User store that delegates to memory but can be told to fail.
pub struct FlakyUsers {
    inner: MemoryDb,
    pub fail_lookup: AtomicBool,
    pub fail_delete: AtomicBool,
    /// `add_match` fails for this user ID.
    pub fail_link_for: Mutex<Option<String>>,
}

impl FlakyUsers {
    pub fn new(inner: MemoryDb) -> Self {
        Self {
            inner,
            fail_lookup: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_link_for: Mutex::new(None),
        }
    }
}

#[async_trait]
impl UserStore for FlakyUsers {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.inner.get_user(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("lookup unavailable".to_string()));
        }
        self.inner.get_user_by_email(email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.list_users().await
    }

    async fn list_matchable_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.list_matchable_users().await
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.update_user(user).await
    }

    async fn add_match(&self, user_id: &str, match_id: &str) -> Result<(), StoreError> {
        if self.fail_link_for.lock().unwrap().as_deref() == Some(user_id) {
            return Err(StoreError::Backend("link unavailable".to_string()));
        }
        self.inner.add_match(user_id, match_id).await
    }

    async fn add_room(&self, user_id: &str, room_id: &str) -> Result<(), StoreError> {
        self.inner.add_room(user_id, room_id).await
    }

    async fn remove_match_refs(
        &self,
        user_id: &str,
        match_id: &str,
        room_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.remove_match_refs(user_id, match_id, room_id).await
    }

    async fn delete_user(&self, user: &User) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete unavailable".to_string()));
        }
        self.inner.delete_user(user).await
    }
}

/// Room store whose next `create_failures` inserts fail.
pub struct FlakyRooms {
    inner: MemoryDb,
    pub create_failures: AtomicUsize,
}

#[async_trait]
impl RoomStore for FlakyRooms {
    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        self.inner.get_room(id).await
    }

    async fn create_room(&self, room: &Room) -> Result<bool, StoreError> {
        let failing = self
            .create_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("rooms unavailable".to_string()));
        }
        self.inner.create_room(room).await
    }

    async fn delete_room(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_room(id).await
    }
}

/// Memory-backed stores with failure switches on users and rooms.
pub fn flaky_stores(db: &MemoryDb) -> (Stores, Arc<FlakyUsers>, Arc<FlakyRooms>) {
    let users = Arc::new(FlakyUsers::new(db.clone()));
    let rooms = Arc::new(FlakyRooms {
        inner: db.clone(),
        create_failures: AtomicUsize::new(0),
    });
    let stores = Stores {
        users: users.clone(),
        matches: Arc::new(db.clone()),
        rooms: rooms.clone(),
    };
    (stores, users, rooms)
}

/// Everything a test needs to drive the app and inspect its state.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub notifier: Arc<RecordingNotifier>,
    pub avatars: tempfile::TempDir,
}

impl TestApp {
    pub fn token(&self, email: &str) -> String {
        create_jwt(email, false, &self.state.config.jwt_signing_key).unwrap()
    }

    pub fn admin_token(&self, email: &str) -> String {
        create_jwt(email, true, &self.state.config.jwt_signing_key).unwrap()
    }

    /// Insert an activated user directly into the store.
    pub async fn seed_user(&self, email: &str, teach: &[&str], learn: &[&str]) -> User {
        let mut user = User::new(email, chrono::Utc::now());
        user.first_name = email.split('@').next().unwrap_or_default().to_string();
        user.languages_to_teach = teach.iter().map(|s| s.to_string()).collect();
        user.languages_to_learn = learn.iter().map(|s| s.to_string()).collect();
        user.is_activated = true;
        self.state.stores.users.create_user(&user).await.unwrap();
        user
    }

    pub async fn reload(&self, user: &User) -> User {
        self.state
            .stores
            .users
            .get_user(&user.id)
            .await
            .unwrap()
            .expect("user should exist")
    }
}

/// Auth context for calling services directly.
pub fn actor(email: &str) -> AuthUser {
    AuthUser::new(email, false)
}

/// Create a test app on the in-memory store.
pub fn create_test_app() -> TestApp {
    let db = MemoryDb::new();
    create_test_app_with(Stores::from_backend(db.clone()), db)
}

/// Create a test app on custom stores; `db` is the memory store behind them.
pub fn create_test_app_with(stores: Stores, db: MemoryDb) -> TestApp {
    let avatars = tempfile::tempdir().unwrap();
    let mut config = Config::test_default();
    config.avatar_dir = avatars.path().to_path_buf();

    let files = Arc::new(LocalFileStorage::new(avatars.path()));
    let notifier = Arc::new(RecordingNotifier::default());

    let state = Arc::new(AppState::new(config, stores, files, notifier.clone()));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        notifier,
        avatars,
    }
}

/// Authenticated JSON request.
pub fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Authenticated request without a body.
pub fn request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
