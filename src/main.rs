// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lingo-Match API Server
//!
//! Pairs language learners with partners who teach what they want to learn,
//! and manages the match requests and chat rooms between them.

use lingo_match::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryDb, Stores},
    services::{LocalFileStorage, LogNotifier},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Structured JSON logging for GCP
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        "Starting Lingo-Match API"
    );

    let stores = match config.store_backend {
        StoreBackend::Firestore => {
            Stores::from_backend(FirestoreDb::new(&config.gcp_project_id).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Stores::from_backend(MemoryDb::new())
        }
    };

    tracing::info!(path = %config.avatar_dir.display(), "Avatar storage initialized");
    let files = Arc::new(LocalFileStorage::new(config.avatar_dir.clone()));
    let notifier = Arc::new(LogNotifier);

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(config, stores, files, notifier));

    let app = lingo_match::routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lingo_match=debug"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
