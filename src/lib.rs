// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Lingo-Match: language-exchange matchmaking backend
//!
//! This crate provides the API for registering users, pairing learners
//! through match requests, and removing accounts along with every match
//! and room they take part in.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Stores;
use services::{AccountRegistration, AccountRemoval, FileStorage, MatchLifecycle, Notifier};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub matches: MatchLifecycle,
    pub accounts: AccountRegistration,
    pub removal: AccountRemoval,
}

impl AppState {
    /// Wire the services on top of the given stores and collaborators.
    pub fn new(
        config: Config,
        stores: Stores,
        files: Arc<dyn FileStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            matches: MatchLifecycle::new(stores.clone(), notifier.clone()),
            accounts: AccountRegistration::new(stores.clone(), notifier, config.clone()),
            removal: AccountRemoval::new(stores.clone(), files),
            stores,
            config,
        }
    }
}
