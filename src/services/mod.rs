// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod avatar;
pub mod matching;
pub mod notifier;
pub mod registration;
pub mod removal;

pub use avatar::{FileStorage, LocalFileStorage};
pub use matching::MatchLifecycle;
pub use notifier::{LogNotifier, Notification, Notifier};
pub use registration::AccountRegistration;
pub use removal::{AccountRemoval, RemovalOutcome};
