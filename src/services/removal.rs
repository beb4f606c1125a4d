// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account removal with cascading cleanup.
//!
//! Deletes a user and unwinds every match and room they take part in:
//! 1. Load the user by email
//! 2. Load their matches
//! 3. For each match, drop the match and room IDs from the other user
//! 4. Delete the match record and its room
//! 5. Delete the avatar file, if its key belongs to the user
//! 6. Delete the user record
//!
//! Steps 3-5 are best-effort: failures are logged and the loop continues.
//! Nothing here is transactional; every step is safe to repeat, so a run that
//! reports [`RemovalOutcome::Aborted`] can simply be retried.

use crate::db::Stores;
use crate::error::{AppError, Result};
use crate::models::{Match, User};
use crate::services::avatar::FileStorage;
use serde::Serialize;
use std::sync::Arc;

/// Result of a removal run, reported as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum RemovalOutcome {
    /// Everything was removed.
    Removed = 0,
    /// Cleanup ran but the user record could not be deleted.
    UserDeleteFailed = 1,
    /// An unexpected failure stopped the run; state is unknown.
    Aborted = 2,
}

impl From<RemovalOutcome> for u8 {
    fn from(outcome: RemovalOutcome) -> Self {
        outcome as u8
    }
}

/// Per-match cleanup tally, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub matches_removed: usize,
    pub rooms_removed: usize,
    pub step_failures: usize,
}

#[derive(Clone)]
pub struct AccountRemoval {
    stores: Stores,
    files: Arc<dyn FileStorage>,
}

impl AccountRemoval {
    pub fn new(stores: Stores, files: Arc<dyn FileStorage>) -> Self {
        Self { stores, files }
    }

    /// Remove the account registered under `email`.
    ///
    /// Returns `NotFound` if there is no such user; every other failure is
    /// folded into the returned outcome.
    pub async fn remove(&self, email: &str) -> Result<RemovalOutcome> {
        let email = email.trim().to_ascii_lowercase();

        let user = match self.stores.users.get_user_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AppError::NotFound(format!("User {}", email))),
            Err(e) => {
                tracing::error!(error = %e, email = %email, "remove_account: user lookup failed");
                return Ok(RemovalOutcome::Aborted);
            }
        };

        let matches = match self.stores.matches.get_matches(&user.matches).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id = %user.id,
                    "remove_account: failed to load matches"
                );
                return Ok(RemovalOutcome::Aborted);
            }
        };

        let mut report = CleanupReport::default();
        for m in &matches {
            self.unwind_match(&user, m, &mut report).await;
        }

        match &user.avatar {
            Some(avatar) if !user.owns_avatar_key(avatar) => {
                report.step_failures += 1;
                tracing::warn!(user_id = %user.id, avatar = %avatar, "Avatar key not owned by user, not deleting");
            }
            Some(avatar) => {
                if let Err(e) = self.files.delete(avatar).await {
                    report.step_failures += 1;
                    tracing::warn!(error = %e, user_id = %user.id, avatar = %avatar, "Failed to delete avatar");
                }
            }
            None => {}
        }

        let outcome = match self.stores.users.delete_user(&user).await {
            Ok(()) => RemovalOutcome::Removed,
            Err(e) => {
                tracing::error!(error = %e, user_id = %user.id, "Failed to delete user record");
                RemovalOutcome::UserDeleteFailed
            }
        };

        tracing::info!(
            user_id = %user.id,
            matches_removed = report.matches_removed,
            rooms_removed = report.rooms_removed,
            step_failures = report.step_failures,
            outcome = ?outcome,
            "Account removal finished"
        );

        Ok(outcome)
    }

    /// Detach one match from the other participant, then delete it and its room.
    async fn unwind_match(&self, user: &User, m: &Match, report: &mut CleanupReport) {
        let other_id = m.other_participant(&user.id);

        match self.stores.users.get_user(other_id).await {
            Ok(Some(_)) => {
                if let Err(e) = self
                    .stores
                    .users
                    .remove_match_refs(other_id, &m.id, m.room_id.as_deref())
                    .await
                {
                    report.step_failures += 1;
                    tracing::warn!(
                        error = %e,
                        match_id = %m.id,
                        other_user = %other_id,
                        "Failed to detach match from other user"
                    );
                }
            }
            Ok(None) => {
                tracing::debug!(match_id = %m.id, other_user = %other_id, "Other user already gone");
            }
            Err(e) => {
                report.step_failures += 1;
                tracing::warn!(error = %e, other_user = %other_id, "Failed to load other user");
            }
        }

        match self.stores.matches.delete_match(m).await {
            Ok(()) => report.matches_removed += 1,
            Err(e) => {
                report.step_failures += 1;
                tracing::warn!(error = %e, match_id = %m.id, "Failed to delete match");
            }
        }

        // The room is found through the match, never by list position.
        if let Some(room_id) = &m.room_id {
            match self.stores.rooms.delete_room(room_id).await {
                Ok(()) => report.rooms_removed += 1,
                Err(e) => {
                    report.step_failures += 1;
                    tracing::warn!(error = %e, room_id = %room_id, "Failed to delete room");
                }
            }
        }
    }
}
