// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match lifecycle service.
//!
//! Status flow:
//! 1. `send_request` creates a Pending match and links it to both users
//! 2. `accept_request` moves Pending -> Active and opens the pair's room
//! 3. `deny_request` moves Pending -> Denied
//!
//! Pair uniqueness is checked here and enforced again by the match store.

use crate::db::{StoreError, Stores};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{Match, MatchStatus, Room, User};
use crate::services::notifier::{dispatch, Notification, Notifier};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct MatchLifecycle {
    stores: Stores,
    notifier: Arc<dyn Notifier>,
}

impl MatchLifecycle {
    pub fn new(stores: Stores, notifier: Arc<dyn Notifier>) -> Self {
        Self { stores, notifier }
    }

    async fn load_user(&self, email: &str) -> Result<User> {
        self.stores
            .users
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", email)))
    }

    /// Send a match request from the caller to `recipient_email`.
    pub async fn send_request(&self, actor: &AuthUser, recipient_email: &str) -> Result<Match> {
        let recipient_email = recipient_email.trim().to_ascii_lowercase();
        if recipient_email == actor.email {
            return Err(AppError::InvalidTarget);
        }

        let requester = self.load_user(&actor.email).await?;
        let recipient = self.load_user(&recipient_email).await?;
        if requester.id == recipient.id {
            return Err(AppError::InvalidTarget);
        }

        let existing = self
            .stores
            .matches
            .list_matches_for_user(&requester.id)
            .await?;
        if existing
            .iter()
            .any(|m| !m.status.is_terminal() && m.involves(&recipient.id))
        {
            return Err(AppError::DuplicateRequest);
        }

        let m = Match::new_request(&requester.id, &recipient.id, chrono::Utc::now());
        self.stores
            .matches
            .create_match(&m)
            .await
            .map_err(|e| match e {
                // Lost the race against a concurrent request for the same pair.
                StoreError::Conflict(_) => AppError::DuplicateRequest,
                other => other.into(),
            })?;

        if let Err(e) = self.link_match(&m).await {
            self.undo_request(&m).await;
            return Err(e);
        }

        tracing::info!(
            match_id = %m.id,
            requester = %requester.id,
            recipient = %recipient.id,
            "Match requested"
        );

        dispatch(
            self.notifier.clone(),
            Notification::MatchRequested {
                recipient_email: recipient.email,
                requester_email: requester.email,
            },
        );

        Ok(m)
    }

    async fn link_match(&self, m: &Match) -> Result<()> {
        for user_id in [&m.requester_user, &m.recipient_user] {
            self.stores
                .users
                .add_match(user_id, &m.id)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        error = %e,
                        match_id = %m.id,
                        user_id = %user_id,
                        "send_request: failed to link match to user"
                    )
                })?;
        }
        Ok(())
    }

    /// Take back a request whose links could not be written, so the pair
    /// lock does not outlive it.
    async fn undo_request(&self, m: &Match) {
        for user_id in [&m.requester_user, &m.recipient_user] {
            match self.stores.users.remove_match_refs(user_id, &m.id, None).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => tracing::warn!(
                    error = %e,
                    match_id = %m.id,
                    user_id = %user_id,
                    "send_request: failed to unlink abandoned match"
                ),
            }
        }

        match self.stores.matches.delete_match(m).await {
            Ok(()) => tracing::warn!(match_id = %m.id, "send_request: abandoned match removed"),
            Err(e) => tracing::error!(
                error = %e,
                match_id = %m.id,
                "send_request: abandoned match left behind, pair stays locked"
            ),
        }
    }

    /// Load a match the caller may respond to.
    ///
    /// The caller must be the recipient. This is checked before any status
    /// check so a non-recipient is always refused the same way.
    async fn load_for_recipient(&self, match_id: &str, actor: &AuthUser) -> Result<Match> {
        let m = self
            .stores
            .matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Match {}", match_id)))?;

        let actor_id = self
            .stores
            .users
            .get_user_by_email(&actor.email)
            .await?
            .map(|u| u.id);
        if actor_id.as_deref() != Some(m.recipient_user.as_str()) {
            return Err(AppError::Forbidden(
                "only the recipient can respond to a match request".to_string(),
            ));
        }
        Ok(m)
    }

    fn ensure_pending(m: &Match) -> Result<()> {
        if m.status != MatchStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "match {} is not pending",
                m.id
            )));
        }
        Ok(())
    }

    async fn transition(&self, m: &Match, to: MatchStatus, room_id: Option<&str>) -> Result<Match> {
        self.stores
            .matches
            .transition_status(&m.id, MatchStatus::Pending, to, room_id)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    AppError::InvalidState(format!("match {} is not pending", m.id))
                }
                other => other.into(),
            })
    }

    /// Whether the room of an active match exists and both users (where
    /// they still exist) refer to it.
    async fn room_is_open(&self, m: &Match) -> Result<bool> {
        let Some(room_id) = m.room_id.as_deref() else {
            return Ok(false);
        };
        if self.stores.rooms.get_room(room_id).await?.is_none() {
            return Ok(false);
        }
        for user_id in [&m.requester_user, &m.recipient_user] {
            if let Some(user) = self.stores.users.get_user(user_id).await? {
                if !user.rooms.iter().any(|r| r == room_id) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Create the room of an active match and link it to both users.
    /// Every step is insert-if-absent, so this may be repeated.
    async fn open_room(&self, active: &Match) -> Result<()> {
        let room = Room::for_match(active, chrono::Utc::now());
        if !self.stores.rooms.create_room(&room).await? {
            tracing::debug!(room_id = %room.id, "Room already existed");
        }

        for user_id in [&active.requester_user, &active.recipient_user] {
            self.stores
                .users
                .add_room(user_id, &room.id)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        error = %e,
                        room_id = %room.id,
                        user_id = %user_id,
                        "accept_request: failed to link room to user"
                    )
                })?;
        }
        Ok(())
    }

    /// Accept a pending request and open the pair's room.
    ///
    /// If an earlier accept moved the match to Active but failed before the
    /// room was fully set up, accepting again finishes the room instead of
    /// reporting `InvalidState`.
    pub async fn accept_request(&self, match_id: &str, actor: &AuthUser) -> Result<Match> {
        let m = self.load_for_recipient(match_id, actor).await?;

        if m.status == MatchStatus::Active && !self.room_is_open(&m).await? {
            tracing::warn!(match_id = %m.id, "Finishing room of an interrupted accept");
            self.open_room(&m).await?;
            return Ok(m);
        }
        Self::ensure_pending(&m)?;

        let room_id = Room::id_for(&m);
        let active = self
            .transition(&m, MatchStatus::Active, Some(&room_id))
            .await?;

        // Only the caller that won the transition gets here, and the insert
        // is create-if-absent, so the room exists once.
        self.open_room(&active).await?;

        tracing::info!(match_id = %active.id, room_id = %room_id, "Match accepted");

        match self.stores.users.get_user(&active.requester_user).await {
            Ok(Some(requester)) => dispatch(
                self.notifier.clone(),
                Notification::MatchAccepted {
                    requester_email: requester.email,
                    recipient_email: actor.email.clone(),
                },
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "accept_request: requester lookup failed"),
        }

        Ok(active)
    }

    /// Deny a pending request. No room is created.
    pub async fn deny_request(&self, match_id: &str, actor: &AuthUser) -> Result<Match> {
        let m = self.load_for_recipient(match_id, actor).await?;
        Self::ensure_pending(&m)?;
        let denied = self.transition(&m, MatchStatus::Denied, None).await?;
        tracing::info!(match_id = %denied.id, "Match denied");
        Ok(denied)
    }

    /// Users the caller could be matched with, sorted by user ID.
    pub async fn list_possible_matches(&self, actor: &AuthUser) -> Result<Vec<User>> {
        let user = self.load_user(&actor.email).await?;

        let open_partners: HashSet<String> = self
            .stores
            .matches
            .list_matches_for_user(&user.id)
            .await?
            .into_iter()
            .filter(|m| !m.status.is_terminal())
            .map(|m| m.other_participant(&user.id).to_string())
            .collect();

        let candidates = self.stores.users.list_matchable_users().await?;
        Ok(possible_matches(&user, &open_partners, candidates))
    }

    async fn matches_where<F>(&self, user: &User, keep: F) -> Result<Vec<Match>>
    where
        F: Fn(&Match) -> bool,
    {
        Ok(self
            .stores
            .matches
            .list_matches_for_user(&user.id)
            .await?
            .into_iter()
            .filter(|m| keep(m))
            .collect())
    }

    /// Pending requests the caller sent.
    pub async fn list_requested(&self, actor: &AuthUser) -> Result<Vec<Match>> {
        let user = self.load_user(&actor.email).await?;
        self.matches_where(&user, |m| {
            m.status == MatchStatus::Pending && m.requester_user == user.id
        })
        .await
    }

    /// Pending requests the caller received.
    pub async fn list_received(&self, actor: &AuthUser) -> Result<Vec<Match>> {
        let user = self.load_user(&actor.email).await?;
        self.matches_where(&user, |m| {
            m.status == MatchStatus::Pending && m.recipient_user == user.id
        })
        .await
    }

    pub async fn list_active(&self, actor: &AuthUser) -> Result<Vec<Match>> {
        let user = self.load_user(&actor.email).await?;
        self.matches_where(&user, |m| m.status == MatchStatus::Active)
            .await
    }

    /// Terminal matches of `email`; caller must be that user or an admin.
    pub async fn list_old(&self, actor: &AuthUser, email: &str) -> Result<Vec<Match>> {
        actor.ensure_can_act_for(email)?;
        let user = self.load_user(&email.trim().to_ascii_lowercase()).await?;
        self.matches_where(&user, |m| m.status.is_terminal()).await
    }
}

/// Filter `candidates` down to possible partners for `user`.
///
/// Keeps users sharing a teach/learn language in either direction and drops
/// `user` itself, users in `open_partners`, and users excluded from matching.
/// Output is sorted by user ID.
pub fn possible_matches(
    user: &User,
    open_partners: &HashSet<String>,
    candidates: Vec<User>,
) -> Vec<User> {
    let mut result: Vec<User> = candidates
        .into_iter()
        .filter(|c| c.id != user.id)
        .filter(|c| !c.exclude_from_matching)
        .filter(|c| !open_partners.contains(&c.id))
        .filter(|c| user.shares_language_with(c))
        .collect();
    result.sort_by(|a, b| a.id.cmp(&b.id));
    result
}
