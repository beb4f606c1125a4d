// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store backend.
//!
//! Used for local development (`STORE_BACKEND=memory`) and tests. Enforces
//! the same uniqueness rules as Firestore through `DashMap` entry locking.

use crate::db::{MatchStore, RoomStore, StoreError, UserStore};
use crate::models::{Match, MatchStatus, Room, User};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    users: DashMap<String, User>,
    /// email -> user ID
    emails: DashMap<String, String>,
    matches: DashMap<String, Match>,
    /// pair key -> match ID
    pair_locks: DashMap<String, String>,
    rooms: DashMap<String, Room>,
}

/// In-memory database. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify_user<F>(&self, user_id: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut User),
    {
        let mut user = self
            .inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("User {}", user_id)))?;
        f(&mut *user);
        Ok(())
    }

    fn release_pair_lock(&self, m: &Match) {
        self.inner
            .pair_locks
            .remove_if(&m.pair_key(), |_, holder| holder == &m.id);
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.users.get(id).map(|u| u.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user_id = match self.inner.emails.get(email) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.get_user(&user_id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.inner.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn list_matchable_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .inner
            .users
            .iter()
            .filter(|u| !u.exclude_from_matching)
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        match self.inner.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Conflict(format!(
                    "email {} already registered",
                    user.email
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }
        self.inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.modify_user(&user.id, |stored| stored.copy_profile_from(user))
    }

    async fn add_match(&self, user_id: &str, match_id: &str) -> Result<(), StoreError> {
        self.modify_user(user_id, |user| {
            if !user.matches.iter().any(|id| id == match_id) {
                user.matches.push(match_id.to_string());
            }
        })
    }

    async fn add_room(&self, user_id: &str, room_id: &str) -> Result<(), StoreError> {
        self.modify_user(user_id, |user| {
            if !user.rooms.iter().any(|id| id == room_id) {
                user.rooms.push(room_id.to_string());
            }
        })
    }

    async fn remove_match_refs(
        &self,
        user_id: &str,
        match_id: &str,
        room_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.modify_user(user_id, |user| {
            user.matches.retain(|id| id != match_id);
            if let Some(room_id) = room_id {
                user.rooms.retain(|id| id != room_id);
            }
        })
    }

    async fn delete_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.users.remove(&user.id);
        self.inner
            .emails
            .remove_if(&user.email, |_, holder| holder == &user.id);
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MemoryDb {
    async fn get_match(&self, id: &str) -> Result<Option<Match>, StoreError> {
        Ok(self.inner.matches.get(id).map(|m| m.clone()))
    }

    async fn get_matches(&self, ids: &[String]) -> Result<Vec<Match>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.inner.matches.get(id).map(|m| m.clone()))
            .collect())
    }

    async fn list_matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StoreError> {
        let mut matches: Vec<Match> = self
            .inner
            .matches
            .iter()
            .filter(|m| m.involves(user_id))
            .map(|m| m.clone())
            .collect();
        matches.sort_by(|a, b| a.request_date.cmp(&b.request_date).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn create_match(&self, m: &Match) -> Result<(), StoreError> {
        match self.inner.pair_locks.entry(m.pair_key()) {
            Entry::Occupied(held) => {
                return Err(StoreError::Conflict(format!(
                    "pair already has open match {}",
                    held.get()
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(m.id.clone());
            }
        }
        self.inner.matches.insert(m.id.clone(), m.clone());
        Ok(())
    }

    async fn transition_status(
        &self,
        id: &str,
        from: MatchStatus,
        to: MatchStatus,
        room_id: Option<&str>,
    ) -> Result<Match, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::Conflict(format!(
                "transition {:?} -> {:?} not allowed",
                from, to
            )));
        }

        let updated = {
            let mut stored = self
                .inner
                .matches
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("Match {}", id)))?;
            if stored.status != from {
                return Err(StoreError::Conflict(format!(
                    "match {} is {:?}, expected {:?}",
                    id, stored.status, from
                )));
            }
            stored.status = to;
            stored.updated_at = chrono::Utc::now();
            if let Some(room_id) = room_id {
                stored.room_id = Some(room_id.to_string());
            }
            stored.clone()
        };

        if to.is_terminal() {
            self.release_pair_lock(&updated);
        }
        Ok(updated)
    }

    async fn delete_match(&self, m: &Match) -> Result<(), StoreError> {
        self.inner.matches.remove(&m.id);
        self.release_pair_lock(m);
        Ok(())
    }
}

#[async_trait]
impl RoomStore for MemoryDb {
    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.rooms.get(id).map(|r| r.clone()))
    }

    async fn create_room(&self, room: &Room) -> Result<bool, StoreError> {
        match self.inner.rooms.entry(room.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(room.clone());
                Ok(true)
            }
        }
    }

    async fn delete_room(&self, id: &str) -> Result<(), StoreError> {
        self.inner.rooms.remove(id);
        Ok(())
    }
}
