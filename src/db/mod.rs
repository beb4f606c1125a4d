//! Database layer: store traits with Firestore and in-memory backends.
//!
//! Each call is read-committed on its own; there is no atomicity across
//! collections. Multi-step operations built on these traits must be
//! idempotent per step.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::models::{Match, MatchStatus, Room, User};
use async_trait::async_trait;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email -> user ID reservations (keyed by encoded email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const MATCHES: &str = "matches";
    /// Non-terminal pair locks (keyed by pair key)
    pub const MATCH_PAIRS: &str = "match_pairs";
    pub const ROOMS: &str = "rooms";
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Insert-if-absent or compare-and-set lost.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Backend(String),
}

/// User records and their match/room back-references.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Users with `exclude_from_matching == false`.
    async fn list_matchable_users(&self) -> Result<Vec<User>, StoreError>;

    /// Insert a new user. `Conflict` if the email is already taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Write the profile and activation fields of an existing user.
    ///
    /// `id`, `email`, `created_at` and the `matches`/`rooms` back-references
    /// keep their stored values; only the methods below change those lists.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Append a match ID unless already present.
    async fn add_match(&self, user_id: &str, match_id: &str) -> Result<(), StoreError>;

    /// Append a room ID unless already present.
    async fn add_room(&self, user_id: &str, room_id: &str) -> Result<(), StoreError>;

    /// Remove a match ID and its room ID. Absent IDs are a no-op;
    /// `NotFound` if the user does not exist.
    async fn remove_match_refs(
        &self,
        user_id: &str,
        match_id: &str,
        room_id: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Delete the user record and release its email.
    async fn delete_user(&self, user: &User) -> Result<(), StoreError>;
}

/// Match records with a per-pair uniqueness constraint on non-terminal matches.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_match(&self, id: &str) -> Result<Option<Match>, StoreError>;

    /// Load matches by ID, skipping IDs with no record.
    async fn get_matches(&self, ids: &[String]) -> Result<Vec<Match>, StoreError>;

    /// All matches where the user is requester or recipient.
    async fn list_matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StoreError>;

    /// Insert a new non-terminal match. `Conflict` if the pair already has one.
    async fn create_match(&self, m: &Match) -> Result<(), StoreError>;

    /// Compare-and-set the status from `from` to `to`, optionally attaching
    /// a room ID. `Conflict` if the current status is not `from`. Moving to
    /// a terminal status releases the pair lock.
    async fn transition_status(
        &self,
        id: &str,
        from: MatchStatus,
        to: MatchStatus,
        room_id: Option<&str>,
    ) -> Result<Match, StoreError>;

    /// Delete a match and release its pair lock. Absent records are a no-op.
    async fn delete_match(&self, m: &Match) -> Result<(), StoreError>;
}

/// Chat rooms keyed by room ID.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError>;

    /// Insert if absent. Returns `false` when the room already existed.
    async fn create_room(&self, room: &Room) -> Result<bool, StoreError>;

    /// Absent records are a no-op.
    async fn delete_room(&self, id: &str) -> Result<(), StoreError>;
}

/// The three stores, shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub matches: Arc<dyn MatchStore>,
    pub rooms: Arc<dyn RoomStore>,
}

impl Stores {
    /// Use one backend for all three stores.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: UserStore + MatchStore + RoomStore + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            users: backend.clone(),
            matches: backend.clone(),
            rooms: backend,
        }
    }
}
