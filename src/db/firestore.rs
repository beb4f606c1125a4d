// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the store traits.
//!
//! Provides typed operations for:
//! - Users (profiles plus match/room back-references)
//! - User emails (uniqueness reservations)
//! - Matches and their pair locks
//! - Rooms

use crate::db::{collections, MatchStore, RoomStore, StoreError, UserStore};
use crate::models::{EmailIndex, Match, MatchStatus, PairLock, Room, User, PROFILE_FIELDS};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreTransaction};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Commits retried after contention on a read-modify-write of one user.
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// Back-reference fields written by `modify_user`.
const REFERENCE_FIELDS: [&str; 2] = ["matches", "rooms"];

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn backend(e: FirestoreError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map an insert failure, treating "already exists" as a conflict.
fn insert_error(e: FirestoreError, what: String) -> StoreError {
    match e {
        FirestoreError::DataConflictError(_) => StoreError::Conflict(what),
        other => backend(other),
    }
}

fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Backend("Database not connected (offline mode)".to_string()))
    }

    /// A client whose reads join `transaction`, so the commit fails if a
    /// document read through it changed in the meantime.
    fn reader_in(
        &self,
        transaction: &FirestoreTransaction<'_>,
    ) -> Result<firestore::FirestoreDb, StoreError> {
        Ok(self
            .get_client()?
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            )))
    }

    /// Read-modify-write the back-reference lists of a user document.
    ///
    /// The read is part of the transaction, and a commit that loses to a
    /// concurrent writer is retried against the fresh document.
    async fn modify_user<F>(&self, user_id: &str, f: F) -> Result<(), StoreError>
    where
        F: Fn(&mut User) + Send + Sync,
    {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

            let current: Option<User> = self
                .reader_in(&transaction)?
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(user_id)
                .await
                .map_err(backend)?;

            let Some(mut user) = current else {
                let _ = transaction.rollback().await;
                return Err(StoreError::NotFound(format!("User {}", user_id)));
            };
            f(&mut user);

            client
                .fluent()
                .update()
                .fields(REFERENCE_FIELDS)
                .in_col(collections::USERS)
                .document_id(user_id)
                .object(&user)
                .add_to_transaction(&mut transaction)
                .map_err(backend)?;

            match transaction.commit().await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::debug!(user_id, attempt, error = %e, "User update contended, retrying");
                }
                Err(e) => {
                    return Err(StoreError::Backend(format!(
                        "Failed to commit user update: {}",
                        e
                    )))
                }
            }
        }

        Err(StoreError::Backend(format!(
            "User {} update kept conflicting",
            user_id
        )))
    }

    /// Delete the pair lock for a match if this match still holds it.
    async fn release_pair_lock(&self, m: &Match) -> Result<(), StoreError> {
        let key = m.pair_key();
        let lock: Option<PairLock> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MATCH_PAIRS)
            .obj()
            .one(&key)
            .await
            .map_err(backend)?;

        if lock.is_some_and(|l| l.match_id == m.id) {
            self.get_client()?
                .fluent()
                .delete()
                .from(collections::MATCH_PAIRS)
                .document_id(&key)
                .execute()
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl UserStore for FirestoreDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(backend)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let index: Option<EmailIndex> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_doc_id(email))
            .await
            .map_err(backend)?;

        match index {
            Some(index) => self.get_user(&index.user_id).await,
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([("id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(backend)
    }

    async fn list_matchable_users(&self) -> Result<Vec<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("excludeFromMatching").eq(false)]))
            .order_by([("id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(backend)
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let client = self.get_client()?;

        // Reserve the email first; the insert fails if the document exists.
        let index = EmailIndex {
            email: user.email.clone(),
            user_id: user.id.clone(),
        };
        let _: EmailIndex = client
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(email_doc_id(&user.email))
            .object(&index)
            .execute()
            .await
            .map_err(|e| insert_error(e, format!("email {} already registered", user.email)))?;

        let created: Result<User, FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await;

        if let Err(e) = created {
            // Give the email back so a retry can succeed.
            let _ = client
                .fluent()
                .delete()
                .from(collections::USER_EMAILS)
                .document_id(email_doc_id(&user.email))
                .execute()
                .await;
            return Err(backend(e));
        }
        Ok(())
    }

    /// Field-masked write, so concurrent `add_match`/`add_room` calls are
    /// never overwritten with a stale list.
    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(PROFILE_FIELDS)
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn add_match(&self, user_id: &str, match_id: &str) -> Result<(), StoreError> {
        self.modify_user(user_id, |user| {
            if !user.matches.iter().any(|id| id == match_id) {
                user.matches.push(match_id.to_string());
            }
        })
        .await
    }

    async fn add_room(&self, user_id: &str, room_id: &str) -> Result<(), StoreError> {
        self.modify_user(user_id, |user| {
            if !user.rooms.iter().any(|id| id == room_id) {
                user.rooms.push(room_id.to_string());
            }
        })
        .await
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
        .await
    }

    async fn delete_user(&self, user: &User) -> Result<(), StoreError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(&user.id)
            .add_to_transaction(&mut transaction)
            .map_err(backend)?;

        client
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(email_doc_id(&user.email))
            .add_to_transaction(&mut transaction)
            .map_err(backend)?;

        transaction
            .commit()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to commit user deletion: {}", e)))?;

        tracing::debug!(user_id = %user.id, "Deleted user profile");
        Ok(())
    }
}

// ─── Match Operations ────────────────────────────────────────

#[async_trait]
impl MatchStore for FirestoreDb {
    async fn get_match(&self, id: &str) -> Result<Option<Match>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MATCHES)
            .obj()
            .one(id)
            .await
            .map_err(backend)
    }

    /// Uses concurrent reads with a limit to avoid overloading Firestore.
    async fn get_matches(&self, ids: &[String]) -> Result<Vec<Match>, StoreError> {
        let found = stream::iter(ids.iter().cloned())
            .map(|id| async move { self.get_match(&id).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Match>, StoreError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Match>>, StoreError>>()?;

        Ok(found.into_iter().flatten().collect())
    }

    async fn list_matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MATCHES)
            .filter(|q| {
                q.for_any([
                    q.field("requesterUser").eq(user_id),
                    q.field("recipientUser").eq(user_id),
                ])
            })
            .order_by([("requestDate", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(backend)
    }

    async fn create_match(&self, m: &Match) -> Result<(), StoreError> {
        let client = self.get_client()?;

        let lock = PairLock {
            pair_key: m.pair_key(),
            match_id: m.id.clone(),
        };
        let _: PairLock = client
            .fluent()
            .insert()
            .into(collections::MATCH_PAIRS)
            .document_id(&lock.pair_key)
            .object(&lock)
            .execute()
            .await
            .map_err(|e| insert_error(e, format!("pair {} already has an open match", lock.pair_key)))?;

        let created: Result<Match, FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::MATCHES)
            .document_id(&m.id)
            .object(m)
            .execute()
            .await;

        if let Err(e) = created {
            let _ = self.release_pair_lock(m).await;
            return Err(backend(e));
        }

        tracing::debug!(match_id = %m.id, pair = %lock.pair_key, "Match created");
        Ok(())
    }

    /// The status read, the status write and the lock release share one
    /// transaction, so two callers racing from the same status cannot both
    /// commit.
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

        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<Match> = self
            .reader_in(&transaction)?
            .fluent()
            .select()
            .by_id_in(collections::MATCHES)
            .obj()
            .one(id)
            .await
            .map_err(backend)?;

        let mut stored = match current {
            Some(m) if m.status == from => m,
            Some(m) => {
                let _ = transaction.rollback().await;
                return Err(StoreError::Conflict(format!(
                    "match {} is {:?}, expected {:?}",
                    id, m.status, from
                )));
            }
            None => {
                let _ = transaction.rollback().await;
                return Err(StoreError::NotFound(format!("Match {}", id)));
            }
        };

        stored.status = to;
        stored.updated_at = chrono::Utc::now();
        if let Some(room_id) = room_id {
            stored.room_id = Some(room_id.to_string());
        }

        client
            .fluent()
            .update()
            .in_col(collections::MATCHES)
            .document_id(id)
            .object(&stored)
            .add_to_transaction(&mut transaction)
            .map_err(backend)?;

        if to.is_terminal() {
            client
                .fluent()
                .delete()
                .from(collections::MATCH_PAIRS)
                .document_id(stored.pair_key())
                .add_to_transaction(&mut transaction)
                .map_err(backend)?;
        }

        if let Err(e) = transaction.commit().await {
            // A commit aborted by a concurrent transition reports the
            // status the winner left behind.
            if let Ok(Some(now)) = self.get_match(id).await {
                if now.status != from {
                    return Err(StoreError::Conflict(format!(
                        "match {} is {:?}, expected {:?}",
                        id, now.status, from
                    )));
                }
            }
            return Err(StoreError::Backend(format!(
                "Transaction commit failed: {}",
                e
            )));
        }

        Ok(stored)
    }

    async fn delete_match(&self, m: &Match) -> Result<(), StoreError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::MATCHES)
            .document_id(&m.id)
            .execute()
            .await
            .map_err(backend)?;

        self.release_pair_lock(m).await
    }
}

// ─── Room Operations ─────────────────────────────────────────

#[async_trait]
impl RoomStore for FirestoreDb {
    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ROOMS)
            .obj()
            .one(id)
            .await
            .map_err(backend)
    }

    async fn create_room(&self, room: &Room) -> Result<bool, StoreError> {
        let created: Result<Room, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ROOMS)
            .document_id(&room.id)
            .object(room)
            .execute()
            .await;

        match created {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete_room(&self, id: &str) -> Result<(), StoreError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ROOMS)
            .document_id(id)
            .execute()
            .await
            .map_err(backend)?;
        Ok(())
    }
}
