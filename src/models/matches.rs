// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Match model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a match.
///
/// Stored and served as its integer code for compatibility with existing
/// clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MatchStatus {
    /// Request sent, waiting for the recipient.
    Pending = 1,
    /// Accepted; a room exists for the pair.
    Active = 2,
    /// Recipient refused the request.
    Denied = 3,
    Finished = 4,
    /// Finished and one side blocked the other.
    FinishedBlocked = 5,
}

impl MatchStatus {
    /// Terminal statuses can no longer transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MatchStatus::Denied | MatchStatus::Finished | MatchStatus::FinishedBlocked
        )
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Pending, MatchStatus::Active)
                | (MatchStatus::Pending, MatchStatus::Denied)
                | (MatchStatus::Active, MatchStatus::Finished)
                | (MatchStatus::Active, MatchStatus::FinishedBlocked)
        )
    }
}

impl From<MatchStatus> for u8 {
    fn from(status: MatchStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for MatchStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(MatchStatus::Pending),
            2 => Ok(MatchStatus::Active),
            3 => Ok(MatchStatus::Denied),
            4 => Ok(MatchStatus::Finished),
            5 => Ok(MatchStatus::FinishedBlocked),
            other => Err(format!("unknown match status {}", other)),
        }
    }
}

/// A match between two users, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Match ID (also used as document ID)
    pub id: String,
    /// User ID of the user who sent the request
    pub requester_user: String,
    /// User ID of the user who received the request
    pub recipient_user: String,
    pub status: MatchStatus,
    pub request_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Room created when the match became active
    #[serde(default)]
    pub room_id: Option<String>,
}

impl Match {
    /// New pending request from `requester` to `recipient`.
    pub fn new_request(requester: &str, recipient: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requester_user: requester.to_string(),
            recipient_user: recipient.to_string(),
            status: MatchStatus::Pending,
            request_date: now,
            updated_at: now,
            room_id: None,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.requester_user == user_id || self.recipient_user == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.recipient_user == user_id {
            &self.requester_user
        } else {
            &self.recipient_user
        }
    }

    /// Order-independent key for the participant pair.
    pub fn pair_key(&self) -> String {
        pair_key(&self.requester_user, &self.recipient_user)
    }
}

/// Order-independent key identifying the pair `{a, b}`.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

/// Lock record held while a pair has a non-terminal match.
///
/// Document ID is the pair key; created insert-if-absent so two concurrent
/// requests for the same pair cannot both succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairLock {
    pub pair_key: String,
    pub match_id: String,
}
