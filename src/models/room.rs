// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Chat room model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Match;

/// Chat room opened for an active match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Room ID (also used as document ID)
    pub id: String,
    /// Match this room belongs to
    pub match_id: String,
    /// Participant user IDs, sorted
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Deterministic room ID for a match.
    ///
    /// Derived from the match ID and the sorted participant pair, so a retried
    /// accept always targets the same room document.
    pub fn id_for(m: &Match) -> String {
        let mut hasher = Sha256::new();
        hasher.update(m.id.as_bytes());
        hasher.update(b"|");
        hasher.update(m.pair_key().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn for_match(m: &Match, now: DateTime<Utc>) -> Self {
        let mut participants = vec![m.requester_user.clone(), m.recipient_user.clone()];
        participants.sort();
        Self {
            id: Self::id_for(m),
            match_id: m.id.clone(),
            participants,
            created_at: now,
        }
    }
}
