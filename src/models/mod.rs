// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod matches;
pub mod room;
pub mod user;

pub use matches::{pair_key, Match, MatchStatus, PairLock};
pub use room::Room;
pub use user::{EmailIndex, User, UserProfile, PROFILE_FIELDS};
