// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque user ID (also used as document ID)
    pub id: String,
    /// Email address, unique across all users
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    pub description_text: String,
    #[serde(default)]
    pub languages_to_teach: Vec<String>,
    #[serde(default)]
    pub languages_to_learn: Vec<String>,
    /// Avatar file key in file storage
    #[serde(default)]
    pub avatar: Option<String>,
    /// Match IDs this user participates in, in creation order
    #[serde(default)]
    pub matches: Vec<String>,
    /// Room IDs this user participates in
    #[serde(default)]
    pub rooms: Vec<String>,
    /// Hide this user from other users' possible matches
    #[serde(default)]
    pub exclude_from_matching: bool,
    #[serde(default)]
    pub is_activated: bool,
    #[serde(default)]
    pub activation_key: Option<String>,
    #[serde(default)]
    pub activation_stamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New, not yet activated user with an empty profile.
    pub fn new(email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            cities: Vec::new(),
            description_text: String::new(),
            languages_to_teach: Vec::new(),
            languages_to_learn: Vec::new(),
            avatar: None,
            matches: Vec::new(),
            rooms: Vec::new(),
            exclude_from_matching: false,
            is_activated: false,
            activation_key: None,
            activation_stamp: None,
            is_admin: false,
            created_at: now,
        }
    }

    /// Whether either user can teach a language the other wants to learn.
    pub fn shares_language_with(&self, other: &User) -> bool {
        let teaches = |a: &User, b: &User| {
            a.languages_to_teach.iter().any(|lang| {
                b.languages_to_learn
                    .iter()
                    .any(|want| want.eq_ignore_ascii_case(lang))
            })
        };
        teaches(self, other) || teaches(other, self)
    }

    /// Whether `key` names a file belonging to this user.
    ///
    /// Avatar keys are the user ID, optionally followed by `.` or `-` and a
    /// suffix, e.g. `<id>.png`.
    pub fn owns_avatar_key(&self, key: &str) -> bool {
        match key.strip_prefix(self.id.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('-'),
            None => false,
        }
    }

    /// Copy the fields written by a profile update, leaving identity and the
    /// match/room back-references alone.
    pub fn copy_profile_from(&mut self, other: &User) {
        self.first_name = other.first_name.clone();
        self.last_name = other.last_name.clone();
        self.cities = other.cities.clone();
        self.description_text = other.description_text.clone();
        self.languages_to_teach = other.languages_to_teach.clone();
        self.languages_to_learn = other.languages_to_learn.clone();
        self.avatar = other.avatar.clone();
        self.exclude_from_matching = other.exclude_from_matching;
        self.is_activated = other.is_activated;
        self.activation_key = other.activation_key.clone();
        self.activation_stamp = other.activation_stamp;
        self.is_admin = other.is_admin;
    }
}

/// Stored field names written by [`User::copy_profile_from`].
pub const PROFILE_FIELDS: &[&str] = &[
    "firstName",
    "lastName",
    "cities",
    "descriptionText",
    "languagesToTeach",
    "languagesToLearn",
    "avatar",
    "excludeFromMatching",
    "isActivated",
    "activationKey",
    "activationStamp",
    "isAdmin",
];

/// Public view of a user, without back-references or activation secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub cities: Vec<String>,
    pub description_text: String,
    pub languages_to_teach: Vec<String>,
    pub languages_to_learn: Vec<String>,
    pub avatar: Option<String>,
    pub exclude_from_matching: bool,
    pub is_activated: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            cities: user.cities.clone(),
            description_text: user.description_text.clone(),
            languages_to_teach: user.languages_to_teach.clone(),
            languages_to_learn: user.languages_to_learn.clone(),
            avatar: user.avatar.clone(),
            exclude_from_matching: user.exclude_from_matching,
            is_activated: user.is_activated,
        }
    }
}

/// Email index entry reserving an address for one user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailIndex {
    pub email: String,
    pub user_id: String,
}
