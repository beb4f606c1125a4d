// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration, activation, and profile management.

use crate::config::Config;
use crate::db::{StoreError, Stores};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::services::notifier::{dispatch, Notification, Notifier};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

/// Body for creating an account.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description_text: Option<String>,
    #[serde(default)]
    pub languages_to_teach: Vec<String>,
    #[serde(default)]
    pub languages_to_learn: Vec<String>,
}

/// Body for updating one's own profile. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    pub cities: Option<Vec<String>>,
    #[validate(length(max = 2000))]
    pub description_text: Option<String>,
    pub languages_to_teach: Option<Vec<String>>,
    pub languages_to_learn: Option<Vec<String>>,
    pub avatar: Option<String>,
    pub exclude_from_matching: Option<bool>,
}

fn invalid_fields(e: validator::ValidationErrors) -> AppError {
    AppError::validation("INVALID_FIELD", e.to_string())
}

#[derive(Clone)]
pub struct AccountRegistration {
    stores: Stores,
    notifier: Arc<dyn Notifier>,
    config: Arc<Config>,
}

impl AccountRegistration {
    pub fn new(stores: Stores, notifier: Arc<dyn Notifier>, config: Arc<Config>) -> Self {
        Self {
            stores,
            notifier,
            config,
        }
    }

    async fn load_self(&self, actor: &AuthUser) -> Result<User> {
        self.stores
            .users
            .get_user_by_email(&actor.email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", actor.email)))
    }

    /// Sign `email|stamp|nonce` with the activation key.
    fn issue_activation_key(&self, email: &str, stamp: DateTime<Utc>) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.config.activation_signing_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        let payload = format!(
            "{}|{}|{}",
            email,
            stamp.timestamp_millis(),
            uuid::Uuid::new_v4()
        );
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Create an inactive account and send its activation key.
    pub async fn register(&self, actor: &AuthUser, body: RegisterRequest) -> Result<User> {
        let email = match body.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_ascii_lowercase(),
            _ => {
                return Err(AppError::validation(
                    "REQUIRED_FIELD_MISSING",
                    "email is required",
                ))
            }
        };
        body.validate().map_err(invalid_fields)?;

        if !self.config.is_email_domain_allowed(&email) {
            return Err(AppError::validation(
                "EMAIL_DOMAIN_NOT_ALLOWED",
                format!("email domain of {} is not allowed", email),
            ));
        }
        actor.ensure_can_act_for(&email)?;

        let now = Utc::now();
        let mut user = User::new(&email, now);
        user.first_name = body.first_name.unwrap_or_default();
        user.last_name = body.last_name.unwrap_or_default();
        user.cities = body.cities;
        user.description_text = body.description_text.unwrap_or_default();
        user.languages_to_teach = body.languages_to_teach;
        user.languages_to_learn = body.languages_to_learn;
        user.activation_key = Some(self.issue_activation_key(&email, now)?);
        user.activation_stamp = Some(now);

        self.stores.users.create_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => AppError::Conflict("email already exists".to_string()),
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.send_activation(&user);
        Ok(user)
    }

    fn send_activation(&self, user: &User) {
        if let Some(key) = &user.activation_key {
            dispatch(
                self.notifier.clone(),
                Notification::ActivationKey {
                    email: user.email.clone(),
                    key: key.clone(),
                },
            );
        }
    }

    /// Activate the caller's account with the key they were sent.
    pub async fn activate(&self, actor: &AuthUser, key: &str) -> Result<User> {
        let mut user = self.load_self(actor).await?;
        if user.is_activated {
            return Ok(user);
        }

        let expected = user.activation_key.as_deref().unwrap_or("");
        let key_matches: bool = expected.as_bytes().ct_eq(key.trim().as_bytes()).into();
        if expected.is_empty() || !key_matches {
            return Err(AppError::validation(
                "INVALID_ACTIVATION_KEY",
                "activation key is invalid",
            ));
        }

        let ttl = Duration::hours(self.config.activation_ttl_hours);
        let expired = user
            .activation_stamp
            .map_or(true, |stamp| Utc::now() - stamp > ttl);
        if expired {
            return Err(AppError::validation(
                "ACTIVATION_EXPIRED",
                "activation key has expired",
            ));
        }

        user.is_activated = true;
        user.activation_key = None;
        self.stores.users.update_user(&user).await?;

        tracing::info!(user_id = %user.id, "User activated");
        Ok(user)
    }

    /// Issue a fresh activation key for an inactive account.
    pub async fn resend_activation(&self, actor: &AuthUser) -> Result<()> {
        let mut user = self.load_self(actor).await?;
        if user.is_activated {
            return Err(AppError::InvalidState("account already activated".to_string()));
        }

        let now = Utc::now();
        user.activation_key = Some(self.issue_activation_key(&user.email, now)?);
        user.activation_stamp = Some(now);
        self.stores.users.update_user(&user).await?;

        self.send_activation(&user);
        Ok(())
    }

    pub async fn get_me(&self, actor: &AuthUser) -> Result<User> {
        self.load_self(actor).await
    }

    /// Update the caller's profile. The match and room lists are never
    /// written here.
    pub async fn update_me(&self, actor: &AuthUser, update: ProfileUpdate) -> Result<User> {
        update.validate().map_err(invalid_fields)?;
        let mut user = self.load_self(actor).await?;

        if let Some(v) = update.first_name {
            user.first_name = v;
        }
        if let Some(v) = update.last_name {
            user.last_name = v;
        }
        if let Some(v) = update.cities {
            user.cities = v;
        }
        if let Some(v) = update.description_text {
            user.description_text = v;
        }
        if let Some(v) = update.languages_to_teach {
            user.languages_to_teach = v;
        }
        if let Some(v) = update.languages_to_learn {
            user.languages_to_learn = v;
        }
        if let Some(v) = update.avatar {
            // Removal deletes this file, so it must be one of the caller's.
            if !v.is_empty() && !user.owns_avatar_key(&v) {
                return Err(AppError::validation(
                    "INVALID_FIELD",
                    "avatar must be a file key owned by this user",
                ));
            }
            user.avatar = Some(v).filter(|a| !a.is_empty());
        }
        if let Some(v) = update.exclude_from_matching {
            user.exclude_from_matching = v;
        }

        self.stores.users.update_user(&user).await?;
        Ok(user)
    }

    pub async fn is_registered(&self, actor: &AuthUser) -> Result<bool> {
        Ok(self
            .stores
            .users
            .get_user_by_email(&actor.email)
            .await?
            .is_some())
    }

    /// All users (admin only). `NotFound` when there are none.
    pub async fn list_users(&self, actor: &AuthUser) -> Result<Vec<User>> {
        actor.ensure_admin()?;
        let users = self.stores.users.list_users().await?;
        if users.is_empty() {
            return Err(AppError::NotFound("No users found in the system".to_string()));
        }
        Ok(users)
    }
}
