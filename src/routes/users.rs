// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes: registration, activation, profile, and removal.

use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{User, UserProfile};
use crate::routes::DataResponse;
use crate::services::registration::{ProfileUpdate, RegisterRequest};
use crate::services::RemovalOutcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Account routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/registered", get(is_registered))
        .route("/users/activate", post(activate))
        .route("/users/activation/resend", post(resend_activation))
        .route("/users/{email}", delete(remove_account))
}

/// The caller's own account, including their match and room IDs.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccountResponse {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub profile: UserProfile,
    pub matches: Vec<String>,
    pub rooms: Vec<String>,
    pub is_admin: bool,
}

impl From<&User> for AccountResponse {
    fn from(user: &User) -> Self {
        Self {
            profile: UserProfile::from(user),
            matches: user.matches.clone(),
            rooms: user.rooms.clone(),
            is_admin: user.is_admin,
        }
    }
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<Vec<UserProfile>>>> {
    let users = state.accounts.list_users(&user).await?;
    Ok(Json(DataResponse::new(
        users.iter().map(UserProfile::from).collect(),
    )))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<DataResponse<UserProfile>>)> {
    let created = state.accounts.register(&user, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message(
            "user created successfully",
            UserProfile::from(&created),
        )),
    ))
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<AccountResponse>>> {
    let me = state.accounts.get_me(&user).await?;
    Ok(Json(DataResponse::with_message(
        "User informations fetched successfully",
        AccountResponse::from(&me),
    )))
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<DataResponse<AccountResponse>>> {
    let me = state.accounts.update_me(&user, update).await?;
    Ok(Json(DataResponse::with_message(
        "user updated",
        AccountResponse::from(&me),
    )))
}

/// Registration check response. `data` is the string "true" or "false".
#[derive(Serialize)]
pub struct RegisteredResponse {
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

async fn is_registered(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RegisteredResponse>> {
    let registered = state.accounts.is_registered(&user).await?;
    tracing::debug!(email = %user.email, registered, "Checked registration");
    Ok(Json(RegisteredResponse {
        data: registered.to_string(),
        email: registered.then(|| user.email.clone()),
    }))
}

#[derive(Deserialize)]
struct ActivateBody {
    key: String,
}

async fn activate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ActivateBody>,
) -> Result<Json<DataResponse<UserProfile>>> {
    let me = state.accounts.activate(&user, &body.key).await?;
    Ok(Json(DataResponse::with_message(
        "account activated",
        UserProfile::from(&me),
    )))
}

async fn resend_activation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<bool>>> {
    state.accounts.resend_activation(&user).await?;
    Ok(Json(DataResponse::with_message("activation key sent", true)))
}

/// Response for account removal.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RemovalResponse {
    /// 0 removed, 1 user record not deleted, 2 aborted (retry)
    pub result: u8,
    pub message: String,
}

/// Remove an account and everything attached to it (self or admin).
async fn remove_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(email): Path<String>,
) -> Result<(StatusCode, Json<RemovalResponse>)> {
    user.ensure_can_act_for(&email)?;
    tracing::info!(actor = %user.email, target = %email, "Account removal requested");

    let outcome = state.removal.remove(&email).await?;
    let (status, message) = match outcome {
        RemovalOutcome::Removed => (StatusCode::OK, "account removed"),
        RemovalOutcome::UserDeleteFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "related data removed but the account could not be deleted",
        ),
        RemovalOutcome::Aborted => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "account removal interrupted, please retry",
        ),
    };

    Ok((
        status,
        Json(RemovalResponse {
            result: outcome.into(),
            message: message.to_string(),
        }),
    ))
}
