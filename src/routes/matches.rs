// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match request routes.
//!
//! Paths keep the names existing clients already call.

use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{Match, UserProfile};
use crate::routes::DataResponse;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Match routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/possibleMatchs", get(possible_matches))
        .route("/requestedMatchsRequests", get(requested_matches))
        .route("/receiptMatchsRequests", get(received_matches))
        .route("/sendRequest", post(send_request))
        .route("/acceptMatchRequest/{match_id}", post(accept_request))
        .route("/denyMatchRequest/{match_id}", post(deny_request))
        .route("/getUserActiveMatches", get(active_matches))
        .route("/getUserOldMatches/{email}", get(old_matches))
}

/// Match as returned by the API.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MatchView {
    pub id: String,
    pub requester_user: String,
    pub recipient_user: String,
    /// 1 pending, 2 active, 3 denied, 4 finished, 5 finished and blocked
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub status: u8,
    pub request_date: String,
    pub room_id: Option<String>,
}

impl From<Match> for MatchView {
    fn from(m: Match) -> Self {
        Self {
            id: m.id,
            requester_user: m.requester_user,
            recipient_user: m.recipient_user,
            status: m.status.into(),
            request_date: format_utc_rfc3339(m.request_date),
            room_id: m.room_id,
        }
    }
}

fn views(matches: Vec<Match>) -> Json<DataResponse<Vec<MatchView>>> {
    Json(DataResponse::new(
        matches.into_iter().map(MatchView::from).collect(),
    ))
}

async fn possible_matches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<Vec<UserProfile>>>> {
    let users = state.matches.list_possible_matches(&user).await?;
    tracing::debug!(email = %user.email, count = users.len(), "Listed possible matches");
    Ok(Json(DataResponse::new(
        users.iter().map(UserProfile::from).collect(),
    )))
}

async fn requested_matches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<Vec<MatchView>>>> {
    Ok(views(state.matches.list_requested(&user).await?))
}

async fn received_matches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<Vec<MatchView>>>> {
    Ok(views(state.matches.list_received(&user).await?))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SendRequestBody {
    #[validate(email)]
    recipient_email: String,
}

async fn send_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SendRequestBody>,
) -> Result<(StatusCode, Json<DataResponse<MatchView>>)> {
    body.validate().map_err(|e| {
        crate::error::AppError::validation("INVALID_FIELD", e.to_string())
    })?;

    let m = state
        .matches
        .send_request(&user, &body.recipient_email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message("match request sent", m.into())),
    ))
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<String>,
) -> Result<Json<DataResponse<MatchView>>> {
    let m = state.matches.accept_request(&match_id, &user).await?;
    Ok(Json(DataResponse::with_message("match request accepted", m.into())))
}

async fn deny_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(match_id): Path<String>,
) -> Result<Json<DataResponse<MatchView>>> {
    let m = state.matches.deny_request(&match_id, &user).await?;
    Ok(Json(DataResponse::with_message("match request denied", m.into())))
}

async fn active_matches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DataResponse<Vec<MatchView>>>> {
    Ok(views(state.matches.list_active(&user).await?))
}

async fn old_matches(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(email): Path<String>,
) -> Result<Json<DataResponse<Vec<MatchView>>>> {
    Ok(views(state.matches.list_old(&user, &email).await?))
}
