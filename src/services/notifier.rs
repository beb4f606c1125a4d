// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fire-and-forget user notifications.
//!
//! Delivery (mail templates, SMTP) lives outside this service. Failures are
//! logged and never reach the operation that triggered the notification.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Events users are notified about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    MatchRequested {
        recipient_email: String,
        requester_email: String,
    },
    MatchAccepted {
        requester_email: String,
        recipient_email: String,
    },
    ActivationKey {
        email: String,
        key: String,
    },
}

impl Notification {
    /// Address the notification goes to.
    pub fn recipient(&self) -> &str {
        match self {
            Notification::MatchRequested {
                recipient_email, ..
            } => recipient_email,
            Notification::MatchAccepted {
                requester_email, ..
            } => requester_email,
            Notification::ActivationKey { email, .. } => email,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Notifier that only records the event in the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let kind = match notification {
            Notification::MatchRequested { .. } => "match_requested",
            Notification::MatchAccepted { .. } => "match_accepted",
            Notification::ActivationKey { .. } => "activation_key",
        };
        tracing::info!(to = notification.recipient(), kind, "Notification queued");
        Ok(())
    }
}

/// Send in a background task.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            tracing::warn!(
                error = %e,
                to = notification.recipient(),
                "Failed to send notification"
            );
        }
    });
}
