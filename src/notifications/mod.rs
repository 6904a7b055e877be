//! Notification-sending boundary.
//!
//! A synchronous fire-and-forget surface used by registry consumers after
//! querying. The channel backends here are stand-ins that log the send; real
//! deployments supply their own [`Notification`] implementations.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::diagnostics::DiagnosticLogger;
use crate::error::{RegistryError, Result};

/// Fire-and-forget message delivery.
pub trait Notification: Send + Sync {
    fn send(&self, message: &str);

    fn channel_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Push => "push",
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(NotificationChannel::Email),
            "sms" => Ok(NotificationChannel::Sms),
            "push" => Ok(NotificationChannel::Push),
            other => Err(RegistryError::invalid_argument(
                "channel",
                format!("unknown notification channel '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct EmailNotification;

impl Notification for EmailNotification {
    fn send(&self, message: &str) {
        info!(channel = "email", message, "notification sent");
    }

    fn channel_name(&self) -> &'static str {
        "email"
    }
}

#[derive(Debug, Default)]
pub struct SmsNotification;

impl Notification for SmsNotification {
    fn send(&self, message: &str) {
        info!(channel = "sms", message, "notification sent");
    }

    fn channel_name(&self) -> &'static str {
        "sms"
    }
}

#[derive(Debug, Default)]
pub struct PushNotification;

impl Notification for PushNotification {
    fn send(&self, message: &str) {
        info!(channel = "push", message, "notification sent");
    }

    fn channel_name(&self) -> &'static str {
        "push"
    }
}

/// Resolve a channel to its sender, logging the resolution through the
/// caller's diagnostic logger.
pub async fn create_notification(
    channel: NotificationChannel,
    logger: &dyn DiagnosticLogger,
    cancel: &CancellationToken,
) -> Result<Arc<dyn Notification>> {
    logger
        .info_async(
            &format!("creating {} notification sender", channel.as_str()),
            cancel,
        )
        .await?;

    let sender: Arc<dyn Notification> = match channel {
        NotificationChannel::Email => Arc::new(EmailNotification),
        NotificationChannel::Sms => Arc::new(SmsNotification),
        NotificationChannel::Push => Arc::new(PushNotification),
    };
    Ok(sender)
}

/// Thin wrapper enforcing the only contract the boundary has: no blank
/// messages.
pub struct NotificationService {
    sender: Arc<dyn Notification>,
}

impl NotificationService {
    pub fn new(sender: Arc<dyn Notification>) -> Self {
        Self { sender }
    }

    pub fn send(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(RegistryError::invalid_argument(
                "message",
                "must not be blank",
            ));
        }
        self.sender.send(message);
        Ok(())
    }
}
