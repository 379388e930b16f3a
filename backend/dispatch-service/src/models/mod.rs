use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device platform, each served by its own push transport
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// Storage code (1 = Android, 2 = iOS)
    pub fn code(&self) -> i16 {
        match self {
            Platform::Android => 1,
            Platform::Ios => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Platform::Android),
            2 => Some(Platform::Ios),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery progress of a notification
///
/// Only moves forward: `NotSent -> InProgress -> Sent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SentState {
    NotSent,
    InProgress,
    Sent,
}

impl SentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentState::NotSent => "not_sent",
            SentState::InProgress => "in_progress",
            SentState::Sent => "sent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_sent" => Some(SentState::NotSent),
            "in_progress" => Some(SentState::InProgress),
            "sent" => Some(SentState::Sent),
            _ => None,
        }
    }

    /// `Sent` is terminal; other states may repeat or move forward
    pub fn can_advance_to(&self, next: SentState) -> bool {
        *self != SentState::Sent && next >= *self
    }
}

/// Narrows the devices a notification targets; both criteria intersect
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceFilter {
    pub platform: Option<Platform>,
    pub user_id: Option<Uuid>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        self.platform.map_or(true, |p| device.platform == p)
            && self.user_id.map_or(true, |u| device.user_id == Some(u))
    }
}

/// Broadcast notification record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,

    /// Opaque payload forwarded to every transport
    pub payload: serde_json::Value,

    /// Disabled notifications are never expanded
    pub active: bool,
    pub sent: SentState,

    pub filter: DeviceFilter,

    pub date_created: DateTime<Utc>,
    pub date_started: Option<DateTime<Utc>>,
    pub date_finished: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(title: String, payload: serde_json::Value, filter: DeviceFilter) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            payload,
            active: true,
            sent: SentState::NotSent,
            filter,
            date_created: Utc::now(),
            date_started: None,
            date_finished: None,
        }
    }

    /// Enter `InProgress` and stamp `date_started`
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.advance(SentState::InProgress)?;
        self.date_started = Some(now);
        Ok(())
    }

    /// Enter `Sent` and stamp `date_finished`
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.advance(SentState::Sent)?;
        let started = *self.date_started.get_or_insert(now);
        self.date_finished = Some(now.max(started));
        Ok(())
    }

    fn advance(&mut self, next: SentState) -> Result<(), InvalidTransition> {
        if !self.sent.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.sent,
                to: next,
            });
        }
        self.sent = next;
        Ok(())
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot {
            id: Some(self.id),
            payload: self.payload.clone(),
            filter: self.filter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move notification from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: SentState,
    pub to: SentState,
}

/// What scheduled units carry between stages
///
/// `id` is `None` for submissions that were never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSnapshot {
    pub id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub filter: DeviceFilter,
}

/// Registered push target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: Uuid,

    /// Provider registration token; unique together with `platform`
    pub key: String,
    pub platform: Platform,
    pub user_id: Option<Uuid>,
    pub date_created: DateTime<Utc>,
}

impl Device {
    pub fn new(key: String, platform: Platform, user_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            platform,
            user_id,
            date_created: Utc::now(),
        }
    }
}
