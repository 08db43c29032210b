use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEVICE_ID: &str = "device1";

/// Realtime channels the core subscribes to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    Status,
    Settings,
    History,
    Notifications,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Status,
        Channel::Settings,
        Channel::History,
        Channel::Notifications,
    ];
}

/// Connection parameters for the realtime database
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Database root, e.g. `https://<project>.firebasedatabase.app`
    pub url: String,
    /// Optional REST auth token (ID token or database secret)
    #[serde(default)]
    pub auth_token: Option<String>,
    pub device_id: String,
}

impl DatabaseConfig {
    pub fn device_path(&self) -> String {
        format!("devices/{}", self.device_id)
    }

    pub fn status_path(&self) -> String {
        format!("devices/{}/status", self.device_id)
    }

    pub fn settings_path(&self) -> String {
        format!("devices/{}/settings", self.device_id)
    }

    pub fn events_path(&self) -> String {
        format!("history/{}/events", self.device_id)
    }

    pub fn event_path(&self, key: &str) -> String {
        format!("history/{}/events/{key}", self.device_id)
    }

    pub fn notifications_path(&self) -> String {
        format!("notifications/{}", self.device_id)
    }

    pub fn notification_path(&self, id: &str) -> String {
        format!("notifications/{}/{id}", self.device_id)
    }

    pub fn channel_path(&self, channel: Channel) -> String {
        match channel {
            Channel::Status => self.status_path(),
            Channel::Settings => self.settings_path(),
            Channel::History => self.events_path(),
            Channel::Notifications => self.notifications_path(),
        }
    }
}

/// Everything a shell has to tell the core when it starts a session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub database: DatabaseConfig,
    /// Offset used when grouping history by day and formatting times
    pub utc_offset_minutes: i32,
    /// Whether this shell runs the auto-mode control loop
    pub run_automation: bool,
}

/// Wall clock reading supplied by the shell
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClockReading {
    pub epoch_millis: i64,
}

/// Format epoch milliseconds the way the database stores timestamps
pub fn iso_timestamp(epoch_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Seconds between an ISO timestamp and a clock reading, clamped at zero
pub fn elapsed_secs(start: &str, now_millis: i64) -> Option<u64> {
    let start = parse_timestamp(start)?;
    let elapsed = (now_millis - start.timestamp_millis()) / 1000;
    Some(elapsed.max(0) as u64)
}

pub fn local_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
}

/// `dd/mm/yyyy` and `HH:MM` in the given offset
pub fn local_date_time(timestamp: &DateTime<Utc>, utc_offset_minutes: i32) -> (String, String) {
    let local = timestamp.with_timezone(&local_offset(utc_offset_minutes));
    (
        local.format("%d/%m/%Y").to_string(),
        local.format("%H:%M").to_string(),
    )
}

/// Any number as a percentage, rounded and clamped to `0..=100`
pub fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
