use serde::{Deserialize, Serialize};

use crate::automation::AutoAction;
use crate::commands::realtime::RealtimeOutput;
use crate::types::*;

/// Events that can happen in the app
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Event {
    /// Start a session against the given database
    Initialize(SessionConfig),
    /// Close all realtime subscriptions
    Shutdown,

    Database(DatabaseEvent),
    Pump(PumpEvent),
    Settings(SettingsEvent),
    Notification(NotificationEvent),
    Ui(UiEvent),

    // Control loop (internal events, skipped from serialization)
    #[serde(skip)]
    Automation(AutomationEvent),
}

/// Realtime snapshots, connectivity and session bookkeeping
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum DatabaseEvent {
    /// Current value at a channel's path, `None` if the node does not exist
    Snapshot {
        channel: Channel,
        data: Option<String>,
    },
    Connected,
    Disconnected,
    /// A stream failed or was closed by the server; it is reopened after a pause
    StreamError { channel: Channel, message: String },

    #[serde(skip)]
    DeviceCheckResponse(Result<bool, String>),
    #[serde(skip)]
    Seed { at: i64 },
    #[serde(skip)]
    SeedResponse(Result<(), String>),
    #[serde(skip)]
    RealtimeResponse(RealtimeOutput),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum PumpEvent {
    TogglePump,
    /// Manual override of the reported level, clamped to 0..=100
    SetWaterLevel(u8),

    #[serde(skip)]
    ToggleAt { at: i64 },
    #[serde(skip)]
    SetWaterLevelAt { level: u8, at: i64 },
    #[serde(skip)]
    ToggleResponse(Result<(), String>),
    #[serde(skip)]
    WaterLevelResponse(Result<(), String>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum SettingsEvent {
    SaveSettings(Settings),

    #[serde(skip)]
    SaveSettingsResponse(Result<(), String>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    MarkRead(String),
    ClearAll,

    #[serde(skip)]
    Create {
        drafts: Vec<NotificationDraft>,
        at: i64,
    },
    #[serde(skip)]
    WriteResponse(Result<(), String>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ClearError,
    ClearSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationEvent {
    /// Clock reading for a decision, used to re-check and apply it
    Apply { action: AutoAction, at: i64 },
    WriteResponse(Result<(), String>),
}
