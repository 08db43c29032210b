use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::automation::PendingAction;
use crate::types::*;

/// Trait for types that can handle error messages
///
/// This allows HTTP helper functions to work with Model without directly depending on it.
pub trait ModelErrorHandler {
    fn set_error(&mut self, error: String);
}

/// Application Model - the complete state
/// Also serves as the ViewModel when serialized (session config and
/// bookkeeping fields are excluded)
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct Model {
    // Session
    /// Database connection, including the auth token
    #[serde(skip)]
    pub config: Option<SessionConfig>,

    // Device state
    pub status: Option<DeviceStatus>,
    pub system_status: SystemStatus,
    pub status_tone: StatusTone,
    pub settings: Option<Settings>,

    // History
    #[serde(skip)]
    pub history_records: BTreeMap<String, PumpRecord>,
    pub history: HistorySummary,

    // Notifications
    pub notifications: NotificationList,

    // Automation state
    #[serde(skip)]
    pub pending_auto: Option<PendingAction>,
    /// Last notification key stamp and how often it was reused
    #[serde(skip)]
    pub notification_stamp: Option<(i64, u32)>,

    // UI state
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub success_message: Option<String>,

    // Realtime state
    pub is_connected: bool,
    pub subscriptions: Vec<Channel>,
}

impl Model {
    /// Start a loading operation (sets is_loading=true, clears error)
    pub fn start_loading(&mut self) {
        self.is_loading = true;
        self.clear_error();
    }

    /// Stop loading and clear error
    pub fn stop_loading(&mut self) {
        self.is_loading = false;
        self.clear_error();
    }

    /// Set an error message and stop loading
    pub fn set_error(&mut self, error: String) {
        self.is_loading = false;
        self.error_message = Some(error);
    }

    /// Set an error message, stop loading, and return a render command
    pub fn set_error_and_render(
        &mut self,
        error: String,
    ) -> crux_core::Command<crate::Effect, crate::events::Event> {
        self.set_error(error);
        crux_core::render::render()
    }

    /// Clear the error message without affecting the loading state.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn database(&self) -> Option<&DatabaseConfig> {
        self.config.as_ref().map(|c| &c.database)
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.config.as_ref().map_or(0, |c| c.utc_offset_minutes)
    }

    pub fn runs_automation(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.run_automation)
    }

    /// Store a status snapshot and refresh the derived status values
    pub fn set_status(&mut self, status: DeviceStatus) -> Option<DeviceStatus> {
        self.system_status = status.system_status();
        self.status_tone = status.tone();
        self.status.replace(status)
    }

    pub fn set_history(&mut self, records: BTreeMap<String, PumpRecord>) {
        self.history = HistorySummary::from_records(&records, self.utc_offset_minutes());
        self.history_records = records;
    }

    /// Unique notification key for the given instant
    pub fn next_notification_key(&mut self, at_millis: i64) -> String {
        let reused = match self.notification_stamp {
            Some((stamp, reused)) if stamp == at_millis => reused + 1,
            _ => 0,
        };
        self.notification_stamp = Some((at_millis, reused));

        if reused == 0 {
            format!("ntf_{at_millis}")
        } else {
            format!("ntf_{at_millis}_{reused}")
        }
    }

    /// Forget everything learned from the previous session
    pub fn reset_session(&mut self, config: SessionConfig) {
        *self = Model {
            config: Some(config),
            ..Default::default()
        };
    }
}

impl ModelErrorHandler for Model {
    fn set_error(&mut self, error: String) {
        Model::set_error(self, error)
    }
}
