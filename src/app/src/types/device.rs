use serde::{Deserialize, Serialize};

use super::common::clamp_percent;
use super::settings::Settings;

/// Level at or above which an idle tank counts as full
pub const FULL_LEVEL_PERCENT: u8 = 90;
/// Level at or below which the dashboard flags low water
pub const LOW_LEVEL_PERCENT: u8 = 20;

const INITIAL_WATER_LEVEL: u8 = 45;

pub const DEFAULT_DEVICE_NAME: &str = "Water pump";

/// Device status as published under `devices/{id}/status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStatus {
    pub is_pump_on: bool,
    pub water_level: u8,
    pub wifi_connected: bool,
    pub esp_connected: bool,
    /// History record of the pump run in progress
    pub current_event_key: Option<String>,
    pub last_updated: Option<String>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            is_pump_on: false,
            water_level: INITIAL_WATER_LEVEL,
            wifi_connected: true,
            esp_connected: true,
            current_event_key: None,
            last_updated: None,
        }
    }
}

/// Device status as the firmware writes it; the level may be any number
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StoredDeviceStatus {
    is_pump_on: bool,
    water_level: f64,
    wifi_connected: bool,
    esp_connected: bool,
    current_event_key: Option<String>,
    last_updated: Option<String>,
}

impl Default for StoredDeviceStatus {
    fn default() -> Self {
        let status = DeviceStatus::default();
        Self {
            is_pump_on: status.is_pump_on,
            water_level: f64::from(status.water_level),
            wifi_connected: status.wifi_connected,
            esp_connected: status.esp_connected,
            current_event_key: status.current_event_key,
            last_updated: status.last_updated,
        }
    }
}

impl From<StoredDeviceStatus> for DeviceStatus {
    fn from(stored: StoredDeviceStatus) -> Self {
        Self {
            is_pump_on: stored.is_pump_on,
            water_level: clamp_percent(stored.water_level),
            wifi_connected: stored.wifi_connected,
            esp_connected: stored.esp_connected,
            current_event_key: stored.current_event_key,
            last_updated: stored.last_updated,
        }
    }
}

/// Fields written when the pump is switched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PumpStatePatch {
    pub is_pump_on: bool,
    pub last_updated: String,
    /// `null` removes the key when the pump stops
    pub current_event_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaterLevelPatch {
    pub water_level: u8,
    pub last_updated: String,
}

/// Complete `devices/{id}` node written for a new device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceNode {
    pub name: String,
    pub status: DeviceStatus,
    pub settings: Settings,
}

impl DeviceNode {
    pub fn initial(last_updated: String) -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            status: DeviceStatus {
                last_updated: Some(last_updated),
                ..Default::default()
            },
            settings: Settings::default(),
        }
    }
}

/// What the system is doing right now
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SystemStatus {
    Pumping,
    Full,
    #[default]
    Waiting,
}

/// Semantic tone a presentation layer maps to a colour
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusTone {
    Pumping,
    Full,
    Low,
    #[default]
    Waiting,
}

impl DeviceStatus {
    pub fn system_status(&self) -> SystemStatus {
        if self.is_pump_on {
            SystemStatus::Pumping
        } else if self.water_level >= FULL_LEVEL_PERCENT {
            SystemStatus::Full
        } else {
            SystemStatus::Waiting
        }
    }

    pub fn tone(&self) -> StatusTone {
        if self.is_pump_on {
            StatusTone::Pumping
        } else if self.water_level >= FULL_LEVEL_PERCENT {
            StatusTone::Full
        } else if self.water_level <= LOW_LEVEL_PERCENT {
            StatusTone::Low
        } else {
            StatusTone::Waiting
        }
    }
}
