use std::fmt;

use serde::{Deserialize, Serialize};
use serde_valid::Validate;

const DEFAULT_MIN_WATER_LEVEL: u8 = 20;
const DEFAULT_MAX_WATER_LEVEL: u8 = 90;
const DEFAULT_SENSOR_TO_BOTTOM_CM: f64 = 14.05;
const DEFAULT_TANK_HEIGHT_CM: f64 = 7.0;
const DEFAULT_PUMP_FLOW_LPM: f64 = 1.6;

/// Device settings as stored under `devices/{id}/settings`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub is_auto_mode: bool,
    #[validate(maximum = 100)]
    pub min_water_level: u8,
    #[validate(maximum = 100)]
    pub max_water_level: u8,
    pub notifications_enabled: bool,
    pub low_water_alert: bool,
    pub pumping_alert: bool,
    pub connection_alert: bool,
    /// Distance from the level sensor to the tank bottom in cm
    #[validate(exclusive_minimum = 0.0)]
    pub sensor_to_bottom: f64,
    /// Usable tank height in cm
    #[validate(exclusive_minimum = 0.0)]
    pub tank_height: f64,
    /// Pump flow in litres per minute
    #[validate(exclusive_minimum = 0.0)]
    pub pump_flow: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_auto_mode: true,
            min_water_level: DEFAULT_MIN_WATER_LEVEL,
            max_water_level: DEFAULT_MAX_WATER_LEVEL,
            notifications_enabled: true,
            low_water_alert: true,
            pumping_alert: true,
            connection_alert: true,
            sensor_to_bottom: DEFAULT_SENSOR_TO_BOTTOM_CM,
            tank_height: DEFAULT_TANK_HEIGHT_CM,
            pump_flow: DEFAULT_PUMP_FLOW_LPM,
        }
    }
}

/// Notification categories a user can switch off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    LowWater,
    Pumping,
    Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    Invalid(String),
    ThresholdOrder { min: u8, max: u8 },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(reason) => write!(f, "invalid settings: {reason}"),
            Self::ThresholdOrder { min, max } => write!(
                f,
                "minimum water level ({min}%) must be below maximum water level ({max}%)"
            ),
        }
    }
}

impl Settings {
    pub fn wants(&self, alert: Alert) -> bool {
        self.notifications_enabled
            && match alert {
                Alert::LowWater => self.low_water_alert,
                Alert::Pumping => self.pumping_alert,
                Alert::Connection => self.connection_alert,
            }
    }

    /// Field ranges plus the ordering of the two thresholds
    pub fn check(&self) -> Result<(), SettingsError> {
        self.validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;

        if self.min_water_level >= self.max_water_level {
            return Err(SettingsError::ThresholdOrder {
                min: self.min_water_level,
                max: self.max_water_level,
            });
        }

        Ok(())
    }
}

/// Settings as found in the database. Devices set up before the tank
/// geometry existed lack those fields or hold zero there.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StoredSettings {
    is_auto_mode: bool,
    min_water_level: u8,
    max_water_level: u8,
    notifications_enabled: bool,
    low_water_alert: bool,
    pumping_alert: bool,
    connection_alert: bool,
    sensor_to_bottom: Option<f64>,
    tank_height: Option<f64>,
    pump_flow: Option<f64>,
}

impl Default for StoredSettings {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            is_auto_mode: settings.is_auto_mode,
            min_water_level: settings.min_water_level,
            max_water_level: settings.max_water_level,
            notifications_enabled: settings.notifications_enabled,
            low_water_alert: settings.low_water_alert,
            pumping_alert: settings.pumping_alert,
            connection_alert: settings.connection_alert,
            sensor_to_bottom: None,
            tank_height: None,
            pump_flow: None,
        }
    }
}

// missing, zero or negative geometry means "not configured yet"
fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| *v > 0.0).unwrap_or(default)
}

impl From<StoredSettings> for Settings {
    fn from(stored: StoredSettings) -> Self {
        Self {
            is_auto_mode: stored.is_auto_mode,
            min_water_level: stored.min_water_level,
            max_water_level: stored.max_water_level,
            notifications_enabled: stored.notifications_enabled,
            low_water_alert: stored.low_water_alert,
            pumping_alert: stored.pumping_alert,
            connection_alert: stored.connection_alert,
            sensor_to_bottom: positive_or(stored.sensor_to_bottom, DEFAULT_SENSOR_TO_BOTTOM_CM),
            tank_height: positive_or(stored.tank_height, DEFAULT_TANK_HEIGHT_CM),
            pump_flow: positive_or(stored.pump_flow, DEFAULT_PUMP_FLOW_LPM),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_geometry_missing_from_older_devices() {
        let stored: StoredSettings = serde_json::from_str(
            r#"{"isAutoMode":false,"minWaterLevel":30,"maxWaterLevel":80,"pumpFlow":0}"#,
        )
        .unwrap();
        let settings = Settings::from(stored);

        assert!(!settings.is_auto_mode);
        assert_eq!(settings.min_water_level, 30);
        assert_eq!(settings.max_water_level, 80);
        assert_eq!(settings.pump_flow, DEFAULT_PUMP_FLOW_LPM);
        assert_eq!(settings.tank_height, DEFAULT_TANK_HEIGHT_CM);
        assert!(settings.pumping_alert);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Settings::default().check(), Ok(()));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let settings = Settings {
            min_water_level: 80,
            max_water_level: 80,
            ..Default::default()
        };
        assert_eq!(
            settings.check(),
            Err(SettingsError::ThresholdOrder { min: 80, max: 80 })
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let settings = Settings {
            max_water_level: 120,
            ..Default::default()
        };
        assert!(matches!(settings.check(), Err(SettingsError::Invalid(_))));

        let settings = Settings {
            pump_flow: 0.0,
            ..Default::default()
        };
        assert!(matches!(settings.check(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn master_switch_silences_every_alert() {
        let settings = Settings {
            notifications_enabled: false,
            ..Default::default()
        };
        assert!(!settings.wants(Alert::Pumping));
        assert!(!settings.wants(Alert::Connection));
        assert!(Settings::default().wants(Alert::LowWater));
    }
}
