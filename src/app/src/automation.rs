//! Auto-mode threshold control loop
//!
//! Pure decision logic. The update handlers in `update::automation` feed it
//! snapshots and turn its decisions into database writes.

use std::collections::BTreeMap;

use crate::types::{
    elapsed_secs, iso_timestamp, Alert, DeviceStatus, NotificationDraft, NotificationKind,
    PumpAction, PumpMode, PumpRecord, PumpRunClose, Settings,
};

/// Snapshots that may pass without reflecting a decision before it is dropped
pub const MAX_STALE_SNAPSHOTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAction {
    StartPump,
    StopPump,
}

impl AutoAction {
    /// Pump state the action asks for
    pub fn pump_on(self) -> bool {
        matches!(self, AutoAction::StartPump)
    }
}

pub fn evaluate(status: &DeviceStatus, settings: &Settings) -> Option<AutoAction> {
    if !settings.is_auto_mode {
        return None;
    }

    if status.water_level <= settings.min_water_level && !status.is_pump_on {
        Some(AutoAction::StartPump)
    } else if status.water_level >= settings.max_water_level && status.is_pump_on {
        Some(AutoAction::StopPump)
    } else {
        None
    }
}

/// A decision that was issued and is not yet visible in the device status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub action: AutoAction,
    pub stale_snapshots: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Reflected,
    Waiting,
    Expired,
}

impl PendingAction {
    pub fn new(action: AutoAction) -> Self {
        Self {
            action,
            stale_snapshots: 0,
        }
    }

    /// Account for a new status snapshot
    pub fn observe(&mut self, status: &DeviceStatus) -> Settlement {
        if status.is_pump_on == self.action.pump_on() {
            return Settlement::Reflected;
        }

        self.stale_snapshots = self.stale_snapshots.saturating_add(1);
        if self.stale_snapshots >= MAX_STALE_SNAPSHOTS {
            Settlement::Expired
        } else {
            Settlement::Waiting
        }
    }
}

pub fn event_key(at_millis: i64) -> String {
    format!("evt_{at_millis}")
}

/// Litres pumped in `duration_secs`, rounded to 0.01 L
pub fn amount_liters(pump_flow: f64, duration_secs: u64) -> f64 {
    (pump_flow * duration_secs as f64 / 60.0 * 100.0).round() / 100.0
}

/// Fields that close a running record, if its start time is known
pub fn close_run(record: &PumpRecord, at_millis: i64, pump_flow: f64) -> Option<PumpRunClose> {
    let duration = elapsed_secs(record.started_at()?, at_millis)?;

    Some(PumpRunClose {
        action: PumpAction::PumpOff,
        end_pump: iso_timestamp(at_millis),
        duration,
        amount_liters: amount_liters(pump_flow, duration),
    })
}

/// How a pump run ends in the history
#[derive(Debug, Clone, PartialEq)]
pub enum RunEnd {
    /// Patch the record of the running pump
    Close { key: String, close: PumpRunClose },
    /// No usable running record; write a standalone `PUMP_OFF` record
    Record { key: String, record: PumpRecord },
}

impl RunEnd {
    pub fn key(&self) -> &str {
        match self {
            RunEnd::Close { key, .. } | RunEnd::Record { key, .. } => key,
        }
    }

    pub fn amount_liters(&self) -> f64 {
        match self {
            RunEnd::Close { close, .. } => close.amount_liters,
            RunEnd::Record { record, .. } => record.amount_liters,
        }
    }
}

pub fn end_run(
    status: &DeviceStatus,
    records: &BTreeMap<String, PumpRecord>,
    mode: PumpMode,
    at_millis: i64,
    pump_flow: f64,
) -> RunEnd {
    let running = status
        .current_event_key
        .as_ref()
        .and_then(|key| records.get(key).map(|record| (key, record)));

    if let Some((key, record)) = running {
        if let Some(close) = close_run(record, at_millis, pump_flow) {
            return RunEnd::Close {
                key: key.clone(),
                close,
            };
        }
    }

    let at = iso_timestamp(at_millis);
    RunEnd::Record {
        key: event_key(at_millis),
        record: PumpRecord {
            timestamp: Some(at.clone()),
            action: Some(PumpAction::PumpOff),
            mode,
            water_level: status.water_level,
            end_pump: Some(at),
            ..Default::default()
        },
    }
}

/// Notification for a pump start, if the user wants pumping alerts
pub fn pump_started_notice(
    mode: PumpMode,
    status: &DeviceStatus,
    settings: &Settings,
    event_key: &str,
) -> Option<NotificationDraft> {
    if !settings.wants(Alert::Pumping) {
        return None;
    }

    let draft = match mode {
        PumpMode::Auto => NotificationDraft::new(
            NotificationKind::Info,
            "Pump turned on automatically",
            format!(
                "Water level dropped to {}% (minimum {}%). The pump was started.",
                status.water_level, settings.min_water_level
            ),
        ),
        PumpMode::Manual => NotificationDraft::new(
            NotificationKind::Info,
            "Pump turned on",
            format!(
                "The pump was started manually at {}% water level.",
                status.water_level
            ),
        ),
    };
    Some(draft.related_to(event_key))
}

/// Notification for a pump stop, if the user wants pumping alerts
pub fn pump_stopped_notice(
    mode: PumpMode,
    status: &DeviceStatus,
    settings: &Settings,
    run: &RunEnd,
) -> Option<NotificationDraft> {
    if !settings.wants(Alert::Pumping) {
        return None;
    }

    let draft = match mode {
        PumpMode::Auto => NotificationDraft::new(
            NotificationKind::Success,
            "Pump turned off automatically",
            format!(
                "Water level reached {}% (maximum {}%). The pump was stopped after pumping {:.2} L.",
                status.water_level,
                settings.max_water_level,
                run.amount_liters()
            ),
        ),
        PumpMode::Manual => NotificationDraft::new(
            NotificationKind::Success,
            "Pump turned off",
            format!(
                "The pump was stopped manually at {}% water level after pumping {:.2} L.",
                status.water_level,
                run.amount_liters()
            ),
        ),
    };
    Some(draft.related_to(run.key()))
}

/// Alerts raised by the change between two consecutive status snapshots
pub fn status_alerts(
    previous: &DeviceStatus,
    next: &DeviceStatus,
    settings: &Settings,
) -> Vec<NotificationDraft> {
    let mut alerts = Vec::new();

    if settings.wants(Alert::Connection) && previous.esp_connected != next.esp_connected {
        alerts.push(if next.esp_connected {
            NotificationDraft::new(
                NotificationKind::Success,
                "Device reconnected",
                "The pump controller is back online.",
            )
        } else {
            NotificationDraft::new(
                NotificationKind::Error,
                "Device disconnected",
                "The pump controller lost its connection.",
            )
        });
    }

    let crossed_low = previous.water_level > settings.min_water_level
        && next.water_level <= settings.min_water_level;
    if settings.wants(Alert::LowWater) && crossed_low && !settings.is_auto_mode {
        alerts.push(NotificationDraft::new(
            NotificationKind::Warning,
            "Low water level",
            format!(
                "Water level is {}%, at or below the minimum of {}%. Auto mode is off.",
                next.water_level, settings.min_water_level
            ),
        ));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(water_level: u8, is_pump_on: bool) -> DeviceStatus {
        DeviceStatus {
            water_level,
            is_pump_on,
            ..Default::default()
        }
    }

    #[test]
    fn evaluate_respects_thresholds() {
        let settings = Settings::default();

        assert_eq!(evaluate(&status(20, false), &settings), Some(AutoAction::StartPump));
        assert_eq!(evaluate(&status(20, true), &settings), None);
        assert_eq!(evaluate(&status(90, true), &settings), Some(AutoAction::StopPump));
        assert_eq!(evaluate(&status(90, false), &settings), None);
        assert_eq!(evaluate(&status(50, true), &settings), None);
        assert_eq!(evaluate(&status(50, false), &settings), None);
    }

    #[test]
    fn evaluate_does_nothing_in_manual_mode() {
        let settings = Settings {
            is_auto_mode: false,
            ..Default::default()
        };
        assert_eq!(evaluate(&status(0, false), &settings), None);
        assert_eq!(evaluate(&status(100, true), &settings), None);
    }

    #[test]
    fn pending_action_expires_after_stale_snapshots() {
        let mut pending = PendingAction::new(AutoAction::StartPump);

        assert_eq!(pending.observe(&status(10, false)), Settlement::Waiting);
        assert_eq!(pending.observe(&status(10, false)), Settlement::Waiting);
        assert_eq!(pending.observe(&status(10, false)), Settlement::Expired);
    }

    #[test]
    fn pending_action_settles_when_reflected() {
        let mut pending = PendingAction::new(AutoAction::StopPump);

        assert_eq!(pending.observe(&status(95, true)), Settlement::Waiting);
        assert_eq!(pending.observe(&status(95, false)), Settlement::Reflected);
    }

    #[test]
    fn amount_is_rounded_to_centilitres() {
        assert_eq!(amount_liters(1.6, 330), 8.8);
        assert_eq!(amount_liters(1.6, 100), 2.67);
        assert_eq!(amount_liters(1.6, 0), 0.0);
    }

    #[test]
    fn end_run_closes_the_running_record() {
        let start = "2024-05-01T10:00:00.000Z";
        let records = BTreeMap::from([(
            "evt_1".to_string(),
            PumpRecord::started(PumpMode::Auto, 20, start),
        )]);
        let running = DeviceStatus {
            is_pump_on: true,
            current_event_key: Some("evt_1".to_string()),
            ..Default::default()
        };
        // 2024-05-01T10:05:30Z
        let at = 1_714_557_930_000;

        let run = end_run(&running, &records, PumpMode::Auto, at, 1.6);

        assert_eq!(
            run,
            RunEnd::Close {
                key: "evt_1".to_string(),
                close: PumpRunClose {
                    action: PumpAction::PumpOff,
                    end_pump: "2024-05-01T10:05:30.000Z".to_string(),
                    duration: 330,
                    amount_liters: 8.8,
                },
            }
        );
    }

    #[test]
    fn end_run_without_known_record_writes_a_new_one() {
        let running = DeviceStatus {
            is_pump_on: true,
            water_level: 91,
            current_event_key: Some("evt_gone".to_string()),
            ..Default::default()
        };

        let run = end_run(&running, &BTreeMap::new(), PumpMode::Manual, 1_714_557_600_000, 1.6);

        let RunEnd::Record { key, record } = run else {
            panic!("expected a new record");
        };
        assert_eq!(key, "evt_1714557600000");
        assert_eq!(record.action, Some(PumpAction::PumpOff));
        assert_eq!(record.water_level, 91);
        assert_eq!(record.duration, 0);
        assert_eq!(record.start_pump, None);
    }

    #[test]
    fn connection_changes_raise_alerts() {
        let settings = Settings::default();
        let online = status(50, false);
        let offline = DeviceStatus {
            esp_connected: false,
            ..online.clone()
        };

        let lost = status_alerts(&online, &offline, &settings);
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].kind, NotificationKind::Error);
        assert_eq!(lost[0].title, "Device disconnected");

        let back = status_alerts(&offline, &online, &settings);
        assert_eq!(back[0].kind, NotificationKind::Success);

        let muted = Settings {
            connection_alert: false,
            ..Default::default()
        };
        assert!(status_alerts(&online, &offline, &muted).is_empty());
    }

    #[test]
    fn low_water_alert_only_without_auto_mode() {
        let manual = Settings {
            is_auto_mode: false,
            ..Default::default()
        };

        let alerts = status_alerts(&status(25, false), &status(20, false), &manual);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, NotificationKind::Warning);

        // already below, no new crossing
        assert!(status_alerts(&status(18, false), &status(15, false), &manual).is_empty());
        // auto mode handles it by pumping
        assert!(status_alerts(&status(25, false), &status(20, false), &Settings::default()).is_empty());
    }

    #[test]
    fn pumping_notices_follow_alert_switch() {
        let settings = Settings::default();
        let started = pump_started_notice(PumpMode::Auto, &status(18, false), &settings, "evt_9");

        let started = started.unwrap();
        assert_eq!(started.title, "Pump turned on automatically");
        assert_eq!(started.related_event.as_deref(), Some("evt_9"));

        let muted = Settings {
            pumping_alert: false,
            ..Default::default()
        };
        assert_eq!(
            pump_started_notice(PumpMode::Manual, &status(18, false), &muted, "evt_9"),
            None
        );
    }
}
