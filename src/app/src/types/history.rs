use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::common::{clamp_percent, local_date_time, parse_timestamp};

/// Records the history view keeps
pub const HISTORY_LIMIT: usize = 20;

pub const UNKNOWN_DAY: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpMode {
    #[serde(alias = "Auto")]
    Auto,
    #[default]
    #[serde(alias = "Manual")]
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpAction {
    PumpOn,
    PumpOff,
    SystemInit,
}

/// One pump run as stored under `history/{id}/events/{key}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PumpRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<PumpAction>,
    pub mode: PumpMode,
    pub water_level: u8,
    /// Run time in seconds
    pub duration: u64,
    pub amount_liters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_pump: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_pump: Option<String>,
}

impl PumpRecord {
    /// Record written when a pump run begins
    pub fn started(mode: PumpMode, water_level: u8, at: &str) -> Self {
        Self {
            timestamp: Some(at.to_string()),
            action: Some(PumpAction::PumpOn),
            mode,
            water_level,
            duration: 0,
            amount_liters: 0.0,
            start_pump: Some(at.to_string()),
            end_pump: Some(at.to_string()),
        }
    }

    /// When the run started; older auto records only carry `timestamp`
    pub fn started_at(&self) -> Option<&str> {
        self.start_pump.as_deref().or(self.timestamp.as_deref())
    }

    pub fn is_auto(&self) -> bool {
        self.mode == PumpMode::Auto
    }
}

/// Pump record as found in the database; the level may be any number
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StoredPumpRecord {
    timestamp: Option<String>,
    action: Option<PumpAction>,
    mode: PumpMode,
    water_level: f64,
    duration: u64,
    amount_liters: f64,
    start_pump: Option<String>,
    end_pump: Option<String>,
}

impl From<StoredPumpRecord> for PumpRecord {
    fn from(stored: StoredPumpRecord) -> Self {
        Self {
            timestamp: stored.timestamp,
            action: stored.action,
            mode: stored.mode,
            water_level: clamp_percent(stored.water_level),
            duration: stored.duration,
            amount_liters: stored.amount_liters,
            start_pump: stored.start_pump,
            end_pump: stored.end_pump,
        }
    }
}

/// Fields patched onto a record when its pump run ends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PumpRunClose {
    pub action: PumpAction,
    pub end_pump: String,
    pub duration: u64,
    pub amount_liters: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub date: String,
    pub time: String,
    pub duration_minutes: u64,
    pub amount_liters: f64,
    pub is_auto: bool,
    pub start_pump: Option<String>,
    pub end_pump: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySegment {
    pub id: String,
    pub value: f64,
    pub time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub day: String,
    pub value: f64,
    pub segments: Vec<DailySegment>,
}

/// List and chart data derived from the history records
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub entries: Vec<HistoryEntry>,
    pub daily: Vec<DailyTotal>,
    pub total_water: f64,
    pub max_value: f64,
}

impl HistorySummary {
    pub fn from_records(records: &BTreeMap<String, PumpRecord>, utc_offset_minutes: i32) -> Self {
        let mut recent: Vec<(&String, &PumpRecord)> = records.iter().collect();
        recent.sort_by_key(|(_, record)| record.started_at().and_then(parse_timestamp));
        let skip = recent.len().saturating_sub(HISTORY_LIMIT);

        let mut entries = Vec::new();
        let mut days: HashMap<String, (Option<NaiveDate>, DailyTotal)> = HashMap::new();

        for (id, record) in recent.into_iter().skip(skip) {
            let started = record.started_at().and_then(parse_timestamp);
            let (date, time) = match &started {
                Some(ts) => local_date_time(ts, utc_offset_minutes),
                None => (UNKNOWN_DAY.to_string(), UNKNOWN_DAY.to_string()),
            };

            let (_, day) = days.entry(date.clone()).or_insert_with(|| {
                let sort_key = NaiveDate::parse_from_str(&date, "%d/%m/%Y").ok();
                (
                    sort_key,
                    DailyTotal {
                        day: date.clone(),
                        ..Default::default()
                    },
                )
            });
            day.value += record.amount_liters;
            day.segments.push(DailySegment {
                id: id.clone(),
                value: record.amount_liters,
                time: time.clone(),
            });

            entries.push((
                started,
                HistoryEntry {
                    id: id.clone(),
                    date,
                    time,
                    duration_minutes: record.duration / 60,
                    amount_liters: record.amount_liters,
                    is_auto: record.is_auto(),
                    start_pump: record.start_pump.clone(),
                    end_pump: record.end_pump.clone(),
                },
            ));
        }

        // newest first, undated records last
        entries.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        // oldest day first, "Unknown" last
        let mut daily: Vec<(Option<NaiveDate>, DailyTotal)> = days.into_values().collect();
        daily.sort_by_key(|(date, _)| (date.is_none(), *date));
        let daily: Vec<DailyTotal> = daily.into_iter().map(|(_, total)| total).collect();

        let total_water = daily.iter().map(|d| d.value).sum();
        let max_value = daily.iter().map(|d| d.value).fold(0.0, f64::max);

        Self {
            entries: entries.into_iter().map(|(_, entry)| entry).collect(),
            daily,
            total_water,
            max_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: Option<&str>, liters: f64, mode: PumpMode) -> PumpRecord {
        PumpRecord {
            mode,
            amount_liters: liters,
            duration: 330,
            start_pump: start.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_firmware_mode_spelling() {
        let stored: StoredPumpRecord = serde_json::from_str(
            r#"{"mode":"Manual","waterLevel":88.2,"duration":42,"amountLiters":1120}"#,
        )
        .unwrap();
        let record = PumpRecord::from(stored);
        assert_eq!(record.water_level, 88);
        assert_eq!(record.mode, PumpMode::Manual);
        assert_eq!(record.duration, 42);
    }

    #[test]
    fn groups_by_local_day() {
        let records = BTreeMap::from([
            (
                "evt_1".to_string(),
                record(Some("2024-05-01T08:00:00.000Z"), 1.5, PumpMode::Auto),
            ),
            (
                "evt_2".to_string(),
                record(Some("2024-05-01T18:00:00.000Z"), 2.0, PumpMode::Manual),
            ),
            (
                "evt_3".to_string(),
                record(Some("2024-04-30T09:00:00.000Z"), 4.0, PumpMode::Manual),
            ),
        ]);

        // UTC+7 pushes evt_2 onto the next day
        let summary = HistorySummary::from_records(&records, 7 * 60);

        let days: Vec<&str> = summary.daily.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(days, ["30/04/2024", "01/05/2024", "02/05/2024"]);
        assert_eq!(summary.total_water, 7.5);
        assert_eq!(summary.max_value, 4.0);

        let ids: Vec<&str> = summary.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["evt_2", "evt_1", "evt_3"]);
        assert_eq!(summary.entries[1].time, "15:00");
        assert!(summary.entries[1].is_auto);
        assert_eq!(summary.entries[1].duration_minutes, 5);
    }

    #[test]
    fn undated_records_go_last() {
        let records = BTreeMap::from([
            ("evt_a".to_string(), record(None, 1.0, PumpMode::Auto)),
            (
                "evt_b".to_string(),
                record(Some("2024-05-01T08:00:00.000Z"), 2.0, PumpMode::Auto),
            ),
        ]);

        let summary = HistorySummary::from_records(&records, 0);

        assert_eq!(summary.entries.last().unwrap().id, "evt_a");
        assert_eq!(summary.daily.last().unwrap().day, UNKNOWN_DAY);
    }

    #[test]
    fn falls_back_to_timestamp() {
        let mut old = record(None, 0.0, PumpMode::Auto);
        old.timestamp = Some("2024-05-01T08:00:00.000Z".to_string());
        let records = BTreeMap::from([("evt_1".to_string(), old)]);

        let summary = HistorySummary::from_records(&records, 0);

        assert_eq!(summary.entries[0].date, "01/05/2024");
    }

    #[test]
    fn keeps_only_the_most_recent_records() {
        let records: BTreeMap<String, PumpRecord> = (0..HISTORY_LIMIT + 5)
            .map(|i| {
                let start = format!("2024-05-01T{:02}:00:00.000Z", i % 24);
                let start = if i < 24 {
                    start
                } else {
                    format!("2024-05-02T{:02}:00:00.000Z", i - 24)
                };
                (format!("evt_{i:02}"), record(Some(&start), 1.0, PumpMode::Auto))
            })
            .collect();

        let summary = HistorySummary::from_records(&records, 0);

        assert_eq!(summary.entries.len(), HISTORY_LIMIT);
        assert_eq!(summary.entries.last().unwrap().id, "evt_05");
    }
}
