use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::common::{local_date_time, parse_timestamp};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Warning,
    Error,
    Success,
    #[default]
    Info,
}

/// Notification as stored under `notifications/{id}/{key}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub related_event: Option<String>,
}

/// A notification the core wants to create, before it has a key and time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub related_event: Option<String>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            related_event: None,
        }
    }

    pub fn related_to(mut self, event_key: impl Into<String>) -> Self {
        self.related_event = Some(event_key.into());
        self
    }

    pub fn into_notification(self, id: String, timestamp: String) -> Notification {
        Notification {
            id,
            title: self.title,
            message: self.message,
            timestamp,
            kind: self.kind,
            read: false,
            related_event: self.related_event,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub notification: Notification,
    /// `HH:MM - dd/mm/yyyy`
    pub display_time: String,
}

/// Notification inbox, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub items: Vec<NotificationItem>,
    pub unread: usize,
}

impl NotificationList {
    pub fn from_map(map: BTreeMap<String, Notification>, utc_offset_minutes: i32) -> Self {
        let mut items: Vec<NotificationItem> = map
            .into_iter()
            .map(|(key, mut notification)| {
                notification.id = key;
                let display_time = match parse_timestamp(&notification.timestamp) {
                    Some(ts) => {
                        let (date, time) = local_date_time(&ts, utc_offset_minutes);
                        format!("{time} - {date}")
                    }
                    None => "Unknown".to_string(),
                };
                NotificationItem {
                    notification,
                    display_time,
                }
            })
            .collect();

        items.sort_by_key(|item| std::cmp::Reverse(parse_timestamp(&item.notification.timestamp)));

        let mut list = Self { items, unread: 0 };
        list.recount();
        list
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.notification.id == id) else {
            return false;
        };
        let changed = !item.notification.read;
        item.notification.read = true;
        self.recount();
        changed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.unread = 0;
    }

    fn recount(&mut self) {
        self.unread = self.items.iter().filter(|i| !i.notification.read).count();
    }
}
