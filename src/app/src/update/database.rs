use std::collections::BTreeMap;

use crux_core::{render::render, Command};
use serde::de::DeserializeOwned;

use crate::commands::realtime::RealtimeOutput;
use crate::events::{DatabaseEvent, Event};
use crate::http_helpers::SHALLOW_QUERY;
use crate::model::Model;
use crate::types::device::StoredDeviceStatus;
use crate::types::history::StoredPumpRecord;
use crate::types::settings::StoredSettings;
use crate::types::{
    iso_timestamp, Channel, DeviceNode, DeviceStatus, Notification, NotificationDraft,
    NotificationKind, NotificationList, PumpAction, PumpMode, PumpRecord, SessionConfig, Settings,
};
use crate::update::{automation, notifications};
use crate::{build_url, db_get, db_write, update_field, ClockCmd, Effect, RealtimeCmd};

/// Start a session: remember the config, check the device node, subscribe
pub fn initialize(config: SessionConfig, model: &mut Model) -> Command<Effect, Event> {
    let db = config.database.clone();
    log::info!(
        "starting session for device {} (automation {})",
        db.device_id,
        if config.run_automation { "on" } else { "off" }
    );

    model.reset_session(config);
    model.start_loading();

    let check = db_get!(
        Database,
        DatabaseEvent,
        build_url(&db, &db.device_path(), Some(SHALLOW_QUERY)),
        DeviceCheckResponse,
        "Check device",
        serde_json::Value,
        map: |node| !node.is_null()
    );

    // history is streamed whole, the summary keeps the most recent records
    let subscriptions = Channel::ALL.map(|channel| {
        RealtimeCmd::subscribe(channel, build_url(&db, &db.channel_path(channel), None))
            .build()
            .then_send(|output| Event::Database(DatabaseEvent::RealtimeResponse(output)))
    });

    Command::all([render(), check].into_iter().chain(subscriptions))
}

pub fn shutdown(model: &mut Model) -> Command<Effect, Event> {
    log::info!("closing realtime subscriptions");
    model.pending_auto = None;

    RealtimeCmd::unsubscribe_all()
        .build()
        .then_send(|output| Event::Database(DatabaseEvent::RealtimeResponse(output)))
}

/// Handle snapshots, connectivity and device seeding
pub fn handle(event: DatabaseEvent, model: &mut Model) -> Command<Effect, Event> {
    match event {
        DatabaseEvent::Snapshot { channel, data } => handle_snapshot(channel, data, model),

        DatabaseEvent::Connected => update_field!(model.is_connected, true),
        DatabaseEvent::Disconnected => update_field!(model.is_connected, false),
        DatabaseEvent::StreamError { channel, message } => {
            log::warn!("{channel:?} stream failed: {message}");
            model.set_error_and_render(format!("Database error: {message}"))
        }

        DatabaseEvent::DeviceCheckResponse(Ok(true)) => Command::done(),
        DatabaseEvent::DeviceCheckResponse(Ok(false)) => {
            log::info!("device node missing, seeding defaults");
            ClockCmd::now().build().then_send(|reading| {
                Event::Database(DatabaseEvent::Seed {
                    at: reading.epoch_millis,
                })
            })
        }
        DatabaseEvent::DeviceCheckResponse(Err(e)) => model.set_error_and_render(e),

        DatabaseEvent::Seed { at } => seed(model, at),

        DatabaseEvent::SeedResponse(Ok(())) => Command::done(),
        DatabaseEvent::SeedResponse(Err(e)) => {
            model.set_error_and_render(format!("Failed to initialize device: {e}"))
        }

        DatabaseEvent::RealtimeResponse(output) => handle_realtime(output, model),
    }
}

fn handle_snapshot(
    channel: Channel,
    data: Option<String>,
    model: &mut Model,
) -> Command<Effect, Event> {
    match channel {
        Channel::Status => match decode::<StoredDeviceStatus, DeviceStatus>(data) {
            Ok(Some(status)) => automation::status_changed(status, model),
            Ok(None) => model.set_error_and_render("No device data found".to_string()),
            Err(e) => model.set_error_and_render(format!("Failed to load device status: {e}")),
        },

        Channel::Settings => match decode::<StoredSettings, Settings>(data) {
            Ok(Some(settings)) => {
                model.settings = Some(settings);
                Command::all([render(), automation::run_control_loop(model)])
            }
            Ok(None) => model.set_error_and_render("No settings data found".to_string()),
            Err(e) => model.set_error_and_render(format!("Failed to load settings: {e}")),
        },

        Channel::History => match decode_records::<StoredPumpRecord, PumpRecord>("history", data) {
            Ok(records) => {
                model.set_history(records);
                render()
            }
            Err(e) => model.set_error_and_render(format!("Failed to load history: {e}")),
        },

        Channel::Notifications => match decode_records::<Notification, _>("notification", data) {
            Ok(notifications) => {
                model.notifications =
                    NotificationList::from_map(notifications, model.utc_offset_minutes());
                render()
            }
            Err(e) => model.set_error_and_render(format!("Failed to load notifications: {e}")),
        },
    }
}

fn handle_realtime(output: RealtimeOutput, model: &mut Model) -> Command<Effect, Event> {
    match output {
        RealtimeOutput::Subscribed { channel } => {
            log::debug!("subscribed to {channel:?}");
            if model.subscriptions.contains(&channel) {
                return Command::done();
            }
            model.subscriptions.push(channel);
            render()
        }
        RealtimeOutput::Unsubscribed => update_field!(
            model.subscriptions, Vec::<Channel>::new();
            model.is_connected, false
        ),
        RealtimeOutput::Error { channel, message } => {
            log::error!("realtime error on {channel:?}: {message}");
            if let Some(channel) = channel {
                model.subscriptions.retain(|c| *c != channel);
            }
            model.set_error_and_render(format!("Realtime subscription failed: {message}"))
        }
    }
}

fn seed(model: &mut Model, at_millis: i64) -> Command<Effect, Event> {
    let Some(db) = model.database().cloned() else {
        return Command::done();
    };

    let at = iso_timestamp(at_millis);
    let node = DeviceNode::initial(at.clone());
    let key = crate::automation::event_key(at_millis);
    let record = PumpRecord {
        timestamp: Some(at),
        action: Some(PumpAction::SystemInit),
        mode: PumpMode::Auto,
        water_level: node.status.water_level,
        ..Default::default()
    };
    let ready = NotificationDraft::new(
        NotificationKind::Info,
        "System ready",
        "The pump monitoring and control system has been initialized.",
    );

    Command::all([
        db_write!(
            Database,
            DatabaseEvent,
            put,
            build_url(&db, &db.device_path(), None),
            SeedResponse,
            "Create device",
            body_json: &node
        ),
        db_write!(
            Database,
            DatabaseEvent,
            put,
            build_url(&db, &db.event_path(&key), None),
            SeedResponse,
            "Create first history record",
            body_json: &record
        ),
        notifications::write(model, ready, at_millis),
    ])
}

/// Decode a snapshot; JSON `null` means the node does not exist
fn decode<S, T>(data: Option<String>) -> Result<Option<T>, String>
where
    S: DeserializeOwned,
    T: From<S>,
{
    let Some(json) = data else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(&json).map_err(|e| e.to_string())?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value::<S>(value)
        .map(|stored| Some(stored.into()))
        .map_err(|e| e.to_string())
}

/// Decode a keyed collection, skipping entries that do not parse
fn decode_records<S, T>(label: &str, data: Option<String>) -> Result<BTreeMap<String, T>, String>
where
    S: DeserializeOwned,
    T: From<S>,
{
    type Entries = BTreeMap<String, serde_json::Value>;
    let Some(raw) = decode::<Entries, Entries>(data)? else {
        return Ok(BTreeMap::new());
    };

    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<S>(value) {
            Ok(record) => Some((key, record.into())),
            Err(e) => {
                log::warn!("skipping {label} {key}: {e}");
                None
            }
        })
        .collect())
}
