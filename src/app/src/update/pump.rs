use crux_core::{render::render, Command};
use serde::Serialize;

use crate::automation::{end_run, event_key, pump_started_notice, pump_stopped_notice, RunEnd};
use crate::events::{Event, PumpEvent};
use crate::handle_response;
use crate::model::Model;
use crate::types::{
    iso_timestamp, DeviceStatus, NotificationDraft, PumpMode, PumpRecord, PumpStatePatch,
    Settings, WaterLevelPatch,
};
use crate::update::{automation, notifications};
use crate::{
    build_url, db_write, handle_session_error, process_status_response, ClockCmd, Effect, HttpCmd,
};

/// Maps the outcome of a database write to an event
pub type Respond = fn(Result<(), String>) -> Event;

/// Handle manual pump control
pub fn handle(event: PumpEvent, model: &mut Model) -> Command<Effect, Event> {
    match event {
        PumpEvent::TogglePump => {
            if model.database().is_none() {
                return handle_session_error(model, "Toggle pump");
            }
            if model.status.is_none() {
                return model.set_error_and_render(
                    "Failed to toggle pump: No device data found".to_string(),
                );
            }

            ClockCmd::now().build().then_send(|reading| {
                Event::Pump(PumpEvent::ToggleAt {
                    at: reading.epoch_millis,
                })
            })
        }

        PumpEvent::ToggleAt { at } => {
            let Some(status) = model.status.clone() else {
                return model.set_error_and_render(
                    "Failed to toggle pump: No device data found".to_string(),
                );
            };

            if let Some(pending) = model.pending_auto.take() {
                log::info!("manual toggle overrides pending {:?}", pending.action);
            }

            let respond: Respond = |result| Event::Pump(PumpEvent::ToggleResponse(result));
            let (writes, current_event_key) = if status.is_pump_on {
                (stop_pump(model, PumpMode::Manual, at, respond), None)
            } else {
                (
                    start_pump(model, PumpMode::Manual, at, respond),
                    Some(event_key(at)),
                )
            };

            model.set_status(DeviceStatus {
                is_pump_on: !status.is_pump_on,
                last_updated: Some(iso_timestamp(at)),
                current_event_key,
                ..status
            });

            Command::all([render(), writes])
        }

        PumpEvent::ToggleResponse(result) => handle_response!(model, result, {
            error_prefix: "Failed to toggle pump",
        }),

        PumpEvent::SetWaterLevel(level) => {
            if model.database().is_none() {
                return handle_session_error(model, "Update water level");
            }
            if model.status.is_none() {
                return model.set_error_and_render(
                    "Failed to update water level: No device data found".to_string(),
                );
            }

            let level = level.min(100);
            ClockCmd::now().build().then_send(move |reading| {
                Event::Pump(PumpEvent::SetWaterLevelAt {
                    level,
                    at: reading.epoch_millis,
                })
            })
        }

        PumpEvent::SetWaterLevelAt { level, at } => {
            let (Some(db), Some(status)) = (model.database().cloned(), model.status.clone()) else {
                return model.set_error_and_render(
                    "Failed to update water level: No device data found".to_string(),
                );
            };

            let last_updated = iso_timestamp(at);
            let patch = WaterLevelPatch {
                water_level: level,
                last_updated: last_updated.clone(),
            };

            // handled like a snapshot so alerts and auto mode see the change
            let local = automation::status_changed(
                DeviceStatus {
                    water_level: level,
                    last_updated: Some(last_updated),
                    ..status
                },
                model,
            );

            Command::all([
                local,
                db_write!(
                    Pump,
                    PumpEvent,
                    patch,
                    build_url(&db, &db.status_path(), None),
                    WaterLevelResponse,
                    "Update water level",
                    body_json: &patch
                ),
            ])
        }

        PumpEvent::WaterLevelResponse(result) => handle_response!(model, result, {
            error_prefix: "Failed to update water level",
        }),
    }
}

/// One database write of an ordered sequence
#[derive(Debug, Clone)]
struct Step {
    action: &'static str,
    method: Method,
    url: String,
    body: serde_json::Value,
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Put,
    Patch,
}

impl Step {
    fn new(
        action: &'static str,
        method: Method,
        url: String,
        body: &impl Serialize,
    ) -> Result<Self, String> {
        let body = serde_json::to_value(body)
            .map_err(|e| format!("Failed to create {action} request: {e}"))?;
        Ok(Self {
            action,
            method,
            url,
            body,
        })
    }
}

/// Run `steps` one after another; the first failure ends the sequence and is
/// reported through `respond`, otherwise `respond(Ok)` follows the last step
fn write_in_order(steps: Result<Vec<Step>, String>, respond: Respond) -> Command<Effect, Event> {
    let steps = match steps {
        Ok(steps) => steps,
        Err(e) => return Command::event(respond(Err(e))),
    };

    Command::new(move |ctx| async move {
        for step in steps {
            let request = match step.method {
                Method::Put => HttpCmd::put(step.url.clone()),
                Method::Patch => HttpCmd::patch(step.url.clone()),
            };
            let result = match request
                .header("Content-Type", "application/json")
                .body_json(&step.body)
            {
                Ok(request) => {
                    let response = request.build().into_future(ctx.clone()).await;
                    process_status_response(step.action, response)
                }
                Err(e) => Err(format!("Failed to create {} request: {e}", step.action)),
            };

            if let Err(e) = result {
                log::warn!("{} failed, skipping the remaining writes", step.action);
                ctx.send_event(respond(Err(e)));
                return;
            }
        }
        ctx.send_event(respond(Ok(())));
    })
}

/// Notification step for `draft`, if the session can write one
fn notice_step(
    model: &mut Model,
    draft: Option<NotificationDraft>,
    at_millis: i64,
) -> Result<Option<Step>, String> {
    let Some((url, notification)) =
        draft.and_then(|draft| notifications::prepare(model, draft, at_millis))
    else {
        return Ok(None);
    };
    Step::new("Create notification", Method::Put, url, &notification).map(Some)
}

/// Writes that start a pump run, in order: the `PUMP_ON` record, the status
/// patch naming it, then the pumping notification
pub fn start_pump(
    model: &mut Model,
    mode: PumpMode,
    at_millis: i64,
    respond: Respond,
) -> Command<Effect, Event> {
    let (Some(db), Some(status)) = (model.database().cloned(), model.status.clone()) else {
        return Command::event(respond(Err("No device data found".to_string())));
    };
    let settings = model.settings.clone().unwrap_or_default();

    let key = event_key(at_millis);
    let at = iso_timestamp(at_millis);
    let record = PumpRecord::started(mode, status.water_level, &at);
    let patch = PumpStatePatch {
        is_pump_on: true,
        last_updated: at,
        current_event_key: Some(key.clone()),
    };
    log::info!(
        "starting pump ({mode:?}) at water level {}%, record {key}",
        status.water_level
    );

    let notice = pump_started_notice(mode, &status, &settings, &key);
    let steps: Result<Vec<Step>, String> = (|| {
        let mut steps = vec![
            Step::new(
                "Record pump start",
                Method::Put,
                build_url(&db, &db.event_path(&key), None),
                &record,
            )?,
            Step::new(
                "Start pump",
                Method::Patch,
                build_url(&db, &db.status_path(), None),
                &patch,
            )?,
        ];
        steps.extend(notice_step(model, notice, at_millis)?);
        Ok(steps)
    })();

    write_in_order(steps, respond)
}

/// Writes that end a pump run, in order: the closed (or standalone) record,
/// the status patch, then the pumping notification
pub fn stop_pump(
    model: &mut Model,
    mode: PumpMode,
    at_millis: i64,
    respond: Respond,
) -> Command<Effect, Event> {
    let (Some(db), Some(status)) = (model.database().cloned(), model.status.clone()) else {
        return Command::event(respond(Err("No device data found".to_string())));
    };
    let settings: Settings = model.settings.clone().unwrap_or_default();

    let run = end_run(
        &status,
        &model.history_records,
        mode,
        at_millis,
        settings.pump_flow,
    );
    let patch = PumpStatePatch {
        is_pump_on: false,
        last_updated: iso_timestamp(at_millis),
        current_event_key: None,
    };
    log::info!(
        "stopping pump ({mode:?}) at water level {}%, record {}",
        status.water_level,
        run.key()
    );

    let notice = pump_stopped_notice(mode, &status, &settings, &run);
    let steps: Result<Vec<Step>, String> = (|| {
        let record = match &run {
            RunEnd::Close { key, close } => Step::new(
                "Close pump record",
                Method::Patch,
                build_url(&db, &db.event_path(key), None),
                close,
            )?,
            RunEnd::Record { key, record } => Step::new(
                "Record pump stop",
                Method::Put,
                build_url(&db, &db.event_path(key), None),
                record,
            )?,
        };
        let mut steps = vec![
            record,
            Step::new(
                "Stop pump",
                Method::Patch,
                build_url(&db, &db.status_path(), None),
                &patch,
            )?,
        ];
        steps.extend(notice_step(model, notice, at_millis)?);
        Ok(steps)
    })();

    write_in_order(steps, respond)
}
