use crux_core::{render::render, Command};

use crate::events::{Event, NotificationEvent};
use crate::handle_response;
use crate::model::Model;
use crate::types::{iso_timestamp, Notification, NotificationDraft};
use crate::{build_url, db_write, handle_session_error, ClockCmd, Effect};

/// Handle notification inbox events
pub fn handle(event: NotificationEvent, model: &mut Model) -> Command<Effect, Event> {
    match event {
        NotificationEvent::MarkRead(id) => {
            let Some(db) = model.database().cloned() else {
                return handle_session_error(model, "Mark notification read");
            };
            if !model.notifications.mark_read(&id) {
                return Command::done();
            }

            Command::all([
                render(),
                db_write!(
                    Notification,
                    NotificationEvent,
                    patch,
                    build_url(&db, &db.notification_path(&id), None),
                    WriteResponse,
                    "Mark notification read",
                    body_json: &serde_json::json!({ "read": true })
                ),
            ])
        }

        NotificationEvent::ClearAll => {
            let Some(db) = model.database().cloned() else {
                return handle_session_error(model, "Clear notifications");
            };
            model.notifications.clear();

            Command::all([
                render(),
                db_write!(
                    Notification,
                    NotificationEvent,
                    delete,
                    build_url(&db, &db.notifications_path(), None),
                    WriteResponse,
                    "Clear notifications"
                ),
            ])
        }

        NotificationEvent::Create { drafts, at } => {
            let writes: Vec<_> = drafts
                .into_iter()
                .map(|draft| write(model, draft, at))
                .collect();
            Command::all(writes)
        }

        NotificationEvent::WriteResponse(result) => handle_response!(model, result, {
            error_prefix: "Failed to update notifications",
        }),
    }
}

/// Stamp drafts with the current time and write them
pub fn publish(drafts: Vec<NotificationDraft>) -> Command<Effect, Event> {
    if drafts.is_empty() {
        return Command::done();
    }

    ClockCmd::now().build().then_send(move |reading| {
        Event::Notification(NotificationEvent::Create {
            drafts,
            at: reading.epoch_millis,
        })
    })
}

/// Allocate a key for `draft`; returns the URL to write and the notification
pub fn prepare(
    model: &mut Model,
    draft: NotificationDraft,
    at_millis: i64,
) -> Option<(String, Notification)> {
    let Some(db) = model.database().cloned() else {
        log::warn!("dropping notification \"{}\": no database session", draft.title);
        return None;
    };

    let key = model.next_notification_key(at_millis);
    let url = build_url(&db, &db.notification_path(&key), None);
    Some((url, draft.into_notification(key, iso_timestamp(at_millis))))
}

/// Write one notification created at `at_millis`
pub fn write(model: &mut Model, draft: NotificationDraft, at_millis: i64) -> Command<Effect, Event> {
    let Some((url, notification)) = prepare(model, draft, at_millis) else {
        return Command::done();
    };

    db_write!(
        Notification,
        NotificationEvent,
        put,
        url,
        WriteResponse,
        "Create notification",
        body_json: &notification
    )
}
