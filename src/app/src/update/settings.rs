use crux_core::{render::render, Command};

use crate::events::{Event, SettingsEvent};
use crate::handle_response;
use crate::model::Model;
use crate::update::automation;
use crate::{build_url, db_write, handle_session_error, Effect};

/// Handle settings edits
pub fn handle(event: SettingsEvent, model: &mut Model) -> Command<Effect, Event> {
    match event {
        SettingsEvent::SaveSettings(settings) => {
            if let Err(e) = settings.check() {
                return model.set_error_and_render(format!("Failed to save settings: {e}"));
            }
            let Some(db) = model.database().cloned() else {
                return handle_session_error(model, "Save settings");
            };

            model.start_loading();
            let write = db_write!(
                Settings,
                SettingsEvent,
                patch,
                build_url(&db, &db.settings_path(), None),
                SaveSettingsResponse,
                "Save settings",
                body_json: &settings
            );
            model.settings = Some(settings);

            Command::all([render(), write, automation::run_control_loop(model)])
        }

        SettingsEvent::SaveSettingsResponse(result) => handle_response!(model, result, {
            success_message: "Settings saved",
            error_prefix: "Failed to save settings",
        }),
    }
}
