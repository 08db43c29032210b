mod automation;
mod database;
mod notifications;
mod pump;
mod settings;
mod ui;

use crux_core::Command;

use crate::events::Event;
use crate::model::Model;
use crate::Effect;

/// Main update dispatcher - routes events to domain-specific handlers
pub fn update(event: Event, model: &mut Model) -> Command<Effect, Event> {
    match event {
        Event::Initialize(config) => database::initialize(config, model),
        Event::Shutdown => database::shutdown(model),
        Event::Database(database_event) => database::handle(database_event, model),
        Event::Automation(automation_event) => automation::handle(automation_event, model),
        Event::Pump(pump_event) => pump::handle(pump_event, model),
        Event::Settings(settings_event) => settings::handle(settings_event, model),
        Event::Notification(notification_event) => {
            notifications::handle(notification_event, model)
        }
        Event::Ui(ui_event) => ui::handle(ui_event, model),
    }
}
