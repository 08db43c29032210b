use crux_core::{render::render, Command};

use crate::events::{Event, UiEvent};
use crate::model::Model;
use crate::update_field;
use crate::Effect;

/// Handle UI-related events (clear messages, etc.)
pub fn handle(event: UiEvent, model: &mut Model) -> Command<Effect, Event> {
    match event {
        UiEvent::ClearError => {
            model.clear_error();
            render()
        }
        UiEvent::ClearSuccess => update_field!(model.success_message, None),
    }
}
