use crux_core::{render::render, Command};

use crate::automation::{evaluate, status_alerts, AutoAction, PendingAction, Settlement};
use crate::events::{AutomationEvent, Event};
use crate::model::Model;
use crate::types::{DeviceStatus, PumpMode};
use crate::update::{notifications, pump};
use crate::{ClockCmd, Effect};

/// Handle the clock readings and write results of auto-mode decisions
pub fn handle(event: AutomationEvent, model: &mut Model) -> Command<Effect, Event> {
    match event {
        AutomationEvent::Apply { action, at } => {
            let issued = model.pending_auto.as_ref().map(|p| p.action) == Some(action);
            let holds = match (&model.status, &model.settings) {
                (Some(status), Some(settings)) => evaluate(status, settings) == Some(action),
                _ => false,
            };

            if !issued {
                log::debug!("{action:?} was superseded before it could be applied");
                return Command::done();
            }
            if !holds {
                log::info!("{action:?} no longer holds for the latest status, discarding");
                model.pending_auto = None;
                return Command::done();
            }

            let respond: pump::Respond =
                |result| Event::Automation(AutomationEvent::WriteResponse(result));
            match action {
                AutoAction::StartPump => pump::start_pump(model, PumpMode::Auto, at, respond),
                AutoAction::StopPump => pump::stop_pump(model, PumpMode::Auto, at, respond),
            }
        }

        AutomationEvent::WriteResponse(Ok(())) => Command::done(),

        AutomationEvent::WriteResponse(Err(e)) => {
            log::error!("auto mode write failed: {e}");
            // allow the next snapshot to decide again
            model.pending_auto = None;
            model.set_error_and_render(format!("Auto mode failed: {e}"))
        }
    }
}

/// Apply a new status: derived values, status alerts, then the control loop
pub fn status_changed(status: DeviceStatus, model: &mut Model) -> Command<Effect, Event> {
    let previous = model.set_status(status);
    if previous.is_none() {
        model.stop_loading();
    }

    let alerts = match (&previous, &model.status, &model.settings) {
        (Some(previous), Some(next), Some(settings)) if model.runs_automation() => {
            status_alerts(previous, next, settings)
        }
        _ => Vec::new(),
    };

    let settlement = match (model.pending_auto.as_mut(), model.status.as_ref()) {
        (Some(pending), Some(status)) => Some(pending.observe(status)),
        _ => None,
    };
    match settlement {
        Some(Settlement::Reflected) => model.pending_auto = None,
        Some(Settlement::Expired) => {
            log::warn!("auto mode decision was not reflected by the device, retrying");
            model.pending_auto = None;
        }
        Some(Settlement::Waiting) | None => {}
    }

    Command::all([render(), notifications::publish(alerts), run_control_loop(model)])
}

/// Evaluate the thresholds and issue at most one decision at a time
pub fn run_control_loop(model: &mut Model) -> Command<Effect, Event> {
    if !model.runs_automation() || model.pending_auto.is_some() {
        return Command::done();
    }
    let (Some(status), Some(settings)) = (&model.status, &model.settings) else {
        return Command::done();
    };
    let Some(action) = evaluate(status, settings) else {
        return Command::done();
    };

    log::info!(
        "auto mode decided {action:?} at water level {}% (thresholds {}%..{}%)",
        status.water_level,
        settings.min_water_level,
        settings.max_water_level
    );
    model.pending_auto = Some(PendingAction::new(action));

    ClockCmd::now().build().then_send(move |reading| {
        Event::Automation(AutomationEvent::Apply {
            action,
            at: reading.epoch_millis,
        })
    })
}
