//! WebAssembly FFI bindings for the Crux Core
//!
//! A mobile or web shell drives the dashboard through these functions.
//! Events, effects and the view model cross the boundary bincode-serialized.

use lazy_static::lazy_static;
use wasm_bindgen::prelude::wasm_bindgen;

use crux_core::{bridge::Bridge, Core};

use crate::App;

lazy_static! {
    static ref CORE: Bridge<App> = Bridge::new(Core::new());
}

/// Set up logging to the browser console when the module is loaded
#[wasm_bindgen(start)]
pub fn init_wasm() {
    // fails only if a logger is already installed
    let _ = console_log::init_with_level(log::Level::Debug);
}

/// Process a serialized `Event` and return the serialized effect requests
#[wasm_bindgen]
pub fn process_event(event_bytes: &[u8]) -> Vec<u8> {
    let mut effects = Vec::new();
    if let Err(e) = CORE.update(event_bytes, &mut effects) {
        log::error!("failed to process event: {e}");
        effects.clear();
    }
    effects
}

/// Current view model, serialized
#[wasm_bindgen]
pub fn view() -> Vec<u8> {
    let mut view = Vec::new();
    if let Err(e) = CORE.view(&mut view) {
        log::error!("failed to serialize view model: {e}");
        view.clear();
    }
    view
}

/// Resolve effect request `id` (realtime, clock or http output) and return
/// the follow-up effect requests
#[wasm_bindgen]
pub fn handle_response(id: u32, response_bytes: &[u8]) -> Vec<u8> {
    let mut effects = Vec::new();
    if let Err(e) = CORE.resolve(
        crux_core::bridge::EffectId(id),
        response_bytes,
        &mut effects,
    ) {
        log::error!("failed to resolve effect {id}: {e}");
        effects.clear();
    }
    effects
}
