use anyhow::Result;
use crux_core::typegen::TypeGen;
use pump_dashboard_core::{
    events::{DatabaseEvent, NotificationEvent, PumpEvent, SettingsEvent, UiEvent},
    types::{Channel, NotificationKind, PumpAction, PumpMode, StatusTone, SystemStatus},
    App, RealtimeOutput,
};
use std::path::PathBuf;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=../app");

    let mut gen = TypeGen::new();

    gen.register_app::<App>()?;

    // Explicitly register domain event enums to ensure all variants are traced
    gen.register_type::<DatabaseEvent>()?;
    gen.register_type::<PumpEvent>()?;
    gen.register_type::<SettingsEvent>()?;
    gen.register_type::<NotificationEvent>()?;
    gen.register_type::<UiEvent>()?;
    gen.register_type::<RealtimeOutput>()?;

    // Explicitly register other enums to ensure all variants are traced
    gen.register_type::<Channel>()?;
    gen.register_type::<SystemStatus>()?;
    gen.register_type::<StatusTone>()?;
    gen.register_type::<NotificationKind>()?;
    gen.register_type::<PumpMode>()?;
    gen.register_type::<PumpAction>()?;

    let output_root = PathBuf::from("./generated");

    gen.typescript("shared_types", output_root.join("typescript"))?;

    Ok(())
}
