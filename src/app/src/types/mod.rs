//! Domain-based type organization
//!
//! Types are organized by the database node they describe:
//! - common: Session configuration, channels and time helpers
//! - device: Device status and derived system status
//! - settings: Device settings and alert switches
//! - history: Pump run records and the history summary
//! - notification: Notification inbox

pub mod common;
pub mod device;
pub mod history;
pub mod notification;
pub mod settings;

pub use common::*;
pub use device::*;
pub use history::*;
pub use notification::*;
pub use settings::*;

#[cfg(test)]
mod tests {
    use super::device::StoredDeviceStatus;
    use super::settings::StoredSettings;
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};
    use serde_reflection::{ContainerFormat, Format, Samples, Tracer, TracerConfig};

    /// Field formats of `T` as shells see them. Tracing the serialized value
    /// and the type on one tracer fails if the two disagree.
    fn shell_fields<T>(name: &str, value: &T) -> Vec<(String, Format)>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut tracer = Tracer::new(TracerConfig::default());
        let mut samples = Samples::new();
        tracer.trace_value(&mut samples, value).unwrap();
        tracer.trace_simple_type::<T>().unwrap();

        let registry = tracer.registry().unwrap();
        let Some(ContainerFormat::Struct(fields)) = registry.get(name) else {
            panic!("{name} is not a struct");
        };
        fields
            .iter()
            .map(|field| (field.name.clone(), field.value.clone()))
            .collect()
    }

    fn format_of(fields: &[(String, Format)], name: &str) -> Format {
        fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, format)| format.clone())
            .unwrap()
    }

    #[test]
    fn device_status_level_is_a_byte_both_ways() {
        let fields = shell_fields("DeviceStatus", &DeviceStatus::default());
        assert_eq!(format_of(&fields, "waterLevel"), Format::U8);
    }

    #[test]
    fn settings_geometry_is_a_plain_float_both_ways() {
        let fields = shell_fields("Settings", &Settings::default());
        for name in ["sensorToBottom", "tankHeight", "pumpFlow"] {
            assert_eq!(format_of(&fields, name), Format::F64, "{name}");
        }
    }

    #[test]
    fn stored_values_are_normalized() {
        let status: StoredDeviceStatus =
            serde_json::from_str(r#"{"waterLevel":104.7}"#).unwrap();
        assert_eq!(DeviceStatus::from(status).water_level, 100);

        let settings: StoredSettings =
            serde_json::from_str(r#"{"tankHeight":-1,"pumpFlow":2.5}"#).unwrap();
        let settings = Settings::from(settings);
        assert_eq!(settings.tank_height, Settings::default().tank_height);
        assert_eq!(settings.pump_flow, 2.5);
    }
}
