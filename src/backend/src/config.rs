use anyhow::{Context, Result, bail};
use pump_dashboard_core::types::{DEFAULT_DEVICE_ID, DatabaseConfig, SessionConfig};
use std::{env, str::FromStr, time::Duration};

/// Host configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Session handed to the core on `Initialize`
    pub session: SessionConfig,

    /// HTTP API configuration
    pub api: ApiConfig,

    /// Realtime stream configuration
    pub realtime: RealtimeConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Pause before a dropped stream is reopened
    pub reconnect_delay: Duration,
}

impl AppConfig {
    /// Load the configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load the configuration through `lookup`, which returns the raw value
    /// of a variable or `None` if it is unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup("FIREBASE_DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("failed to read FIREBASE_DATABASE_URL: variable is required")?;

        let auth_token = lookup("FIREBASE_AUTH_TOKEN").filter(|token| !token.is_empty());
        let device_id = lookup("DEVICE_ID").unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());

        let session = SessionConfig {
            database: DatabaseConfig {
                url: url.trim().trim_end_matches('/').to_string(),
                auth_token,
                device_id,
            },
            utc_offset_minutes: parse_var(&lookup, "UTC_OFFSET_MINUTES", 0)?,
            run_automation: parse_flag(&lookup, "RUN_AUTOMATION", true)?,
        };

        let api = ApiConfig {
            port: parse_var(&lookup, "API_PORT", 1977)?,
        };

        let realtime = RealtimeConfig {
            reconnect_delay: Duration::from_secs(parse_var(&lookup, "RECONNECT_DELAY_SECS", 5)?),
        };

        Ok(Self {
            session,
            api,
            realtime,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("failed to parse {name}: invalid format")),
        None => Ok(default),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> Result<bool> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("failed to parse {name}: expected a boolean"),
    }
}
