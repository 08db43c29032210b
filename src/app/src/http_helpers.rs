//! HTTP helper functions for Crux Core
//!
//! This module extracts common HTTP response handling logic from macros
//! into debuggable, testable functions. All requests go to the realtime
//! database REST API.

use crux_http::Response;

use crate::types::DatabaseConfig;

/// Query asking only whether a node has children
pub const SHALLOW_QUERY: &str = "shallow=true";

/// Constructs the REST address of a database path.
///
/// # Example
/// ```
/// use pump_dashboard_core::{http_helpers::build_url, types::DatabaseConfig};
/// let db = DatabaseConfig {
///     url: "https://pump.example/".to_string(),
///     auth_token: Some("t0k".to_string()),
///     device_id: "device1".to_string(),
/// };
/// let url = build_url(&db, &db.status_path(), None);
/// assert_eq!(url, "https://pump.example/devices/device1/status.json?auth=t0k");
/// ```
pub fn build_url(db: &DatabaseConfig, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}/{}.json", db.url.trim_end_matches('/'), path);

    let mut params = Vec::new();
    if let Some(token) = db.auth_token.as_deref().filter(|t| !t.is_empty()) {
        params.push(format!("auth={token}"));
    }
    if let Some(query) = query {
        params.push(query.to_string());
    }
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }

    url
}

/// Validates HTTP response.
///
/// Returns `true` if the response status is 2xx.
pub fn is_response_success(response: &Response<Vec<u8>>) -> bool {
    response.status().is_success()
}

/// Message from a database error body, e.g. `{"error": "Permission denied"}`
pub fn database_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

/// Extracts error message from HTTP response.
pub fn extract_error_message(action: &str, response: &mut Response<Vec<u8>>) -> String {
    let status = response.status().to_string();

    match response.take_body() {
        Some(body) => {
            if body.is_empty() {
                format!("{action} failed: HTTP {status} (Empty body)")
            } else {
                match String::from_utf8(body) {
                    Ok(msg) => match database_error_message(&msg) {
                        Some(reason) => format!("{action} failed: {reason}"),
                        None => format!("Error: {msg}"),
                    },
                    Err(e) => format!("{action} failed: HTTP {status} (Invalid UTF-8: {e})"),
                }
            }
        }
        None => format!("{action} failed: HTTP {status} (No body)"),
    }
}

/// Parse JSON from response body.
///
/// Returns error if response is not successful or JSON parsing fails.
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    action: &str,
    response: &mut Response<Vec<u8>>,
) -> Result<T, String> {
    if !is_response_success(response) {
        return Err(extract_error_message(action, response));
    }

    match response.take_body() {
        Some(body) => {
            serde_json::from_slice(&body).map_err(|e| format!("{action}: JSON parse error: {e}"))
        }
        None => Err(format!("{action}: Empty response body")),
    }
}

/// Check response status only (no body parsing).
pub fn check_response_status(action: &str, response: &mut Response<Vec<u8>>) -> Result<(), String> {
    if is_response_success(response) {
        Ok(())
    } else {
        Err(extract_error_message(action, response))
    }
}

/// Process HTTP response result and check status only (no JSON parsing)
pub fn process_status_response(
    action: &str,
    result: crux_http::Result<Response<Vec<u8>>>,
) -> Result<(), String> {
    match result {
        Ok(mut response) => check_response_status(action, &mut response),
        Err(e) => Err(map_http_error(action, e)),
    }
}

/// Process HTTP response result and parse JSON
pub fn process_json_response<T: serde::de::DeserializeOwned>(
    action: &str,
    result: crux_http::Result<Response<Vec<u8>>>,
) -> Result<T, String> {
    match result {
        Ok(mut response) => parse_json_response(action, &mut response),
        Err(e) => Err(map_http_error(action, e)),
    }
}

pub fn map_http_error(action: &str, error: crux_http::HttpError) -> String {
    format!("{action} failed: {error}")
}

/// Handle a missing session - sets error message and returns render command
///
/// Used when an operation needs the database but `Initialize` has not run.
pub fn handle_session_error<M, E>(model: &mut M, action: &str) -> crux_core::Command<crate::Effect, E>
where
    M: crate::model::ModelErrorHandler,
    E: Send + 'static,
{
    model.set_error(format!("{action} failed: No database session"));
    crux_core::render::render()
}

// crux_http::Response has no public constructor, so the response helpers
// are exercised through the update handlers that use them.
#[cfg(test)]
mod tests {
    use super::*;

    fn db(auth_token: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            url: "https://pump.example".to_string(),
            auth_token: auth_token.map(str::to_string),
            device_id: "device1".to_string(),
        }
    }

    #[test]
    fn build_url_without_token() {
        let db = db(None);
        assert_eq!(
            build_url(&db, &db.events_path(), Some("print=silent")),
            "https://pump.example/history/device1/events.json?print=silent"
        );
        assert_eq!(
            build_url(&db, &db.device_path(), None),
            "https://pump.example/devices/device1.json"
        );
    }

    #[test]
    fn build_url_puts_token_first() {
        let db = db(Some("abc"));
        assert_eq!(
            build_url(&db, &db.device_path(), Some(SHALLOW_QUERY)),
            "https://pump.example/devices/device1.json?auth=abc&shallow=true"
        );
    }

    #[test]
    fn empty_token_is_ignored() {
        let db = db(Some(""));
        assert_eq!(
            build_url(&db, &db.settings_path(), None),
            "https://pump.example/devices/device1/settings.json"
        );
    }

    #[test]
    fn reads_database_error_body() {
        assert_eq!(
            database_error_message(r#"{"error" : "Permission denied"}"#),
            Some("Permission denied".to_string())
        );
        assert_eq!(database_error_message("<html>"), None);
    }
}
