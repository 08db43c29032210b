/// Macro for model field updates with automatic rendering.
/// Supports both single and multiple field updates.
///
/// # Examples
///
/// Single field update:
/// ```ignore
/// update_field!(model.is_connected, true)
/// ```
///
/// Multiple field updates:
/// ```ignore
/// update_field!(
///     model.is_connected, true;
///     model.error_message, None
/// )
/// ```
#[macro_export]
macro_rules! update_field {
    // Multiple field updates (must come first to match the pattern)
    ($($model_field:expr, $value:expr);+ $(;)?) => {{
        let mut changed = false;
        $(
            let value = $value;
            if $model_field != value {
                $model_field = value;
                changed = true;
            }
        )+
        if changed {
            crux_core::render::render()
        } else {
            crux_core::Command::done()
        }
    }};

    // Single field update
    ($model_field:expr, $value:expr) => {{
        update_field!($model_field, $value;)
    }};
}

// Re-export http_helpers functions for macro use
pub use crate::http_helpers::{
    build_url, check_response_status, extract_error_message, handle_session_error,
    is_response_success, map_http_error, parse_json_response, process_json_response,
    process_status_response,
};

/// Macro for database writes reporting status only.
///
/// A body that cannot be serialized is reported through the same response
/// event, so callers can combine several writes with `Command::all`.
///
/// # Patterns
///
/// Pattern 1: PUT or PATCH with JSON body
/// ```ignore
/// db_write!(Pump, PumpEvent, patch, url, ToggleResponse, "Toggle pump",
///     body_json: &patch
/// )
/// ```
///
/// Pattern 2: DELETE
/// ```ignore
/// db_write!(Notification, NotificationEvent, delete, url, WriteResponse, "Clear notifications")
/// ```
///
/// Pattern 3: write with a response mapping chosen by the caller (the other
/// patterns expand to this one)
/// ```ignore
/// db_write!(respond: respond, patch, url, "Update water level", body_json: &patch)
/// ```
#[macro_export]
macro_rules! db_write {
    // Write with JSON body and caller-provided response mapping
    (respond: $respond:expr, $method:ident, $url:expr, $action:expr, body_json: $body:expr) => {{
        let respond: fn(Result<(), String>) -> $crate::events::Event = $respond;
        match $crate::HttpCmd::$method($url)
            .header("Content-Type", "application/json")
            .body_json($body)
        {
            Ok(builder) => builder.build().then_send(move |result| {
                respond($crate::process_status_response($action, result))
            }),
            Err(e) => crux_core::Command::event(respond(Err(format!(
                "Failed to create {} request: {e}",
                $action
            )))),
        }
    }};

    // Pattern 1: write with JSON body
    ($domain:ident, $domain_event:ident, $method:ident, $url:expr, $response_event:ident, $action:expr, body_json: $body:expr) => {
        $crate::db_write!(
            respond: |result| $crate::events::Event::$domain(
                $crate::events::$domain_event::$response_event(result),
            ),
            $method, $url, $action, body_json: $body
        )
    };

    // Pattern 2: write without body
    ($domain:ident, $domain_event:ident, $method:ident, $url:expr, $response_event:ident, $action:expr) => {
        $crate::HttpCmd::$method($url)
            .build()
            .then_send(|result| {
                let event_result = $crate::process_status_response($action, result);
                $crate::events::Event::$domain($crate::events::$domain_event::$response_event(
                    event_result,
                ))
            })
    };
}

/// Macro for database reads expecting a JSON response.
/// Does not set loading state.
///
/// # Example
/// ```ignore
/// db_get!(Database, DatabaseEvent, url, DeviceCheckResponse, "Check device", serde_json::Value,
///     map: |node| !node.is_null()
/// )
/// ```
#[macro_export]
macro_rules! db_get {
    ($domain:ident, $domain_event:ident, $url:expr, $response_event:ident, $action:expr, $response_type:ty) => {
        $crate::db_get!($domain, $domain_event, $url, $response_event, $action, $response_type,
            map: |value| value
        )
    };

    ($domain:ident, $domain_event:ident, $url:expr, $response_event:ident, $action:expr, $response_type:ty, map: |$value:ident| $map:expr) => {
        $crate::HttpCmd::get($url).build().then_send(|result| {
            let event_result: Result<$response_type, String> =
                $crate::process_json_response($action, result);
            $crate::events::Event::$domain($crate::events::$domain_event::$response_event(
                event_result.map(|$value| $map),
            ))
        })
    };
}

/// Macro for handling response events with standard loading state and error handling.
///
/// # Patterns
///
/// Pattern 1: Success message, prefixed error
/// ```ignore
/// handle_response!(model, result, {
///     success_message: "Settings saved",
///     error_prefix: "Failed to save settings",
/// })
/// ```
///
/// Pattern 2: Error prefix only, success is silent
/// ```ignore
/// handle_response!(model, result, {
///     error_prefix: "Failed to toggle pump",
/// })
/// ```
#[macro_export]
macro_rules! handle_response {
    // Pattern 1: Success message plus prefixed error
    ($model:expr, $result:expr, {
        success_message: $msg:expr,
        error_prefix: $prefix:expr $(,)?
    }) => {{
        $model.stop_loading();
        match $result {
            Ok(()) => {
                $model.success_message = Some($msg.to_string());
            }
            Err(e) => {
                $model.set_error(format!("{}: {e}", $prefix));
            }
        }
        crux_core::render::render()
    }};

    // Pattern 2: Silent success, prefixed error
    ($model:expr, $result:expr, {
        error_prefix: $prefix:expr $(,)?
    }) => {{
        match $result {
            Ok(()) => crux_core::Command::done(),
            Err(e) => $model.set_error_and_render(format!("{}: {e}", $prefix)),
        }
    }};
}
