use crate::shell::ShellHandle;
use actix_web::{HttpResponse, Responder, web};
use log::{debug, error};
use pump_dashboard_core::{
    Event,
    events::{NotificationEvent, PumpEvent, SettingsEvent},
    types::Settings,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetWaterLevelPayload {
    pub level: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthcheckInfo {
    pub version: &'static str,
    pub connected: bool,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct Api {
    pub shell: ShellHandle,
}

impl Api {
    pub fn new(shell: ShellHandle) -> Self {
        Api { shell }
    }

    /// Register all routes
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/healthcheck", web::get().to(Api::healthcheck))
            .route("/api/view", web::get().to(Api::view))
            .route("/api/pump/toggle", web::post().to(Api::toggle_pump))
            .route("/api/pump/level", web::post().to(Api::set_water_level))
            .route("/api/settings", web::put().to(Api::save_settings))
            .route(
                "/api/notifications/{id}/read",
                web::post().to(Api::mark_notification_read),
            )
            .route(
                "/api/notifications",
                web::delete().to(Api::clear_notifications),
            );
    }

    pub async fn healthcheck(api: web::Data<Self>) -> impl Responder {
        debug!("healthcheck() called");

        let view = api.shell.view();
        let info = HealthcheckInfo {
            version: env!("CARGO_PKG_VERSION"),
            connected: view.is_connected,
            error_message: view.error_message,
        };

        if info.connected {
            HttpResponse::Ok().json(&info)
        } else {
            HttpResponse::ServiceUnavailable().json(&info)
        }
    }

    pub async fn view(api: web::Data<Self>) -> impl Responder {
        debug!("view() called");
        HttpResponse::Ok().json(api.shell.view())
    }

    pub async fn toggle_pump(api: web::Data<Self>) -> impl Responder {
        debug!("toggle_pump() called");
        api.dispatch(Event::Pump(PumpEvent::TogglePump), "toggle_pump")
    }

    pub async fn set_water_level(
        body: web::Json<SetWaterLevelPayload>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("set_water_level() called: {body:?}");

        api.dispatch(
            Event::Pump(PumpEvent::SetWaterLevel(body.level)),
            "set_water_level",
        )
    }

    pub async fn save_settings(body: web::Json<Settings>, api: web::Data<Self>) -> impl Responder {
        debug!("save_settings() called: {body:?}");

        if let Err(e) = body.check() {
            return HttpResponse::BadRequest().body(e.to_string());
        }

        api.dispatch(
            Event::Settings(SettingsEvent::SaveSettings(body.into_inner())),
            "save_settings",
        )
    }

    pub async fn mark_notification_read(
        path: web::Path<String>,
        api: web::Data<Self>,
    ) -> impl Responder {
        let id = path.into_inner();
        debug!("mark_notification_read() called: {id}");

        api.dispatch(
            Event::Notification(NotificationEvent::MarkRead(id)),
            "mark_notification_read",
        )
    }

    pub async fn clear_notifications(api: web::Data<Self>) -> impl Responder {
        debug!("clear_notifications() called");
        api.dispatch(
            Event::Notification(NotificationEvent::ClearAll),
            "clear_notifications",
        )
    }

    fn dispatch(&self, event: Event, operation: &str) -> HttpResponse {
        match self.shell.send(event) {
            Ok(()) => HttpResponse::Accepted().finish(),
            Err(e) => {
                error!("{operation} failed: {e:#}");
                HttpResponse::ServiceUnavailable().body(e.to_string())
            }
        }
    }
}
