use actix_web::{App, http::StatusCode, test, web};
use pump_dashboard_core::{
    Event, Model,
    events::{NotificationEvent, PumpEvent, SettingsEvent},
    types::{DeviceStatus, Settings},
};
use pump_dashboard_host::{api::Api, shell::ShellHandle};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver},
    watch,
};

fn make_api(model: Model) -> (Api, UnboundedReceiver<Event>, watch::Sender<Model>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(model);
    (
        Api::new(ShellHandle::new(events_tx, view_rx)),
        events_rx,
        view_tx,
    )
}

async fn call(api: Api, req: test::TestRequest) -> actix_web::dev::ServiceResponse {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .configure(Api::configure),
    )
    .await;
    test::call_service(&app, req.to_request()).await
}

#[tokio::test]
async fn view_returns_the_rendered_model() {
    let model = Model {
        status: Some(DeviceStatus {
            water_level: 42,
            ..Default::default()
        }),
        is_connected: true,
        ..Default::default()
    };
    let (api, _events, _view) = make_api(model);

    let resp = call(api, test::TestRequest::get().uri("/api/view")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"]["waterLevel"], 42);
    assert_eq!(body["is_connected"], true);
}

#[tokio::test]
async fn healthcheck_reports_connectivity() {
    let (api, _events, view) = make_api(Model::default());

    let resp = call(api.clone(), test::TestRequest::get().uri("/healthcheck")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    view.send_replace(Model {
        is_connected: true,
        ..Default::default()
    });
    let resp = call(api, test::TestRequest::get().uri("/healthcheck")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn toggle_is_forwarded_to_the_core() {
    let (api, mut events, _view) = make_api(Model::default());

    let resp = call(api, test::TestRequest::post().uri("/api/pump/toggle")).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(events.try_recv().unwrap(), Event::Pump(PumpEvent::TogglePump));
}

#[tokio::test]
async fn water_level_is_forwarded_to_the_core() {
    let (api, mut events, _view) = make_api(Model::default());

    let resp = call(
        api.clone(),
        test::TestRequest::post()
            .uri("/api/pump/level")
            .set_json(serde_json::json!({ "level": 30 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Pump(PumpEvent::SetWaterLevel(30))
    );

    let resp = call(
        api,
        test::TestRequest::post()
            .uri("/api/pump/level")
            .set_json(serde_json::json!({ "level": -5 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn settings_with_inverted_thresholds_are_rejected() {
    let (api, mut events, _view) = make_api(Model::default());

    let settings = Settings {
        min_water_level: 80,
        max_water_level: 20,
        ..Default::default()
    };
    let resp = call(
        api,
        test::TestRequest::put()
            .uri("/api/settings")
            .set_json(&settings),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn valid_settings_are_forwarded() {
    let (api, mut events, _view) = make_api(Model::default());

    let settings = Settings {
        min_water_level: 25,
        max_water_level: 85,
        ..Default::default()
    };
    let resp = call(
        api,
        test::TestRequest::put()
            .uri("/api/settings")
            .set_json(&settings),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Settings(SettingsEvent::SaveSettings(settings))
    );
}

#[tokio::test]
async fn notification_routes() {
    let (api, mut events, _view) = make_api(Model::default());

    let resp = call(
        api.clone(),
        test::TestRequest::post().uri("/api/notifications/ntf_1714557600000/read"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Notification(NotificationEvent::MarkRead("ntf_1714557600000".to_string()))
    );

    let resp = call(api, test::TestRequest::delete().uri("/api/notifications")).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Notification(NotificationEvent::ClearAll)
    );
}

#[tokio::test]
async fn stopped_shell_is_reported_as_unavailable() {
    let (api, events, _view) = make_api(Model::default());
    drop(events);

    let resp = call(api, test::TestRequest::post().uri("/api/pump/toggle")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
