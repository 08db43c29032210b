use actix_cors::Cors;
use actix_server::ServerHandle;
use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use pump_dashboard_host::{api::Api, config::AppConfig, firebase::FirebaseClient, shell};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;
    let database = &config.session.database;
    info!(
        "device {} on {} (automation {})",
        database.device_id,
        database.url,
        if config.session.run_automation {
            "enabled"
        } else {
            "disabled"
        }
    );

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let client = FirebaseClient::new().context("failed to create database client")?;
    let (shell, driver) = shell::start(
        client,
        config.session.clone(),
        config.realtime.reconnect_delay,
    );

    let (server_handle, server_task) = run_server(Api::new(shell), config.api.port)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => debug!("ctrl-c received"),
        _ = sigterm.recv() => debug!("SIGTERM received"),
        result = server_task => match result {
            Ok(Ok(())) => debug!("server stopped normally"),
            Ok(Err(e)) => error!("server stopped with error: {e}"),
            Err(e) => error!("server task panicked: {e}"),
        },
    }

    info!("shutting down");

    server_handle.stop(true).await;
    driver.shutdown().await.context("failed to stop shell")?;

    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn run_server(
    api: Api,
    port: u16,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_header()
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .max_age(3600),
            )
            .app_data(Data::new(api.clone()))
            .configure(Api::configure)
    })
    .bind(format!("0.0.0.0:{port}"))
    .context("failed to bind server")?
    .disable_signals()
    .run();

    Ok((server.handle(), tokio::spawn(server)))
}
