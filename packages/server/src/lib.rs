#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the gridscore engine.
//!
//! Builds the engine once at startup (fatal on missing required sources)
//! and shares it read-only across request handlers. The engine owns all
//! loaded tables and spatial indexes; handlers only translate HTTP
//! payloads to engine calls and engine errors to status codes.

mod handlers;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use gridscore_engine::{DataPaths, Engine, EngineOptions};

/// Shared application state.
pub struct AppState {
    /// The fusion-and-inference engine, immutable after init.
    pub engine: Arc<Engine>,
}

/// Starts the gridscore API server.
///
/// Reads `DATA_DIR` (default `data`) for the source layout, builds the
/// engine, and binds to `BIND_ADDR`/`PORT`. Set `DISABLE_LIVE_API=1` to
/// run fully offline. This is a regular async function — the caller
/// provides the runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if any required data source is missing or unreadable — startup
/// failures are fatal by design.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let disable_live = std::env::var("DISABLE_LIVE_API").is_ok_and(|v| v == "1" || v == "true");

    log::info!("Loading data layers from {data_dir}...");
    let options = EngineOptions {
        disable_live,
        ..EngineOptions::default()
    };
    let engine =
        Engine::init(DataPaths::from_root(Path::new(&data_dir)), options)
            .expect("Failed to initialize engine");

    let state = web::Data::new(AppState {
        engine: Arc::new(engine),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .route("/predict", web::get().to(handlers::predict))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/countries", web::get().to(handlers::countries))
                    .route("/predict-site", web::post().to(handlers::predict_site))
                    .route(
                        "/predict-footprint",
                        web::post().to(handlers::predict_footprint),
                    )
                    .route("/predict-grid", web::post().to(handlers::predict_grid))
                    .route("/compare-sites", web::post().to(handlers::compare_sites)),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
