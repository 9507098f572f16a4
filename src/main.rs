use actix_web::middleware::NormalizePath;
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod justification;
mod media;
mod model;
mod models;
mod recognition;
mod reconcile;
mod roster;
mod routes;
mod store;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::media::HttpObjectStore;
use crate::recognition::{HttpFeatureExtractor, Matcher};
use crate::routes::Limiters;
use crate::store::MySqlStore;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Upper bound for probe photos and evidence files.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    let store = Data::new(MySqlStore::new(pool));

    let extractor = HttpFeatureExtractor::new(&config.extractor_url, config.extractor_timeout())?;
    let matcher = Data::new(Matcher::new(Arc::new(extractor), config.matcher_settings()));
    let objects = Data::new(HttpObjectStore::new(
        &config.object_store_url,
        &config.object_store_token,
    )?);

    let limiters = Limiters::from_config(&config)?;

    info!(
        extractor = %config.extractor_url,
        threshold = config.match_threshold,
        concurrency = config.extractor_concurrency,
        "Recognition configured"
    );

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store.clone())
            .app_data(matcher.clone())
            .app_data(objects.clone())
            .app_data(config_data.clone())
            .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
