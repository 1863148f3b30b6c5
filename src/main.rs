use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod context;
mod db;
mod docs;
mod error;
mod guard;
mod model;
mod models;
mod routes;
mod services;
mod store;
mod utils;

use config::Config;
use context::AppContext;
use db::init_db;
use routes::RateLimits;
use store::{MemoryStore, MySqlStore};

use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HRMS is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let level: tracing::Level = config
        .log_level
        .parse()
        .with_context(|| format!("LOG_LEVEL has an invalid value: {:?}", config.log_level))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let ctx = if config.is_memory_store() {
        warn!("DATABASE_URL is memory://, data will not survive a restart");
        AppContext::new(MemoryStore::new())
    } else {
        let pool = init_db(&config).await.context("failed to open database")?;
        AppContext::new(MySqlStore::new(pool))
    };
    let ctx = Data::new(ctx);
    let limits = RateLimits::from_config(&config)?;

    let filter_ctx = ctx.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = filter_ctx.warmup_username_filter().await {
            warn!(error = %e, "Failed to warmup username filter");
        }
    });

    let cache_ctx = ctx.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = cache_ctx.warmup_username_cache().await {
            warn!(error = %e, "Failed to warmup username cache");
        }
    });

    let server_addr = config.server_addr.clone();
    info!(addr = %server_addr, prefix = %config.api_prefix, "Binding HTTP server");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .wrap(routes::cors())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(ctx.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
