use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::utils::mailer::Mailer;
use crate::utils::recipient_cache;
use crate::utils::reminder;
use chrono::Local;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Operations portal is up"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let mailer = Mailer::from_config(&config);
    let reminder_rules = reminder::default_rules();

    let pool_for_cache_warmup = pool.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = recipient_cache::warmup_recipient_cache(&pool_for_cache_warmup).await {
            eprintln!("Failed to warmup recipient cache: {:?}", e);
        }
    });

    // Periodic reminder sweep; also reachable on demand via
    // POST /assets/reminders/run
    let pool_for_reminders = pool.clone();
    let mailer_for_reminders = mailer.clone();
    let rules_for_reminders = reminder_rules.clone();
    let sweep_secs = config.reminder_sweep_interval_secs.max(60);

    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(Duration::from_secs(sweep_secs));
        loop {
            ticker.tick().await;
            let today = Local::now().date_naive();
            reminder::run_reminder_sweep(
                &pool_for_reminders,
                &mailer_for_reminders,
                &rules_for_reminders,
                today,
            )
            .await;
        }
    });

    let mailer_data = Data::new(mailer);
    let rules_data = Data::new(reminder_rules);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(mailer_data.clone())
            .app_data(rules_data.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
