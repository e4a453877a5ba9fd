use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use std::sync::Arc;

use chamberlog::api;
use chamberlog::config::AppConfig;
use chamberlog::db;
use chamberlog::services::{
    access::{AccessGate, PgAccessGate},
    reading_store::{PgReadingStore, ReadingStore},
};

#[get("/")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "Chamber Monitoring Backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    // DB Pool initialization
    let pool = db::init_pool(&config.database_url).map_err(std::io::Error::other)?;

    let store: Arc<dyn ReadingStore> = Arc::new(PgReadingStore::new(pool.clone()));
    let gate: Arc<dyn AccessGate> = Arc::new(PgAccessGate::new(pool.clone()));

    log::info!(
        "Starting Chamber Monitoring Backend at http://{}:{}",
        config.bind_addr,
        config.port
    );
    log::info!("Operating timezone: {}", config.timezone);

    let bind = (config.bind_addr.clone(), config.port);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .app_data(web::Data::from(store.clone()))
            .app_data(web::Data::from(gate.clone()))
            .service(health_check)
            .configure(api::config)
    })
    .bind(bind)?
    .run()
    .await
}
