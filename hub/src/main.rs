use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use hub::config::Config;
use hub::handlers::root;
use hub::hub::spawn_hub;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("{}, using defaults", e);
        Config::default()
    });

    let hub_tx = spawn_hub();

    log::info!("Hub listening on {}", config.server_address());
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(hub_tx.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(root)
    })
    .bind(config.server_address())?
    .run()
    .await
}
