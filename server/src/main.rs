use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use presence_server::config::Config;
use presence_server::handlers;
use presence_server::server::Server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let server = web::Data::new(Server::new(config.hub_config()));

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(server.clone())
            .configure(handlers::root)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
