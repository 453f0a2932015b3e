mod cors;
mod scheduler;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::{clock::SystemClock, env_config::Config};
use db::pg::PgLedger;
use quota::QuotaEngine;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // get info
    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();
    let console_logging_enabled = config.console_logging_enabled;

    // init logger
    if console_logging_enabled {
        logger::setup().expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    // init quota engine
    let engine = Arc::new(QuotaEngine::new(
        Arc::new(PgLedger::new(pool)),
        Arc::new(SystemClock),
        config.sweepers.session_retention_days,
    ));

    // periodic sweepers
    scheduler::start(engine.clone(), &config.sweepers);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::new(engine.clone()))
            .wrap(logger::middleware(console_logging_enabled)) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_subs::mount_webhook())
                    .service(
                        api_review::mount_review()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    )
                    .service(
                        api_admin::mount_admin()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    ),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
