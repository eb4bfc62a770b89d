// apps/order_service/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use std::io;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use order_service::config::AppConfig;
use order_service::db::{self, PgStore};
use order_service::state::AppState;
use order_service::web::configure_app_routes;

fn startup_error(stage: &str, e: impl std::fmt::Display) -> io::Error {
  tracing::error!(stage, error = %e, "Startup failed.");
  io::Error::other(format!("{}: {}", stage, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting order service...");

  let app_config = AppConfig::from_env().map_err(|e| startup_error("configuration", e))?;

  let pool = db::connect(&app_config.database_url, app_config.database_max_connections)
    .await
    .map_err(|e| startup_error("database connection", e))?;
  tracing::info!("Connected to the database.");

  if app_config.run_migrations {
    db::run_migrations(&pool).await.map_err(|e| startup_error("migrations", e))?;
    tracing::info!("Database migrations applied.");
  }

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let app_state = AppState::build(PgStore::new(pool), app_config).map_err(|e| startup_error("workflow registration", e))?;
  tracing::info!("Order workflows registered.");

  tracing::info!("Binding server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes::<PgStore>)
  })
  .bind(&server_address)?
  .run()
  .await
}
