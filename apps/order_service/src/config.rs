// apps/order_service/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use orderflow::{EngineConfig, OrderStatus};
use std::env;

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  /// Absolute prefix for payment page links and callback redirects.
  pub app_base_url: String,
  pub run_migrations: bool,

  pub payment_signing_secret: String,
  pub payment_page_path: String,
  pub payment_method_label: String,
  pub paid_order_status: OrderStatus,
  pub allow_direct_confirm: bool,
  pub low_stock_threshold: i32,
}

impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &"[REDACTED]")
      .field("database_max_connections", &self.database_max_connections)
      .field("app_base_url", &self.app_base_url)
      .field("run_migrations", &self.run_migrations)
      .field("payment_signing_secret", &"[REDACTED]")
      .field("payment_page_path", &self.payment_page_path)
      .field("payment_method_label", &self.payment_method_label)
      .field("paid_order_status", &self.paid_order_status)
      .field("allow_direct_confirm", &self.allow_direct_confirm)
      .field("low_stock_threshold", &self.low_stock_threshold)
      .finish()
  }
}

fn parse_bool(var_name: &str, raw: &str) -> Result<bool> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    other => Err(AppError::Config(format!("Invalid {} value: '{}'", var_name, other))),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source; `from_env` passes the
  /// process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name).ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let database_max_connections = get_env("DATABASE_MAX_CONNECTIONS")
      .unwrap_or_else(|_| "10".to_string())
      .parse::<u32>()
      .map_err(|e| AppError::Config(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e)))?;
    let app_base_url = get_env("APP_BASE_URL")
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();
    let run_migrations = parse_bool(
      "RUN_MIGRATIONS",
      &get_env("RUN_MIGRATIONS").unwrap_or_else(|_| "true".to_string()),
    )?;

    let payment_signing_secret = get_env("PAYMENT_SIGNING_SECRET")?;
    if payment_signing_secret.trim().is_empty() {
      return Err(AppError::Config("PAYMENT_SIGNING_SECRET must not be empty".to_string()));
    }
    let payment_page_path = get_env("PAYMENT_PAGE_PATH").unwrap_or_else(|_| "/mock-pay".to_string());
    let payment_method_label = get_env("PAYMENT_METHOD_LABEL").unwrap_or_else(|_| "QR_PAYMENT".to_string());

    let paid_label = get_env("PAID_ORDER_STATUS").unwrap_or_else(|_| "Confirmed".to_string());
    let paid_order_status = OrderStatus::normalize(&paid_label)
      .ok_or_else(|| AppError::Config(format!("Invalid PAID_ORDER_STATUS: '{}'", paid_label)))?;

    let allow_direct_confirm = parse_bool(
      "ALLOW_DIRECT_CONFIRM",
      &get_env("ALLOW_DIRECT_CONFIRM").unwrap_or_else(|_| "true".to_string()),
    )?;
    let low_stock_threshold = get_env("LOW_STOCK_THRESHOLD")
      .unwrap_or_else(|_| "10".to_string())
      .parse::<i32>()
      .map_err(|e| AppError::Config(format!("Invalid LOW_STOCK_THRESHOLD: {}", e)))?;
    if low_stock_threshold < 0 {
      return Err(AppError::Config("LOW_STOCK_THRESHOLD must not be negative".to_string()));
    }

    let config = Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      app_base_url,
      run_migrations,
      payment_signing_secret,
      payment_page_path,
      payment_method_label,
      paid_order_status,
      allow_direct_confirm,
      low_stock_threshold,
    };
    config
      .engine_config()
      .validate()
      .map_err(|e| AppError::Config(format!("Invalid PAID_ORDER_STATUS: {}", e)))?;
    tracing::info!(config = ?config, "Application configuration loaded.");
    Ok(config)
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      signing_secret: self.payment_signing_secret.clone(),
      paid_status: self.paid_order_status,
      payment_method: self.payment_method_label.clone(),
      allow_direct_confirm: self.allow_direct_confirm,
      low_stock_threshold: self.low_stock_threshold,
      payment_page_path: self.payment_page_path.clone(),
    }
  }

  /// Turns a relative reference such as `/payment/success?...` into an absolute URL.
  pub fn absolute_url(&self, reference: &str) -> String {
    format!("{}{}", self.app_base_url, reference)
  }
}
