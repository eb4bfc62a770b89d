// apps/order_service/src/web/routes.rs

use actix_web::web;
use orderflow::Store;

use crate::web::handlers::{inventory_handlers, order_handlers, payment_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Mounts the API under `/api/v1`. Generic over the store so tests can serve
/// the same routes from memory.
pub fn configure_app_routes<S: Store>(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::place_order_handler::<S>))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler::<S>))
          .route("/{order_id}/status", web::put().to(order_handlers::change_status_handler::<S>))
          .route(
            "/{order_id}/inventory",
            web::get().to(inventory_handlers::check_order_inventory_handler::<S>),
          )
          .route(
            "/{order_id}/transactions",
            web::get().to(payment_handlers::order_transactions_handler::<S>),
          )
          .route("/{order_id}/payments", web::get().to(payment_handlers::order_payments_handler::<S>)),
      )
      .service(
        web::scope("/inventory").route("/low-stock", web::get().to(inventory_handlers::low_stock_handler::<S>)),
      )
      .service(
        web::scope("/payments")
          .route("/transactions", web::post().to(payment_handlers::create_transaction_handler::<S>))
          .route(
            "/transactions/{transaction_id}",
            web::get().to(payment_handlers::get_transaction_handler::<S>),
          )
          // Called by the payment page; authenticated by the transaction signature.
          .route("/callback", web::post().to(payment_handlers::payment_callback_handler::<S>)),
      ),
  );
}
