// apps/order_service/src/db/pg_store.rs

//! [`Store`] over PostgreSQL. Each unit of work is one database transaction;
//! locks are row locks (`FOR UPDATE`) held until commit or rollback, and stock
//! changes go through a guarded `UPDATE` that refuses to go below zero.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderflow::{
  EngineError, EngineResult, NewPaymentRecord, Order, OrderDraft, OrderId, OrderLineItem, PaymentRecord,
  PaymentTransaction, ProductId, ProductStock, Store, TransactionStatus, UnitOfWork,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use super::rows::{LineRow, OrderRow, ProductRow, RecordRow, TransactionRow};

const ORDER_COLUMNS: &str =
  "id, placed_on, total_amount, status, customer_id, staff_id, shipper_id, discount_code, shipping_fee";
const PRODUCT_COLUMNS: &str = "id, name, price, stock_quantity, is_deleted";
const TRANSACTION_COLUMNS: &str = "id, order_id, amount, status, signature, created_at, updated_at";

fn db_err(e: sqlx::Error) -> EngineError {
  EngineError::storage(e)
}

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl Store for PgStore {
  type Tx = PgUnitOfWork;

  async fn begin(&self) -> EngineResult<PgUnitOfWork> {
    let tx = self.pool.begin().await.map_err(db_err)?;
    Ok(PgUnitOfWork { tx })
  }
}

/// Rolled back on drop unless committed.
pub struct PgUnitOfWork {
  tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
  async fn fetch_order(&mut self, order_id: OrderId, lock: bool) -> EngineResult<Option<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE id = $1{}",
      ORDER_COLUMNS,
      if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order_id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db_err)?;
    Ok(row.map(Order::from))
  }

  async fn fetch_product(&mut self, product_id: ProductId, lock: bool) -> EngineResult<Option<ProductStock>> {
    let sql = format!(
      "SELECT {} FROM products WHERE id = $1{}",
      PRODUCT_COLUMNS,
      if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
      .bind(product_id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db_err)?;
    Ok(row.map(ProductStock::from))
  }

  async fn fetch_transaction(&mut self, transaction_id: &str, lock: bool) -> EngineResult<Option<PaymentTransaction>> {
    let sql = format!(
      "SELECT {} FROM payment_transactions WHERE id = $1{}",
      TRANSACTION_COLUMNS,
      if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, TransactionRow>(&sql)
      .bind(transaction_id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db_err)?;
    row.map(PaymentTransaction::try_from).transpose()
  }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
  async fn order(&mut self, order_id: OrderId) -> EngineResult<Option<Order>> {
    self.fetch_order(order_id, false).await
  }

  async fn lock_order(&mut self, order_id: OrderId) -> EngineResult<Option<Order>> {
    self.fetch_order(order_id, true).await
  }

  async fn order_lines(&mut self, order_id: OrderId) -> EngineResult<Vec<OrderLineItem>> {
    let rows = sqlx::query_as::<_, LineRow>(
      "SELECT order_id, product_id, quantity, unit_price, item_discount
       FROM order_items WHERE order_id = $1 ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await
    .map_err(db_err)?;
    Ok(rows.into_iter().map(OrderLineItem::from).collect())
  }

  async fn insert_order(&mut self, draft: &OrderDraft) -> EngineResult<OrderId> {
    let id: i64 = sqlx::query_scalar(
      "INSERT INTO orders (placed_on, total_amount, status, customer_id, staff_id, shipper_id, discount_code, shipping_fee)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
       RETURNING id",
    )
    .bind(draft.placed_on)
    .bind(draft.total_amount)
    .bind(&draft.status)
    .bind(draft.customer_id)
    .bind(draft.staff_id)
    .bind(draft.shipper_id)
    .bind(&draft.discount_code)
    .bind(draft.shipping_fee)
    .fetch_one(&mut *self.tx)
    .await
    .map_err(db_err)?;
    Ok(id)
  }

  async fn insert_line_item(&mut self, item: &OrderLineItem) -> EngineResult<()> {
    sqlx::query(
      "INSERT INTO order_items (order_id, product_id, quantity, unit_price, item_discount)
       VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(item.order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.item_discount)
    .execute(&mut *self.tx)
    .await
    .map_err(db_err)?;
    Ok(())
  }

  async fn set_order_status(&mut self, order_id: OrderId, status: &str) -> EngineResult<()> {
    let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
      .bind(order_id)
      .bind(status)
      .execute(&mut *self.tx)
      .await
      .map_err(db_err)?;
    if result.rows_affected() == 0 {
      return Err(EngineError::OrderNotFound(order_id));
    }
    Ok(())
  }

  async fn set_order_total(&mut self, order_id: OrderId, total: Decimal) -> EngineResult<()> {
    let result = sqlx::query("UPDATE orders SET total_amount = $2, updated_at = NOW() WHERE id = $1")
      .bind(order_id)
      .bind(total)
      .execute(&mut *self.tx)
      .await
      .map_err(db_err)?;
    if result.rows_affected() == 0 {
      return Err(EngineError::OrderNotFound(order_id));
    }
    Ok(())
  }

  async fn product(&mut self, product_id: ProductId) -> EngineResult<Option<ProductStock>> {
    self.fetch_product(product_id, false).await
  }

  async fn lock_product(&mut self, product_id: ProductId) -> EngineResult<Option<ProductStock>> {
    self.fetch_product(product_id, true).await
  }

  #[instrument(name = "PgUnitOfWork::adjust_stock", skip(self), level = "debug", err(Display))]
  async fn adjust_stock(&mut self, product_id: ProductId, delta: i32) -> EngineResult<Option<i32>> {
    let level: Option<i32> = sqlx::query_scalar(
      "UPDATE products SET stock_quantity = stock_quantity + $2
       WHERE id = $1 AND stock_quantity + $2 >= 0
       RETURNING stock_quantity",
    )
    .bind(product_id)
    .bind(delta)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(db_err)?;
    if level.is_none() {
      debug!(product_id, delta, "Guarded stock update matched no row.");
    }
    Ok(level)
  }

  async fn low_stock_products(&mut self, threshold: i32) -> EngineResult<Vec<ProductStock>> {
    let sql = format!(
      "SELECT {} FROM products WHERE is_deleted = FALSE AND stock_quantity <= $1 ORDER BY stock_quantity, id",
      PRODUCT_COLUMNS
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
      .bind(threshold)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(db_err)?;
    Ok(rows.into_iter().map(ProductStock::from).collect())
  }

  async fn transaction(&mut self, transaction_id: &str) -> EngineResult<Option<PaymentTransaction>> {
    self.fetch_transaction(transaction_id, false).await
  }

  async fn open_transaction(&mut self, order_id: OrderId) -> EngineResult<Option<PaymentTransaction>> {
    let sql = format!(
      "SELECT {} FROM payment_transactions WHERE order_id = $1 AND status = 'CREATED'",
      TRANSACTION_COLUMNS
    );
    let row = sqlx::query_as::<_, TransactionRow>(&sql)
      .bind(order_id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(db_err)?;
    row.map(PaymentTransaction::try_from).transpose()
  }

  async fn insert_transaction(&mut self, txn: &PaymentTransaction) -> EngineResult<()> {
    let result = sqlx::query(
      "INSERT INTO payment_transactions (id, order_id, amount, status, signature, created_at, updated_at)
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(&txn.id)
    .bind(txn.order_id)
    .bind(txn.amount)
    .bind(txn.status.as_str())
    .bind(&txn.signature)
    .bind(txn.created_at)
    .bind(txn.updated_at)
    .execute(&mut *self.tx)
    .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(EngineError::Conflict(format!(
        "order #{} already has an open payment transaction ({})",
        txn.order_id,
        db.constraint().unwrap_or("unique constraint")
      ))),
      Err(other) => Err(db_err(other)),
    }
  }

  async fn lock_transaction(&mut self, transaction_id: &str) -> EngineResult<Option<PaymentTransaction>> {
    self.fetch_transaction(transaction_id, true).await
  }

  async fn finalize_transaction(
    &mut self,
    transaction_id: &str,
    status: TransactionStatus,
    at: DateTime<Utc>,
  ) -> EngineResult<bool> {
    let result = sqlx::query(
      "UPDATE payment_transactions SET status = $2, updated_at = $3
       WHERE id = $1 AND status = 'CREATED'",
    )
    .bind(transaction_id)
    .bind(status.as_str())
    .bind(at)
    .execute(&mut *self.tx)
    .await
    .map_err(db_err)?;
    Ok(result.rows_affected() == 1)
  }

  async fn order_transactions(&mut self, order_id: OrderId) -> EngineResult<Vec<PaymentTransaction>> {
    let sql = format!(
      "SELECT {} FROM payment_transactions WHERE order_id = $1 ORDER BY created_at DESC, id DESC",
      TRANSACTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, TransactionRow>(&sql)
      .bind(order_id)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(db_err)?;
    rows.into_iter().map(PaymentTransaction::try_from).collect()
  }

  async fn append_payment_record(&mut self, record: &NewPaymentRecord) -> EngineResult<PaymentRecord> {
    let row = sqlx::query_as::<_, RecordRow>(
      "INSERT INTO payment_records (order_id, method, paid_on, amount)
       VALUES ($1, $2, $3, $4)
       RETURNING id, order_id, method, paid_on, amount",
    )
    .bind(record.order_id)
    .bind(&record.method)
    .bind(record.paid_on)
    .bind(record.amount)
    .fetch_one(&mut *self.tx)
    .await
    .map_err(db_err)?;
    Ok(row.into())
  }

  async fn payment_records(&mut self, order_id: OrderId) -> EngineResult<Vec<PaymentRecord>> {
    let rows = sqlx::query_as::<_, RecordRow>(
      "SELECT id, order_id, method, paid_on, amount FROM payment_records WHERE order_id = $1 ORDER BY paid_on, id",
    )
    .bind(order_id)
    .fetch_all(&mut *self.tx)
    .await
    .map_err(db_err)?;
    Ok(rows.into_iter().map(PaymentRecord::from).collect())
  }

  async fn commit(self) -> EngineResult<()> {
    self.tx.commit().await.map_err(db_err)
  }
}
