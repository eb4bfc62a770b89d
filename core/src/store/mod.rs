// orderflow/src/store/mod.rs

//! Persistence seam. Every engine operation opens one [`UnitOfWork`], performs
//! all of its reads and writes through it and commits once. Dropping a unit of
//! work without calling [`UnitOfWork::commit`] must discard every change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::EngineResult;
use crate::model::{
  NewPaymentRecord, Order, OrderDraft, OrderId, OrderLineItem, PaymentRecord, PaymentTransaction, ProductId,
  ProductStock, TransactionStatus,
};

pub mod memory;

pub use memory::{FailPoint, MemoryState, MemoryStore};

#[async_trait]
pub trait Store: Send + Sync + 'static {
  type Tx: UnitOfWork;

  async fn begin(&self) -> EngineResult<Self::Tx>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sized {
  // --- Orders ---

  async fn order(&mut self, order_id: OrderId) -> EngineResult<Option<Order>>;

  /// Reads the order header and holds it against concurrent writers until the
  /// unit of work ends.
  async fn lock_order(&mut self, order_id: OrderId) -> EngineResult<Option<Order>>;

  async fn order_lines(&mut self, order_id: OrderId) -> EngineResult<Vec<OrderLineItem>>;

  async fn insert_order(&mut self, draft: &OrderDraft) -> EngineResult<OrderId>;

  async fn insert_line_item(&mut self, item: &OrderLineItem) -> EngineResult<()>;

  async fn set_order_status(&mut self, order_id: OrderId, status: &str) -> EngineResult<()>;

  /// Repricing hook for administrative flows; never touches existing transactions.
  async fn set_order_total(&mut self, order_id: OrderId, total: Decimal) -> EngineResult<()>;

  // --- Product stock ---

  async fn product(&mut self, product_id: ProductId) -> EngineResult<Option<ProductStock>>;

  /// Reads and locks a product row. Callers lock products in ascending id order.
  async fn lock_product(&mut self, product_id: ProductId) -> EngineResult<Option<ProductStock>>;

  /// Applies `stock += delta` only if the result stays `>= 0`. Returns the new
  /// level, or `None` when the guard rejected the change.
  async fn adjust_stock(&mut self, product_id: ProductId, delta: i32) -> EngineResult<Option<i32>>;

  /// Non-deleted products whose stock is at or below `threshold`, lowest first.
  async fn low_stock_products(&mut self, threshold: i32) -> EngineResult<Vec<ProductStock>>;

  // --- Payment transactions ---

  async fn transaction(&mut self, transaction_id: &str) -> EngineResult<Option<PaymentTransaction>>;

  async fn open_transaction(&mut self, order_id: OrderId) -> EngineResult<Option<PaymentTransaction>>;

  /// Fails with `EngineError::Conflict` if the order already has a `Created`
  /// transaction or the id is taken.
  async fn insert_transaction(&mut self, txn: &PaymentTransaction) -> EngineResult<()>;

  async fn lock_transaction(&mut self, transaction_id: &str) -> EngineResult<Option<PaymentTransaction>>;

  /// Moves a transaction out of `Created`. Returns `false` if it had already left it.
  async fn finalize_transaction(
    &mut self,
    transaction_id: &str,
    status: TransactionStatus,
    at: DateTime<Utc>,
  ) -> EngineResult<bool>;

  /// Newest first.
  async fn order_transactions(&mut self, order_id: OrderId) -> EngineResult<Vec<PaymentTransaction>>;

  // --- Payment ledger ---

  async fn append_payment_record(&mut self, record: &NewPaymentRecord) -> EngineResult<PaymentRecord>;

  async fn payment_records(&mut self, order_id: OrderId) -> EngineResult<Vec<PaymentRecord>>;

  async fn commit(self) -> EngineResult<()>;
}
