// orderflow/src/store/memory.rs

//! In-process [`Store`]. Units of work are serialized by an async mutex and run
//! against a private copy of the state, which is published only on commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{Store, UnitOfWork};
use crate::error::{EngineError, EngineResult};
use crate::model::{
  NewPaymentRecord, Order, OrderDraft, OrderId, OrderLineItem, PaymentRecord, PaymentTransaction, ProductId,
  ProductStock, TransactionStatus,
};

/// Write operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
  AdjustStock,
  SetOrderStatus,
  InsertTransaction,
  FinalizeTransaction,
  AppendPaymentRecord,
  Commit,
  /// One-shot: the next transaction insert finds that an identical open
  /// transaction was committed just before it, and fails with `Conflict`.
  LostInsertRace,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
  pub products: BTreeMap<ProductId, ProductStock>,
  pub orders: BTreeMap<OrderId, Order>,
  pub line_items: BTreeMap<(OrderId, ProductId), OrderLineItem>,
  pub transactions: BTreeMap<String, PaymentTransaction>,
  pub payment_records: Vec<PaymentRecord>,
  next_order_id: OrderId,
  next_record_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  state: Arc<AsyncMutex<MemoryState>>,
  fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn seed_product(&self, id: ProductId, name: &str, price: Decimal, stock_quantity: i32) {
    let mut state = self.state.lock().await;
    state.products.insert(
      id,
      ProductStock {
        id,
        name: name.to_string(),
        price,
        stock_quantity,
        is_deleted: false,
      },
    );
  }

  pub async fn soft_delete_product(&self, id: ProductId) {
    if let Some(product) = self.state.lock().await.products.get_mut(&id) {
      product.is_deleted = true;
    }
  }

  /// Inserts an order exactly as given, bypassing placement rules.
  pub async fn seed_order(&self, order: Order, items: Vec<OrderLineItem>) {
    let mut state = self.state.lock().await;
    state.next_order_id = state.next_order_id.max(order.id);
    for item in items {
      state.line_items.insert((item.order_id, item.product_id), item);
    }
    state.orders.insert(order.id, order);
  }

  pub async fn snapshot(&self) -> MemoryState {
    self.state.lock().await.clone()
  }

  pub async fn stock_of(&self, product_id: ProductId) -> Option<i32> {
    self.state.lock().await.products.get(&product_id).map(|p| p.stock_quantity)
  }

  pub async fn order(&self, order_id: OrderId) -> Option<Order> {
    self.state.lock().await.orders.get(&order_id).cloned()
  }

  pub fn fail_on(&self, point: FailPoint) {
    self.fail_points.lock().insert(point);
  }

  pub fn clear_failures(&self) {
    self.fail_points.lock().clear();
  }
}

#[async_trait]
impl Store for MemoryStore {
  type Tx = MemoryTx;

  async fn begin(&self) -> EngineResult<MemoryTx> {
    let guard = self.state.clone().lock_owned().await;
    let working = guard.clone();
    Ok(MemoryTx {
      guard,
      working,
      fail_points: self.fail_points.clone(),
    })
  }
}

pub struct MemoryTx {
  guard: OwnedMutexGuard<MemoryState>,
  working: MemoryState,
  fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryTx {
  fn check(&self, point: FailPoint) -> EngineResult<()> {
    if self.fail_points.lock().contains(&point) {
      return Err(EngineError::storage(anyhow::anyhow!("injected failure at {:?}", point)));
    }
    Ok(())
  }
}

#[async_trait]
impl UnitOfWork for MemoryTx {
  async fn order(&mut self, order_id: OrderId) -> EngineResult<Option<Order>> {
    Ok(self.working.orders.get(&order_id).cloned())
  }

  // The async mutex already serializes units of work, so locking reads are plain reads.
  async fn lock_order(&mut self, order_id: OrderId) -> EngineResult<Option<Order>> {
    Ok(self.working.orders.get(&order_id).cloned())
  }

  async fn order_lines(&mut self, order_id: OrderId) -> EngineResult<Vec<OrderLineItem>> {
    Ok(
      self
        .working
        .line_items
        .range((order_id, ProductId::MIN)..=(order_id, ProductId::MAX))
        .map(|(_, item)| item.clone())
        .collect(),
    )
  }

  async fn insert_order(&mut self, draft: &OrderDraft) -> EngineResult<OrderId> {
    self.working.next_order_id += 1;
    let id = self.working.next_order_id;
    self.working.orders.insert(id, draft.clone().into_order(id));
    Ok(id)
  }

  async fn insert_line_item(&mut self, item: &OrderLineItem) -> EngineResult<()> {
    let key = (item.order_id, item.product_id);
    if self.working.line_items.contains_key(&key) {
      return Err(EngineError::Conflict(format!(
        "order #{} already has a line for product #{}",
        item.order_id, item.product_id
      )));
    }
    self.working.line_items.insert(key, item.clone());
    Ok(())
  }

  async fn set_order_status(&mut self, order_id: OrderId, status: &str) -> EngineResult<()> {
    self.check(FailPoint::SetOrderStatus)?;
    let order = self
      .working
      .orders
      .get_mut(&order_id)
      .ok_or(EngineError::OrderNotFound(order_id))?;
    order.status = Some(status.to_string());
    Ok(())
  }

  async fn set_order_total(&mut self, order_id: OrderId, total: Decimal) -> EngineResult<()> {
    let order = self
      .working
      .orders
      .get_mut(&order_id)
      .ok_or(EngineError::OrderNotFound(order_id))?;
    order.total_amount = total;
    Ok(())
  }

  async fn product(&mut self, product_id: ProductId) -> EngineResult<Option<ProductStock>> {
    Ok(self.working.products.get(&product_id).cloned())
  }

  async fn lock_product(&mut self, product_id: ProductId) -> EngineResult<Option<ProductStock>> {
    Ok(self.working.products.get(&product_id).cloned())
  }

  async fn adjust_stock(&mut self, product_id: ProductId, delta: i32) -> EngineResult<Option<i32>> {
    self.check(FailPoint::AdjustStock)?;
    let product = match self.working.products.get_mut(&product_id) {
      Some(p) => p,
      None => return Ok(None),
    };
    match product.stock_quantity.checked_add(delta) {
      Some(next) if next >= 0 => {
        product.stock_quantity = next;
        Ok(Some(next))
      }
      _ => Ok(None),
    }
  }

  async fn low_stock_products(&mut self, threshold: i32) -> EngineResult<Vec<ProductStock>> {
    let mut low: Vec<ProductStock> = self
      .working
      .products
      .values()
      .filter(|p| !p.is_deleted && p.stock_quantity <= threshold)
      .cloned()
      .collect();
    low.sort_by_key(|p| (p.stock_quantity, p.id));
    Ok(low)
  }

  async fn open_transaction(&mut self, order_id: OrderId) -> EngineResult<Option<PaymentTransaction>> {
    Ok(
      self
        .working
        .transactions
        .values()
        .find(|t| t.order_id == order_id && t.status == TransactionStatus::Created)
        .cloned(),
    )
  }

  async fn insert_transaction(&mut self, txn: &PaymentTransaction) -> EngineResult<()> {
    self.check(FailPoint::InsertTransaction)?;
    if self.fail_points.lock().remove(&FailPoint::LostInsertRace) {
      self.guard.transactions.insert(txn.id.clone(), txn.clone());
      return Err(EngineError::Conflict(format!(
        "order #{} already has an open payment transaction",
        txn.order_id
      )));
    }
    if self.working.transactions.contains_key(&txn.id) {
      return Err(EngineError::Conflict(format!("transaction id '{}' already exists", txn.id)));
    }
    let has_open = self
      .working
      .transactions
      .values()
      .any(|t| t.order_id == txn.order_id && t.status == TransactionStatus::Created);
    if has_open && txn.status == TransactionStatus::Created {
      return Err(EngineError::Conflict(format!(
        "order #{} already has an open payment transaction",
        txn.order_id
      )));
    }
    self.working.transactions.insert(txn.id.clone(), txn.clone());
    Ok(())
  }

  async fn transaction(&mut self, transaction_id: &str) -> EngineResult<Option<PaymentTransaction>> {
    Ok(self.working.transactions.get(transaction_id).cloned())
  }

  async fn lock_transaction(&mut self, transaction_id: &str) -> EngineResult<Option<PaymentTransaction>> {
    Ok(self.working.transactions.get(transaction_id).cloned())
  }

  async fn finalize_transaction(
    &mut self,
    transaction_id: &str,
    status: TransactionStatus,
    at: DateTime<Utc>,
  ) -> EngineResult<bool> {
    self.check(FailPoint::FinalizeTransaction)?;
    match self.working.transactions.get_mut(transaction_id) {
      Some(txn) if txn.status == TransactionStatus::Created => {
        txn.status = status;
        txn.updated_at = at;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn order_transactions(&mut self, order_id: OrderId) -> EngineResult<Vec<PaymentTransaction>> {
    let mut txns: Vec<PaymentTransaction> = self
      .working
      .transactions
      .values()
      .filter(|t| t.order_id == order_id)
      .cloned()
      .collect();
    txns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    Ok(txns)
  }

  async fn append_payment_record(&mut self, record: &NewPaymentRecord) -> EngineResult<PaymentRecord> {
    self.check(FailPoint::AppendPaymentRecord)?;
    self.working.next_record_id += 1;
    let stored = PaymentRecord {
      id: self.working.next_record_id,
      order_id: record.order_id,
      method: record.method.clone(),
      paid_on: record.paid_on,
      amount: record.amount,
    };
    self.working.payment_records.push(stored.clone());
    Ok(stored)
  }

  async fn payment_records(&mut self, order_id: OrderId) -> EngineResult<Vec<PaymentRecord>> {
    Ok(
      self
        .working
        .payment_records
        .iter()
        .filter(|r| r.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn commit(self) -> EngineResult<()> {
    self.check(FailPoint::Commit)?;
    let MemoryTx { mut guard, working, .. } = self;
    *guard = working;
    Ok(())
  }
}
