// orderflow/src/lib.rs

//! Order lifecycle engine: status transitions with their inventory effects,
//! all-or-nothing stock deduction, and signed payment transactions whose
//! callbacks settle an order exactly once.
//!
//! Storage is abstracted behind [`store::Store`]; [`store::MemoryStore`] ships
//! with the crate and the service binary provides a PostgreSQL implementation.

pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod model;
pub mod payment;
pub mod signature;
pub mod status;
pub mod store;
pub mod workflow;

pub use crate::config::EngineConfig;
pub use crate::engine::OrderEngine;
pub use crate::error::{EngineError, EngineResult, ErrorKind};
pub use crate::inventory::StockChange;
pub use crate::lifecycle::{order_total, OrderSnapshot, PlacedOrder, StatusChange};
pub use crate::model::{
  Availability, NewLineItem, NewOrder, NewPaymentRecord, Order, OrderDraft, OrderId, OrderLineItem, PaymentRecord,
  PaymentTransaction, ProductId, ProductStock, Shortfall, StockRequest, TransactionStatus,
};
pub use crate::payment::{mint_transaction_id, CallbackOutcome, CallbackResult, TransactionRef};
pub use crate::signature::{canonical_amount, Signer};
pub use crate::status::{resolve, InventoryAction, OrderStatus, StatusValue};
pub use crate::store::{FailPoint, MemoryStore, Store, UnitOfWork};
pub use crate::workflow::{ContextData, Pipeline, PipelineControl, PipelineResult, WorkflowError, Workflows};
