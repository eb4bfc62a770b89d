// apps/order_service/src/pipelines/contexts.rs

//! Data carried through each workflow run. Handlers receive these wrapped in
//! `orderflow::ContextData`; the HTTP handler reads the result fields after the run.

use crate::auth::Caller;
use crate::state::AppState;
use orderflow::{CallbackOutcome, CallbackResult, NewOrder, OrderId, PlacedOrder, StatusChange, Store, TransactionRef};

pub struct StatusChangeCtxData<S: Store> {
  pub app_state: AppState<S>,
  pub caller: Caller,
  pub order_id: OrderId,
  pub requested_status: String,
  pub change: Option<StatusChange>,
}

pub struct PlaceOrderCtxData<S: Store> {
  pub app_state: AppState<S>,
  pub caller: Caller,
  pub request: NewOrder,
  pub placed: Option<PlacedOrder>,
}

pub struct CreatePaymentCtxData<S: Store> {
  pub app_state: AppState<S>,
  pub caller: Caller,
  pub order_id: OrderId,
  pub transaction: Option<TransactionRef>,
  /// Absolute link to the payment page.
  pub payment_url: Option<String>,
}

pub struct PaymentCallbackCtxData<S: Store> {
  pub app_state: AppState<S>,
  pub transaction_id: String,
  pub result_label: String,
  pub signature: String,
  pub result: Option<CallbackResult>,
  pub outcome: Option<CallbackOutcome>,
  pub redirect_url: Option<String>,
}
