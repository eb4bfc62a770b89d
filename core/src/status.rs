// orderflow/src/status.rs

//! Canonical order statuses, the single normalization table for legacy and
//! localized labels, and the transition resolver that maps a status change to
//! an inventory action.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
  Returned,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 7] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
    OrderStatus::Returned,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::Confirmed => "Confirmed",
      OrderStatus::Processing => "Processing",
      OrderStatus::Shipped => "Shipped",
      OrderStatus::Delivered => "Delivered",
      OrderStatus::Cancelled => "Cancelled",
      OrderStatus::Returned => "Returned",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned)
  }

  /// Statuses in which the order's units have been deducted from stock.
  pub fn holds_stock(&self) -> bool {
    matches!(
      self,
      OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
    )
  }

  /// Case-insensitive lookup of canonical names first, then of the alias table.
  pub fn normalize(label: &str) -> Option<OrderStatus> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
      return None;
    }
    let lowered = trimmed.to_lowercase();
    OrderStatus::ALL
      .iter()
      .copied()
      .find(|s| s.as_str().to_lowercase() == lowered)
      .or_else(|| {
        STATUS_ALIASES
          .iter()
          .find(|(alias, _)| alias.to_lowercase() == lowered)
          .map(|(_, status)| *status)
      })
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Display and legacy labels still found in stored rows and client requests.
const STATUS_ALIASES: &[(&str, OrderStatus)] = &[
  ("Chờ thanh toán", OrderStatus::Pending),
  ("Chờ xử lý", OrderStatus::Pending),
  ("PENDING_PAYMENT", OrderStatus::Pending),
  ("Đã xác nhận", OrderStatus::Confirmed),
  ("PAID", OrderStatus::Confirmed),
  ("Đã thanh toán", OrderStatus::Confirmed),
  ("Đang xử lý", OrderStatus::Processing),
  ("Đã xử lý", OrderStatus::Processing),
  ("Đang giao", OrderStatus::Shipped),
  ("Đã giao hàng", OrderStatus::Shipped),
  ("Đã giao", OrderStatus::Delivered),
  ("Hoàn thành", OrderStatus::Delivered),
  ("Đã hủy", OrderStatus::Cancelled),
  ("Canceled", OrderStatus::Cancelled),
  ("Đã trả hàng", OrderStatus::Returned),
];

/// A status as found in storage or in a request: either a recognized canonical
/// value or an unrecognized label kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusValue {
  Known(OrderStatus),
  Unrecognized(String),
}

impl StatusValue {
  pub fn parse(label: &str) -> Self {
    match OrderStatus::normalize(label) {
      Some(status) => StatusValue::Known(status),
      None => StatusValue::Unrecognized(label.to_string()),
    }
  }

  pub fn known(&self) -> Option<OrderStatus> {
    match self {
      StatusValue::Known(status) => Some(*status),
      StatusValue::Unrecognized(_) => None,
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      StatusValue::Known(status) => status.as_str(),
      StatusValue::Unrecognized(label) => label.as_str(),
    }
  }
}

impl From<OrderStatus> for StatusValue {
  fn from(status: OrderStatus) -> Self {
    StatusValue::Known(status)
  }
}

impl fmt::Display for StatusValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryAction {
  Reserve,
  Confirm,
  Release,
  Cancel,
  None,
}

impl InventoryAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      InventoryAction::Reserve => "reserve",
      InventoryAction::Confirm => "confirm",
      InventoryAction::Release => "release",
      InventoryAction::Cancel => "cancel",
      InventoryAction::None => "none",
    }
  }

  pub fn deducts(&self) -> bool {
    matches!(self, InventoryAction::Reserve | InventoryAction::Confirm)
  }

  pub fn restores(&self) -> bool {
    matches!(self, InventoryAction::Release | InventoryAction::Cancel)
  }
}

impl fmt::Display for InventoryAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Maps a status change to the stock action it implies. Rules apply in order,
/// first match wins. `previous = None` means the order is being created.
///
/// An unrecognized `next` always yields `None`. An unrecognized `previous` is
/// still a previous status: it can reach `Confirmed` but never restores stock.
pub fn resolve(previous: Option<&StatusValue>, next: &StatusValue) -> InventoryAction {
  let next = match next.known() {
    Some(status) => status,
    None => return InventoryAction::None,
  };

  let previous = match previous {
    None => {
      return if next == OrderStatus::Confirmed {
        InventoryAction::Confirm
      } else {
        InventoryAction::None
      };
    }
    Some(value) => value.known(),
  };

  if next == OrderStatus::Confirmed {
    return if previous == Some(OrderStatus::Confirmed) {
      InventoryAction::None
    } else {
      InventoryAction::Confirm
    };
  }

  match (previous, next) {
    (Some(prev), OrderStatus::Cancelled) if prev.holds_stock() => InventoryAction::Cancel,
    (Some(OrderStatus::Pending), OrderStatus::Cancelled) => InventoryAction::None,
    (Some(OrderStatus::Delivered), OrderStatus::Returned) => InventoryAction::Release,
    (_, OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered) => InventoryAction::None,
    _ => InventoryAction::None,
  }
}
