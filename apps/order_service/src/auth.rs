// apps/order_service/src/auth.rs

//! Caller identity. Authentication happens upstream; this service trusts the
//! `X-User-ID` and `X-User-Role` headers set by the gateway.

use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::errors::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  Admin,
  Manager,
  Employee,
  Customer,
}

impl Role {
  pub fn is_staff(&self) -> bool {
    matches!(self, Role::Admin | Role::Manager | Role::Employee)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Admin => "Admin",
      Role::Manager => "Manager",
      Role::Employee => "Employee",
      Role::Customer => "Customer",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "admin" => Ok(Role::Admin),
      "manager" => Ok(Role::Manager),
      "employee" | "staff" => Ok(Role::Employee),
      "customer" => Ok(Role::Customer),
      other => Err(AppError::Auth(format!("Unknown role '{}'", other))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Caller {
  pub user_id: i64,
  pub role: Role,
}

impl Caller {
  /// Fails with `Forbidden` unless the caller holds one of `roles`.
  pub fn require(&self, roles: &[Role], action: &str) -> Result<(), AppError> {
    if roles.contains(&self.role) {
      return Ok(());
    }
    warn!(user_id = self.user_id, role = %self.role, action, "Caller lacks required role.");
    Err(AppError::Forbidden(format!("role {} may not {}", self.role, action)))
  }

  pub fn require_staff(&self, action: &str) -> Result<(), AppError> {
    self.require(&[Role::Admin, Role::Manager, Role::Employee], action)
  }

  fn from_headers(req: &HttpRequest) -> Result<Self, AppError> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let user_id = header(USER_ID_HEADER)
      .and_then(|raw| raw.parse::<i64>().ok())
      .ok_or_else(|| AppError::Auth(format!("Missing or invalid {} header.", USER_ID_HEADER)))?;
    // Identified callers without a role header are treated as customers.
    let role = match header(USER_ROLE_HEADER) {
      Some(raw) if !raw.is_empty() => raw.parse()?,
      _ => Role::Customer,
    };
    Ok(Caller { user_id, role })
  }
}

impl FromRequest for Caller {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let caller = Caller::from_headers(req);
    if let Err(e) = &caller {
      warn!(error = %e, "Caller extraction failed.");
    }
    ready(caller)
  }
}
