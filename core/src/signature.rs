// orderflow/src/signature.rs

//! Keyed signatures binding a payment transaction id to its locked amount.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;

use crate::error::{EngineError, EngineResult};

type HmacSha256 = Hmac<Sha256>;

/// Renders an amount with exactly two fractional digits and `.` as separator,
/// e.g. `250000` -> `"250000.00"`.
pub fn canonical_amount(amount: Decimal) -> String {
  let mut rounded = amount.round_dp(2);
  rounded.rescale(2);
  rounded.to_string()
}

#[derive(Clone)]
pub struct Signer {
  mac: HmacSha256,
}

impl std::fmt::Debug for Signer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Signer").field("secret", &"[REDACTED]").finish()
  }
}

impl Signer {
  pub fn new(secret: impl AsRef<[u8]>) -> EngineResult<Self> {
    let secret = secret.as_ref();
    if secret.is_empty() {
      return Err(EngineError::InvalidInput("payment signing secret must not be empty".to_string()));
    }
    let mac = HmacSha256::new_from_slice(secret)
      .map_err(|e| EngineError::InvalidInput(format!("unusable payment signing secret: {}", e)))?;
    Ok(Self { mac })
  }

  fn keyed(&self, transaction_id: &str, amount: Decimal) -> HmacSha256 {
    let mut mac = self.mac.clone();
    mac.update(transaction_id.as_bytes());
    mac.update(b":");
    mac.update(canonical_amount(amount).as_bytes());
    mac
  }

  /// Lowercase hex HMAC-SHA256 over `"{id}:{amount}"`.
  pub fn sign(&self, transaction_id: &str, amount: Decimal) -> String {
    hex::encode(self.keyed(transaction_id, amount).finalize().into_bytes())
  }

  /// Constant-time comparison. Malformed hex is a mismatch, not an error.
  pub fn verify(&self, transaction_id: &str, amount: Decimal, signature: &str) -> bool {
    let provided = match hex::decode(signature.trim()) {
      Ok(bytes) => bytes,
      Err(_) => return false,
    };
    self.keyed(transaction_id, amount).verify_slice(&provided).is_ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn signer() -> Signer {
    Signer::new("unit-test-secret").unwrap()
  }

  #[test]
  fn amount_rendering_is_scale_independent() {
    assert_eq!(canonical_amount(dec!(250000)), "250000.00");
    assert_eq!(canonical_amount(dec!(250000.0)), "250000.00");
    assert_eq!(canonical_amount(dec!(250000.000)), "250000.00");
    assert_eq!(canonical_amount(dec!(19.999)), "20.00");
    assert_eq!(canonical_amount(dec!(0)), "0.00");
  }

  #[test]
  fn sign_is_deterministic_and_verifies() {
    let s = signer();
    let sig = s.sign("TXN_20250101120000_ABCDEF12", dec!(250000));
    assert_eq!(sig.len(), 64);
    assert_eq!(sig, s.sign("TXN_20250101120000_ABCDEF12", dec!(250000.00)));
    assert!(s.verify("TXN_20250101120000_ABCDEF12", dec!(250000), &sig));
    assert!(s.verify("TXN_20250101120000_ABCDEF12", dec!(250000), &sig.to_uppercase()));
  }

  #[test]
  fn tampered_amount_or_id_is_rejected() {
    let s = signer();
    let sig = s.sign("TXN_A", dec!(250000));
    assert!(!s.verify("TXN_A", dec!(1), &sig));
    assert!(!s.verify("TXN_A", dec!(250000.01), &sig));
    assert!(!s.verify("TXN_B", dec!(250000), &sig));
    assert!(!s.verify("TXN_A", dec!(250000), "not-hex"));
    assert!(!s.verify("TXN_A", dec!(250000), ""));
  }

  #[test]
  fn different_secrets_disagree() {
    let other = Signer::new("another-secret").unwrap();
    let sig = signer().sign("TXN_A", dec!(10));
    assert!(!other.verify("TXN_A", dec!(10), &sig));
  }

  #[test]
  fn empty_secret_is_rejected() {
    assert!(matches!(Signer::new(""), Err(EngineError::InvalidInput(_))));
  }
}
