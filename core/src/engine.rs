// orderflow/src/engine.rs

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::signature::Signer;
use crate::store::Store;

/// Entry point for every engine operation. Order lifecycle operations live in
/// `lifecycle.rs`, payment operations in `payment.rs`.
pub struct OrderEngine<S: Store> {
  pub(crate) store: S,
  pub(crate) config: EngineConfig,
  pub(crate) signer: Signer,
}

impl<S: Store> OrderEngine<S> {
  pub fn new(store: S, config: EngineConfig) -> EngineResult<Self> {
    config.validate()?;
    let signer = Signer::new(&config.signing_secret)?;
    Ok(Self { store, config, signer })
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn signer(&self) -> &Signer {
    &self.signer
  }
}
