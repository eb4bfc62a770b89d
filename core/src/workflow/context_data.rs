// orderflow/src/workflow/context_data.rs
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lockable state threaded through every step of a workflow run.
///
/// Guards are blocking locks: take what you need, drop the guard, then `.await`.
#[derive(Debug)]
pub struct ContextData<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> ContextData<T> {
  pub fn new(data: T) -> Self {
    ContextData(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Runs `f` under the write lock and returns its result; the guard never
  /// escapes, so this is safe to call between awaits.
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.0.write())
  }

  /// Recovers the data once every clone held by handlers has been dropped.
  pub fn try_into_inner(self) -> Result<T, Self> {
    Arc::try_unwrap(self.0).map(RwLock::into_inner).map_err(ContextData)
  }
}

impl<T: Send + Sync + Clone + 'static> ContextData<T> {
  pub fn snapshot(&self) -> T {
    self.0.read().clone()
  }
}

impl<T: Send + Sync + 'static> Clone for ContextData<T> {
  fn clone(&self) -> Self {
    ContextData(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + Default + 'static> Default for ContextData<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}
