//! Call context and transaction handle passed through to rules.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Caller-supplied context for a validation run.
///
/// Carries a cancellation token and arbitrary typed values. The engine never
/// checks cancellation itself; rules that do slow work may.
#[derive(Clone, Default)]
pub struct Context {
    cancellation: CancellationToken,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context observing an existing cancellation token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            values: HashMap::new(),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Stores a typed value under `key`, replacing any previous one.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_value<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Typed lookup; `None` when absent or of another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref::<T>()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Opaque transaction handle, forwarded to transaction-aware rules.
///
/// The engine never inspects it; rules downcast to the store's concrete
/// transaction type.
pub trait Transaction: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl dyn Transaction {
    pub fn downcast_ref<T: Transaction>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
