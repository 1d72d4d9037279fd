//! Process-wide handle to the backing store
//!
//! Constructed once by the supervisor and handed by `Arc` to the dispatcher.
//! The handle is set before any transport starts and never replaced.

use std::sync::{Arc, OnceLock};

use crate::error::BindingError;
use crate::store::Store;

/// Holds the single active store handle
#[derive(Default)]
pub struct ConnectionBinding {
    handle: OnceLock<Arc<dyn Store>>,
}

impl ConnectionBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the store. A second call fails and leaves the first handle in place.
    pub fn set(&self, store: Arc<dyn Store>) -> Result<(), BindingError> {
        self.handle
            .set(store)
            .map_err(|_| BindingError::AlreadyBound)
    }

    /// The bound store, if any
    pub fn get(&self) -> Option<&Arc<dyn Store>> {
        self.handle.get()
    }

    pub fn is_bound(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl std::fmt::Debug for ConnectionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBinding")
            .field("bound", &self.is_bound())
            .finish()
    }
}
