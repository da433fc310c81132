//! Stack Repository (C3): CRUD for stacks, resources, and execution
//! records, with JSON (de)serialization of the free-form map columns.

mod executions;
mod resources;
mod stacks;

use std::sync::Arc;

use crate::store::Store;

/// Owns a handle to the [`Store`] and exposes CRUD for stacks,
/// resources, and executions. All operations funnel through the
/// store's single reader-writer mutex (see [`crate::store::Store`]).
pub struct StackRepository {
    pub(crate) store: Arc<Store>,
}

impl StackRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
