//! State Backend (C4): snapshots, rollback, drift, locks, tags,
//! dependencies, and the activity log, layered on top of the Stack
//! Repository (C3).
//!
//! Public methods here never hold the store's write guard across a
//! nested public call — e.g. `rollback_to_snapshot` calls
//! `create_snapshot` for its pre-rollback backup, and that nested call
//! acquires its own guard rather than reusing one held by the caller.
//! This is the "internal holds the lock, public acquires it" split
//! called for by the engine's concurrency design: because every SQL
//! statement here is its own short critical section, the split falls
//! out naturally as long as call sites never wrap a nested backend
//! call in an open guard, which none of the methods below do.

mod activity;
mod dependencies;
mod drift;
mod locks;
mod rollback;
mod snapshots;
mod tags;

use std::sync::Arc;

use crate::repository::StackRepository;

pub use drift::diff_drifted_fields;

pub struct StateBackend {
    pub(crate) repo: Arc<StackRepository>,
}

impl StateBackend {
    pub fn new(repo: Arc<StackRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<StackRepository> {
        &self.repo
    }
}
