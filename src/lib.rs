//! Unified Stack State Engine.
//!
//! Embedded storage, cryptography, and coordination primitives backing
//! a workflow runner's infrastructure-as-code layer: stacks made of
//! resources, versioned snapshots with rollback, a lock/lease
//! protocol, drift detection, encrypted secrets, an in-process event
//! bus, operation tracking, dependency graph analysis, policy-driven
//! auto-remediation, and a one-shot legacy migration path.

pub mod backend;
pub mod checksum;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod graph;
pub mod jsonmap;
pub mod migrator;
pub mod model;
pub mod remediation;
pub mod repository;
pub mod secrets;
pub mod store;
pub mod telemetry;
pub mod tracker;

pub use backend::StateBackend;
pub use config::StateConfig;
pub use error::{Result, StateError};
pub use events::{EventBus, EventType};
pub use graph::{DependencySource, GraphNode, ResourceGraph};
pub use migrator::{MigrationReport, Migrator};
pub use model::{
    ActivityEntry, DependencyType, DriftRecord, DriftResolution, Execution, Lock, Resource,
    Secret, Severity, Stack, StackSnapshot, StackStatus, StateEvent,
};
pub use remediation::{AutoRemediation, RemediationConfig, RemediationStrategy};
pub use repository::StackRepository;
pub use secrets::SecretsRepository;
pub use store::Store;
pub use tracker::{Operation, OperationCriteria, OperationStats, OperationStatus, OperationType, StateTracker};
