//! Event Bus (C5): typed pub/sub over a closed set of event types, an
//! in-memory ring buffer, and parallel fan-out to subscriber handlers
//! bounded by a per-publish deadline.
//!
//! Grounded in the teacher's `persist::runtime::support::worker`
//! pattern of a `tokio::spawn`ed task set coordinated with
//! `tokio::select!`/timeouts, generalized here from "one background
//! worker" to "one task per handler invocation, joined under a
//! deadline".

pub mod handlers;
mod ring_buffer;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, StateError};
use crate::model::{Severity, StateEvent};

use ring_buffer::RingBuffer;

/// The closed enumeration of event types the bus accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    OperationStarted,
    OperationCompleted,
    OperationFailed,
    SnapshotCreated,
    SnapshotRestored,
    DriftDetected,
    StateLocked,
    StateUnlocked,
    ResourceCreated,
    ResourceUpdated,
    ResourceDeleted,
    ValidationFailed,
    ValidationPassed,
    BackupCreated,
    BackupRestored,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OperationStarted => "operation.started",
            EventType::OperationCompleted => "operation.completed",
            EventType::OperationFailed => "operation.failed",
            EventType::SnapshotCreated => "snapshot.created",
            EventType::SnapshotRestored => "snapshot.restored",
            EventType::DriftDetected => "drift.detected",
            EventType::StateLocked => "state.locked",
            EventType::StateUnlocked => "state.unlocked",
            EventType::ResourceCreated => "resource.created",
            EventType::ResourceUpdated => "resource.updated",
            EventType::ResourceDeleted => "resource.deleted",
            EventType::ValidationFailed => "validation.failed",
            EventType::ValidationPassed => "validation.passed",
            EventType::BackupCreated => "backup.created",
            EventType::BackupRestored => "backup.restored",
        }
    }

    pub fn all() -> &'static [EventType] {
        use EventType::*;
        &[
            OperationStarted,
            OperationCompleted,
            OperationFailed,
            SnapshotCreated,
            SnapshotRestored,
            DriftDetected,
            StateLocked,
            StateUnlocked,
            ResourceCreated,
            ResourceUpdated,
            ResourceDeleted,
            ValidationFailed,
            ValidationPassed,
            BackupCreated,
            BackupRestored,
        ]
    }
}

/// A subscriber callback. Implementors may do I/O (e.g. persistence,
/// logging) — handlers run concurrently with each other and are given
/// up to the bus's publish timeout to finish.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &StateEvent) -> Result<()>;
}

/// A closure-backed handler, for ad-hoc subscriptions that don't
/// warrant a named type.
pub struct ClosureHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for ClosureHandler<F>
where
    F: Fn(&StateEvent) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: &StateEvent) -> Result<()> {
        (self.0)(event)
    }
}

pub struct EventBus {
    buffer: RingBuffer,
    handlers: Mutex<HashMap<&'static str, Vec<Arc<dyn EventHandler>>>>,
    publish_timeout: Duration,
}

impl EventBus {
    pub fn new(buffer_capacity: usize, publish_timeout: Duration) -> Self {
        Self {
            buffer: RingBuffer::new(buffer_capacity),
            handlers: Mutex::new(HashMap::new()),
            publish_timeout,
        }
    }

    /// Registers a handler for one event type.
    pub fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut handlers = self.handlers.lock()?;
        handlers.entry(event_type.as_str()).or_default().push(handler);
        Ok(())
    }

    /// Registers a handler for every known event type — the
    /// convenience enrollment the spec calls out.
    pub fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> Result<()> {
        for event_type in EventType::all() {
            self.subscribe(*event_type, handler.clone())?;
        }
        Ok(())
    }

    /// Builds, buffers, and dispatches an event. Appends to the ring
    /// buffer under a short exclusive section, then fans out to every
    /// handler for this event type in parallel, blocking until all
    /// have returned, errored, or the publish timeout elapses —
    /// whichever comes first. Handlers still running at the deadline
    /// are dropped; their eventual result is discarded.
    pub async fn publish(
        &self,
        event_type: EventType,
        source: &str,
        stack_id: &str,
        stack_name: &str,
        data: Value,
        severity: Severity,
    ) -> Result<StateEvent> {
        let event = StateEvent {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.as_str().to_string(),
            timestamp: Utc::now(),
            source: source.to_string(),
            stack_id: stack_id.to_string(),
            stack_name: stack_name.to_string(),
            data,
            severity,
        };

        self.buffer.push(event.clone())?;

        let handlers = {
            let handlers = self.handlers.lock()?;
            handlers.get(event_type.as_str()).cloned().unwrap_or_default()
        };

        if handlers.is_empty() {
            return Ok(event);
        }

        let mut join_set = tokio::task::JoinSet::new();
        for handler in handlers {
            let event_clone = event.clone();
            join_set.spawn(async move { handler.handle(&event_clone).await });
        }

        let mut failures = 0usize;
        let deadline = tokio::time::Instant::now() + self.publish_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                join_set.abort_all();
                break;
            }
            match tokio::time::timeout(remaining, join_set.join_next()).await {
                Ok(Some(Ok(Err(err)))) => {
                    tracing::warn!(error = %err, event_type = event_type.as_str(), "event handler failed");
                    failures += 1;
                }
                Ok(Some(Err(join_err))) => {
                    tracing::warn!(error = %join_err, "event handler task panicked");
                    failures += 1;
                }
                Ok(Some(Ok(Ok(())))) => {}
                Ok(None) => break,
                Err(_timed_out) => {
                    join_set.abort_all();
                    break;
                }
            }
        }

        if failures > 0 {
            return Err(StateError::HandlerErrors(failures));
        }
        Ok(event)
    }

    pub fn recent_events(&self, limit: usize) -> Result<Vec<StateEvent>> {
        self.buffer.recent(limit)
    }

    pub fn events_by_type(&self, event_type: EventType, limit: usize) -> Result<Vec<StateEvent>> {
        self.buffer.by_type(event_type.as_str(), limit)
    }

    pub fn events_by_stack(&self, stack_id: &str, limit: usize) -> Result<Vec<StateEvent>> {
        self.buffer.by_stack(stack_id, limit)
    }

    pub fn buffer_len(&self) -> Result<usize> {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &StateEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: &StateEvent) -> Result<()> {
            Err(StateError::Internal("boom".into()))
        }
    }

    #[tokio::test]
    async fn delivers_to_both_subscribers_s5() {
        let bus = EventBus::new(1000, Duration::from_secs(5));
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventType::SnapshotCreated, Arc::new(CountingHandler(count_a.clone())))
            .unwrap();
        bus.subscribe(EventType::SnapshotCreated, Arc::new(CountingHandler(count_b.clone())))
            .unwrap();

        let event = bus
            .publish(
                EventType::SnapshotCreated,
                "tracker",
                "delta",
                "delta",
                serde_json::json!({"version": 1, "description": "d"}),
                Severity::Info,
            )
            .await
            .unwrap();

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);

        let recent = bus.recent_events(10).unwrap();
        assert_eq!(recent[0].id, event.id);
        assert_eq!(recent[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn aggregates_handler_failures_without_cancelling_siblings() {
        let bus = EventBus::new(10, Duration::from_secs(5));
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventType::DriftDetected, Arc::new(FailingHandler)).unwrap();
        bus.subscribe(EventType::DriftDetected, Arc::new(CountingHandler(count.clone())))
            .unwrap();

        let err = bus
            .publish(
                EventType::DriftDetected,
                "tracker",
                "s1",
                "s1",
                Value::Null,
                Severity::Warning,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::HandlerErrors(1)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ring_buffer_capacity_is_bounded() {
        let bus = EventBus::new(5, Duration::from_secs(5));
        for i in 0..8 {
            bus.publish(
                EventType::OperationStarted,
                "t",
                "s",
                "s",
                serde_json::json!({"i": i}),
                Severity::Info,
            )
            .await
            .unwrap();
        }
        assert_eq!(bus.buffer_len().unwrap(), 5);
    }
}
