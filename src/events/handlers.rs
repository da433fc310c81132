//! Default handlers installed by the tracker (C6): persist every event
//! to the `events` table, and structured-log it.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;

use crate::error::Result;
use crate::model::{Severity, StateEvent};
use crate::store::Store;

use super::EventHandler;

/// Persists every event to the `events` table using the event's own ID
/// as primary key with insert-or-ignore semantics, tolerating duplicate
/// delivery.
pub struct PersistEventHandler {
    store: Arc<Store>,
}

impl PersistEventHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for PersistEventHandler {
    async fn handle(&self, event: &StateEvent) -> Result<()> {
        let conn = self.store.write()?;
        conn.execute(
            "INSERT OR IGNORE INTO events (id, event_type, timestamp, source, stack_id, \
             stack_name, data, severity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                event.event_type,
                event.timestamp.to_rfc3339(),
                event.source,
                event.stack_id,
                event.stack_name,
                event.data.to_string(),
                event.severity.as_str(),
            ],
        )?;
        Ok(())
    }
}

/// Structured-logs every event at INFO, escalating to WARN/ERROR for
/// matching severities.
pub struct LogEventHandler;

#[async_trait]
impl EventHandler for LogEventHandler {
    async fn handle(&self, event: &StateEvent) -> Result<()> {
        match event.severity {
            Severity::Info => tracing::info!(
                event_type = event.event_type, stack_id = event.stack_id, "state event"
            ),
            Severity::Warning => tracing::warn!(
                event_type = event.event_type, stack_id = event.stack_id, "state event"
            ),
            Severity::Error | Severity::Critical => tracing::error!(
                event_type = event.event_type, stack_id = event.stack_id, "state event"
            ),
        }
        Ok(())
    }
}
