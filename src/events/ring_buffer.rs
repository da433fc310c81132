use std::collections::VecDeque;
use std::sync::RwLock;

use crate::error::Result;
use crate::model::StateEvent;

/// Fixed-capacity, FIFO-evicting buffer of the most recent events,
/// guarded by its own reader-writer mutex — independent of the
/// subscription map's mutex, per the concurrency design.
pub struct RingBuffer {
    capacity: usize,
    events: RwLock<VecDeque<StateEvent>>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends an event, evicting the oldest if at capacity.
    pub fn push(&self, event: StateEvent) -> Result<()> {
        let mut events = self.events.write()?;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    /// Returns the `limit` most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StateEvent>> {
        let events = self.events.read()?;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    pub fn by_type(&self, event_type: &str, limit: usize) -> Result<Vec<StateEvent>> {
        let events = self.events.read()?;
        Ok(events
            .iter()
            .rev()
            .filter(|e| e.event_type == event_type)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn by_stack(&self, stack_id: &str, limit: usize) -> Result<Vec<StateEvent>> {
        let events = self.events.read()?;
        Ok(events
            .iter()
            .rev()
            .filter(|e| e.stack_id == stack_id)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.events.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use chrono::Utc;

    fn event(id: &str) -> StateEvent {
        StateEvent {
            id: id.to_string(),
            event_type: "operation.started".into(),
            timestamp: Utc::now(),
            source: "test".into(),
            stack_id: "s1".into(),
            stack_name: "alpha".into(),
            data: serde_json::Value::Null,
            severity: Severity::Info,
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let buf = RingBuffer::new(3);
        for i in 0..5 {
            buf.push(event(&i.to_string())).unwrap();
        }
        assert_eq!(buf.len().unwrap(), 3);
        let recent = buf.recent(10).unwrap();
        let ids: Vec<&str> = recent.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3", "2"]);
    }
}
