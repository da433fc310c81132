use serde_json::json;

use crate::error::Result;
use crate::events::EventType;
use crate::model::Severity;

use super::StateTracker;

impl StateTracker {
    /// Checks a stack for structural problems: resources whose declared
    /// dependencies don't resolve to another resource in the same
    /// stack, and an empty name or version on the stack itself. Emits
    /// `validation.passed` or `validation.failed` on the event bus
    /// carrying the issue list.
    pub async fn validate_state(&self, stack_id: &str) -> Result<(bool, Vec<String>)> {
        let repo = self.backend.repository();
        let stack = repo
            .get_stack(stack_id)?
            .ok_or_else(|| crate::error::StateError::NotFound(format!("stack '{stack_id}'")))?;
        let resources = repo.list_resources(stack_id)?;
        let known_ids: std::collections::HashSet<&str> =
            resources.iter().map(|r| r.id.as_str()).collect();

        let mut issues = Vec::new();
        for resource in &resources {
            for dep in &resource.dependencies {
                if !known_ids.contains(dep.as_str()) {
                    issues.push(format!("resource {} has orphaned dependency: {dep}", resource.id));
                }
            }
        }
        if stack.name.is_empty() {
            issues.push("stack has no name".to_string());
        }
        if stack.version.is_empty() {
            issues.push("stack has no version".to_string());
        }

        let valid = issues.is_empty();
        let (event_type, severity) = if valid {
            (EventType::ValidationPassed, Severity::Info)
        } else {
            (EventType::ValidationFailed, Severity::Error)
        };
        self.events
            .publish(
                event_type,
                "tracker",
                stack_id,
                &stack.name,
                json!({ "issues": issues }),
                severity,
            )
            .await?;

        Ok((valid, issues))
    }
}
