//! Auto-Remediation (C9): policy-driven response to detected drift.
//!
//! Grounded in the teacher's connection-pool config/strategy shape
//! (`rustmemodb::connection::pool`) for `RemediationConfig`; the
//! webhook client is new, using `reqwest` the way the teacher's own
//! HTTP-facing code does.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::backend::StateBackend;
use crate::error::{Result, StateError};
use crate::model::{DriftRecord, DriftResolution, StackStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationStrategy {
    None,
    Notify,
    AutoFix,
    Rollback,
}

impl RemediationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationStrategy::None => "none",
            RemediationStrategy::Notify => "notify",
            RemediationStrategy::AutoFix => "auto_fix",
            RemediationStrategy::Rollback => "rollback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "none" => RemediationStrategy::None,
            "notify" => RemediationStrategy::Notify,
            "auto_fix" => RemediationStrategy::AutoFix,
            "rollback" => RemediationStrategy::Rollback,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RemediationConfig {
    pub strategy: RemediationStrategy,
    pub max_retries: u32,
    pub webhooks: Vec<String>,
}

impl RemediationConfig {
    pub fn new(strategy: RemediationStrategy) -> Self {
        Self { strategy, max_retries: 0, webhooks: Vec::new() }
    }
}

pub struct AutoRemediation {
    backend: Arc<StateBackend>,
    http: reqwest::Client,
}

impl AutoRemediation {
    pub fn new(backend: Arc<StateBackend>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("static reqwest client config is valid");
        Self { backend, http }
    }

    /// Fetches drift info for the stack; if nothing is both drifted and
    /// unresolved, returns immediately. Otherwise applies the
    /// configured strategy.
    pub async fn check_and_remediate(&self, stack_id: &str, config: &RemediationConfig) -> Result<()> {
        let drifts = self.backend.get_drift_info(stack_id)?;
        let pending: Vec<DriftRecord> = drifts
            .into_iter()
            .filter(|d| d.is_drifted && d.resolution == DriftResolution::Pending)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        match config.strategy {
            RemediationStrategy::None => Ok(()),
            RemediationStrategy::Notify => self.notify(stack_id, &pending, config).await,
            RemediationStrategy::AutoFix => {
                for drift in &pending {
                    let repo = self.backend.repository();
                    let mut resource = repo
                        .get_resource(&drift.resource_id)?
                        .ok_or_else(|| StateError::NotFound(format!("resource '{}'", drift.resource_id)))?;
                    resource.properties = drift.expected_state.clone();
                    resource.state = "pending_remediation".to_string();
                    repo.update_resource(&resource)?;
                    self.backend.set_drift_resolution(drift.id, DriftResolution::Resolved)?;
                }
                self.notify(stack_id, &pending, config).await
            }
            RemediationStrategy::Rollback => {
                let snapshots = self.backend.list_snapshots(stack_id)?;
                let target = snapshots
                    .into_iter()
                    .find(|snap| snap.data.stack.status == StackStatus::Completed);
                match target {
                    Some(snap) => {
                        self.backend
                            .rollback_to_snapshot(stack_id, snap.version, "auto-remediation")?;
                        Ok(())
                    }
                    None => Err(StateError::NoGoodSnapshot),
                }
            }
        }
    }

    /// Posts a `drift_detected` payload to every configured webhook,
    /// retrying up to `config.max_retries` times before giving up and
    /// logging a `webhook_failed` activity entry for that webhook.
    async fn notify(&self, stack_id: &str, drifts: &[DriftRecord], config: &RemediationConfig) -> Result<()> {
        let payload = json!({
            "event": "drift_detected",
            "stack_id": stack_id,
            "drifts": drifts.iter().map(|d| d.id).collect::<Vec<_>>(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        for webhook in &config.webhooks {
            let mut last_error = String::new();
            let mut delivered = false;
            for _ in 0..=config.max_retries {
                match self.http.post(webhook).json(&payload).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        delivered = true;
                        break;
                    }
                    Ok(resp) => last_error = format!("status {}", resp.status()),
                    Err(e) => last_error = e.to_string(),
                }
            }
            if !delivered {
                self.backend.log_activity_value(
                    stack_id,
                    "webhook_failed",
                    None,
                    json!({ "webhook": webhook, "error": last_error }),
                    "auto-remediation",
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Resource, Stack};
    use crate::repository::StackRepository;
    use crate::store::Store;
    use serde_json::Value;

    fn remediation() -> (AutoRemediation, Arc<StateBackend>) {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        let mut stack = Stack::new("s1", "alpha");
        stack.status = StackStatus::Completed;
        repo.create_stack(&stack).unwrap();
        repo.create_resource(&Resource::new("r1", "s1", "t", "n")).unwrap();
        let backend = Arc::new(StateBackend::new(repo));
        (AutoRemediation::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn no_drift_is_a_no_op() {
        let (remediation, _backend) = remediation();
        let config = RemediationConfig::new(RemediationStrategy::Notify);
        remediation.check_and_remediate("s1", &config).await.unwrap();
    }

    #[tokio::test]
    async fn auto_fix_resets_properties_and_resolves_drift() {
        let (remediation, backend) = remediation();
        let mut expected = crate::jsonmap::JsonMap::new();
        expected.insert("count".into(), Value::from(3));
        let mut actual = crate::jsonmap::JsonMap::new();
        actual.insert("count".into(), Value::from(9));
        backend.detect_drift("s1", "r1", &expected, &actual).unwrap();

        let config = RemediationConfig::new(RemediationStrategy::AutoFix);
        remediation.check_and_remediate("s1", &config).await.unwrap();

        let resource = backend.repository().get_resource("r1").unwrap().unwrap();
        assert_eq!(resource.state, "pending_remediation");
        assert_eq!(resource.properties.get("count").unwrap(), &Value::from(3));

        let drifts = backend.get_drift_info("s1").unwrap();
        assert_eq!(drifts[0].resolution, DriftResolution::Resolved);
    }

    #[tokio::test]
    async fn rollback_picks_latest_completed_snapshot() {
        let (remediation, backend) = remediation();
        backend.create_snapshot("s1", "u", "first").unwrap();
        let mut expected = crate::jsonmap::JsonMap::new();
        expected.insert("k".into(), Value::from("a"));
        let mut actual = crate::jsonmap::JsonMap::new();
        actual.insert("k".into(), Value::from("b"));
        backend.detect_drift("s1", "r1", &expected, &actual).unwrap();

        let config = RemediationConfig::new(RemediationStrategy::Rollback);
        remediation.check_and_remediate("s1", &config).await.unwrap();

        let stack = backend.repository().get_stack("s1").unwrap().unwrap();
        assert_eq!(stack.status, StackStatus::RolledBack);
    }

    #[tokio::test]
    async fn rollback_without_completed_snapshot_is_no_good_snapshot() {
        let (remediation, backend) = remediation();
        let mut stack = backend.repository().get_stack("s1").unwrap().unwrap();
        stack.status = StackStatus::Failed;
        backend.repository().update_stack(&stack).unwrap();
        backend.create_snapshot("s1", "u", "first").unwrap();

        let mut expected = crate::jsonmap::JsonMap::new();
        expected.insert("k".into(), Value::from("a"));
        let mut actual = crate::jsonmap::JsonMap::new();
        actual.insert("k".into(), Value::from("b"));
        backend.detect_drift("s1", "r1", &expected, &actual).unwrap();

        let config = RemediationConfig::new(RemediationStrategy::Rollback);
        let err = remediation.check_and_remediate("s1", &config).await.unwrap_err();
        assert!(matches!(err, StateError::NoGoodSnapshot));
    }
}
