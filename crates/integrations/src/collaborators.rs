//! Seams to the systems around the engine: the advertising platform's
//! reporting and budget APIs, and the decision audit log.
//!
//! Implementations own transport concerns. Retries and timeouts are applied
//! by the callers in this crate through [`crate::retry::with_retry`].

use std::future::Future;

use adpilot_core::types::{Alert, Decision, EntityRef, PerformanceMetrics};
use adpilot_core::EngineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest metrics for one entity together with its delivery start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntitySnapshot {
    pub metrics: PerformanceMetrics,
    pub created_at: Option<DateTime<Utc>>,
    pub current_budget: Option<f64>,
}

/// Supplies metrics snapshots from the advertising platform.
pub trait MetricsProvider: Send + Sync {
    fn fetch(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = anyhow::Result<EntitySnapshot>> + Send;
}

/// Applies absolute budgets on the advertising platform.
///
/// Setting the same amount twice must be a no-op, which makes retries safe.
pub trait BudgetExecutor: Send + Sync {
    fn set_budget(
        &self,
        entity_id: &str,
        amount: f64,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Persists decisions and alerts for the human approval workflow.
pub trait DecisionAuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntryKind {
    Decision,
    Alert,
}

/// One decision or alert with the full context that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub kind: AuditEntryKind,
    pub entity: EntityRef,
    pub summary: String,
    /// The serialized decision or alert, metrics snapshot included.
    pub context: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_decision(decision: &Decision) -> EngineResult<Self> {
        Ok(Self {
            kind: AuditEntryKind::Decision,
            entity: decision.entity.clone(),
            summary: format!(
                "{} ({:?}): {}",
                decision.kind, decision.priority, decision.reason
            ),
            context: serde_json::to_value(decision)?,
            recorded_at: decision.evaluated_at,
        })
    }

    pub fn from_alert(alert: &Alert) -> EngineResult<Self> {
        Ok(Self {
            kind: AuditEntryKind::Alert,
            entity: alert.entity.clone(),
            summary: format!("{:?}: {}", alert.severity, alert.message),
            context: serde_json::to_value(alert)?,
            recorded_at: alert.raised_at,
        })
    }
}
