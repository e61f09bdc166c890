//! One evaluation cycle against the platform: fetch snapshots, evaluate,
//! flag fatigued ads, and hand everything to the audit sink. Also applies
//! budget allocations through the budget executor.

use std::collections::HashSet;

use adpilot_core::types::{EntityInput, EntityRef, EntityType};
use adpilot_core::RetryPolicy;
use adpilot_engine::{
    AllocationAction, AllocationResult, DecisionEngine, EntityFailure, EvaluationBatch,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::{AuditEntry, BudgetExecutor, DecisionAuditSink, MetricsProvider};
use crate::retry::with_retry;

/// An ad whose creative should be rotated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FatigueFlag {
    pub entity: EntityRef,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CycleReport {
    /// Decisions, alerts, and per-entity failures from both fetching and
    /// evaluation.
    pub batch: EvaluationBatch,
    pub fatigued: Vec<FatigueFlag>,
    /// Audit entries that could not be recorded, by summary.
    pub audit_failures: Vec<String>,
}

pub struct EvaluationCycle<'a, P, S> {
    engine: &'a DecisionEngine,
    provider: &'a P,
    sink: &'a S,
    retry: &'a RetryPolicy,
}

impl<'a, P, S> EvaluationCycle<'a, P, S>
where
    P: MetricsProvider,
    S: DecisionAuditSink,
{
    pub fn new(
        engine: &'a DecisionEngine,
        provider: &'a P,
        sink: &'a S,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            engine,
            provider,
            sink,
            retry,
        }
    }

    pub async fn run(&self, entities: &[EntityRef], now: DateTime<Utc>) -> CycleReport {
        let mut inputs = Vec::with_capacity(entities.len());
        let mut fetch_failures = Vec::new();

        for entity in entities {
            match with_retry(self.retry, "fetch_metrics", || self.provider.fetch(entity)).await {
                Ok(snapshot) => inputs.push(EntityInput {
                    entity: entity.clone(),
                    metrics: snapshot.metrics,
                    created_at: snapshot.created_at,
                    current_budget: snapshot.current_budget,
                }),
                Err(e) => {
                    warn!(entity_id = %entity.id, error = %e, "Metrics fetch failed");
                    fetch_failures.push(EntityFailure {
                        entity: entity.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut batch = self.engine.evaluate(&inputs, now);
        let failed: HashSet<&str> = batch.failures.iter().map(|f| f.entity.id.as_str()).collect();
        let fatigued: Vec<FatigueFlag> = inputs
            .iter()
            .filter(|i| i.entity.entity_type == EntityType::Ad)
            .filter(|i| !failed.contains(i.entity.id.as_str()))
            .filter_map(|i| {
                self.engine.detect_fatigue(&i.metrics).map(|reason| FatigueFlag {
                    entity: i.entity.clone(),
                    reason,
                })
            })
            .collect();
        batch.failures.extend(fetch_failures);

        let audit_failures = self.record(&batch).await;

        info!(
            entities = entities.len(),
            decisions = batch.decisions.len(),
            alerts = batch.alerts.len(),
            failures = batch.failures.len(),
            fatigued = fatigued.len(),
            audit_failures = audit_failures.len(),
            "Evaluation cycle complete"
        );

        CycleReport {
            batch,
            fatigued,
            audit_failures,
        }
    }

    async fn record(&self, batch: &EvaluationBatch) -> Vec<String> {
        let entries = batch
            .decisions
            .iter()
            .map(AuditEntry::from_decision)
            .chain(batch.alerts.iter().map(AuditEntry::from_alert));

        let mut failures = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    failures.push(e.to_string());
                    continue;
                }
            };
            if let Err(e) = with_retry(self.retry, "record_audit", || self.sink.record(&entry)).await {
                warn!(entity_id = %entry.entity.id, error = %e, "Audit record failed");
                failures.push(entry.summary);
            }
        }
        failures
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyFailure {
    pub entity_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<ApplyFailure>,
}

/// Push `Updated` allocations to the platform. `NoChange` results are
/// skipped; a failure on one sibling does not stop the others.
pub async fn apply_allocations<E: BudgetExecutor>(
    executor: &E,
    results: &[AllocationResult],
    retry: &RetryPolicy,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for result in results {
        if result.action == AllocationAction::NoChange {
            report.skipped.push(result.entity_id.clone());
            continue;
        }
        match with_retry(retry, "set_budget", || {
            executor.set_budget(&result.entity_id, result.new_budget)
        })
        .await
        {
            Ok(()) => {
                info!(
                    entity_id = %result.entity_id,
                    old_budget = result.old_budget,
                    new_budget = result.new_budget,
                    "Budget updated"
                );
                report.applied.push(result.entity_id.clone());
            }
            Err(e) => {
                warn!(entity_id = %result.entity_id, error = %e, "Budget update failed");
                report.failed.push(ApplyFailure {
                    entity_id: result.entity_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
