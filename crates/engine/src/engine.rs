//! Library entry point: a validated config plus the engine operations.

use adpilot_core::types::{Alert, Decision, EntityInput, EntityRef, PerformanceMetrics, SiblingInput};
use adpilot_core::{EngineConfig, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::allocator::{AllocationResult, AllocationStrategy, BudgetAllocator};
use crate::evaluator::{EntityEvaluation, EntityEvaluator};
use crate::fatigue::FatigueDetector;
use crate::health::{HealthBreakdown, HealthScorer};
use crate::recommendations::{Recommendation, RecommendationAggregator};

/// An entity that could not be evaluated, reported next to the results of
/// its siblings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityFailure {
    pub entity: EntityRef,
    pub error: String,
}

/// Output of a batch evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationBatch {
    pub decisions: Vec<Decision>,
    pub alerts: Vec<Alert>,
    pub failures: Vec<EntityFailure>,
}

/// Holds a config that was validated once; every operation is a pure
/// function of its arguments and that config.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate every entity. A malformed entity is recorded as a failure
    /// and does not stop its siblings.
    pub fn evaluate(&self, entities: &[EntityInput], now: DateTime<Utc>) -> EvaluationBatch {
        let mut batch = EvaluationBatch::default();
        for input in entities {
            match EntityEvaluator::evaluate(input, now, &self.config) {
                Ok(evaluation) => {
                    batch.decisions.extend(evaluation.decisions);
                    batch.alerts.extend(evaluation.alerts);
                }
                Err(e) => {
                    warn!(entity_id = %input.entity.id, error = %e, "Entity evaluation failed");
                    batch.failures.push(EntityFailure {
                        entity: input.entity.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        batch
    }

    pub fn evaluate_entity(
        &self,
        input: &EntityInput,
        now: DateTime<Utc>,
    ) -> EngineResult<EntityEvaluation> {
        EntityEvaluator::evaluate(input, now, &self.config)
    }

    pub fn score(&self, account: &PerformanceMetrics) -> u8 {
        HealthScorer::score(account, &self.config)
    }

    pub fn health_breakdown(&self, account: &PerformanceMetrics) -> HealthBreakdown {
        HealthScorer::breakdown(account, &self.config)
    }

    pub fn allocate(
        &self,
        siblings: &[SiblingInput],
        total_budget: f64,
        strategy: AllocationStrategy,
    ) -> EngineResult<Vec<AllocationResult>> {
        BudgetAllocator::allocate(siblings, total_budget, strategy, &self.config)
    }

    pub fn detect_fatigue(&self, metrics: &PerformanceMetrics) -> Option<String> {
        FatigueDetector::check(metrics, &self.config)
    }

    pub fn recommend(&self, decisions: &[Decision]) -> Vec<Recommendation> {
        RecommendationAggregator::aggregate(decisions)
    }
}
