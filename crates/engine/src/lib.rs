//! Campaign decision engine: entity evaluation with maturity gating, account
//! health scoring, proportional budget reallocation, creative fatigue
//! detection and recommendation grouping.

pub mod allocator;
pub mod engine;
pub mod evaluator;
pub mod fatigue;
pub mod health;
pub mod maturity;
pub mod recommendations;

pub use allocator::{AllocationAction, AllocationResult, AllocationStrategy, BudgetAllocator};
pub use engine::{DecisionEngine, EntityFailure, EvaluationBatch};
pub use evaluator::{EntityEvaluation, EntityEvaluator};
pub use fatigue::FatigueDetector;
pub use health::{HealthBreakdown, HealthScorer};
pub use maturity::{Maturity, MaturityClassifier};
pub use recommendations::{Recommendation, RecommendationAggregator, RecommendationKind};
