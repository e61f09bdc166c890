//! Platform-facing side of the decision engine: collaborator traits for
//! metrics, budgets and auditing, a retry helper, and the evaluation cycle
//! that ties them to [`adpilot_engine::DecisionEngine`].

pub mod collaborators;
pub mod cycle;
pub mod retry;

pub use collaborators::{
    AuditEntry, AuditEntryKind, BudgetExecutor, DecisionAuditSink, EntitySnapshot, MetricsProvider,
};
pub use cycle::{apply_allocations, ApplyFailure, ApplyReport, CycleReport, EvaluationCycle, FatigueFlag};
pub use retry::{with_retry, RetryError};
