use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Level of the advertising hierarchy an entity lives at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Campaign,
    AdGroup,
    Ad,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Campaign => "campaign",
            Self::AdGroup => "ad_group",
            Self::Ad => "ad",
        };
        f.write_str(label)
    }
}

/// Identity of a campaign, ad group or ad on the advertising platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Conversion counts per funnel stage, as reported by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunnelCounts {
    #[serde(default)]
    pub landing_page_views: u64,
    #[serde(default)]
    pub add_to_cart: u64,
    #[serde(default)]
    pub initiate_checkout: u64,
    #[serde(default)]
    pub leads: u64,
    #[serde(default)]
    pub purchases: u64,
}

/// Metrics for one entity over one reporting window.
///
/// Rates are pre-computed by the metrics provider. `ctr` is a percentage
/// (1.5 means 1.5 %), `cost_per_conversion` is spend over `conversions` and
/// is 0.0 when there were no conversions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub impressions: u64,
    #[serde(default)]
    pub reach: u64,
    pub clicks: u64,
    pub spend: f64,
    pub ctr: f64,
    #[serde(default)]
    pub cpc: f64,
    #[serde(default)]
    pub cpm: f64,
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub conversions: u64,
    #[serde(default)]
    pub funnel: FunnelCounts,
    #[serde(default)]
    pub cost_per_conversion: f64,
    #[serde(default)]
    pub roas: f64,
}

impl PerformanceMetrics {
    /// Reject snapshots no rule can reason about: non-finite or negative
    /// values and CTRs above 100 %.
    pub fn validate(&self, entity_id: &str) -> EngineResult<()> {
        let rates = [
            ("spend", self.spend),
            ("ctr", self.ctr),
            ("cpc", self.cpc),
            ("cpm", self.cpm),
            ("frequency", self.frequency),
            ("cost_per_conversion", self.cost_per_conversion),
            ("roas", self.roas),
        ];
        for (field, value) in rates {
            if !value.is_finite() {
                return Err(EngineError::invalid_metrics(
                    entity_id,
                    format!("{} is not a finite number", field),
                ));
            }
            if value < 0.0 {
                return Err(EngineError::invalid_metrics(
                    entity_id,
                    format!("{} is negative ({})", field, value),
                ));
            }
        }
        if self.ctr > 100.0 {
            return Err(EngineError::invalid_metrics(
                entity_id,
                format!("ctr {:.2}% exceeds 100%", self.ctr),
            ));
        }
        if self.clicks > self.impressions {
            return Err(EngineError::invalid_metrics(
                entity_id,
                format!(
                    "clicks ({}) exceed impressions ({})",
                    self.clicks, self.impressions
                ),
            ));
        }
        Ok(())
    }
}

/// Coarse age bucket used to protect young entities from destructive actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaturityPhase {
    New,
    Learning,
    Mature,
}

impl fmt::Display for MaturityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Mature => "mature",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Scale,
    Pause,
    Maintain,
    Learning,
    Alert,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scale => "scale",
            Self::Pause => "pause",
            Self::Maintain => "maintain",
            Self::Learning => "learning",
            Self::Alert => "alert",
        };
        f.write_str(label)
    }
}

/// Urgency of a decision. Declared most urgent first, so sorting ascending
/// puts critical items at the top.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// One recommended action for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub entity: EntityRef,
    pub kind: DecisionKind,
    pub priority: Priority,
    pub phase: MaturityPhase,
    pub age_hours: f64,
    /// Human readable trigger, embedding the values that fired the rule.
    pub reason: String,
    pub recommended_action: String,
    /// Snapshot the decision was derived from.
    pub metrics: PerformanceMetrics,
    pub auto_execute: bool,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighCpa,
    HighFrequency,
    NoConversions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    High,
    Warning,
}

/// A non-actionable warning. May accompany a decision for the same entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub entity: EntityRef,
    pub message: String,
    pub metrics: PerformanceMetrics,
    pub raised_at: DateTime<Utc>,
}

/// Input to entity evaluation: the entity, its latest snapshot and when it
/// started delivering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityInput {
    pub entity: EntityRef,
    pub metrics: PerformanceMetrics,
    /// Missing creation times are treated as very old entities.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_budget: Option<f64>,
}

/// Input to budget allocation: one sibling under a shared parent budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiblingInput {
    pub entity: EntityRef,
    pub metrics: PerformanceMetrics,
    pub current_budget: f64,
}
