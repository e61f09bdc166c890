//! Groups decisions into human-readable action cards.

use adpilot_core::types::{Decision, DecisionKind, Priority};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ScaleWinners,
    PauseUnderperformers,
    WaitForData,
    ReallocateBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub entity_ids: Vec<String>,
}

pub struct RecommendationAggregator;

impl RecommendationAggregator {
    pub fn aggregate(decisions: &[Decision]) -> Vec<Recommendation> {
        let scale = entity_ids(decisions, DecisionKind::Scale);
        let pause = entity_ids(decisions, DecisionKind::Pause);
        let learning = entity_ids(decisions, DecisionKind::Learning);

        let mut cards = Vec::new();
        if !scale.is_empty() {
            cards.push(Recommendation {
                kind: RecommendationKind::ScaleWinners,
                priority: Priority::High,
                title: "Scale winners".to_string(),
                description: format!(
                    "{} {} performing above target; increase budget",
                    scale.len(),
                    plural(scale.len())
                ),
                entity_ids: scale.clone(),
            });
        }
        if !pause.is_empty() {
            cards.push(Recommendation {
                kind: RecommendationKind::PauseUnderperformers,
                priority: Priority::High,
                title: "Pause underperformers".to_string(),
                description: format!(
                    "{} {} below minimum performance; pause to stop wasted spend",
                    pause.len(),
                    plural(pause.len())
                ),
                entity_ids: pause.clone(),
            });
        }
        if !learning.is_empty() {
            cards.push(Recommendation {
                kind: RecommendationKind::WaitForData,
                priority: Priority::Low,
                title: "Wait for data".to_string(),
                description: format!(
                    "{} {} still in the learning phase",
                    learning.len(),
                    plural(learning.len())
                ),
                entity_ids: learning,
            });
        }
        if !scale.is_empty() && !pause.is_empty() {
            cards.push(Recommendation {
                kind: RecommendationKind::ReallocateBudget,
                priority: Priority::Medium,
                title: "Reallocate budget".to_string(),
                description: format!(
                    "Move budget from {} losing to {} winning {}",
                    pause.len(),
                    scale.len(),
                    plural(scale.len())
                ),
                entity_ids: pause.into_iter().chain(scale).collect(),
            });
        }
        cards
    }
}

/// Distinct entity ids with a decision of `kind`, in first-seen order.
fn entity_ids(decisions: &[Decision], kind: DecisionKind) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for decision in decisions.iter().filter(|d| d.kind == kind) {
        if !ids.contains(&decision.entity.id) {
            ids.push(decision.entity.id.clone());
        }
    }
    ids
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "entity"
    } else {
        "entities"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_core::types::{EntityRef, EntityType, MaturityPhase, PerformanceMetrics};
    use chrono::Utc;

    fn decision(id: &str, kind: DecisionKind) -> Decision {
        Decision {
            entity: EntityRef::new(EntityType::Ad, id, id),
            kind,
            priority: Priority::High,
            phase: MaturityPhase::Mature,
            age_hours: 200.0,
            reason: String::new(),
            recommended_action: String::new(),
            metrics: PerformanceMetrics::default(),
            auto_execute: false,
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_decisions_no_cards() {
        assert!(RecommendationAggregator::aggregate(&[]).is_empty());
    }

    #[test]
    fn test_scale_and_pause_add_reallocation() {
        let decisions = vec![
            decision("a", DecisionKind::Scale),
            decision("a", DecisionKind::Scale),
            decision("b", DecisionKind::Pause),
            decision("c", DecisionKind::Learning),
            decision("d", DecisionKind::Alert),
        ];
        let cards = RecommendationAggregator::aggregate(&decisions);
        let kinds: Vec<_> = cards.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::ScaleWinners,
                RecommendationKind::PauseUnderperformers,
                RecommendationKind::WaitForData,
                RecommendationKind::ReallocateBudget,
            ]
        );
        assert_eq!(cards[0].entity_ids, vec!["a".to_string()]);
        assert_eq!(cards[0].description, "1 entity performing above target; increase budget");
        assert_eq!(cards[3].entity_ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_scale_only_has_no_reallocation() {
        let decisions = vec![
            decision("a", DecisionKind::Scale),
            decision("b", DecisionKind::Scale),
        ];
        let cards = RecommendationAggregator::aggregate(&decisions);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].kind, RecommendationKind::ScaleWinners);
        assert!(cards[0].description.starts_with("2 entities"));
    }
}
