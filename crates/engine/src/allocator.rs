//! Proportional budget reallocation across sibling entities.
//!
//! The allocator always works on the complete sibling set: shares are
//! relative to the whole set, so callers must not shard it. The returned
//! budgets sum to the requested total to the cent and every sibling keeps
//! at least `min_allocation_pct` of the total (minus one cent of rounding).

use std::cmp::Ordering;
use std::collections::HashSet;

use adpilot_core::types::{PerformanceMetrics, SiblingInput};
use adpilot_core::{EngineConfig, EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Sub-score assigned when the underlying metric is zero or unavailable.
const NEUTRAL_LOW_SCORE: f64 = 0.1;
/// ROAS at which the ROAS sub-score saturates.
const ROAS_SATURATION: f64 = 3.0;
/// CTR (percent) at which the CTR sub-score saturates.
const CTR_SATURATION: f64 = 2.0;
/// Absorbs float error when an exact share lands on a whole cent.
const CENT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    Equal,
    #[default]
    Performance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationAction {
    /// Change below `min_budget_change`; not worth pushing to the platform.
    NoChange,
    Updated,
}

/// New budget for one sibling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationResult {
    pub entity_id: String,
    pub entity_name: String,
    pub old_budget: f64,
    /// Absolute target, not a delta.
    pub new_budget: f64,
    /// Zero under the Equal strategy.
    pub composite_score: f64,
    /// Share of the total after flooring and normalization.
    pub allocation_pct: f64,
    pub action: AllocationAction,
}

/// Normalized per-signal scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub roas_score: f64,
    pub ctr_score: f64,
    pub cpa_score: f64,
    pub composite: f64,
}

pub struct BudgetAllocator;

impl BudgetAllocator {
    pub fn allocate(
        siblings: &[SiblingInput],
        total_budget: f64,
        strategy: AllocationStrategy,
        config: &EngineConfig,
    ) -> EngineResult<Vec<AllocationResult>> {
        Self::check_inputs(siblings, total_budget)?;

        // Equal splits never look at metrics, so a malformed sibling only
        // fails the Performance strategy.
        let (scores, shares) = match strategy {
            AllocationStrategy::Equal => (
                vec![0.0; siblings.len()],
                vec![1.0 / siblings.len() as f64; siblings.len()],
            ),
            AllocationStrategy::Performance => {
                let mut scores = Vec::with_capacity(siblings.len());
                for sibling in siblings {
                    sibling.metrics.validate(&sibling.entity.id)?;
                    scores.push(Self::score(&sibling.metrics, config).composite);
                }
                let floor = Self::effective_floor(siblings.len(), config.min_allocation_pct);
                let shares = floored_shares(&scores, floor);
                (scores, shares)
            }
        };
        let budgets = apportion_cents(total_budget, &shares);

        let results: Vec<AllocationResult> = siblings
            .iter()
            .zip(scores.iter().zip(shares.iter().zip(budgets)))
            .map(|(sibling, (&score, (&share, new_budget)))| {
                let action = if (new_budget - sibling.current_budget).abs() < config.min_budget_change {
                    AllocationAction::NoChange
                } else {
                    AllocationAction::Updated
                };
                AllocationResult {
                    entity_id: sibling.entity.id.clone(),
                    entity_name: sibling.entity.name.clone(),
                    old_budget: sibling.current_budget,
                    new_budget,
                    composite_score: score,
                    allocation_pct: share,
                    action,
                }
            })
            .collect();

        info!(
            siblings = results.len(),
            total_budget,
            ?strategy,
            updated = results
                .iter()
                .filter(|r| r.action == AllocationAction::Updated)
                .count(),
            "Budget allocation computed"
        );

        Ok(results)
    }

    /// Blend ROAS, CTR and CPA into a composite in [floor, 1].
    pub fn score(metrics: &PerformanceMetrics, config: &EngineConfig) -> ScoreBreakdown {
        let roas_score = if metrics.roas > 0.0 {
            (metrics.roas / ROAS_SATURATION).min(1.0)
        } else {
            NEUTRAL_LOW_SCORE
        };
        let ctr_score = if metrics.ctr > 0.0 {
            (metrics.ctr / CTR_SATURATION).min(1.0)
        } else {
            NEUTRAL_LOW_SCORE
        };
        let cpa_score = if metrics.cost_per_conversion > 0.0 {
            (config.target_cpa / metrics.cost_per_conversion).min(1.0)
        } else {
            NEUTRAL_LOW_SCORE
        };

        let weight_sum =
            config.allocation_roas_weight + config.allocation_ctr_weight + config.allocation_cpa_weight;
        let weighted = config.allocation_roas_weight * roas_score
            + config.allocation_ctr_weight * ctr_score
            + config.allocation_cpa_weight * cpa_score;
        let composite = if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            0.0
        };

        ScoreBreakdown {
            roas_score,
            ctr_score,
            cpa_score,
            composite: composite.max(config.allocation_score_floor),
        }
    }

    fn check_inputs(siblings: &[SiblingInput], total_budget: f64) -> EngineResult<()> {
        if !total_budget.is_finite() || total_budget <= 0.0 {
            return Err(EngineError::Parameter(format!(
                "total_budget must be a positive amount (got {})",
                total_budget
            )));
        }
        if siblings.is_empty() {
            return Err(EngineError::Parameter(
                "sibling list must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(siblings.len());
        for sibling in siblings {
            if !seen.insert(sibling.entity.id.as_str()) {
                return Err(EngineError::Parameter(format!(
                    "duplicate sibling id {}",
                    sibling.entity.id
                )));
            }
            if !sibling.current_budget.is_finite() || sibling.current_budget < 0.0 {
                return Err(EngineError::Parameter(format!(
                    "current budget of {} must be a non-negative amount (got {})",
                    sibling.entity.id, sibling.current_budget
                )));
            }
        }
        Ok(())
    }

    fn effective_floor(siblings: usize, min_allocation_pct: f64) -> f64 {
        let max_floor = 1.0 / siblings as f64;
        if min_allocation_pct > max_floor {
            warn!(
                siblings,
                min_allocation_pct,
                effective_floor = max_floor,
                "Minimum allocation cannot be met for every sibling, using an equal floor"
            );
            max_floor
        } else {
            min_allocation_pct
        }
    }
}

/// Shares proportional to `scores`, with no share below `floor` and the
/// total equal to 1.
///
/// Siblings whose proportional share falls under the floor are pinned to it
/// and the remaining mass is redistributed over the others, until no further
/// sibling drops below the floor. Requires `floor * scores.len() <= 1`.
fn floored_shares(scores: &[f64], floor: f64) -> Vec<f64> {
    let mut pinned = vec![false; scores.len()];
    let mut shares = vec![0.0; scores.len()];

    loop {
        let pinned_count = pinned.iter().filter(|p| **p).count();
        let free_mass = (1.0 - floor * pinned_count as f64).max(0.0);
        let free_score: f64 = scores
            .iter()
            .zip(&pinned)
            .filter(|(_, p)| !**p)
            .map(|(s, _)| *s)
            .sum();
        let free_score = if free_score > 0.0 { free_score } else { 1.0 };

        let mut changed = false;
        for (i, score) in scores.iter().enumerate() {
            if pinned[i] {
                shares[i] = floor;
                continue;
            }
            let share = free_mass * score / free_score;
            if share < floor {
                pinned[i] = true;
                changed = true;
            }
            shares[i] = share;
        }
        if !changed {
            return shares;
        }
    }
}

/// Convert shares of `total` into amounts rounded to the cent that sum
/// exactly to `total` rounded to the cent.
///
/// Each amount starts from its share rounded down; leftover cents go to the
/// largest fractional remainders, ties by position.
fn apportion_cents(total: f64, shares: &[f64]) -> Vec<f64> {
    let total_cents = (total * 100.0).round() as i64;
    let exact: Vec<f64> = shares.iter().map(|s| total_cents as f64 * s).collect();
    let mut cents: Vec<i64> = exact
        .iter()
        .map(|e| (e + CENT_EPSILON).floor() as i64)
        .collect();

    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = exact[a] - cents[a] as f64;
        let frac_b = exact[b] - cents[b] as f64;
        frac_b
            .partial_cmp(&frac_a)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut remainder = total_cents - cents.iter().sum::<i64>();
    let mut next = 0;
    while remainder > 0 {
        cents[order[next % order.len()]] += 1;
        remainder -= 1;
        next += 1;
    }
    while remainder < 0 {
        if let Some(largest) = (0..cents.len()).max_by_key(|&i| cents[i]) {
            cents[largest] -= 1;
        }
        remainder += 1;
    }

    cents.into_iter().map(|c| c as f64 / 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_core::types::{EntityRef, EntityType};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sibling(id: &str, roas: f64, ctr: f64, cpa: f64, budget: f64) -> SiblingInput {
        SiblingInput {
            entity: EntityRef::new(EntityType::AdGroup, id, format!("Ad group {}", id)),
            metrics: PerformanceMetrics {
                impressions: 10_000,
                clicks: (ctr * 100.0) as u64,
                spend: 100.0,
                ctr,
                conversions: if cpa > 0.0 { 5 } else { 0 },
                cost_per_conversion: cpa,
                roas,
                ..Default::default()
            },
            current_budget: budget,
        }
    }

    fn sum(results: &[AllocationResult]) -> f64 {
        results.iter().map(|r| r.new_budget).sum()
    }

    #[test]
    fn test_three_siblings_respect_total_and_floor() {
        let config = EngineConfig::default();
        let siblings = vec![
            sibling("a", 3.5, 2.0, 15.0, 33.0),
            sibling("b", 1.0, 1.0, 40.0, 33.0),
            sibling("c", 0.0, 0.5, 0.0, 34.0),
        ];
        let results =
            BudgetAllocator::allocate(&siblings, 100.0, AllocationStrategy::Performance, &config)
                .unwrap();

        assert_eq!(results.len(), 3);
        assert!((sum(&results) - 100.0).abs() <= 0.01);
        assert!(results.iter().all(|r| r.new_budget >= 10.0 - 0.01));
        assert!(results[0].new_budget > results[1].new_budget);
        assert!(results[1].new_budget > results[2].new_budget);
        assert!((results[0].new_budget - 61.19).abs() < 1e-9);
        assert!((results[1].new_budget - 28.81).abs() < 1e-9);
        assert!((results[2].new_budget - 10.00).abs() < 1e-9);
        assert!((results[0].composite_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_sibling_gets_everything() {
        let config = EngineConfig::default();
        let siblings = vec![sibling("solo", 0.5, 0.4, 80.0, 20.0)];
        for strategy in [AllocationStrategy::Equal, AllocationStrategy::Performance] {
            let results = BudgetAllocator::allocate(&siblings, 75.5, strategy, &config).unwrap();
            assert_eq!(results.len(), 1);
            assert!((results[0].new_budget - 75.5).abs() < 1e-9);
            assert!((results[0].allocation_pct - 1.0).abs() < 1e-9);
            assert_eq!(results[0].action, AllocationAction::Updated);
        }
    }

    #[test]
    fn test_equal_strategy_splits_evenly() {
        let config = EngineConfig::default();
        let siblings = vec![
            sibling("a", 3.5, 2.0, 15.0, 10.0),
            sibling("b", 1.0, 1.0, 40.0, 10.0),
            sibling("c", 0.0, 0.5, 0.0, 10.0),
        ];
        let results =
            BudgetAllocator::allocate(&siblings, 100.0, AllocationStrategy::Equal, &config).unwrap();
        assert!((sum(&results) - 100.0).abs() < 1e-9);
        for r in &results {
            assert!((r.new_budget - 100.0 / 3.0).abs() <= 0.01);
        }

        let mut reversed = siblings.clone();
        reversed.reverse();
        let reversed_results =
            BudgetAllocator::allocate(&reversed, 100.0, AllocationStrategy::Equal, &config).unwrap();
        for r in &reversed_results {
            assert!((r.new_budget - 100.0 / 3.0).abs() <= 0.01);
        }
    }

    #[test]
    fn test_equal_strategy_ignores_malformed_metrics() {
        let config = EngineConfig::default();
        let siblings = vec![
            sibling("s0", 2.0, 1.0, 20.0, 50.0),
            sibling("s1", f64::NAN, 1.0, 20.0, 50.0),
        ];

        let results =
            BudgetAllocator::allocate(&siblings, 100.0, AllocationStrategy::Equal, &config).unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            assert!((r.new_budget - 50.0).abs() < 1e-9);
            assert_eq!(r.composite_score, 0.0);
            assert_eq!(r.action, AllocationAction::NoChange);
        }

        let err =
            BudgetAllocator::allocate(&siblings, 100.0, AllocationStrategy::Performance, &config)
                .unwrap_err();
        assert!(matches!(err, EngineError::InvalidMetrics { ref entity_id, .. } if entity_id == "s1"));
    }

    #[test]
    fn test_zero_total_budget_rejected() {
        let config = EngineConfig::default();
        let siblings = vec![sibling("a", 2.0, 1.0, 20.0, 10.0)];
        for total in [0.0, -5.0, f64::NAN] {
            let err = BudgetAllocator::allocate(
                &siblings,
                total,
                AllocationStrategy::Performance,
                &config,
            )
            .unwrap_err();
            assert!(matches!(err, EngineError::Parameter(_)));
        }
    }

    #[test]
    fn test_empty_siblings_rejected() {
        let config = EngineConfig::default();
        let err = BudgetAllocator::allocate(&[], 100.0, AllocationStrategy::Equal, &config)
            .unwrap_err();
        assert!(matches!(err, EngineError::Parameter(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let config = EngineConfig::default();
        let siblings = vec![
            sibling("a", 2.0, 1.0, 20.0, 10.0),
            sibling("a", 1.0, 1.0, 30.0, 10.0),
        ];
        let err =
            BudgetAllocator::allocate(&siblings, 100.0, AllocationStrategy::Performance, &config)
                .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_small_changes_marked_no_change() {
        let config = EngineConfig::default();
        let siblings = vec![
            sibling("a", 2.0, 1.0, 20.0, 50.4),
            sibling("b", 2.0, 1.0, 20.0, 45.0),
        ];
        let results =
            BudgetAllocator::allocate(&siblings, 100.0, AllocationStrategy::Performance, &config)
                .unwrap();
        assert_eq!(results[0].action, AllocationAction::NoChange);
        assert_eq!(results[1].action, AllocationAction::Updated);
        assert!((results[0].new_budget - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_composite_score_floor_and_neutral_scores() {
        let config = EngineConfig::default();
        let empty = BudgetAllocator::score(&PerformanceMetrics::default(), &config);
        assert_eq!(empty.roas_score, 0.1);
        assert_eq!(empty.ctr_score, 0.1);
        assert_eq!(empty.cpa_score, 0.1);
        assert!((empty.composite - 0.1).abs() < 1e-9);

        let floored_config = EngineConfig {
            allocation_score_floor: 0.5,
            ..Default::default()
        };
        let floored = BudgetAllocator::score(&PerformanceMetrics::default(), &floored_config);
        assert_eq!(floored.composite, 0.5);
    }

    #[test]
    fn test_infeasible_floor_falls_back_to_equal_floor() {
        let config = EngineConfig::default();
        let siblings: Vec<SiblingInput> = (0..12)
            .map(|i| sibling(&format!("s{}", i), i as f64 * 0.3, 1.0, 25.0, 10.0))
            .collect();
        let results =
            BudgetAllocator::allocate(&siblings, 120.0, AllocationStrategy::Performance, &config)
                .unwrap();
        assert!((sum(&results) - 120.0).abs() <= 0.01);
        for r in &results {
            assert!((r.new_budget - 10.0).abs() <= 0.01);
        }
    }

    #[test]
    fn test_random_sibling_sets_hold_invariants() {
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let n = rng.gen_range(1..=10);
            let siblings: Vec<SiblingInput> = (0..n)
                .map(|i| {
                    let roas = if rng.gen_bool(0.2) { 0.0 } else { rng.gen_range(0.0..6.0) };
                    let cpa = if rng.gen_bool(0.2) { 0.0 } else { rng.gen_range(1.0..150.0) };
                    sibling(
                        &format!("s{}", i),
                        roas,
                        rng.gen_range(0.0..5.0),
                        cpa,
                        rng.gen_range(0.0..500.0),
                    )
                })
                .collect();
            let total = (rng.gen_range(1.0..100_000.0_f64) * 100.0).round() / 100.0;

            let results = BudgetAllocator::allocate(
                &siblings,
                total,
                AllocationStrategy::Performance,
                &config,
            )
            .unwrap();

            assert_eq!(results.len(), n);
            assert!((sum(&results) - total).abs() <= 0.01, "sum drifted for total {}", total);
            let floor = total * config.min_allocation_pct - 0.01 - 1e-9;
            for r in &results {
                assert!(r.new_budget >= floor, "{} below floor {}", r.new_budget, floor);
                assert!(r.composite_score >= config.allocation_score_floor);
                assert!(r.composite_score <= 1.0);
            }
        }
    }

    #[test]
    fn test_floored_shares_sum_to_one() {
        let shares = floored_shares(&[1.0, 0.05, 0.05, 0.05], 0.1);
        assert!((shares.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((shares[0] - 0.7).abs() < 1e-12);
        assert!(shares[1..].iter().all(|s| (*s - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_apportion_cents_is_exact() {
        let budgets = apportion_cents(100.0, &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert_eq!(budgets, vec![33.34, 33.33, 33.33]);
    }
}
