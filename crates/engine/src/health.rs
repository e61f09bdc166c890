//! Account health score: a single 0-100 figure from CTR, CPA and ROAS.

use adpilot_core::types::PerformanceMetrics;
use adpilot_core::EngineConfig;
use serde::{Deserialize, Serialize};

const BASE_SCORE: i32 = 50;

/// Points contributed by each signal, before clamping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthBreakdown {
    pub base: i32,
    pub ctr_points: i32,
    /// `None` when there were no conversions to judge CPA by.
    pub cpa_points: Option<i32>,
    pub roas_points: i32,
    pub score: u8,
}

pub struct HealthScorer;

impl HealthScorer {
    pub fn score(metrics: &PerformanceMetrics, config: &EngineConfig) -> u8 {
        Self::breakdown(metrics, config).score
    }

    pub fn breakdown(metrics: &PerformanceMetrics, config: &EngineConfig) -> HealthBreakdown {
        let ctr_points = Self::ctr_points(metrics.ctr, config);
        let cpa_points =
            (metrics.conversions > 0).then(|| Self::cpa_points(metrics.cost_per_conversion, config));
        let roas_points = Self::roas_points(metrics.roas);

        let raw = BASE_SCORE + ctr_points + cpa_points.unwrap_or(0) + roas_points;
        HealthBreakdown {
            base: BASE_SCORE,
            ctr_points,
            cpa_points,
            roas_points,
            score: raw.clamp(0, 100) as u8,
        }
    }

    fn ctr_points(ctr: f64, config: &EngineConfig) -> i32 {
        if ctr >= config.excellent_ctr {
            15
        } else if ctr >= config.target_ctr {
            10
        } else if ctr >= config.min_ctr {
            5
        } else {
            -15
        }
    }

    fn cpa_points(cpa: f64, config: &EngineConfig) -> i32 {
        if cpa <= config.target_cpa {
            20
        } else if cpa <= config.max_cpa {
            10
        } else if cpa <= config.alert_cpa {
            -10
        } else {
            -20
        }
    }

    fn roas_points(roas: f64) -> i32 {
        if roas >= 3.0 {
            15
        } else if roas >= 2.0 {
            10
        } else if roas >= 1.0 {
            5
        } else if roas > 0.0 {
            -10
        } else {
            0
        }
    }
}
