//! Creative fatigue detection for ad-level entities.
//!
//! The detector only flags the need for rotation; choosing the replacement
//! creative belongs to the rotation workflow.

use adpilot_core::types::PerformanceMetrics;
use adpilot_core::EngineConfig;

pub struct FatigueDetector;

impl FatigueDetector {
    /// Returns the fatigue reasons joined with `"; "`, or `None` when the ad
    /// is healthy or has too few impressions to judge.
    pub fn check(metrics: &PerformanceMetrics, config: &EngineConfig) -> Option<String> {
        if metrics.impressions < config.fatigue_min_impressions {
            return None;
        }

        let mut reasons = Vec::new();
        if metrics.frequency >= config.fatigue_frequency_threshold {
            reasons.push(format!(
                "high frequency ({:.2} >= {:.2})",
                metrics.frequency, config.fatigue_frequency_threshold
            ));
        }
        if metrics.ctr < config.fatigue_ctr_threshold
            && metrics.impressions >= config.fatigue_ctr_min_impressions
        {
            reasons.push(format!(
                "low CTR ({:.2}%) with {} impressions",
                metrics.ctr, metrics.impressions
            ));
        }

        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}
