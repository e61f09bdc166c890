use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Root configuration. Loaded from an optional TOML file and environment
/// variables with the prefix `ADPILOT__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Load configuration from an optional file and the environment, then
    /// validate the engine thresholds.
    pub fn load(path: Option<&str>) -> EngineResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ADPILOT")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.engine.validate()?;
        config.retry.validate()?;
        Ok(config)
    }
}

/// Thresholds for the decision engine. Monetary values are in account
/// currency, CTRs in percent.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EngineConfig {
    // CPA
    #[serde(default = "default_target_cpa")]
    pub target_cpa: f64,
    #[serde(default = "default_max_cpa")]
    pub max_cpa: f64,
    #[serde(default = "default_alert_cpa")]
    pub alert_cpa: f64,

    // CTR
    #[serde(default = "default_min_ctr")]
    pub min_ctr: f64,
    #[serde(default = "default_target_ctr")]
    pub target_ctr: f64,
    #[serde(default = "default_excellent_ctr")]
    pub excellent_ctr: f64,

    // CPC
    #[serde(default = "default_target_cpc")]
    pub target_cpc: f64,
    #[serde(default = "default_max_cpc")]
    pub max_cpc: f64,

    // Minimum signal
    #[serde(default = "default_min_impressions")]
    pub min_impressions: u64,
    #[serde(default = "default_min_clicks")]
    pub min_clicks: u64,
    #[serde(default = "default_min_spend")]
    pub min_spend: f64,

    // Learning and maturity gating
    #[serde(default = "default_learning_phase_impressions")]
    pub learning_phase_impressions: u64,
    #[serde(default = "default_learning_phase_hours")]
    pub learning_phase_hours: f64,
    #[serde(default = "default_min_hours_before_pause")]
    pub min_hours_before_pause: f64,
    #[serde(default = "default_min_spend_before_pause")]
    pub min_spend_before_pause: f64,
    #[serde(default = "default_phase_new_hours")]
    pub phase_new_hours: f64,
    #[serde(default = "default_phase_learning_hours")]
    pub phase_learning_hours: f64,

    // Scaling
    #[serde(default = "default_scale_budget_increase_pct")]
    pub scale_budget_increase_pct: f64,
    #[serde(default = "default_scale_min_roas")]
    pub scale_min_roas: f64,
    #[serde(default)]
    pub auto_execute_scale: bool,
    #[serde(default)]
    pub auto_execute_pause: bool,

    // Frequency and fatigue
    #[serde(default = "default_alert_frequency")]
    pub alert_frequency: f64,
    #[serde(default = "default_fatigue_min_impressions")]
    pub fatigue_min_impressions: u64,
    #[serde(default = "default_fatigue_frequency_threshold")]
    pub fatigue_frequency_threshold: f64,
    #[serde(default = "default_fatigue_ctr_threshold")]
    pub fatigue_ctr_threshold: f64,
    #[serde(default = "default_fatigue_ctr_min_impressions")]
    pub fatigue_ctr_min_impressions: u64,

    // Budget allocation
    #[serde(default = "default_min_allocation_pct")]
    pub min_allocation_pct: f64,
    #[serde(default = "default_allocation_roas_weight")]
    pub allocation_roas_weight: f64,
    #[serde(default = "default_allocation_ctr_weight")]
    pub allocation_ctr_weight: f64,
    #[serde(default = "default_allocation_cpa_weight")]
    pub allocation_cpa_weight: f64,
    #[serde(default = "default_allocation_score_floor")]
    pub allocation_score_floor: f64,
    #[serde(default = "default_min_budget_change")]
    pub min_budget_change: f64,
}

// Default functions
fn default_target_cpa() -> f64 {
    25.0
}
fn default_max_cpa() -> f64 {
    40.0
}
fn default_alert_cpa() -> f64 {
    60.0
}
fn default_min_ctr() -> f64 {
    0.8
}
fn default_target_ctr() -> f64 {
    1.5
}
fn default_excellent_ctr() -> f64 {
    3.0
}
fn default_target_cpc() -> f64 {
    1.0
}
fn default_max_cpc() -> f64 {
    2.5
}
fn default_min_impressions() -> u64 {
    1000
}
fn default_min_clicks() -> u64 {
    20
}
fn default_min_spend() -> f64 {
    10.0
}
fn default_learning_phase_impressions() -> u64 {
    500
}
fn default_learning_phase_hours() -> f64 {
    48.0
}
fn default_min_hours_before_pause() -> f64 {
    72.0
}
fn default_min_spend_before_pause() -> f64 {
    30.0
}
fn default_phase_new_hours() -> f64 {
    24.0
}
fn default_phase_learning_hours() -> f64 {
    72.0
}
fn default_scale_budget_increase_pct() -> f64 {
    20.0
}
fn default_scale_min_roas() -> f64 {
    2.0
}
fn default_alert_frequency() -> f64 {
    3.0
}
fn default_fatigue_min_impressions() -> u64 {
    3000
}
fn default_fatigue_frequency_threshold() -> f64 {
    3.5
}
fn default_fatigue_ctr_threshold() -> f64 {
    0.5
}
fn default_fatigue_ctr_min_impressions() -> u64 {
    5000
}
fn default_min_allocation_pct() -> f64 {
    0.10
}
fn default_allocation_roas_weight() -> f64 {
    0.4
}
fn default_allocation_ctr_weight() -> f64 {
    0.3
}
fn default_allocation_cpa_weight() -> f64 {
    0.3
}
fn default_allocation_score_floor() -> f64 {
    0.05
}
fn default_min_budget_change() -> f64 {
    1.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_cpa: default_target_cpa(),
            max_cpa: default_max_cpa(),
            alert_cpa: default_alert_cpa(),
            min_ctr: default_min_ctr(),
            target_ctr: default_target_ctr(),
            excellent_ctr: default_excellent_ctr(),
            target_cpc: default_target_cpc(),
            max_cpc: default_max_cpc(),
            min_impressions: default_min_impressions(),
            min_clicks: default_min_clicks(),
            min_spend: default_min_spend(),
            learning_phase_impressions: default_learning_phase_impressions(),
            learning_phase_hours: default_learning_phase_hours(),
            min_hours_before_pause: default_min_hours_before_pause(),
            min_spend_before_pause: default_min_spend_before_pause(),
            phase_new_hours: default_phase_new_hours(),
            phase_learning_hours: default_phase_learning_hours(),
            scale_budget_increase_pct: default_scale_budget_increase_pct(),
            scale_min_roas: default_scale_min_roas(),
            auto_execute_scale: false,
            auto_execute_pause: false,
            alert_frequency: default_alert_frequency(),
            fatigue_min_impressions: default_fatigue_min_impressions(),
            fatigue_frequency_threshold: default_fatigue_frequency_threshold(),
            fatigue_ctr_threshold: default_fatigue_ctr_threshold(),
            fatigue_ctr_min_impressions: default_fatigue_ctr_min_impressions(),
            min_allocation_pct: default_min_allocation_pct(),
            allocation_roas_weight: default_allocation_roas_weight(),
            allocation_ctr_weight: default_allocation_ctr_weight(),
            allocation_cpa_weight: default_allocation_cpa_weight(),
            allocation_score_floor: default_allocation_score_floor(),
            min_budget_change: default_min_budget_change(),
        }
    }
}

impl EngineConfig {
    /// Check that thresholds are finite, non-negative and consistently ordered.
    pub fn validate(&self) -> EngineResult<()> {
        let values = [
            ("target_cpa", self.target_cpa),
            ("max_cpa", self.max_cpa),
            ("alert_cpa", self.alert_cpa),
            ("min_ctr", self.min_ctr),
            ("target_ctr", self.target_ctr),
            ("excellent_ctr", self.excellent_ctr),
            ("target_cpc", self.target_cpc),
            ("max_cpc", self.max_cpc),
            ("min_spend", self.min_spend),
            ("learning_phase_hours", self.learning_phase_hours),
            ("min_hours_before_pause", self.min_hours_before_pause),
            ("min_spend_before_pause", self.min_spend_before_pause),
            ("phase_new_hours", self.phase_new_hours),
            ("phase_learning_hours", self.phase_learning_hours),
            ("scale_budget_increase_pct", self.scale_budget_increase_pct),
            ("scale_min_roas", self.scale_min_roas),
            ("alert_frequency", self.alert_frequency),
            ("fatigue_frequency_threshold", self.fatigue_frequency_threshold),
            ("fatigue_ctr_threshold", self.fatigue_ctr_threshold),
            ("min_allocation_pct", self.min_allocation_pct),
            ("allocation_roas_weight", self.allocation_roas_weight),
            ("allocation_ctr_weight", self.allocation_ctr_weight),
            ("allocation_cpa_weight", self.allocation_cpa_weight),
            ("allocation_score_floor", self.allocation_score_floor),
            ("min_budget_change", self.min_budget_change),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Config(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }

        if self.target_cpa <= 0.0 {
            return Err(EngineError::Config("target_cpa must be positive".to_string()));
        }
        if !(self.target_cpa <= self.max_cpa && self.max_cpa <= self.alert_cpa) {
            return Err(EngineError::Config(format!(
                "CPA thresholds must satisfy target <= max <= alert (got {} / {} / {})",
                self.target_cpa, self.max_cpa, self.alert_cpa
            )));
        }
        if !(self.min_ctr <= self.target_ctr && self.target_ctr <= self.excellent_ctr) {
            return Err(EngineError::Config(format!(
                "CTR thresholds must satisfy min <= target <= excellent (got {} / {} / {})",
                self.min_ctr, self.target_ctr, self.excellent_ctr
            )));
        }
        if self.phase_new_hours > self.phase_learning_hours {
            return Err(EngineError::Config(format!(
                "phase_new_hours ({}) must not exceed phase_learning_hours ({})",
                self.phase_new_hours, self.phase_learning_hours
            )));
        }
        if self.min_allocation_pct >= 1.0 {
            return Err(EngineError::Config(format!(
                "min_allocation_pct must be below 1.0 (got {})",
                self.min_allocation_pct
            )));
        }
        if self.allocation_score_floor <= 0.0 {
            return Err(EngineError::Config(
                "allocation_score_floor must be positive".to_string(),
            ));
        }
        let weight_sum =
            self.allocation_roas_weight + self.allocation_ctr_weight + self.allocation_cpa_weight;
        if weight_sum <= 0.0 {
            return Err(EngineError::Config(
                "allocation weights must not all be zero".to_string(),
            ));
        }
        if self.scale_budget_increase_pct <= 0.0 {
            return Err(EngineError::Config(
                "scale_budget_increase_pct must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Retry Policy ───────────────────────────────────────────────────────

/// Retry configuration for calls that cross the platform boundary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Spread each delay uniformly over ±25 %.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Upper bound on a single attempt. Zero disables the timeout.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> bool {
    true
}
fn default_attempt_timeout_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_attempts == 0 {
            return Err(EngineError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(EngineError::Config(format!(
                "retry.backoff_multiplier must be >= 1.0 (got {})",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Un-jittered delay after the given failed attempt (0-indexed), capped
    /// at `max_backoff_ms`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(base_ms.min(self.max_backoff_ms as f64) as u64)
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        base.mul_f64(factor)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.attempt_timeout_ms > 0).then(|| Duration::from_millis(self.attempt_timeout_ms))
    }
}
