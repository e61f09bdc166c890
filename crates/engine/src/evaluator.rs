//! Rule-based entity evaluator.
//!
//! Each call is a pure function of the entity snapshot, the evaluation time
//! and the config. Gates run first (learning, insufficient data); the CTR,
//! CPA, CPC and frequency rules are then evaluated independently, so more
//! than one decision or alert may come out of a single call.
//!
//! Destructive actions are gated by pause eligibility: an entity younger
//! than `min_hours_before_pause` or with less than `min_spend_before_pause`
//! spent never receives a Pause, only an Alert asking to monitor it.

use adpilot_core::types::{
    Alert, AlertKind, AlertSeverity, Decision, DecisionKind, EntityInput, PerformanceMetrics,
    Priority,
};
use adpilot_core::{EngineConfig, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::maturity::{Maturity, MaturityClassifier};

/// Everything a single evaluation produced for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityEvaluation {
    pub maturity: Maturity,
    pub can_pause: bool,
    pub decisions: Vec<Decision>,
    pub alerts: Vec<Alert>,
}

pub struct EntityEvaluator;

impl EntityEvaluator {
    pub fn evaluate(
        input: &EntityInput,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> EngineResult<EntityEvaluation> {
        input.metrics.validate(&input.entity.id)?;

        let maturity = MaturityClassifier::classify(input.created_at, now, config);
        let metrics = &input.metrics;
        let can_pause = maturity.age_hours >= config.min_hours_before_pause
            && metrics.spend >= config.min_spend_before_pause;

        debug!(
            entity_id = %input.entity.id,
            entity_type = %input.entity.entity_type,
            phase = %maturity.phase,
            age_hours = maturity.age_hours,
            impressions = metrics.impressions,
            can_pause,
            "Evaluating entity"
        );

        let mut out = RuleOutput {
            input,
            maturity,
            now,
            config,
            decisions: Vec::new(),
            alerts: Vec::new(),
        };

        if metrics.impressions < config.learning_phase_impressions
            || maturity.age_hours < config.learning_phase_hours
        {
            out.learning();
            return Ok(out.finish(can_pause));
        }

        if metrics.impressions < config.min_impressions {
            debug!(
                entity_id = %input.entity.id,
                impressions = metrics.impressions,
                min_impressions = config.min_impressions,
                "Insufficient data, no decision"
            );
            return Ok(out.finish(can_pause));
        }

        out.ctr_rule(can_pause);
        out.cpa_rule(can_pause);
        out.cpc_rule();
        out.frequency_rule();

        if out.decisions.is_empty() {
            out.push_decision(
                DecisionKind::Maintain,
                Priority::Low,
                format!(
                    "Within targets: CTR {:.2}%, CPA ${:.2}, ROAS {:.2}x",
                    metrics.ctr, metrics.cost_per_conversion, metrics.roas
                ),
                "No change".to_string(),
            );
        }

        Ok(out.finish(can_pause))
    }
}

struct RuleOutput<'a> {
    input: &'a EntityInput,
    maturity: Maturity,
    now: DateTime<Utc>,
    config: &'a EngineConfig,
    decisions: Vec<Decision>,
    alerts: Vec<Alert>,
}

impl<'a> RuleOutput<'a> {
    fn metrics(&self) -> &'a PerformanceMetrics {
        &self.input.metrics
    }

    fn learning(&mut self) {
        let metrics = self.metrics();
        let config = self.config;
        let hours_remaining = (config.learning_phase_hours - self.maturity.age_hours).max(0.0);
        let impressions_remaining = config
            .learning_phase_impressions
            .saturating_sub(metrics.impressions);

        let reason = format!(
            "Learning phase ({}): {}/{} impressions, {:.1}h/{:.0}h elapsed",
            self.maturity.phase,
            metrics.impressions,
            config.learning_phase_impressions,
            self.maturity.age_hours,
            config.learning_phase_hours
        );
        let action = if impressions_remaining > 0 && hours_remaining > 0.0 {
            format!(
                "Wait {:.1} hours and {} more impressions before evaluating",
                hours_remaining, impressions_remaining
            )
        } else if hours_remaining > 0.0 {
            format!("Wait {:.1} hours before evaluating", hours_remaining)
        } else {
            format!(
                "Wait for {} more impressions before evaluating",
                impressions_remaining
            )
        };

        self.push_decision(DecisionKind::Learning, Priority::Low, reason, action);
    }

    fn ctr_rule(&mut self, can_pause: bool) {
        let metrics = self.metrics();
        let config = self.config;

        if metrics.ctr < config.min_ctr {
            let reason = format!(
                "CTR {:.2}% below minimum {:.2}% after {} impressions",
                metrics.ctr, config.min_ctr, metrics.impressions
            );
            if can_pause {
                let action = format!(
                    "Pause this {} and review creative and targeting",
                    self.input.entity.entity_type
                );
                self.push_decision(DecisionKind::Pause, Priority::High, reason, action);
            } else {
                let action = self.monitor_action();
                self.push_decision(DecisionKind::Alert, Priority::Medium, reason, action);
            }
        } else if metrics.ctr >= config.excellent_ctr {
            let reason = format!(
                "CTR {:.2}% at or above excellent {:.2}%",
                metrics.ctr, config.excellent_ctr
            );
            let action = self.scale_action();
            self.push_decision(DecisionKind::Scale, Priority::High, reason, action);
        }
    }

    fn cpa_rule(&mut self, can_pause: bool) {
        let metrics = self.metrics();
        let config = self.config;

        if metrics.conversions == 0 {
            if metrics.spend >= config.min_spend && metrics.spend >= config.alert_cpa {
                self.push_alert(
                    AlertKind::NoConversions,
                    AlertSeverity::Warning,
                    format!(
                        "Spent ${:.2} with no conversions (alert CPA ${:.2})",
                        metrics.spend, config.alert_cpa
                    ),
                );
            }
            return;
        }

        let cpa = metrics.cost_per_conversion;
        if cpa > config.alert_cpa {
            let severity = if can_pause {
                AlertSeverity::High
            } else {
                AlertSeverity::Warning
            };
            self.push_alert(
                AlertKind::HighCpa,
                severity,
                format!(
                    "CPA ${:.2} exceeds alert threshold ${:.2}",
                    cpa, config.alert_cpa
                ),
            );

            let reason = format!(
                "CPA ${:.2} above alert threshold ${:.2} ({} conversions, ${:.2} spent)",
                cpa, config.alert_cpa, metrics.conversions, metrics.spend
            );
            if can_pause {
                let action = format!(
                    "Pause this {} to stop unprofitable spend",
                    self.input.entity.entity_type
                );
                self.push_decision(DecisionKind::Pause, Priority::Critical, reason, action);
            } else {
                let action = format!(
                    "Monitor, still in {} phase: {}",
                    self.maturity.phase,
                    self.monitor_action()
                );
                self.push_decision(DecisionKind::Alert, Priority::High, reason, action);
            }
        } else if cpa > config.max_cpa {
            let reason = format!(
                "CPA ${:.2} above maximum ${:.2} ({} conversions)",
                cpa, config.max_cpa, metrics.conversions
            );
            self.push_decision(
                DecisionKind::Alert,
                Priority::High,
                reason,
                "Review targeting, bids and landing page".to_string(),
            );
        } else if cpa <= config.target_cpa && metrics.roas >= config.scale_min_roas {
            let reason = format!(
                "Profitable: CPA ${:.2} within target ${:.2} at ROAS {:.2}x",
                cpa, config.target_cpa, metrics.roas
            );
            let action = format!("Profitable, {}", self.scale_action().to_lowercase());
            self.push_decision(DecisionKind::Scale, Priority::High, reason, action);
        }
    }

    fn cpc_rule(&mut self) {
        let metrics = self.metrics();
        let config = self.config;

        if metrics.cpc > config.max_cpc && metrics.clicks >= config.min_clicks {
            let reason = format!(
                "CPC ${:.2} above maximum ${:.2} (target ${:.2}) over {} clicks",
                metrics.cpc, config.max_cpc, config.target_cpc, metrics.clicks
            );
            self.push_decision(
                DecisionKind::Alert,
                Priority::Medium,
                reason,
                "Review bids and audience competition".to_string(),
            );
        }
    }

    fn frequency_rule(&mut self) {
        let metrics = self.metrics();
        if metrics.frequency > self.config.alert_frequency {
            self.push_alert(
                AlertKind::HighFrequency,
                AlertSeverity::Warning,
                format!(
                    "High frequency ({:.2}): possible ad fatigue",
                    metrics.frequency
                ),
            );
        }
    }

    fn monitor_action(&self) -> String {
        let hours_until = (self.config.min_hours_before_pause - self.maturity.age_hours).max(0.0);
        let spend_until = (self.config.min_spend_before_pause - self.metrics().spend).max(0.0);
        format!(
            "monitor, {:.1}h / ${:.2} remaining before a pause decision",
            hours_until, spend_until
        )
    }

    fn scale_action(&self) -> String {
        let pct = self.config.scale_budget_increase_pct;
        match self.input.current_budget {
            Some(budget) => format!(
                "Increase budget by {:.0}% from ${:.2} to ${:.2}",
                pct,
                budget,
                budget * (1.0 + pct / 100.0)
            ),
            None => format!("Increase budget by {:.0}%", pct),
        }
    }

    fn push_decision(
        &mut self,
        kind: DecisionKind,
        priority: Priority,
        reason: String,
        recommended_action: String,
    ) {
        let auto_execute = match kind {
            DecisionKind::Scale => self.config.auto_execute_scale,
            DecisionKind::Pause => self.config.auto_execute_pause,
            _ => false,
        };
        if matches!(kind, DecisionKind::Scale | DecisionKind::Pause) {
            info!(
                entity_id = %self.input.entity.id,
                kind = %kind,
                ?priority,
                reason = %reason,
                "Decision emitted"
            );
        }
        self.decisions.push(Decision {
            entity: self.input.entity.clone(),
            kind,
            priority,
            phase: self.maturity.phase,
            age_hours: self.maturity.age_hours,
            reason,
            recommended_action,
            metrics: self.input.metrics.clone(),
            auto_execute,
            evaluated_at: self.now,
        });
    }

    fn push_alert(&mut self, kind: AlertKind, severity: AlertSeverity, message: String) {
        self.alerts.push(Alert {
            kind,
            severity,
            entity: self.input.entity.clone(),
            message,
            metrics: self.input.metrics.clone(),
            raised_at: self.now,
        });
    }

    fn finish(self, can_pause: bool) -> EntityEvaluation {
        EntityEvaluation {
            maturity: self.maturity,
            can_pause,
            decisions: self.decisions,
            alerts: self.alerts,
        }
    }
}
