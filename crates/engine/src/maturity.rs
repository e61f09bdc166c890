//! Entity maturity: maps delivery age to the phase used to gate
//! destructive decisions.

use adpilot_core::types::MaturityPhase;
use adpilot_core::EngineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Age assigned to entities with no known creation time, so they are never
/// mistakenly protected as young.
pub const UNKNOWN_AGE_HOURS: f64 = 999.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Maturity {
    pub phase: MaturityPhase,
    pub age_hours: f64,
}

pub struct MaturityClassifier;

impl MaturityClassifier {
    pub fn classify(
        created_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Maturity {
        let age_hours = Self::age_hours(created_at, now);
        Maturity {
            phase: Self::phase_for_age(age_hours, config),
            age_hours,
        }
    }

    /// Hours since `created_at`. Creation times in the future count as zero.
    pub fn age_hours(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        match created_at {
            Some(created) => ((now - created).num_seconds() as f64 / 3600.0).max(0.0),
            None => UNKNOWN_AGE_HOURS,
        }
    }

    pub fn phase_for_age(age_hours: f64, config: &EngineConfig) -> MaturityPhase {
        if age_hours < config.phase_new_hours {
            MaturityPhase::New
        } else if age_hours < config.phase_learning_hours {
            MaturityPhase::Learning
        } else {
            MaturityPhase::Mature
        }
    }
}
