//! Priority alert scoring.
//!
//! Turns a patient's clinical and operational attributes into a bounded
//! 0-100 priority score plus a ranked list of the signals that drove it.
//! This is an operational prioritization heuristic, not a diagnosis.

use crate::patient::{ConversionStage, PatientId, PatientView, PupilReactivity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_REASONS: usize = 5;
/// Signals at or below this weight are not worth explaining.
pub const REASON_MIN_WEIGHT: f64 = 1.0;

pub const HIGH_PRIORITY_MIN: u8 = 70;
pub const MEDIUM_PRIORITY_MIN: u8 = 40;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_PRIORITY_MIN {
            PriorityTier::High
        } else if score >= MEDIUM_PRIORITY_MIN {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriorityTier::High => "High",
            PriorityTier::Medium => "Medium",
            PriorityTier::Low => "Low",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertReason {
    pub label: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertItem {
    pub patient_id: PatientId,
    pub score: u8,
    pub priority_tier: PriorityTier,
    pub reasons: Vec<AlertReason>,
    pub created_at: DateTime<Utc>,
}

/// The independently clamped contributions that make up a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AlertSignals {
    pub neuro: f64,
    pub pupils: f64,
    pub pressure: f64,
    pub lactate: f64,
    pub delay: f64,
    pub quality_penalty: f64,
    pub stage_bonus: f64,
}

impl AlertSignals {
    pub fn from_view(view: &PatientView<'_>) -> Self {
        let completeness = view.bundle.completeness();
        Self {
            neuro: ((10.0 - f64::from(view.glasgow_coma_score)) * 6.0).clamp(0.0, 42.0),
            pupils: pupil_weight(view.pupil_reactivity),
            pressure: ((75.0 - view.mean_arterial_pressure) * 0.9).clamp(0.0, 18.0),
            lactate: ((view.lactate - 1.5) * 6.0).clamp(0.0, 18.0),
            delay: (view.hours_since_detection * 1.2).clamp(0.0, 20.0),
            quality_penalty: ((1.0 - completeness) * 22.0).clamp(0.0, 22.0),
            stage_bonus: stage_bonus(view.conversion_stage),
        }
    }

    pub fn raw_total(&self) -> f64 {
        self.neuro
            + self.pupils
            + self.pressure
            + self.lactate
            + self.delay
            + self.quality_penalty
            + self.stage_bonus
    }

    /// Rounded score; saturates at 100 rather than renormalizing.
    pub fn score(&self) -> u8 {
        self.raw_total().clamp(0.0, 100.0).round() as u8
    }
}

pub fn pupil_weight(pupils: PupilReactivity) -> f64 {
    match pupils {
        PupilReactivity::NonReactive => 18.0,
        PupilReactivity::Mixed => 10.0,
        PupilReactivity::Reactive => 4.0,
    }
}

pub fn stage_bonus(stage: ConversionStage) -> f64 {
    match stage {
        ConversionStage::Validated => 8.0,
        ConversionStage::Referred => 6.0,
        ConversionStage::Maintained => 4.0,
        ConversionStage::Detected | ConversionStage::Effective | ConversionStage::Discarded => 2.0,
    }
}

pub fn compute_alert(view: PatientView<'_>) -> AlertItem {
    compute_alert_at(view, Utc::now())
}

/// Same as [`compute_alert`] with an explicit timestamp.
pub fn compute_alert_at(view: PatientView<'_>, created_at: DateTime<Utc>) -> AlertItem {
    let signals = AlertSignals::from_view(&view);
    let score = signals.score();

    AlertItem {
        patient_id: view.id.clone(),
        score,
        priority_tier: PriorityTier::from_score(score),
        reasons: rank_reasons(&view, &signals),
        created_at,
    }
}

fn rank_reasons(view: &PatientView<'_>, signals: &AlertSignals) -> Vec<AlertReason> {
    let bundle_pct = view.bundle.completeness() * 100.0;
    let candidates = [
        (format!("Delay ({}h)", view.hours_since_detection), signals.delay),
        (format!("Bundle {:.0}%", bundle_pct), signals.quality_penalty),
        (format!("GCS {}", view.glasgow_coma_score), signals.neuro),
        (format!("Pupils: {}", view.pupil_reactivity), signals.pupils),
        (format!("MAP {}", view.mean_arterial_pressure), signals.pressure),
        (format!("Lactate {}", view.lactate), signals.lactate),
    ];

    let mut reasons: Vec<AlertReason> = candidates
        .into_iter()
        .filter(|(_, weight)| *weight > REASON_MIN_WEIGHT)
        .map(|(label, weight)| AlertReason { label, weight })
        .collect();
    // stable: ties keep category order
    reasons.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    reasons.truncate(MAX_REASONS);
    reasons
}
